// External process management: runner, log polling, job pipelines
pub mod log_poller;
pub mod pipeline;
pub mod runner;

pub use log_poller::*;
pub use pipeline::*;
pub use runner::*;
