// Data models (structs)
pub mod job;
pub mod settings;

pub use job::*;
pub use settings::*;
