// Command handlers - one file per domain
pub mod downloads;
pub mod runs;
pub mod settings;

pub use downloads::*;
pub use runs::*;
pub use settings::*;
