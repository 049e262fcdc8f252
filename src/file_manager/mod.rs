// File operations: JSON stores, hyperparameter configs, data folders
pub mod config_store;
pub mod data_files;
pub mod json_ops;

pub use config_store::*;
pub use data_files::*;
pub use json_ops::*;
