// Command-line surface
use crate::models::{ModelKind, RunMode};
use crate::utils::DataKind;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "mmnet-studio",
    version,
    about = "Run ESN + MMNet/MENet training, transfer learning and prediction jobs",
    propagate_version = true
)]
pub struct Cli {
    /// Workspace root (defaults to ./MMNET or the value in studio.json)
    #[arg(long, global = true, value_name = "DIR")]
    pub root: Option<PathBuf>,

    /// Network trained in the second phase
    #[arg(long, global = true, value_enum)]
    pub model: Option<ModelKind>,

    /// Settings file to use instead of the per-user studio.json
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Accept the saved settings for every item without prompting
    #[arg(short, long, global = true)]
    pub yes: bool,

    /// Debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args, Debug, Clone)]
pub struct Selection {
    /// Phenotype names
    pub items: Vec<String>,

    /// Use every phenotype found in data/phen
    #[arg(long, conflicts_with = "items")]
    pub all: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Train ESN + network for each phenotype
    Train(Selection),
    /// Fine-tune existing models for each phenotype
    Transfer(Selection),
    /// Predict with trained models
    Predict {
        #[command(flatten)]
        selection: Selection,
        /// Copy the prediction files here afterwards
        #[arg(long, value_name = "DIR")]
        download: Option<PathBuf>,
    },
    /// Copy data files into the workspace
    Upload {
        #[arg(value_enum)]
        kind: DataKind,
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Replace existing files without asking
        #[arg(long)]
        overwrite: bool,
    },
    /// List phenotypes available for training
    List,
    /// Copy prediction files out of the workspace
    Download {
        #[command(flatten)]
        selection: Selection,
        /// Destination directory (defaults to the Downloads folder)
        #[arg(long, value_name = "DIR")]
        dest: Option<PathBuf>,
    },
}

impl Command {
    pub fn run_mode(&self) -> Option<RunMode> {
        match self {
            Command::Train(_) => Some(RunMode::Train),
            Command::Transfer(_) => Some(RunMode::TransferLearn),
            Command::Predict { .. } => Some(RunMode::Predict),
            _ => None,
        }
    }
}
