use crate::models::ModelKind;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_WORKSPACE_DIR: &str = "MMNET";

pub const RELATEDNESS_EXE: &str = "generate_genetic_relatedness";
pub const PREDICT_EXE: &str = "pred";
pub const TRANSFER_EXE: &str = "transferLearning";

/// Which data folder an uploaded file belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum DataKind {
    Gene,
    Phen,
    Pred,
}

impl DataKind {
    pub fn dir_name(&self) -> &'static str {
        match self {
            DataKind::Gene => "gene",
            DataKind::Phen => "phen",
            DataKind::Pred => "pred",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DataKind::Gene => "genotype",
            DataKind::Phen => "phenotype",
            DataKind::Pred => "to-be-predicted",
        }
    }
}

/// Platform file name of an external executable
pub fn executable_file_name(stem: &str) -> String {
    if cfg!(windows) {
        format!("{}.exe", stem)
    } else {
        stem.to_string()
    }
}

/// Every path the runner touches, resolved from one workspace root
#[derive(Debug, Clone, PartialEq)]
pub struct WorkspaceLayout {
    root: PathBuf,
}

impl WorkspaceLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn data_dir(&self, kind: DataKind) -> PathBuf {
        self.root.join("data").join(kind.dir_name())
    }

    pub fn configs_dir(&self) -> PathBuf {
        self.root.join("configs")
    }

    pub fn esn_config_path(&self) -> PathBuf {
        self.configs_dir().join("ESN.json")
    }

    pub fn model_config_path(&self, model: ModelKind) -> PathBuf {
        self.configs_dir().join(model.config_file_name())
    }

    pub fn step1_log_path(&self) -> PathBuf {
        self.root.join("step1.log")
    }

    pub fn step2_log_path(&self) -> PathBuf {
        self.root.join("step2.log")
    }

    pub fn transfer_log_path(&self) -> PathBuf {
        self.root.join("transfer.log")
    }

    pub fn predict_log_path(&self) -> PathBuf {
        self.root.join("pred.log")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    pub fn executable(&self, stem: &str) -> PathBuf {
        self.root.join(executable_file_name(stem))
    }

    pub fn relatedness_exe(&self) -> PathBuf {
        self.executable(RELATEDNESS_EXE)
    }

    pub fn train_exe(&self, model: ModelKind) -> PathBuf {
        self.executable(model.train_exe_stem())
    }

    pub fn predict_exe(&self) -> PathBuf {
        self.executable(PREDICT_EXE)
    }

    pub fn transfer_exe(&self) -> PathBuf {
        self.executable(TRANSFER_EXE)
    }

    pub fn model_artifact(&self, phenotype: &str) -> PathBuf {
        self.root.join(format!("{}_model.pt", phenotype))
    }

    pub fn prediction_artifact(&self, phenotype: &str) -> PathBuf {
        self.root.join(format!("{}_pred.csv", phenotype))
    }

    /// The history file sits next to the workspace, not inside it
    pub fn run_history_path(&self) -> PathBuf {
        self.root
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(|p| p.join("run_history.log"))
            .unwrap_or_else(|| PathBuf::from("run_history.log"))
    }

    pub fn initialize_directories(&self) -> Result<(), String> {
        let directories = [
            self.data_dir(DataKind::Gene),
            self.data_dir(DataKind::Phen),
            self.data_dir(DataKind::Pred),
            self.configs_dir(),
            self.logs_dir(),
        ];

        for dir in &directories {
            if !dir.exists() {
                fs::create_dir_all(dir)
                    .map_err(|e| format!("Failed to create directory {:?}: {}", dir, e))?;
                log::debug!("Created directory: {:?}", dir);
            }
        }

        log::info!("Workspace initialized at: {:?}", self.root);
        Ok(())
    }
}

impl Default for WorkspaceLayout {
    fn default() -> Self {
        let base = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self::new(base.join(DEFAULT_WORKSPACE_DIR))
    }
}
