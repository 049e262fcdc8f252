// Error taxonomy for runs and jobs
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StudioError {
    #[error("A run is already in progress")]
    AlreadyRunning,
    #[error("No phenotype selected")]
    NoSelection,
    #[error("Cannot create log file {path:?}: {source}")]
    LogCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Executable not found: {path:?}")]
    ExecutableNotFound { path: PathBuf },
    #[error("Failed to start {exe:?}: {source}")]
    Spawn {
        exe: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{} exited abnormally ({})", display_name(.exe), describe_code(.code))]
    ProcessFailure {
        exe: PathBuf,
        code: Option<i32>,
        tail: Vec<String>,
    },
    #[error("Invalid config {path:?}: {message}")]
    ConfigParse { path: PathBuf, message: String },
    #[error("No input file found for {phenotype}")]
    MissingInputFile { phenotype: String },
    #[error("Model missing for {phenotype}: {path:?}")]
    MissingModelFile { phenotype: String, path: PathBuf },
    #[error("Cancelled")]
    Cancelled,
    #[error("IO error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StudioError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StudioError::Io {
            path: path.into(),
            source,
        }
    }

    /// Queue-level errors are shown immediately; everything else ends up in the summary.
    pub fn is_queue_level(&self) -> bool {
        matches!(self, StudioError::AlreadyRunning | StudioError::NoSelection)
    }
}

fn display_name(exe: &std::path::Path) -> String {
    exe.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| exe.to_string_lossy().to_string())
}

fn describe_code(code: &Option<i32>) -> String {
    match code {
        Some(c) => format!("exit code {}", c),
        None => "terminated by signal".to_string(),
    }
}

pub type Result<T> = std::result::Result<T, StudioError>;
