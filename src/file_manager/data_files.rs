// Data folder operations: uploads, phenotype discovery, sizes

use crate::error::{Result, StudioError};
use crate::utils::{DataKind, WorkspaceLayout};
use log::{debug, info, warn};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const SUPPORTED_EXTENSIONS: [&str; 4] = ["csv", "pt", "xls", "xlsx"];

pub fn is_supported_data_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| SUPPORTED_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct UploadFailure {
    pub file: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UploadReport {
    pub copied: Vec<String>,
    pub failed: Vec<UploadFailure>,
}

impl UploadReport {
    pub fn render(&self, kind: DataKind) -> String {
        let mut message = String::new();
        if !self.copied.is_empty() {
            message.push_str(&format!(
                "Uploaded {} {} file(s):\n{}\n",
                self.copied.len(),
                kind.label(),
                self.copied.join("\n")
            ));
        }
        if !self.failed.is_empty() {
            if !message.is_empty() {
                message.push('\n');
            }
            message.push_str(&format!("Failed {} file(s):\n", self.failed.len()));
            let lines: Vec<String> = self
                .failed
                .iter()
                .map(|f| format!("{} ({})", f.file, f.reason))
                .collect();
            message.push_str(&lines.join("\n"));
        }
        if message.is_empty() {
            message.push_str("No files selected");
        }
        message
    }
}

/// Copy user files into a data folder.
///
/// `confirm_overwrite` is asked once per file that already exists in the
/// target; answering `false` skips that file.
pub fn upload_files<F>(
    layout: &WorkspaceLayout,
    kind: DataKind,
    files: &[PathBuf],
    mut confirm_overwrite: F,
) -> Result<UploadReport>
where
    F: FnMut(&Path) -> bool,
{
    let target_dir = layout.data_dir(kind);
    fs::create_dir_all(&target_dir).map_err(|e| StudioError::io(&target_dir, e))?;

    let mut report = UploadReport::default();

    for source in files {
        let file_name = match source.file_name() {
            Some(name) => name.to_string_lossy().to_string(),
            None => {
                report.failed.push(UploadFailure {
                    file: source.to_string_lossy().to_string(),
                    reason: "not a file".to_string(),
                });
                continue;
            }
        };

        if !is_supported_data_file(source) {
            report.failed.push(UploadFailure {
                file: file_name,
                reason: "unsupported format".to_string(),
            });
            continue;
        }

        let target = target_dir.join(&file_name);
        if target.exists() {
            if !confirm_overwrite(&target) {
                report.failed.push(UploadFailure {
                    file: file_name,
                    reason: "overwrite declined".to_string(),
                });
                continue;
            }
            if let Err(e) = fs::remove_file(&target) {
                warn!("Failed to remove existing {:?}: {}", target, e);
            }
        }

        match fs::copy(source, &target) {
            Ok(_) => {
                debug!("Copied {:?} -> {:?}", source, target);
                report.copied.push(file_name);
            }
            Err(e) => {
                warn!("Failed to copy {:?}: {}", source, e);
                report.failed.push(UploadFailure {
                    file: file_name,
                    reason: format!("copy failed: {}", e),
                });
            }
        }
    }

    info!(
        "Upload to {:?}: {} copied, {} failed",
        target_dir,
        report.copied.len(),
        report.failed.len()
    );
    Ok(report)
}

/// Phenotypes available for training: base names of supported files in data/phen
pub fn list_phenotypes(layout: &WorkspaceLayout) -> Vec<String> {
    let dir = layout.data_dir(DataKind::Phen);
    let mut names: Vec<String> = match fs::read_dir(&dir) {
        Ok(entries) => entries
            .flatten()
            .map(|e| e.path())
            .filter(|p| p.is_file() && is_supported_data_file(p))
            .filter_map(|p| p.file_stem().map(|s| s.to_string_lossy().to_string()))
            .collect(),
        Err(_) => vec![],
    };
    names.sort();
    names.dedup();
    names
}

/// Input file for a prediction, named after the phenotype
pub fn find_input_file(layout: &WorkspaceLayout, phenotype: &str) -> Option<PathBuf> {
    let dir = layout.data_dir(DataKind::Pred);
    SUPPORTED_EXTENSIONS
        .iter()
        .map(|ext| dir.join(format!("{}.{}", phenotype, ext)))
        .find(|p| p.is_file())
}

/// Recursive directory size in MB; 0 for a missing directory
pub fn dir_size_mb(path: &Path) -> f64 {
    fn walk(path: &Path) -> u64 {
        let Ok(entries) = fs::read_dir(path) else {
            return 0;
        };
        entries
            .flatten()
            .map(|entry| {
                let p = entry.path();
                if p.is_dir() {
                    walk(&p)
                } else {
                    entry.metadata().map(|m| m.len()).unwrap_or(0)
                }
            })
            .sum()
    }
    walk(path) as f64 / (1024.0 * 1024.0)
}
