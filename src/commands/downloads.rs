// Copy prediction artifacts out of the workspace
use crate::error::{Result, StudioError};
use crate::utils::WorkspaceLayout;
use log::{info, warn};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DownloadFailure {
    pub phenotype: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DownloadReport {
    pub copied: Vec<PathBuf>,
    pub failed: Vec<DownloadFailure>,
}

impl DownloadReport {
    pub fn render(&self) -> String {
        let mut lines = Vec::new();
        for path in &self.copied {
            lines.push(format!("Saved {}", path.display()));
        }
        for failure in &self.failed {
            lines.push(format!("{}: {}", failure.phenotype, failure.reason));
        }
        if lines.is_empty() {
            lines.push("No items selected".to_string());
        }
        lines.join("\n")
    }
}

/// The user's Downloads folder, or the current directory when there is none
pub fn default_download_dir() -> PathBuf {
    dirs::download_dir().unwrap_or_else(|| PathBuf::from("."))
}

/// Copy `<root>/<item>_pred.csv` into `dest` for every item.
/// A missing or uncopyable file is reported for that item only.
pub fn download_predictions(layout: &WorkspaceLayout, items: &[String], dest: &Path) -> Result<DownloadReport> {
    fs::create_dir_all(dest).map_err(|e| StudioError::io(dest, e))?;
    let mut report = DownloadReport::default();

    for phenotype in items {
        let source = layout.prediction_artifact(phenotype);
        if !source.is_file() {
            warn!("No prediction file for {} at {:?}", phenotype, source);
            report.failed.push(DownloadFailure {
                phenotype: phenotype.clone(),
                reason: format!("prediction file not found ({})", source.display()),
            });
            continue;
        }

        let Some(file_name) = source.file_name() else {
            continue;
        };
        let target = dest.join(file_name);
        match fs::copy(&source, &target) {
            Ok(_) => report.copied.push(target),
            Err(e) => {
                warn!("Failed to copy {:?}: {}", source, e);
                report.failed.push(DownloadFailure {
                    phenotype: phenotype.clone(),
                    reason: format!("copy failed: {}", e),
                });
            }
        }
    }

    info!(
        "Downloaded {} prediction file(s) to {:?}, {} failed",
        report.copied.len(),
        dest,
        report.failed.len()
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_items_do_not_abort_the_batch() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = WorkspaceLayout::new(tmp.path().join("MMNET"));
        fs::create_dir_all(layout.root()).unwrap();
        fs::write(layout.prediction_artifact("height"), "id,pred\n1,0.5\n").unwrap();
        let dest = tmp.path().join("out");

        let items = vec!["weight".to_string(), "height".to_string()];
        let report = download_predictions(&layout, &items, &dest).unwrap();

        assert_eq!(report.copied, vec![dest.join("height_pred.csv")]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].phenotype, "weight");
        assert_eq!(fs::read_to_string(dest.join("height_pred.csv")).unwrap(), "id,pred\n1,0.5\n");
    }

    #[test]
    fn test_render_empty_report() {
        assert_eq!(DownloadReport::default().render(), "No items selected");
    }
}
