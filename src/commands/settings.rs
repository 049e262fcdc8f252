// App settings file (studio.json)
use crate::file_manager::{initialize_json_file, read_json_file_or_default};
use crate::models::AppSettings;
use log::{debug, warn};
use std::path::{Path, PathBuf};

pub const SETTINGS_FILE_NAME: &str = "studio.json";

pub fn default_settings_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mmnet-studio")
        .join(SETTINGS_FILE_NAME)
}

/// Load settings, writing a default file on first use. Never fails.
pub fn load_app_settings(path: &Path) -> AppSettings {
    if let Err(e) = initialize_json_file(path, &AppSettings::default()) {
        warn!("Could not create {:?}: {}", path, e);
    }
    let settings: AppSettings = read_json_file_or_default(path);
    debug!("Loaded settings from {:?}: {:?}", path, settings);
    settings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ModelKind;
    use std::fs;
    use std::time::Duration;

    #[test]
    fn test_first_load_writes_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("cfg").join(SETTINGS_FILE_NAME);

        let settings = load_app_settings(&path);

        assert!(path.exists());
        assert_eq!(settings.model, ModelKind::Mmnet);
        assert_eq!(settings.log_retention_days, 7);
    }

    #[test]
    fn test_partial_and_malformed_files() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join(SETTINGS_FILE_NAME);

        fs::write(&path, r#"{ "model": "menet", "poll_interval_ms": 10 }"#).unwrap();
        let settings = load_app_settings(&path);
        assert_eq!(settings.model, ModelKind::Menet);
        assert_eq!(settings.poll_interval(), Duration::from_millis(50));

        fs::write(&path, "{ not json").unwrap();
        assert_eq!(load_app_settings(&path).model, ModelKind::Mmnet);
    }
}
