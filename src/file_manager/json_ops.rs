// Atomic JSON file operations

use crate::error::{Result, StudioError};
use parking_lot::Mutex;
use serde::{de::DeserializeOwned, Serialize};
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

lazy_static::lazy_static! {
    static ref FILE_LOCK: Mutex<()> = Mutex::new(());
}

pub fn read_json_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let _lock = FILE_LOCK.lock();

    let contents = fs::read_to_string(path).map_err(|e| StudioError::io(path, e))?;

    serde_json::from_str(&contents).map_err(|e| StudioError::ConfigParse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Writes pretty-printed JSON atomically using write-to-temp-then-rename
pub fn write_json_file<T: Serialize>(path: &Path, data: &T) -> Result<()> {
    let _lock = FILE_LOCK.lock();

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| StudioError::io(parent, e))?;
    }

    let json_string = serde_json::to_string_pretty(data)?;

    let temp_path = path.with_extension("tmp");

    let mut temp_file = File::create(&temp_path).map_err(|e| StudioError::io(&temp_path, e))?;

    temp_file
        .write_all(json_string.as_bytes())
        .map_err(|e| StudioError::io(&temp_path, e))?;

    temp_file
        .sync_all()
        .map_err(|e| StudioError::io(&temp_path, e))?;

    fs::rename(&temp_path, path).map_err(|e| StudioError::io(path, e))?;

    Ok(())
}

pub fn initialize_json_file<T: Serialize>(path: &Path, default: &T) -> Result<()> {
    if !path.exists() {
        log::debug!("Initializing JSON file: {:?}", path);
        write_json_file(path, default)?;
    }
    Ok(())
}

/// Missing file means defaults; a malformed one is logged and also means defaults
pub fn read_json_file_or_default<T: DeserializeOwned + Default>(path: &Path) -> T {
    if !path.exists() {
        return T::default();
    }
    match read_json_file(path) {
        Ok(data) => data,
        Err(e) => {
            log::warn!("{}; falling back to defaults", e);
            T::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    #[test]
    fn test_write_then_read_back() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("data.json");

        write_json_file(&path, &json!({ "height": { "saved": 50 } })).unwrap();
        let value: Value = read_json_file(&path).unwrap();

        assert_eq!(value["height"]["saved"], 50);
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn test_output_is_pretty_printed() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("data.json");
        write_json_file(&path, &json!({ "a": { "b": 1 } })).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains('\n'));
    }

    #[test]
    fn test_malformed_file_is_config_parse_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("broken.json");
        fs::write(&path, "{ not json").unwrap();

        let result: Result<Value> = read_json_file(&path);
        assert!(matches!(result, Err(StudioError::ConfigParse { .. })));

        let fallback: serde_json::Map<String, Value> = read_json_file_or_default(&path);
        assert!(fallback.is_empty());
    }

    #[test]
    fn test_initialize_keeps_existing_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("data.json");
        write_json_file(&path, &json!({ "keep": true })).unwrap();

        initialize_json_file(&path, &json!({})).unwrap();
        let value: Value = read_json_file(&path).unwrap();
        assert_eq!(value["keep"], true);
    }
}
