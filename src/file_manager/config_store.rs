// Per-phenotype hyperparameter store (ESN.json, MMNet.json / MENet.json)
//
// Each file is a top-level object keyed by phenotype name. Reads never fail:
// a missing or malformed file yields the built-in defaults.

use super::json_ops::{read_json_file_or_default, write_json_file};
use crate::error::Result;
use crate::models::{int_field, EsnSetting, JobSetting, ModelKind, NetSetting, DEFAULT_SAVED_EPOCHS};
use crate::utils::WorkspaceLayout;
use log::info;
use serde::Serialize;
use serde_json::{Map, Value};
use std::path::Path;

pub type ConfigObject = Map<String, Value>;

pub fn load_config_object(path: &Path) -> ConfigObject {
    read_json_file_or_default(path)
}

/// Current settings for a phenotype, used to pre-fill its dialog
pub fn load_setting(layout: &WorkspaceLayout, model: ModelKind, phenotype: &str) -> JobSetting {
    let esn = load_config_object(&layout.esn_config_path());
    let net = load_config_object(&layout.model_config_path(model));

    JobSetting {
        esn: EsnSetting::from_json(esn.get(phenotype)),
        net: NetSetting::from_json(net.get(phenotype)),
    }
}

/// Epoch budget (`saved`) for a phenotype; 100 when absent or invalid
pub fn read_saved_epochs(config_path: &Path, phenotype: &str) -> u32 {
    load_config_object(config_path)
        .get(phenotype)
        .and_then(Value::as_object)
        .map(|obj| int_field(obj, "saved", DEFAULT_SAVED_EPOCHS))
        .unwrap_or(DEFAULT_SAVED_EPOCHS)
}

fn merge_section<T: Serialize>(config: &mut ConfigObject, phenotype: &str, section: &T) -> Result<()> {
    let fields = serde_json::to_value(section)?;
    let entry = config
        .entry(phenotype.to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    if !entry.is_object() {
        *entry = Value::Object(Map::new());
    }
    if let (Some(target), Value::Object(fields)) = (entry.as_object_mut(), fields) {
        for (key, value) in fields {
            target.insert(key, value);
        }
    }
    Ok(())
}

/// Write all settings of a run back, one rewrite per config file.
/// Later entries for the same phenotype win; unrelated keys are preserved.
pub fn persist_settings(
    layout: &WorkspaceLayout,
    model: ModelKind,
    settings: &[(String, JobSetting)],
) -> Result<()> {
    if settings.is_empty() {
        return Ok(());
    }

    let esn_path = layout.esn_config_path();
    let net_path = layout.model_config_path(model);
    let mut esn = load_config_object(&esn_path);
    let mut net = load_config_object(&net_path);

    for (phenotype, setting) in settings {
        merge_section(&mut esn, phenotype, &setting.esn)?;
        merge_section(&mut net, phenotype, &setting.net)?;
    }

    write_json_file(&esn_path, &esn)?;
    write_json_file(&net_path, &net)?;

    info!(
        "Saved settings for {} phenotype(s) to {:?} and {:?}",
        settings.len(),
        esn_path,
        net_path
    );
    Ok(())
}
