// Hyperparameter and application settings models
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_BATCH_SIZE: u32 = 128;
pub const DEFAULT_SAVED_EPOCHS: u32 = 100;
pub const DEFAULT_WEIGHT_DECAY: f64 = 1e-5;

const BATCH_SIZE_RANGE: (u32, u32) = (1, 100_000);
const SAVED_RANGE: (u32, u32) = (1, 10_000);

/// Network trained in the second training phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    #[default]
    Mmnet,
    Menet,
}

impl ModelKind {
    pub fn label(&self) -> &'static str {
        match self {
            ModelKind::Mmnet => "MMNet",
            ModelKind::Menet => "MENet",
        }
    }

    pub fn train_exe_stem(&self) -> &'static str {
        match self {
            ModelKind::Mmnet => "train_mmnet",
            ModelKind::Menet => "train_menet",
        }
    }

    pub fn config_file_name(&self) -> String {
        format!("{}.json", self.label())
    }
}

/// ESN section, stored in ESN.json
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EsnSetting {
    #[serde(rename = "batch size")]
    pub batch_size: u32,
    pub p: f64,
    pub saved: u32,
}

impl Default for EsnSetting {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            p: 0.8,
            saved: DEFAULT_SAVED_EPOCHS,
        }
    }
}

/// MMNet / MENet section, stored in MMNet.json or MENet.json
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NetSetting {
    #[serde(rename = "batch size")]
    pub batch_size: u32,
    pub p1: f64,
    pub p2: f64,
    pub p3: f64,
    pub p4: f64,
    pub saved: u32,
    pub wd: f64,
}

impl Default for NetSetting {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            p1: 0.8,
            p2: 0.8,
            p3: 0.8,
            p4: 0.6,
            saved: DEFAULT_SAVED_EPOCHS,
            wd: DEFAULT_WEIGHT_DECAY,
        }
    }
}

/// Positive integer field; integral floats such as `50.0` are accepted
pub fn int_field(obj: &Map<String, Value>, key: &str, fallback: u32) -> u32 {
    obj.get(key)
        .and_then(|v| v.as_i64().or_else(|| v.as_f64().map(|f| f as i64)))
        .filter(|v| *v > 0)
        .and_then(|v| u32::try_from(v).ok())
        .unwrap_or(fallback)
}

fn float_field(obj: &Map<String, Value>, key: &str, fallback: f64) -> f64 {
    obj.get(key)
        .and_then(Value::as_f64)
        .filter(|v| v.is_finite())
        .unwrap_or(fallback)
}

impl EsnSetting {
    /// Field-by-field read; anything missing or mistyped keeps its default
    pub fn from_json(value: Option<&Value>) -> Self {
        let d = Self::default();
        match value.and_then(Value::as_object) {
            Some(obj) => Self {
                batch_size: int_field(obj, "batch size", d.batch_size),
                p: float_field(obj, "p", d.p),
                saved: int_field(obj, "saved", d.saved),
            },
            None => d,
        }
    }
}

impl NetSetting {
    pub fn from_json(value: Option<&Value>) -> Self {
        let d = Self::default();
        match value.and_then(Value::as_object) {
            Some(obj) => Self {
                batch_size: int_field(obj, "batch size", d.batch_size),
                p1: float_field(obj, "p1", d.p1),
                p2: float_field(obj, "p2", d.p2),
                p3: float_field(obj, "p3", d.p3),
                p4: float_field(obj, "p4", d.p4),
                saved: int_field(obj, "saved", d.saved),
                wd: float_field(obj, "wd", d.wd),
            },
            None => d,
        }
    }
}

/// Per-phenotype hyperparameters collected by the settings dialog
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct JobSetting {
    pub esn: EsnSetting,
    pub net: NetSetting,
}

impl JobSetting {
    /// Clamp every field into the range the settings dialog accepts
    pub fn normalized(mut self) -> Self {
        let clamp_int = |v: u32, (lo, hi): (u32, u32)| v.clamp(lo, hi);
        let clamp_unit = |v: f64| if v.is_finite() { v.clamp(0.0, 1.0) } else { 0.0 };

        self.esn.batch_size = clamp_int(self.esn.batch_size, BATCH_SIZE_RANGE);
        self.esn.p = clamp_unit(self.esn.p);
        self.esn.saved = clamp_int(self.esn.saved, SAVED_RANGE);

        self.net.batch_size = clamp_int(self.net.batch_size, BATCH_SIZE_RANGE);
        self.net.p1 = clamp_unit(self.net.p1);
        self.net.p2 = clamp_unit(self.net.p2);
        self.net.p3 = clamp_unit(self.net.p3);
        self.net.p4 = clamp_unit(self.net.p4);
        self.net.saved = clamp_int(self.net.saved, SAVED_RANGE);
        self.net.wd = clamp_unit(self.net.wd);
        self
    }
}

/// One editable field of the settings dialog
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingField {
    EsnBatchSize,
    EsnP,
    EsnSaved,
    NetBatchSize,
    NetP1,
    NetP2,
    NetP3,
    NetP4,
    NetSaved,
    NetWd,
}

impl SettingField {
    pub const ALL: [SettingField; 10] = [
        SettingField::EsnBatchSize,
        SettingField::EsnP,
        SettingField::EsnSaved,
        SettingField::NetBatchSize,
        SettingField::NetP1,
        SettingField::NetP2,
        SettingField::NetP3,
        SettingField::NetP4,
        SettingField::NetSaved,
        SettingField::NetWd,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            SettingField::EsnBatchSize => "ESN batch size",
            SettingField::EsnP => "ESN p",
            SettingField::EsnSaved => "ESN saved (epoch)",
            SettingField::NetBatchSize => "net batch size",
            SettingField::NetP1 => "net p1",
            SettingField::NetP2 => "net p2",
            SettingField::NetP3 => "net p3",
            SettingField::NetP4 => "net p4",
            SettingField::NetSaved => "net saved (epoch)",
            SettingField::NetWd => "net wd",
        }
    }

    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            SettingField::EsnBatchSize
                | SettingField::EsnSaved
                | SettingField::NetBatchSize
                | SettingField::NetSaved
        )
    }

    pub fn get(&self, setting: &JobSetting) -> f64 {
        match self {
            SettingField::EsnBatchSize => setting.esn.batch_size as f64,
            SettingField::EsnP => setting.esn.p,
            SettingField::EsnSaved => setting.esn.saved as f64,
            SettingField::NetBatchSize => setting.net.batch_size as f64,
            SettingField::NetP1 => setting.net.p1,
            SettingField::NetP2 => setting.net.p2,
            SettingField::NetP3 => setting.net.p3,
            SettingField::NetP4 => setting.net.p4,
            SettingField::NetSaved => setting.net.saved as f64,
            SettingField::NetWd => setting.net.wd,
        }
    }

    /// Parse user input into the field; the caller normalizes afterwards
    pub fn set_from_str(&self, setting: &mut JobSetting, input: &str) -> Result<(), String> {
        let input = input.trim();
        if self.is_integer() {
            let value: u32 = input
                .parse()
                .map_err(|_| format!("{}: expected a whole number, got {:?}", self.label(), input))?;
            match self {
                SettingField::EsnBatchSize => setting.esn.batch_size = value,
                SettingField::EsnSaved => setting.esn.saved = value,
                SettingField::NetBatchSize => setting.net.batch_size = value,
                SettingField::NetSaved => setting.net.saved = value,
                _ => unreachable!("integer fields are matched above"),
            }
        } else {
            let value: f64 = input
                .parse()
                .map_err(|_| format!("{}: expected a number, got {:?}", self.label(), input))?;
            match self {
                SettingField::EsnP => setting.esn.p = value,
                SettingField::NetP1 => setting.net.p1 = value,
                SettingField::NetP2 => setting.net.p2 = value,
                SettingField::NetP3 => setting.net.p3 = value,
                SettingField::NetP4 => setting.net.p4 = value,
                SettingField::NetWd => setting.net.wd = value,
                _ => unreachable!("float fields are matched above"),
            }
        }
        Ok(())
    }

    /// Render like the dialog's spin boxes: no trailing zeros
    pub fn format(&self, setting: &JobSetting) -> String {
        let value = self.get(setting);
        if self.is_integer() {
            return format!("{}", value as u64);
        }
        let decimals = if *self == SettingField::NetWd { 8 } else { 4 };
        let text = format!("{:.*}", decimals, value);
        let text = text.trim_end_matches('0').trim_end_matches('.');
        if text.is_empty() {
            "0".to_string()
        } else {
            text.to_string()
        }
    }
}

pub const MIN_POLL_INTERVAL_MS: u64 = 50;
pub const DEFAULT_LOG_RETENTION_DAYS: u64 = 7;
pub const MAX_POLL_INTERVAL_MS: u64 = 500;

/// Application settings, read from studio.json
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSettings {
    #[serde(default)]
    pub workspace_root: Option<PathBuf>,
    #[serde(default)]
    pub model: ModelKind,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_log_retention_days")]
    pub log_retention_days: u64,
}

fn default_poll_interval_ms() -> u64 {
    MAX_POLL_INTERVAL_MS
}

fn default_log_retention_days() -> u64 {
    DEFAULT_LOG_RETENTION_DAYS
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            workspace_root: None,
            model: ModelKind::default(),
            poll_interval_ms: default_poll_interval_ms(),
            log_retention_days: default_log_retention_days(),
        }
    }
}

impl AppSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(
            self.poll_interval_ms
                .clamp(MIN_POLL_INTERVAL_MS, MAX_POLL_INTERVAL_MS),
        )
    }
}
