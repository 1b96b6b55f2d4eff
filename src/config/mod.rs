#![forbid(unsafe_code)]

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::error::TaskdeckError;
use crate::task::model::{Filter, SortKey};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub storage: StorageConfig,
    pub view: ViewConfig,
    pub alerts: AlertsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    #[serde(alias = "dir")]
    pub data_dir: String,
    pub key: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: "~/.local/share/taskdeck".to_owned(),
            key: "tasks".to_owned(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ViewConfig {
    pub default_filter: Filter,
    pub default_sort: SortKey,
    pub icons: bool,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            default_filter: Filter::All,
            default_sort: SortKey::Priority,
            icons: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AlertsConfig {
    #[serde(alias = "interval_secs")]
    pub sweep_interval_secs: u64,
    /// Stands in for the system notification permission.
    pub notifications: bool,
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: 3600,
            notifications: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConfigPaths {
    pub config_file: PathBuf,
}

pub fn default_paths() -> anyhow::Result<ConfigPaths> {
    if let Some(p) = std::env::var_os("TASKDECK_CONFIG") {
        return Ok(ConfigPaths {
            config_file: PathBuf::from(p),
        });
    }

    let unix = home_config_path_unix();
    if !cfg!(windows) {
        return Ok(ConfigPaths { config_file: unix });
    }

    // Windows: prefer the Unix-style path if present for portability.
    if unix.exists() {
        return Ok(ConfigPaths { config_file: unix });
    }

    let proj = ProjectDirs::from("com", "taskdeck", "taskdeck")
        .context("failed to determine platform config directory")?;
    Ok(ConfigPaths {
        config_file: proj.config_dir().join("config.toml"),
    })
}

fn home_config_path_unix() -> PathBuf {
    let home = home_dir().unwrap_or_else(|| PathBuf::from("~"));
    home.join(".config").join("taskdeck").join("config.toml")
}

fn home_dir() -> Option<PathBuf> {
    if let Some(v) = std::env::var_os("HOME") {
        return Some(PathBuf::from(v));
    }
    if let Some(v) = std::env::var_os("USERPROFILE") {
        return Some(PathBuf::from(v));
    }
    let drive = std::env::var_os("HOMEDRIVE");
    let path = std::env::var_os("HOMEPATH");
    match (drive, path) {
        (Some(d), Some(p)) => Some(PathBuf::from(d).join(PathBuf::from(p))),
        _ => None,
    }
}

#[must_use]
pub fn expand_tilde(input: &str) -> String {
    if let Some(rest) = input.strip_prefix("~/")
        && let Some(home) = home_dir()
    {
        return home.join(rest).to_string_lossy().to_string();
    }
    input.to_owned()
}

pub fn expand_path(input: &str) -> anyhow::Result<PathBuf> {
    let expanded = expand_env_vars(&expand_tilde(input));
    let p = PathBuf::from(expanded);
    if p.is_absolute() {
        return Ok(p);
    }
    let cwd = std::env::current_dir().context("failed to get current directory")?;
    Ok(cwd.join(p))
}

fn expand_env_vars(input: &str) -> String {
    // $VAR and ${VAR}; unknown vars stay as written.
    let Ok(re) = regex::Regex::new(r"\$\{?([A-Za-z_][A-Za-z0-9_]*)\}?") else {
        return input.to_owned();
    };
    re.replace_all(input, |caps: &regex::Captures<'_>| {
        let key = &caps[1];
        std::env::var(key).unwrap_or_else(|_| caps[0].to_owned())
    })
    .to_string()
}

pub fn load() -> anyhow::Result<(Config, ConfigPaths)> {
    let paths = default_paths()?;
    let (_doc, cfg) = load_from_file(&paths.config_file)?;
    cfg.validate()?;
    Ok((cfg, paths))
}

pub fn list_resolved_toml() -> anyhow::Result<String> {
    let (cfg, _paths) = load()?;
    Ok(toml::to_string_pretty(&cfg)?)
}

pub fn get_value_string(key: &str) -> anyhow::Result<Option<String>> {
    let paths = default_paths()?;
    get_value_string_at_path(&paths.config_file, key)
}

pub fn set_value_string(key: &str, value: &str) -> anyhow::Result<()> {
    let paths = default_paths()?;
    set_value_string_at_path(&paths.config_file, key, value)
}

pub fn load_from_file(path: &Path) -> anyhow::Result<(toml_edit::DocumentMut, Config)> {
    if !path.exists() {
        return Ok((toml_edit::DocumentMut::new(), Config::default()));
    }
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;

    let doc = raw
        .parse::<toml_edit::DocumentMut>()
        .with_context(|| format!("failed to parse TOML in {}", path.display()))?;

    let cfg: Config = toml::from_str(&raw)
        .with_context(|| format!("failed to deserialize TOML in {}", path.display()))?;
    Ok((doc, cfg))
}

pub fn get_value_string_at_path(path: &Path, key: &str) -> anyhow::Result<Option<String>> {
    let (_doc, cfg) = load_from_file(path)?;
    cfg.validate()?;

    let norm = normalize_key(key);
    let value = lookup_value(&cfg, &norm);
    Ok(value.map(format_value_for_stdout))
}

pub fn set_value_string_at_path(path: &Path, key: &str, value: &str) -> anyhow::Result<()> {
    let (mut doc, cfg) = load_from_file(path)?;
    cfg.validate()?;

    let (norm_key, value_item) = normalize_key_and_parse_value(key, value)?;
    apply_set(&mut doc, &norm_key, value_item)?;

    // Validate by re-parsing the updated doc into a Config.
    let new_raw = doc.to_string();
    let new_cfg: Config = toml::from_str(&new_raw)
        .with_context(|| format!("config update produced invalid TOML for {}", path.display()))?;
    new_cfg.validate()?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    std::fs::write(path, new_raw.as_bytes())
        .with_context(|| format!("failed to write {}", path.display()))?;

    Ok(())
}

impl Config {
    pub fn validate(&self) -> Result<(), TaskdeckError> {
        if self.storage.data_dir.trim().is_empty() {
            return Err(TaskdeckError::Config(
                "storage.data_dir must not be empty".to_owned(),
            ));
        }
        let key = self.storage.key.trim();
        if key.is_empty() || key.contains('/') || key.contains('\\') || key.contains("..") {
            return Err(TaskdeckError::Config(
                "storage.key must be a plain file stem".to_owned(),
            ));
        }
        if self.alerts.sweep_interval_secs == 0 {
            return Err(TaskdeckError::Config(
                "alerts.sweep_interval_secs must be >= 1".to_owned(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyType {
    Bool,
    Int,
    String,
    Enum(&'static [&'static str]),
}

fn normalize_key(key: &str) -> String {
    match key {
        "storage.dir" => "storage.data_dir",
        "alerts.interval_secs" | "alerts.interval" => "alerts.sweep_interval_secs",
        "view.filter" => "view.default_filter",
        "view.sort" => "view.default_sort",
        _ => key,
    }
    .to_owned()
}

fn normalize_key_and_parse_value(
    key: &str,
    value: &str,
) -> anyhow::Result<(String, toml_edit::Item)> {
    let norm = normalize_key(key);
    let key_type = key_type(&norm).ok_or_else(|| TaskdeckError::InvalidConfigKey(key.to_owned()))?;
    let invalid = |msg: String| TaskdeckError::InvalidConfigValue {
        key: key.to_owned(),
        msg,
    };
    let item = match key_type {
        KeyType::Bool => toml_edit::value(parse_bool(value).map_err(invalid)?),
        KeyType::Int => toml_edit::value(parse_int(value).map_err(invalid)?),
        KeyType::String => toml_edit::value(value),
        KeyType::Enum(allowed) => {
            let v = value.trim();
            if !allowed.contains(&v) {
                return Err(invalid(format!("must be one of: {}", allowed.join(", "))).into());
            }
            toml_edit::value(v)
        }
    };

    Ok((norm, item))
}

fn key_type(key: &str) -> Option<KeyType> {
    Some(match key {
        "storage.data_dir" | "storage.key" => KeyType::String,
        "view.icons" | "alerts.notifications" => KeyType::Bool,
        "alerts.sweep_interval_secs" => KeyType::Int,
        "view.default_filter" => KeyType::Enum(&["all", "completed", "pending"]),
        "view.default_sort" => KeyType::Enum(&["priority", "dueDate"]),
        _ => return None,
    })
}

fn parse_bool(s: &str) -> Result<bool, String> {
    match s.trim() {
        "true" => Ok(true),
        "false" => Ok(false),
        other => Err(format!("expected true|false, got '{other}'")),
    }
}

fn parse_int(s: &str) -> Result<i64, String> {
    s.trim()
        .parse::<i64>()
        .map_err(|e| format!("expected integer, got '{s}': {e}"))
}

fn apply_set(
    doc: &mut toml_edit::DocumentMut,
    key: &str,
    value: toml_edit::Item,
) -> anyhow::Result<()> {
    let parts: Vec<&str> = key.split('.').filter(|p| !p.is_empty()).collect();
    let Some((leaf, parents)) = parts.split_last() else {
        return Err(TaskdeckError::InvalidConfigKey(key.to_owned()).into());
    };

    let mut cur = doc.as_table_mut();
    for seg in parents {
        if !cur.contains_key(seg) {
            let mut t = toml_edit::Table::new();
            t.set_implicit(true);
            cur.insert(seg, toml_edit::Item::Table(t));
        }
        cur = cur[seg].as_table_mut().ok_or_else(|| {
            TaskdeckError::Config(format!("cannot set {key}: '{seg}' is not a table"))
        })?;
    }

    cur.insert(leaf, value);
    Ok(())
}

fn lookup_value(cfg: &Config, key: &str) -> Option<serde_json::Value> {
    let mut v = serde_json::to_value(cfg).ok()?;
    for seg in key.split('.').filter(|s| !s.is_empty()) {
        match v {
            serde_json::Value::Object(mut map) => {
                v = map.remove(seg)?;
            }
            _ => return None,
        }
    }
    Some(v)
}

fn format_value_for_stdout(v: serde_json::Value) -> String {
    match v {
        serde_json::Value::Null => "null".to_owned(),
        serde_json::Value::Bool(b) => b.to_string(),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::String(s) => s,
        other => serde_json::to_string_pretty(&other).unwrap_or_else(|_| other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn config_validation_catches_invalid_values() {
        let mut cfg = Config::default();
        cfg.alerts.sweep_interval_secs = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = Config::default();
        cfg.storage.key = "../tasks".to_owned();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[view]\ndefault_sort = \"dueDate\"\n").unwrap();
        let (_doc, cfg) = load_from_file(&path).unwrap();
        assert_eq!(cfg.view.default_sort, SortKey::DueDate);
        assert_eq!(cfg.view.default_filter, Filter::All);
        assert_eq!(cfg.alerts.sweep_interval_secs, 3600);
    }

    #[test]
    fn config_set_and_get_dot_paths() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");

        set_value_string_at_path(&path, "view.icons", "false").unwrap();
        assert_eq!(
            get_value_string_at_path(&path, "view.icons")
                .unwrap()
                .as_deref(),
            Some("false")
        );

        set_value_string_at_path(&path, "storage.dir", "~/tasks").unwrap();
        assert_eq!(
            get_value_string_at_path(&path, "storage.data_dir")
                .unwrap()
                .as_deref(),
            Some("~/tasks")
        );

        set_value_string_at_path(&path, "view.sort", "dueDate").unwrap();
        set_value_string_at_path(&path, "alerts.interval", "60").unwrap();

        let (_doc, cfg) = load_from_file(&path).unwrap();
        cfg.validate().unwrap();
        assert!(!cfg.view.icons);
        assert_eq!(cfg.storage.data_dir, "~/tasks");
        assert_eq!(cfg.view.default_sort, SortKey::DueDate);
        assert_eq!(cfg.alerts.sweep_interval_secs, 60);
    }

    #[test]
    fn config_set_rejects_bad_input() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");

        assert!(set_value_string_at_path(&path, "view.default_sort", "title").is_err());
        assert!(set_value_string_at_path(&path, "alerts.notifications", "yes").is_err());
        assert!(set_value_string_at_path(&path, "alerts.sweep_interval_secs", "0").is_err());
        assert!(set_value_string_at_path(&path, "nope.key", "1").is_err());
        assert!(!path.exists());
    }
}
