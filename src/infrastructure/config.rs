use crate::application::detection::SuppressionKind;
use crate::application::entity_service::EntityStore;
use crate::application::scan_request::ScanDefaults;
use crate::domain::entity::{default_entities, EntityBound};
use crate::domain::time_range::{RelativeTime, TimeRange};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const DEFAULT_CONFIG_PATH: &str = "config/cleaner.toml";

const DEFAULTS: &str = r#"
[influx]
host = "localhost"
port = 8086
username = "admin"
password = "admin"
database = "default"

[server]
bind = "0.0.0.0:8080"

[detection]
suppression = "continuation"
context_size = 2
start = "-200d"
end = "0d"
"#;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CleanerConfig {
    pub influx: InfluxSettings,
    pub server: ServerSettings,
    pub detection: DetectionConfig,
    #[serde(default)]
    pub entities: BTreeMap<String, EntityBound>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct InfluxSettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub database: String,
    /// Replaces basic auth when set.
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub retention_policy: Option<String>,
    #[serde(default)]
    pub org: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerSettings {
    pub bind: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DetectionConfig {
    pub suppression: SuppressionKind,
    pub context_size: usize,
    pub start: RelativeTime,
    pub end: RelativeTime,
}

impl DetectionConfig {
    pub fn scan_defaults(&self) -> ScanDefaults {
        ScanDefaults {
            context_size: self.context_size,
            range: TimeRange::new(self.start.clone(), self.end.clone()),
        }
    }
}

/// `CLEANER_CONFIG` overrides the default location.
pub fn config_path() -> PathBuf {
    std::env::var_os("CLEANER_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Built-in defaults, then the file if present, then `CLEANER__SECTION__KEY` variables.
pub fn load_cleaner_config(path: &Path) -> anyhow::Result<CleanerConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::from_str(DEFAULTS, config::FileFormat::Toml))
        .add_source(config::File::new(&path.to_string_lossy(), config::FileFormat::Toml).required(false))
        .add_source(
            config::Environment::with_prefix("CLEANER")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let mut config: CleanerConfig = settings.try_deserialize()?;
    if config.entities.is_empty() {
        tracing::info!("No entities configured in {}, using defaults", path.display());
        config.entities = default_entities();
    }
    for (id, bound) in &config.entities {
        bound
            .validate()
            .with_context(|| format!("entity {} in {}", id, path.display()))?;
    }

    Ok(config)
}

/// Rewrites the `entities` table of the config file, leaving other sections as they are.
pub struct TomlEntityStore {
    path: PathBuf,
}

impl TomlEntityStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl EntityStore for TomlEntityStore {
    fn save(&self, entities: &BTreeMap<String, EntityBound>) -> anyhow::Result<()> {
        let mut document = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw
                .parse::<toml::Table>()
                .with_context(|| format!("Failed to parse {}", self.path.display()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => toml::Table::new(),
            Err(e) => return Err(e).context("Failed to read config file"),
        };
        document.insert("entities".to_string(), toml::Value::try_from(entities)?);

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, toml::to_string_pretty(&document)?)
            .with_context(|| format!("Failed to write {}", self.path.display()))?;
        Ok(())
    }
}
