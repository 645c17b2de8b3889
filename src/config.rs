use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Connection settings for the ServiceNow table API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceNowConfig {
    pub base_url: String,
    pub token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_query: Option<String>,
}

impl ServiceNowConfig {
    /// Both the endpoint and the bearer token are set.
    pub fn is_complete(&self) -> bool {
        !self.base_url.trim().is_empty() && !self.token.trim().is_empty()
    }

    /// Reject settings that could never produce a request.
    pub fn validate(&self) -> Result<()> {
        if !self.is_complete() {
            return Err(Error::Config("base URL and token are both required".into()));
        }
        let url = url::Url::parse(self.base_url.trim())
            .map_err(|e| Error::Config(format!("invalid base URL: {e}")))?;
        match url.scheme() {
            "http" | "https" => Ok(()),
            other => Err(Error::Config(format!("unsupported URL scheme: {other}"))),
        }
    }

    /// Token with everything but the last four characters hidden.
    pub fn masked_token(&self) -> String {
        let token = self.token.trim();
        let visible: String = token
            .chars()
            .rev()
            .take(4)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        if token.chars().count() <= 4 {
            "****".to_string()
        } else {
            format!("****{visible}")
        }
    }
}

/// Result of looking up the connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigState {
    Configured(ServiceNowConfig),
    Missing,
}

impl ConfigState {
    fn from_stored(config: Option<ServiceNowConfig>) -> Self {
        match config {
            Some(c) if c.is_complete() => ConfigState::Configured(c),
            _ => ConfigState::Missing,
        }
    }

    pub fn is_configured(&self) -> bool {
        matches!(self, ConfigState::Configured(_))
    }

    /// Convert to a `Result`, mapping absence to [`Error::MissingConfig`].
    pub fn require(self) -> Result<ServiceNowConfig> {
        match self {
            ConfigState::Configured(c) => Ok(c),
            ConfigState::Missing => Err(Error::MissingConfig),
        }
    }
}

pub type ConfigListener = Box<dyn Fn(&ConfigState) + Send + Sync>;

/// Storage for the connection settings.
///
/// Implementations notify registered listeners after every successful `save`
/// or `clear`.
pub trait ConfigProvider: Send + Sync {
    fn load(&self) -> Result<ConfigState>;
    fn save(&self, config: &ServiceNowConfig) -> Result<()>;
    fn clear(&self) -> Result<()>;
    fn on_change(&self, listener: ConfigListener);
}

#[derive(Default)]
struct Listeners(Mutex<Vec<ConfigListener>>);

impl Listeners {
    fn push(&self, listener: ConfigListener) {
        if let Ok(mut listeners) = self.0.lock() {
            listeners.push(listener);
        }
    }

    fn notify(&self, state: &ConfigState) {
        if let Ok(listeners) = self.0.lock() {
            for listener in listeners.iter() {
                listener(state);
            }
        }
    }
}

/// Settings stored as a JSON file on disk.
pub struct FileConfigStore {
    path: PathBuf,
    listeners: Listeners,
}

impl FileConfigStore {
    /// Store at the default path (`~/.incidentpulse/servicenow.json`).
    pub fn open() -> Result<Self> {
        let dir = dirs::home_dir()
            .ok_or_else(|| Error::Config("cannot determine home directory".into()))?
            .join(".incidentpulse");
        Ok(Self::at(dir.join("servicenow.json")))
    }

    /// Store at the given path. The file is created on first save.
    pub fn at(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            listeners: Listeners::default(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigProvider for FileConfigStore {
    fn load(&self) -> Result<ConfigState> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(ConfigState::Missing),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_str::<ServiceNowConfig>(&raw) {
            Ok(config) => Ok(ConfigState::from_stored(Some(config))),
            Err(e) => {
                log::error!("Failed to parse ServiceNow config at {}: {e}", self.path.display());
                Ok(ConfigState::Missing)
            }
        }
    }

    fn save(&self, config: &ServiceNowConfig) -> Result<()> {
        config.validate()?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(config)?)?;
        log::info!("Saved ServiceNow config to {}", self.path.display());
        self.listeners.notify(&ConfigState::Configured(config.clone()));
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        self.listeners.notify(&ConfigState::Missing);
        Ok(())
    }

    fn on_change(&self, listener: ConfigListener) {
        self.listeners.push(listener);
    }
}

/// Settings held in memory only.
#[derive(Default)]
pub struct MemoryConfigStore {
    config: RwLock<Option<ServiceNowConfig>>,
    listeners: Listeners,
}

impl MemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ServiceNowConfig) -> Self {
        Self {
            config: RwLock::new(Some(config)),
            listeners: Listeners::default(),
        }
    }
}

impl ConfigProvider for MemoryConfigStore {
    fn load(&self) -> Result<ConfigState> {
        let config = self
            .config
            .read()
            .map_err(|e| Error::Config(e.to_string()))?;
        Ok(ConfigState::from_stored(config.clone()))
    }

    fn save(&self, config: &ServiceNowConfig) -> Result<()> {
        config.validate()?;
        *self
            .config
            .write()
            .map_err(|e| Error::Config(e.to_string()))? = Some(config.clone());
        self.listeners.notify(&ConfigState::Configured(config.clone()));
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self
            .config
            .write()
            .map_err(|e| Error::Config(e.to_string()))? = None;
        self.listeners.notify(&ConfigState::Missing);
        Ok(())
    }

    fn on_change(&self, listener: ConfigListener) {
        self.listeners.push(listener);
    }
}
