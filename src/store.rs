use crate::settings::{self, SETTINGS_KEY, SettingsRecord};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Visibility scope of a stored option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    /// Local to one site.
    Site,
    /// Shared by every site in the network.
    Network,
}

impl Scope {
    /// Scope the host uses when the extension is (or isn't) active network-wide.
    pub fn for_deployment(network_wide: bool) -> Self {
        if network_wide {
            Self::Network
        } else {
            Self::Site
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Site => "site",
            Self::Network => "network",
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("settings store unavailable: {0}")]
    Persistence(String),
    #[error("stored settings are not valid json: {0}")]
    Serde(#[from] serde_json::Error),
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// Key-value option store holding the settings record.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn load(&self, scope: Scope) -> Result<Option<SettingsRecord>, StoreError>;
    async fn save(&self, scope: Scope, record: &SettingsRecord) -> Result<(), StoreError>;
}

#[derive(Default)]
pub struct InMemorySettingsStore {
    records: RwLock<HashMap<Scope, SettingsRecord>>,
}

impl InMemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SettingsStore for InMemorySettingsStore {
    async fn load(&self, scope: Scope) -> Result<Option<SettingsRecord>, StoreError> {
        Ok(self.records.read().await.get(&scope).cloned())
    }

    async fn save(&self, scope: Scope, record: &SettingsRecord) -> Result<(), StoreError> {
        self.records.write().await.insert(scope, record.clone());
        Ok(())
    }
}

/// Stores each scope as `{root}/{scope}/intercom-settings.json`.
pub struct FileSettingsStore {
    root: PathBuf,
}

impl FileSettingsStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn record_path(&self, scope: Scope) -> PathBuf {
        self.root
            .join(scope.as_str())
            .join(format!("{SETTINGS_KEY}.json"))
    }
}

#[async_trait]
impl SettingsStore for FileSettingsStore {
    async fn load(&self, scope: Scope) -> Result<Option<SettingsRecord>, StoreError> {
        let path = self.record_path(scope);
        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let raw = match serde_json::from_slice::<Value>(&bytes)? {
                    Value::Object(map) => map,
                    other => {
                        warn!(?path, kind = json_kind(&other), "stored settings are not a mapping");
                        Map::new()
                    }
                };
                debug!(?path, "loaded settings");
                Ok(Some(settings::validate(&raw)))
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn save(&self, scope: Scope, record: &SettingsRecord) -> Result<(), StoreError> {
        let path = self.record_path(scope);
        let bytes = serde_json::to_vec_pretty(record)?;
        let target = path.clone();
        tokio::task::spawn_blocking(move || write_atomically(&target, &bytes))
            .await
            .map_err(|e| StoreError::Persistence(e.to_string()))??;
        info!(?path, scope = scope.as_str(), "saved settings");
        Ok(())
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn write_atomically(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let dir = path
        .parent()
        .ok_or_else(|| StoreError::Persistence(format!("no parent directory for {path:?}")))?;
    std::fs::create_dir_all(dir)?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path)
        .map_err(|e| StoreError::Persistence(e.error.to_string()))?;
    Ok(())
}
