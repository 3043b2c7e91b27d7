use crate::gate::{Surface, should_render};
use crate::hooks::ExtensionHooks;
use crate::payload;
use crate::render::{self, RenderError};
use crate::settings::{self, SettingsRecord};
use crate::store::{Scope, SettingsStore, StoreError};
use crate::viewer::Viewer;
use serde_json::{Map, Value};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum InstallError {
    #[error("application id has not been configured")]
    ConfigurationIncomplete,
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Render(#[from] RenderError),
}

/// `Err(ConfigurationIncomplete)` until an application id has been saved.
pub fn ensure_configured(record: &SettingsRecord) -> Result<(), InstallError> {
    if record.is_configured() {
        Ok(())
    } else {
        Err(InstallError::ConfigurationIncomplete)
    }
}

/// Wires the store, hooks and renderer together. Holds no per-request state;
/// build one at startup and share it.
#[derive(Clone)]
pub struct Installer {
    store: Arc<dyn SettingsStore>,
    hooks: Arc<ExtensionHooks>,
    scope: Scope,
    version: String,
    widget_base_url: String,
}

impl Installer {
    pub fn new(
        store: Arc<dyn SettingsStore>,
        hooks: Arc<ExtensionHooks>,
        network_wide: bool,
        widget_base_url: impl Into<String>,
    ) -> Self {
        Self {
            store,
            hooks,
            scope: Scope::for_deployment(network_wide),
            version: env!("CARGO_PKG_VERSION").to_string(),
            widget_base_url: widget_base_url.into(),
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Stored settings, or defaults when nothing was saved yet.
    pub async fn settings(&self) -> Result<SettingsRecord, InstallError> {
        Ok(self.store.load(self.scope).await?.unwrap_or_default())
    }

    /// Validate a submitted form mapping and persist the result.
    pub async fn save(&self, raw: &Map<String, Value>) -> Result<SettingsRecord, InstallError> {
        let record = settings::validate(raw);
        self.store.save(self.scope, &record).await?;
        info!(
            scope = ?self.scope,
            configured = record.is_configured(),
            secure = !record.secret_key.is_empty(),
            "settings updated"
        );
        Ok(record)
    }

    /// Install code for this viewer, or `None` when it must not be emitted.
    pub async fn install_code(
        &self,
        viewer: &Viewer,
        surface: Surface,
    ) -> Result<Option<String>, InstallError> {
        let record = self.settings().await?;
        if !should_render(viewer, &record, surface) {
            debug!(?surface, "install code suppressed");
            return Ok(None);
        }
        let Some(identity) = viewer.identity.as_ref() else {
            return Ok(None);
        };
        let payload = payload::build(&record, identity, &self.hooks);
        let html = render::render(&payload, &record.app_id, &self.version, &self.widget_base_url)?;
        Ok(Some(html))
    }

    /// `html` with the install code appended to its body when permitted.
    pub async fn render_page(
        &self,
        html: &str,
        viewer: &Viewer,
        surface: Surface,
    ) -> Result<String, InstallError> {
        match self.install_code(viewer, surface).await? {
            Some(fragment) => Ok(render::inject_install_code(html, &fragment)?),
            None => Ok(html.to_string()),
        }
    }
}
