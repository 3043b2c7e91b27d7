use crate::render::DEFAULT_WIDGET_BASE_URL;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Runtime configuration for the install-code host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
    /// Directory for the file-backed settings store; in-memory when unset.
    #[serde(default)]
    pub settings_path: Option<PathBuf>,
    /// Whether the extension is active for the whole network.
    #[serde(default)]
    pub network_wide: bool,
    #[serde(default = "default_pages_root")]
    pub pages_root: PathBuf,
    #[serde(default)]
    pub viewers_path: Option<PathBuf>,
    #[serde(default = "default_widget_base_url")]
    pub widget_base_url: String,
    #[serde(default)]
    pub enable_cors: bool,
    /// Key for signing viewer cookies; a random per-process key when unset.
    #[serde(default)]
    pub session_secret: Option<String>,
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

fn default_pages_root() -> PathBuf {
    PathBuf::from("pages")
}

fn default_widget_base_url() -> String {
    DEFAULT_WIDGET_BASE_URL.to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            settings_path: None,
            network_wide: false,
            pages_root: default_pages_root(),
            viewers_path: None,
            widget_base_url: default_widget_base_url(),
            enable_cors: false,
            session_secret: None,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let bind_addr: SocketAddr = std::env::var("BIND_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:8080".to_string())
            .parse()
            .context("failed to parse BIND_ADDR")?;

        let settings_path = std::env::var("SETTINGS_PATH").ok().map(PathBuf::from);
        let network_wide = env_flag("NETWORK_WIDE");
        let pages_root =
            PathBuf::from(std::env::var("PAGES_ROOT").unwrap_or_else(|_| "pages".to_string()));
        let viewers_path = std::env::var("VIEWERS_PATH").ok().map(PathBuf::from);
        let widget_base_url =
            std::env::var("WIDGET_BASE_URL").unwrap_or_else(|_| default_widget_base_url());
        let enable_cors = env_flag("ENABLE_CORS");
        let session_secret = std::env::var("SESSION_SECRET").ok().filter(|s| !s.is_empty());

        Ok(Self {
            bind_addr,
            settings_path,
            network_wide,
            pages_root,
            viewers_path,
            widget_base_url,
            enable_cors,
            session_secret,
        })
    }

    /// Load from a TOML file; missing keys take the same defaults as the env loader.
    pub fn from_toml_file(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {:?}", path))?;
        toml::from_str(&contents).with_context(|| format!("parsing config {:?}", path))
    }
}

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}
