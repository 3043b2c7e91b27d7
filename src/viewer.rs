use crate::lifecycle::{Capability, RoleCapabilities};
use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Logged-in user as the host knows it for the current request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewerIdentity {
    pub id: u64,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    /// Registration timestamp as stored by the host, e.g. `2013-04-01 09:30:00`.
    #[serde(default)]
    pub registered: String,
    /// Roles in the host's enumeration order.
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub url: Option<String>,
}

/// Request viewer with capabilities already resolved by the host.
#[derive(Debug, Clone, Default)]
pub struct Viewer {
    pub identity: Option<ViewerIdentity>,
    pub hidden_from_tracking: bool,
    pub can_manage_options: bool,
    pub can_manage_network_options: bool,
}

impl Viewer {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn is_authenticated(&self) -> bool {
        self.identity.is_some()
    }

    /// Whether this viewer may edit the settings record. A network-wide
    /// deployment needs the network capability.
    pub fn can_manage_settings(&self, network_wide: bool) -> bool {
        if network_wide {
            self.can_manage_network_options
        } else {
            self.can_manage_options
        }
    }

    /// Resolve capability flags for `identity` against the role table.
    pub async fn resolve(identity: ViewerIdentity, roles: &RoleCapabilities) -> Self {
        let hidden_from_tracking = roles
            .any_role_has(&identity.roles, Capability::HIDE_FROM_TRACKING)
            .await;
        let can_manage_options = roles
            .any_role_has(&identity.roles, Capability::MANAGE_OPTIONS)
            .await;
        let can_manage_network_options = roles
            .any_role_has(&identity.roles, Capability::MANAGE_NETWORK_OPTIONS)
            .await;
        Self {
            identity: Some(identity),
            hidden_from_tracking,
            can_manage_options,
            can_manage_network_options,
        }
    }
}

/// Lookup of known users by id.
#[async_trait]
pub trait ViewerDirectory: Send + Sync {
    async fn find(&self, user_id: u64) -> Option<ViewerIdentity>;
}

#[derive(Debug, Default, Clone)]
pub struct StaticViewerDirectory {
    users: HashMap<u64, ViewerIdentity>,
}

impl StaticViewerDirectory {
    pub fn new(users: impl IntoIterator<Item = ViewerIdentity>) -> Self {
        Self {
            users: users.into_iter().map(|u| (u.id, u)).collect(),
        }
    }

    /// Load a JSON array of users.
    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading viewers {:?}", path))?;
        let users: Vec<ViewerIdentity> = serde_json::from_str(&contents)
            .with_context(|| format!("parsing viewers {:?}", path))?;
        tracing::info!(count = users.len(), ?path, "loaded viewer directory");
        Ok(Self::new(users))
    }
}

#[async_trait]
impl ViewerDirectory for StaticViewerDirectory {
    async fn find(&self, user_id: u64) -> Option<ViewerIdentity> {
        self.users.get(&user_id).cloned()
    }
}
