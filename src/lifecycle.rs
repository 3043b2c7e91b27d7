use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;
use tracing::info;

pub struct Capability;

impl Capability {
    /// Viewers holding this are never tracked.
    pub const HIDE_FROM_TRACKING: &'static str = "hide_from_intercom";
    pub const MANAGE_OPTIONS: &'static str = "manage_options";
    pub const MANAGE_NETWORK_OPTIONS: &'static str = "manage_network_options";
}

pub const ADMINISTRATOR_ROLE: &str = "administrator";

/// Role -> capability table. Stands in for the host's role store.
#[derive(Debug, Default)]
pub struct RoleCapabilities {
    roles: RwLock<HashMap<String, HashSet<String>>>,
}

impl RoleCapabilities {
    /// Administrators manage options; nobody is hidden until activation.
    pub fn with_defaults() -> Self {
        let admin: HashSet<String> = [Capability::MANAGE_OPTIONS, Capability::MANAGE_NETWORK_OPTIONS]
            .into_iter()
            .map(String::from)
            .collect();
        Self {
            roles: RwLock::new(HashMap::from([(ADMINISTRATOR_ROLE.to_string(), admin)])),
        }
    }

    pub async fn grant(&self, role: &str, capability: &str) {
        self.roles
            .write()
            .await
            .entry(role.to_string())
            .or_default()
            .insert(capability.to_string());
    }

    pub async fn revoke(&self, role: &str, capability: &str) {
        if let Some(caps) = self.roles.write().await.get_mut(role) {
            caps.remove(capability);
        }
    }

    pub async fn role_has(&self, role: &str, capability: &str) -> bool {
        self.roles
            .read()
            .await
            .get(role)
            .is_some_and(|caps| caps.contains(capability))
    }

    pub async fn any_role_has(&self, roles: &[String], capability: &str) -> bool {
        let table = self.roles.read().await;
        roles
            .iter()
            .filter_map(|r| table.get(r))
            .any(|caps| caps.contains(capability))
    }

    /// Activation hook: hide administrators from tracking.
    pub async fn activate(&self) {
        self.grant(ADMINISTRATOR_ROLE, Capability::HIDE_FROM_TRACKING)
            .await;
        info!(role = ADMINISTRATOR_ROLE, "granted hide-from-tracking capability");
    }

    /// Deactivation hook: undo [`Self::activate`].
    pub async fn deactivate(&self) {
        self.revoke(ADMINISTRATOR_ROLE, Capability::HIDE_FROM_TRACKING)
            .await;
        info!(role = ADMINISTRATOR_ROLE, "revoked hide-from-tracking capability");
    }
}
