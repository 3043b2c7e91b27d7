use crate::hooks::{Attributes, ExtensionHooks};
use crate::settings::{SettingsRecord, UsernameFormat};
use crate::viewer::ViewerIdentity;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use hmac::{Hmac, Mac};
use serde_json::{Value, json};
use sha2::Sha256;
use thiserror::Error;
use tracing::warn;

/// Ordered attribute map serialized into `window.intercomSettings`.
pub type Payload = Attributes;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PayloadError {
    #[error("unparseable registration timestamp {0:?}")]
    TimestampParse(String),
}

/// Assemble the widget attributes for one viewer.
///
/// A malformed registration date drops `created_at` instead of failing the
/// whole payload.
pub fn build(settings: &SettingsRecord, viewer: &ViewerIdentity, hooks: &ExtensionHooks) -> Payload {
    let mut payload = Payload::new();
    payload.insert("app_id".into(), json!(settings.app_id));
    payload.insert("user_id".into(), json!(viewer.id));
    payload.insert("email".into(), json!(viewer.email));
    payload.insert("name".into(), json!(display_name(settings.username_format, viewer)));
    match registered_epoch(&viewer.registered) {
        Ok(ts) => {
            payload.insert("created_at".into(), json!(ts));
        }
        Err(err) => warn!(user_id = viewer.id, %err, "omitting created_at"),
    }

    if !settings.secret_key.is_empty()
        && let Some(hash) = user_hash(&settings.secret_key, viewer.id)
    {
        payload.insert("user_hash".into(), json!(hash));
    }

    let mut custom = Attributes::new();
    if settings.send_user_role
        && let Some(role) = viewer.roles.last()
    {
        custom.insert("Role".into(), json!(role));
    }
    if settings.send_user_url
        && let Some(url) = viewer.url.as_deref().filter(|u| !u.is_empty())
    {
        custom.insert("Website".into(), json!(url));
    }
    for (key, value) in hooks.custom_data(custom) {
        payload.insert(key, value);
    }

    let activator = hooks.activator_selector();
    if !activator.is_empty() {
        payload.insert("widget".into(), json!({ "activator": activator }));
    }

    if let Some(company) = hooks.company_data().filter(|c| !c.is_empty()) {
        payload.insert("company".into(), Value::Object(company));
    }

    payload
}

fn display_name(format: UsernameFormat, viewer: &ViewerIdentity) -> String {
    match format {
        UsernameFormat::FirstLast => format!("{} {}", viewer.first_name, viewer.last_name),
        UsernameFormat::DisplayName => viewer.display_name.clone(),
    }
}

/// Hex HMAC-SHA256 of the decimal user id, keyed by the secret.
pub fn user_hash(secret_key: &str, user_id: u64) -> Option<String> {
    let Ok(mut mac) = Hmac::<Sha256>::new_from_slice(secret_key.as_bytes()) else {
        return None;
    };
    mac.update(user_id.to_string().as_bytes());
    Some(hex::encode(mac.finalize().into_bytes()))
}

/// Registration timestamp in epoch seconds. Naive timestamps are UTC.
pub fn registered_epoch(registered: &str) -> Result<i64, PayloadError> {
    let raw = registered.trim();
    if let Ok(ts) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Ok(ts.and_utc().timestamp());
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.timestamp());
    }
    if let Some(ts) = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
    {
        return Ok(ts.and_utc().timestamp());
    }
    if let Ok(secs) = raw.parse::<i64>() {
        return Ok(secs);
    }
    Err(PayloadError::TimestampParse(registered.to_string()))
}
