use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::LazyLock;

/// Name of the single persisted options record.
pub const SETTINGS_KEY: &str = "intercom-settings";

/// Form/storage field names.
pub struct SettingsFields;

impl SettingsFields {
    pub const APP_ID: &'static str = "app-id";
    pub const SECRET_KEY: &'static str = "secure";
    pub const USERNAME: &'static str = "username";
    pub const SEND_USER_ROLE: &'static str = "send-user-role";
    pub const SEND_USER_URL: &'static str = "send-user-url";
    pub const SHOW_IN_ADMIN: &'static str = "show-in-admin";
}

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").expect("valid tag regex"));

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum UsernameFormat {
    #[default]
    #[serde(rename = "firstlast")]
    FirstLast,
    #[serde(rename = "display")]
    DisplayName,
}

impl UsernameFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FirstLast => "firstlast",
            Self::DisplayName => "display",
        }
    }

    fn from_plain_text(value: &str) -> Self {
        if value == "firstlast" {
            Self::FirstLast
        } else {
            Self::DisplayName
        }
    }
}

/// Canonical, validated widget settings.
/// Not `Deserialize`: stored mappings are read back through [`validate`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SettingsRecord {
    #[serde(rename = "app-id")]
    pub app_id: String,
    #[serde(rename = "secure")]
    pub secret_key: String,
    #[serde(rename = "username")]
    pub username_format: UsernameFormat,
    #[serde(rename = "send-user-role", serialize_with = "int_flag")]
    pub send_user_role: bool,
    #[serde(rename = "send-user-url", serialize_with = "int_flag")]
    pub send_user_url: bool,
    #[serde(rename = "show-in-admin", serialize_with = "int_flag")]
    pub show_in_admin: bool,
}

impl SettingsRecord {
    /// True once an application id has been entered.
    pub fn is_configured(&self) -> bool {
        !self.app_id.is_empty()
    }

    /// Raw mapping in the same shape the admin form submits.
    pub fn to_raw(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }
}

/// Sanitize an arbitrary submitted mapping into a settings record.
///
/// Total over any input: missing keys and malformed values fall back to
/// defaults instead of producing an error.
pub fn validate(raw: &Map<String, Value>) -> SettingsRecord {
    let username_format = raw
        .get(SettingsFields::USERNAME)
        .filter(|v| !v.is_null())
        .map(|v| UsernameFormat::from_plain_text(&plain_text(v)))
        .unwrap_or_default();

    SettingsRecord {
        app_id: raw.get(SettingsFields::APP_ID).map(plain_text).unwrap_or_default(),
        secret_key: raw
            .get(SettingsFields::SECRET_KEY)
            .map(plain_text)
            .unwrap_or_default(),
        username_format,
        send_user_role: positive_int(raw.get(SettingsFields::SEND_USER_ROLE)),
        send_user_url: positive_int(raw.get(SettingsFields::SEND_USER_URL)),
        show_in_admin: positive_int(raw.get(SettingsFields::SHOW_IN_ADMIN)),
    }
}

/// Strip markup from a submitted value, leaving trimmed plain text.
pub fn strip_markup(input: &str) -> String {
    let without_tags = TAG_RE.replace_all(input, "");
    without_tags
        .chars()
        .filter(|c| *c != '<' && *c != '>')
        .collect::<String>()
        .trim()
        .to_string()
}

fn plain_text(value: &Value) -> String {
    match value {
        Value::String(s) => strip_markup(s),
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    }
}

fn positive_int(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n
            .as_i64()
            .map(|v| v > 0)
            .or_else(|| n.as_u64().map(|v| v > 0))
            .unwrap_or(false),
        Some(Value::String(s)) => {
            let s = s.trim();
            let digits = s.strip_prefix('+').unwrap_or(s);
            !digits.is_empty()
                && digits.bytes().all(|b| b.is_ascii_digit())
                && digits.bytes().any(|b| b != b'0')
        }
        _ => false,
    }
}

/// Booleans persist as `0`/`1`, matching what the checkbox form posts.
fn int_flag<S: serde::Serializer>(flag: &bool, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u8(u8::from(*flag))
}
