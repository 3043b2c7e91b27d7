//! Admin settings page, form decoding and notices.

use crate::install::{InstallError, ensure_configured};
use crate::settings::{SETTINGS_KEY, SettingsFields, SettingsRecord, UsernameFormat};
use serde_json::{Map, Value};
use std::collections::HashMap;

pub const SETTINGS_PAGE_PATH: &str = "/admin/settings";
pub const SETTINGS_PAGE_SLUG: &str = "intercom";
pub const NONCE_FIELD: &str = "_nonce";
pub const SUBMIT_FIELD: &str = "intercom-settings-submit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoticeKind {
    Updated,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub id: &'static str,
    pub kind: NoticeKind,
    pub html: String,
}

impl Notice {
    pub fn to_html(&self) -> String {
        let class = match self.kind {
            NoticeKind::Updated => "updated",
            NoticeKind::Error => "error",
        };
        format!(
            "<div class=\"{class}\" id=\"{}\"><p>{}</p></div>\n",
            self.id, self.html
        )
    }
}

/// Where the admin is and what they can do, for notice selection.
#[derive(Debug, Clone, Copy, Default)]
pub struct AdminContext {
    pub on_settings_page: bool,
    pub updated: bool,
    pub can_manage_options: bool,
    pub network_admin: bool,
}

pub fn notices(ctx: AdminContext, settings: &SettingsRecord) -> Vec<Notice> {
    let mut out = Vec::new();
    if ctx.on_settings_page && ctx.updated {
        out.push(Notice {
            id: "intercom-updated",
            kind: NoticeKind::Updated,
            html: "Settings saved.".to_string(),
        });
    }
    if !ctx.can_manage_options || ctx.network_admin {
        return out;
    }
    let Err(InstallError::ConfigurationIncomplete) = ensure_configured(settings) else {
        return out;
    };
    let ask = if ctx.on_settings_page {
        "Please enter your Intercom application ID".to_string()
    } else {
        format!(
            "Please <a href=\"{SETTINGS_PAGE_PATH}?page={SETTINGS_PAGE_SLUG}\">configure the Intercom settings</a>"
        )
    };
    out.push(Notice {
        id: "intercom-notice",
        kind: NoticeKind::Error,
        html: format!("<strong>Intercom needs some attention</strong>. {ask} to start tracking your users."),
    });
    out
}

/// Pull `intercom-settings[field]` entries out of a decoded form body.
pub fn form_to_raw(form: &HashMap<String, String>) -> Map<String, Value> {
    form.iter()
        .filter_map(|(name, value)| {
            let field = name
                .strip_prefix(SETTINGS_KEY)?
                .strip_prefix('[')?
                .strip_suffix(']')?;
            Some((field.to_string(), Value::String(value.clone())))
        })
        .collect()
}

fn escape_attr(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

fn checked(on: bool) -> &'static str {
    if on { " checked='checked'" } else { "" }
}

fn text_row(label: &str, field: &str, value: &str) -> String {
    format!(
        "<tr valign=\"top\"><th scope=\"row\">{label}</th><td><input name=\"{SETTINGS_KEY}[{field}]\" type=\"text\" value=\"{}\"></td></tr>\n",
        escape_attr(value)
    )
}

fn checkbox_row(label: &str, field: &str, on: bool) -> String {
    format!(
        "<tr valign=\"top\"><th scope=\"row\">{label}</th><td><input name=\"{SETTINGS_KEY}[{field}]\" type=\"checkbox\" value=\"1\"{}></td></tr>\n",
        checked(on)
    )
}

fn username_row(selected: UsernameFormat) -> String {
    let radio = |value: UsernameFormat, label: &str| {
        format!(
            "<label><input name=\"{SETTINGS_KEY}[{}]\" type=\"radio\" value=\"{}\"{}> <span>{label}</span></label>",
            SettingsFields::USERNAME,
            value.as_str(),
            checked(selected == value)
        )
    };
    format!(
        "<tr valign=\"top\"><th scope=\"row\">Username format</th><td>{}<br>{}</td></tr>\n",
        radio(UsernameFormat::FirstLast, "First name &amp; last name"),
        radio(UsernameFormat::DisplayName, "Display name")
    )
}

/// Full admin settings page body.
pub fn settings_page(settings: &SettingsRecord, notices: &[Notice], nonce: &str) -> String {
    let mut html = String::from("<!doctype html>\n<html><head><title>Intercom Settings</title></head><body>\n");
    for notice in notices {
        html.push_str(&notice.to_html());
    }
    html.push_str("<div class=\"wrap\"><h2>Intercom Configuration</h2>\n");
    html.push_str(&format!(
        "<form method=\"post\" action=\"{SETTINGS_PAGE_PATH}\">\n<input type=\"hidden\" name=\"{NONCE_FIELD}\" value=\"{}\">\n",
        escape_attr(nonce)
    ));
    html.push_str("<table class=\"form-table\"><tbody>\n");
    html.push_str(&text_row("App ID", SettingsFields::APP_ID, &settings.app_id));
    html.push_str(&text_row(
        "Secret key",
        SettingsFields::SECRET_KEY,
        &settings.secret_key,
    ));
    html.push_str(&username_row(settings.username_format));
    html.push_str(&checkbox_row(
        "Send user role?",
        SettingsFields::SEND_USER_ROLE,
        settings.send_user_role,
    ));
    html.push_str(&checkbox_row(
        "Send user website?",
        SettingsFields::SEND_USER_URL,
        settings.send_user_url,
    ));
    html.push_str(&checkbox_row(
        "Show on admin pages?",
        SettingsFields::SHOW_IN_ADMIN,
        settings.show_in_admin,
    ));
    html.push_str("</tbody></table>\n");
    html.push_str(&format!(
        "<p class=\"submit\"><input class=\"button-primary\" name=\"{SUBMIT_FIELD}\" type=\"submit\" value=\"Save Settings\"></p>\n"
    ));
    html.push_str("</form></div>\n</body></html>\n");
    html
}

/// Admin dashboard shell; notices on top.
pub fn dashboard_page(notices: &[Notice]) -> String {
    let mut html = String::from("<!doctype html>\n<html><head><title>Dashboard</title></head><body>\n");
    for notice in notices {
        html.push_str(&notice.to_html());
    }
    html.push_str(&format!(
        "<div class=\"wrap\"><h2>Dashboard</h2><p><a href=\"{SETTINGS_PAGE_PATH}?page={SETTINGS_PAGE_SLUG}\">Intercom settings</a></p></div>\n</body></html>\n"
    ));
    html
}

/// Shown instead of admin pages to visitors without a session.
pub fn login_page() -> String {
    String::from(
        "<!doctype html>\n<html><head><title>Sign in</title></head><body>\n<div class=\"wrap\"><h2>Sign in required</h2><p>Sign in to your site, then return to the <a href=\"/admin\">dashboard</a>.</p></div>\n</body></html>\n",
    )
}
