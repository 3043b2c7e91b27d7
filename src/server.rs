use crate::admin::{self, AdminContext, NONCE_FIELD, SETTINGS_PAGE_PATH, SETTINGS_PAGE_SLUG};
use crate::config::AppConfig;
use crate::gate::Surface;
use crate::install::{InstallError, Installer};
use crate::lifecycle::RoleCapabilities;
use crate::routing;
use crate::session::SessionSigner;
use crate::settings::SettingsRecord;
use crate::viewer::{Viewer, ViewerDirectory};
use axum::extract::{Form, Query, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode, Uri, header};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::Router;
use serde::Deserialize;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

pub const LOGIN_PATH: &str = "/login";

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub installer: Installer,
    pub roles: Arc<RoleCapabilities>,
    pub viewers: Arc<dyn ViewerDirectory>,
    pub sessions: SessionSigner,
    /// Anti-forgery token embedded in the settings form.
    pub nonce: Arc<str>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        installer: Installer,
        roles: Arc<RoleCapabilities>,
        viewers: Arc<dyn ViewerDirectory>,
        sessions: SessionSigner,
    ) -> Self {
        Self {
            config: Arc::new(config),
            installer,
            roles,
            viewers,
            sessions,
            nonce: Arc::from(uuid::Uuid::new_v4().to_string()),
        }
    }

    async fn viewer(&self, headers: &HeaderMap) -> Viewer {
        let Some(user_id) = self.sessions.viewer_id(headers) else {
            return Viewer::anonymous();
        };
        match self.viewers.find(user_id).await {
            Some(identity) => Viewer::resolve(identity, &self.roles).await,
            None => {
                warn!(user_id, "unknown viewer in session cookie");
                Viewer::anonymous()
            }
        }
    }

    fn can_manage_settings(&self, viewer: &Viewer) -> bool {
        viewer.can_manage_settings(self.config.network_wide)
    }

    /// Admin pages still render, with defaults, when the store is unreadable.
    async fn settings_or_default(&self) -> SettingsRecord {
        match self.installer.settings().await {
            Ok(settings) => settings,
            Err(err) => {
                error!(%err, "settings unavailable; showing defaults");
                SettingsRecord::default()
            }
        }
    }
}

pub fn router(state: AppState) -> Router {
    let enable_cors = state.config.enable_cors;
    let mut router = Router::new()
        .route("/healthz", get(healthz))
        .route(LOGIN_PATH, get(login))
        .route("/admin", get(admin_dashboard))
        .route(SETTINGS_PAGE_PATH, get(settings_page).post(save_settings))
        .route("/", get(front_page))
        .route("/{*path}", get(front_page))
        .with_state(state)
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http());
    if enable_cors {
        router = router.layer(CorsLayer::permissive());
    }
    router
}

pub async fn run(addr: SocketAddr, state: AppState) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(?err, "failed to listen for shutdown signal");
    }
    info!("shutting down");
}

async fn healthz() -> &'static str {
    "ok"
}

async fn login() -> Response {
    (StatusCode::UNAUTHORIZED, Html(admin::login_page())).into_response()
}

async fn front_page(State(state): State<AppState>, uri: Uri, headers: HeaderMap) -> Response {
    let viewer = state.viewer(&headers).await;
    let html = match routing::load_page(&state.config.pages_root, uri.path()).await {
        Ok(html) => html,
        Err(err) => {
            error!(path = %uri.path(), ?err, "failed to load page");
            return (StatusCode::INTERNAL_SERVER_ERROR, "page unavailable").into_response();
        }
    };
    page_with_install_code(&state, html, &viewer, Surface::Front).await
}

async fn admin_dashboard(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let viewer = state.viewer(&headers).await;
    if !viewer.is_authenticated() {
        return Redirect::to(LOGIN_PATH).into_response();
    }
    let settings = state.settings_or_default().await;
    let ctx = AdminContext {
        can_manage_options: state.can_manage_settings(&viewer),
        network_admin: state.config.network_wide,
        ..Default::default()
    };
    let html = admin::dashboard_page(&admin::notices(ctx, &settings));
    page_with_install_code(&state, html, &viewer, Surface::Admin).await
}

#[derive(Debug, Deserialize, Default)]
pub struct SettingsPageQuery {
    pub page: Option<String>,
    pub updated: Option<String>,
}

async fn settings_page(
    State(state): State<AppState>,
    Query(query): Query<SettingsPageQuery>,
    headers: HeaderMap,
) -> Response {
    let viewer = state.viewer(&headers).await;
    if !viewer.is_authenticated() {
        return Redirect::to(LOGIN_PATH).into_response();
    }
    if !state.can_manage_settings(&viewer) {
        return (StatusCode::FORBIDDEN, "insufficient permissions").into_response();
    }
    let settings = state.settings_or_default().await;
    let ctx = AdminContext {
        on_settings_page: true,
        updated: query.updated.is_some() && query.page.as_deref() == Some(SETTINGS_PAGE_SLUG),
        can_manage_options: true,
        network_admin: state.config.network_wide,
    };
    let html = admin::settings_page(&settings, &admin::notices(ctx, &settings), &state.nonce);
    page_with_install_code(&state, html, &viewer, Surface::Admin).await
}

async fn save_settings(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    let viewer = state.viewer(&headers).await;
    if !state.can_manage_settings(&viewer) {
        return (StatusCode::FORBIDDEN, "insufficient permissions").into_response();
    }
    if form.get(NONCE_FIELD).map(String::as_str) != Some(&*state.nonce) {
        warn!("settings form rejected: anti-forgery token mismatch");
        return (StatusCode::FORBIDDEN, "invalid form token").into_response();
    }
    match state.installer.save(&admin::form_to_raw(&form)).await {
        Ok(_) => Redirect::to(&format!(
            "{SETTINGS_PAGE_PATH}?page={SETTINGS_PAGE_SLUG}&updated=true"
        ))
        .into_response(),
        Err(err) => install_error_response(err),
    }
}

/// Never lets a broken install fail the page itself.
async fn page_with_install_code(
    state: &AppState,
    html: String,
    viewer: &Viewer,
    surface: Surface,
) -> Response {
    match state.installer.render_page(&html, viewer, surface).await {
        Ok(rendered) => Html(rendered).into_response(),
        Err(err) => {
            warn!(?surface, %err, "serving page without install code");
            Html(html).into_response()
        }
    }
}

fn install_error_response(err: InstallError) -> Response {
    error!(%err, "settings not saved");
    (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response()
}
