use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use intercom_install::config::AppConfig;
use intercom_install::hooks::ExtensionHooks;
use intercom_install::install::Installer;
use intercom_install::lifecycle::RoleCapabilities;
use intercom_install::render::DEFAULT_WIDGET_BASE_URL;
use intercom_install::lifecycle::Capability;
use intercom_install::server::{AppState, router};
use intercom_install::session::SessionSigner;
use intercom_install::settings::SettingsRecord;
use intercom_install::store::{InMemorySettingsStore, Scope, SettingsStore, StoreError};
use intercom_install::viewer::{StaticViewerDirectory, ViewerIdentity};
use std::sync::Arc;
use tower::ServiceExt;

const ADMIN: u64 = 1;
const MEMBER: u64 = 42;
const SITE_ADMIN: u64 = 7;
const SESSION_KEY: &[u8] = b"http-tests-session-key";

struct UnavailableStore;

#[async_trait::async_trait]
impl SettingsStore for UnavailableStore {
    async fn load(&self, _scope: Scope) -> Result<Option<SettingsRecord>, StoreError> {
        Err(StoreError::Persistence("disk offline".into()))
    }

    async fn save(&self, _scope: Scope, _record: &SettingsRecord) -> Result<(), StoreError> {
        Err(StoreError::Persistence("disk offline".into()))
    }
}

fn sessions() -> SessionSigner {
    SessionSigner::new(SESSION_KEY).unwrap()
}

async fn state() -> AppState {
    state_with(Arc::new(InMemorySettingsStore::new()), false).await
}

async fn state_with(store: Arc<dyn SettingsStore>, network_wide: bool) -> AppState {
    let dir = StaticViewerDirectory::new([
        ViewerIdentity {
            id: ADMIN,
            email: "root@example.com".into(),
            display_name: "root".into(),
            registered: "2012-01-01 00:00:00".into(),
            roles: vec!["administrator".into()],
            ..Default::default()
        },
        ViewerIdentity {
            id: MEMBER,
            email: "ada@example.com".into(),
            display_name: "ada.l".into(),
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            registered: "2013-04-01 09:30:00".into(),
            roles: vec!["subscriber".into()],
            url: Some("https://ada.example.com".into()),
        },
        ViewerIdentity {
            id: SITE_ADMIN,
            email: "site@example.com".into(),
            roles: vec!["site-admin".into()],
            ..Default::default()
        },
    ]);
    let roles = Arc::new(RoleCapabilities::with_defaults());
    roles.activate().await;
    roles.grant("site-admin", Capability::MANAGE_OPTIONS).await;
    let config = AppConfig {
        pages_root: std::env::temp_dir().join("intercom-install-no-pages"),
        network_wide,
        ..Default::default()
    };
    let installer = Installer::new(
        store,
        Arc::new(ExtensionHooks::new()),
        network_wide,
        DEFAULT_WIDGET_BASE_URL,
    );
    AppState::new(config, installer, roles, Arc::new(dir), sessions())
}

fn viewer_cookie(user: u64) -> String {
    format!("intercom_viewer={}", sessions().sign(user))
}

fn get(path: &str, user: Option<u64>) -> Request<Body> {
    let mut builder = Request::builder().uri(path);
    if let Some(id) = user {
        builder = builder.header(header::COOKIE, viewer_cookie(id));
    }
    builder.body(Body::empty()).unwrap()
}

fn post_settings(form: &str, user: u64) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/admin/settings")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .header(header::COOKIE, viewer_cookie(user))
        .body(Body::from(form.to_string()))
        .unwrap()
}

async fn body_text(resp: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn save(state: &AppState, fields: &str) {
    let form = format!("_nonce={}&{fields}", state.nonce);
    let resp = router(state.clone())
        .oneshot(post_settings(&form, ADMIN))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        resp.headers()[header::LOCATION],
        "/admin/settings?page=intercom&updated=true"
    );
}

#[tokio::test]
async fn healthz_ok() {
    let resp = router(state().await)
        .oneshot(get("/healthz", None))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_text(resp).await, "ok");
}

#[tokio::test]
async fn unconfigured_site_emits_nothing() {
    let resp = router(state().await)
        .oneshot(get("/", Some(MEMBER)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(!body_text(resp).await.contains("intercomSettings"));
}

#[tokio::test]
async fn saved_settings_drive_front_end_output() {
    let state = state().await;
    save(
        &state,
        "intercom-settings[app-id]=abc123&intercom-settings[secure]=&intercom-settings[username]=display",
    )
    .await;

    let body = body_text(
        router(state.clone())
            .oneshot(get("/blog/post", Some(MEMBER)))
            .await
            .unwrap(),
    )
    .await;
    assert!(body.contains("\"app_id\":\"abc123\""));
    assert!(body.contains("\"name\":\"ada.l\""));
    assert!(!body.contains("user_hash"));
    assert!(!body.contains("\"Role\""));
    assert!(!body.contains("\"Website\""));
    assert!(body.contains("https://widget.intercom.io/widget/abc123"));

    let anonymous = body_text(router(state.clone()).oneshot(get("/", None)).await.unwrap()).await;
    assert!(!anonymous.contains("intercomSettings"));

    let admin = body_text(router(state).oneshot(get("/", Some(ADMIN))).await.unwrap()).await;
    assert!(!admin.contains("intercomSettings"));
}

#[tokio::test]
async fn secure_mode_and_custom_data() {
    let state = state().await;
    save(
        &state,
        "intercom-settings[app-id]=abc123&intercom-settings[secure]=k&intercom-settings[send-user-role]=1&intercom-settings[send-user-url]=1",
    )
    .await;
    let body = body_text(
        router(state)
            .oneshot(get("/", Some(MEMBER)))
            .await
            .unwrap(),
    )
    .await;
    assert!(body.contains(
        "\"user_hash\":\"7955074f51169f1f64053d8b2c403d7f41ee7ca4f3f9fe1c7b84f91083f2c50a\""
    ));
    assert!(body.contains("\"name\":\"Ada Lovelace\""));
    assert!(body.contains("\"Role\":\"subscriber\""));
    assert!(body.contains("\"Website\":\"https://ada.example.com\""));
}

#[tokio::test]
async fn admin_surface_respects_show_in_admin() {
    let state = state().await;
    let roles = state.roles.clone();
    roles.deactivate().await;
    save(&state, "intercom-settings[app-id]=abc123").await;
    let body = body_text(
        router(state.clone())
            .oneshot(get("/admin", Some(ADMIN)))
            .await
            .unwrap(),
    )
    .await;
    assert!(!body.contains("intercomSettings"));

    save(
        &state,
        "intercom-settings[app-id]=abc123&intercom-settings[show-in-admin]=1",
    )
    .await;
    let body = body_text(
        router(state)
            .oneshot(get("/admin", Some(ADMIN)))
            .await
            .unwrap(),
    )
    .await;
    assert!(body.contains("intercomSettings"));
}

#[tokio::test]
async fn settings_page_notices() {
    let state = state().await;
    let body = body_text(
        router(state.clone())
            .oneshot(get("/admin/settings?page=intercom", Some(ADMIN)))
            .await
            .unwrap(),
    )
    .await;
    assert!(body.contains("Please enter your Intercom application ID"));
    assert!(body.contains(&format!("name=\"_nonce\" value=\"{}\"", state.nonce)));

    let dashboard = body_text(
        router(state.clone())
            .oneshot(get("/admin", Some(ADMIN)))
            .await
            .unwrap(),
    )
    .await;
    assert!(dashboard.contains("configure the Intercom settings"));

    save(&state, "intercom-settings[app-id]=abc123").await;
    let body = body_text(
        router(state)
            .oneshot(get(
                "/admin/settings?page=intercom&updated=true",
                Some(ADMIN),
            ))
            .await
            .unwrap(),
    )
    .await;
    assert!(body.contains("Settings saved."));
    assert!(!body.contains("needs some attention"));
    assert!(body.contains("value=\"abc123\""));
}

#[tokio::test]
async fn forged_or_unauthorized_submissions_are_rejected() {
    let state = state().await;
    let resp = router(state.clone())
        .oneshot(post_settings(
            "_nonce=wrong&intercom-settings[app-id]=evil",
            ADMIN,
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let form = format!("_nonce={}&intercom-settings[app-id]=evil", state.nonce);
    let resp = router(state.clone())
        .oneshot(post_settings(&form, MEMBER))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    assert_eq!(state.installer.settings().await.unwrap().app_id, "");
}

#[tokio::test]
async fn settings_page_access_control() {
    let state = state().await;
    let resp = router(state.clone())
        .oneshot(get("/admin/settings", Some(MEMBER)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = router(state)
        .oneshot(get("/admin/settings", None))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(resp.headers()[header::LOCATION], "/login");
}

#[tokio::test]
async fn forged_viewer_cookie_is_anonymous() {
    let state = state().await;
    let forged = |path: &str| {
        Request::builder()
            .uri(path)
            .header(header::COOKIE, format!("intercom_viewer={ADMIN}"))
            .body(Body::empty())
            .unwrap()
    };
    let resp = router(state.clone())
        .oneshot(forged("/admin/settings"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(resp.headers()[header::LOCATION], "/login");

    let form = format!("_nonce={}&intercom-settings[app-id]=evil", state.nonce);
    let resp = router(state.clone())
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/admin/settings")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .header(header::COOKIE, format!("intercom_viewer={ADMIN}"))
                .body(Body::from(form))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    assert_eq!(state.installer.settings().await.unwrap().app_id, "");
}

#[tokio::test]
async fn login_page_is_served() {
    let resp = router(state().await)
        .oneshot(get("/login", None))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert!(body_text(resp).await.contains("Sign in required"));
}

#[tokio::test]
async fn network_wide_settings_need_network_capability() {
    let state = state_with(Arc::new(InMemorySettingsStore::new()), true).await;
    let resp = router(state.clone())
        .oneshot(get("/admin/settings?page=intercom", Some(SITE_ADMIN)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let form = format!("_nonce={}&intercom-settings[app-id]=site", state.nonce);
    let resp = router(state.clone())
        .oneshot(post_settings(&form, SITE_ADMIN))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    assert_eq!(state.installer.settings().await.unwrap().app_id, "");

    let resp = router(state.clone())
        .oneshot(get("/admin/settings?page=intercom", Some(ADMIN)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    save(&state, "intercom-settings[app-id]=network").await;
    assert_eq!(state.installer.settings().await.unwrap().app_id, "network");
}

#[tokio::test]
async fn site_admin_manages_site_settings() {
    let state = state().await;
    let resp = router(state)
        .oneshot(get("/admin/settings?page=intercom", Some(SITE_ADMIN)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn unavailable_store_fails_saves_but_not_pages() {
    let state = state_with(Arc::new(UnavailableStore), false).await;

    let form = format!("_nonce={}&intercom-settings[app-id]=abc123", state.nonce);
    let resp = router(state.clone())
        .oneshot(post_settings(&form, ADMIN))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let resp = router(state.clone())
        .oneshot(get("/", Some(MEMBER)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_text(resp).await;
    assert!(body.contains("<body"));
    assert!(!body.contains("intercomSettings"));

    let resp = router(state)
        .oneshot(get("/admin/settings?page=intercom", Some(ADMIN)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(body_text(resp).await.contains("name=\"intercom-settings[app-id]\" type=\"text\" value=\"\""));
}
