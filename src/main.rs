use anyhow::Context;
use clap::{Parser, Subcommand};
use intercom_install::config::AppConfig;
use intercom_install::hooks::ExtensionHooks;
use intercom_install::install::Installer;
use intercom_install::lifecycle::RoleCapabilities;
use intercom_install::server::{self, AppState};
use intercom_install::session::SessionSigner;
use intercom_install::store::{FileSettingsStore, InMemorySettingsStore, SettingsStore};
use intercom_install::viewer::{StaticViewerDirectory, ViewerDirectory};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "intercom-install", version, about = "Serve pages with the Intercom install code")]
struct Cli {
    /// TOML config file; environment variables are used when absent.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Treat the deployment as network-wide regardless of config.
    #[arg(long)]
    network_wide: bool,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print a signed viewer cookie for USER_ID (needs SESSION_SECRET).
    Session { user_id: u64 },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => AppConfig::from_toml_file(path)?,
        None => AppConfig::from_env()?,
    };
    config.network_wide |= cli.network_wide;

    let secret = config.session_secret.as_deref().filter(|s| !s.is_empty());
    if let Some(Command::Session { user_id }) = cli.command {
        let secret = secret.context("SESSION_SECRET must be set to issue viewer cookies")?;
        println!("{}", SessionSigner::new(secret.as_bytes())?.cookie(user_id));
        return Ok(());
    }
    let sessions = match secret {
        Some(secret) => SessionSigner::new(secret.as_bytes())?,
        None => {
            tracing::warn!("SESSION_SECRET not set; viewer cookies are valid until restart");
            SessionSigner::ephemeral()?
        }
    };

    let store: Arc<dyn SettingsStore> = match &config.settings_path {
        Some(path) => {
            tracing::info!(?path, "using file settings store");
            Arc::new(FileSettingsStore::new(path.clone()))
        }
        None => {
            tracing::warn!("SETTINGS_PATH not set; settings will not survive a restart");
            Arc::new(InMemorySettingsStore::new())
        }
    };
    let viewers: Arc<dyn ViewerDirectory> = match &config.viewers_path {
        Some(path) => Arc::new(StaticViewerDirectory::from_json_file(path)?),
        None => Arc::new(StaticViewerDirectory::default()),
    };

    let roles = Arc::new(RoleCapabilities::with_defaults());
    roles.activate().await;

    let installer = Installer::new(
        store,
        Arc::new(ExtensionHooks::new()),
        config.network_wide,
        config.widget_base_url.clone(),
    );

    let addr = config.bind_addr;
    let state = AppState::new(config, installer, roles, viewers, sessions);
    tracing::info!(%addr, "starting intercom-install server");
    server::run(addr, state).await?;
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
}
