use clap::Parser;
use lavcontrol::hub::Hub;
use lavcontrol::jwks::JwksManager;
use lavcontrol::mqtt::MqttBridge;
use lavcontrol::settings::Settings;
use lavcontrol::web::{self, AppState};
use lavcontrol::{jobs, storage, user_sync};
use miette::Result;
use std::sync::Arc;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(
    name = "lavcontrol",
    version,
    about = "Laundromat chain administration server"
)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Create or update users from a JSON file, then exit
    #[arg(long, value_name = "FILE")]
    sync_users: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // logging
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();

    // load settings
    let settings = Settings::load(&cli.config)?;
    tracing::debug!(?settings, "Loaded configuration");

    // init storage (database + migrations)
    let db = storage::init(&settings.database).await?;

    if let Some(file) = cli.sync_users {
        user_sync::sync_users_from_file(&db, &file).await?;
        return Ok(());
    }

    if let Some(password) = storage::ensure_admin(&db).await? {
        tracing::warn!(
            "No administrator found; created user 'admin' with password '{}'. Change it after the first login.",
            password
        );
    }
    storage::get_system_config(&db).await?;

    // init jwks (generate if missing)
    let jwks = JwksManager::new(settings.keys.clone(), settings.issuer()).await?;

    let hub = Hub::new();
    let mqtt = MqttBridge::start(&settings.mqtt, db.clone(), hub.clone());

    // Keep the scheduler alive for the lifetime of the server
    let _scheduler = if settings.jobs.enabled {
        Some(jobs::init_scheduler(&settings.jobs, db.clone(), hub.clone()).await?)
    } else {
        tracing::info!("Background jobs disabled");
        None
    };

    web::serve(AppState {
        settings: Arc::new(settings),
        db,
        jwks,
        hub,
        mqtt,
    })
    .await
}
