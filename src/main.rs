use std::sync::Arc;

use timer_mute::config::Settings;
use timer_mute::db::{self, models::MuteKind, MuteStore};
use timer_mute::gateway::HttpMuteGateway;
use timer_mute::handlers::console;
use timer_mute::services::{reconcile_on_startup, MuteLifecycle, TokioScheduler};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Only our own logs unless RUST_LOG says otherwise
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("timer_mute=info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Timer Mute");

    let settings = match Settings::from_env() {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to load settings: {}", e);
            std::process::exit(1);
        }
    };

    let pool = match db::pool::create_pool(&settings.database_url).await {
        Ok(p) => p,
        Err(e) => {
            error!("Failed to create database pool: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = db::pool::run_migrations(&pool).await {
        error!("Failed to run migrations: {}", e);
        std::process::exit(1);
    }

    info!("Database initialized successfully");

    // One gateway for the whole process
    let gateway = match HttpMuteGateway::new(&settings.gateway()) {
        Ok(g) => Arc::new(g),
        Err(e) => {
            error!("Failed to build remote gateway: {}", e);
            std::process::exit(1);
        }
    };

    let scheduler = Arc::new(TokioScheduler::new());
    let lifecycle = MuteLifecycle::new(gateway, MuteStore::new(pool), scheduler.clone());

    for kind in MuteKind::ALL {
        if let Err(e) = reconcile_on_startup(&lifecycle, kind).await {
            warn!("Failed to restore {} timers: {}", kind, e);
        }
    }
    info!("{} unmute timers pending", scheduler.pending());

    if let Err(e) = console::run(lifecycle).await {
        error!("Console error: {}", e);
        std::process::exit(1);
    }

    if scheduler.pending() > 0 {
        info!(
            "Exiting with {} timers pending; they will be restored on next start",
            scheduler.pending()
        );
    }
}
