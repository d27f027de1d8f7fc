use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use studyboard_server::build_router;
use studyboard_server::config::Args;
use studyboard_server::mailer::{LogMailer, Mailer, ResendMailer};
use studyboard_server::sessions::purge_expired;
use studyboard_server::sqlite::SqliteStorage;
use studyboard_server::state::AppState;

const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("studyboard_server={},info", args.log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let database = args
        .database
        .clone()
        .unwrap_or_else(|| PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../data/studyboard.db"));
    let storage = SqliteStorage::open(&database)?;

    let mailer: Arc<dyn Mailer> = match &args.resend_api_key {
        Some(api_key) if !api_key.is_empty() => {
            info!("resend email service configured");
            Arc::new(ResendMailer::new(
                args.resend_api_url.clone(),
                api_key.clone(),
                args.mail_from.clone(),
            )?)
        }
        _ => {
            warn!("email not configured (RESEND_API_KEY missing)");
            Arc::new(LogMailer)
        }
    };

    let auth = args.auth_config();
    if auth.admin.is_none() {
        warn!("admin login disabled (ADMIN_USER or ADMIN_PASS missing)");
    }
    let state = AppState::new(Arc::new(storage), mailer, auth);
    let sweep_state = state.clone();

    let public_dir = args
        .public_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../public"));
    let app = build_router(state, Some(public_dir));

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SESSION_SWEEP_INTERVAL);
        loop {
            interval.tick().await;
            let removed = purge_expired(&sweep_state, Utc::now()).await;
            if removed > 0 {
                info!(removed, "expired sessions purged");
            }
        }
    });

    let listener = tokio::net::TcpListener::bind(args.listen).await?;
    info!(addr = %args.listen, "studyboard running");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}
