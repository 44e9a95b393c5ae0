use std::{sync::Arc, time::Duration};

mod app;
mod auth;
mod config;
mod db;
mod error;
mod files;
mod rate_limit;
mod state;
mod sweeper;

use crate::{state::AppState, sweeper::ExpirySweeper};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "dropbin=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let app_state = AppState::init().await?;

    let sweeper = Arc::new(ExpirySweeper::new(
        app_state.uploads.clone(),
        Duration::from_secs(app_state.config.uploads.sweep_interval_secs.max(1)),
    ));
    let _sweep_task = sweeper.spawn();
    app_state.rate_limit.clone().start_cleanup_task();

    app::serve(app::build_app(app_state)).await
}
