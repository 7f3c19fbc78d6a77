use std::error::Error;

use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::watch;
use tracing::info;

pub mod auth;
pub mod config;
pub mod db;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
pub mod utils;

#[cfg(test)]
mod test_support;

use config::Config;
use routes::create_routes;
use services::{cleanup, mailer};
use state::AppState;

/// Connects, migrates and serves until Ctrl+C or SIGTERM.
pub async fn start_server(config: Config) -> Result<(), Box<dyn Error>> {
    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await?;
    info!("Successfully connected to database");

    sqlx::migrate!().run(&pool).await?;
    info!("Migrations run successfully");

    let mailer = mailer::build_mailer(&config.mail_transport, &config.mail_from)?;
    info!(transport = mailer.name(), "Mailer ready");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper = cleanup::spawn(pool.clone(), config.cleanup_interval, shutdown_rx);

    let addr = config.bind_addr;
    let app = create_routes(AppState::new(pool.clone(), config, mailer));

    let listener = TcpListener::bind(addr).await?;
    info!("Server running at http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutting down...");
    let _ = shutdown_tx.send(true);
    if let Err(e) = sweeper.await {
        tracing::warn!(error = ?e, "Cleanup task ended abnormally");
    }
    pool.close().await;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = ?e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                tracing::error!(error = ?e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
