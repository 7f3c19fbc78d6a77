use std::process::ExitCode;

use dotenvy::dotenv;
use tracing_subscriber::{fmt, EnvFilter};

use ticketing_server::config::Config;
use ticketing_server::start_server;

#[tokio::main]
async fn main() -> ExitCode {
    dotenv().ok();
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    match start_server(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Server failed");
            ExitCode::FAILURE
        }
    }
}
