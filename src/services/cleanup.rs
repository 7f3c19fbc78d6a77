//! Periodic pruning of expired OTP codes and API tokens.

use std::time::Duration;

use chrono::Utc;
use sqlx::PgPool;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::db;

/// Expired codes are kept a day so the resend throttle still sees them.
fn otp_retention() -> chrono::Duration {
    chrono::Duration::days(1)
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub otp_codes: u64,
    pub api_tokens: u64,
}

pub async fn sweep(pool: &PgPool) -> Result<SweepReport, sqlx::Error> {
    let now = Utc::now();
    let otp_codes = db::otp::delete_expired_before(pool, now - otp_retention()).await?;
    let api_tokens = db::tokens::delete_expired(pool, now).await?;
    Ok(SweepReport {
        otp_codes,
        api_tokens,
    })
}

/// Runs `sweep` every `interval` until `shutdown` flips to `true`.
pub fn spawn(pool: PgPool, interval: Duration, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Cleanup task stopping");
                        break;
                    }
                }
                _ = ticker.tick() => {
                    match sweep(&pool).await {
                        Ok(report) if report != SweepReport::default() => {
                            info!(otp_codes = report.otp_codes, api_tokens = report.api_tokens, "Pruned expired credentials");
                        }
                        Ok(_) => debug!("Nothing to prune"),
                        Err(e) => error!(error = ?e, "Credential cleanup failed"),
                    }
                }
            }
        }
    })
}
