use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgExecutor};
use uuid::Uuid;

use crate::models::{OtpCode, OtpPurpose};

/// Most recent code for the pair, verified or not; drives the resend throttle.
pub async fn latest<'e>(
    db: impl PgExecutor<'e>,
    email: &str,
    purpose: OtpPurpose,
) -> Result<Option<OtpCode>, sqlx::Error> {
    sqlx::query_as::<_, OtpCode>(
        "SELECT * FROM otp_codes WHERE email = $1 AND purpose = $2 ORDER BY created_at DESC LIMIT 1",
    )
    .bind(email)
    .bind(purpose)
    .fetch_optional(db)
    .await
}

/// The single unverified code for the pair, row-locked for the verify step.
pub async fn active_for_update(
    conn: &mut PgConnection,
    email: &str,
    purpose: OtpPurpose,
) -> Result<Option<OtpCode>, sqlx::Error> {
    sqlx::query_as::<_, OtpCode>(
        "SELECT * FROM otp_codes WHERE email = $1 AND purpose = $2 AND verified_at IS NULL \
         ORDER BY created_at DESC LIMIT 1 FOR UPDATE",
    )
    .bind(email)
    .bind(purpose)
    .fetch_optional(&mut *conn)
    .await
}

/// Serializes issuance for the pair until the surrounding transaction ends.
/// Taking it twice in one transaction is harmless.
pub async fn lock_pair(conn: &mut PgConnection, email: &str, purpose: OtpPurpose) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1 || ':' || $2))")
        .bind(email)
        .bind(purpose)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Drops every unverified code for the pair and stores `code` as the only
/// active one. Must run inside a transaction; concurrent callers queue on
/// [`lock_pair`].
pub async fn replace(
    conn: &mut PgConnection,
    email: &str,
    purpose: OtpPurpose,
    code: &str,
    expires_at: DateTime<Utc>,
) -> Result<OtpCode, sqlx::Error> {
    lock_pair(&mut *conn, email, purpose).await?;

    sqlx::query("DELETE FROM otp_codes WHERE email = $1 AND purpose = $2 AND verified_at IS NULL")
        .bind(email)
        .bind(purpose)
        .execute(&mut *conn)
        .await?;

    sqlx::query_as::<_, OtpCode>(
        "INSERT INTO otp_codes (id, email, purpose, code, expires_at) VALUES ($1, $2, $3, $4, $5) RETURNING *",
    )
    .bind(Uuid::new_v4())
    .bind(email)
    .bind(purpose)
    .bind(code)
    .bind(expires_at)
    .fetch_one(&mut *conn)
    .await
}

pub async fn record_failed_attempt<'e>(db: impl PgExecutor<'e>, id: Uuid) -> Result<i32, sqlx::Error> {
    sqlx::query_scalar::<_, i32>(
        "UPDATE otp_codes SET attempts = attempts + 1 WHERE id = $1 RETURNING attempts",
    )
    .bind(id)
    .fetch_one(db)
    .await
}

pub async fn mark_verified<'e>(
    db: impl PgExecutor<'e>,
    id: Uuid,
    now: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE otp_codes SET verified_at = $2 WHERE id = $1")
        .bind(id)
        .bind(now)
        .execute(db)
        .await?;
    Ok(())
}

pub async fn delete_expired_before<'e>(
    db: impl PgExecutor<'e>,
    cutoff: DateTime<Utc>,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM otp_codes WHERE expires_at < $1")
        .bind(cutoff)
        .execute(db)
        .await?;
    Ok(result.rows_affected())
}
