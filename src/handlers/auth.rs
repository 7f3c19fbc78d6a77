use axum::extract::State;
use axum::response::Response;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::auth::{token, AuthUser};
use crate::db;
use crate::handlers::{optional, required};
use crate::models::user::{is_valid_email, normalize_email};
use crate::models::{Organizer, OtpPurpose, Role, User};
use crate::services::mailer::otp_mail;
use crate::services::otp::{self, OtpCheck};
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::{empty_success, success};

#[derive(Debug, Deserialize)]
pub struct OtpRequest {
    pub email: String,
    pub purpose: OtpPurpose,
}

#[derive(Debug, Serialize)]
pub struct OtpIssued {
    pub email: String,
    pub purpose: OtpPurpose,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct OtpVerifyRequest {
    pub email: String,
    pub purpose: OtpPurpose,
    pub code: String,
    /// Required when registering.
    pub name: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct Session {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: User,
    pub roles: Vec<Role>,
}

#[derive(Debug, Serialize)]
pub struct Me {
    pub user: User,
    pub roles: Vec<Role>,
    pub organizer: Option<Organizer>,
}

fn checked_email(raw: &str) -> Result<String, AppError> {
    let email = normalize_email(raw);
    if !is_valid_email(&email) {
        return Err(AppError::ValidationError(
            "A valid email address is required".to_string(),
        ));
    }
    Ok(email)
}

/// Registration codes go to unknown addresses, login codes to known ones.
async fn check_account_state(
    state: &AppState,
    email: &str,
    purpose: OtpPurpose,
) -> Result<Option<User>, AppError> {
    let existing = db::users::find_by_email(&state.pool, email).await?;
    match (purpose, &existing) {
        (OtpPurpose::Register, Some(_)) => Err(AppError::Conflict(
            "An account with this email already exists".to_string(),
        )),
        (OtpPurpose::Login, None) => Err(AppError::NotFound(
            "No account exists for this email".to_string(),
        )),
        _ => Ok(existing),
    }
}

pub async fn request_otp(
    State(state): State<AppState>,
    Json(payload): Json<OtpRequest>,
) -> Result<Response, AppError> {
    let email = checked_email(&payload.email)?;
    check_account_state(&state, &email, payload.purpose).await?;

    let now = Utc::now();
    let settings = &state.config.otp;
    let mut tx = state.pool.begin().await?;
    db::otp::lock_pair(&mut tx, &email, payload.purpose).await?;
    if let Some(last) = db::otp::latest(&mut *tx, &email, payload.purpose).await? {
        if let Some(wait) = otp::resend_wait(last.created_at, now, settings) {
            return Err(AppError::TooManyRequests {
                message: format!("Please wait {} seconds before requesting a new code", wait),
                retry_after_secs: Some(wait),
            });
        }
    }

    let code = otp::generate_code(&mut rand::thread_rng());
    let expires_at = otp::expiry(now, settings);
    let issued = db::otp::replace(&mut tx, &email, payload.purpose, &code, expires_at).await?;

    // Mail before commit so a failed send rolls the code back.
    let valid_minutes = (settings.ttl.as_secs() / 60).max(1) as i64;
    state
        .mailer
        .send(otp_mail(&email, &code, payload.purpose, valid_minutes))
        .await?;
    tx.commit().await?;

    info!(email = %email, purpose = %payload.purpose, "OTP issued");

    Ok(success(
        OtpIssued {
            email,
            purpose: issued.purpose,
            expires_at: issued.expires_at,
        },
        "Verification code sent",
    ))
}

pub async fn verify_otp(
    State(state): State<AppState>,
    Json(payload): Json<OtpVerifyRequest>,
) -> Result<Response, AppError> {
    let email = checked_email(&payload.email)?;
    if !otp::is_well_formed(&payload.code) {
        return Err(AppError::ValidationError(format!(
            "code must be {} digits",
            otp::CODE_LENGTH
        )));
    }
    let name = match payload.purpose {
        OtpPurpose::Register => Some(required("name", payload.name.as_deref().unwrap_or(""))?),
        OtpPurpose::Login => None,
    };

    let now = Utc::now();
    let mut tx = state.pool.begin().await?;

    let active = db::otp::active_for_update(&mut tx, &email, payload.purpose)
        .await?
        .ok_or_else(|| {
            AppError::ValidationError("No active code for this email; request a new one".to_string())
        })?;

    match otp::check(&active, &payload.code, &state.config.otp, now) {
        OtpCheck::Accepted => {}
        OtpCheck::Mismatch { remaining } => {
            db::otp::record_failed_attempt(&mut *tx, active.id).await?;
            tx.commit().await?;
            return Err(AppError::InvalidCode {
                remaining_attempts: remaining,
            });
        }
        OtpCheck::Exhausted => {
            return Err(AppError::TooManyRequests {
                message: "Too many incorrect attempts; request a new code".to_string(),
                retry_after_secs: None,
            });
        }
        OtpCheck::Expired => {
            return Err(AppError::ValidationError(
                "The code has expired; request a new one".to_string(),
            ));
        }
        OtpCheck::AlreadyUsed => {
            return Err(AppError::ValidationError(
                "The code has already been used".to_string(),
            ));
        }
    }

    db::otp::mark_verified(&mut *tx, active.id, now).await?;

    let user = match (payload.purpose, name) {
        (OtpPurpose::Register, Some(name)) => {
            if db::users::find_by_email(&mut *tx, &email).await?.is_some() {
                return Err(AppError::Conflict(
                    "An account with this email already exists".to_string(),
                ));
            }
            let user =
                db::users::create_with_role(&mut tx, name, &email, optional(&payload.phone), Role::User)
                    .await
                    .map_err(|e| {
                        db::conflict_on_duplicate(e, "An account with this email already exists")
                    })?;
            info!(user_id = %user.id, "User registered");
            user
        }
        _ => db::users::find_by_email(&mut *tx, &email)
            .await?
            .ok_or_else(|| AppError::NotFound("No account exists for this email".to_string()))?,
    };

    let secret = token::generate(&mut rand::thread_rng());
    let ttl = chrono::Duration::from_std(state.config.token_ttl)
        .map_err(|e| AppError::InternalServerError(format!("Token TTL out of range: {}", e)))?;
    let record = db::tokens::insert(&mut *tx, user.id, &token::hash(&secret), now + ttl).await?;
    let roles = db::users::roles_for(&mut *tx, user.id).await?;
    tx.commit().await?;

    info!(user_id = %user.id, purpose = %payload.purpose, "OTP verified, session issued");

    Ok(success(
        Session {
            token: secret,
            expires_at: record.expires_at,
            user,
            roles,
        },
        "Verified",
    ))
}

pub async fn me(State(state): State<AppState>, auth: AuthUser) -> Result<Response, AppError> {
    let organizer = db::organizers::find_by_user(&state.pool, auth.id()).await?;
    Ok(success(
        Me {
            user: auth.user,
            roles: auth.roles,
            organizer,
        },
        "Current user",
    ))
}

pub async fn logout(State(state): State<AppState>, auth: AuthUser) -> Result<Response, AppError> {
    db::tokens::revoke(&state.pool, auth.token_id).await?;
    info!(user_id = %auth.id(), "Token revoked");
    Ok(empty_success("Logged out"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::http::StatusCode;

    use crate::services::mailer::testing::{FailingMailer, RecordingMailer};
    use crate::test_support;

    fn issue(email: &str, purpose: OtpPurpose) -> Json<OtpRequest> {
        Json(OtpRequest {
            email: email.to_string(),
            purpose,
        })
    }

    fn register(email: &str, code: &str) -> Json<OtpVerifyRequest> {
        Json(OtpVerifyRequest {
            email: email.to_string(),
            purpose: OtpPurpose::Register,
            code: code.to_string(),
            name: Some("Jane Doe".to_string()),
            phone: None,
        })
    }

    #[tokio::test]
    #[ignore] // needs PostgreSQL
    async fn test_undelivered_code_can_be_requested_again() {
        let pool = test_support::pool().await;
        let email = test_support::unique_email("mail");

        let failing = test_support::state_with(pool.clone(), Arc::new(FailingMailer));
        let err = request_otp(State(failing), issue(&email, OtpPurpose::Register))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ExternalServiceError(_)));
        assert!(db::otp::latest(&pool, &email, OtpPurpose::Register)
            .await
            .unwrap()
            .is_none());

        let mailer = Arc::new(RecordingMailer::default());
        let state = test_support::state_with(pool.clone(), mailer.clone());
        let response = request_otp(State(state), issue(&email, OtpPurpose::Register))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(mailer.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    #[ignore] // needs PostgreSQL
    async fn test_resend_inside_cooldown_is_throttled() {
        let pool = test_support::pool().await;
        let state = test_support::state(pool);
        let email = test_support::unique_email("throttle");

        request_otp(State(state.clone()), issue(&email, OtpPurpose::Register))
            .await
            .unwrap();
        let err = request_otp(State(state), issue(&email, OtpPurpose::Register))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::TooManyRequests {
                retry_after_secs: Some(_),
                ..
            }
        ));
    }

    #[tokio::test]
    #[ignore] // needs PostgreSQL
    async fn test_fifth_wrong_code_kills_the_code() {
        let pool = test_support::pool().await;
        let state = test_support::state(pool.clone());
        let email = test_support::unique_email("attempts");

        request_otp(State(state.clone()), issue(&email, OtpPurpose::Register))
            .await
            .unwrap();
        let active = db::otp::latest(&pool, &email, OtpPurpose::Register)
            .await
            .unwrap()
            .unwrap();
        let wrong = if active.code == "000000" { "111111" } else { "000000" };

        for expected in (0..5).rev() {
            let err = verify_otp(State(state.clone()), register(&email, wrong))
                .await
                .unwrap_err();
            assert!(matches!(
                err,
                AppError::InvalidCode { remaining_attempts } if remaining_attempts == expected
            ));
        }

        let err = verify_otp(State(state), register(&email, &active.code))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::TooManyRequests { .. }));

        let stored = db::otp::latest(&pool, &email, OtpPurpose::Register)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.attempts, 5);
        assert!(db::users::find_by_email(&pool, &email).await.unwrap().is_none());
    }

    #[tokio::test]
    #[ignore] // needs PostgreSQL
    async fn test_register_then_register_again_conflicts() {
        let pool = test_support::pool().await;
        let state = test_support::state(pool.clone());
        let email = test_support::unique_email("register");

        request_otp(State(state.clone()), issue(&email, OtpPurpose::Register))
            .await
            .unwrap();
        let active = db::otp::latest(&pool, &email, OtpPurpose::Register)
            .await
            .unwrap()
            .unwrap();
        let response = verify_otp(State(state.clone()), register(&email, &active.code))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let user = db::users::find_by_email(&pool, &email).await.unwrap().unwrap();
        let roles = db::users::roles_for(&pool, user.id).await.unwrap();
        assert_eq!(roles, vec![Role::User]);

        let err = request_otp(State(state), issue(&email, OtpPurpose::Register))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }
}
