//! Bearer-token authentication and role checks.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use chrono::Utc;
use uuid::Uuid;

use crate::db;
use crate::models::{Role, User};
use crate::state::AppState;
use crate::utils::error::AppError;

pub mod policy;
pub mod token;

/// The caller behind a valid, unexpired bearer token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user: User,
    pub roles: Vec<Role>,
    pub token_id: Uuid,
}

impl AuthUser {
    pub fn id(&self) -> Uuid {
        self.user.id
    }

    pub fn is_admin(&self) -> bool {
        self.roles.contains(&Role::Admin)
    }

    /// Admins hold every role implicitly.
    pub fn require_role(&self, role: Role) -> Result<(), AppError> {
        if policy::has_role(&self.roles, role) {
            Ok(())
        } else {
            Err(AppError::Forbidden(format!("Requires the {} role", role)))
        }
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::AuthError("Missing bearer token".to_string()))?;
        let secret = token::parse_bearer(header)
            .ok_or_else(|| AppError::AuthError("Malformed bearer token".to_string()))?;

        let now = Utc::now();
        let record = db::tokens::find_active(&state.pool, &token::hash(secret), now)
            .await?
            .ok_or_else(|| AppError::AuthError("Invalid or expired token".to_string()))?;
        let user = db::users::find_by_id(&state.pool, record.user_id)
            .await?
            .ok_or_else(|| AppError::AuthError("Invalid or expired token".to_string()))?;
        let roles = db::users::roles_for(&state.pool, user.id).await?;
        db::tokens::touch(&state.pool, record.id, now).await?;

        Ok(AuthUser {
            user,
            roles,
            token_id: record.id,
        })
    }
}
