use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// Bearer token record. Only the SHA-256 of the secret is stored.
#[derive(Debug, Clone, FromRow)]
pub struct ApiToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}
