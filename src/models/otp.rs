use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use super::text_enum;

text_enum! {
    /// What a code proves: ownership of a new address or of an existing account.
    OtpPurpose {
        Login => "login",
        Register => "register",
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct OtpCode {
    pub id: Uuid,
    pub email: String,
    pub purpose: OtpPurpose,
    pub code: String,
    pub attempts: i32,
    pub expires_at: DateTime<Utc>,
    pub verified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}
