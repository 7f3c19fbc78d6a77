use chrono::{DateTime, Utc};
use sqlx::PgExecutor;
use uuid::Uuid;

use crate::models::Participant;

pub struct NewParticipant<'a> {
    pub order_item_id: Uuid,
    pub event_id: Uuid,
    pub user_id: Uuid,
    pub seat_id: Option<Uuid>,
    pub company_id: Option<Uuid>,
    pub name: &'a str,
    pub email: &'a str,
    pub phone: Option<&'a str>,
}

pub async fn insert<'e>(
    db: impl PgExecutor<'e>,
    participant: &NewParticipant<'_>,
) -> Result<Participant, sqlx::Error> {
    sqlx::query_as::<_, Participant>(
        "INSERT INTO participants \
         (id, order_item_id, event_id, user_id, seat_id, company_id, name, email, phone) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING *",
    )
    .bind(Uuid::new_v4())
    .bind(participant.order_item_id)
    .bind(participant.event_id)
    .bind(participant.user_id)
    .bind(participant.seat_id)
    .bind(participant.company_id)
    .bind(participant.name)
    .bind(participant.email)
    .bind(participant.phone)
    .fetch_one(db)
    .await
}

pub async fn find<'e>(db: impl PgExecutor<'e>, id: Uuid) -> Result<Option<Participant>, sqlx::Error> {
    sqlx::query_as::<_, Participant>("SELECT * FROM participants WHERE id = $1")
        .bind(id)
        .fetch_optional(db)
        .await
}

pub async fn list_for_event<'e>(
    db: impl PgExecutor<'e>,
    event_id: Uuid,
    search: Option<&str>,
) -> Result<Vec<Participant>, sqlx::Error> {
    let pattern = search.map(super::like_pattern);
    sqlx::query_as::<_, Participant>(
        "SELECT * FROM participants WHERE event_id = $1 \
         AND ($2::text IS NULL OR name ILIKE $2 ESCAPE '\\' OR email ILIKE $2 ESCAPE '\\') ORDER BY name",
    )
    .bind(event_id)
    .bind(pattern)
    .fetch_all(db)
    .await
}

pub async fn list_for_order<'e>(
    db: impl PgExecutor<'e>,
    order_id: Uuid,
) -> Result<Vec<Participant>, sqlx::Error> {
    sqlx::query_as::<_, Participant>(
        "SELECT p.* FROM participants p JOIN order_items oi ON oi.id = p.order_item_id \
         WHERE oi.order_id = $1 ORDER BY p.created_at",
    )
    .bind(order_id)
    .fetch_all(db)
    .await
}

/// Stamps every listed participant not yet checked in and returns those rows.
pub async fn check_in<'e>(
    db: impl PgExecutor<'e>,
    ids: &[Uuid],
    now: DateTime<Utc>,
) -> Result<Vec<Participant>, sqlx::Error> {
    sqlx::query_as::<_, Participant>(
        "UPDATE participants SET checked_in_at = $2 \
         WHERE id = ANY($1) AND checked_in_at IS NULL RETURNING *",
    )
    .bind(ids)
    .bind(now)
    .fetch_all(db)
    .await
}
