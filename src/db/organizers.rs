use sqlx::PgExecutor;
use uuid::Uuid;

use crate::models::Organizer;

pub async fn find_by_user<'e>(
    db: impl PgExecutor<'e>,
    user_id: Uuid,
) -> Result<Option<Organizer>, sqlx::Error> {
    sqlx::query_as::<_, Organizer>("SELECT * FROM organizers WHERE user_id = $1")
        .bind(user_id)
        .fetch_optional(db)
        .await
}

pub async fn create<'e>(
    db: impl PgExecutor<'e>,
    user_id: Uuid,
    name: &str,
    description: Option<&str>,
    contact_email: &str,
) -> Result<Organizer, sqlx::Error> {
    sqlx::query_as::<_, Organizer>(
        "INSERT INTO organizers (id, user_id, name, description, contact_email) \
         VALUES ($1, $2, $3, $4, $5) RETURNING *",
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(name)
    .bind(description)
    .bind(contact_email)
    .fetch_one(db)
    .await
}

pub async fn update<'e>(
    db: impl PgExecutor<'e>,
    id: Uuid,
    name: &str,
    description: Option<&str>,
    contact_email: &str,
) -> Result<Organizer, sqlx::Error> {
    sqlx::query_as::<_, Organizer>(
        "UPDATE organizers SET name = $2, description = $3, contact_email = $4, updated_at = now() \
         WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(name)
    .bind(description)
    .bind(contact_email)
    .fetch_one(db)
    .await
}
