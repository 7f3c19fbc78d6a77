use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgExecutor;
use uuid::Uuid;

use crate::models::TicketCategory;

pub struct CategoryFields<'a> {
    pub name: &'a str,
    pub description: Option<&'a str>,
    pub section_id: Option<Uuid>,
    pub price: Decimal,
    pub quota: Option<i32>,
    pub sale_start: Option<DateTime<Utc>>,
    pub sale_end: Option<DateTime<Utc>>,
}

pub async fn list_for_event<'e>(
    db: impl PgExecutor<'e>,
    event_id: Uuid,
) -> Result<Vec<TicketCategory>, sqlx::Error> {
    sqlx::query_as::<_, TicketCategory>(
        "SELECT * FROM ticket_categories WHERE event_id = $1 ORDER BY price, name",
    )
    .bind(event_id)
    .fetch_all(db)
    .await
}

pub async fn find<'e>(db: impl PgExecutor<'e>, id: Uuid) -> Result<Option<TicketCategory>, sqlx::Error> {
    sqlx::query_as::<_, TicketCategory>("SELECT * FROM ticket_categories WHERE id = $1")
        .bind(id)
        .fetch_optional(db)
        .await
}

pub async fn create<'e>(
    db: impl PgExecutor<'e>,
    event_id: Uuid,
    fields: &CategoryFields<'_>,
) -> Result<TicketCategory, sqlx::Error> {
    sqlx::query_as::<_, TicketCategory>(
        "INSERT INTO ticket_categories \
         (id, event_id, section_id, name, description, price, quota, sale_start, sale_end) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING *",
    )
    .bind(Uuid::new_v4())
    .bind(event_id)
    .bind(fields.section_id)
    .bind(fields.name)
    .bind(fields.description)
    .bind(fields.price)
    .bind(fields.quota)
    .bind(fields.sale_start)
    .bind(fields.sale_end)
    .fetch_one(db)
    .await
}

/// Fails the `sold <= quota` check constraint when the new quota is below
/// what has already been sold.
pub async fn update<'e>(
    db: impl PgExecutor<'e>,
    id: Uuid,
    fields: &CategoryFields<'_>,
) -> Result<TicketCategory, sqlx::Error> {
    sqlx::query_as::<_, TicketCategory>(
        "UPDATE ticket_categories SET section_id = $2, name = $3, description = $4, price = $5, \
         quota = $6, sale_start = $7, sale_end = $8, updated_at = now() WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(fields.section_id)
    .bind(fields.name)
    .bind(fields.description)
    .bind(fields.price)
    .bind(fields.quota)
    .bind(fields.sale_start)
    .bind(fields.sale_end)
    .fetch_one(db)
    .await
}

pub async fn delete<'e>(db: impl PgExecutor<'e>, id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM ticket_categories WHERE id = $1")
        .bind(id)
        .execute(db)
        .await?;
    Ok(())
}

/// Takes `quantity` tickets from the quota in one statement. `None` means
/// the quota would be exceeded.
pub async fn reserve<'e>(
    db: impl PgExecutor<'e>,
    id: Uuid,
    quantity: i32,
) -> Result<Option<TicketCategory>, sqlx::Error> {
    sqlx::query_as::<_, TicketCategory>(
        "UPDATE ticket_categories SET sold = sold + $2, updated_at = now() \
         WHERE id = $1 AND (quota IS NULL OR sold + $2 <= quota) RETURNING *",
    )
    .bind(id)
    .bind(quantity)
    .fetch_optional(db)
    .await
}

pub async fn release<'e>(db: impl PgExecutor<'e>, id: Uuid, quantity: i32) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE ticket_categories SET sold = GREATEST(sold - $2, 0), updated_at = now() WHERE id = $1",
    )
    .bind(id)
    .bind(quantity)
    .execute(db)
    .await?;
    Ok(())
}
