use sqlx::PgExecutor;
use uuid::Uuid;

use crate::models::Company;

pub struct CompanyFields<'a> {
    pub name: &'a str,
    pub email: Option<&'a str>,
    pub phone: Option<&'a str>,
    pub address: Option<&'a str>,
}

pub async fn list<'e>(db: impl PgExecutor<'e>, search: Option<&str>) -> Result<Vec<Company>, sqlx::Error> {
    let pattern = search.map(super::like_pattern);
    sqlx::query_as::<_, Company>(
        "SELECT * FROM companies WHERE $1::text IS NULL OR name ILIKE $1 ESCAPE '\\' ORDER BY name",
    )
    .bind(pattern)
    .fetch_all(db)
    .await
}

pub async fn find<'e>(db: impl PgExecutor<'e>, id: Uuid) -> Result<Option<Company>, sqlx::Error> {
    sqlx::query_as::<_, Company>("SELECT * FROM companies WHERE id = $1")
        .bind(id)
        .fetch_optional(db)
        .await
}

pub async fn create<'e>(db: impl PgExecutor<'e>, fields: &CompanyFields<'_>) -> Result<Company, sqlx::Error> {
    sqlx::query_as::<_, Company>(
        "INSERT INTO companies (id, name, email, phone, address) VALUES ($1, $2, $3, $4, $5) RETURNING *",
    )
    .bind(Uuid::new_v4())
    .bind(fields.name)
    .bind(fields.email)
    .bind(fields.phone)
    .bind(fields.address)
    .fetch_one(db)
    .await
}

pub async fn update<'e>(
    db: impl PgExecutor<'e>,
    id: Uuid,
    fields: &CompanyFields<'_>,
) -> Result<Option<Company>, sqlx::Error> {
    sqlx::query_as::<_, Company>(
        "UPDATE companies SET name = $2, email = $3, phone = $4, address = $5, updated_at = now() \
         WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(fields.name)
    .bind(fields.email)
    .bind(fields.phone)
    .bind(fields.address)
    .fetch_optional(db)
    .await
}

pub async fn delete<'e>(db: impl PgExecutor<'e>, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM companies WHERE id = $1")
        .bind(id)
        .execute(db)
        .await?;
    Ok(result.rows_affected() > 0)
}
