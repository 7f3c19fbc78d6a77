use sqlx::{PgConnection, PgExecutor};
use uuid::Uuid;

use crate::models::{Role, User};

pub async fn find_by_id<'e>(db: impl PgExecutor<'e>, id: Uuid) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(id)
        .fetch_optional(db)
        .await
}

pub async fn find_by_email<'e>(
    db: impl PgExecutor<'e>,
    email: &str,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
        .bind(email)
        .fetch_optional(db)
        .await
}

pub async fn create_with_role(
    conn: &mut PgConnection,
    name: &str,
    email: &str,
    phone: Option<&str>,
    role: Role,
) -> Result<User, sqlx::Error> {
    let user = sqlx::query_as::<_, User>(
        "INSERT INTO users (id, name, email, phone) VALUES ($1, $2, $3, $4) RETURNING *",
    )
    .bind(Uuid::new_v4())
    .bind(name)
    .bind(email)
    .bind(phone)
    .fetch_one(&mut *conn)
    .await?;

    grant_role(&mut *conn, user.id, role).await?;
    Ok(user)
}

pub async fn update_profile<'e>(
    db: impl PgExecutor<'e>,
    id: Uuid,
    name: &str,
    phone: Option<&str>,
) -> Result<User, sqlx::Error> {
    sqlx::query_as::<_, User>(
        "UPDATE users SET name = $2, phone = $3, updated_at = now() WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(name)
    .bind(phone)
    .fetch_one(db)
    .await
}

pub async fn roles_for<'e>(db: impl PgExecutor<'e>, user_id: Uuid) -> Result<Vec<Role>, sqlx::Error> {
    sqlx::query_scalar::<_, Role>(
        "SELECT r.name FROM roles r JOIN role_user ru ON ru.role_id = r.id WHERE ru.user_id = $1 ORDER BY r.name",
    )
    .bind(user_id)
    .fetch_all(db)
    .await
}

pub async fn grant_role<'e>(db: impl PgExecutor<'e>, user_id: Uuid, role: Role) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO role_user (user_id, role_id) SELECT $1, id FROM roles WHERE name = $2 ON CONFLICT DO NOTHING",
    )
    .bind(user_id)
    .bind(role)
    .execute(db)
    .await?;
    Ok(())
}

pub async fn revoke_role<'e>(db: impl PgExecutor<'e>, user_id: Uuid, role: Role) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "DELETE FROM role_user WHERE user_id = $1 AND role_id = (SELECT id FROM roles WHERE name = $2)",
    )
    .bind(user_id)
    .bind(role)
    .execute(db)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn list(
    conn: &mut PgConnection,
    search: Option<&str>,
    limit: i64,
    offset: i64,
) -> Result<(Vec<User>, i64), sqlx::Error> {
    let pattern = search.map(super::like_pattern);

    let users = sqlx::query_as::<_, User>(
        "SELECT * FROM users \
         WHERE $1::text IS NULL OR name ILIKE $1 ESCAPE '\\' OR email ILIKE $1 ESCAPE '\\' \
         ORDER BY created_at DESC LIMIT $2 OFFSET $3",
    )
    .bind(pattern.as_deref())
    .bind(limit)
    .bind(offset)
    .fetch_all(&mut *conn)
    .await?;

    let total = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM users WHERE $1::text IS NULL OR name ILIKE $1 ESCAPE '\\' OR email ILIKE $1 ESCAPE '\\'",
    )
    .bind(pattern.as_deref())
    .fetch_one(&mut *conn)
    .await?;

    Ok((users, total))
}
