use axum::extract::{Path, Query, State};
use axum::response::Response;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::db;
use crate::handlers::{optional, required};
use crate::models::{Role, User};
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::{success, PageQuery, Paginated};

#[derive(Debug, Deserialize)]
pub struct ProfileUpdate {
    pub name: String,
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UserSearch {
    pub search: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct RoleGrant {
    pub role: Role,
}

#[derive(Debug, Serialize)]
pub struct UserWithRoles {
    #[serde(flatten)]
    pub user: User,
    pub roles: Vec<Role>,
}

pub async fn update_profile(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<ProfileUpdate>,
) -> Result<Response, AppError> {
    let name = required("name", &payload.name)?;
    let user = db::users::update_profile(&state.pool, auth.id(), name, optional(&payload.phone)).await?;
    Ok(success(user, "Profile updated"))
}

pub async fn list_users(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<UserSearch>,
) -> Result<Response, AppError> {
    auth.require_role(Role::Admin)?;
    let paging = PageQuery {
        page: query.page,
        per_page: query.per_page,
    };

    let mut conn = state.pool.acquire().await?;
    let (users, total) = db::users::list(
        &mut conn,
        optional(&query.search),
        paging.limit(),
        paging.offset(),
    )
    .await?;

    let mut items = Vec::with_capacity(users.len());
    for user in users {
        let roles = db::users::roles_for(&mut *conn, user.id).await?;
        items.push(UserWithRoles { user, roles });
    }

    Ok(success(
        Paginated {
            items,
            page: paging.page(),
            per_page: paging.per_page(),
            total,
        },
        "Users",
    ))
}

pub async fn grant_role(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(user_id): Path<Uuid>,
    Json(payload): Json<RoleGrant>,
) -> Result<Response, AppError> {
    auth.require_role(Role::Admin)?;
    let user = db::users::find_by_id(&state.pool, user_id)
        .await?
        .ok_or_else(|| AppError::not_found("User"))?;

    db::users::grant_role(&state.pool, user.id, payload.role).await?;
    let roles = db::users::roles_for(&state.pool, user.id).await?;
    info!(admin_id = %auth.id(), user_id = %user.id, role = %payload.role, "Role granted");

    Ok(success(UserWithRoles { user, roles }, "Role granted"))
}

pub async fn revoke_role(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((user_id, role)): Path<(Uuid, String)>,
) -> Result<Response, AppError> {
    auth.require_role(Role::Admin)?;
    let role: Role = role.parse()?;
    if user_id == auth.id() && role == Role::Admin {
        return Err(AppError::Conflict(
            "Administrators cannot revoke their own admin role".to_string(),
        ));
    }

    let user = db::users::find_by_id(&state.pool, user_id)
        .await?
        .ok_or_else(|| AppError::not_found("User"))?;
    if !db::users::revoke_role(&state.pool, user.id, role).await? {
        return Err(AppError::NotFound(format!("User does not have the {} role", role)));
    }
    let roles = db::users::roles_for(&state.pool, user.id).await?;
    info!(admin_id = %auth.id(), user_id = %user.id, role = %role, "Role revoked");

    Ok(success(UserWithRoles { user, roles }, "Role revoked"))
}
