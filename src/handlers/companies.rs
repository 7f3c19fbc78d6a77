use axum::extract::{Path, Query, State};
use axum::response::Response;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::db;
use crate::db::companies::CompanyFields;
use crate::handlers::{optional, required};
use crate::models::Role;
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::{created, empty_success, success};

#[derive(Debug, Deserialize)]
pub struct CompanyInput {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CompanySearch {
    pub search: Option<String>,
}

impl CompanyInput {
    fn fields(&self) -> Result<CompanyFields<'_>, AppError> {
        Ok(CompanyFields {
            name: required("name", &self.name)?,
            email: optional(&self.email),
            phone: optional(&self.phone),
            address: optional(&self.address),
        })
    }
}

pub async fn list(
    State(state): State<AppState>,
    _auth: AuthUser,
    Query(query): Query<CompanySearch>,
) -> Result<Response, AppError> {
    let companies = db::companies::list(&state.pool, optional(&query.search)).await?;
    Ok(success(companies, "Companies"))
}

pub async fn create(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<CompanyInput>,
) -> Result<Response, AppError> {
    auth.require_role(Role::Organizer)?;
    let company = db::companies::create(&state.pool, &payload.fields()?).await?;
    Ok(created(company, "Company created"))
}

pub async fn update(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<CompanyInput>,
) -> Result<Response, AppError> {
    auth.require_role(Role::Organizer)?;
    let company = db::companies::update(&state.pool, id, &payload.fields()?)
        .await?
        .ok_or_else(|| AppError::not_found("Company"))?;
    Ok(success(company, "Company updated"))
}

pub async fn delete(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    auth.require_role(Role::Organizer)?;
    if !db::companies::delete(&state.pool, id).await? {
        return Err(AppError::not_found("Company"));
    }
    Ok(empty_success("Company deleted"))
}
