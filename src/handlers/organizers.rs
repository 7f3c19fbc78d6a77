use axum::extract::State;
use axum::response::Response;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::auth::AuthUser;
use crate::db;
use crate::handlers::{optional, required};
use crate::models::user::{is_valid_email, normalize_email};
use crate::models::{Event, Organizer, Role};
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::{created, success};

#[derive(Debug, Deserialize)]
pub struct OrganizerInput {
    pub name: String,
    pub description: Option<String>,
    /// Defaults to the account email.
    pub contact_email: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct OrganizerDashboard {
    pub organizer: Organizer,
    pub events: Vec<Event>,
}

fn contact_email(auth: &AuthUser, input: &OrganizerInput) -> Result<String, AppError> {
    let email = optional(&input.contact_email)
        .map(normalize_email)
        .unwrap_or_else(|| auth.user.email.clone());
    if is_valid_email(&email) {
        Ok(email)
    } else {
        Err(AppError::ValidationError(
            "contact_email must be a valid email address".to_string(),
        ))
    }
}

pub(crate) async fn own_organizer(state: &AppState, auth: &AuthUser) -> Result<Organizer, AppError> {
    db::organizers::find_by_user(&state.pool, auth.id())
        .await?
        .ok_or_else(|| AppError::Forbidden("Create an organizer profile first".to_string()))
}

/// Creates the caller's organizer profile and grants the organizer role.
pub async fn create_profile(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<OrganizerInput>,
) -> Result<Response, AppError> {
    let name = required("name", &payload.name)?;
    let email = contact_email(&auth, &payload)?;

    let mut tx = state.pool.begin().await?;
    if db::organizers::find_by_user(&mut *tx, auth.id()).await?.is_some() {
        return Err(AppError::Conflict(
            "You already have an organizer profile".to_string(),
        ));
    }
    let organizer = db::organizers::create(
        &mut *tx,
        auth.id(),
        name,
        optional(&payload.description),
        &email,
    )
    .await
    .map_err(|e| db::conflict_on_duplicate(e, "You already have an organizer profile"))?;
    db::users::grant_role(&mut *tx, auth.id(), Role::Organizer).await?;
    tx.commit().await?;

    info!(user_id = %auth.id(), organizer_id = %organizer.id, "Organizer profile created");
    Ok(created(organizer, "Organizer profile created"))
}

pub async fn show_profile(State(state): State<AppState>, auth: AuthUser) -> Result<Response, AppError> {
    let organizer = own_organizer(&state, &auth).await?;
    let events = db::events::list_for_organizer(&state.pool, organizer.id).await?;
    Ok(success(OrganizerDashboard { organizer, events }, "Organizer profile"))
}

pub async fn update_profile(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<OrganizerInput>,
) -> Result<Response, AppError> {
    let organizer = own_organizer(&state, &auth).await?;
    let name = required("name", &payload.name)?;
    let email = contact_email(&auth, &payload)?;
    let organizer = db::organizers::update(
        &state.pool,
        organizer.id,
        name,
        optional(&payload.description),
        &email,
    )
    .await?;
    Ok(success(organizer, "Organizer profile updated"))
}
