use axum::extract::{Path, State};
use axum::response::Response;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::db;
use crate::handlers::{managed_event, required, visible_event};
use crate::models::{EventSeat, EventSection};
use crate::services::seating;
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::{created, empty_success, success};

#[derive(Debug, Deserialize)]
pub struct SectionInput {
    pub name: String,
    pub rows: i32,
    pub seats_per_row: i32,
}

#[derive(Debug, Serialize)]
pub struct SectionSeats {
    pub section: EventSection,
    pub seats: Vec<EventSeat>,
}

async fn event_section(
    state: &AppState,
    event_id: Uuid,
    section_id: Uuid,
) -> Result<EventSection, AppError> {
    db::events::find_section(&state.pool, section_id)
        .await?
        .filter(|section| section.event_id == event_id)
        .ok_or_else(|| AppError::not_found("Section"))
}

pub async fn list(
    State(state): State<AppState>,
    auth: Option<AuthUser>,
    Path(event_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let (event, _) = visible_event(&state, auth.as_ref(), event_id).await?;
    let sections = db::events::list_sections(&state.pool, event.id).await?;
    Ok(success(sections, "Sections"))
}

pub async fn create(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(event_id): Path<Uuid>,
    Json(payload): Json<SectionInput>,
) -> Result<Response, AppError> {
    let event = managed_event(&state, &auth, event_id).await?;
    let name = required("name", &payload.name)?;
    seating::validate_dimensions(payload.rows, payload.seats_per_row)
        .map_err(AppError::ValidationError)?;

    let seats = seating::layout(payload.rows, payload.seats_per_row);
    let mut tx = state.pool.begin().await?;
    let section = db::events::create_section(
        &mut tx,
        event.id,
        name,
        payload.rows,
        payload.seats_per_row,
        &seats,
    )
    .await?;
    tx.commit().await?;

    info!(
        event_id = %event.id,
        section_id = %section.id,
        seats = seats.len(),
        "Section created"
    );
    Ok(created(section, "Section created"))
}

pub async fn seats(
    State(state): State<AppState>,
    auth: Option<AuthUser>,
    Path((event_id, section_id)): Path<(Uuid, Uuid)>,
) -> Result<Response, AppError> {
    let (event, _) = visible_event(&state, auth.as_ref(), event_id).await?;
    let section = event_section(&state, event.id, section_id).await?;
    let seats = db::events::list_seats(&state.pool, section.id).await?;
    Ok(success(SectionSeats { section, seats }, "Seats"))
}

pub async fn delete(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((event_id, section_id)): Path<(Uuid, Uuid)>,
) -> Result<Response, AppError> {
    let event = managed_event(&state, &auth, event_id).await?;
    let section = event_section(&state, event.id, section_id).await?;

    let taken = db::events::count_taken_seats(&state.pool, section.id).await?;
    if taken > 0 {
        return Err(AppError::Conflict(format!(
            "{} seats in this section are reserved or booked",
            taken
        )));
    }
    db::events::delete_section(&state.pool, section.id).await?;
    info!(section_id = %section.id, "Section deleted");
    Ok(empty_success("Section deleted"))
}
