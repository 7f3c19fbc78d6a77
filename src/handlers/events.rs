use axum::extract::{Path, Query, State};
use axum::response::Response;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::db;
use crate::db::events::{EventFields, VenueFields};
use crate::handlers::categories::CategoryView;
use crate::handlers::organizers::own_organizer;
use crate::handlers::{managed_event, optional, required, visible_event};
use crate::models::{Event, EventSection, EventStatus, EventVenue, Role};
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::{created, empty_success, success, PageQuery, Paginated};

#[derive(Debug, Deserialize)]
pub struct EventInput {
    pub title: String,
    pub description: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct VenueInput {
    pub name: String,
    pub address: String,
    pub city: Option<String>,
    pub capacity: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct EventDetail {
    pub event: Event,
    pub venue: Option<EventVenue>,
    pub categories: Vec<CategoryView>,
    pub sections: Vec<EventSection>,
    /// Whether the caller may edit the event.
    pub can_manage: bool,
}

impl EventInput {
    fn fields(&self) -> Result<EventFields<'_>, AppError> {
        let title = required("title", &self.title)?;
        if let Some(end) = self.end_time {
            if end <= self.start_time {
                return Err(AppError::ValidationError(
                    "end_time must be after start_time".to_string(),
                ));
            }
        }
        Ok(EventFields {
            title,
            description: optional(&self.description),
            start_time: self.start_time,
            end_time: self.end_time,
        })
    }
}

pub async fn list(
    State(state): State<AppState>,
    Query(paging): Query<PageQuery>,
) -> Result<Response, AppError> {
    let mut conn = state.pool.acquire().await?;
    let (items, total) =
        db::events::list_published(&mut conn, Utc::now(), paging.limit(), paging.offset()).await?;
    Ok(success(
        Paginated {
            items,
            page: paging.page(),
            per_page: paging.per_page(),
            total,
        },
        "Events",
    ))
}

pub async fn show(
    State(state): State<AppState>,
    auth: Option<AuthUser>,
    Path(event_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let (event, can_manage) = visible_event(&state, auth.as_ref(), event_id).await?;
    let venue = db::events::find_venue(&state.pool, event.id).await?;
    let now = Utc::now();
    let categories = db::categories::list_for_event(&state.pool, event.id)
        .await?
        .into_iter()
        .map(|category| CategoryView::new(category, now))
        .collect();
    let sections = db::events::list_sections(&state.pool, event.id).await?;

    Ok(success(
        EventDetail {
            event,
            venue,
            categories,
            sections,
            can_manage,
        },
        "Event",
    ))
}

pub async fn create(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<EventInput>,
) -> Result<Response, AppError> {
    auth.require_role(Role::Organizer)?;
    let organizer = own_organizer(&state, &auth).await?;
    let fields = payload.fields()?;
    if fields.start_time <= Utc::now() {
        return Err(AppError::ValidationError(
            "start_time must be in the future".to_string(),
        ));
    }

    let event = db::events::create(&state.pool, organizer.id, &fields).await?;
    info!(event_id = %event.id, organizer_id = %organizer.id, "Event created");
    Ok(created(event, "Event created"))
}

pub async fn update(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(event_id): Path<Uuid>,
    Json(payload): Json<EventInput>,
) -> Result<Response, AppError> {
    let event = managed_event(&state, &auth, event_id).await?;
    if event.status == EventStatus::Cancelled {
        return Err(AppError::Conflict(
            "Cancelled events cannot be edited".to_string(),
        ));
    }
    let event = db::events::update(&state.pool, event.id, &payload.fields()?).await?;
    Ok(success(event, "Event updated"))
}

async fn transition(
    state: &AppState,
    auth: &AuthUser,
    event_id: Uuid,
    next: EventStatus,
) -> Result<Event, AppError> {
    let event = managed_event(state, auth, event_id).await?;
    if !event.status.can_transition_to(next) {
        return Err(AppError::Conflict(format!(
            "A {} event cannot become {}",
            event.status, next
        )));
    }
    let event = db::events::set_status(&state.pool, event.id, next).await?;
    info!(event_id = %event.id, status = %next, user_id = %auth.id(), "Event status changed");
    Ok(event)
}

pub async fn publish(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(event_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let draft = managed_event(&state, &auth, event_id).await?;
    if draft.has_ended(Utc::now()) {
        return Err(AppError::Conflict(
            "Past events cannot be published".to_string(),
        ));
    }
    if db::categories::list_for_event(&state.pool, draft.id).await?.is_empty() {
        return Err(AppError::ValidationError(
            "Add at least one ticket category before publishing".to_string(),
        ));
    }
    let event = transition(&state, &auth, event_id, EventStatus::Published).await?;
    Ok(success(event, "Event published"))
}

pub async fn cancel(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(event_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let event = transition(&state, &auth, event_id, EventStatus::Cancelled).await?;
    Ok(success(event, "Event cancelled"))
}

pub async fn delete(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(event_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let event = managed_event(&state, &auth, event_id).await?;
    if event.status != EventStatus::Draft {
        return Err(AppError::Conflict(
            "Only draft events can be deleted; cancel it instead".to_string(),
        ));
    }
    db::events::delete(&state.pool, event.id).await?;
    info!(event_id = %event.id, "Event deleted");
    Ok(empty_success("Event deleted"))
}

pub async fn show_venue(
    State(state): State<AppState>,
    auth: Option<AuthUser>,
    Path(event_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let (event, _) = visible_event(&state, auth.as_ref(), event_id).await?;
    let venue = db::events::find_venue(&state.pool, event.id)
        .await?
        .ok_or_else(|| AppError::not_found("Venue"))?;
    Ok(success(venue, "Venue"))
}

pub async fn upsert_venue(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(event_id): Path<Uuid>,
    Json(payload): Json<VenueInput>,
) -> Result<Response, AppError> {
    let event = managed_event(&state, &auth, event_id).await?;
    if payload.capacity.is_some_and(|c| c < 1) {
        return Err(AppError::ValidationError(
            "capacity must be positive".to_string(),
        ));
    }
    let fields = VenueFields {
        name: required("name", &payload.name)?,
        address: required("address", &payload.address)?,
        city: optional(&payload.city),
        capacity: payload.capacity,
    };
    let venue = db::events::upsert_venue(&state.pool, event.id, &fields).await?;
    Ok(success(venue, "Venue saved"))
}
