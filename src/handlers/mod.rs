use uuid::Uuid;

use crate::auth::{policy, AuthUser};
use crate::db;
use crate::models::Event;
use crate::state::AppState;
use crate::utils::error::AppError;

pub mod auth;
pub mod categories;
pub mod checkin;
pub mod companies;
pub mod events;
pub mod health;
pub mod orders;
pub mod organizers;
pub mod sections;
pub mod users;

pub use health::{health_check, readiness_check};

/// Trimmed, non-empty text field.
pub(crate) fn required<'a>(field: &str, value: &'a str) -> Result<&'a str, AppError> {
    let value = value.trim();
    if value.is_empty() {
        Err(AppError::ValidationError(format!("{} is required", field)))
    } else {
        Ok(value)
    }
}

/// Blank optional fields are treated as absent.
pub(crate) fn optional(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

pub(crate) async fn load_event(state: &AppState, event_id: Uuid) -> Result<Event, AppError> {
    db::events::find(&state.pool, event_id)
        .await?
        .ok_or_else(|| AppError::not_found("Event"))
}

pub(crate) async fn manages_event(
    state: &AppState,
    auth: &AuthUser,
    event: &Event,
) -> Result<bool, AppError> {
    if auth.is_admin() {
        return Ok(true);
    }
    let own = db::organizers::find_by_user(&state.pool, auth.id())
        .await?
        .map(|organizer| organizer.id);
    Ok(policy::can_manage_event(&auth.roles, own, event.organizer_id))
}

/// Loads the event and fails with 403 unless the caller manages it.
pub(crate) async fn managed_event(
    state: &AppState,
    auth: &AuthUser,
    event_id: Uuid,
) -> Result<Event, AppError> {
    let event = load_event(state, event_id).await?;
    if manages_event(state, auth, &event).await? {
        Ok(event)
    } else {
        Err(AppError::Forbidden(
            "You do not manage this event".to_string(),
        ))
    }
}

/// Unpublished events are hidden from everyone except their managers.
pub(crate) async fn visible_event(
    state: &AppState,
    auth: Option<&AuthUser>,
    event_id: Uuid,
) -> Result<(Event, bool), AppError> {
    let event = load_event(state, event_id).await?;
    let manager = match auth {
        Some(auth) => manages_event(state, auth, &event).await?,
        None => false,
    };
    if event.status == crate::models::EventStatus::Draft && !manager {
        return Err(AppError::not_found("Event"));
    }
    Ok((event, manager))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_trims() {
        assert_eq!(required("name", "  Jane ").unwrap(), "Jane");
        let err = required("name", "   ").unwrap_err();
        assert!(matches!(err, AppError::ValidationError(msg) if msg == "name is required"));
    }

    #[test]
    fn test_optional_blank_is_none() {
        assert_eq!(optional(&Some("  ".to_string())), None);
        assert_eq!(optional(&Some(" x ".to_string())), Some("x"));
        assert_eq!(optional(&None), None);
    }
}
