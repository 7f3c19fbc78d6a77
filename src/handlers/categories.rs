use axum::extract::{Path, State};
use axum::response::Response;
use axum::Json;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::db;
use crate::db::categories::CategoryFields;
use crate::handlers::{managed_event, optional, required, visible_event};
use crate::models::ticket::SaleWindow;
use crate::models::{Event, TicketCategory};
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::{created, empty_success, success};

#[derive(Debug, Deserialize)]
pub struct CategoryInput {
    pub name: String,
    pub description: Option<String>,
    pub section_id: Option<Uuid>,
    pub price: Decimal,
    pub quota: Option<i32>,
    pub sale_start: Option<DateTime<Utc>>,
    pub sale_end: Option<DateTime<Utc>>,
}

/// A category as buyers see it.
#[derive(Debug, Serialize)]
pub struct CategoryView {
    #[serde(flatten)]
    pub category: TicketCategory,
    /// `None` when the quota is unlimited.
    pub remaining: Option<i32>,
    pub on_sale: bool,
}

impl CategoryView {
    pub fn new(category: TicketCategory, now: DateTime<Utc>) -> Self {
        let on_sale =
            category.sale_window(now) == SaleWindow::Open && category.can_fulfil(1);
        Self {
            remaining: category.remaining(),
            on_sale,
            category,
        }
    }
}

impl CategoryInput {
    fn fields(&self) -> Result<CategoryFields<'_>, AppError> {
        let name = required("name", &self.name)?;
        if self.price.is_sign_negative() {
            return Err(AppError::ValidationError(
                "price must not be negative".to_string(),
            ));
        }
        if self.quota.is_some_and(|quota| quota < 1) {
            return Err(AppError::ValidationError(
                "quota must be at least 1; omit it for unlimited".to_string(),
            ));
        }
        if let (Some(start), Some(end)) = (self.sale_start, self.sale_end) {
            if end <= start {
                return Err(AppError::ValidationError(
                    "sale_end must be after sale_start".to_string(),
                ));
            }
        }
        Ok(CategoryFields {
            name,
            description: optional(&self.description),
            section_id: self.section_id,
            price: self.price.round_dp(2),
            quota: self.quota,
            sale_start: self.sale_start,
            sale_end: self.sale_end,
        })
    }
}

async fn check_section(state: &AppState, event: &Event, section_id: Option<Uuid>) -> Result<(), AppError> {
    let Some(section_id) = section_id else {
        return Ok(());
    };
    match db::events::find_section(&state.pool, section_id).await? {
        Some(section) if section.event_id == event.id => Ok(()),
        _ => Err(AppError::ValidationError(
            "section_id does not belong to this event".to_string(),
        )),
    }
}

async fn event_category(
    state: &AppState,
    event: &Event,
    category_id: Uuid,
) -> Result<TicketCategory, AppError> {
    db::categories::find(&state.pool, category_id)
        .await?
        .filter(|category| category.event_id == event.id)
        .ok_or_else(|| AppError::not_found("Ticket category"))
}

pub async fn list(
    State(state): State<AppState>,
    auth: Option<AuthUser>,
    Path(event_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let (event, _) = visible_event(&state, auth.as_ref(), event_id).await?;
    let now = Utc::now();
    let categories: Vec<CategoryView> = db::categories::list_for_event(&state.pool, event.id)
        .await?
        .into_iter()
        .map(|category| CategoryView::new(category, now))
        .collect();
    Ok(success(categories, "Ticket categories"))
}

pub async fn create(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(event_id): Path<Uuid>,
    Json(payload): Json<CategoryInput>,
) -> Result<Response, AppError> {
    let event = managed_event(&state, &auth, event_id).await?;
    let fields = payload.fields()?;
    check_section(&state, &event, fields.section_id).await?;

    let category = db::categories::create(&state.pool, event.id, &fields).await?;
    info!(event_id = %event.id, category_id = %category.id, "Ticket category created");
    Ok(created(category, "Ticket category created"))
}

pub async fn update(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((event_id, category_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<CategoryInput>,
) -> Result<Response, AppError> {
    let event = managed_event(&state, &auth, event_id).await?;
    let current = event_category(&state, &event, category_id).await?;
    let fields = payload.fields()?;

    if fields.quota.is_some_and(|quota| quota < current.sold) {
        return Err(AppError::Conflict(format!(
            "{} tickets are already sold; quota cannot go below that",
            current.sold
        )));
    }
    if current.sold > 0 && fields.section_id != current.section_id {
        return Err(AppError::Conflict(
            "The section of a category with sales cannot change".to_string(),
        ));
    }
    check_section(&state, &event, fields.section_id).await?;

    let category = db::categories::update(&state.pool, current.id, &fields).await?;
    Ok(success(category, "Ticket category updated"))
}

pub async fn delete(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((event_id, category_id)): Path<(Uuid, Uuid)>,
) -> Result<Response, AppError> {
    let event = managed_event(&state, &auth, event_id).await?;
    let category = event_category(&state, &event, category_id).await?;
    if category.sold > 0 {
        return Err(AppError::Conflict(
            "Categories with sold tickets cannot be deleted".to_string(),
        ));
    }
    db::categories::delete(&state.pool, category.id)
        .await
        .map_err(|e| {
            if db::is_foreign_key_violation(&e) {
                AppError::Conflict("Categories with past orders cannot be deleted".to_string())
            } else {
                AppError::from(e)
            }
        })?;
    info!(category_id = %category.id, "Ticket category deleted");
    Ok(empty_success("Ticket category deleted"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn input() -> CategoryInput {
        CategoryInput {
            name: " VIP ".to_string(),
            description: Some(String::new()),
            section_id: None,
            price: Decimal::new(49999, 3),
            quota: Some(50),
            sale_start: None,
            sale_end: None,
        }
    }

    #[test]
    fn test_fields_normalise_input() {
        let input = input();
        let fields = input.fields().unwrap();
        assert_eq!(fields.name, "VIP");
        assert_eq!(fields.description, None);
        assert_eq!(fields.price, Decimal::new(5000, 2));
    }

    #[test]
    fn test_fields_reject_bad_values() {
        let mut negative = input();
        negative.price = Decimal::new(-1, 0);
        assert!(negative.fields().is_err());

        let mut empty_quota = input();
        empty_quota.quota = Some(0);
        assert!(empty_quota.fields().is_err());

        let mut backwards = input();
        let now = Utc::now();
        backwards.sale_start = Some(now);
        backwards.sale_end = Some(now - Duration::hours(1));
        assert!(backwards.fields().is_err());
    }

    #[test]
    fn test_view_reports_availability() {
        let now = Utc::now();
        let category = TicketCategory {
            id: Uuid::new_v4(),
            event_id: Uuid::new_v4(),
            section_id: None,
            name: "Regular".to_string(),
            description: None,
            price: Decimal::ZERO,
            quota: Some(2),
            sold: 2,
            sale_start: None,
            sale_end: None,
            created_at: now,
            updated_at: now,
        };
        let view = CategoryView::new(category, now);
        assert_eq!(view.remaining, Some(0));
        assert!(!view.on_sale);
    }
}
