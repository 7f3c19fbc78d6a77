//! Checks and arithmetic for placing an order, kept apart from SQL.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use crate::models::ticket::SaleWindow;
use crate::models::{Event, TicketCategory, User};
use crate::utils::error::AppError;

pub const MAX_QUANTITY_PER_ITEM: i32 = 10;
pub const MAX_ITEMS_PER_ORDER: usize = 10;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AttendeeInput {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company_id: Option<Uuid>,
    pub seat_id: Option<Uuid>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ItemInput {
    pub ticket_category_id: Uuid,
    pub quantity: i32,
    #[serde(default)]
    pub attendees: Vec<AttendeeInput>,
}

/// A ticket holder after defaults from the buyer have been applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attendee {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub company_id: Option<Uuid>,
    pub seat_id: Option<Uuid>,
}

pub fn validate_items(items: &[ItemInput]) -> Result<(), AppError> {
    if items.is_empty() {
        return Err(AppError::ValidationError(
            "An order needs at least one item".to_string(),
        ));
    }
    if items.len() > MAX_ITEMS_PER_ORDER {
        return Err(AppError::ValidationError(format!(
            "An order holds at most {} items",
            MAX_ITEMS_PER_ORDER
        )));
    }

    let mut seen = HashSet::new();
    for item in items {
        if !seen.insert(item.ticket_category_id) {
            return Err(AppError::ValidationError(
                "Each ticket category may appear only once per order".to_string(),
            ));
        }
        if !(1..=MAX_QUANTITY_PER_ITEM).contains(&item.quantity) {
            return Err(AppError::ValidationError(format!(
                "quantity must be between 1 and {}",
                MAX_QUANTITY_PER_ITEM
            )));
        }
        if !item.attendees.is_empty() && item.attendees.len() != item.quantity as usize {
            return Err(AppError::ValidationError(
                "attendees must be empty or list one person per ticket".to_string(),
            ));
        }
    }
    Ok(())
}

/// One attendee per ticket. Missing names and emails fall back to the buyer.
pub fn resolve_attendees(item: &ItemInput, buyer: &User) -> Vec<Attendee> {
    let inputs = if item.attendees.is_empty() {
        vec![AttendeeInput::default(); item.quantity.max(0) as usize]
    } else {
        item.attendees.clone()
    };

    inputs
        .into_iter()
        .map(|input| Attendee {
            name: non_blank(input.name).unwrap_or_else(|| buyer.name.clone()),
            email: non_blank(input.email)
                .map(|e| crate::models::user::normalize_email(&e))
                .unwrap_or_else(|| buyer.email.clone()),
            phone: non_blank(input.phone).or_else(|| buyer.phone.clone()),
            company_id: input.company_id,
            seat_id: input.seat_id,
        })
        .collect()
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Everything about a category that can be judged before touching stock.
pub fn check_category(
    event: &Event,
    category: &TicketCategory,
    attendees: &[Attendee],
    now: DateTime<Utc>,
) -> Result<(), AppError> {
    if category.event_id != event.id {
        return Err(AppError::ValidationError(format!(
            "Ticket category {} does not belong to this event",
            category.id
        )));
    }
    match category.sale_window(now) {
        SaleWindow::Open => {}
        SaleWindow::NotStarted => {
            return Err(AppError::Conflict(format!(
                "Sales for '{}' have not started",
                category.name
            )))
        }
        SaleWindow::Closed => {
            return Err(AppError::Conflict(format!(
                "Sales for '{}' have ended",
                category.name
            )))
        }
    }
    if category.section_id.is_none() && attendees.iter().any(|a| a.seat_id.is_some()) {
        return Err(AppError::ValidationError(format!(
            "'{}' tickets are not seated",
            category.name
        )));
    }
    if !category.can_fulfil(attendees.len() as i32) {
        return Err(AppError::Conflict(format!(
            "Only {} '{}' tickets left",
            category.remaining().unwrap_or(0),
            category.name
        )));
    }
    Ok(())
}

/// Positions of seated lines grouped by section, sections in ascending id
/// order. Locking sections in this order keeps concurrent orders from
/// waiting on each other in a cycle.
pub fn section_batches(sections: &[Option<Uuid>]) -> Vec<(Uuid, Vec<usize>)> {
    let mut batches: BTreeMap<Uuid, Vec<usize>> = BTreeMap::new();
    for (index, section) in sections.iter().enumerate() {
        if let Some(section_id) = section {
            batches.entry(*section_id).or_default().push(index);
        }
    }
    batches.into_iter().collect()
}

pub fn line_total(unit_price: Decimal, quantity: i32) -> Decimal {
    unit_price * Decimal::from(quantity)
}
