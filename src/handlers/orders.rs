use std::collections::HashSet;

use axum::extract::{Path, State};
use axum::response::Response;
use axum::Json;
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgConnection;
use tracing::info;
use uuid::Uuid;

use crate::auth::{policy, AuthUser};
use crate::db;
use crate::db::participants::NewParticipant;
use crate::handlers::{load_event, manages_event, managed_event, optional};
use crate::models::{
    EventStatus, Order, OrderItem, OrderStatus, Participant, Payment, PaymentStatus, SeatStatus,
    TicketCategory,
};
use crate::services::ordering::{self, Attendee, ItemInput};
use crate::services::seating::{self, AllocationError};
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::{created, success};

const FREE_PAYMENT_METHOD: &str = "free";
const DEFAULT_PAYMENT_METHOD: &str = "manual";

#[derive(Debug, Deserialize)]
pub struct OrderInput {
    pub items: Vec<ItemInput>,
    pub payment_method: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PaymentConfirmation {
    pub reference: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct OrderDetail {
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub participants: Vec<Participant>,
    pub payments: Vec<Payment>,
}

/// One order line; attendees carry their seat once seats are assigned.
struct PlannedLine {
    category: TicketCategory,
    attendees: Vec<Attendee>,
}

impl From<AllocationError> for AppError {
    fn from(err: AllocationError) -> Self {
        match err {
            AllocationError::UnknownSeat(id) => {
                AppError::ValidationError(format!("Seat {} is not part of this category's section", id))
            }
            AllocationError::SeatTaken(label) => {
                AppError::Conflict(format!("Seat {} is no longer available", label))
            }
            AllocationError::SoldOut => AppError::Conflict("No seats left in this section".to_string()),
        }
    }
}

async fn order_detail(state: &AppState, order: Order) -> Result<OrderDetail, AppError> {
    let items = db::orders::items(&state.pool, order.id).await?;
    let participants = db::participants::list_for_order(&state.pool, order.id).await?;
    let payments = db::orders::payments(&state.pool, order.id).await?;
    Ok(OrderDetail {
        order,
        items,
        participants,
        payments,
    })
}

async fn check_companies(conn: &mut PgConnection, attendees: &[Attendee]) -> Result<(), AppError> {
    let ids: HashSet<Uuid> = attendees.iter().filter_map(|a| a.company_id).collect();
    for id in ids {
        if db::companies::find(&mut *conn, id).await?.is_none() {
            return Err(AppError::ValidationError(format!("Company {} does not exist", id)));
        }
    }
    Ok(())
}

/// Takes quota for every line. Lines must already be sorted by category id so
/// that concurrent orders lock category rows in the same order.
async fn reserve_quota(conn: &mut PgConnection, lines: &[PlannedLine]) -> Result<(), AppError> {
    for line in lines {
        let quantity = line.attendees.len() as i32;
        if db::categories::reserve(&mut *conn, line.category.id, quantity)
            .await?
            .is_none()
        {
            return Err(AppError::Conflict(format!(
                "Not enough '{}' tickets left",
                line.category.name
            )));
        }
    }
    Ok(())
}

/// Gives every attendee of a seated line a seat, one section at a time in
/// ascending section id order.
async fn assign_seats(
    conn: &mut PgConnection,
    lines: &mut [PlannedLine],
    seat_status: SeatStatus,
) -> Result<(), AppError> {
    let sections: Vec<Option<Uuid>> = lines.iter().map(|line| line.category.section_id).collect();
    for (section_id, indexes) in ordering::section_batches(&sections) {
        let seats = db::events::seats_for_update(&mut *conn, section_id).await?;
        let requests: Vec<Option<Uuid>> = indexes
            .iter()
            .flat_map(|&i| lines[i].attendees.iter().map(|a| a.seat_id))
            .collect();
        let assigned = seating::allocate(&seats, &requests)?;
        db::events::set_seat_status(&mut *conn, &assigned, seat_status).await?;

        let mut assigned = assigned.into_iter();
        for &i in &indexes {
            for attendee in lines[i].attendees.iter_mut() {
                attendee.seat_id = assigned.next();
            }
        }
    }
    Ok(())
}

pub async fn create(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(event_id): Path<Uuid>,
    Json(payload): Json<OrderInput>,
) -> Result<Response, AppError> {
    ordering::validate_items(&payload.items)?;
    let now = Utc::now();

    let mut tx = state.pool.begin().await?;
    let event = db::events::find(&mut *tx, event_id)
        .await?
        .filter(|event| event.status != EventStatus::Draft)
        .ok_or_else(|| AppError::not_found("Event"))?;
    if !event.accepts_orders(now) {
        return Err(AppError::Conflict(
            "This event is not open for registration".to_string(),
        ));
    }

    let mut lines = Vec::with_capacity(payload.items.len());
    let mut total = Decimal::ZERO;
    for item in &payload.items {
        let category = db::categories::find(&mut *tx, item.ticket_category_id)
            .await?
            .ok_or_else(|| AppError::not_found("Ticket category"))?;
        let attendees = ordering::resolve_attendees(item, &auth.user);
        ordering::check_category(&event, &category, &attendees, now)?;
        check_companies(&mut tx, &attendees).await?;
        total += ordering::line_total(category.price, item.quantity);
        lines.push(PlannedLine {
            category,
            attendees,
        });
    }

    let free = total.is_zero();
    let (order_status, seat_status) = if free {
        (OrderStatus::Paid, SeatStatus::Booked)
    } else {
        (OrderStatus::Pending, SeatStatus::Reserved)
    };

    lines.sort_by_key(|line| line.category.id);
    reserve_quota(&mut tx, &lines).await?;
    assign_seats(&mut tx, &mut lines, seat_status).await?;

    let order = db::orders::insert_order(&mut tx, auth.id(), event.id, order_status, total).await?;
    for line in &lines {
        let item = db::orders::insert_item(
            &mut tx,
            order.id,
            line.category.id,
            line.attendees.len() as i32,
            line.category.price,
        )
        .await?;
        for attendee in &line.attendees {
            db::participants::insert(
                &mut *tx,
                &NewParticipant {
                    order_item_id: item.id,
                    event_id: event.id,
                    user_id: auth.id(),
                    seat_id: attendee.seat_id,
                    company_id: attendee.company_id,
                    name: &attendee.name,
                    email: &attendee.email,
                    phone: attendee.phone.as_deref(),
                },
            )
            .await?;
        }
    }

    if free {
        db::orders::insert_payment(
            &mut *tx,
            order.id,
            total,
            FREE_PAYMENT_METHOD,
            PaymentStatus::Paid,
            Some(now),
        )
        .await?;
    } else {
        let method = optional(&payload.payment_method).unwrap_or(DEFAULT_PAYMENT_METHOD);
        db::orders::insert_payment(&mut *tx, order.id, total, method, PaymentStatus::Pending, None)
            .await?;
    }
    tx.commit().await?;

    info!(
        order_id = %order.id,
        event_id = %event.id,
        user_id = %auth.id(),
        total = %total,
        status = %order.status,
        "Order placed"
    );
    let message = if free {
        "Registration complete"
    } else {
        "Order placed, awaiting payment"
    };
    Ok(created(order_detail(&state, order).await?, message))
}

pub async fn list_mine(State(state): State<AppState>, auth: AuthUser) -> Result<Response, AppError> {
    let orders = db::orders::list_for_user(&state.pool, auth.id()).await?;
    Ok(success(orders, "Orders"))
}

pub async fn show(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(order_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let order = db::orders::find(&state.pool, order_id)
        .await?
        .ok_or_else(|| AppError::not_found("Order"))?;
    let manager = if order.user_id == auth.id() {
        false
    } else {
        let event = load_event(&state, order.event_id).await?;
        manages_event(&state, &auth, &event).await?
    };
    if !policy::can_view_order(auth.id(), order.user_id, manager) {
        return Err(AppError::Forbidden(
            "Only the buyer or the event's organizers can view this order".to_string(),
        ));
    }
    Ok(success(order_detail(&state, order).await?, "Order"))
}

pub async fn cancel(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(order_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let mut tx = state.pool.begin().await?;
    let order = db::orders::find_for_update(&mut tx, order_id)
        .await?
        .ok_or_else(|| AppError::not_found("Order"))?;
    if order.user_id != auth.id() && !auth.is_admin() {
        return Err(AppError::Forbidden(
            "Only the buyer can cancel this order".to_string(),
        ));
    }
    if order.status != OrderStatus::Pending {
        return Err(AppError::Conflict(format!(
            "A {} order cannot be cancelled",
            order.status
        )));
    }

    for item in db::orders::items(&mut *tx, order.id).await? {
        db::categories::release(&mut *tx, item.ticket_category_id, item.quantity).await?;
    }
    let seats = db::orders::seat_ids(&mut *tx, order.id).await?;
    db::events::set_seat_status(&mut *tx, &seats, SeatStatus::Available).await?;
    db::orders::settle_payments(&mut *tx, order.id, PaymentStatus::Failed, None, Utc::now()).await?;
    let order = db::orders::set_status(&mut *tx, order.id, OrderStatus::Cancelled).await?;
    tx.commit().await?;

    info!(order_id = %order.id, user_id = %auth.id(), seats = seats.len(), "Order cancelled");
    Ok(success(order_detail(&state, order).await?, "Order cancelled"))
}

pub async fn confirm_payment(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(order_id): Path<Uuid>,
    payload: Option<Json<PaymentConfirmation>>,
) -> Result<Response, AppError> {
    let reference = payload.and_then(|Json(p)| p.reference);
    let order = db::orders::find(&state.pool, order_id)
        .await?
        .ok_or_else(|| AppError::not_found("Order"))?;
    managed_event(&state, &auth, order.event_id).await?;

    let now = Utc::now();
    let mut tx = state.pool.begin().await?;
    let order = db::orders::find_for_update(&mut tx, order.id)
        .await?
        .ok_or_else(|| AppError::not_found("Order"))?;
    if order.status != OrderStatus::Pending {
        return Err(AppError::Conflict(format!(
            "A {} order cannot be marked paid",
            order.status
        )));
    }

    let seats = db::orders::seat_ids(&mut *tx, order.id).await?;
    db::events::set_seat_status(&mut *tx, &seats, SeatStatus::Booked).await?;
    db::orders::settle_payments(
        &mut *tx,
        order.id,
        PaymentStatus::Paid,
        optional(&reference),
        now,
    )
    .await?;
    let order = db::orders::set_status(&mut *tx, order.id, OrderStatus::Paid).await?;
    tx.commit().await?;

    info!(order_id = %order.id, confirmed_by = %auth.id(), "Payment confirmed");
    Ok(success(order_detail(&state, order).await?, "Payment confirmed"))
}
