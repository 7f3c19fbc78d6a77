use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgExecutor};
use tracing::warn;
use uuid::Uuid;

use crate::models::{Order, OrderItem, OrderStatus, Payment, PaymentStatus};
use crate::services::codes::{self, CodeKind};
use crate::utils::error::AppError;

/// Inserts the order under a fresh ticket code, drawing again on collision.
pub async fn insert_order(
    conn: &mut PgConnection,
    user_id: Uuid,
    event_id: Uuid,
    status: OrderStatus,
    total_amount: Decimal,
) -> Result<Order, AppError> {
    insert_order_with_codes(conn, user_id, event_id, status, total_amount, || {
        codes::generate(CodeKind::Ticket, &mut rand::thread_rng())
    })
    .await
}

pub(crate) async fn insert_order_with_codes(
    conn: &mut PgConnection,
    user_id: Uuid,
    event_id: Uuid,
    status: OrderStatus,
    total_amount: Decimal,
    mut draw: impl FnMut() -> String,
) -> Result<Order, AppError> {
    for attempt in 1..=codes::MAX_ATTEMPTS {
        let ticket_code = draw();
        let inserted = sqlx::query_as::<_, Order>(
            "INSERT INTO orders (id, user_id, event_id, ticket_code, status, total_amount) \
             VALUES ($1, $2, $3, $4, $5, $6) ON CONFLICT (ticket_code) DO NOTHING RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(event_id)
        .bind(&ticket_code)
        .bind(status)
        .bind(total_amount)
        .fetch_optional(&mut *conn)
        .await?;

        match inserted {
            Some(order) => return Ok(order),
            None => warn!(attempt, kind = CodeKind::Ticket.label(), "Code collision, retrying"),
        }
    }
    Err(exhausted(CodeKind::Ticket))
}

pub async fn insert_item(
    conn: &mut PgConnection,
    order_id: Uuid,
    ticket_category_id: Uuid,
    quantity: i32,
    unit_price: Decimal,
) -> Result<OrderItem, AppError> {
    insert_item_with_codes(conn, order_id, ticket_category_id, quantity, unit_price, || {
        codes::generate(CodeKind::Booking, &mut rand::thread_rng())
    })
    .await
}

pub(crate) async fn insert_item_with_codes(
    conn: &mut PgConnection,
    order_id: Uuid,
    ticket_category_id: Uuid,
    quantity: i32,
    unit_price: Decimal,
    mut draw: impl FnMut() -> String,
) -> Result<OrderItem, AppError> {
    let subtotal = unit_price * Decimal::from(quantity);
    for attempt in 1..=codes::MAX_ATTEMPTS {
        let booking_code = draw();
        let inserted = sqlx::query_as::<_, OrderItem>(
            "INSERT INTO order_items (id, order_id, ticket_category_id, booking_code, quantity, unit_price, subtotal) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) ON CONFLICT (booking_code) DO NOTHING RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(order_id)
        .bind(ticket_category_id)
        .bind(&booking_code)
        .bind(quantity)
        .bind(unit_price)
        .bind(subtotal)
        .fetch_optional(&mut *conn)
        .await?;

        match inserted {
            Some(item) => return Ok(item),
            None => warn!(attempt, kind = CodeKind::Booking.label(), "Code collision, retrying"),
        }
    }
    Err(exhausted(CodeKind::Booking))
}

fn exhausted(kind: CodeKind) -> AppError {
    AppError::InternalServerError(format!(
        "Could not generate a unique {} after {} attempts",
        kind.label(),
        codes::MAX_ATTEMPTS
    ))
}

pub async fn find<'e>(db: impl PgExecutor<'e>, id: Uuid) -> Result<Option<Order>, sqlx::Error> {
    sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1")
        .bind(id)
        .fetch_optional(db)
        .await
}

pub async fn find_for_update(conn: &mut PgConnection, id: Uuid) -> Result<Option<Order>, sqlx::Error> {
    sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
}

pub async fn find_by_ticket_code<'e>(
    db: impl PgExecutor<'e>,
    ticket_code: &str,
) -> Result<Option<Order>, sqlx::Error> {
    sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE ticket_code = $1")
        .bind(ticket_code)
        .fetch_optional(db)
        .await
}

pub async fn find_item_by_booking_code<'e>(
    db: impl PgExecutor<'e>,
    booking_code: &str,
) -> Result<Option<OrderItem>, sqlx::Error> {
    sqlx::query_as::<_, OrderItem>("SELECT * FROM order_items WHERE booking_code = $1")
        .bind(booking_code)
        .fetch_optional(db)
        .await
}

pub async fn find_item<'e>(db: impl PgExecutor<'e>, id: Uuid) -> Result<Option<OrderItem>, sqlx::Error> {
    sqlx::query_as::<_, OrderItem>("SELECT * FROM order_items WHERE id = $1")
        .bind(id)
        .fetch_optional(db)
        .await
}

pub async fn list_for_user<'e>(db: impl PgExecutor<'e>, user_id: Uuid) -> Result<Vec<Order>, sqlx::Error> {
    sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE user_id = $1 ORDER BY created_at DESC")
        .bind(user_id)
        .fetch_all(db)
        .await
}

pub async fn items<'e>(db: impl PgExecutor<'e>, order_id: Uuid) -> Result<Vec<OrderItem>, sqlx::Error> {
    sqlx::query_as::<_, OrderItem>("SELECT * FROM order_items WHERE order_id = $1 ORDER BY created_at")
        .bind(order_id)
        .fetch_all(db)
        .await
}

pub async fn set_status<'e>(
    db: impl PgExecutor<'e>,
    id: Uuid,
    status: OrderStatus,
) -> Result<Order, sqlx::Error> {
    sqlx::query_as::<_, Order>(
        "UPDATE orders SET status = $2, updated_at = now() WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(status)
    .fetch_one(db)
    .await
}

/// Seats held by the order's participants.
pub async fn seat_ids<'e>(db: impl PgExecutor<'e>, order_id: Uuid) -> Result<Vec<Uuid>, sqlx::Error> {
    sqlx::query_scalar::<_, Uuid>(
        "SELECT p.seat_id FROM participants p JOIN order_items oi ON oi.id = p.order_item_id \
         WHERE oi.order_id = $1 AND p.seat_id IS NOT NULL",
    )
    .bind(order_id)
    .fetch_all(db)
    .await
}

// Payments

pub async fn insert_payment<'e>(
    db: impl PgExecutor<'e>,
    order_id: Uuid,
    amount: Decimal,
    method: &str,
    status: PaymentStatus,
    paid_at: Option<DateTime<Utc>>,
) -> Result<Payment, sqlx::Error> {
    sqlx::query_as::<_, Payment>(
        "INSERT INTO payments (id, order_id, amount, method, status, paid_at) \
         VALUES ($1, $2, $3, $4, $5, $6) RETURNING *",
    )
    .bind(Uuid::new_v4())
    .bind(order_id)
    .bind(amount)
    .bind(method)
    .bind(status)
    .bind(paid_at)
    .fetch_one(db)
    .await
}

pub async fn payments<'e>(db: impl PgExecutor<'e>, order_id: Uuid) -> Result<Vec<Payment>, sqlx::Error> {
    sqlx::query_as::<_, Payment>("SELECT * FROM payments WHERE order_id = $1 ORDER BY created_at")
        .bind(order_id)
        .fetch_all(db)
        .await
}

/// Settles the order's pending payments. Returns how many rows changed.
pub async fn settle_payments<'e>(
    db: impl PgExecutor<'e>,
    order_id: Uuid,
    status: PaymentStatus,
    reference: Option<&str>,
    now: DateTime<Utc>,
) -> Result<u64, sqlx::Error> {
    let paid_at = (status == PaymentStatus::Paid).then_some(now);
    let result = sqlx::query(
        "UPDATE payments SET status = $2, reference = COALESCE($3, reference), paid_at = $4, updated_at = now() \
         WHERE order_id = $1 AND status = $5",
    )
    .bind(order_id)
    .bind(status)
    .bind(reference)
    .bind(paid_at)
    .bind(PaymentStatus::Pending)
    .execute(db)
    .await?;
    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use crate::test_support;

    #[tokio::test]
    #[ignore] // needs PostgreSQL
    async fn test_ticket_code_collision_draws_again() {
        let pool = test_support::pool().await;
        let buyer = test_support::user(&pool, Role::User).await;
        let (_, organizer) = test_support::organizer(&pool).await;
        let event = test_support::published_event(&pool, &organizer).await;

        let mut conn = pool.acquire().await.unwrap();
        let first = insert_order(&mut conn, buyer.id(), event.id, OrderStatus::Pending, Decimal::ONE)
            .await
            .unwrap();

        let fresh = codes::generate(CodeKind::Ticket, &mut rand::thread_rng());
        let mut draws = vec![fresh.clone(), first.ticket_code.clone()];
        let second = insert_order_with_codes(
            &mut conn,
            buyer.id(),
            event.id,
            OrderStatus::Pending,
            Decimal::ONE,
            || draws.pop().unwrap(),
        )
        .await
        .unwrap();

        assert_eq!(second.ticket_code, fresh);
        assert_ne!(second.id, first.id);
    }

    #[tokio::test]
    #[ignore] // needs PostgreSQL
    async fn test_booking_code_gives_up_after_max_attempts() {
        let pool = test_support::pool().await;
        let buyer = test_support::user(&pool, Role::User).await;
        let (_, organizer) = test_support::organizer(&pool).await;
        let event = test_support::published_event(&pool, &organizer).await;
        let category = test_support::category(&pool, &event, None, Decimal::ONE, None).await;

        let mut conn = pool.acquire().await.unwrap();
        let order = insert_order(&mut conn, buyer.id(), event.id, OrderStatus::Pending, Decimal::ONE)
            .await
            .unwrap();
        let taken = insert_item(&mut conn, order.id, category.id, 1, Decimal::ONE)
            .await
            .unwrap();

        let mut drawn = 0;
        let err = insert_item_with_codes(&mut conn, order.id, category.id, 1, Decimal::ONE, || {
            drawn += 1;
            taken.booking_code.clone()
        })
        .await
        .unwrap_err();

        assert!(matches!(err, AppError::InternalServerError(_)));
        assert_eq!(drawn, codes::MAX_ATTEMPTS);
    }
}
