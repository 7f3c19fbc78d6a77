//! Fixtures for tests that need a live Postgres. Those tests are `#[ignore]`d
//! and read `DATABASE_URL`:
//!
//! ```text
//! DATABASE_URL=postgres://localhost/ticketing_test cargo test -- --ignored
//! ```

use std::sync::Arc;

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::config::Config;
use crate::db;
use crate::db::categories::CategoryFields;
use crate::db::events::EventFields;
use crate::models::{Event, EventSeat, EventSection, EventStatus, Organizer, Role, TicketCategory};
use crate::services::mailer::testing::RecordingMailer;
use crate::services::mailer::Mailer;
use crate::services::seating;
use crate::state::AppState;

pub async fn pool() -> PgPool {
    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "postgres://localhost/ticketing_test".to_string());
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&database_url)
        .await
        .unwrap();
    sqlx::migrate!().run(&pool).await.unwrap();
    pool
}

pub fn state_with(pool: PgPool, mailer: Arc<dyn Mailer>) -> AppState {
    let config = Config::new("postgres://unused");
    AppState::new(pool, config, mailer)
}

pub fn state(pool: PgPool) -> AppState {
    state_with(pool, Arc::new(RecordingMailer::default()))
}

/// An address no other test run has used.
pub fn unique_email(tag: &str) -> String {
    format!("{}-{}@example.com", tag, Uuid::new_v4().simple())
}

pub async fn user(pool: &PgPool, role: Role) -> AuthUser {
    let mut tx = pool.begin().await.unwrap();
    let user = db::users::create_with_role(&mut tx, "Test User", &unique_email("user"), None, role)
        .await
        .unwrap();
    tx.commit().await.unwrap();
    let roles = db::users::roles_for(pool, user.id).await.unwrap();
    AuthUser {
        user,
        roles,
        token_id: Uuid::new_v4(),
    }
}

pub async fn organizer(pool: &PgPool) -> (AuthUser, Organizer) {
    let auth = user(pool, Role::Organizer).await;
    let organizer = db::organizers::create(pool, auth.id(), "Test Org", None, &auth.user.email)
        .await
        .unwrap();
    (auth, organizer)
}

pub async fn published_event(pool: &PgPool, organizer: &Organizer) -> Event {
    let start = Utc::now() + Duration::days(7);
    let fields = EventFields {
        title: "Launch Night",
        description: None,
        start_time: start,
        end_time: Some(start + Duration::hours(3)),
    };
    let event = db::events::create(pool, organizer.id, &fields).await.unwrap();
    db::events::set_status(pool, event.id, EventStatus::Published)
        .await
        .unwrap()
}

pub async fn section(pool: &PgPool, event: &Event, rows: i32, per_row: i32) -> (EventSection, Vec<EventSeat>) {
    let mut tx = pool.begin().await.unwrap();
    let section = db::events::create_section(
        &mut tx,
        event.id,
        "Floor",
        rows,
        per_row,
        &seating::layout(rows, per_row),
    )
    .await
    .unwrap();
    tx.commit().await.unwrap();
    let seats = db::events::list_seats(pool, section.id).await.unwrap();
    (section, seats)
}

pub async fn category(
    pool: &PgPool,
    event: &Event,
    section_id: Option<Uuid>,
    price: Decimal,
    quota: Option<i32>,
) -> TicketCategory {
    let fields = CategoryFields {
        name: "Regular",
        description: None,
        section_id,
        price,
        quota,
        sale_start: None,
        sale_end: None,
    };
    db::categories::create(pool, event.id, &fields).await.unwrap()
}
