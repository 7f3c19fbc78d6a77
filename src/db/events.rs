use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgExecutor};
use uuid::Uuid;

use crate::models::{Event, EventSeat, EventSection, EventStatus, EventVenue, SeatStatus};
use crate::services::seating::SeatSpec;

pub struct EventFields<'a> {
    pub title: &'a str,
    pub description: Option<&'a str>,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
}

pub async fn find<'e>(db: impl PgExecutor<'e>, id: Uuid) -> Result<Option<Event>, sqlx::Error> {
    sqlx::query_as::<_, Event>("SELECT * FROM events WHERE id = $1")
        .bind(id)
        .fetch_optional(db)
        .await
}

/// Published events that have not ended, soonest first.
pub async fn list_published(
    conn: &mut PgConnection,
    now: DateTime<Utc>,
    limit: i64,
    offset: i64,
) -> Result<(Vec<Event>, i64), sqlx::Error> {
    let events = sqlx::query_as::<_, Event>(
        "SELECT * FROM events WHERE status = $1 AND COALESCE(end_time, start_time) >= $2 \
         ORDER BY start_time LIMIT $3 OFFSET $4",
    )
    .bind(EventStatus::Published)
    .bind(now)
    .bind(limit)
    .bind(offset)
    .fetch_all(&mut *conn)
    .await?;

    let total = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM events WHERE status = $1 AND COALESCE(end_time, start_time) >= $2",
    )
    .bind(EventStatus::Published)
    .bind(now)
    .fetch_one(&mut *conn)
    .await?;

    Ok((events, total))
}

pub async fn list_for_organizer<'e>(
    db: impl PgExecutor<'e>,
    organizer_id: Uuid,
) -> Result<Vec<Event>, sqlx::Error> {
    sqlx::query_as::<_, Event>(
        "SELECT * FROM events WHERE organizer_id = $1 ORDER BY start_time DESC",
    )
    .bind(organizer_id)
    .fetch_all(db)
    .await
}

pub async fn create<'e>(
    db: impl PgExecutor<'e>,
    organizer_id: Uuid,
    fields: &EventFields<'_>,
) -> Result<Event, sqlx::Error> {
    sqlx::query_as::<_, Event>(
        "INSERT INTO events (id, organizer_id, title, description, start_time, end_time, status) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING *",
    )
    .bind(Uuid::new_v4())
    .bind(organizer_id)
    .bind(fields.title)
    .bind(fields.description)
    .bind(fields.start_time)
    .bind(fields.end_time)
    .bind(EventStatus::Draft)
    .fetch_one(db)
    .await
}

pub async fn update<'e>(
    db: impl PgExecutor<'e>,
    id: Uuid,
    fields: &EventFields<'_>,
) -> Result<Event, sqlx::Error> {
    sqlx::query_as::<_, Event>(
        "UPDATE events SET title = $2, description = $3, start_time = $4, end_time = $5, updated_at = now() \
         WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(fields.title)
    .bind(fields.description)
    .bind(fields.start_time)
    .bind(fields.end_time)
    .fetch_one(db)
    .await
}

pub async fn set_status<'e>(
    db: impl PgExecutor<'e>,
    id: Uuid,
    status: EventStatus,
) -> Result<Event, sqlx::Error> {
    sqlx::query_as::<_, Event>(
        "UPDATE events SET status = $2, updated_at = now() WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(status)
    .fetch_one(db)
    .await
}

pub async fn delete<'e>(db: impl PgExecutor<'e>, id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM events WHERE id = $1")
        .bind(id)
        .execute(db)
        .await?;
    Ok(())
}

// Venue

pub struct VenueFields<'a> {
    pub name: &'a str,
    pub address: &'a str,
    pub city: Option<&'a str>,
    pub capacity: Option<i32>,
}

pub async fn find_venue<'e>(
    db: impl PgExecutor<'e>,
    event_id: Uuid,
) -> Result<Option<EventVenue>, sqlx::Error> {
    sqlx::query_as::<_, EventVenue>("SELECT * FROM event_venues WHERE event_id = $1")
        .bind(event_id)
        .fetch_optional(db)
        .await
}

pub async fn upsert_venue<'e>(
    db: impl PgExecutor<'e>,
    event_id: Uuid,
    fields: &VenueFields<'_>,
) -> Result<EventVenue, sqlx::Error> {
    sqlx::query_as::<_, EventVenue>(
        "INSERT INTO event_venues (id, event_id, name, address, city, capacity) \
         VALUES ($1, $2, $3, $4, $5, $6) \
         ON CONFLICT (event_id) DO UPDATE SET name = EXCLUDED.name, address = EXCLUDED.address, \
         city = EXCLUDED.city, capacity = EXCLUDED.capacity, updated_at = now() \
         RETURNING *",
    )
    .bind(Uuid::new_v4())
    .bind(event_id)
    .bind(fields.name)
    .bind(fields.address)
    .bind(fields.city)
    .bind(fields.capacity)
    .fetch_one(db)
    .await
}

// Sections and seats

pub async fn create_section(
    conn: &mut PgConnection,
    event_id: Uuid,
    name: &str,
    rows: i32,
    seats_per_row: i32,
    seats: &[SeatSpec],
) -> Result<EventSection, sqlx::Error> {
    let section = sqlx::query_as::<_, EventSection>(
        "INSERT INTO event_sections (id, event_id, name, rows, seats_per_row) \
         VALUES ($1, $2, $3, $4, $5) RETURNING *",
    )
    .bind(Uuid::new_v4())
    .bind(event_id)
    .bind(name)
    .bind(rows)
    .bind(seats_per_row)
    .fetch_one(&mut *conn)
    .await?;

    let ids: Vec<Uuid> = seats.iter().map(|_| Uuid::new_v4()).collect();
    let row_indexes: Vec<i32> = seats.iter().map(|s| s.row_index).collect();
    let row_labels: Vec<String> = seats.iter().map(|s| s.row_label.clone()).collect();
    let numbers: Vec<i32> = seats.iter().map(|s| s.seat_number).collect();
    let labels: Vec<String> = seats.iter().map(|s| s.label.clone()).collect();

    sqlx::query(
        "INSERT INTO event_seats (id, section_id, row_index, row_label, seat_number, label, status) \
         SELECT id, $1, row_index, row_label, seat_number, label, $2 \
         FROM UNNEST($3::uuid[], $4::int4[], $5::text[], $6::int4[], $7::text[]) \
         AS s(id, row_index, row_label, seat_number, label)",
    )
    .bind(section.id)
    .bind(SeatStatus::Available)
    .bind(ids)
    .bind(row_indexes)
    .bind(row_labels)
    .bind(numbers)
    .bind(labels)
    .execute(&mut *conn)
    .await?;

    Ok(section)
}

pub async fn list_sections<'e>(
    db: impl PgExecutor<'e>,
    event_id: Uuid,
) -> Result<Vec<EventSection>, sqlx::Error> {
    sqlx::query_as::<_, EventSection>(
        "SELECT * FROM event_sections WHERE event_id = $1 ORDER BY created_at",
    )
    .bind(event_id)
    .fetch_all(db)
    .await
}

pub async fn find_section<'e>(
    db: impl PgExecutor<'e>,
    id: Uuid,
) -> Result<Option<EventSection>, sqlx::Error> {
    sqlx::query_as::<_, EventSection>("SELECT * FROM event_sections WHERE id = $1")
        .bind(id)
        .fetch_optional(db)
        .await
}

pub async fn delete_section<'e>(db: impl PgExecutor<'e>, id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM event_sections WHERE id = $1")
        .bind(id)
        .execute(db)
        .await?;
    Ok(())
}

pub async fn count_taken_seats<'e>(db: impl PgExecutor<'e>, section_id: Uuid) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM event_seats WHERE section_id = $1 AND status <> $2",
    )
    .bind(section_id)
    .bind(SeatStatus::Available)
    .fetch_one(db)
    .await
}

pub async fn list_seats<'e>(
    db: impl PgExecutor<'e>,
    section_id: Uuid,
) -> Result<Vec<EventSeat>, sqlx::Error> {
    sqlx::query_as::<_, EventSeat>(
        "SELECT * FROM event_seats WHERE section_id = $1 ORDER BY row_index, seat_number",
    )
    .bind(section_id)
    .fetch_all(db)
    .await
}

/// Locks the whole section so concurrent orders cannot pick the same seat.
pub async fn seats_for_update(
    conn: &mut PgConnection,
    section_id: Uuid,
) -> Result<Vec<EventSeat>, sqlx::Error> {
    sqlx::query_as::<_, EventSeat>(
        "SELECT * FROM event_seats WHERE section_id = $1 ORDER BY row_index, seat_number FOR UPDATE",
    )
    .bind(section_id)
    .fetch_all(&mut *conn)
    .await
}

pub async fn set_seat_status<'e>(
    db: impl PgExecutor<'e>,
    seat_ids: &[Uuid],
    status: SeatStatus,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("UPDATE event_seats SET status = $2 WHERE id = ANY($1)")
        .bind(seat_ids)
        .bind(status)
        .execute(db)
        .await?;
    Ok(result.rows_affected())
}
