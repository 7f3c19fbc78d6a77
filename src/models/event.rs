use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::text_enum;

text_enum! {
    EventStatus {
        Draft => "draft",
        Published => "published",
        Cancelled => "cancelled",
    }
}

impl EventStatus {
    /// Allowed lifecycle moves: draft -> published, draft|published -> cancelled.
    pub fn can_transition_to(self, next: EventStatus) -> bool {
        matches!(
            (self, next),
            (EventStatus::Draft, EventStatus::Published)
                | (EventStatus::Draft, EventStatus::Cancelled)
                | (EventStatus::Published, EventStatus::Cancelled)
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Event {
    pub id: Uuid,
    pub organizer_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub status: EventStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Event {
    /// An event without an end time is over once it starts.
    pub fn has_ended(&self, now: DateTime<Utc>) -> bool {
        self.end_time.unwrap_or(self.start_time) < now
    }

    pub fn accepts_orders(&self, now: DateTime<Utc>) -> bool {
        self.status == EventStatus::Published && !self.has_ended(now)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct EventVenue {
    pub id: Uuid,
    pub event_id: Uuid,
    pub name: String,
    pub address: String,
    pub city: Option<String>,
    pub capacity: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct EventSection {
    pub id: Uuid,
    pub event_id: Uuid,
    pub name: String,
    pub rows: i32,
    pub seats_per_row: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

text_enum! {
    SeatStatus {
        Available => "available",
        Reserved => "reserved",
        Booked => "booked",
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct EventSeat {
    pub id: Uuid,
    pub section_id: Uuid,
    pub row_index: i32,
    pub row_label: String,
    pub seat_number: i32,
    pub label: String,
    pub status: SeatStatus,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn event(start: DateTime<Utc>, end: Option<DateTime<Utc>>, status: EventStatus) -> Event {
        Event {
            id: Uuid::new_v4(),
            organizer_id: Uuid::new_v4(),
            title: "Rust Meetup".to_string(),
            description: None,
            start_time: start,
            end_time: end,
            status,
            created_at: start,
            updated_at: start,
        }
    }

    #[test]
    fn test_status_transitions() {
        assert!(EventStatus::Draft.can_transition_to(EventStatus::Published));
        assert!(EventStatus::Published.can_transition_to(EventStatus::Cancelled));
        assert!(!EventStatus::Cancelled.can_transition_to(EventStatus::Published));
        assert!(!EventStatus::Published.can_transition_to(EventStatus::Draft));
        assert!(!EventStatus::Published.can_transition_to(EventStatus::Published));
    }

    #[test]
    fn test_accepts_orders_only_when_published_and_running() {
        let now = Utc::now();
        let upcoming = event(now + Duration::days(1), None, EventStatus::Published);
        assert!(upcoming.accepts_orders(now));

        let draft = event(now + Duration::days(1), None, EventStatus::Draft);
        assert!(!draft.accepts_orders(now));

        let running = event(
            now - Duration::hours(1),
            Some(now + Duration::hours(2)),
            EventStatus::Published,
        );
        assert!(running.accepts_orders(now));

        let started_without_end = event(now - Duration::hours(1), None, EventStatus::Published);
        assert!(!started_without_end.accepts_orders(now));
    }
}
