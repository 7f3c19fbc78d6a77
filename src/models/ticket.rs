use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TicketCategory {
    pub id: Uuid,
    pub event_id: Uuid,
    /// Seated categories draw their seats from this section.
    pub section_id: Option<Uuid>,
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    /// `None` is unlimited.
    pub quota: Option<i32>,
    pub sold: i32,
    pub sale_start: Option<DateTime<Utc>>,
    pub sale_end: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaleWindow {
    NotStarted,
    Open,
    Closed,
}

impl TicketCategory {
    pub fn remaining(&self) -> Option<i32> {
        self.quota.map(|quota| (quota - self.sold).max(0))
    }

    pub fn can_fulfil(&self, quantity: i32) -> bool {
        self.remaining().map_or(true, |left| quantity <= left)
    }

    pub fn sale_window(&self, now: DateTime<Utc>) -> SaleWindow {
        if self.sale_start.is_some_and(|start| now < start) {
            SaleWindow::NotStarted
        } else if self.sale_end.is_some_and(|end| now > end) {
            SaleWindow::Closed
        } else {
            SaleWindow::Open
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn category(quota: Option<i32>, sold: i32) -> TicketCategory {
        let now = Utc::now();
        TicketCategory {
            id: Uuid::new_v4(),
            event_id: Uuid::new_v4(),
            section_id: None,
            name: "VIP".to_string(),
            description: None,
            price: Decimal::new(25000, 2),
            quota,
            sold,
            sale_start: None,
            sale_end: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_unlimited_quota() {
        let c = category(None, 10_000);
        assert_eq!(c.remaining(), None);
        assert!(c.can_fulfil(500));
    }

    #[test]
    fn test_quota_remaining() {
        let c = category(Some(10), 8);
        assert_eq!(c.remaining(), Some(2));
        assert!(c.can_fulfil(2));
        assert!(!c.can_fulfil(3));
    }

    #[test]
    fn test_sale_window() {
        let now = Utc::now();
        let mut c = category(None, 0);
        assert_eq!(c.sale_window(now), SaleWindow::Open);

        c.sale_start = Some(now + Duration::hours(1));
        assert_eq!(c.sale_window(now), SaleWindow::NotStarted);

        c.sale_start = Some(now - Duration::days(2));
        c.sale_end = Some(now - Duration::days(1));
        assert_eq!(c.sale_window(now), SaleWindow::Closed);
    }
}
