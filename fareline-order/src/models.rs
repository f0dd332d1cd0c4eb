use chrono::{DateTime, Utc};
use fareline_core::{Money, MoneyError, Quote};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of a confirmed booking record
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Confirmed,
    Cancelled,
    Changed,
}

/// The durable record of a confirmed booking.
///
/// Created exactly once from a committing reservation; the committed price
/// is frozen at commit time. Later changes supersede segments rather than
/// deleting them, and cancellation freezes the quoted refund.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub reservation_id: Uuid,
    /// Quote snapshots committed at booking (or change) time
    pub committed: Vec<Quote>,
    pub total: Money,
    pub confirmation_ref: String,
    pub status: OrderStatus,
    /// Segment terms replaced by a change, retained for audit
    pub superseded: Vec<Quote>,
    pub refund: Option<Money>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn new(
        reservation_id: Uuid,
        committed: Vec<Quote>,
        confirmation_ref: String,
    ) -> Result<Self, MoneyError> {
        let total = Money::sum(committed.iter().map(|q| &q.total))?;
        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            reservation_id,
            committed,
            total,
            confirmation_ref,
            status: OrderStatus::Confirmed,
            superseded: Vec::new(),
            refund: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// An order can host change/cancel workflows until it is cancelled
    pub fn is_modifiable(&self) -> bool {
        matches!(self.status, OrderStatus::Confirmed | OrderStatus::Changed)
    }

    /// Apply a confirmed change: the fare-difference quote joins the order,
    /// the old segment terms move to the superseded trail
    pub fn record_change(
        &mut self,
        change_quote: Quote,
        new_confirmation_ref: String,
    ) -> Result<(), MoneyError> {
        self.total = self.total.checked_add(&change_quote.total)?;
        self.superseded.append(&mut self.committed);
        self.committed.push(change_quote);
        self.confirmation_ref = new_confirmation_ref;
        self.status = OrderStatus::Changed;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Apply a confirmed cancellation, freezing the quoted refund amount
    pub fn record_cancellation(&mut self, refund: Money, confirmation_ref: String) {
        self.refund = Some(refund);
        self.confirmation_ref = confirmation_ref;
        self.status = OrderStatus::Cancelled;
        self.updated_at = Utc::now();
    }
}
