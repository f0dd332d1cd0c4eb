use crate::criteria::{SearchCriteria, TripKind};
use crate::error::BookingResult;
use crate::money::Money;
use crate::party::{ContactDetails, Traveler};
use crate::quote::Quote;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// External aggregator: prices searches, change alternatives, and refunds
#[async_trait]
pub trait AggregatorClient: Send + Sync {
    /// Price a trip search; an empty result is a valid (if unbookable) answer
    async fn search_offers(&self, criteria: &SearchCriteria) -> BookingResult<Vec<Quote>>;

    /// Price alternatives for an existing order's segments on a new date
    async fn search_change_offers(
        &self,
        order_id: Uuid,
        new_date: NaiveDate,
    ) -> BookingResult<Vec<Quote>>;

    /// Quote the refund for cancelling an order
    async fn request_cancel_quote(&self, order_id: Uuid) -> BookingResult<Quote>;
}

/// Provider acknowledgement of a committed, changed, or cancelled booking
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProviderConfirmation {
    pub confirmation_ref: String,
    pub confirmed_at: DateTime<Utc>,
}

/// External booking provider: the only party that can make a booking real.
///
/// The provider honors `idempotency_key`: a retried commit with the same key
/// acknowledges the original booking instead of creating a second one.
#[async_trait]
pub trait BookingProvider: Send + Sync {
    async fn commit_order(
        &self,
        reservation_id: Uuid,
        version: u64,
        quotes: &[Quote],
        contact: &ContactDetails,
        travelers: &[Traveler],
        idempotency_key: Uuid,
    ) -> BookingResult<ProviderConfirmation>;

    async fn confirm_cancel(
        &self,
        order_id: Uuid,
        cancel_quote_id: Uuid,
    ) -> BookingResult<ProviderConfirmation>;

    async fn confirm_change(
        &self,
        order_id: Uuid,
        change_quote_id: Uuid,
    ) -> BookingResult<ProviderConfirmation>;
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecordStatus {
    Pending,
    Confirmed,
    Cancelled,
    Changed,
}

/// Durable trail of a booking intent, written as soon as pricing starts so
/// the intent survives even when the live aggregator call later fails
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IntentRecord {
    pub id: Uuid,
    pub reservation_id: Uuid,
    pub trip_label: String,
    pub origin: String,
    pub destination: String,
    pub depart_date: NaiveDate,
    pub return_date: Option<NaiveDate>,
    pub adults: u32,
    pub children: u32,
    pub booking_kind: TripKind,
    pub estimated_price: Option<Money>,
    pub status: RecordStatus,
    pub created_at: DateTime<Utc>,
}

impl IntentRecord {
    pub fn from_criteria(
        reservation_id: Uuid,
        criteria: &SearchCriteria,
        estimated_price: Option<Money>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            reservation_id,
            trip_label: criteria.trip_label(),
            origin: criteria.origin.trim().to_uppercase(),
            destination: criteria.destination.trim().to_uppercase(),
            depart_date: criteria.depart_date,
            return_date: criteria.return_date,
            adults: criteria.adults,
            children: criteria.children,
            booking_kind: criteria.trip_kind,
            estimated_price,
            status: RecordStatus::Pending,
            created_at: Utc::now(),
        }
    }
}

/// Best-effort audit sink; callers fire and forget, never block on it
#[async_trait]
pub trait IntentAudit: Send + Sync {
    async fn record_intent(&self, record: IntentRecord) -> BookingResult<()>;
}
