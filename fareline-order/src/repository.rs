use crate::models::Order;
use async_trait::async_trait;
use fareline_core::BookingResult;
use uuid::Uuid;

/// Durable store for order records.
///
/// `insert_order` must be idempotent on the key: a second insert carrying a
/// key already seen is acknowledged without creating another record.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn insert_order(&self, order: &Order, idempotency_key: Uuid) -> BookingResult<()>;

    async fn get_order(&self, id: Uuid) -> BookingResult<Option<Order>>;

    async fn update_order(&self, order: &Order) -> BookingResult<()>;
}
