use async_trait::async_trait;
use fareline_core::{BookingError, BookingResult, IntentAudit, IntentRecord};
use fareline_order::{Order, OrderRepository};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

/// In-memory persistence adapter for orders and the intent audit trail.
///
/// Order inserts are idempotent on the commit key: a retried insert with a
/// key already seen is acknowledged without writing a second record.
#[derive(Default)]
pub struct InMemoryStore {
    orders: RwLock<HashMap<Uuid, Order>>,
    orders_by_key: RwLock<HashMap<Uuid, Uuid>>,
    intents: RwLock<Vec<IntentRecord>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn order_count(&self) -> usize {
        self.orders.read().await.len()
    }

    /// Recorded booking intents, oldest first
    pub async fn intents(&self) -> Vec<IntentRecord> {
        self.intents.read().await.clone()
    }
}

#[async_trait]
impl OrderRepository for InMemoryStore {
    async fn insert_order(&self, order: &Order, idempotency_key: Uuid) -> BookingResult<()> {
        let mut by_key = self.orders_by_key.write().await;
        if let Some(existing) = by_key.get(&idempotency_key) {
            debug!(order_id = %existing, %idempotency_key, "duplicate order insert collapsed");
            return Ok(());
        }
        by_key.insert(idempotency_key, order.id);
        self.orders.write().await.insert(order.id, order.clone());
        info!(order_id = %order.id, total = %order.total, "order persisted");
        Ok(())
    }

    async fn get_order(&self, id: Uuid) -> BookingResult<Option<Order>> {
        Ok(self.orders.read().await.get(&id).cloned())
    }

    async fn update_order(&self, order: &Order) -> BookingResult<()> {
        let mut orders = self.orders.write().await;
        if !orders.contains_key(&order.id) {
            return Err(BookingError::NotFound(format!("order {}", order.id)));
        }
        orders.insert(order.id, order.clone());
        Ok(())
    }
}

#[async_trait]
impl IntentAudit for InMemoryStore {
    async fn record_intent(&self, record: IntentRecord) -> BookingResult<()> {
        info!(
            reservation_id = %record.reservation_id,
            trip = %record.trip_label,
            travelers = record.adults + record.children,
            "booking intent recorded"
        );
        self.intents.write().await.push(record);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use fareline_core::{Money, Quote, QuoteLeg};

    fn order() -> Order {
        let quote = Quote::new(
            QuoteLeg::Flight,
            Money::new(90_000, "USD"),
            Utc::now() + Duration::minutes(15),
            Uuid::new_v4(),
        );
        Order::new(Uuid::new_v4(), vec![quote], "PNR-1".to_string()).unwrap()
    }

    #[tokio::test]
    async fn test_insert_is_idempotent_on_key() {
        let store = InMemoryStore::new();
        let key = Uuid::new_v4();
        let first = order();
        let second = order();

        store.insert_order(&first, key).await.unwrap();
        store.insert_order(&second, key).await.unwrap();

        assert_eq!(store.order_count().await, 1);
        assert!(store.get_order(first.id).await.unwrap().is_some());
        assert!(store.get_order(second.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_requires_existing_order() {
        let store = InMemoryStore::new();
        let o = order();
        assert!(matches!(
            store.update_order(&o).await,
            Err(BookingError::NotFound(_))
        ));

        store.insert_order(&o, Uuid::new_v4()).await.unwrap();
        let mut updated = o.clone();
        updated.record_cancellation(Money::new(45_000, "USD"), "CXL-1".into());
        store.update_order(&updated).await.unwrap();

        let stored = store.get_order(o.id).await.unwrap().unwrap();
        assert_eq!(stored.refund, Some(Money::new(45_000, "USD")));
    }
}
