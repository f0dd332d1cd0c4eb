use fareline_core::{BookingError, BookingResult, BookingProvider, ContactDetails, Quote, Traveler};
use fareline_order::{Order, OrderRepository};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{sleep_until, timeout, Instant};
use tracing::{info, warn};
use uuid::Uuid;

/// Rotating progress copy shown while the real commit call is in flight
pub const COMMIT_STATUS_MESSAGES: [&str; 4] = [
    "Contacting the travel provider",
    "Verifying availability",
    "Locking in your fare",
    "Finalizing your booking",
];

/// Namespace for commit idempotency keys
const IDEMPOTENCY_NAMESPACE: Uuid = Uuid::from_u128(0x3d1a_77b2_5c90_4e31_9a48_f06b_2d84_c55e);

/// Drives a reservation from `Committing` to an order exactly once.
///
/// Two independent timings are reconciled: the fixed minimum duration of the
/// progress display and the real duration of the provider call. Success
/// resolves after the maximum of the two; failure resolves immediately, so
/// errors surface promptly.
pub struct CommitCoordinator {
    provider: Arc<dyn BookingProvider>,
    orders: Arc<dyn OrderRepository>,
    min_display: Duration,
    call_timeout: Duration,
    tick: Duration,
    status: watch::Sender<&'static str>,
}

impl CommitCoordinator {
    pub fn new(provider: Arc<dyn BookingProvider>, orders: Arc<dyn OrderRepository>) -> Self {
        let (status, _) = watch::channel(COMMIT_STATUS_MESSAGES[0]);
        Self {
            provider,
            orders,
            min_display: Duration::from_secs(4),
            call_timeout: Duration::from_secs(10),
            tick: Duration::from_secs(1),
            status,
        }
    }

    pub fn with_min_display(mut self, min_display: Duration) -> Self {
        self.min_display = min_display;
        self
    }

    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    /// Subscribe to the rotating progress messages
    pub fn status_updates(&self) -> watch::Receiver<&'static str> {
        self.status.subscribe()
    }

    /// Key the provider uses to recognize a retried commit as a duplicate
    pub fn idempotency_key(reservation_id: Uuid, version: u64) -> Uuid {
        let seed = format!("{}:{}", reservation_id, version);
        Uuid::new_v5(&IDEMPOTENCY_NAMESPACE, seed.as_bytes())
    }

    pub async fn commit(
        &self,
        reservation_id: Uuid,
        version: u64,
        quotes: &[Quote],
        contact: &ContactDetails,
        travelers: &[Traveler],
    ) -> BookingResult<Order> {
        let started = Instant::now();
        let ticker = self.spawn_ticker();
        let key = Self::idempotency_key(reservation_id, version);

        let call = timeout(
            self.call_timeout,
            self.provider
                .commit_order(reservation_id, version, quotes, contact, travelers, key),
        )
        .await;

        let confirmation = match call {
            Err(_) => {
                ticker.abort();
                warn!(%reservation_id, "commit call exceeded its timeout");
                return Err(BookingError::ProviderRejected(
                    "the provider did not respond in time".to_string(),
                ));
            }
            Ok(Err(err)) => {
                // Failure surfaces promptly; the display floor applies to
                // success only
                ticker.abort();
                warn!(%reservation_id, %err, "commit declined by provider");
                return Err(err);
            }
            Ok(Ok(confirmation)) => confirmation,
        };

        // The call returned early: wait out the rest of the display floor,
        // resolving at max(real duration, floor), never the minimum
        sleep_until(started + self.min_display).await;
        ticker.abort();

        let order = Order::new(reservation_id, quotes.to_vec(), confirmation.confirmation_ref)?;
        self.orders.insert_order(&order, key).await?;
        info!(order_id = %order.id, %reservation_id, total = %order.total, "order confirmed");
        Ok(order)
    }

    fn spawn_ticker(&self) -> tokio::task::JoinHandle<()> {
        let status = self.status.clone();
        let tick = self.tick;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick);
            let mut idx = 0usize;
            loop {
                interval.tick().await;
                let _ = status.send(COMMIT_STATUS_MESSAGES[idx % COMMIT_STATUS_MESSAGES.len()]);
                idx += 1;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idempotency_key_is_stable_per_version() {
        let id = Uuid::new_v4();
        assert_eq!(
            CommitCoordinator::idempotency_key(id, 4),
            CommitCoordinator::idempotency_key(id, 4)
        );
        assert_ne!(
            CommitCoordinator::idempotency_key(id, 4),
            CommitCoordinator::idempotency_key(id, 5)
        );
    }
}
