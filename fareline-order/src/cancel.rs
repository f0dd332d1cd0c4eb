use crate::models::Order;
use crate::repository::OrderRepository;
use chrono::{DateTime, Utc};
use fareline_core::{AggregatorClient, BookingError, BookingProvider, BookingResult, Quote};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{info, warn};
use uuid::Uuid;

/// Step of an in-flight cancellation workflow
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CancelStep {
    QuoteRequested,
    QuoteReady,
    Confirming,
    Cancelled,
    /// The refund quote lapsed while the user was deciding; the request
    /// must be discarded and a fresh one opened
    Expired,
}

impl CancelStep {
    fn name(&self) -> &'static str {
        match self {
            CancelStep::QuoteRequested => "QUOTE_REQUESTED",
            CancelStep::QuoteReady => "QUOTE_READY",
            CancelStep::Confirming => "CONFIRMING",
            CancelStep::Cancelled => "CANCELLED",
            CancelStep::Expired => "EXPIRED",
        }
    }
}

/// Short-lived workflow object holding a refund quote for one order
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CancelRequest {
    pub id: Uuid,
    pub order_id: Uuid,
    pub step: CancelStep,
    /// Refund quote with its own expiry window
    pub quote: Option<Quote>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CancelRequest {
    fn new(order_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            order_id,
            step: CancelStep::QuoteRequested,
            quote: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn advance(&mut self, step: CancelStep) {
        self.step = step;
        self.updated_at = Utc::now();
    }
}

/// Drives cancellation against the aggregator and provider
pub struct CancelFlow {
    aggregator: Arc<dyn AggregatorClient>,
    provider: Arc<dyn BookingProvider>,
    orders: Arc<dyn OrderRepository>,
    call_timeout: Duration,
}

impl CancelFlow {
    pub fn new(
        aggregator: Arc<dyn AggregatorClient>,
        provider: Arc<dyn BookingProvider>,
        orders: Arc<dyn OrderRepository>,
    ) -> Self {
        Self {
            aggregator,
            provider,
            orders,
            call_timeout: Duration::from_secs(10),
        }
    }

    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    /// Fetch a refund quote for the order. A failure here ends the attempt;
    /// the caller opens a fresh request to try again, nothing is retried
    /// silently.
    pub async fn request_quote(&self, order: &Order) -> BookingResult<CancelRequest> {
        if !order.is_modifiable() {
            return Err(BookingError::InvalidTransition {
                from: format!("{:?}", order.status),
                command: "cancel".to_string(),
            });
        }

        let mut request = CancelRequest::new(order.id);

        let quote = match timeout(
            self.call_timeout,
            self.aggregator.request_cancel_quote(order.id),
        )
        .await
        {
            Err(_) => {
                return Err(BookingError::QuoteUnavailable(
                    "refund pricing timed out".to_string(),
                ))
            }
            Ok(Err(BookingError::ProviderRejected(msg))) => {
                return Err(BookingError::QuoteUnavailable(msg))
            }
            Ok(Err(err)) => return Err(err),
            Ok(Ok(quote)) => quote,
        };

        info!(order_id = %order.id, refund = %quote.total, expires_at = %quote.expires_at, "refund quoted");
        request.quote = Some(quote);
        request.advance(CancelStep::QuoteReady);
        Ok(request)
    }

    /// Lazily reflect expiry: a ready quote past its window moves the
    /// request to `Expired` on read, no background timer involved
    pub fn refresh(&self, request: &mut CancelRequest, now: DateTime<Utc>) -> CancelStep {
        if request.step == CancelStep::QuoteReady {
            let lapsed = request
                .quote
                .as_ref()
                .is_none_or(|q| q.is_expired_at(now));
            if lapsed {
                request.advance(CancelStep::Expired);
            }
        }
        request.step
    }

    /// Confirm the cancellation. Validity is re-checked at this instant; a
    /// lapsed quote yields `Expired`, never a cancellation.
    pub async fn confirm(
        &self,
        request: &mut CancelRequest,
        now: DateTime<Utc>,
    ) -> BookingResult<Order> {
        match self.refresh(request, now) {
            CancelStep::QuoteReady => {}
            CancelStep::Expired => return Err(BookingError::StaleQuote),
            other => {
                return Err(BookingError::InvalidTransition {
                    from: other.name().to_string(),
                    command: "confirm cancellation".to_string(),
                })
            }
        }

        let quote = request
            .quote
            .clone()
            .ok_or_else(|| BookingError::NotFound("refund quote".to_string()))?;
        request.advance(CancelStep::Confirming);

        let confirmation = match timeout(
            self.call_timeout,
            self.provider.confirm_cancel(request.order_id, quote.id),
        )
        .await
        {
            Err(_) => {
                request.advance(CancelStep::QuoteReady);
                return Err(BookingError::ProviderRejected(
                    "cancellation confirmation timed out".to_string(),
                ));
            }
            Ok(Err(err)) => {
                warn!(order_id = %request.order_id, %err, "cancellation confirmation failed");
                request.advance(CancelStep::QuoteReady);
                return Err(err);
            }
            Ok(Ok(confirmation)) => confirmation,
        };

        let mut order = self
            .orders
            .get_order(request.order_id)
            .await?
            .ok_or_else(|| BookingError::NotFound(format!("order {}", request.order_id)))?;
        // Refund amount is frozen from the quote, not re-priced
        order.record_cancellation(quote.total, confirmation.confirmation_ref);
        self.orders.update_order(&order).await?;

        request.advance(CancelStep::Cancelled);
        info!(order_id = %order.id, "order cancelled");
        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::TestOrders;
    use crate::models::OrderStatus;
    use chrono::Duration as ChronoDuration;
    use fareline_core::{Money, QuoteLeg};
    use fareline_offer::{ScriptedAggregator, ScriptedProvider};

    fn confirmed_order() -> Order {
        let quote = Quote::new(
            QuoteLeg::Flight,
            Money::new(90_000, "USD"),
            Utc::now() + ChronoDuration::minutes(15),
            Uuid::new_v4(),
        );
        Order::new(Uuid::new_v4(), vec![quote], "PNR-1".to_string()).unwrap()
    }

    fn refund_quote(amount: i64, ttl_minutes: i64) -> Quote {
        Quote::new(
            QuoteLeg::Refund,
            Money::new(amount, "USD"),
            Utc::now() + ChronoDuration::minutes(ttl_minutes),
            Uuid::new_v4(),
        )
    }

    #[tokio::test]
    async fn test_cancel_within_window_freezes_refund() {
        let order = confirmed_order();
        let orders = TestOrders::with_order(order.clone());
        let aggregator = Arc::new(ScriptedAggregator::new());
        aggregator.push_cancel(Ok(refund_quote(45_000, 5)));
        let flow = CancelFlow::new(aggregator, Arc::new(ScriptedProvider::new()), orders);

        let now = Utc::now();
        let mut request = flow.request_quote(&order).await.unwrap();
        assert_eq!(request.step, CancelStep::QuoteReady);

        // Confirming two minutes in: inside the window
        let cancelled = flow
            .confirm(&mut request, now + ChronoDuration::minutes(2))
            .await
            .unwrap();
        assert_eq!(request.step, CancelStep::Cancelled);
        assert_eq!(cancelled.status, OrderStatus::Cancelled);
        assert_eq!(cancelled.refund, Some(Money::new(45_000, "USD")));
    }

    #[tokio::test]
    async fn test_confirm_after_expiry_yields_expired_not_cancelled() {
        let order = confirmed_order();
        let orders = TestOrders::with_order(order.clone());
        let aggregator = Arc::new(ScriptedAggregator::new());
        aggregator.push_cancel(Ok(refund_quote(45_000, 5)));
        let flow = CancelFlow::new(
            aggregator,
            Arc::new(ScriptedProvider::new()),
            orders.clone(),
        );

        let now = Utc::now();
        let mut request = flow.request_quote(&order).await.unwrap();

        // Six minutes in: the five-minute window has lapsed
        let err = flow
            .confirm(&mut request, now + ChronoDuration::minutes(6))
            .await
            .unwrap_err();
        assert_eq!(err, BookingError::StaleQuote);
        assert_eq!(request.step, CancelStep::Expired);

        // The order is untouched
        let stored = orders.get_order(order.id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Confirmed);
    }

    #[tokio::test]
    async fn test_quote_failure_is_terminal_for_the_attempt() {
        let order = confirmed_order();
        let aggregator = Arc::new(ScriptedAggregator::new());
        aggregator.push_cancel(Err(BookingError::ProviderRejected("refund desk down".into())));
        let flow = CancelFlow::new(
            aggregator.clone(),
            Arc::new(ScriptedProvider::new()),
            TestOrders::with_order(order.clone()),
        );

        let err = flow.request_quote(&order).await.unwrap_err();
        assert!(matches!(err, BookingError::QuoteUnavailable(_)));
        // No silent retry happened
        assert_eq!(aggregator.cancel_calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_expired_request_cannot_be_confirmed_later() {
        let order = confirmed_order();
        let orders = TestOrders::with_order(order.clone());
        let aggregator = Arc::new(ScriptedAggregator::new());
        aggregator.push_cancel(Ok(refund_quote(45_000, 5)));
        let flow = CancelFlow::new(aggregator, Arc::new(ScriptedProvider::new()), orders);

        let now = Utc::now();
        let mut request = flow.request_quote(&order).await.unwrap();
        assert_eq!(
            flow.refresh(&mut request, now + ChronoDuration::minutes(10)),
            CancelStep::Expired
        );

        // Once expired, even an in-window timestamp cannot revive it
        let err = flow.confirm(&mut request, now).await.unwrap_err();
        assert_eq!(err, BookingError::StaleQuote);
        assert_eq!(request.step, CancelStep::Expired);
    }

    #[tokio::test]
    async fn test_cancelled_order_is_never_reused() {
        let mut order = confirmed_order();
        order.record_cancellation(Money::new(45_000, "USD"), "CXL-1".into());
        let flow = CancelFlow::new(
            Arc::new(ScriptedAggregator::new()),
            Arc::new(ScriptedProvider::new()),
            TestOrders::with_order(order.clone()),
        );
        assert!(matches!(
            flow.request_quote(&order).await,
            Err(BookingError::InvalidTransition { .. })
        ));
    }
}
