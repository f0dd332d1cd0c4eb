use crate::models::Order;
use crate::repository::OrderRepository;
use chrono::{DateTime, NaiveDate, Utc};
use fareline_core::{AggregatorClient, BookingError, BookingProvider, BookingResult, Quote};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{info, warn};
use uuid::Uuid;

/// Step of an in-flight date-change workflow
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeStep {
    SelectingDate,
    Searching,
    Reviewing,
    Confirming,
    Succeeded,
}

impl ChangeStep {
    fn name(&self) -> &'static str {
        match self {
            ChangeStep::SelectingDate => "SELECTING_DATE",
            ChangeStep::Searching => "SEARCHING",
            ChangeStep::Reviewing => "REVIEWING",
            ChangeStep::Confirming => "CONFIRMING",
            ChangeStep::Succeeded => "SUCCEEDED",
        }
    }
}

/// Short-lived workflow object for changing a confirmed order's date.
/// Failures return it to an editable step; it is never silently abandoned.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ChangeRequest {
    pub id: Uuid,
    pub order_id: Uuid,
    pub step: ChangeStep,
    pub new_date: Option<NaiveDate>,
    /// Fare-difference quote under review, with its own expiry
    pub quote: Option<Quote>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ChangeRequest {
    fn new(order_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            order_id,
            step: ChangeStep::SelectingDate,
            new_date: None,
            quote: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn advance(&mut self, step: ChangeStep) {
        self.step = step;
        self.updated_at = Utc::now();
    }
}

/// Drives the change workflow against the aggregator and provider
pub struct ChangeFlow {
    aggregator: Arc<dyn AggregatorClient>,
    provider: Arc<dyn BookingProvider>,
    orders: Arc<dyn OrderRepository>,
    call_timeout: Duration,
}

impl ChangeFlow {
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

    /// Open a change workflow on a modifiable order
    pub fn begin(&self, order: &Order) -> BookingResult<ChangeRequest> {
        if !order.is_modifiable() {
            return Err(BookingError::InvalidTransition {
                from: format!("{:?}", order.status),
                command: "change".to_string(),
            });
        }
        Ok(ChangeRequest::new(order.id))
    }

    /// Search fare-difference alternatives for the new date; zero results
    /// returns the workflow to date selection with `NoAlternatives`
    pub async fn search<'a>(
        &self,
        request: &'a mut ChangeRequest,
        new_date: NaiveDate,
        now: DateTime<Utc>,
    ) -> BookingResult<&'a Quote> {
        if !matches!(request.step, ChangeStep::SelectingDate | ChangeStep::Reviewing) {
            return Err(BookingError::InvalidTransition {
                from: request.step.name().to_string(),
                command: "search alternatives".to_string(),
            });
        }

        request.new_date = Some(new_date);
        request.advance(ChangeStep::Searching);

        let result = timeout(
            self.call_timeout,
            self.aggregator.search_change_offers(request.order_id, new_date),
        )
        .await;

        let quotes = match result {
            Err(_) => {
                request.advance(ChangeStep::SelectingDate);
                return Err(BookingError::ProviderRejected(
                    "change search timed out".to_string(),
                ));
            }
            Ok(Err(err)) => {
                warn!(order_id = %request.order_id, %err, "change search failed");
                request.advance(ChangeStep::SelectingDate);
                return Err(err);
            }
            Ok(Ok(quotes)) => quotes,
        };

        let best = quotes
            .into_iter()
            .filter(|q| !q.is_expired_at(now))
            .min_by_key(|q| q.total.amount_minor);

        match best {
            Some(quote) => {
                info!(order_id = %request.order_id, total = %quote.total, "change alternative found");
                request.advance(ChangeStep::Reviewing);
                Ok(&*request.quote.insert(quote))
            }
            None => {
                request.advance(ChangeStep::SelectingDate);
                Err(BookingError::NoAlternatives)
            }
        }
    }

    /// Commit the reviewed fare difference against the order. The quote is
    /// re-checked at this instant; an expired one forces a fresh search.
    pub async fn confirm(
        &self,
        request: &mut ChangeRequest,
        now: DateTime<Utc>,
    ) -> BookingResult<Order> {
        if request.step != ChangeStep::Reviewing {
            return Err(BookingError::InvalidTransition {
                from: request.step.name().to_string(),
                command: "confirm change".to_string(),
            });
        }
        let quote = request
            .quote
            .clone()
            .ok_or_else(|| BookingError::NotFound("change quote".to_string()))?;

        if quote.is_expired_at(now) {
            request.quote = None;
            request.advance(ChangeStep::SelectingDate);
            return Err(BookingError::StaleQuote);
        }

        request.advance(ChangeStep::Confirming);

        let confirmation = match timeout(
            self.call_timeout,
            self.provider.confirm_change(request.order_id, quote.id),
        )
        .await
        {
            Err(_) => {
                request.advance(ChangeStep::Reviewing);
                return Err(BookingError::ProviderRejected(
                    "change confirmation timed out".to_string(),
                ));
            }
            Ok(Err(err)) => {
                warn!(order_id = %request.order_id, %err, "change confirmation failed");
                request.advance(ChangeStep::Reviewing);
                return Err(err);
            }
            Ok(Ok(confirmation)) => confirmation,
        };

        let mut order = self
            .orders
            .get_order(request.order_id)
            .await?
            .ok_or_else(|| BookingError::NotFound(format!("order {}", request.order_id)))?;
        order.record_change(quote, confirmation.confirmation_ref)?;
        self.orders.update_order(&order).await?;

        request.advance(ChangeStep::Succeeded);
        info!(order_id = %order.id, total = %order.total, "order changed");
        Ok(order)
    }
}

// Shared with cancel.rs tests
#[cfg(test)]
pub(crate) struct TestOrders {
    orders: tokio::sync::Mutex<std::collections::HashMap<Uuid, Order>>,
}

#[cfg(test)]
impl TestOrders {
    pub(crate) fn with_order(order: Order) -> Arc<Self> {
        let mut map = std::collections::HashMap::new();
        map.insert(order.id, order);
        Arc::new(Self {
            orders: tokio::sync::Mutex::new(map),
        })
    }
}

#[cfg(test)]
#[async_trait::async_trait]
impl OrderRepository for TestOrders {
    async fn insert_order(&self, order: &Order, _idempotency_key: Uuid) -> BookingResult<()> {
        self.orders.lock().await.insert(order.id, order.clone());
        Ok(())
    }

    async fn get_order(&self, id: Uuid) -> BookingResult<Option<Order>> {
        Ok(self.orders.lock().await.get(&id).cloned())
    }

    async fn update_order(&self, order: &Order) -> BookingResult<()> {
        self.orders.lock().await.insert(order.id, order.clone());
        Ok(())
    }
}
