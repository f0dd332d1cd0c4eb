use crate::commit::CommitCoordinator;
use crate::machine::{Reservation, ReservationState};
use chrono::{DateTime, Utc};
use fareline_core::{
    AggregatorClient, BookingError, BookingResult, ContactDetails, IntentAudit, IntentRecord,
    Money, Quote, QuoteLeg, SearchCriteria, Traveler,
};
use fareline_offer::QuoteStore;
use fareline_order::Order;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::timeout;
use tracing::warn;
use uuid::Uuid;

/// Owns every in-flight reservation and drives it through its lifecycle.
///
/// Each reservation is driven by one logical owner at a time; commands carry
/// the version they were computed against and are rejected on mismatch
/// before anything reaches the network.
pub struct ReservationService {
    reservations: HashMap<Uuid, Reservation>,
    quotes: QuoteStore,
    aggregator: Arc<dyn AggregatorClient>,
    audit: Arc<dyn IntentAudit>,
    committer: CommitCoordinator,
    search_timeout: Duration,
}

fn fetch<'a>(
    reservations: &'a mut HashMap<Uuid, Reservation>,
    id: Uuid,
    expected_version: u64,
) -> BookingResult<&'a mut Reservation> {
    let reservation = reservations
        .get_mut(&id)
        .ok_or_else(|| BookingError::NotFound(format!("reservation {}", id)))?;
    if reservation.version != expected_version {
        return Err(BookingError::VersionConflict {
            expected: expected_version,
            actual: reservation.version,
        });
    }
    Ok(reservation)
}

/// Retain the cheapest quote per leg; explicit selection can override later
fn least_cost_per_leg(quotes: &[Quote]) -> Vec<Quote> {
    let mut best: HashMap<QuoteLeg, &Quote> = HashMap::new();
    for quote in quotes {
        match best.get(&quote.leg) {
            Some(current) if current.total.amount_minor <= quote.total.amount_minor => {}
            _ => {
                best.insert(quote.leg, quote);
            }
        }
    }
    best.into_values().cloned().collect()
}

impl ReservationService {
    pub fn new(
        aggregator: Arc<dyn AggregatorClient>,
        audit: Arc<dyn IntentAudit>,
        committer: CommitCoordinator,
    ) -> Self {
        Self {
            reservations: HashMap::new(),
            quotes: QuoteStore::new(),
            aggregator,
            audit,
            committer,
            search_timeout: Duration::from_secs(10),
        }
    }

    pub fn with_search_timeout(mut self, search_timeout: Duration) -> Self {
        self.search_timeout = search_timeout;
        self
    }

    /// Begin a booking intent in `Draft`
    pub fn start(&mut self, criteria: SearchCriteria) -> Uuid {
        let reservation = Reservation::new(criteria);
        let id = reservation.id;
        self.reservations.insert(id, reservation);
        id
    }

    pub fn get(&self, id: Uuid) -> Option<&Reservation> {
        self.reservations.get(&id)
    }

    /// Progress messages for the commit display
    pub fn commit_status(&self) -> watch::Receiver<&'static str> {
        self.committer.status_updates()
    }

    pub fn edit_criteria(
        &mut self,
        id: Uuid,
        version: u64,
        criteria: SearchCriteria,
    ) -> BookingResult<&Reservation> {
        let reservation = fetch(&mut self.reservations, id, version)?;
        reservation.set_criteria(criteria)?;
        Ok(&*reservation)
    }

    pub fn supply_details(
        &mut self,
        id: Uuid,
        version: u64,
        contact: ContactDetails,
        travelers: Vec<Traveler>,
    ) -> BookingResult<&Reservation> {
        let reservation = fetch(&mut self.reservations, id, version)?;
        reservation.supply_details(contact, travelers)?;
        Ok(&*reservation)
    }

    pub fn select_quote(&mut self, id: Uuid, version: u64, quote_id: Uuid) -> BookingResult<&Reservation> {
        let reservation = fetch(&mut self.reservations, id, version)?;
        reservation.select_quote(quote_id)?;
        // The explicit choice becomes the current quote for its leg in the
        // store, superseding the least-cost default, so confirm accepts it
        if let Some(quote) = reservation.selected.iter().find(|q| q.id == quote_id) {
            self.quotes.put(quote.clone());
        }
        Ok(&*reservation)
    }

    /// Acknowledge a commit failure, returning the booking to review
    pub fn resume_review(&mut self, id: Uuid, version: u64) -> BookingResult<&Reservation> {
        let reservation = fetch(&mut self.reservations, id, version)?;
        reservation.resume_review()?;
        Ok(&*reservation)
    }

    /// Price the trip: `Draft → Pricing → Priced | PricingFailed`.
    ///
    /// The intent audit record is written as soon as pricing starts,
    /// independently of whether the search succeeds; it is fired on a
    /// separate task and never blocks or rolls back this flow.
    pub async fn price(&mut self, id: Uuid, version: u64) -> BookingResult<&Reservation> {
        let (criteria, estimated) = {
            let reservation = fetch(&mut self.reservations, id, version)?;
            // Estimate from a prior pass's quotes, when re-pricing
            let estimated = if reservation.selected.is_empty() {
                None
            } else {
                Money::sum(reservation.selected.iter().map(|q| &q.total)).ok()
            };
            reservation.begin_pricing()?;
            (reservation.criteria.clone(), estimated)
        };

        let audit = Arc::clone(&self.audit);
        let record = IntentRecord::from_criteria(id, &criteria, estimated);
        tokio::spawn(async move {
            if let Err(err) = audit.record_intent(record).await {
                warn!(%err, "intent audit write failed");
            }
        });

        let outcome = timeout(self.search_timeout, self.aggregator.search_offers(&criteria)).await;
        let now = Utc::now();

        let reservation = self
            .reservations
            .get_mut(&id)
            .ok_or_else(|| BookingError::NotFound(format!("reservation {}", id)))?;

        let quotes = match outcome {
            Err(_) => {
                let reason =
                    BookingError::ProviderRejected("the offer search timed out".to_string());
                reservation.pricing_failed(reason.clone())?;
                return Err(reason);
            }
            Ok(Err(err)) => {
                reservation.pricing_failed(err.clone())?;
                return Err(err);
            }
            Ok(Ok(quotes)) => quotes,
        };

        let live: Vec<Quote> = quotes
            .into_iter()
            .filter(|q| !q.is_expired_at(now))
            .collect();
        let selected = least_cost_per_leg(&live);
        let covered = reservation
            .required_legs()
            .iter()
            .all(|leg| selected.iter().any(|q| q.leg == *leg));

        if !covered {
            // A partially priced bundle is not bookable as requested
            reservation.pricing_failed(BookingError::NoOffers)?;
            return Err(BookingError::NoOffers);
        }

        for quote in &selected {
            self.quotes.put(quote.clone());
        }
        reservation.pricing_succeeded(live, selected)?;
        Ok(&*reservation)
    }

    /// Confirm the reviewed booking: `Reviewing → Committing → Confirmed`.
    ///
    /// Every selected quote is re-validated against the store and the clock
    /// before the transition; a lapsed quote refuses the confirmation with
    /// no network call, leaving the booking in review for re-pricing.
    pub async fn confirm(
        &mut self,
        id: Uuid,
        version: u64,
        now: DateTime<Utc>,
    ) -> BookingResult<Order> {
        let (commit_version, selected, contact, travelers) = {
            let reservation = fetch(&mut self.reservations, id, version)?;
            if reservation.state == ReservationState::Reviewing
                && reservation
                    .selected
                    .iter()
                    .any(|q| !self.quotes.is_valid(q, now))
            {
                return Err(BookingError::StaleQuote);
            }
            // Checked before the transition: a missing contact must not
            // strand the reservation in Committing
            let contact = reservation
                .contact
                .clone()
                .ok_or_else(|| BookingError::NotFound("contact details".to_string()))?;
            reservation.begin_commit()?;
            (
                reservation.version,
                reservation.selected.clone(),
                contact,
                reservation.travelers.clone(),
            )
        };

        let result = self
            .committer
            .commit(id, commit_version, &selected, &contact, &travelers)
            .await;

        let reservation = self
            .reservations
            .get_mut(&id)
            .ok_or_else(|| BookingError::NotFound(format!("reservation {}", id)))?;

        match result {
            Ok(order) => {
                reservation.commit_succeeded(order.id)?;
                Ok(order)
            }
            Err(err) => {
                reservation.commit_failed(err.clone())?;
                Err(err)
            }
        }
    }
}
