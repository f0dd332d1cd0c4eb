use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use fareline_core::quote::leg_fingerprint;
use fareline_core::{
    AggregatorClient, BookingError, BookingProvider, BookingResult, ComponentKind, ContactDetails,
    Money, ProviderConfirmation, Quote, QuoteComponent, QuoteLeg, SearchCriteria, Traveler,
};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

/// One priced entry as the aggregator returns it, before normalization
#[derive(Debug, Clone, serde::Deserialize)]
pub struct RawOffer {
    pub leg: String,
    pub total: String,
    pub currency: String,
    pub base: Option<String>,
    pub taxes: Option<String>,
    pub fees: Option<String>,
    pub ttl_seconds: Option<i64>,
    pub provider_ref: Option<String>,
}

/// Parse a provider decimal string ("900", "900.5", "900.00") to minor units
fn parse_minor(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    // Sign comes from the string, not the parsed whole part: "-0.50" has a
    // zero whole part but is still negative
    let negative = raw.starts_with('-');
    let (whole, frac) = match raw.split_once('.') {
        Some((w, f)) => (w, f),
        None => (raw, ""),
    };
    if frac.len() > 2 || !frac.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let whole: i64 = whole.parse().ok()?;
    let frac_minor: i64 = if frac.is_empty() {
        0
    } else {
        let padded = format!("{:0<2}", frac);
        padded.parse().ok()?
    };
    whole
        .checked_mul(100)?
        .checked_add(if negative { -frac_minor } else { frac_minor })
}

fn parse_leg(raw: &str) -> Option<QuoteLeg> {
    match raw.trim().to_uppercase().as_str() {
        "FLIGHT" => Some(QuoteLeg::Flight),
        "HOTEL" => Some(QuoteLeg::Hotel),
        "CHANGE_FARE" => Some(QuoteLeg::ChangeFare),
        "REFUND" => Some(QuoteLeg::Refund),
        _ => None,
    }
}

/// Normalize one provider entry into a [`Quote`] tied to the search
/// fingerprint; malformed entries surface as `ProviderRejected`
pub fn normalize_offer(
    raw: &RawOffer,
    criteria_fingerprint: Uuid,
    now: DateTime<Utc>,
) -> BookingResult<Quote> {
    let leg = parse_leg(&raw.leg)
        .ok_or_else(|| BookingError::ProviderRejected(format!("unknown offer leg {:?}", raw.leg)))?;

    let total_minor = parse_minor(&raw.total)
        .filter(|m| *m > 0 || leg == QuoteLeg::Refund)
        .ok_or_else(|| {
            BookingError::ProviderRejected(format!("unparseable offer total {:?}", raw.total))
        })?;

    let ttl = raw
        .ttl_seconds
        .filter(|s| *s > 0)
        .map(chrono::Duration::seconds)
        .unwrap_or_else(Quote::default_ttl);

    let mut quote = Quote::new(
        leg,
        Money::new(total_minor, raw.currency.trim().to_uppercase()),
        now + ttl,
        leg_fingerprint(criteria_fingerprint, leg),
    );
    quote.provider_ref = raw.provider_ref.clone();

    for (kind, value) in [
        (ComponentKind::Base, &raw.base),
        (ComponentKind::Tax, &raw.taxes),
        (ComponentKind::Fee, &raw.fees),
    ] {
        if let Some(value) = value {
            let minor = parse_minor(value).ok_or_else(|| {
                BookingError::ProviderRejected(format!("unparseable price component {:?}", value))
            })?;
            quote.components.push(QuoteComponent {
                kind,
                amount: Money::new(minor, quote.total.currency.clone()),
            });
        }
    }

    debug!(quote_id = %quote.id, leg = ?quote.leg, total = %quote.total, "normalized provider offer");
    Ok(quote)
}

/// Normalize a whole response; any malformed entry fails the batch, since a
/// partially-garbled payload is not trustworthy for pricing
pub fn normalize_offers(
    raw: &[RawOffer],
    criteria_fingerprint: Uuid,
    now: DateTime<Utc>,
) -> BookingResult<Vec<Quote>> {
    raw.iter()
        .map(|r| normalize_offer(r, criteria_fingerprint, now))
        .collect()
}

/// Scriptable aggregator double: queues of canned responses per operation,
/// with call counters for assertions
#[derive(Default)]
pub struct ScriptedAggregator {
    search_responses: Mutex<VecDeque<BookingResult<Vec<Quote>>>>,
    change_responses: Mutex<VecDeque<BookingResult<Vec<Quote>>>>,
    cancel_responses: Mutex<VecDeque<BookingResult<Quote>>>,
    pub search_calls: AtomicUsize,
    pub change_calls: AtomicUsize,
    pub cancel_calls: AtomicUsize,
}

impl ScriptedAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_search(&self, response: BookingResult<Vec<Quote>>) {
        self.search_responses.lock().unwrap().push_back(response);
    }

    pub fn push_change(&self, response: BookingResult<Vec<Quote>>) {
        self.change_responses.lock().unwrap().push_back(response);
    }

    pub fn push_cancel(&self, response: BookingResult<Quote>) {
        self.cancel_responses.lock().unwrap().push_back(response);
    }
}

#[async_trait]
impl AggregatorClient for ScriptedAggregator {
    async fn search_offers(&self, _criteria: &SearchCriteria) -> BookingResult<Vec<Quote>> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        self.search_responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(BookingError::ProviderRejected("no scripted search".into())))
    }

    async fn search_change_offers(
        &self,
        _order_id: Uuid,
        _new_date: NaiveDate,
    ) -> BookingResult<Vec<Quote>> {
        self.change_calls.fetch_add(1, Ordering::SeqCst);
        self.change_responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(BookingError::ProviderRejected("no scripted change".into())))
    }

    async fn request_cancel_quote(&self, _order_id: Uuid) -> BookingResult<Quote> {
        self.cancel_calls.fetch_add(1, Ordering::SeqCst);
        self.cancel_responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Err(BookingError::QuoteUnavailable("no scripted cancel quote".into()))
            })
    }
}

/// Scriptable booking provider double. Honors idempotency keys the way the
/// real provider contract requires: a repeated commit with a seen key
/// acknowledges the original confirmation instead of booking twice.
#[derive(Default)]
pub struct ScriptedProvider {
    fail_next_commit: Mutex<Option<BookingError>>,
    commit_delay: Mutex<Option<std::time::Duration>>,
    committed: Mutex<HashMap<Uuid, ProviderConfirmation>>,
    fail_next_cancel: Mutex<Option<BookingError>>,
    fail_next_change: Mutex<Option<BookingError>>,
    pub commit_calls: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next_commit(&self, err: BookingError) {
        *self.fail_next_commit.lock().unwrap() = Some(err);
    }

    pub fn fail_next_cancel(&self, err: BookingError) {
        *self.fail_next_cancel.lock().unwrap() = Some(err);
    }

    pub fn fail_next_change(&self, err: BookingError) {
        *self.fail_next_change.lock().unwrap() = Some(err);
    }

    /// Simulate a slow provider round trip on the next commit
    pub fn delay_commits(&self, delay: std::time::Duration) {
        *self.commit_delay.lock().unwrap() = Some(delay);
    }

    /// Distinct bookings created so far (idempotent retries excluded)
    pub fn bookings_created(&self) -> usize {
        self.committed.lock().unwrap().len()
    }

    fn confirmation() -> ProviderConfirmation {
        ProviderConfirmation {
            confirmation_ref: format!("PNR-{}", &Uuid::new_v4().simple().to_string()[..8]),
            confirmed_at: Utc::now(),
        }
    }
}

#[async_trait]
impl BookingProvider for ScriptedProvider {
    async fn commit_order(
        &self,
        reservation_id: Uuid,
        _version: u64,
        _quotes: &[Quote],
        _contact: &ContactDetails,
        _travelers: &[Traveler],
        idempotency_key: Uuid,
    ) -> BookingResult<ProviderConfirmation> {
        self.commit_calls.fetch_add(1, Ordering::SeqCst);

        let delay = *self.commit_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(err) = self.fail_next_commit.lock().unwrap().take() {
            return Err(err);
        }

        let mut committed = self.committed.lock().unwrap();
        if let Some(existing) = committed.get(&idempotency_key) {
            warn!(%reservation_id, %idempotency_key, "duplicate commit collapsed by idempotency key");
            return Ok(existing.clone());
        }
        let confirmation = Self::confirmation();
        committed.insert(idempotency_key, confirmation.clone());
        Ok(confirmation)
    }

    async fn confirm_cancel(
        &self,
        _order_id: Uuid,
        _cancel_quote_id: Uuid,
    ) -> BookingResult<ProviderConfirmation> {
        if let Some(err) = self.fail_next_cancel.lock().unwrap().take() {
            return Err(err);
        }
        Ok(Self::confirmation())
    }

    async fn confirm_change(
        &self,
        _order_id: Uuid,
        _change_quote_id: Uuid,
    ) -> BookingResult<ProviderConfirmation> {
        if let Some(err) = self.fail_next_change.lock().unwrap().take() {
            return Err(err);
        }
        Ok(Self::confirmation())
    }
}
