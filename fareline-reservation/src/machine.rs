use chrono::{DateTime, Utc};
use fareline_core::party::validate_travelers;
use fareline_core::{
    BookingError, BookingResult, ContactDetails, Quote, QuoteLeg, SearchCriteria, Traveler,
};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

/// The single source of truth for where a booking intent stands.
///
/// One tagged union per reservation; every move goes through a validated
/// transition, so contradictory step flags cannot exist. `Pricing` and
/// `Committing` are suspension points: commands arriving in those states are
/// rejected, not queued.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReservationState {
    Draft,
    Pricing,
    Priced,
    Reviewing,
    Committing,
    Confirmed { order_id: Uuid },
    /// Recoverable: criteria and contact details survive for a retry
    PricingFailed { reason: BookingError },
    /// Recoverable: returns to review, with the stale quotes discarded
    CommitFailed { reason: BookingError },
}

impl ReservationState {
    pub fn name(&self) -> &'static str {
        match self {
            ReservationState::Draft => "DRAFT",
            ReservationState::Pricing => "PRICING",
            ReservationState::Priced => "PRICED",
            ReservationState::Reviewing => "REVIEWING",
            ReservationState::Committing => "COMMITTING",
            ReservationState::Confirmed { .. } => "CONFIRMED",
            ReservationState::PricingFailed { .. } => "PRICING_FAILED",
            ReservationState::CommitFailed { .. } => "COMMIT_FAILED",
        }
    }
}

/// The mutable in-progress booking intent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reservation {
    pub id: Uuid,
    /// Bumped on every accepted transition; stale commands are rejected
    /// against it and it feeds outbound idempotency keys
    pub version: u64,
    pub state: ReservationState,
    pub criteria: SearchCriteria,
    /// Everything the last search returned, for explicit selection
    pub offered: Vec<Quote>,
    /// The quotes that would be committed, one per leg
    pub selected: Vec<Quote>,
    pub contact: Option<ContactDetails>,
    pub travelers: Vec<Traveler>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Reservation {
    pub fn new(criteria: SearchCriteria) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            version: 0,
            state: ReservationState::Draft,
            criteria,
            offered: Vec::new(),
            selected: Vec::new(),
            contact: None,
            travelers: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    fn advance(&mut self, state: ReservationState) {
        debug!(reservation_id = %self.id, from = self.state.name(), to = state.name(), "reservation transition");
        self.state = state;
        self.version += 1;
        self.updated_at = Utc::now();
    }

    fn refuse(&self, command: &str) -> BookingError {
        BookingError::InvalidTransition {
            from: self.state.name().to_string(),
            command: command.to_string(),
        }
    }

    /// Replace the search criteria while editable; user-entered contact and
    /// traveler details are kept, prior quotes are dropped
    pub fn set_criteria(&mut self, criteria: SearchCriteria) -> BookingResult<()> {
        match self.state {
            ReservationState::Draft | ReservationState::PricingFailed { .. } => {
                self.criteria = criteria;
                self.offered.clear();
                self.selected.clear();
                self.advance(ReservationState::Draft);
                Ok(())
            }
            _ => Err(self.refuse("edit the search")),
        }
    }

    /// Enter the pricing suspension point. Criteria are validated here, so
    /// an incomplete search never reaches the network.
    pub fn begin_pricing(&mut self) -> BookingResult<()> {
        match self.state {
            ReservationState::Draft
            | ReservationState::PricingFailed { .. }
            | ReservationState::Priced
            | ReservationState::Reviewing => {
                self.criteria.validate()?;
                self.advance(ReservationState::Pricing);
                Ok(())
            }
            _ => Err(self.refuse("price the trip")),
        }
    }

    /// Record a successful pricing pass. If valid contact details were
    /// already supplied, the reservation moves straight to review rather
    /// than asking the user to re-enter them.
    pub fn pricing_succeeded(
        &mut self,
        offered: Vec<Quote>,
        selected: Vec<Quote>,
    ) -> BookingResult<()> {
        if self.state != ReservationState::Pricing {
            return Err(self.refuse("record pricing"));
        }
        self.offered = offered;
        self.selected = selected;
        if self.has_details() {
            self.advance(ReservationState::Reviewing);
        } else {
            self.advance(ReservationState::Priced);
        }
        Ok(())
    }

    /// Record a failed pricing pass; criteria and contact details survive
    /// unchanged so the flow can be retried without re-entry
    pub fn pricing_failed(&mut self, reason: BookingError) -> BookingResult<()> {
        if self.state != ReservationState::Pricing {
            return Err(self.refuse("record pricing"));
        }
        self.offered.clear();
        self.selected.clear();
        self.advance(ReservationState::PricingFailed { reason });
        Ok(())
    }

    /// Swap the retained quote for its leg with another offered one
    pub fn select_quote(&mut self, quote_id: Uuid) -> BookingResult<()> {
        if !matches!(
            self.state,
            ReservationState::Priced | ReservationState::Reviewing
        ) {
            return Err(self.refuse("select an offer"));
        }
        let quote = self
            .offered
            .iter()
            .find(|q| q.id == quote_id)
            .cloned()
            .ok_or_else(|| BookingError::NotFound(format!("offer {}", quote_id)))?;
        self.selected.retain(|q| q.leg != quote.leg);
        self.selected.push(quote);
        self.advance(self.state.clone());
        Ok(())
    }

    /// Capture contact and traveler details. Valid in any editable state;
    /// from `Priced` this is the step that moves the booking into review.
    pub fn supply_details(
        &mut self,
        contact: ContactDetails,
        travelers: Vec<Traveler>,
    ) -> BookingResult<()> {
        match self.state {
            ReservationState::Draft
            | ReservationState::Priced
            | ReservationState::PricingFailed { .. }
            | ReservationState::Reviewing => {
                contact.validate()?;
                validate_travelers(&travelers)?;
                self.contact = Some(contact);
                self.travelers = travelers;
                let next = if self.state == ReservationState::Priced {
                    ReservationState::Reviewing
                } else {
                    self.state.clone()
                };
                self.advance(next);
                Ok(())
            }
            _ => Err(self.refuse("supply traveler details")),
        }
    }

    /// Enter the commit suspension point. Only review can lead here, which
    /// is what makes at-most-once commitment enforceable.
    pub fn begin_commit(&mut self) -> BookingResult<()> {
        if self.state != ReservationState::Reviewing {
            return Err(self.refuse("confirm the booking"));
        }
        if self.selected.is_empty() {
            // Quotes were discarded by an earlier failure: re-price first
            return Err(BookingError::StaleQuote);
        }
        self.advance(ReservationState::Committing);
        Ok(())
    }

    pub fn commit_succeeded(&mut self, order_id: Uuid) -> BookingResult<()> {
        if self.state != ReservationState::Committing {
            return Err(self.refuse("record the commit"));
        }
        self.advance(ReservationState::Confirmed { order_id });
        Ok(())
    }

    /// Commit failed: the quotes in hand are no longer trustworthy and are
    /// discarded, forcing a fresh pricing pass before another attempt
    pub fn commit_failed(&mut self, reason: BookingError) -> BookingResult<()> {
        if self.state != ReservationState::Committing {
            return Err(self.refuse("record the commit"));
        }
        self.offered.clear();
        self.selected.clear();
        self.advance(ReservationState::CommitFailed { reason });
        Ok(())
    }

    /// Acknowledge a commit failure and return to review
    pub fn resume_review(&mut self) -> BookingResult<()> {
        match self.state {
            ReservationState::CommitFailed { .. } => {
                self.advance(ReservationState::Reviewing);
                Ok(())
            }
            _ => Err(self.refuse("resume review")),
        }
    }

    fn has_details(&self) -> bool {
        self.contact.is_some() && !self.travelers.is_empty()
    }

    /// Legs a successful pricing pass must cover for this trip kind
    pub fn required_legs(&self) -> &'static [QuoteLeg] {
        match self.criteria.trip_kind {
            fareline_core::TripKind::Flight => &[QuoteLeg::Flight],
            fareline_core::TripKind::Hotel => &[QuoteLeg::Hotel],
            fareline_core::TripKind::Bundle => &[QuoteLeg::Flight, QuoteLeg::Hotel],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};
    use fareline_core::{AgeBand, Money, TripKind};

    fn criteria() -> SearchCriteria {
        SearchCriteria {
            trip_kind: TripKind::Flight,
            origin: "JFK".to_string(),
            destination: "LHR".to_string(),
            depart_date: NaiveDate::from_ymd_opt(2026, 6, 1).unwrap(),
            return_date: None,
            adults: 2,
            children: 0,
            cabin_class: None,
            room_class: None,
        }
    }

    fn quote(leg: QuoteLeg, amount: i64) -> Quote {
        Quote::new(
            leg,
            Money::new(amount, "USD"),
            Utc::now() + Duration::minutes(15),
            Uuid::new_v4(),
        )
    }

    fn contact() -> ContactDetails {
        ContactDetails {
            full_name: "Ada Boyle".to_string(),
            email: Some("ada@example.com".to_string()),
            phone: None,
        }
    }

    fn travelers() -> Vec<Traveler> {
        vec![Traveler {
            full_name: "Ada Boyle".to_string(),
            age_band: AgeBand::Adult,
        }]
    }

    #[test]
    fn test_version_bumps_on_every_accepted_transition() {
        let mut r = Reservation::new(criteria());
        assert_eq!(r.version, 0);
        r.begin_pricing().unwrap();
        assert_eq!(r.version, 1);
        let q = quote(QuoteLeg::Flight, 90_000);
        r.pricing_succeeded(vec![q.clone()], vec![q]).unwrap();
        assert_eq!(r.version, 2);
    }

    #[test]
    fn test_commands_rejected_while_suspended_in_pricing() {
        let mut r = Reservation::new(criteria());
        r.begin_pricing().unwrap();
        assert!(matches!(
            r.begin_pricing(),
            Err(BookingError::InvalidTransition { .. })
        ));
        assert!(matches!(
            r.begin_commit(),
            Err(BookingError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_invalid_criteria_never_enters_pricing() {
        let mut c = criteria();
        c.destination = String::new();
        let mut r = Reservation::new(c);
        assert!(matches!(
            r.begin_pricing(),
            Err(BookingError::InvalidCriteria(_))
        ));
        assert_eq!(r.state, ReservationState::Draft);
    }

    #[test]
    fn test_pricing_failure_preserves_user_entered_fields() {
        let mut r = Reservation::new(criteria());
        r.supply_details(contact(), travelers()).unwrap();
        r.begin_pricing().unwrap();
        r.pricing_failed(BookingError::NoOffers).unwrap();

        assert_eq!(r.criteria, criteria());
        assert_eq!(r.contact, Some(contact()));
        assert_eq!(r.travelers.len(), 1);
        assert!(matches!(
            r.state,
            ReservationState::PricingFailed {
                reason: BookingError::NoOffers
            }
        ));
    }

    #[test]
    fn test_repricing_with_details_skips_re_entry() {
        let mut r = Reservation::new(criteria());
        r.supply_details(contact(), travelers()).unwrap();
        r.begin_pricing().unwrap();
        let q = quote(QuoteLeg::Flight, 90_000);
        r.pricing_succeeded(vec![q.clone()], vec![q]).unwrap();
        // Details were already on file, so the booking is reviewable at once
        assert_eq!(r.state, ReservationState::Reviewing);
    }

    #[test]
    fn test_commit_only_reachable_from_review() {
        let mut r = Reservation::new(criteria());
        r.begin_pricing().unwrap();
        let q = quote(QuoteLeg::Flight, 90_000);
        r.pricing_succeeded(vec![q.clone()], vec![q]).unwrap();
        assert_eq!(r.state, ReservationState::Priced);
        assert!(r.begin_commit().is_err());

        r.supply_details(contact(), travelers()).unwrap();
        assert_eq!(r.state, ReservationState::Reviewing);
        r.begin_commit().unwrap();
        assert_eq!(r.state, ReservationState::Committing);
    }

    #[test]
    fn test_commit_failure_discards_quotes_and_forces_repricing() {
        let mut r = Reservation::new(criteria());
        r.supply_details(contact(), travelers()).unwrap();
        r.begin_pricing().unwrap();
        let q = quote(QuoteLeg::Flight, 90_000);
        r.pricing_succeeded(vec![q.clone()], vec![q]).unwrap();
        r.begin_commit().unwrap();
        r.commit_failed(BookingError::ProviderRejected("declined".into()))
            .unwrap();

        r.resume_review().unwrap();
        assert_eq!(r.state, ReservationState::Reviewing);
        // With the stale quotes gone, another confirm demands re-pricing
        assert_eq!(r.begin_commit(), Err(BookingError::StaleQuote));
    }

    #[test]
    fn test_select_quote_replaces_same_leg_only() {
        let mut r = Reservation::new(criteria());
        r.begin_pricing().unwrap();
        let cheap = quote(QuoteLeg::Flight, 80_000);
        let pricey = quote(QuoteLeg::Flight, 95_000);
        r.pricing_succeeded(vec![cheap.clone(), pricey.clone()], vec![cheap])
            .unwrap();

        r.select_quote(pricey.id).unwrap();
        assert_eq!(r.selected.len(), 1);
        assert_eq!(r.selected[0].id, pricey.id);
    }
}
