use crate::money::Money;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What the quoted price is for
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuoteLeg {
    Flight,
    Hotel,
    ChangeFare,
    Refund,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComponentKind {
    Base,
    Tax,
    Fee,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuoteComponent {
    pub kind: ComponentKind,
    pub amount: Money,
}

/// A priced, time-limited offer from the aggregator.
///
/// Valid for commit only while `now < expires_at`; an expired quote must
/// never reach the provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Quote {
    pub id: Uuid,
    pub leg: QuoteLeg,
    pub total: Money,
    pub components: Vec<QuoteComponent>,
    pub expires_at: DateTime<Utc>,
    /// Fingerprint of the search that produced this quote (per leg)
    pub fingerprint: Uuid,
    pub provider_ref: Option<String>,
}

impl Quote {
    pub fn new(leg: QuoteLeg, total: Money, expires_at: DateTime<Utc>, fingerprint: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            leg,
            total,
            components: Vec::new(),
            expires_at,
            fingerprint,
            provider_ref: None,
        }
    }

    /// Provider default when no explicit TTL is given
    pub fn default_ttl() -> Duration {
        Duration::minutes(15)
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Per-leg fingerprint derived from the criteria fingerprint, so flight and
/// hotel quotes for one bundle search do not collide in the store
pub fn leg_fingerprint(criteria_fingerprint: Uuid, leg: QuoteLeg) -> Uuid {
    let key = format!("{}:{:?}", criteria_fingerprint, leg);
    Uuid::new_v5(&criteria_fingerprint, key.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validity_boundary_is_inclusive_of_expiry() {
        let now = Utc::now();
        let quote = Quote::new(
            QuoteLeg::Flight,
            Money::new(90_000, "USD"),
            now + Duration::minutes(15),
            Uuid::new_v4(),
        );
        assert!(!quote.is_expired_at(now));
        assert!(!quote.is_expired_at(now + Duration::minutes(14)));
        assert!(quote.is_expired_at(now + Duration::minutes(15)));
        assert!(quote.is_expired_at(now + Duration::minutes(16)));
    }

    #[test]
    fn test_leg_fingerprints_differ_per_leg() {
        let criteria_fp = Uuid::new_v4();
        assert_ne!(
            leg_fingerprint(criteria_fp, QuoteLeg::Flight),
            leg_fingerprint(criteria_fp, QuoteLeg::Hotel)
        );
        assert_eq!(
            leg_fingerprint(criteria_fp, QuoteLeg::Flight),
            leg_fingerprint(criteria_fp, QuoteLeg::Flight)
        );
    }
}
