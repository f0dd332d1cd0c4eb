use crate::error::{BookingError, BookingResult};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

/// Namespace for deriving stable fingerprints from normalized criteria
const FINGERPRINT_NAMESPACE: Uuid = Uuid::from_u128(0x8f2f_1c64_9b1e_4f0a_b3d7_52ae_17c0_66d1);

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TripKind {
    Flight,
    Hotel,
    Bundle,
}

impl TripKind {
    pub fn label(&self) -> &'static str {
        match self {
            TripKind::Flight => "FLIGHT",
            TripKind::Hotel => "HOTEL",
            TripKind::Bundle => "BUNDLE",
        }
    }
}

/// Immutable search request: what the traveler asked to price
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SearchCriteria {
    pub trip_kind: TripKind,
    pub origin: String,
    pub destination: String,
    pub depart_date: NaiveDate,
    pub return_date: Option<NaiveDate>,
    pub adults: u32,
    pub children: u32,
    pub cabin_class: Option<String>,
    pub room_class: Option<String>,
}

impl SearchCriteria {
    /// Check the fields required by the trip kind, before any network call
    pub fn validate(&self) -> BookingResult<()> {
        let mut missing = Vec::new();

        match self.trip_kind {
            TripKind::Flight | TripKind::Bundle => {
                if self.origin.trim().is_empty() {
                    missing.push("origin");
                }
                if self.destination.trim().is_empty() {
                    missing.push("destination");
                }
            }
            TripKind::Hotel => {
                if self.destination.trim().is_empty() {
                    missing.push("destination");
                }
            }
        }

        if matches!(self.trip_kind, TripKind::Hotel | TripKind::Bundle) && self.return_date.is_none() {
            missing.push("return date");
        }

        if self.adults == 0 {
            missing.push("at least one adult traveler");
        }

        if let Some(ret) = self.return_date {
            if ret < self.depart_date {
                missing.push("a return date on or after departure");
            }
        }

        if missing.is_empty() {
            Ok(())
        } else {
            debug!(trip_kind = ?self.trip_kind, ?missing, "rejected incomplete search criteria");
            Err(BookingError::InvalidCriteria(missing.join(", ")))
        }
    }

    /// Stable fingerprint of the normalized fields, used for quote
    /// deduplication and idempotency
    pub fn fingerprint(&self) -> Uuid {
        let normalized = format!(
            "{}|{}|{}|{}|{}|{}|{}|{}|{}",
            self.trip_kind.label(),
            self.origin.trim().to_uppercase(),
            self.destination.trim().to_uppercase(),
            self.depart_date,
            self.return_date.map(|d| d.to_string()).unwrap_or_default(),
            self.adults,
            self.children,
            self.cabin_class.as_deref().unwrap_or("").trim().to_lowercase(),
            self.room_class.as_deref().unwrap_or("").trim().to_lowercase(),
        );
        Uuid::new_v5(&FINGERPRINT_NAMESPACE, normalized.as_bytes())
    }

    pub fn traveler_count(&self) -> u32 {
        self.adults + self.children
    }

    /// Short human-readable label for the audit trail, e.g. "JFK to LHR"
    pub fn trip_label(&self) -> String {
        match self.trip_kind {
            TripKind::Hotel => self.destination.trim().to_uppercase(),
            _ => format!(
                "{} to {}",
                self.origin.trim().to_uppercase(),
                self.destination.trim().to_uppercase()
            ),
        }
    }
}
