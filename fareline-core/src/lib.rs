pub mod adapters;
pub mod criteria;
pub mod error;
pub mod money;
pub mod party;
pub mod quote;

pub use adapters::{AggregatorClient, BookingProvider, IntentAudit, IntentRecord, ProviderConfirmation, RecordStatus};
pub use criteria::{SearchCriteria, TripKind};
pub use error::{BookingError, BookingResult};
pub use money::{Money, MoneyError};
pub use party::{AgeBand, ContactDetails, Traveler};
pub use quote::{ComponentKind, Quote, QuoteComponent, QuoteLeg};
