use crate::money::MoneyError;

/// Shared failure taxonomy for the booking lifecycle.
///
/// Every variant carries a user-actionable message; callers must surface the
/// concrete kind rather than collapsing them into a generic failure.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingError {
    #[error("search criteria incomplete: {0}; fill in the missing fields before searching")]
    InvalidCriteria(String),

    #[error("no offers matched these dates and cities; adjust the dates or try nearby airports")]
    NoOffers,

    #[error("the quoted price has expired; request a fresh price before confirming")]
    StaleQuote,

    #[error("the travel provider declined the request: {0}")]
    ProviderRejected(String),

    #[error("a cancellation or change price could not be obtained: {0}; wait a moment and request a new quote")]
    QuoteUnavailable(String),

    #[error("no alternatives exist on that date; pick a different date")]
    NoAlternatives,

    #[error("this booking was updated elsewhere (expected version {expected}, found {actual}); reload and retry")]
    VersionConflict { expected: u64, actual: u64 },

    #[error("cannot {command} while the booking is {from}")]
    InvalidTransition { from: String, command: String },

    #[error("{0} not found")]
    NotFound(String),
}

impl From<MoneyError> for BookingError {
    fn from(err: MoneyError) -> Self {
        BookingError::ProviderRejected(err.to_string())
    }
}

pub type BookingResult<T> = Result<T, BookingError>;
