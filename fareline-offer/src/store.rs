use chrono::{DateTime, Utc};
use fareline_core::Quote;
use std::collections::HashMap;
use uuid::Uuid;

/// Holds the current short-lived quote per search fingerprint.
///
/// Storing a new quote for a fingerprint invalidates any quote previously
/// handed out for it; validity is checked lazily against the clock at read
/// time, so no eviction task is needed. Pure in-memory map, never errors.
#[derive(Debug, Default)]
pub struct QuoteStore {
    quotes: HashMap<Uuid, Quote>,
}

impl QuoteStore {
    pub fn new() -> Self {
        Self {
            quotes: HashMap::new(),
        }
    }

    /// Store a quote under its fingerprint, superseding any prior quote
    pub fn put(&mut self, quote: Quote) {
        self.quotes.insert(quote.fingerprint, quote);
    }

    /// Current quote for a fingerprint, if any was ever stored
    pub fn get(&self, fingerprint: &Uuid) -> Option<&Quote> {
        self.quotes.get(fingerprint)
    }

    /// A quote is valid only while it is the current quote for its
    /// fingerprint and its expiry has not passed
    pub fn is_valid(&self, quote: &Quote, now: DateTime<Utc>) -> bool {
        let current = self
            .quotes
            .get(&quote.fingerprint)
            .is_some_and(|stored| stored.id == quote.id);
        current && !quote.is_expired_at(now)
    }
}
