pub mod client;
pub mod store;

pub use client::{normalize_offer, normalize_offers, RawOffer, ScriptedAggregator, ScriptedProvider};
pub use store::QuoteStore;
