//! Provider adapters implementing [`QuoteSource`](crate::source::QuoteSource).

pub mod yahoo;

pub use yahoo::{YahooAuthManager, YahooQuoteSource};
