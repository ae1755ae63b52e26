//! Search-as-you-type suggestions
//!
//! Input text goes into a [`DebouncedFetcher`], which waits for a quiet period,
//! asks a [`SuggestClient`] for the raw list, runs it through [`classify`] and
//! delivers the sorted [`Suggestion`]s tagged with the query's generation.

pub mod classify;
pub mod client;
pub mod fetcher;
pub mod model;

pub use classify::{classify, classify_one};
pub use client::{HttpSuggestClient, SuggestClient};
pub use fetcher::{DebouncedFetcher, FetchPhase, SuggestionBatch};
pub use model::{
    RawSuggestion, SeasonDetails, Suggestion, SuggestionKind, SuggestionQuery, UserDetails,
};

use crate::config::SuggestConfig;
use crate::error::Result;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Fetcher over HTTP with the configured endpoint and quiet period
pub fn http_fetcher(
    config: &SuggestConfig,
) -> Result<(DebouncedFetcher, mpsc::UnboundedReceiver<SuggestionBatch>)> {
    let client = HttpSuggestClient::new(config)?;
    Ok(DebouncedFetcher::new(Arc::new(client), config.delay))
}
