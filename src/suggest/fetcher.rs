//! Debounced, last-submitted-wins suggestion fetching
//!
//! Every [`DebouncedFetcher::submit`] starts a new generation and cancels the
//! previous one wherever it is: a superseded quiet-period wait never reaches
//! the network, and a superseded fetch is dropped mid-flight or discarded on
//! arrival. Results go out on an unbounded channel, at most one batch per
//! generation, in increasing generation order.

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::classify::classify;
use super::client::SuggestClient;
use super::model::{Suggestion, SuggestionQuery};

/// Result delivered for one generation
#[derive(Clone, Debug, PartialEq)]
pub struct SuggestionBatch {
    /// The query this batch answers
    pub query: SuggestionQuery,
    /// Sorted suggestions; `None` hides the list (empty text, no list, fetch error)
    pub suggestions: Option<Vec<Suggestion>>,
}

/// Where the current generation is
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FetchPhase {
    /// Nothing pending
    Idle,
    /// Quiet period running
    Waiting {
        /// Generation being debounced
        generation: u64,
    },
    /// Request in flight
    Fetching {
        /// Generation being fetched
        generation: u64,
    },
}

struct FetcherState {
    generation: u64,
    token: Option<CancellationToken>,
    last_text: String,
    phase: FetchPhase,
}

/// One search box's suggestion pipeline
pub struct DebouncedFetcher {
    client: Arc<dyn SuggestClient>,
    delay: Duration,
    state: Arc<Mutex<FetcherState>>,
    tx: mpsc::UnboundedSender<SuggestionBatch>,
}

impl DebouncedFetcher {
    /// Create a fetcher and the receiver its batches arrive on
    pub fn new(
        client: Arc<dyn SuggestClient>,
        delay: Duration,
    ) -> (Self, mpsc::UnboundedReceiver<SuggestionBatch>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let fetcher = Self {
            client,
            delay,
            state: Arc::new(Mutex::new(FetcherState {
                generation: 0,
                token: None,
                last_text: String::new(),
                phase: FetchPhase::Idle,
            })),
            tx,
        };
        (fetcher, rx)
    }

    /// Submit the current input text and return its generation
    ///
    /// Empty text is answered immediately with `None` and no request. Must be
    /// called from within a tokio runtime.
    pub fn submit(&self, text: impl Into<String>) -> u64 {
        let text = text.into();
        let mut state = self.lock_state();
        let generation = Self::supersede(&mut state);
        state.last_text = text.clone();

        let query = SuggestionQuery { text, generation };
        if query.text.is_empty() {
            // Sent under the lock so no older batch can overtake it
            self.tx
                .send(SuggestionBatch {
                    query,
                    suggestions: None,
                })
                .ok();
            return generation;
        }

        let token = CancellationToken::new();
        state.token = Some(token.clone());
        state.phase = FetchPhase::Waiting { generation };
        drop(state);

        tokio::spawn(run_query(QueryParams {
            client: self.client.clone(),
            delay: self.delay,
            state: self.state.clone(),
            tx: self.tx.clone(),
            query,
            token,
        }));
        generation
    }

    /// Supersede the current generation without delivering anything
    pub fn cancel(&self) {
        let mut state = self.lock_state();
        Self::supersede(&mut state);
    }

    /// Confirm the search: hide pending suggestions and return the text to search
    ///
    /// Delivers `None` for a fresh generation, as submitting empty text does.
    pub fn confirm(&self) -> String {
        let text = self.lock_state().last_text.clone();
        self.submit(String::new());
        text
    }

    /// Latest generation handed out
    pub fn current_generation(&self) -> u64 {
        self.lock_state().generation
    }

    /// Phase of the current generation
    pub fn phase(&self) -> FetchPhase {
        self.lock_state().phase
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, FetcherState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Start a new generation, cancelling whatever the old one was doing
    fn supersede(state: &mut FetcherState) -> u64 {
        state.generation += 1;
        if let Some(token) = state.token.take() {
            token.cancel();
        }
        state.phase = FetchPhase::Idle;
        state.generation
    }
}

impl Drop for DebouncedFetcher {
    fn drop(&mut self) {
        let mut state = self.lock_state();
        if let Some(token) = state.token.take() {
            token.cancel();
        }
    }
}

struct QueryParams {
    client: Arc<dyn SuggestClient>,
    delay: Duration,
    state: Arc<Mutex<FetcherState>>,
    tx: mpsc::UnboundedSender<SuggestionBatch>,
    query: SuggestionQuery,
    token: CancellationToken,
}

async fn run_query(params: QueryParams) {
    let QueryParams {
        client,
        delay,
        state,
        tx,
        query,
        token,
    } = params;
    let generation = query.generation;

    tokio::select! {
        biased;
        _ = token.cancelled() => return,
        _ = tokio::time::sleep(delay) => {}
    }

    {
        let mut state = state.lock().unwrap_or_else(|e| e.into_inner());
        if state.generation != generation {
            return;
        }
        state.phase = FetchPhase::Fetching { generation };
    }

    let result = tokio::select! {
        biased;
        _ = token.cancelled() => {
            tracing::debug!(generation, "Suggestion fetch superseded in flight");
            return;
        }
        result = client.fetch(&query.text) => result,
    };

    let suggestions = match result {
        Ok(list) => list.map(classify),
        Err(e) => {
            tracing::warn!(generation, error = %e, "Suggestion fetch failed");
            None
        }
    };

    let mut state = state.lock().unwrap_or_else(|e| e.into_inner());
    if state.generation != generation {
        tracing::debug!(generation, current = state.generation, "Discarding stale suggestions");
        return;
    }
    state.phase = FetchPhase::Idle;
    state.token = None;
    tx.send(SuggestionBatch { query, suggestions }).ok();
}
