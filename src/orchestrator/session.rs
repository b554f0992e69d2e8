//! Per-session state machine and counters

use std::fmt;
use std::time::{Duration, Instant};

use log::{debug, warn};

/// Lifecycle of one live scrape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Idle,
    Authenticating,
    LocatingFilter,
    Paging,
    FlushingPartial,
    FlushingFinal,
    Completed,
    Failed,
}

impl SessionState {
    /// Whether `self -> next` is an edge of the session graph.
    #[must_use]
    pub fn can_transition(self, next: SessionState) -> bool {
        use SessionState::{
            Authenticating, Completed, Failed, FlushingFinal, FlushingPartial, Idle,
            LocatingFilter, Paging,
        };

        match (self, next) {
            (Completed | Failed, _) => false,
            (_, Failed) => true,
            (Idle, Authenticating)
            | (Authenticating, LocatingFilter)
            | (LocatingFilter, Paging)
            | (Paging, FlushingPartial | FlushingFinal)
            | (FlushingPartial, Paging)
            | (FlushingFinal, Completed) => true,
            _ => false,
        }
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Completed | SessionState::Failed)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Mutable bookkeeping for one session.
#[derive(Debug)]
pub struct ScrapeSession {
    location: String,
    state: SessionState,
    started: Instant,
    pub(crate) pages_scraped: usize,
    pub(crate) leads_seen: usize,
    pub(crate) leads_saved: usize,
    pub(crate) failed_chunks: usize,
    pub(crate) total_pages: Option<usize>,
}

impl ScrapeSession {
    #[must_use]
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            state: SessionState::Idle,
            started: Instant::now(),
            pages_scraped: 0,
            leads_seen: 0,
            leads_saved: 0,
            failed_chunks: 0,
            total_pages: None,
        }
    }

    #[must_use]
    pub fn location(&self) -> &str {
        &self.location
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    #[must_use]
    pub fn leads_saved(&self) -> usize {
        self.leads_saved
    }

    #[must_use]
    pub fn pages_scraped(&self) -> usize {
        self.pages_scraped
    }

    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Move to `next`, logging the edge. Edges outside the session graph
    /// are logged and applied anyway so a failure can always be recorded.
    pub fn transition(&mut self, next: SessionState) {
        if self.state == next {
            return;
        }
        if self.state.can_transition(next) {
            debug!("[{}] {} -> {}", self.location, self.state, next);
        } else {
            warn!(
                "[{}] unexpected session transition {} -> {}",
                self.location, self.state, next
            );
        }
        self.state = next;
    }

    pub(crate) fn record_page(&mut self, leads: usize) {
        self.pages_scraped += 1;
        self.leads_seen += leads;
    }
}
