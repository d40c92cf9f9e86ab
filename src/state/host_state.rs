use std::time::{Duration, Instant};

/// Tracks the state of a host during a crawl
///
/// This structure maintains the per-host information needed to space out
/// requests: how many were issued and when the next one may start.
#[derive(Debug, Clone, Default)]
pub struct HostState {
    /// Number of requests issued to this host in the current job
    pub request_count: u32,

    /// Earliest instant the next request to this host may start
    pub next_request_at: Option<Instant>,
}

impl HostState {
    /// Creates a new HostState with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserves the next request slot for this host
    ///
    /// Returns the instant at which the caller may issue its request and
    /// pushes the following slot `spacing` further out. Concurrent callers
    /// therefore receive strictly increasing start times.
    pub fn reserve_slot(&mut self, now: Instant, spacing: Duration) -> Instant {
        let start = match self.next_request_at {
            Some(at) if at > now => at,
            _ => now,
        };

        self.request_count += 1;
        self.next_request_at = Some(start + spacing);
        start
    }
}
