/// Crawl state definitions for frontier entries
///
/// Each URL taken from the frontier moves through
/// `Queued -> Fetching -> Extracting -> (Recursing | Done)`.
/// Failures are not a state of their own: the entry is logged to the
/// failure log and reaches `Done`.
use std::fmt;

/// Represents the state of one frontier entry in the crawl engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CrawlState {
    /// Waiting in the frontier
    Queued,

    /// Request in flight
    Fetching,

    /// Markup being parsed into a page record
    Extracting,

    /// Outbound links being filtered and enqueued
    Recursing,

    /// No further work for this entry
    Done,
}

impl CrawlState {
    /// Returns true if this is a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done)
    }

    /// Checks whether moving from `self` to `next` is a legal transition
    pub fn can_transition_to(&self, next: CrawlState) -> bool {
        matches!(
            (self, next),
            (Self::Queued, Self::Fetching)
                | (Self::Fetching, Self::Extracting)
                | (Self::Fetching, Self::Done)
                | (Self::Extracting, Self::Recursing)
                | (Self::Extracting, Self::Done)
                | (Self::Recursing, Self::Done)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Fetching => "fetching",
            Self::Extracting => "extracting",
            Self::Recursing => "recursing",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for CrawlState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
