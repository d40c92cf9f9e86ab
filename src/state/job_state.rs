/// Job status definitions for the conversion pipeline
///
/// Statuses advance strictly forward through the pipeline stages; `Failed` is
/// reachable from any non-terminal status and both `Completed` and `Failed`
/// are terminal.
use std::fmt;

/// Represents the current lifecycle stage of a conversion job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum JobStatus {
    /// Job record created, working directory allocated, worker launched
    Starting,

    /// Crawl engine is traversing the site
    Crawling,

    /// Text recovery stage (possibly a no-op)
    Ocr,

    /// Document renderer is running
    Generating,

    // ===== Terminal States =====
    /// Artifact produced successfully
    Completed,

    /// Job ended with an error
    Failed,
}

impl JobStatus {
    /// Returns true if no further transitions are possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Position of the status along the pipeline
    fn stage_index(&self) -> u8 {
        match self {
            Self::Starting => 0,
            Self::Crawling => 1,
            Self::Ocr => 2,
            Self::Generating => 3,
            Self::Completed => 4,
            Self::Failed => 5,
        }
    }

    /// Checks whether moving from `self` to `next` is a legal transition
    ///
    /// Staying in the same non-terminal status is allowed so a stage can
    /// report intermediate progress.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        if self.is_terminal() {
            return false;
        }

        match next {
            Self::Failed => true,
            _ => next.stage_index() >= self.stage_index(),
        }
    }

    /// Converts the status to its wire/log string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Starting => "starting",
            Self::Crawling => "crawling",
            Self::Ocr => "ocr",
            Self::Generating => "generating",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Parses a status from its string representation
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "starting" => Some(Self::Starting),
            "crawling" => Some(Self::Crawling),
            "ocr" => Some(Self::Ocr),
            "generating" => Some(Self::Generating),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [JobStatus; 6] = [
        JobStatus::Starting,
        JobStatus::Crawling,
        JobStatus::Ocr,
        JobStatus::Generating,
        JobStatus::Completed,
        JobStatus::Failed,
    ];

    #[test]
    fn test_forward_transitions_allowed() {
        assert!(JobStatus::Starting.can_transition_to(JobStatus::Crawling));
        assert!(JobStatus::Crawling.can_transition_to(JobStatus::Ocr));
        assert!(JobStatus::Ocr.can_transition_to(JobStatus::Generating));
        assert!(JobStatus::Generating.can_transition_to(JobStatus::Completed));
    }

    #[test]
    fn test_skipping_stages_forward_allowed() {
        assert!(JobStatus::Crawling.can_transition_to(JobStatus::Generating));
    }

    #[test]
    fn test_same_status_allowed_while_active() {
        assert!(JobStatus::Crawling.can_transition_to(JobStatus::Crawling));
        assert!(JobStatus::Ocr.can_transition_to(JobStatus::Ocr));
    }

    #[test]
    fn test_backward_transitions_rejected() {
        assert!(!JobStatus::Ocr.can_transition_to(JobStatus::Crawling));
        assert!(!JobStatus::Generating.can_transition_to(JobStatus::Starting));
    }

    #[test]
    fn test_failed_reachable_from_any_active_state() {
        for status in ALL.iter().filter(|s| !s.is_terminal()) {
            assert!(status.can_transition_to(JobStatus::Failed), "{}", status);
        }
    }

    #[test]
    fn test_terminal_states_are_final() {
        for next in ALL {
            assert!(!JobStatus::Completed.can_transition_to(next));
            assert!(!JobStatus::Failed.can_transition_to(next));
        }
    }

    #[test]
    fn test_string_roundtrip() {
        for status in ALL {
            assert_eq!(JobStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(JobStatus::parse("paused"), None);
    }
}
