//! URL handling module for Pagefold
//!
//! This module provides submission normalization, host extraction, the
//! seen-set dedup key, and the link filter that decides which discovered
//! links are eligible for traversal.

mod domain;
mod normalize;

use ::url::Url;

// Re-export main functions
pub use domain::{authority_key, extract_host};
pub use normalize::{dedup_key, normalize_submission};

/// Path suffixes of non-document resources that are never traversed
pub const EXCLUDED_EXTENSIONS: &[&str] = &[
    ".pdf", ".doc", ".docx", ".xls", ".xlsx", ".ppt", ".pptx", ".zip", ".rar", ".tar", ".gz",
    ".mp3", ".mp4", ".avi", ".mov",
];

/// Outcome of filtering a candidate link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkDecision {
    /// Link may be enqueued
    Accept,
    /// Link would be fetched beyond the job's max depth
    DepthExceeded,
    /// Link points at a different host than the start URL
    CrossDomain,
    /// Link path ends in a denylisted file extension
    ExcludedExtension,
    /// Link was already fetched or queued in this job
    AlreadySeen,
}

impl LinkDecision {
    /// Returns true if the link should be enqueued
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accept)
    }
}

/// Decides which discovered links are eligible for further traversal
///
/// Rules are applied in order:
/// 1. Depth bound
/// 2. Same host and explicit port as the start URL; the scheme is ignored
/// 3. Extension denylist
/// 4. Seen-set membership (checked by the caller's frontier)
#[derive(Debug, Clone)]
pub struct LinkFilter {
    start_host: Option<String>,
    start_port: Option<u16>,
    max_depth: u32,
}

impl LinkFilter {
    /// Creates a filter scoped to the host of `start_url`
    pub fn new(start_url: &Url, max_depth: u32) -> Self {
        Self {
            start_host: extract_host(start_url),
            start_port: start_url.port(),
            max_depth,
        }
    }

    pub fn max_depth(&self) -> u32 {
        self.max_depth
    }

    /// Applies the static rules (depth, host, extension) to a candidate
    ///
    /// # Arguments
    ///
    /// * `url` - The resolved absolute candidate URL
    /// * `depth` - The depth the candidate would be fetched at
    pub fn check(&self, url: &Url, depth: u32) -> LinkDecision {
        if depth > self.max_depth {
            return LinkDecision::DepthExceeded;
        }

        // Explicit ports only, so an http start still accepts links after an
        // https redirect
        if extract_host(url) != self.start_host || url.port() != self.start_port {
            return LinkDecision::CrossDomain;
        }

        if has_excluded_extension(url) {
            return LinkDecision::ExcludedExtension;
        }

        LinkDecision::Accept
    }

    /// Applies all four rules, consulting `is_seen` for the last one
    pub fn check_with_seen<F>(&self, url: &Url, depth: u32, is_seen: F) -> LinkDecision
    where
        F: FnOnce(&str) -> bool,
    {
        match self.check(url, depth) {
            LinkDecision::Accept if is_seen(&dedup_key(url)) => LinkDecision::AlreadySeen,
            decision => decision,
        }
    }

    /// Boolean eligibility for a candidate link
    pub fn is_eligible<F>(&self, url: &Url, depth: u32, is_seen: F) -> bool
    where
        F: FnOnce(&str) -> bool,
    {
        self.check_with_seen(url, depth, is_seen).is_accepted()
    }
}

fn has_excluded_extension(url: &Url) -> bool {
    let path = url.path().to_lowercase();
    EXCLUDED_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
}
