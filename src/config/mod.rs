//! Configuration module for Pagefold
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! Every section is optional; missing keys fall back to the defaults in [`types`].
//!
//! # Example
//!
//! ```no_run
//! use pagefold::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("pagefold.toml")).unwrap();
//! println!("Fetch pool size: {}", config.crawler.max_concurrent_fetches);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{Config, CrawlerConfig, JobsConfig, OcrConfig, UserAgentConfig};

// Re-export parser functions
pub use parser::{
    compute_config_hash, hash_content, load_config, load_config_with_hash, parse_config,
};
pub use validation::validate;
