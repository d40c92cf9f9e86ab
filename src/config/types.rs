use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure for Pagefold
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent", default)]
    pub user_agent: UserAgentConfig,
    #[serde(default)]
    pub jobs: JobsConfig,
    #[serde(default)]
    pub ocr: OcrConfig,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// Maximum number of in-flight page fetches per job
    #[serde(rename = "max-concurrent-fetches")]
    pub max_concurrent_fetches: u32,

    /// Maximum number of in-flight fetches against a single host
    #[serde(rename = "max-fetches-per-host")]
    pub max_fetches_per_host: u32,

    /// Fixed delay between requests to the same host (milliseconds)
    #[serde(rename = "request-delay-ms")]
    pub request_delay_ms: u64,

    /// Upper bound of the random jitter added to the delay (milliseconds)
    #[serde(rename = "request-jitter-ms")]
    pub request_jitter_ms: u64,

    /// Per-request timeout (seconds)
    #[serde(rename = "request-timeout-secs")]
    pub request_timeout_secs: u64,

    /// Whether robots.txt is consulted before fetching
    #[serde(rename = "respect-robots-txt")]
    pub respect_robots_txt: bool,
}

impl CrawlerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_fetches: 8,
            max_fetches_per_host: 2,
            request_delay_ms: 1000,
            request_jitter_ms: 500,
            request_timeout_secs: 10,
            respect_robots_txt: true,
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,
}

impl UserAgentConfig {
    /// Formats the header value: `Name/Version (+ContactURL)`
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{})",
            self.crawler_name, self.crawler_version, self.contact_url
        )
    }
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            crawler_name: "Pagefold".to_string(),
            crawler_version: env!("CARGO_PKG_VERSION").to_string(),
            contact_url: "https://example.com/bot".to_string(),
        }
    }
}

/// Job lifecycle configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct JobsConfig {
    /// Parent directory for per-job working directories
    #[serde(rename = "work-dir")]
    pub work_dir: PathBuf,

    /// Age after which finished jobs are swept (seconds)
    #[serde(rename = "retention-secs")]
    pub retention_secs: u64,

    /// Interval between retention sweeps (seconds)
    #[serde(rename = "sweep-interval-secs")]
    pub sweep_interval_secs: u64,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            work_dir: std::env::temp_dir().join("pagefold"),
            retention_secs: 3600,
            sweep_interval_secs: 1800,
        }
    }
}

/// Image text recovery configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    /// Whether text recovery is attempted at all
    pub enabled: bool,

    /// Recognizer executable
    pub command: String,

    /// Recognizer language codes
    pub languages: Vec<String>,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            command: "tesseract".to_string(),
            languages: vec!["eng".to_string()],
        }
    }
}
