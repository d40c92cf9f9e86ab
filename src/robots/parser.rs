//! Robots exclusion rules backed by the robotstxt crate

use robotstxt::DefaultMatcher;
use std::time::Duration;

/// Robots rules for one host
///
/// Holds the raw robots.txt body and evaluates it on demand with the
/// robotstxt matcher. An empty body or a missing file allows everything.
#[derive(Debug, Clone, Default)]
pub struct ParsedRobots {
    body: Option<String>,
}

impl ParsedRobots {
    /// Wraps a fetched robots.txt body
    pub fn from_content(content: &str) -> Self {
        Self {
            body: Some(content.to_string()),
        }
    }

    /// Rules used when a host has no usable robots.txt
    pub fn allow_all() -> Self {
        Self { body: None }
    }

    /// Returns true if this host imposes no restrictions
    pub fn is_unrestricted(&self) -> bool {
        self.body.as_deref().map_or(true, |b| b.trim().is_empty())
    }

    /// Checks if `url` may be fetched by the agent named `agent_token`
    ///
    /// `url` may be a full URL or a bare path.
    pub fn is_allowed(&self, url: &str, agent_token: &str) -> bool {
        match self.body.as_deref() {
            Some(body) if !body.trim().is_empty() => {
                let mut matcher = DefaultMatcher::default();
                matcher.one_agent_allowed_by_robots(body, agent_token, url)
            }
            _ => true,
        }
    }

    /// Gets the Crawl-delay that applies to `agent_token`
    ///
    /// A group naming the agent wins over the `*` group.
    pub fn crawl_delay(&self, agent_token: &str) -> Option<Duration> {
        let body = self.body.as_deref()?;
        let agent = agent_token.to_lowercase();

        let mut group: Vec<String> = Vec::new();
        let mut group_open = false;
        let mut specific = None;
        let mut wildcard = None;

        for line in body.lines() {
            let line = line.split('#').next().unwrap_or("").trim();
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let value = value.trim();

            match key.trim().to_lowercase().as_str() {
                "user-agent" => {
                    if !group_open {
                        group.clear();
                        group_open = true;
                    }
                    group.push(value.to_lowercase());
                }
                "crawl-delay" => {
                    group_open = false;
                    let Ok(secs) = value.parse::<f64>() else {
                        continue;
                    };
                    if secs < 0.0 || !secs.is_finite() {
                        continue;
                    }
                    let delay = Duration::from_secs_f64(secs);
                    if group.iter().any(|ua| ua != "*" && agent.contains(ua.as_str())) {
                        specific = Some(delay);
                    } else if group.iter().any(|ua| ua == "*") {
                        wildcard = Some(delay);
                    }
                }
                _ => group_open = false,
            }
        }

        specific.or(wildcard)
    }
}
