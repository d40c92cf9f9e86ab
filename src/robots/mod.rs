//! Robots.txt handling module
//!
//! Fetches robots.txt once per host per job and answers allow/deny and
//! crawl-delay questions for the crawl engine. A host whose robots.txt is
//! missing, unreachable, or not a 2xx response is treated as unrestricted.

mod cache;
mod parser;

pub use cache::RobotsCache;
pub use parser::ParsedRobots;

use reqwest::Client;
use url::Url;

/// Builds the robots.txt location on the same scheme, host, and port as `url`
pub fn robots_url(url: &Url) -> Option<Url> {
    let mut robots = url.clone();
    robots.set_path("/robots.txt");
    robots.set_query(None);
    robots.set_fragment(None);
    if robots.host_str().is_none() {
        return None;
    }
    Some(robots)
}

/// Fetches and parses robots.txt for the host of `url`
///
/// Never fails: any error while fetching yields [`ParsedRobots::allow_all`].
pub async fn fetch_robots(client: &Client, url: &Url) -> ParsedRobots {
    let Some(location) = robots_url(url) else {
        return ParsedRobots::allow_all();
    };

    let response = match client.get(location.clone()).send().await {
        Ok(response) => response,
        Err(e) => {
            tracing::debug!(url = %location, error = %e, "robots.txt unreachable, allowing all");
            return ParsedRobots::allow_all();
        }
    };

    if !response.status().is_success() {
        tracing::debug!(
            url = %location,
            status = response.status().as_u16(),
            "No robots.txt, allowing all"
        );
        return ParsedRobots::allow_all();
    }

    match response.text().await {
        Ok(body) => {
            tracing::debug!(url = %location, "Fetched robots.txt");
            ParsedRobots::from_content(&body)
        }
        Err(e) => {
            tracing::debug!(url = %location, error = %e, "Failed to read robots.txt body");
            ParsedRobots::allow_all()
        }
    }
}
