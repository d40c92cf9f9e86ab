use crate::config::types::{Config, CrawlerConfig, JobsConfig, OcrConfig, UserAgentConfig};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_jobs_config(&config.jobs)?;
    validate_ocr_config(&config.ocr)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.max_concurrent_fetches < 1 || config.max_concurrent_fetches > 64 {
        return Err(ConfigError::Validation(format!(
            "max_concurrent_fetches must be between 1 and 64, got {}",
            config.max_concurrent_fetches
        )));
    }

    if config.max_fetches_per_host < 1
        || config.max_fetches_per_host > config.max_concurrent_fetches
    {
        return Err(ConfigError::Validation(format!(
            "max_fetches_per_host must be between 1 and {}, got {}",
            config.max_concurrent_fetches, config.max_fetches_per_host
        )));
    }

    if config.request_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "request_timeout_secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;

    Ok(())
}

fn validate_jobs_config(config: &JobsConfig) -> Result<(), ConfigError> {
    if config.work_dir.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "work_dir cannot be empty".to_string(),
        ));
    }

    if config.sweep_interval_secs < 1 {
        return Err(ConfigError::Validation(
            "sweep_interval_secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}

fn validate_ocr_config(config: &OcrConfig) -> Result<(), ConfigError> {
    if config.enabled && config.command.trim().is_empty() {
        return Err(ConfigError::Validation(
            "ocr command cannot be empty when ocr is enabled".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn test_per_host_cap_bounded_by_pool() {
        let mut config = Config::default();
        config.crawler.max_concurrent_fetches = 2;
        config.crawler.max_fetches_per_host = 3;
        assert!(validate(&config).is_err());

        config.crawler.max_fetches_per_host = 2;
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_validate_crawler_name() {
        let mut config = Config::default();
        config.user_agent.crawler_name = "bad name!".to_string();
        assert!(validate(&config).is_err());

        config.user_agent.crawler_name = String::new();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_validate_contact_url() {
        let mut config = Config::default();
        config.user_agent.contact_url = "not a url".to_string();
        assert!(matches!(
            validate(&config).unwrap_err(),
            ConfigError::InvalidUrl(_)
        ));
    }

    #[test]
    fn test_disabled_ocr_allows_empty_command() {
        let mut config = Config::default();
        config.ocr.command = String::new();
        assert!(validate(&config).is_err());

        config.ocr.enabled = false;
        assert!(validate(&config).is_ok());
    }
}
