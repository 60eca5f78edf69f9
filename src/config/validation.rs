use crate::config::types::{Config, CrawlerConfig, OutputConfig, ScopeConfig, SeedConfig, UserAgentConfig};
use crate::ConfigError;
use regex::Regex;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_scope_config(&config.scope)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_output_config(&config.output)?;
    validate_seeds(&config.seeds)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.max_concurrent < 1 || config.max_concurrent > 100 {
        return Err(ConfigError::Validation(format!(
            "max_concurrent must be between 1 and 100, got {}",
            config.max_concurrent
        )));
    }

    if config.request_timeout_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "request_timeout_secs must be >= 1, got {}",
            config.request_timeout_secs
        )));
    }

    if config.max_render_units < 1 {
        return Err(ConfigError::Validation(format!(
            "max_render_units must be >= 1, got {}",
            config.max_render_units
        )));
    }

    if config.extraction_workers < 1 {
        return Err(ConfigError::Validation(format!(
            "extraction_workers must be >= 1, got {}",
            config.extraction_workers
        )));
    }

    Ok(())
}

/// Validates scope configuration
///
/// Individual include/exclude entries are not rejected here: an entry that
/// fails to compile falls back to a literal match when the rule set is built.
fn validate_scope_config(config: &ScopeConfig) -> Result<(), ConfigError> {
    if config.exclude_dangerous_paths {
        Regex::new(&config.dangerous_path_pattern).map_err(|e| {
            ConfigError::InvalidPattern(format!(
                "dangerous_path_pattern '{}' does not compile: {}",
                config.dangerous_path_pattern, e
            ))
        })?;
    }

    if !config.retrieve_media_files && config.media_extensions.is_empty() {
        return Err(ConfigError::Validation(
            "media_extensions cannot be empty when retrieve_media_files is false".to_string(),
        ));
    }

    for ext in &config.media_extensions {
        if ext.is_empty() || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(ConfigError::Validation(format!(
                "media extension '{}' must be non-empty and alphanumeric (no leading dot)",
                ext
            )));
        }
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    // Validate crawler name: non-empty, alphanumeric + hyphens only
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

    if config.crawler_version.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_version cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates seed URLs
fn validate_seeds(seeds: &SeedConfig) -> Result<(), ConfigError> {
    for seed in &seeds.urls {
        let url = Url::parse(seed)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid seed URL '{}': {}", seed, e)))?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::Validation(format!(
                "Seed URL '{}' must use the http or https scheme",
                seed
            )));
        }

        if url.host_str().is_none() {
            return Err(ConfigError::InvalidUrl(format!(
                "Seed URL '{}' has no host",
                seed
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn crawler() -> CrawlerConfig {
        CrawlerConfig {
            max_links: 0,
            max_link_depth: 3,
            max_children: 0,
            max_unique_parameters: 0,
            max_concurrent: 10,
            request_timeout_secs: 30,
            max_render_units: 1,
            extraction_workers: 2,
            use_data_bank: true,
            submit_user_name_password: false,
        }
    }

    #[test]
    fn test_validate_crawler_bounds() {
        assert!(validate_crawler_config(&crawler()).is_ok());

        let mut config = crawler();
        config.max_concurrent = 0;
        assert!(validate_crawler_config(&config).is_err());

        config.max_concurrent = 101;
        assert!(validate_crawler_config(&config).is_err());

        let mut config = crawler();
        config.request_timeout_secs = 0;
        assert!(validate_crawler_config(&config).is_err());
    }

    #[test]
    fn test_validate_dangerous_pattern() {
        let mut scope = ScopeConfig::default();
        assert!(validate_scope_config(&scope).is_ok());

        scope.dangerous_path_pattern = "(unclosed".to_string();
        assert!(matches!(
            validate_scope_config(&scope),
            Err(ConfigError::InvalidPattern(_))
        ));

        // Pattern is ignored when the feature is off
        scope.exclude_dangerous_paths = false;
        assert!(validate_scope_config(&scope).is_ok());
    }

    #[test]
    fn test_validate_media_extensions() {
        let mut scope = ScopeConfig::default();
        scope.media_extensions = vec![".png".to_string()];
        assert!(validate_scope_config(&scope).is_err());

        scope.media_extensions.clear();
        assert!(validate_scope_config(&scope).is_err());

        scope.retrieve_media_files = true;
        assert!(validate_scope_config(&scope).is_ok());
    }

    #[test]
    fn test_validate_seeds() {
        let ok = SeedConfig {
            urls: vec!["http://example.com/".to_string()],
        };
        assert!(validate_seeds(&ok).is_ok());

        let bad_scheme = SeedConfig {
            urls: vec!["ftp://example.com/".to_string()],
        };
        assert!(validate_seeds(&bad_scheme).is_err());

        let garbage = SeedConfig {
            urls: vec!["not a url".to_string()],
        };
        assert!(matches!(
            validate_seeds(&garbage),
            Err(ConfigError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_validate_user_agent() {
        let ok = UserAgentConfig {
            crawler_name: "Scout-Line".to_string(),
            crawler_version: "1.0".to_string(),
        };
        assert!(validate_user_agent_config(&ok).is_ok());

        let bad = UserAgentConfig {
            crawler_name: "scout line".to_string(),
            crawler_version: "1.0".to_string(),
        };
        assert!(validate_user_agent_config(&bad).is_err());
    }
}
