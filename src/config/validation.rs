use crate::config::types::{
    Config, CrawlerConfig, CredentialsConfig, OutputConfig, SiteConfig, UserAgentConfig,
};
use crate::ConfigError;

/// Validates the entire configuration
///
/// Credentials are only checked for shape when present: a configuration
/// without them is valid, the crawl just never logs in.
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_site_config(&config.site)?;
    validate_credentials(&config.credentials)?;
    validate_crawler_config(&config.crawler)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates the crawled site
fn validate_site_config(config: &SiteConfig) -> Result<(), ConfigError> {
    if config.scheme != "http" && config.scheme != "https" {
        return Err(ConfigError::Validation(format!(
            "scheme must be 'http' or 'https', got '{}'",
            config.scheme
        )));
    }

    validate_domain(&config.domain)?;

    if config.course_key.is_empty() {
        return Err(ConfigError::Validation(
            "course-key cannot be empty".to_string(),
        ));
    }

    if config.course_key.chars().any(char::is_whitespace) {
        return Err(ConfigError::Validation(format!(
            "course-key cannot contain whitespace, got '{}'",
            config.course_key
        )));
    }

    Ok(())
}

/// Validates credentials that are present
fn validate_credentials(config: &CredentialsConfig) -> Result<(), ConfigError> {
    if let Some(email) = config.email.as_deref().filter(|e| !e.is_empty()) {
        validate_email(email)?;
    }

    if config.http_pass.is_some() && config.http_user.is_none() {
        return Err(ConfigError::Validation(
            "http-pass is set but http-user is missing".to_string(),
        ));
    }

    Ok(())
}

/// Validates fetch engine settings
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.max_concurrent_requests < 1 || config.max_concurrent_requests > 100 {
        return Err(ConfigError::Validation(format!(
            "max-concurrent-requests must be between 1 and 100, got {}",
            config.max_concurrent_requests
        )));
    }

    if config.request_timeout < 1 {
        return Err(ConfigError::Validation(format!(
            "request-timeout must be >= 1s, got {}s",
            config.request_timeout
        )));
    }

    if config.max_reauth_attempts < 1 {
        return Err(ConfigError::Validation(format!(
            "max-reauth-attempts must be >= 1, got {}",
            config.max_reauth_attempts
        )));
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler-name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler-name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.data_dir.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "data-dir cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates a `host[:port]` domain
fn validate_domain(domain: &str) -> Result<(), ConfigError> {
    if domain.is_empty() {
        return Err(ConfigError::InvalidDomain(
            "Domain cannot be empty".to_string(),
        ));
    }

    let host = match domain.rsplit_once(':') {
        Some((host, port)) => {
            if port.parse::<u16>().is_err() {
                return Err(ConfigError::InvalidDomain(format!(
                    "Domain '{}' has an invalid port",
                    domain
                )));
            }
            host
        }
        None => domain,
    };

    if host.is_empty() {
        return Err(ConfigError::InvalidDomain(format!(
            "Domain '{}' has no host",
            domain
        )));
    }

    if !host
        .chars()
        .all(|c| c.is_alphanumeric() || c == '.' || c == '-')
    {
        return Err(ConfigError::InvalidDomain(format!(
            "Domain '{}' contains invalid characters",
            domain
        )));
    }

    if host.starts_with('.') || host.ends_with('.') || host.starts_with('-') || host.ends_with('-')
    {
        return Err(ConfigError::InvalidDomain(format!(
            "Domain '{}' cannot start or end with '.' or '-'",
            domain
        )));
    }

    if host.contains("..") {
        return Err(ConfigError::InvalidDomain(format!(
            "Domain '{}' cannot contain consecutive dots",
            domain
        )));
    }

    if host != "localhost" && !host.contains('.') {
        return Err(ConfigError::InvalidDomain(format!(
            "Domain '{}' must contain at least one dot (e.g., 'courses.example.org')",
            domain
        )));
    }

    Ok(())
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    let Some((local, domain)) = email.split_once('@') else {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    };

    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    if !domain.contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}
