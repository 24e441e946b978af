use std::path::Path;

use reqwest::Url;

use crate::config::schema::ClientConfig;
use crate::error::ConfigError;
use crate::history::MAX_RETENTION_HOURS;

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<ClientConfig, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<ClientConfig, ConfigError> {
    let config: ClientConfig = serde_json::from_str(content)?;

    validate_config(&config)?;

    Ok(config)
}

fn validate_config(config: &ClientConfig) -> Result<(), ConfigError> {
    if config.version != "1.0" {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }

    validate_http_url("api.baseUrl", &config.api.base_url)?;
    if let Some(proxy) = &config.cache.image_proxy_url {
        validate_http_url("cache.imageProxyUrl", proxy)?;
    }

    if config.api.timeout_secs == 0 {
        return Err(ConfigError::Validation {
            message: "api.timeoutSecs must be greater than 0".to_string(),
        });
    }
    if config.history.page_size == 0 {
        return Err(ConfigError::Validation {
            message: "history.pageSize must be greater than 0".to_string(),
        });
    }
    if !(1..=MAX_RETENTION_HOURS).contains(&config.history.retention_hours) {
        return Err(ConfigError::Validation {
            message: format!(
                "history.retentionHours must be between 1 and {}, got {}",
                MAX_RETENTION_HOURS, config.history.retention_hours
            ),
        });
    }
    if config.history.model_ids.iter().any(|m| m.trim().is_empty()) {
        return Err(ConfigError::Validation {
            message: "history.modelIds must not contain empty entries".to_string(),
        });
    }

    if let Err(e) = tracing_subscriber::EnvFilter::try_new(&config.logging.level) {
        return Err(ConfigError::Validation {
            message: format!("Invalid logging.level '{}': {}", config.logging.level, e),
        });
    }

    Ok(())
}

fn validate_http_url(field: &str, value: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value).map_err(|e| ConfigError::InvalidUrl {
        field: field.to_string(),
        reason: e.to_string(),
    })?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl {
            field: field.to_string(),
            reason: format!("unsupported scheme '{}'", url.scheme()),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::LogFormat;
    use std::io::Write;

    const MINIMAL: &str = r#"{"version": "1.0", "api": {"baseUrl": "https://api.example.com"}}"#;

    #[test]
    fn test_minimal_config_defaults() {
        let config = load_config_from_str(MINIMAL).unwrap();
        assert_eq!(config.history.page_size, 1000);
        assert_eq!(config.history.retention_hours, 24);
        assert!(config.history.model_ids.is_empty());
        assert_eq!(config.api.timeout_secs, 30);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert!(config.cache.resolved_database_path().is_some());
    }

    #[test]
    fn test_full_config() {
        let json = r#"{
            "version": "1.0",
            "api": {"baseUrl": "https://api.example.com", "apiKey": "k", "timeoutSecs": 5},
            "history": {"pageSize": 200, "retentionHours": 12, "modelIds": ["restore-v2"]},
            "cache": {"databasePath": "/tmp/restora/test.db", "imageProxyUrl": "https://app.example.com/proxy"},
            "logging": {"level": "restora=debug", "format": "json"}
        }"#;
        let config = load_config_from_str(json).unwrap();
        assert_eq!(config.history.settings().page_size, 200);
        assert_eq!(config.history.settings().retention, chrono::Duration::hours(12));
        assert_eq!(
            config.cache.resolved_database_path().unwrap(),
            std::path::PathBuf::from("/tmp/restora/test.db")
        );
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_rejects_bad_version() {
        let json = MINIMAL.replace("1.0", "2.0");
        assert!(matches!(
            load_config_from_str(&json),
            Err(ConfigError::Validation { .. })
        ));
    }

    #[test]
    fn test_rejects_bad_urls() {
        let json = r#"{"version": "1.0", "api": {"baseUrl": "not a url"}}"#;
        assert!(matches!(
            load_config_from_str(json),
            Err(ConfigError::InvalidUrl { .. })
        ));

        let json = r#"{"version": "1.0", "api": {"baseUrl": "ftp://files.example.com"}}"#;
        assert!(matches!(
            load_config_from_str(json),
            Err(ConfigError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn test_rejects_zero_page_size() {
        let json = r#"{"version": "1.0", "api": {"baseUrl": "https://a.example.com"}, "history": {"pageSize": 0}}"#;
        assert!(load_config_from_str(json).is_err());
    }

    #[test]
    fn test_rejects_negative_retention() {
        let json = r#"{"version": "1.0", "api": {"baseUrl": "https://a.example.com"}, "history": {"retentionHours": -1}}"#;
        assert!(load_config_from_str(json).is_err());
    }

    #[test]
    fn test_rejects_oversized_retention() {
        let json = r#"{"version": "1.0", "api": {"baseUrl": "https://a.example.com"}, "history": {"retentionHours": 3000000000}}"#;
        assert!(matches!(
            load_config_from_str(json),
            Err(ConfigError::Validation { .. })
        ));

        let json = r#"{"version": "1.0", "api": {"baseUrl": "https://a.example.com"}, "history": {"retentionHours": 876000}}"#;
        let config = load_config_from_str(json).unwrap();
        assert_eq!(config.history.settings().retention, chrono::Duration::hours(876_000));
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            load_config_from_str("{"),
            Err(ConfigError::ParseJson(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(MINIMAL.as_bytes()).unwrap();
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.api.base_url, "https://api.example.com");

        let missing = load_config("/nonexistent/restora.json");
        assert!(matches!(missing, Err(ConfigError::ReadFile { .. })));
    }
}
