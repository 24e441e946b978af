//! API key resolution.
//!
//! A key may be given inline, as a file path (container secrets), or as the
//! name of an environment variable. The first non-empty source wins, in that
//! order.

use std::fs;
use std::path::PathBuf;

use secrecy::SecretString;

/// Environment variable consulted when the config names none.
pub const DEFAULT_API_KEY_ENV_VAR: &str = "RESTORA_API_KEY";

#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("No secret source provided (need one of: direct value, file path, or env var name)")]
    NoSourceProvided,

    #[error("Failed to read secret from file '{path}': {source}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Environment variable '{name}' not set")]
    EnvVarNotSet { name: String },

    #[error("Environment variable '{name}' contains invalid UTF-8")]
    EnvVarNotUnicode { name: String },
}

pub type Result<T> = std::result::Result<T, SecretError>;

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|s| !s.is_empty())
}

/// Resolves a secret from the first configured source.
pub fn resolve_secret(
    direct: Option<&str>,
    file_path: Option<&str>,
    env_var: Option<&str>,
) -> Result<SecretString> {
    if let Some(value) = non_empty(direct) {
        return Ok(SecretString::from(value.to_string()));
    }

    if let Some(path) = non_empty(file_path) {
        let expanded = expand_home(path);
        let content = fs::read_to_string(&expanded).map_err(|e| SecretError::FileReadError {
            path: expanded.to_string_lossy().into_owned(),
            source: e,
        })?;
        return Ok(SecretString::from(content.trim().to_string()));
    }

    if let Some(name) = non_empty(env_var) {
        return match std::env::var(name) {
            Ok(value) => Ok(SecretString::from(value.trim().to_string())),
            Err(std::env::VarError::NotPresent) => Err(SecretError::EnvVarNotSet {
                name: name.to_string(),
            }),
            Err(std::env::VarError::NotUnicode(_)) => Err(SecretError::EnvVarNotUnicode {
                name: name.to_string(),
            }),
        };
    }

    Err(SecretError::NoSourceProvided)
}

/// Like [`resolve_secret`], but no configured source yields `None`.
pub fn resolve_secret_optional(
    direct: Option<&str>,
    file_path: Option<&str>,
    env_var: Option<&str>,
) -> Result<Option<SecretString>> {
    match resolve_secret(direct, file_path, env_var) {
        Ok(secret) => Ok(Some(secret)),
        Err(SecretError::NoSourceProvided) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Expands a leading `~` or `~/` to the home directory. `~user` is not
/// supported.
pub fn expand_home(path: &str) -> PathBuf {
    let rest = match path.strip_prefix('~') {
        Some("") => Some(""),
        Some(rest) if rest.starts_with('/') => Some(&rest[1..]),
        _ => None,
    };
    match (rest, dirs::home_dir()) {
        (Some(""), Some(home)) => home,
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use serial_test::serial;
    use std::io::Write;

    #[test]
    #[serial]
    fn test_direct_value_wins() {
        std::env::set_var("RESTORA_TEST_KEY", "from-env");
        let secret = resolve_secret(Some("inline"), None, Some("RESTORA_TEST_KEY")).unwrap();
        assert_eq!(secret.expose_secret(), "inline");
        std::env::remove_var("RESTORA_TEST_KEY");
    }

    #[test]
    #[serial]
    fn test_file_before_env() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "  from-file  ").unwrap();
        std::env::set_var("RESTORA_TEST_KEY", "from-env");

        let path = file.path().to_str().unwrap();
        let secret = resolve_secret(None, Some(path), Some("RESTORA_TEST_KEY")).unwrap();
        assert_eq!(secret.expose_secret(), "from-file");
        std::env::remove_var("RESTORA_TEST_KEY");
    }

    #[test]
    #[serial]
    fn test_env_fallback_and_empty_strings() {
        std::env::set_var("RESTORA_TEST_KEY", "from-env\n");
        let secret = resolve_secret(Some(""), Some(""), Some("RESTORA_TEST_KEY")).unwrap();
        assert_eq!(secret.expose_secret(), "from-env");
        std::env::remove_var("RESTORA_TEST_KEY");
    }

    #[test]
    #[serial]
    fn test_missing_env_var() {
        std::env::remove_var("RESTORA_TEST_MISSING");
        let err = resolve_secret(None, None, Some("RESTORA_TEST_MISSING")).unwrap_err();
        assert!(matches!(err, SecretError::EnvVarNotSet { .. }));
    }

    #[test]
    fn test_missing_file() {
        let err = resolve_secret(None, Some("/nonexistent/restora/key"), None).unwrap_err();
        assert!(matches!(err, SecretError::FileReadError { .. }));
    }

    #[test]
    fn test_optional_without_sources() {
        assert!(resolve_secret_optional(None, None, None).unwrap().is_none());
        assert!(matches!(
            resolve_secret(None, None, None).unwrap_err(),
            SecretError::NoSourceProvided
        ));
    }

    #[test]
    fn test_expand_home() {
        let home = dirs::home_dir().unwrap();
        assert_eq!(expand_home("~"), home);
        assert_eq!(expand_home("~/a/b"), home.join("a/b"));
        assert_eq!(expand_home("/abs/path"), PathBuf::from("/abs/path"));
        assert_eq!(expand_home("~alice/x"), PathBuf::from("~alice/x"));
    }
}
