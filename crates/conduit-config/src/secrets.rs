//! API key resolution.
//!
//! Resolution order:
//! 1. Command-line flag
//! 2. Environment variable (`CONDUIT_API_KEY`)
//! 3. Config file (with warning)

/// Environment variable holding the model API key.
pub const API_KEY_ENV: &str = "CONDUIT_API_KEY";

/// Result of API key resolution with provenance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSecret {
    /// The secret value.
    pub value: String,
    /// Where the secret was found.
    pub source: SecretSource,
}

/// Where a secret was resolved from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecretSource {
    /// `--api-key` on the command line.
    CommandLine,
    /// Environment variable.
    EnvVar(String),
    /// Config file (plaintext, not recommended).
    ConfigFile,
}

impl std::fmt::Display for SecretSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SecretSource::CommandLine => write!(f, "command line"),
            SecretSource::EnvVar(var) => write!(f, "env var {}", var),
            SecretSource::ConfigFile => write!(f, "config file (plaintext)"),
        }
    }
}

/// Resolve the model API key using the full resolution chain.
pub fn resolve_api_key(cli_value: Option<&str>, config_value: Option<&str>) -> Option<ResolvedSecret> {
    resolve_with(cli_value, config_value, |var| std::env::var(var).ok())
}

fn resolve_with(
    cli_value: Option<&str>,
    config_value: Option<&str>,
    env: impl Fn(&str) -> Option<String>,
) -> Option<ResolvedSecret> {
    if let Some(value) = cli_value.filter(|v| !v.is_empty()) {
        return Some(ResolvedSecret {
            value: value.to_string(),
            source: SecretSource::CommandLine,
        });
    }

    if let Some(value) = env(API_KEY_ENV).filter(|v| !v.is_empty()) {
        return Some(ResolvedSecret {
            value,
            source: SecretSource::EnvVar(API_KEY_ENV.to_string()),
        });
    }

    config_value.filter(|v| !v.is_empty()).map(|v| ResolvedSecret {
        value: v.to_string(),
        source: SecretSource::ConfigFile,
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn env_with(value: &'static str) -> impl Fn(&str) -> Option<String> {
        move |var| (var == API_KEY_ENV).then(|| value.to_string())
    }

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_cli_wins() {
        let r = resolve_with(Some("cli-key"), Some("file-key"), env_with("env-key")).unwrap();
        assert_eq!(r.value, "cli-key");
        assert_eq!(r.source, SecretSource::CommandLine);
    }

    #[test]
    fn test_env_before_config() {
        let r = resolve_with(None, Some("file-key"), env_with("env-key")).unwrap();
        assert_eq!(r.value, "env-key");
        assert_eq!(r.source, SecretSource::EnvVar(API_KEY_ENV.to_string()));
    }

    #[test]
    fn test_resolve_from_config_value() {
        let r = resolve_with(None, Some("my-key"), no_env).unwrap();
        assert_eq!(r.value, "my-key");
        assert_eq!(r.source, SecretSource::ConfigFile);
    }

    #[test]
    fn test_empty_values_are_skipped() {
        assert_eq!(resolve_with(Some(""), Some(""), env_with("")), None);
        assert_eq!(resolve_with(None, None, no_env), None);
    }

    #[test]
    fn test_secret_source_display() {
        assert_eq!(SecretSource::CommandLine.to_string(), "command line");
        assert_eq!(
            SecretSource::EnvVar("CONDUIT_API_KEY".to_string()).to_string(),
            "env var CONDUIT_API_KEY"
        );
        assert_eq!(SecretSource::ConfigFile.to_string(), "config file (plaintext)");
    }
}
