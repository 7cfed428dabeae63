//! Configuration types.
//!
//! Everything is read once at startup into `TriageConfig` and passed down
//! explicitly. Nothing below `main` reads the environment.

use std::path::PathBuf;
use std::str::FromStr;

use secrecy::SecretString;

use crate::error::ConfigError;
use crate::llm::{LlmBackend, LlmConfig};
use crate::triage::Thresholds;
use crate::triage::bias::DEFAULT_MIN_SAMPLES;

/// IMAP connection and folder settings.
#[derive(Debug, Clone)]
pub struct MailConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: SecretString,
    /// Mailbox being triaged.
    pub mailbox: String,
    /// Destination for promotional messages.
    pub promotional_folder: String,
    /// Destination for spam.
    pub trash_folder: String,
}

/// Full triage configuration.
#[derive(Debug, Clone)]
pub struct TriageConfig {
    pub mail: MailConfig,
    pub llm: LlmConfig,
    /// Ledger database file.
    pub db_path: PathBuf,
    /// rspamd `/checkv2` endpoint.
    pub scorer_url: String,
    pub thresholds: Thresholds,
    /// Prompt the operator unless `--auto` is given.
    pub interactive: bool,
    /// Accepted but not used by the decision rules.
    pub history_weight: f64,
    pub history_min_samples: u64,
}

impl TriageConfig {
    /// Build config from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let get_or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let username = get("IMAP_USERNAME")
            .or_else(|| get("YAHOO_EMAIL"))
            .ok_or_else(|| ConfigError::MissingRequired {
                key: "IMAP_USERNAME".into(),
                hint: "Set IMAP_USERNAME (or YAHOO_EMAIL) to the mailbox login.".into(),
            })?;
        let password = get("IMAP_PASSWORD")
            .or_else(|| get("YAHOO_APP_PASSWORD"))
            .ok_or_else(|| ConfigError::MissingRequired {
                key: "IMAP_PASSWORD".into(),
                hint: "Set IMAP_PASSWORD (or YAHOO_APP_PASSWORD) to an app password.".into(),
            })?;

        let mail = MailConfig {
            host: get_or("IMAP_HOST", "imap.mail.yahoo.com"),
            port: parse_or(&get, "IMAP_PORT", 993)?,
            username,
            password: SecretString::from(password),
            mailbox: get_or("MAILBOX", "INBOX"),
            promotional_folder: get_or("DEST_FOLDER", "Promotional"),
            trash_folder: get_or("TRASH_FOLDER", "Bulk Mail"),
        };

        let backend: LlmBackend = parse_or(&get, "LLM_BACKEND", LlmBackend::Anthropic)?;
        let api_key = get("LLM_API_KEY")
            .or_else(|| get(backend.key_env_var()))
            .ok_or_else(|| ConfigError::MissingRequired {
                key: "LLM_API_KEY".into(),
                hint: format!("Set LLM_API_KEY or {}.", backend.key_env_var()),
            })?;
        let llm = LlmConfig {
            backend,
            api_key: SecretString::from(api_key),
            model: get_or("LLM_MODEL", backend.default_model()),
        };

        let thresholds = Thresholds::new(
            parse_or(&get, "RSPAMD_SPAM_SCORE", 6.0)?,
            parse_or(&get, "RSPAMD_TRASH_SCORE", 7.0)?,
        );

        Ok(Self {
            mail,
            llm,
            db_path: PathBuf::from(get_or("SQLITE_PATH", "./state.sqlite")),
            scorer_url: get_or("RSPAMD_URL", "http://127.0.0.1:11333/checkv2"),
            thresholds,
            interactive: get("INTERACTIVE").map(|v| parse_flag(&v)).unwrap_or(true),
            history_weight: parse_or(&get, "HISTORY_WEIGHT", 0.3)?,
            history_min_samples: parse_or(&get, "HISTORY_MIN_SAMPLES", DEFAULT_MIN_SAMPLES)?,
        })
    }
}

/// Parse `key` if set, otherwise return `default`.
fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidValue {
                key: key.to_string(),
                message: format!("'{raw}': {e}"),
            }),
        None => Ok(default),
    }
}

/// `true`, `1` and `yes` (any case) are on; everything else is off.
fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use secrecy::ExposeSecret;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const REQUIRED: &[(&str, &str)] = &[
        ("IMAP_USERNAME", "me@example.com"),
        ("IMAP_PASSWORD", "app-pass"),
        ("LLM_API_KEY", "sk-test"),
    ];

    #[test]
    fn defaults() {
        let config = TriageConfig::from_lookup(lookup(REQUIRED)).unwrap();
        assert_eq!(config.mail.host, "imap.mail.yahoo.com");
        assert_eq!(config.mail.port, 993);
        assert_eq!(config.mail.mailbox, "INBOX");
        assert_eq!(config.mail.promotional_folder, "Promotional");
        assert_eq!(config.mail.trash_folder, "Bulk Mail");
        assert_eq!(config.db_path, PathBuf::from("./state.sqlite"));
        assert_eq!(config.scorer_url, "http://127.0.0.1:11333/checkv2");
        assert_eq!(config.thresholds, Thresholds::new(6.0, 7.0));
        assert!(config.interactive);
        assert_eq!(config.history_weight, 0.3);
        assert_eq!(config.history_min_samples, 3);
        assert_eq!(config.llm.backend, LlmBackend::Anthropic);
        assert_eq!(config.llm.model, LlmBackend::Anthropic.default_model());
    }

    #[test]
    fn missing_credentials_is_fatal() {
        let err = TriageConfig::from_lookup(lookup(&[("LLM_API_KEY", "k")])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingRequired { ref key, .. } if key == "IMAP_USERNAME"));

        let err = TriageConfig::from_lookup(lookup(&[
            ("IMAP_USERNAME", "me"),
            ("LLM_API_KEY", "k"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::MissingRequired { ref key, .. } if key == "IMAP_PASSWORD"));
    }

    #[test]
    fn legacy_credential_names() {
        let config = TriageConfig::from_lookup(lookup(&[
            ("YAHOO_EMAIL", "me@yahoo.com"),
            ("YAHOO_APP_PASSWORD", "secret"),
            ("ANTHROPIC_API_KEY", "sk-ant"),
        ]))
        .unwrap();
        assert_eq!(config.mail.username, "me@yahoo.com");
        assert_eq!(config.mail.password.expose_secret(), "secret");
        assert_eq!(config.llm.api_key.expose_secret(), "sk-ant");
    }

    #[test]
    fn missing_llm_key_is_fatal() {
        let err = TriageConfig::from_lookup(lookup(&[
            ("IMAP_USERNAME", "me"),
            ("IMAP_PASSWORD", "pw"),
            ("LLM_BACKEND", "openai"),
            ("ANTHROPIC_API_KEY", "wrong-provider"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::MissingRequired { .. }));
    }

    #[test]
    fn invalid_number_is_reported() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("RSPAMD_SPAM_SCORE", "six"));
        let err = TriageConfig::from_lookup(lookup(&pairs)).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "RSPAMD_SPAM_SCORE"));
    }

    #[test]
    fn overrides() {
        let mut pairs = REQUIRED.to_vec();
        pairs.extend_from_slice(&[
            ("IMAP_HOST", "imap.fastmail.com"),
            ("IMAP_PORT", "1993"),
            ("TRASH_FOLDER", "Junk"),
            ("RSPAMD_SPAM_SCORE", "5.5"),
            ("RSPAMD_TRASH_SCORE", "12"),
            ("HISTORY_MIN_SAMPLES", "5"),
            ("INTERACTIVE", "No"),
            ("LLM_BACKEND", "OpenAI"),
        ]);
        let config = TriageConfig::from_lookup(lookup(&pairs)).unwrap();
        assert_eq!(config.mail.host, "imap.fastmail.com");
        assert_eq!(config.mail.port, 1993);
        assert_eq!(config.mail.trash_folder, "Junk");
        assert_eq!(config.thresholds, Thresholds::new(5.5, 12.0));
        assert_eq!(config.history_min_samples, 5);
        assert!(!config.interactive);
        assert_eq!(config.llm.backend, LlmBackend::OpenAi);
        assert_eq!(config.llm.model, "gpt-4o-mini");
    }

    #[test]
    fn interactive_flag_values() {
        assert!(parse_flag("TRUE"));
        assert!(parse_flag("1"));
        assert!(parse_flag(" yes "));
        assert!(!parse_flag("false"));
        assert!(!parse_flag("0"));
        assert!(!parse_flag("on"));
    }
}
