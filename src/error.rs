//! Error types for inbox triage.

/// Top-level error type for a triage run.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Mail error: {0}")]
    Mail(#[from] MailError),

    #[error("Classifier error: {0}")]
    Llm(#[from] LlmError),

    #[error("Operator prompt error: {0}")]
    Gate(#[from] GateError),

    /// The operator interrupted the run while being prompted.
    #[error("Interrupted by user")]
    Interrupted,
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required configuration: {key}. {hint}")]
    MissingRequired { key: String, hint: String },

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Ledger storage errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Migration failed: {0}")]
    Migration(String),
}

/// Mail session (IMAP) errors. All of them abort the run.
#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("Failed to connect to {host}:{port}: {reason}")]
    Connect {
        host: String,
        port: u16,
        reason: String,
    },

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("IMAP login failed for {username}")]
    LoginFailed { username: String },

    #[error("IMAP command {command} failed: {status}")]
    CommandFailed { command: String, status: String },

    #[error("Unexpected IMAP response to {command}: {reason}")]
    Protocol { command: String, reason: String },

    #[error("IMAP connection closed")]
    Closed,

    #[error("IMAP task panicked: {0}")]
    TaskPanicked(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Spam scorer errors. Never escapes the scorer: degraded to a neutral verdict.
#[derive(Debug, thiserror::Error)]
pub enum ScorerError {
    #[error("Scorer request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Scorer returned status {0}")]
    Status(reqwest::StatusCode),

    #[error("Scorer response was not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// LLM provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },
}

/// Interaction gate errors.
#[derive(Debug, thiserror::Error)]
pub enum GateError {
    #[error("Failed to read operator input: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for triage runs.
pub type Result<T> = std::result::Result<T, Error>;
