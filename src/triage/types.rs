//! Shared types for the decision core.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ── Disposition ─────────────────────────────────────────────────────

/// Final outcome for a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Disposition {
    /// Leave the message in the mailbox.
    Keep,
    /// Move to the promotional folder.
    Promotional,
    /// Move to the trash folder.
    Trash,
}

impl Disposition {
    /// Name persisted in the ledger. Keep is stored as `skip`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Keep => "skip",
            Self::Promotional => "promotional",
            Self::Trash => "trash",
        }
    }

    /// Operator-facing label.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Keep => "KEEP",
            Self::Promotional => "PROMOTIONAL",
            Self::Trash => "SPAM",
        }
    }
}

impl fmt::Display for Disposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Disposition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "skip" | "keep" => Ok(Self::Keep),
            "promotional" => Ok(Self::Promotional),
            "trash" => Ok(Self::Trash),
            other => Err(format!("unknown disposition: {other}")),
        }
    }
}

// ── LLM label ───────────────────────────────────────────────────────

/// Classifier verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmLabel {
    Spam,
    Promotional,
    Normal,
}

impl LlmLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Spam => "spam",
            Self::Promotional => "promotional",
            Self::Normal => "normal",
        }
    }
}

impl fmt::Display for LlmLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LlmLabel {
    type Err = String;

    /// Exact label names. `marketing` and `ads` are promotional synonyms.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "spam" => Ok(Self::Spam),
            "promotional" | "marketing" | "ads" => Ok(Self::Promotional),
            "normal" => Ok(Self::Normal),
            other => Err(format!("unknown label: {other}")),
        }
    }
}

// ── Spam verdict ────────────────────────────────────────────────────

/// Spam scorer response: a numeric score and an action hint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpamVerdict {
    #[serde(default)]
    pub score: f64,
    #[serde(default = "default_action")]
    pub action: String,
}

fn default_action() -> String {
    "noaction".to_string()
}

/// Scorer actions that route a message to the promotional folder.
const SOFT_ACTIONS: &[&str] = &["add header", "rewrite subject", "soft reject", "quarantine"];

impl SpamVerdict {
    pub fn new(score: f64, action: impl Into<String>) -> Self {
        Self {
            score,
            action: action.into(),
        }
    }

    /// Verdict used when the scorer is unreachable or returns garbage.
    pub fn neutral() -> Self {
        Self::new(0.0, default_action())
    }

    fn normalized_action(&self) -> String {
        self.action.trim().to_ascii_lowercase()
    }

    /// Hard reject hint.
    pub fn is_reject(&self) -> bool {
        self.normalized_action() == "reject"
    }

    /// Soft hint: add header, rewrite subject, soft reject or quarantine.
    pub fn is_soft_action(&self) -> bool {
        let action = self.normalized_action();
        SOFT_ACTIONS.contains(&action.as_str())
    }
}

impl Default for SpamVerdict {
    fn default() -> Self {
        Self::neutral()
    }
}
