//! Operator confirmation of each recommendation.
//!
//! The mode is fixed for the whole run. In auto mode the recommendation is
//! final. In interactive mode the operator sees the analysis and picks an
//! action; pressing Enter takes the recommendation. Invalid answers
//! re-prompt. Losing the operator (EOF or Ctrl+C) aborts the run before
//! anything happens to the message under review.

pub mod input;

pub use input::{LineInput, OperatorInput, ScriptedInput, StdinInput, listen_for_ctrl_c};

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::triage::{Disposition, DomainBias, LlmLabel};

const RULE: &str = "--------------------------------------------------------------------------------";
const BANNER: &str = "================================================================================";

/// Subject characters shown per message in auto mode.
const AUTO_SUBJECT_CHARS: usize = 60;

/// How final actions were chosen. Persisted with every record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Interactive,
    Auto,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Interactive => "interactive",
            Self::Auto => "auto",
        }
    }

    /// Banner printed once at the start of a run.
    pub fn banner(&self) -> &'static str {
        match self {
            Self::Interactive => "Interactive mode enabled. You will be prompted for each email.",
            Self::Auto => "Auto mode enabled. Applying recommended actions automatically.",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "interactive" => Ok(Self::Interactive),
            "auto" => Ok(Self::Auto),
            other => Err(format!("unknown mode: {other}")),
        }
    }
}

/// Everything the operator is shown for one message.
#[derive(Debug, Clone)]
pub struct Review<'a> {
    pub from: &'a str,
    pub subject: &'a str,
    pub spam_score: f64,
    pub llm_label: LlmLabel,
    /// Present only when the sender's history passed the sample minimum.
    pub bias: Option<&'a DomainBias>,
    pub recommended: Disposition,
}

impl Review<'_> {
    /// Multi-line analysis block printed before the prompt.
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("\n{BANNER}\n"));
        out.push_str(&format!("From: {}\n", self.from));
        out.push_str(&format!("Subject: {}\n", self.subject));
        out.push_str(&format!("{RULE}\n"));
        out.push_str("Analysis:\n");
        out.push_str(&format!("  • Rspamd Score: {:.2}\n", self.spam_score));
        out.push_str(&format!("  • LLM Classification: {}\n", self.llm_label));
        if let Some(bias) = self.bias {
            out.push_str(&format!("  • Historical: {}\n", bias.summary()));
        }
        out.push_str(&format!(
            "  • Recommended: {}\n",
            self.recommended.display_name()
        ));
        out.push_str(RULE);
        out
    }

    /// Single-line notice printed in auto mode.
    pub fn auto_line(&self) -> String {
        let subject: String = self.subject.chars().take(AUTO_SUBJECT_CHARS).collect();
        format!("\n{subject}... → {}", self.recommended.display_name())
    }
}

/// Prompt text with the recommendation as the bracketed default.
pub fn prompt_text(recommended: Disposition) -> &'static str {
    match recommended {
        Disposition::Promotional => "Action? [P]romotional (default), (s)pam, (k)eep: ",
        Disposition::Trash => "Action? [S]pam (default), (p)romotional, (k)eep: ",
        Disposition::Keep => "Action? [K]eep (default), (p)romotional, (s)pam: ",
    }
}

/// Map an operator answer to a disposition. Empty input takes `default`.
/// Returns `None` for anything unrecognized.
pub fn parse_choice(input: &str, default: Disposition) -> Option<Disposition> {
    match input.trim().to_ascii_lowercase().as_str() {
        "" => Some(default),
        "p" | "promotional" => Some(Disposition::Promotional),
        "s" | "spam" => Some(Disposition::Trash),
        "k" | "keep" | "skip" => Some(Disposition::Keep),
        _ => None,
    }
}

/// Per-run gate. Built once, consulted once per message.
pub struct InteractionGate {
    mode: Mode,
    input: Option<Box<dyn OperatorInput>>,
}

impl InteractionGate {
    /// Auto mode: every recommendation is final.
    pub fn unattended() -> Self {
        Self {
            mode: Mode::Auto,
            input: None,
        }
    }

    /// Interactive mode reading answers from `input`.
    pub fn confirm(input: impl OperatorInput + 'static) -> Self {
        Self {
            mode: Mode::Interactive,
            input: Some(Box::new(input)),
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Final disposition for the reviewed message.
    ///
    /// Returns `Error::Interrupted` if the operator leaves mid-prompt.
    pub async fn resolve(&mut self, review: &Review<'_>) -> Result<Disposition> {
        let Some(input) = self.input.as_mut() else {
            println!("{}", review.auto_line());
            return Ok(review.recommended);
        };

        println!("{}", review.render());
        let prompt = prompt_text(review.recommended);
        loop {
            let Some(answer) = input.read_line(prompt).await? else {
                return Err(Error::Interrupted);
            };
            match parse_choice(&answer, review.recommended) {
                Some(choice) => {
                    debug!(
                        recommended = review.recommended.as_str(),
                        chosen = choice.as_str(),
                        "Operator decided"
                    );
                    return Ok(choice);
                }
                None => println!(
                    "Invalid choice. Please enter p, s, or k (or just press Enter for default)"
                ),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::triage::DomainHistory;

    fn review(recommended: Disposition) -> Review<'static> {
        Review {
            from: "Shop <deals@shop.com>",
            subject: "Big sale",
            spam_score: 4.256,
            llm_label: LlmLabel::Promotional,
            bias: None,
            recommended,
        }
    }

    #[test]
    fn mode_round_trips_persisted_names() {
        assert_eq!("interactive".parse::<Mode>().unwrap(), Mode::Interactive);
        assert_eq!("AUTO".parse::<Mode>().unwrap(), Mode::Auto);
        assert!("manual".parse::<Mode>().is_err());
        assert_eq!(Mode::Auto.to_string(), "auto");
    }

    #[test]
    fn choices_and_shortcuts() {
        let d = Disposition::Keep;
        assert_eq!(parse_choice("p", d), Some(Disposition::Promotional));
        assert_eq!(parse_choice("Promotional", d), Some(Disposition::Promotional));
        assert_eq!(parse_choice("S", d), Some(Disposition::Trash));
        assert_eq!(parse_choice("spam", d), Some(Disposition::Trash));
        assert_eq!(parse_choice("k", Disposition::Trash), Some(Disposition::Keep));
        assert_eq!(parse_choice("skip", Disposition::Trash), Some(Disposition::Keep));
        assert_eq!(parse_choice("trash", d), None);
        assert_eq!(parse_choice("x", d), None);
    }

    #[test]
    fn empty_answer_takes_recommendation() {
        for d in [Disposition::Keep, Disposition::Promotional, Disposition::Trash] {
            assert_eq!(parse_choice("", d), Some(d));
            assert_eq!(parse_choice("   ", d), Some(d));
        }
    }

    #[test]
    fn prompt_names_the_default() {
        assert!(prompt_text(Disposition::Promotional).contains("[P]romotional (default)"));
        assert!(prompt_text(Disposition::Trash).contains("[S]pam (default)"));
        assert!(prompt_text(Disposition::Keep).contains("[K]eep (default)"));
    }

    #[test]
    fn render_includes_history_only_when_present() {
        let plain = review(Disposition::Promotional).render();
        assert!(plain.contains("Rspamd Score: 4.26"));
        assert!(plain.contains("LLM Classification: promotional"));
        assert!(plain.contains("Recommended: PROMOTIONAL"));
        assert!(!plain.contains("Historical"));

        let history: DomainHistory = [("trash", 3u64), ("skip", 1)].into_iter().collect();
        let bias = DomainBias::from_history(&history, 3).unwrap();
        let mut with_history = review(Disposition::Trash);
        with_history.bias = Some(&bias);
        let text = with_history.render();
        assert!(text.contains("Historical: 4 past email(s) (75% spam, 0% promotional, 25% keep)"));
        assert!(text.contains("Recommended: SPAM"));
    }

    #[test]
    fn auto_line_truncates_subject() {
        let long = "x".repeat(80);
        let mut r = review(Disposition::Keep);
        r.subject = &long;
        let line = r.auto_line();
        assert!(line.ends_with(&format!("{}... → KEEP", "x".repeat(60))));
    }

    #[tokio::test]
    async fn unattended_passes_through() {
        let mut gate = InteractionGate::unattended();
        assert_eq!(gate.mode(), Mode::Auto);
        let chosen = gate.resolve(&review(Disposition::Trash)).await.unwrap();
        assert_eq!(chosen, Disposition::Trash);
    }

    #[tokio::test]
    async fn confirm_reprompts_on_invalid_input() {
        let mut gate = InteractionGate::confirm(ScriptedInput::new(["what", "maybe", "k"]));
        assert_eq!(gate.mode(), Mode::Interactive);
        let chosen = gate.resolve(&review(Disposition::Promotional)).await.unwrap();
        assert_eq!(chosen, Disposition::Keep);
    }

    #[tokio::test]
    async fn confirm_default_is_recommendation() {
        let mut gate = InteractionGate::confirm(ScriptedInput::new([""]));
        let chosen = gate.resolve(&review(Disposition::Trash)).await.unwrap();
        assert_eq!(chosen, Disposition::Trash);
    }

    #[tokio::test]
    async fn operator_leaving_interrupts() {
        let mut gate = InteractionGate::confirm(ScriptedInput::new(["nope"]));
        let err = gate.resolve(&review(Disposition::Keep)).await.unwrap_err();
        assert!(matches!(err, Error::Interrupted));
    }
}
