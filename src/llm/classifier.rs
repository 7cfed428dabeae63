//! Message classifier — asks the LLM for a one-word triage label.
//!
//! The prompt is deliberately tiny: subject, truncated headers and a short
//! body snippet. The answer is fuzzy-matched, so chatty models still work.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::error::LlmError;
use crate::llm::LlmProvider;
use crate::triage::LlmLabel;

/// System prompt installed on the provider.
pub const SYSTEM_PROMPT: &str = "Classify emails for triage using minimal tokens.";

/// Header characters included in the prompt.
const MAX_HEADER_CHARS: usize = 1500;

/// Raw message bytes decoded for the body snippet.
const MAX_RAW_BYTES: usize = 4000;

/// Snippet width after whitespace collapsing.
const SNIPPET_WIDTH: usize = 2000;

const SNIPPET_PLACEHOLDER: &str = "…";

/// Anything that can label a message. Failures abort the run.
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, headers: &str, raw: &[u8]) -> Result<LlmLabel, LlmError>;
}

/// LLM-backed classifier.
pub struct LlmClassifier {
    llm: Arc<dyn LlmProvider>,
}

impl LlmClassifier {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl Classifier for LlmClassifier {
    async fn classify(&self, headers: &str, raw: &[u8]) -> Result<LlmLabel, LlmError> {
        let prompt = build_prompt(headers, raw);
        let answer = self.llm.complete(&prompt).await?;
        let label = parse_label(&answer);
        debug!(
            model = self.llm.model_name(),
            answer = %answer.trim(),
            label = label.as_str(),
            "Classifier answered"
        );
        Ok(label)
    }
}

/// Fuzzy-match a free-text answer: "spam" wins over "promo", else normal.
pub fn parse_label(answer: &str) -> LlmLabel {
    let out = answer.trim().to_lowercase();
    if out.contains("spam") {
        LlmLabel::Spam
    } else if out.contains("promo") {
        LlmLabel::Promotional
    } else {
        LlmLabel::Normal
    }
}

/// Build the user prompt from the header block and raw message.
pub fn build_prompt(headers: &str, raw: &[u8]) -> String {
    let subject = header_subject(headers);
    let headers_excerpt: String = headers.chars().take(MAX_HEADER_CHARS).collect();
    let raw_excerpt = &raw[..raw.len().min(MAX_RAW_BYTES)];
    let snippet = shorten(
        &String::from_utf8_lossy(raw_excerpt),
        SNIPPET_WIDTH,
        SNIPPET_PLACEHOLDER,
    );

    format!(
        "You are an email triage classifier. \
         Return exactly one of: spam, promotional, or normal. \
         Rules: newsletters/ads/sales = promotional; phishing/scam/junk = spam; \
         valid personal or work = normal.\n\
         Subject: {subject}\n\
         Headers:\n\
         {headers_excerpt}\n\
         Body snippet:\n\
         {snippet}\n\
         Answer with only the single label."
    )
}

/// First `Subject:` header value, or empty.
fn header_subject(headers: &str) -> &str {
    headers
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            name.eq_ignore_ascii_case("subject").then(|| value.trim())
        })
        .unwrap_or("")
}

/// Collapse whitespace and cut at a word boundary so the result fits `width`
/// characters, placeholder included.
pub fn shorten(text: &str, width: usize, placeholder: &str) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    let joined = words.join(" ");
    if joined.chars().count() <= width {
        return joined;
    }

    let budget = width.saturating_sub(placeholder.chars().count());
    let mut out = String::new();
    let mut used = 0;
    for word in words {
        let extra = word.chars().count() + usize::from(!out.is_empty());
        if used + extra > budget {
            break;
        }
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(word);
        used += extra;
    }
    out.push_str(placeholder);
    out
}
