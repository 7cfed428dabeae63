//! Bridge from a rig `CompletionModel` to `LlmProvider`.
//!
//! The system prompt, temperature and token cap are attached to every
//! request, so building the adapter needs no runtime.

use async_trait::async_trait;
use rig::completion::CompletionModel;
use rig::message::AssistantContent;

use crate::error::LlmError;
use crate::llm::LlmProvider;

/// Fixed request settings shared by every call.
#[derive(Debug, Clone)]
pub struct RequestSettings {
    pub preamble: String,
    pub temperature: f64,
    pub max_tokens: u64,
}

/// Wraps a rig completion model.
pub struct RigAdapter<M: CompletionModel> {
    model: M,
    settings: RequestSettings,
    provider: &'static str,
    model_name: String,
}

impl<M: CompletionModel> RigAdapter<M> {
    pub fn new(
        model: M,
        settings: RequestSettings,
        provider: &'static str,
        model_name: &str,
    ) -> Self {
        Self {
            model,
            settings,
            provider,
            model_name: model_name.to_string(),
        }
    }
}

#[async_trait]
impl<M> LlmProvider for RigAdapter<M>
where
    M: CompletionModel + Send + Sync + 'static,
{
    fn model_name(&self) -> &str {
        &self.model_name
    }

    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        let response = self
            .model
            .completion_request(prompt)
            .preamble(self.settings.preamble.clone())
            .temperature(self.settings.temperature)
            .max_tokens(self.settings.max_tokens)
            .send()
            .await
            .map_err(|e| classify_error(self.provider, &e.to_string()))?;

        // A blank answer is still an answer; the caller decides what it means.
        let text: String = response
            .choice
            .iter()
            .filter_map(|content| match content {
                AssistantContent::Text(text) => Some(text.text.as_str()),
                _ => None,
            })
            .collect();
        Ok(text)
    }
}

/// Map a rig error message onto our error taxonomy.
fn classify_error(provider: &str, reason: &str) -> LlmError {
    let lower = reason.to_ascii_lowercase();
    if lower.contains("401")
        || lower.contains("unauthorized")
        || lower.contains("invalid x-api-key")
        || lower.contains("authentication")
    {
        LlmError::AuthFailed {
            provider: provider.to_string(),
        }
    } else {
        LlmError::RequestFailed {
            provider: provider.to_string(),
            reason: reason.to_string(),
        }
    }
}
