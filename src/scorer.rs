//! Spam scorer client for rspamd `/checkv2`.
//!
//! The scorer is advisory: any transport, status or decoding failure
//! degrades to the neutral verdict (`score 0.0`, `noaction`) and the run
//! keeps going.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::ScorerError;
use crate::triage::SpamVerdict;

/// Request timeout for a single scoring call.
const SCORER_TIMEOUT: Duration = Duration::from_secs(20);

/// Anything that can score a raw message. Never fails.
#[async_trait]
pub trait SpamScorer: Send + Sync {
    async fn score(&self, raw: &[u8]) -> SpamVerdict;
}

/// HTTP client for rspamd's `/checkv2` endpoint.
pub struct RspamdScorer {
    client: reqwest::Client,
    url: String,
}

impl RspamdScorer {
    pub fn new(url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(SCORER_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            url: url.into(),
        }
    }

    async fn try_score(&self, raw: &[u8]) -> Result<SpamVerdict, ScorerError> {
        let response = self
            .client
            .post(&self.url)
            .header(reqwest::header::CONTENT_TYPE, "message/rfc822")
            .body(raw.to_vec())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScorerError::Status(status));
        }

        let body = response.bytes().await?;
        parse_verdict(&body)
    }
}

#[async_trait]
impl SpamScorer for RspamdScorer {
    async fn score(&self, raw: &[u8]) -> SpamVerdict {
        match self.try_score(raw).await {
            Ok(verdict) => {
                debug!(score = verdict.score, action = %verdict.action, "Scorer verdict");
                verdict
            }
            Err(e) => {
                warn!(url = %self.url, error = %e, "Spam scorer unavailable, using neutral score");
                SpamVerdict::neutral()
            }
        }
    }
}

/// Decode a scorer response body. Missing fields take neutral defaults.
pub fn parse_verdict(body: &[u8]) -> Result<SpamVerdict, ScorerError> {
    Ok(serde_json::from_slice(body)?)
}
