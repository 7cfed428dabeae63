//! One triage pass over the new messages in a mailbox.
//!
//! Each message goes through, strictly in order:
//! 1. fetch (full message and headers, without marking it read)
//! 2. sender domain → ledger history → `DomainBias`
//! 3. spam scorer verdict (advisory) and classifier label (required)
//! 4. `DecisionEngine::decide()` → recommendation
//! 5. `InteractionGate::resolve()` → final action
//! 6. move (or keep), then `record_action`, then `set_watermark`
//!
//! The watermark only moves after the record is committed, so any failure
//! leaves every earlier message fully processed and the current one
//! untouched in the ledger.

pub mod summary;

pub use summary::RunSummary;

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use crate::error::Result;
use crate::gate::{InteractionGate, Mode, Review};
use crate::llm::classifier::Classifier;
use crate::mail::{BlockingSession, MessageId, extract_email_info};
use crate::scorer::SpamScorer;
use crate::store::{ActionRecord, Ledger};
use crate::triage::bias::DEFAULT_MIN_SAMPLES;
use crate::triage::{
    DecisionEngine, DecisionInput, Disposition, DomainBias, Thresholds, extract_domain,
};

/// Destination folders for the two moving dispositions.
#[derive(Debug, Clone)]
pub struct Folders {
    pub promotional: String,
    pub trash: String,
}

impl Folders {
    fn for_disposition(&self, disposition: Disposition) -> Option<&str> {
        match disposition {
            Disposition::Keep => None,
            Disposition::Promotional => Some(self.promotional.as_str()),
            Disposition::Trash => Some(self.trash.as_str()),
        }
    }
}

/// Sequential triage driver.
pub struct TriageRun {
    ledger: Arc<dyn Ledger>,
    scorer: Arc<dyn SpamScorer>,
    classifier: Arc<dyn Classifier>,
    engine: DecisionEngine,
    gate: InteractionGate,
    folders: Folders,
    min_samples: u64,
}

impl TriageRun {
    pub fn new(
        ledger: Arc<dyn Ledger>,
        scorer: Arc<dyn SpamScorer>,
        classifier: Arc<dyn Classifier>,
        gate: InteractionGate,
        thresholds: Thresholds,
        folders: Folders,
    ) -> Self {
        Self {
            ledger,
            scorer,
            classifier,
            engine: DecisionEngine::standard(thresholds),
            gate,
            folders,
            min_samples: DEFAULT_MIN_SAMPLES,
        }
    }

    /// Minimum history size before a domain's past influences decisions.
    pub fn with_min_samples(mut self, min_samples: u64) -> Self {
        self.min_samples = min_samples;
        self
    }

    pub fn mode(&self) -> Mode {
        self.gate.mode()
    }

    /// Process every message above the current watermark.
    ///
    /// Mail calls run on the blocking pool, one at a time.
    pub async fn run(&mut self, mail: &mut BlockingSession) -> Result<RunSummary> {
        let epoch = mail.epoch().await?;
        let watermark = self.ledger.get_watermark(&epoch).await?;
        let ids = mail.list_new_ids(watermark).await?;
        info!(epoch = %epoch, watermark, pending = ids.len(), "Starting triage run");

        let mut summary = RunSummary::default();
        if ids.is_empty() {
            println!("No new emails.");
            return Ok(summary);
        }

        println!("Processing {} email(s)...", ids.len());
        println!("{}", self.gate.mode().banner());

        for id in ids {
            let record = self.process_message(mail, &epoch, id).await?;
            summary.record(&record);
        }

        println!("\nDone! Processed {} email(s).", summary.processed);
        info!(
            processed = summary.processed,
            kept = summary.kept,
            promotional = summary.promotional,
            trashed = summary.trashed,
            overridden = summary.overridden,
            "Triage run complete"
        );
        Ok(summary)
    }

    async fn process_message(
        &mut self,
        mail: &mut BlockingSession,
        epoch: &str,
        id: MessageId,
    ) -> Result<ActionRecord> {
        let raw = mail.fetch_full(id).await?;
        let headers = mail.fetch_headers(id).await?;
        let info = extract_email_info(&raw);

        let domain = extract_domain(&info.from);
        let history = self.ledger.get_domain_history(&domain).await?;
        let bias = DomainBias::from_history(&history, self.min_samples);

        let verdict = self.scorer.score(&raw).await;
        let label = self.classifier.classify(&headers, &raw).await?;

        let decision = self
            .engine
            .decide(&DecisionInput::new(&verdict, label, bias.as_ref()));
        debug!(
            id,
            domain = %domain,
            rule = decision.rule,
            recommended = decision.disposition.as_str(),
            "Recommendation"
        );

        let review = Review {
            from: &info.from,
            subject: &info.subject,
            spam_score: verdict.score,
            llm_label: label,
            bias: bias.as_ref(),
            recommended: decision.disposition,
        };
        let final_action = self.gate.resolve(&review).await?;

        match self.folders.for_disposition(final_action) {
            Some(folder) => {
                mail.move_to(id, folder).await?;
                println!("✓ Moved to {folder}");
            }
            None => println!("✓ Kept in inbox"),
        }

        let record = ActionRecord {
            epoch: epoch.to_string(),
            id,
            timestamp: Utc::now(),
            from_addr: info.from,
            subject: info.subject,
            spam_score: verdict.score,
            llm_label: label,
            recommended: decision.disposition,
            final_action,
            mode: self.gate.mode(),
        };
        self.ledger.record_action(&record).await?;
        self.ledger.set_watermark(epoch, id).await?;

        info!(
            id,
            recommended = record.recommended.as_str(),
            final_action = record.final_action.as_str(),
            "Message processed"
        );
        Ok(record)
    }
}
