//! The `Ledger` trait: the single async interface for triage persistence.
//!
//! The ledger holds two things: a watermark per mailbox epoch and one
//! action record per (epoch, message id). Records double as the audit log
//! and as the only source of per-domain history.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::DatabaseError;
use crate::gate::Mode;
use crate::mail::MessageId;
use crate::triage::{Disposition, DomainHistory, LlmLabel};

/// One processed message.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionRecord {
    pub epoch: String,
    pub id: MessageId,
    pub timestamp: DateTime<Utc>,
    pub from_addr: String,
    pub subject: String,
    pub spam_score: f64,
    pub llm_label: LlmLabel,
    pub recommended: Disposition,
    /// Differs from `recommended` when the operator overrode it.
    pub final_action: Disposition,
    pub mode: Mode,
}

impl ActionRecord {
    pub fn was_overridden(&self) -> bool {
        self.recommended != self.final_action
    }
}

/// Backend-agnostic ledger. Every write is committed before it returns.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Last fully processed id for `epoch`, or 0 if the epoch is unseen.
    async fn get_watermark(&self, epoch: &str) -> Result<MessageId, DatabaseError>;

    /// Upsert the watermark.
    ///
    /// Callers only ever move it forward within an epoch; this is not
    /// checked here.
    async fn set_watermark(&self, epoch: &str, id: MessageId) -> Result<(), DatabaseError>;

    /// Insert or replace the record for `(record.epoch, record.id)`.
    async fn record_action(&self, record: &ActionRecord) -> Result<(), DatabaseError>;

    /// Final-action counts for senders matching `*@domain*`.
    /// Empty for an empty or unseen domain.
    async fn get_domain_history(&self, domain: &str) -> Result<DomainHistory, DatabaseError>;

    /// Stored record for `(epoch, id)`, if any.
    async fn get_action(
        &self,
        epoch: &str,
        id: MessageId,
    ) -> Result<Option<ActionRecord>, DatabaseError>;
}
