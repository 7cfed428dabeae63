//! Decision core: pure functions with no I/O.
//!
//! A message flows through:
//! 1. `domain::extract_domain()` — sender domain for the history lookup
//! 2. `DomainBias::from_history()` — normalized rates, gated by sample count
//! 3. `DecisionEngine::decide()` — ordered rules → one `Disposition`

pub mod bias;
pub mod domain;
pub mod rules;
pub mod types;

pub use bias::{DomainBias, DomainHistory};
pub use domain::extract_domain;
pub use rules::{Decision, DecisionEngine, DecisionInput, DecisionRule, Thresholds, decide};
pub use types::{Disposition, LlmLabel, SpamVerdict};
