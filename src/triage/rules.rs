//! Decision engine — an ordered list of (predicate, outcome) rules.
//!
//! Rules are evaluated top to bottom and the first match wins:
//! 1. hard spam score or `reject` hint → Trash
//! 2. classifier says spam → Trash
//! 3. history mostly trash, score above half threshold → Trash
//! 4. history mostly promotional, score above 70% threshold → Promotional
//! 5. score at threshold or soft scorer hint → Promotional
//! 6. classifier says promotional → Promotional
//! 7. history mostly kept, score below 90% threshold → Keep
//! 8. history leans promotional, score above 80% threshold → Promotional
//!
//! Anything else is kept. History rules only fire when a bias is present,
//! so a thin history behaves exactly like no history.

use tracing::debug;

use crate::triage::bias::DomainBias;
use crate::triage::types::{Disposition, LlmLabel, SpamVerdict};

/// Default hard-spam score.
pub const DEFAULT_SPAM_THRESHOLD: f64 = 10.0;

/// Score thresholds. History rules scale `score`, never `spam`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    /// Base threshold for the promotional folder.
    pub score: f64,
    /// Hard-spam threshold for the trash folder.
    pub spam: f64,
}

impl Thresholds {
    pub fn new(score: f64, spam: f64) -> Self {
        Self { score, spam }
    }
}

/// Signals for a single message.
#[derive(Debug, Clone, Copy)]
pub struct DecisionInput<'a> {
    pub verdict: &'a SpamVerdict,
    pub label: LlmLabel,
    pub bias: Option<&'a DomainBias>,
}

impl<'a> DecisionInput<'a> {
    pub fn new(verdict: &'a SpamVerdict, label: LlmLabel, bias: Option<&'a DomainBias>) -> Self {
        Self {
            verdict,
            label,
            bias,
        }
    }

    fn score(&self) -> f64 {
        self.verdict.score
    }
}

/// A single rule: a named predicate and the disposition it yields.
#[derive(Clone)]
pub struct DecisionRule {
    pub name: &'static str,
    pub outcome: Disposition,
    predicate: fn(&DecisionInput<'_>, &Thresholds) -> bool,
}

impl DecisionRule {
    pub fn new(
        name: &'static str,
        outcome: Disposition,
        predicate: fn(&DecisionInput<'_>, &Thresholds) -> bool,
    ) -> Self {
        Self {
            name,
            outcome,
            predicate,
        }
    }

    pub fn matches(&self, input: &DecisionInput<'_>, thresholds: &Thresholds) -> bool {
        (self.predicate)(input, thresholds)
    }
}

impl std::fmt::Debug for DecisionRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecisionRule")
            .field("name", &self.name)
            .field("outcome", &self.outcome)
            .finish()
    }
}

/// Outcome of `DecisionEngine::decide`, with the rule that produced it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decision {
    pub disposition: Disposition,
    pub rule: &'static str,
}

/// Name reported when no rule matched.
pub const FALLBACK_RULE: &str = "default_keep";

/// Priority-ordered rule list.
#[derive(Debug, Clone)]
pub struct DecisionEngine {
    rules: Vec<DecisionRule>,
    thresholds: Thresholds,
}

impl DecisionEngine {
    /// The standard eight-rule policy.
    pub fn standard(thresholds: Thresholds) -> Self {
        let rules = vec![
            DecisionRule::new("hard_spam", Disposition::Trash, |i, t| {
                i.score() >= t.spam || i.verdict.is_reject()
            }),
            DecisionRule::new("llm_spam", Disposition::Trash, |i, _| {
                i.label == LlmLabel::Spam
            }),
            DecisionRule::new("history_trash", Disposition::Trash, |i, t| {
                i.bias
                    .is_some_and(|b| b.trash > 0.6 && i.score() >= t.score * 0.5)
            }),
            DecisionRule::new("history_promotional", Disposition::Promotional, |i, t| {
                i.bias
                    .is_some_and(|b| b.promotional > 0.6 && i.score() >= t.score * 0.7)
            }),
            DecisionRule::new("scorer_promotional", Disposition::Promotional, |i, t| {
                i.score() >= t.score || i.verdict.is_soft_action()
            }),
            DecisionRule::new("llm_promotional", Disposition::Promotional, |i, _| {
                i.label == LlmLabel::Promotional
            }),
            DecisionRule::new("history_keep", Disposition::Keep, |i, t| {
                i.bias
                    .is_some_and(|b| b.skip > 0.7 && i.score() < t.score * 0.9)
            }),
            DecisionRule::new("history_lean_promotional", Disposition::Promotional, |i, t| {
                i.bias
                    .is_some_and(|b| b.promotional > 0.5 && i.score() >= t.score * 0.8)
            }),
        ];
        Self { rules, thresholds }
    }

    /// An engine with no rules; everything falls through to Keep.
    #[cfg(test)]
    pub fn empty(thresholds: Thresholds) -> Self {
        Self {
            rules: Vec::new(),
            thresholds,
        }
    }

    /// Append a rule at the lowest priority.
    #[cfg(test)]
    pub fn push(&mut self, rule: DecisionRule) {
        self.rules.push(rule);
    }

    #[cfg(test)]
    pub fn rules(&self) -> &[DecisionRule] {
        &self.rules
    }

    /// Evaluate rules in order; the first match wins.
    pub fn decide(&self, input: &DecisionInput<'_>) -> Decision {
        for rule in &self.rules {
            if rule.matches(input, &self.thresholds) {
                debug!(
                    rule = rule.name,
                    outcome = rule.outcome.as_str(),
                    score = input.score(),
                    label = input.label.as_str(),
                    "Decision rule matched"
                );
                return Decision {
                    disposition: rule.outcome,
                    rule: rule.name,
                };
            }
        }
        Decision {
            disposition: Disposition::Keep,
            rule: FALLBACK_RULE,
        }
    }
}

/// Convenience wrapper over the standard policy.
pub fn decide(
    verdict: &SpamVerdict,
    label: LlmLabel,
    score_threshold: f64,
    spam_threshold: f64,
    bias: Option<&DomainBias>,
) -> Disposition {
    DecisionEngine::standard(Thresholds::new(score_threshold, spam_threshold))
        .decide(&DecisionInput::new(verdict, label, bias))
        .disposition
}

#[cfg(test)]
mod tests {
    use super::*;

    const THRESHOLD: f64 = 6.0;

    fn bias(trash: f64, promotional: f64, skip: f64, total: u64) -> DomainBias {
        DomainBias {
            trash,
            promotional,
            skip,
            total,
        }
    }

    fn run(score: f64, action: &str, label: LlmLabel, b: Option<DomainBias>) -> Decision {
        let verdict = SpamVerdict::new(score, action);
        DecisionEngine::standard(Thresholds::new(THRESHOLD, DEFAULT_SPAM_THRESHOLD))
            .decide(&DecisionInput::new(&verdict, label, b.as_ref()))
    }

    #[test]
    fn standard_rule_order() {
        let engine = DecisionEngine::standard(Thresholds::new(THRESHOLD, DEFAULT_SPAM_THRESHOLD));
        let names: Vec<_> = engine.rules().iter().map(|r| r.name).collect();
        assert_eq!(
            names,
            vec![
                "hard_spam",
                "llm_spam",
                "history_trash",
                "history_promotional",
                "scorer_promotional",
                "llm_promotional",
                "history_keep",
                "history_lean_promotional",
            ]
        );
    }

    #[test]
    fn hard_score_always_trashes() {
        let keepers = bias(0.0, 0.0, 1.0, 50);
        for label in [LlmLabel::Normal, LlmLabel::Promotional, LlmLabel::Spam] {
            for b in [None, Some(keepers)] {
                let d = run(10.0, "noaction", label, b);
                assert_eq!(d.disposition, Disposition::Trash);
                assert_eq!(d.rule, "hard_spam");
            }
        }
    }

    #[test]
    fn reject_hint_trashes_low_score() {
        let d = run(0.5, "reject", LlmLabel::Normal, Some(bias(0.0, 0.0, 1.0, 9)));
        assert_eq!(d.disposition, Disposition::Trash);
        assert_eq!(d.rule, "hard_spam");
    }

    #[test]
    fn llm_spam_trashes_despite_keep_history() {
        let d = run(0.0, "noaction", LlmLabel::Spam, Some(bias(0.0, 0.0, 1.0, 20)));
        assert_eq!(d.disposition, Disposition::Trash);
        assert_eq!(d.rule, "llm_spam");
    }

    #[test]
    fn scenario_reject_without_history() {
        assert_eq!(
            decide(&SpamVerdict::new(12.0, "reject"), LlmLabel::Normal, 6.0, 10.0, None),
            Disposition::Trash
        );
    }

    #[test]
    fn scenario_llm_promotional() {
        assert_eq!(
            decide(&SpamVerdict::new(3.0, "noaction"), LlmLabel::Promotional, 6.0, 10.0, None),
            Disposition::Promotional
        );
    }

    #[test]
    fn scenario_trash_history_below_half_threshold_keeps() {
        let b = bias(0.7, 0.1, 0.2, 10);
        let d = run(1.0, "noaction", LlmLabel::Normal, Some(b));
        assert_eq!(d.disposition, Disposition::Keep);
        assert_eq!(d.rule, FALLBACK_RULE);
    }

    #[test]
    fn scenario_keep_history_below_ninety_percent() {
        let b = bias(0.0, 0.0, 0.8, 5);
        let d = run(4.0, "noaction", LlmLabel::Normal, Some(b));
        assert_eq!(d.disposition, Disposition::Keep);
        assert_eq!(d.rule, "history_keep");
    }

    #[test]
    fn trash_history_above_half_threshold_trashes() {
        let d = run(3.0, "noaction", LlmLabel::Normal, Some(bias(0.7, 0.0, 0.3, 10)));
        assert_eq!(d.disposition, Disposition::Trash);
        assert_eq!(d.rule, "history_trash");
    }

    #[test]
    fn history_trash_outranks_scorer_promotional() {
        // Score satisfies both rule 3 and rule 5; rule 3 must win.
        let d = run(6.5, "add header", LlmLabel::Promotional, Some(bias(0.9, 0.0, 0.1, 10)));
        assert_eq!(d.disposition, Disposition::Trash);
        assert_eq!(d.rule, "history_trash");
    }

    #[test]
    fn history_promotional_fires_before_scorer_rule() {
        // 4.5 >= 6.0 * 0.7 satisfies rule 4; the soft hint would also satisfy rule 5.
        let d = run(4.5, "quarantine", LlmLabel::Normal, Some(bias(0.0, 0.8, 0.2, 10)));
        assert_eq!(d.disposition, Disposition::Promotional);
        assert_eq!(d.rule, "history_promotional");
    }

    #[test]
    fn scorer_rule_when_history_promotional_score_too_low() {
        // 3.0 < 4.2 skips rule 4; the soft hint then matches rule 5.
        let d = run(3.0, "rewrite subject", LlmLabel::Normal, Some(bias(0.0, 0.8, 0.2, 10)));
        assert_eq!(d.rule, "scorer_promotional");
    }

    #[test]
    fn scorer_threshold_is_inclusive() {
        let d = run(6.0, "noaction", LlmLabel::Normal, None);
        assert_eq!(d.disposition, Disposition::Promotional);
        assert_eq!(d.rule, "scorer_promotional");
    }

    #[test]
    fn keep_history_does_not_override_promotional_label() {
        let d = run(1.0, "noaction", LlmLabel::Promotional, Some(bias(0.0, 0.0, 0.9, 10)));
        assert_eq!(d.disposition, Disposition::Promotional);
        assert_eq!(d.rule, "llm_promotional");
    }

    #[test]
    fn lean_promotional_history_nudges_borderline_score() {
        // 5.0 >= 4.8 but < 6.0; promotional rate 0.55 passes only rule 8.
        let d = run(5.0, "noaction", LlmLabel::Normal, Some(bias(0.0, 0.55, 0.45, 20)));
        assert_eq!(d.disposition, Disposition::Promotional);
        assert_eq!(d.rule, "history_lean_promotional");
    }

    #[test]
    fn keep_history_outranks_lean_promotional() {
        // skip 0.75 wins rule 7 before rule 8 can look at promotional.
        let b = bias(0.0, 0.51, 0.75, 20);
        let d = run(5.0, "noaction", LlmLabel::Normal, Some(b));
        assert_eq!(d.rule, "history_keep");
    }

    #[test]
    fn absent_history_skips_history_rules() {
        let d = run(5.0, "noaction", LlmLabel::Normal, None);
        assert_eq!(d.disposition, Disposition::Keep);
        assert_eq!(d.rule, FALLBACK_RULE);
    }

    #[test]
    fn thin_history_behaves_like_absent() {
        use crate::triage::bias::DomainHistory;

        let history: DomainHistory = [("promotional", 2u64)].into_iter().collect();
        let thin = DomainBias::from_history(&history, 3);
        assert!(thin.is_none());
        let with = run(5.0, "noaction", LlmLabel::Normal, thin);
        let without = run(5.0, "noaction", LlmLabel::Normal, None);
        assert_eq!(with, without);
    }

    #[test]
    fn thresholds_scale_with_base() {
        // Same relative score against a doubled base threshold gives the same result.
        let b = bias(0.7, 0.0, 0.3, 10);
        let verdict = SpamVerdict::new(6.0, "noaction");
        let d = DecisionEngine::standard(Thresholds::new(12.0, 20.0))
            .decide(&DecisionInput::new(&verdict, LlmLabel::Normal, Some(&b)));
        assert_eq!(d.rule, "history_trash");
    }

    #[test]
    fn empty_engine_keeps_everything() {
        let engine = DecisionEngine::empty(Thresholds::new(THRESHOLD, DEFAULT_SPAM_THRESHOLD));
        let verdict = SpamVerdict::new(50.0, "reject");
        let d = engine.decide(&DecisionInput::new(&verdict, LlmLabel::Spam, None));
        assert_eq!(d.disposition, Disposition::Keep);
    }

    #[test]
    fn pushed_rules_respect_insertion_order() {
        let mut engine = DecisionEngine::empty(Thresholds::new(THRESHOLD, DEFAULT_SPAM_THRESHOLD));
        engine.push(DecisionRule::new("first", Disposition::Promotional, |_, _| true));
        engine.push(DecisionRule::new("second", Disposition::Trash, |_, _| true));
        let verdict = SpamVerdict::neutral();
        let d = engine.decide(&DecisionInput::new(&verdict, LlmLabel::Normal, None));
        assert_eq!(d.rule, "first");
        assert_eq!(d.disposition, Disposition::Promotional);
    }
}
