use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use sagevault_core::config::RetrievalConfig;
use sagevault_core::types::{clamp_unit, Candidate, SecurityVerdict};

use crate::dangerous::label_dangerous_commands;
use crate::injection::{injection_score, risk};
use crate::redact::redact_counted;
use crate::sanitize::{sanitize, DEFAULT_MAX_RENDER_CHARS};

/// Thresholds and limits the gate enforces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuardConfig {
    pub block_threshold: u32,
    pub warn_threshold: u32,
    pub diversity_cap_per_source: usize,
    pub risk_normalizer: f32,
    pub max_render_chars: usize,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            block_threshold: 2,
            warn_threshold: 1,
            diversity_cap_per_source: 3,
            risk_normalizer: 3.0,
            max_render_chars: DEFAULT_MAX_RENDER_CHARS,
        }
    }
}

impl From<&RetrievalConfig> for GuardConfig {
    fn from(cfg: &RetrievalConfig) -> Self {
        Self {
            block_threshold: cfg.injection_block_threshold.max(1),
            warn_threshold: cfg.injection_warn_threshold,
            diversity_cap_per_source: cfg.diversity_cap_per_source.max(1),
            risk_normalizer: cfg.risk_normalizer,
            max_render_chars: cfg.max_render_chars.max(1),
        }
    }
}

/// The two shapes the gate accepts.
#[derive(Debug, Clone)]
pub enum SecurityInput {
    Text(String),
    Candidates(Vec<Candidate>),
}

/// Mirrors [`SecurityInput`]: text in, verdict out; candidates in, candidates out.
#[derive(Debug, Clone)]
pub enum SecurityOutput {
    Text(SecurityVerdict),
    Candidates(SecuredCandidates),
}

/// Candidates after penalisation, redaction and the per-source cap.
#[derive(Debug, Clone, Default)]
pub struct SecuredCandidates {
    pub candidates: Vec<Candidate>,
    /// Aligned with `candidates`.
    pub verdicts: Vec<SecurityVerdict>,
    pub warnings: Vec<String>,
    pub redactions: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum QueryDecision {
    Allow,
    Warn(String),
    Block(String),
}

impl QueryDecision {
    pub fn is_blocked(&self) -> bool {
        matches!(self, Self::Block(_))
    }
}

#[derive(Debug, Clone, Default)]
pub struct SecurityGate {
    config: GuardConfig,
}

impl SecurityGate {
    pub fn new(config: GuardConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    pub fn secure(&self, input: SecurityInput) -> SecurityOutput {
        match input {
            SecurityInput::Text(text) => SecurityOutput::Text(self.secure_text(&text)),
            SecurityInput::Candidates(candidates) => SecurityOutput::Candidates(self.secure_candidates(candidates)),
        }
    }

    /// Scores and redacts one free-text input. A clean text keeps full trust (1.0).
    pub fn secure_text(&self, text: &str) -> SecurityVerdict {
        self.assess(text, 1.0)
    }

    /// Decides whether a query may proceed to retrieval.
    pub fn assess_query(&self, query: &str) -> (QueryDecision, SecurityVerdict) {
        let verdict = self.secure_text(query);
        let score = verdict.injection_score;
        let decision = if score >= self.config.block_threshold {
            warn!(score, threshold = self.config.block_threshold, "query blocked by injection policy");
            QueryDecision::Block(format!(
                "Query blocked: it matches {score} known prompt-injection pattern(s). Rephrase the question."
            ))
        } else if self.config.warn_threshold > 0 && score >= self.config.warn_threshold {
            QueryDecision::Warn("Query contains potential injection patterns".to_string())
        } else {
            QueryDecision::Allow
        };
        (decision, verdict)
    }

    /// Redacts and down-weights each candidate, moves safer candidates ahead of
    /// riskier ones (stable), then caps how many survive per source key.
    pub fn secure_candidates(&self, candidates: Vec<Candidate>) -> SecuredCandidates {
        let mut scored: Vec<(Candidate, SecurityVerdict)> = candidates
            .into_iter()
            .map(|mut candidate| {
                let verdict = self.assess(&candidate.text, candidate.similarity);
                candidate.text.clone_from(&verdict.redacted_text);
                candidate.similarity = verdict.adjusted_similarity;
                (candidate, verdict)
            })
            .collect();
        scored.sort_by_key(|(_, verdict)| verdict.injection_score);

        let capped = diversity_guard(scored, self.config.diversity_cap_per_source, |(c, _)| c.source_key.as_str());

        let mut out = SecuredCandidates::default();
        for (candidate, verdict) in capped {
            out.redactions += verdict.redactions;
            if let Some(w) = &verdict.warning {
                warn!(source = %candidate.source_key, score = verdict.injection_score, "suspicious passage");
                out.warnings.push(format!("{}: {w}", candidate.source_key));
            }
            out.candidates.push(candidate);
            out.verdicts.push(verdict);
        }
        debug!(kept = out.candidates.len(), redactions = out.redactions, "secured candidates");
        out
    }

    /// Sanitises and labels text for display.
    pub fn prepare_display(&self, text: &str) -> String {
        label_dangerous_commands(&sanitize(text, self.config.max_render_chars))
    }

    pub fn risk(&self, score: u32) -> f32 {
        risk(score, self.config.risk_normalizer)
    }

    fn assess(&self, text: &str, similarity: f32) -> SecurityVerdict {
        let injection_score = injection_score(text);
        let (redacted_text, redactions) = redact_counted(text);
        let warning = (self.config.warn_threshold > 0 && injection_score >= self.config.warn_threshold)
            .then(|| format!("Potential prompt injection (score {injection_score})"));
        SecurityVerdict {
            injection_score,
            redacted_text,
            warning,
            adjusted_similarity: clamp_unit(clamp_unit(similarity) * penalty_factor(injection_score)),
            redactions,
        }
    }
}

/// `1 / (1 + score)`: strictly decreasing in the score and never zero.
#[allow(clippy::cast_precision_loss)]
pub fn penalty_factor(score: u32) -> f32 {
    1.0 / (1.0 + score as f32)
}

/// Keeps at most `cap` items per key, preserving the relative order of survivors.
pub fn diversity_guard<T, F>(items: Vec<T>, cap: usize, key: F) -> Vec<T>
where
    F: Fn(&T) -> &str,
{
    let cap = cap.max(1);
    let mut seen: HashMap<String, usize> = HashMap::new();
    items
        .into_iter()
        .filter(|item| {
            let count = seen.entry(key(item).to_string()).or_insert(0);
            *count += 1;
            *count <= cap
        })
        .collect()
}
