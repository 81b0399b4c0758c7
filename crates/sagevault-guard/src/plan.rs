//! Securing generated output: multi-step plans and free-form answers.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use sagevault_core::types::clamp_unit;

use crate::dangerous::label_dangerous_commands;
use crate::gate::GuardConfig;
use crate::injection::{injection_score, risk};
use crate::redact::redact_counted;
use crate::sanitize::sanitize;

pub const BLOCKED_PIPE_CMD: &str = "# BLOCKED: risky curl pipe removed by security gate";
const BLOCKED_PIPE_WARNING: &str = "Shell pipeline blocked (curl | sh). Review manually.";
const BLOCKED_PIPE_RISK: f32 = 0.9;
const REDACTED_RESPONSE_WARNING: &str = "Response may contain redacted credentials";

static PIPE_TO_SHELL: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)\b(curl|wget)\b[^|]*\|\s*(sudo\s+)?(ba|z)?sh\b").ok());

/// One step of a generated action plan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanStep {
    pub title: String,
    pub why: String,
    pub cmd: String,
    pub cite: Vec<String>,
    /// Normalised risk in `[0, 1]`.
    pub risk: f32,
    pub warning: Option<String>,
}

/// Returns secured copies of `steps`; the input is not modified.
///
/// Text fields are redacted, then sanitised. A command piping a download into
/// a shell is replaced by a blocked marker with risk at least 0.9. Risk never
/// drops below a value the step already carried.
pub fn secure_plan(steps: &[PlanStep], config: &GuardConfig) -> Vec<PlanStep> {
    steps.iter().map(|step| secure_step(step, config)).collect()
}

fn secure_step(step: &PlanStep, config: &GuardConfig) -> PlanStep {
    let clean = |s: &str| sanitize(&redact_counted(s).0, config.max_render_chars);
    let mut out = PlanStep {
        title: clean(&step.title),
        why: clean(&step.why),
        cmd: clean(&step.cmd),
        cite: step.cite.clone(),
        risk: clamp_unit(step.risk),
        warning: step.warning.clone(),
    };

    if PIPE_TO_SHELL.as_ref().is_some_and(|re| re.is_match(&step.cmd)) {
        warn!(title = %out.title, "blocked shell pipeline in plan step");
        out.cmd = BLOCKED_PIPE_CMD.to_string();
        out.warning.get_or_insert_with(|| BLOCKED_PIPE_WARNING.to_string());
        out.risk = out.risk.max(BLOCKED_PIPE_RISK);
    }

    let score = injection_score(&format!("{}\n{}\n{}", step.title, step.why, step.cmd));
    out.risk = clamp_unit(out.risk.max(risk(score, config.risk_normalizer)));
    if config.warn_threshold > 0 && score >= config.warn_threshold {
        out.warning.get_or_insert_with(|| format!("Potential prompt injection (score {score})"));
    }
    out.cmd = label_dangerous_commands(&out.cmd);
    out
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecuredResponse {
    pub text: String,
    pub warnings: Vec<String>,
    pub redactions: usize,
}

/// Redacts credentials in a generated answer and labels dangerous commands.
pub fn secure_response(text: &str) -> SecuredResponse {
    let (redacted, redactions) = redact_counted(text);
    let mut warnings = Vec::new();
    if redactions > 0 {
        warn!(redactions, "credentials redacted from response");
        warnings.push(REDACTED_RESPONSE_WARNING.to_string());
    }
    SecuredResponse { text: label_dangerous_commands(&redacted), warnings, redactions }
}
