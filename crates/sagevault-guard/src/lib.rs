//! sagevault-guard
//!
//! The security gate between retrieval and generation. Scores text for prompt
//! and command injection, redacts credential-shaped strings, penalises and
//! rebalances candidate passages, labels destructive shell commands and
//! sanitises text bound for display.

pub mod dangerous;
pub mod gate;
pub mod injection;
pub mod plan;
pub mod redact;
pub mod sanitize;

pub use dangerous::{extract_dangerous, label_dangerous_commands, WARN_LINE};
pub use gate::{
    diversity_guard, penalty_factor, GuardConfig, QueryDecision, SecuredCandidates, SecurityGate, SecurityInput,
    SecurityOutput,
};
pub use injection::{injection_score, risk};
pub use plan::{secure_plan, secure_response, PlanStep, SecuredResponse};
pub use redact::{redact, redact_counted, REDACTION_PLACEHOLDER};
pub use sanitize::{sanitize, DEFAULT_MAX_RENDER_CHARS};
