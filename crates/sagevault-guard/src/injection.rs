//! Heuristic prompt- and command-injection scoring.

use std::sync::LazyLock;

use regex::Regex;

use sagevault_core::types::clamp_unit;

const PATTERNS: &[&str] = &[
    // Prompt overrides
    r"(?i)\b(ignore|disregard|forget)\s+(all\s+)?(the\s+|your\s+|any\s+)?(previous|prior|earlier|above)\s+(instructions|rules|prompts?)",
    // System prompt leaks
    r"(?i)\b(reveal|show|print|repeat|leak)\s+(me\s+)?(your\s+|the\s+)?(system|hidden|initial)\s+(prompt|instructions)",
    // Guardrail bypass
    r"(?i)\b(bypass|disable|turn\s+off)\s+(the\s+|your\s+|all\s+)?(safety|guard(rail)?s?|polic(y|ies)|filters?)",
    // Role confusion
    r"(?i)\b(as|act\s+as)\s+(the\s+)?system\s*[:>]",
    r"(?i)\byou\s+are\s+now\s+(in\s+)?(developer|dan|jailbreak|unrestricted)",
    // Destructive shell pipelines
    r"(?i)\b(curl|wget)\b[^\n|]*\|\s*(sudo\s+)?(ba|z)?sh\b",
    r"(?i)\brm\s+-[a-z]*(rf|fr)[a-z]*\s+(/|~|\*)",
];

static INJECTION_PATTERNS: LazyLock<Vec<Regex>> =
    LazyLock::new(|| PATTERNS.iter().filter_map(|p| Regex::new(p).ok()).collect());

/// Number of distinct injection patterns matching `text`.
pub fn injection_score(text: &str) -> u32 {
    let hits = INJECTION_PATTERNS.iter().filter(|re| re.is_match(text)).count();
    u32::try_from(hits).unwrap_or(u32::MAX)
}

/// `min(1, score / normalizer)`; a non-positive normalizer is treated as 1.
#[allow(clippy::cast_precision_loss)]
pub fn risk(score: u32, normalizer: f32) -> f32 {
    let normalizer = if normalizer.is_finite() && normalizer > 0.0 { normalizer } else { 1.0 };
    clamp_unit(score as f32 / normalizer)
}
