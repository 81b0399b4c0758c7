//! Source attribution and context rendering for the generation step.

use sagevault_core::types::{Candidate, SourceType, UPLOADED_PREFIX};

const MAX_DOWNLOAD_NAMES: usize = 3;

/// Joins passages as `Source: <key>` blocks, in order.
pub fn render_context(passages: &[Candidate]) -> String {
    passages
        .iter()
        .map(|p| format!("Source: {}\n\n{}", p.source_key, p.text))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Attribution headers for the sources behind `passages`:
/// `**Repo: <name>**` for repository content and `**Download: a, b, c**` for
/// uploads (first three distinct names).
pub fn attribution_headers(passages: &[Candidate], repo_name: &str) -> Vec<String> {
    let mut headers = Vec::new();
    if passages.iter().any(|p| p.source_type() == SourceType::Repository) {
        headers.push(format!("**Repo: {repo_name}**"));
    }
    let mut downloads: Vec<&str> = Vec::new();
    for p in passages.iter().filter(|p| p.source_type() == SourceType::Uploaded) {
        let name = p.source_key.strip_prefix(UPLOADED_PREFIX).unwrap_or(&p.source_key);
        if !downloads.contains(&name) {
            downloads.push(name);
        }
    }
    if !downloads.is_empty() {
        downloads.truncate(MAX_DOWNLOAD_NAMES);
        headers.push(format!("**Download: {}**", downloads.join(", ")));
    }
    headers
}

/// Appends attribution headers to `response` unless it already carries them.
pub fn attribute_sources(response: &str, passages: &[Candidate], repo_name: &str) -> String {
    if response.contains("**Repo:") || response.contains("**Download:") {
        return response.to_string();
    }
    let headers = attribution_headers(passages, repo_name);
    if headers.is_empty() {
        return response.to_string();
    }
    format!("{response}\n\n{}\n", headers.join("\n"))
}
