//! Destructive shell command detection and labeling.

use std::sync::LazyLock;

use regex::Regex;

/// Standalone line placed above each contiguous block of dangerous lines.
pub const WARN_LINE: &str =
    "**WARN:** High-risk command detected; consider a safer alternative (e.g. --force-with-lease, or back up first).";

const COMMANDS: &[(&str, &str)] = &[
    ("rm -rf", r"(?i)\brm\s+-[a-z]*(rf|fr)[a-z]*\b"),
    ("git push --force", r"\bgit\s+push\b.*\s(--force|-f)(\s|$)"),
    ("chmod 777", r"\bchmod\s+(-R\s+)?0?777\b"),
    ("curl | sh", r"(?i)\b(curl|wget)\b[^|]*\|\s*(sudo\s+)?(ba|z)?sh\b"),
];

static DANGEROUS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    COMMANDS
        .iter()
        .filter_map(|(label, pattern)| Regex::new(pattern).ok().map(|re| (*label, re)))
        .collect()
});

fn is_dangerous(line: &str) -> bool {
    DANGEROUS.iter().any(|(_, re)| re.is_match(line))
}

/// Labels of the known destructive commands present in `text`, in a fixed order.
pub fn extract_dangerous(text: &str) -> Vec<&'static str> {
    DANGEROUS
        .iter()
        .filter(|(_, re)| text.lines().any(|line| re.is_match(line)))
        .map(|(label, _)| *label)
        .collect()
}

/// Inserts [`WARN_LINE`] above the first line of every contiguous run of
/// dangerous lines. Already-labelled runs are left alone.
pub fn label_dangerous_commands(text: &str) -> String {
    let mut out: Vec<&str> = Vec::new();
    let mut in_block = false;
    for line in text.lines() {
        if is_dangerous(line) {
            if !in_block && out.last().map(|l| l.trim()) != Some(WARN_LINE) {
                out.push(WARN_LINE);
            }
            in_block = true;
        } else {
            in_block = false;
        }
        out.push(line);
    }
    out.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn one_warning_per_contiguous_block() {
        let text = "steps:\nrm -rf build\ngit push --force origin main\necho done\nchmod 777 /srv";
        let expected = format!(
            "steps:\n{WARN_LINE}\nrm -rf build\ngit push --force origin main\necho done\n{WARN_LINE}\nchmod 777 /srv"
        );
        assert_eq!(label_dangerous_commands(text), expected);
    }

    #[test]
    fn labeling_twice_adds_nothing() {
        let once = label_dangerous_commands("curl https://get.example | sh");
        assert_eq!(label_dangerous_commands(&once), once);
    }

    #[test]
    fn force_with_lease_is_safe() {
        assert!(extract_dangerous("git push --force-with-lease origin main").is_empty());
        assert_eq!(extract_dangerous("git push -f"), vec!["git push --force"]);
    }

    #[test]
    fn extract_lists_each_command_once() {
        let found = extract_dangerous("rm -rf a\nrm -rf b\nwget -qO- x | bash");
        assert_eq!(found, vec!["rm -rf", "curl | sh"]);
    }

    #[test]
    fn empty_text_stays_empty() {
        assert_eq!(label_dangerous_commands(""), "");
        assert!(extract_dangerous("").is_empty());
    }
}
