//! Feature extraction for the hashing embedder.

/// Lowercased alphanumeric word tokens.
pub fn words(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Character n-grams of a word, padded with `^`/`$` so prefixes and suffixes are distinct.
/// Words shorter than `n` yield nothing.
pub fn char_ngrams(word: &str, n: usize) -> Vec<String> {
    let padded: Vec<char> = std::iter::once('^').chain(word.chars()).chain(std::iter::once('$')).collect();
    if n == 0 || word.chars().count() < n {
        return Vec::new();
    }
    padded.windows(n).map(|w| w.iter().collect()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn words_split_on_punctuation_and_lowercase() {
        assert_eq!(words("Run `pip install`, then README.md!"), vec!["run", "pip", "install", "then", "readme", "md"]);
        assert!(words("  --  ").is_empty());
    }

    #[test]
    fn ngrams_are_padded() {
        assert_eq!(char_ngrams("abc", 3), vec!["^ab", "abc", "bc$"]);
        assert!(char_ngrams("ab", 3).is_empty());
    }
}
