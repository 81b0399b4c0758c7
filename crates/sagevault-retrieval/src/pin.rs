use sagevault_core::traits::PinLookup;
use sagevault_core::types::{Document, SourceType};

use crate::retriever::path_depth;

/// Pins the shallowest repository document whose file name starts with one of
/// `prefixes` (case-insensitive), e.g. the top-level README.
#[derive(Debug, Clone)]
pub struct OverviewPin {
    prefixes: Vec<String>,
}

impl Default for OverviewPin {
    fn default() -> Self {
        Self::new(["readme"])
    }
}

impl OverviewPin {
    pub fn new<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self { prefixes: prefixes.into_iter().map(|p| p.as_ref().to_lowercase()).collect() }
    }

    fn matches(&self, doc: &Document) -> bool {
        let name = doc.key.rsplit('/').next().unwrap_or(&doc.key).to_lowercase();
        self.prefixes.iter().any(|p| name.starts_with(p.as_str()))
    }
}

impl PinLookup for OverviewPin {
    fn pinned<'a>(&self, corpus: &'a [Document]) -> Option<&'a Document> {
        corpus
            .iter()
            .filter(|d| d.source_type() == SourceType::Repository && !d.text.trim().is_empty() && self.matches(d))
            .min_by(|a, b| path_depth(&a.key).cmp(&path_depth(&b.key)).then_with(|| a.key.cmp(&b.key)))
    }
}

/// Never pins anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPin;

impl PinLookup for NoPin {
    fn pinned<'a>(&self, _corpus: &'a [Document]) -> Option<&'a Document> {
        None
    }
}
