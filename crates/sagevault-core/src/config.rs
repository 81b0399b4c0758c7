//! Lightweight configuration loader and path helpers.
//!
//! Uses Figment to merge `config.toml` + `config.<env>.toml` + `APP_*` env vars
//! (nested keys separated by `__`, e.g. `APP_RETRIEVAL__MAX_RESULTS=8`).
//! Every setting has a default, so a missing config file is not an error.
//! Provides helpers to expand `~` and `${VAR}` and to resolve relative paths
//! against a known base directory.

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::chunker::ChunkingConfig;
use crate::error::{Error, Result};

/// Hard ceiling for the important-document boost, whatever the configuration says.
pub const MAX_IMPORTANT_BOOST: f32 = 1.8;

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::new().merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment };
        config.validate()?;
        Ok(config)
    }

    /// Loads a single explicit TOML file, without environment overlays.
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::NotFound(path.display().to_string()));
        }
        let config = Self { figment: Figment::new().merge(Toml::file(path)) };
        config.validate()?;
        Ok(config)
    }

    pub fn get<T>(&self, key: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| Error::InvalidConfig(format!("Failed to get '{key}': {e}")))
    }

    /// All typed settings, defaults filled in and out-of-range values clamped.
    pub fn settings(&self) -> Result<Settings> {
        let settings: Settings = self
            .figment
            .extract()
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        Ok(settings.normalized())
    }

    fn validate(&self) -> Result<()> {
        self.settings().map(|_| ())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub chunking: ChunkingConfig,
    pub retrieval: RetrievalConfig,
    pub embedding: EmbeddingConfig,
}

impl Settings {
    pub fn normalized(self) -> Self {
        Self { chunking: self.chunking.normalized(), retrieval: self.retrieval.normalized(), embedding: self.embedding }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub dim: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self { dim: 384 }
    }
}

/// Query-time options recognised by the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub max_results: usize,
    /// 1.0 = pure relevance, 0.0 = pure novelty.
    pub mmr_lambda: f32,
    pub diversity_cap_per_source: usize,
    /// Queries scoring at or above this are rejected before retrieval.
    pub injection_block_threshold: u32,
    /// Queries and passages scoring at or above this carry a warning.
    pub injection_warn_threshold: u32,
    pub max_context_chars: usize,
    pub max_context_tokens: Option<usize>,
    /// Raw neighbours fetched per requested result.
    pub fetch_multiplier: usize,
    pub fetch_hard_cap: usize,
    /// Case-insensitive substrings of source keys that mark overview documents.
    pub important_patterns: Vec<String>,
    pub important_boost: f32,
    /// Injection score that maps to a normalised risk of 1.0.
    pub risk_normalizer: f32,
    pub pinned_max_chars: usize,
    pub max_render_chars: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            max_results: 5,
            mmr_lambda: 0.7,
            diversity_cap_per_source: 3,
            injection_block_threshold: 2,
            injection_warn_threshold: 1,
            max_context_chars: 6000,
            max_context_tokens: None,
            fetch_multiplier: 3,
            fetch_hard_cap: 50,
            important_patterns: vec!["readme".to_string(), "overview".to_string()],
            important_boost: 1.3,
            risk_normalizer: 3.0,
            pinned_max_chars: 1500,
            max_render_chars: 2000,
        }
    }
}

impl RetrievalConfig {
    /// Clamps degenerate values instead of rejecting them.
    pub fn normalized(mut self) -> Self {
        self.max_results = self.max_results.max(1);
        self.mmr_lambda = if self.mmr_lambda.is_nan() { 0.7 } else { self.mmr_lambda.clamp(0.0, 1.0) };
        self.diversity_cap_per_source = self.diversity_cap_per_source.max(1);
        self.injection_block_threshold = self.injection_block_threshold.max(1);
        self.fetch_multiplier = self.fetch_multiplier.max(1);
        self.fetch_hard_cap = self.fetch_hard_cap.max(1);
        self.important_boost = if self.important_boost.is_nan() {
            1.0
        } else {
            self.important_boost.clamp(1.0, MAX_IMPORTANT_BOOST)
        };
        if !(self.risk_normalizer.is_finite() && self.risk_normalizer > 0.0) {
            self.risk_normalizer = 3.0;
        }
        self.max_render_chars = self.max_render_chars.max(1);
        self
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
