//! # Pricing Module
//!
//! Model price table used to turn token counts into USD.
//!
//! ## Pricing Structure
//!
//! Each model has per-token rates for:
//! - Input tokens
//! - Output tokens
//! - Cache creation (typically 1.25x input price)
//! - Cache reads (typically 0.1x input price)
//!
//! plus its context window size. Model identifiers are normalized before lookup so
//! provider-prefixed and dated names (`anthropic/claude-3.5-sonnet`,
//! `us.anthropic.claude-sonnet-4-20250514-v1:0`, `claude-3-opus@20240229`) resolve
//! to the base model's rates.
//!
//! Prices can be overridden via environment variables (all four required):
//! - `CLAUDE_PRICE_INPUT`
//! - `CLAUDE_PRICE_OUTPUT`
//! - `CLAUDE_PRICE_CACHE_CREATE`
//! - `CLAUDE_PRICE_CACHE_READ`

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::env;
use std::path::Path;

use crate::models::Usd;

pub const CACHE_CREATE_MULTIPLIER: f64 = 1.25;
pub const CACHE_READ_MULTIPLIER: f64 = 0.1;
pub const DEFAULT_CONTEXT_LIMIT: u64 = 200_000;
pub const DEFAULT_MODEL: &str = "claude-sonnet-4";

// Bedrock cross-region ids: "us.anthropic.claude-..." / "anthropic.claude-..."
static REGION_PREFIX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:[a-z]{2,4}\.)?anthropic\.").unwrap());
// Bedrock revision suffix: "-v1:0", "-v2"
static REVISION_SUFFIX_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"-v\d+(?::\d+)?$").unwrap());
// "3.5" -> "3-5"
static DOTTED_VERSION_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d)\.(\d)").unwrap());

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelRates {
    pub input: Usd,
    pub output: Usd,
    pub cache_creation: Usd,
    pub cache_read: Usd,
    pub context_limit: u64,
}

impl ModelRates {
    /// Rates from USD-per-million list prices, cache rates derived from input.
    pub fn per_million(input: f64, output: f64) -> Self {
        let in_pt = Usd::per_million(input);
        Self {
            input: in_pt,
            output: Usd::per_million(output),
            cache_creation: in_pt.scaled(CACHE_CREATE_MULTIPLIER),
            cache_read: in_pt.scaled(CACHE_READ_MULTIPLIER),
            context_limit: DEFAULT_CONTEXT_LIMIT,
        }
    }

    pub fn with_context_limit(mut self, limit: u64) -> Self {
        self.context_limit = limit;
        self
    }

    /// Fully explicit per-token rates in USD.
    pub fn per_token(input: f64, output: f64, cache_creation: f64, cache_read: f64) -> Self {
        Self {
            input: Usd::from_f64(input),
            output: Usd::from_f64(output),
            cache_creation: Usd::from_f64(cache_creation),
            cache_read: Usd::from_f64(cache_read),
            context_limit: DEFAULT_CONTEXT_LIMIT,
        }
    }
}

/// Rates used when the table does not even contain its own default model.
fn sonnet_rates() -> ModelRates {
    ModelRates::per_million(3.0, 15.0)
}

/// Result of a table lookup.
#[derive(Clone, Copy, Debug)]
pub struct RateLookup<'a> {
    /// Table key that matched (the default model's key on fallback).
    pub key: &'a str,
    pub rates: ModelRates,
    /// True when the identifier was not recognized and default rates were used.
    pub fallback: bool,
}

/// Immutable mapping from normalized model id to rates.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PriceTable {
    entries: HashMap<String, ModelRates>,
    default_model: String,
}

impl Default for PriceTable {
    fn default() -> Self {
        Self::builtin()
    }
}

impl PriceTable {
    pub fn new(default_model: &str) -> Self {
        Self {
            entries: HashMap::new(),
            default_model: normalize_model_name(default_model),
        }
    }

    pub fn with_model(mut self, model: &str, rates: ModelRates) -> Self {
        self.insert(model, rates);
        self
    }

    pub fn insert(&mut self, model: &str, rates: ModelRates) {
        self.entries.insert(normalize_model_name(model), rates);
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn models(&self) -> Vec<&str> {
        let mut v: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        v.sort_unstable();
        v
    }

    /// Current Anthropic list prices.
    pub fn builtin() -> Self {
        let opus_legacy = ModelRates::per_million(15.0, 75.0);
        let sonnet = sonnet_rates();
        PriceTable::new(DEFAULT_MODEL)
            // Opus
            .with_model("claude-opus-4-5", ModelRates::per_million(5.0, 25.0))
            .with_model("claude-opus-4-1", opus_legacy)
            .with_model("claude-opus-4", opus_legacy)
            .with_model("claude-4-opus", opus_legacy)
            .with_model("claude-3-opus", opus_legacy)
            // Sonnet
            .with_model("claude-sonnet-4-5", sonnet)
            .with_model("claude-sonnet-4", sonnet)
            .with_model("claude-4-sonnet", sonnet)
            .with_model("claude-3-7-sonnet", sonnet)
            .with_model("claude-3-5-sonnet", sonnet)
            // Haiku
            .with_model("claude-haiku-4-5", ModelRates::per_million(1.0, 5.0))
            .with_model("claude-3-5-haiku", ModelRates::per_million(0.8, 4.0))
            .with_model("claude-3-haiku", ModelRates::per_million(0.25, 1.25))
            // Legacy
            .with_model("claude-2.1", ModelRates::per_million(8.0, 24.0))
            .with_model(
                "claude-2.0",
                ModelRates::per_million(8.0, 24.0).with_context_limit(100_000),
            )
            .with_model(
                "claude-instant-1.2",
                ModelRates::per_million(0.8, 2.4).with_context_limit(100_000),
            )
    }

    /// Parse a LiteLLM-style price map (`input_cost_per_token`, ...). Entries without
    /// an input price are skipped; missing cache prices use the standard multipliers.
    pub fn from_json_str(json: &str, default_model: &str) -> Result<Self> {
        let raw: HashMap<String, Value> =
            serde_json::from_str(json).context("parse price table json")?;
        let mut table = PriceTable::new(default_model);
        for (name, spec) in raw {
            if let Some(rates) = rates_from_litellm(&spec) {
                table.insert(&name, rates);
            }
        }
        if table.is_empty() {
            anyhow::bail!("price table contains no priced models");
        }
        Ok(table)
    }

    pub fn from_json_file(path: &Path, default_model: &str) -> Result<Self> {
        let txt = std::fs::read_to_string(path)
            .with_context(|| format!("read price table {}", path.display()))?;
        Self::from_json_str(&txt, default_model)
            .with_context(|| format!("load price table {}", path.display()))
    }

    /// Env overrides take precedence when all four are provided and parse.
    pub fn with_env_override(mut self) -> Self {
        if let (Ok(gi), Ok(go), Ok(gc), Ok(gr)) = (
            env::var("CLAUDE_PRICE_INPUT").map(|s| s.trim().parse::<f64>()),
            env::var("CLAUDE_PRICE_OUTPUT").map(|s| s.trim().parse::<f64>()),
            env::var("CLAUDE_PRICE_CACHE_CREATE").map(|s| s.trim().parse::<f64>()),
            env::var("CLAUDE_PRICE_CACHE_READ").map(|s| s.trim().parse::<f64>()),
        ) {
            if let (Ok(ii), Ok(oo), Ok(cc), Ok(cr)) = (gi, go, gc, gr) {
                let forced = ModelRates::per_token(ii, oo, cc, cr);
                for rates in self.entries.values_mut() {
                    *rates = ModelRates {
                        context_limit: rates.context_limit,
                        ..forced
                    };
                }
                if !self.entries.contains_key(&self.default_model) {
                    self.entries.insert(self.default_model.clone(), forced);
                }
            }
        }
        self
    }

    /// Exact key, then the longest key that prefixes the normalized id on a `-`
    /// boundary, then the default entry.
    pub fn lookup(&self, model_id: &str) -> RateLookup<'_> {
        let normalized = normalize_model_name(model_id);
        if let Some((key, rates)) = self.entries.get_key_value(&normalized) {
            return RateLookup {
                key,
                rates: *rates,
                fallback: false,
            };
        }
        let best = self
            .entries
            .iter()
            .filter(|(key, _)| is_prefix_on_boundary(key, &normalized))
            .max_by_key(|(key, _)| key.len());
        if let Some((key, rates)) = best {
            return RateLookup {
                key,
                rates: *rates,
                fallback: false,
            };
        }
        tracing::debug!(
            model = model_id,
            default = %self.default_model,
            "unknown model, using default rates"
        );
        self.default_lookup()
    }

    pub fn default_lookup(&self) -> RateLookup<'_> {
        let rates = self
            .entries
            .get(&self.default_model)
            .copied()
            .unwrap_or_else(sonnet_rates);
        RateLookup {
            key: &self.default_model,
            rates,
            fallback: true,
        }
    }

    pub fn context_limit_for(&self, model_id: &str) -> u64 {
        self.lookup(model_id).rates.context_limit
    }
}

fn is_prefix_on_boundary(key: &str, name: &str) -> bool {
    name.len() > key.len() && name.starts_with(key) && name.as_bytes()[key.len()] == b'-'
}

fn rates_from_litellm(spec: &Value) -> Option<ModelRates> {
    let num = |k: &str| spec.get(k).and_then(Value::as_f64);
    let input = num("input_cost_per_token")?;
    let output = num("output_cost_per_token").unwrap_or(0.0);
    let cache_creation = num("cache_creation_input_token_cost")
        .unwrap_or(input * CACHE_CREATE_MULTIPLIER);
    let cache_read = num("cache_read_input_token_cost").unwrap_or(input * CACHE_READ_MULTIPLIER);
    let context_limit = spec
        .get("max_input_tokens")
        .or_else(|| spec.get("max_tokens"))
        .and_then(Value::as_u64)
        .unwrap_or(DEFAULT_CONTEXT_LIMIT);
    Some(
        ModelRates::per_token(input, output, cache_creation, cache_read)
            .with_context_limit(context_limit),
    )
}

/// Lowercase, drop provider path components and Bedrock/Vertex decorations, and
/// rewrite dotted versions to the dashed form used by table keys.
pub fn normalize_model_name(model_id: &str) -> String {
    let mut m = model_id.trim().to_lowercase();
    if let Some(idx) = m.rfind('/') {
        m = m[idx + 1..].to_string();
    }
    if let Some(idx) = m.find('@') {
        m.truncate(idx);
    }
    m = REGION_PREFIX_RE.replace(&m, "").into_owned();
    m = REVISION_SUFFIX_RE.replace(&m, "").into_owned();
    DOTTED_VERSION_RE.replace_all(&m, "$1-$2").into_owned()
}
