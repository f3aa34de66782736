use crate::wire::lenient_opt_f64;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Per-token dollar rates for one model. Missing rates count as zero.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct ModelRates {
    #[serde(default, deserialize_with = "lenient_opt_f64")]
    pub input_cost_per_token: Option<f64>,
    #[serde(default, deserialize_with = "lenient_opt_f64")]
    pub output_cost_per_token: Option<f64>,
    #[serde(default, deserialize_with = "lenient_opt_f64")]
    pub cache_read_input_token_cost: Option<f64>,
    #[serde(default, deserialize_with = "lenient_opt_f64")]
    pub cache_creation_input_token_cost: Option<f64>,
}

impl ModelRates {
    pub fn input(&self) -> f64 {
        self.input_cost_per_token.unwrap_or(0.0)
    }

    pub fn output(&self) -> f64 {
        self.output_cost_per_token.unwrap_or(0.0)
    }

    pub fn cache_read(&self) -> f64 {
        self.cache_read_input_token_cost.unwrap_or(0.0)
    }

    pub fn cache_create(&self) -> f64 {
        self.cache_creation_input_token_cost.unwrap_or(0.0)
    }
}

/// Model rates in the order the server listed them. Entries whose rates do
/// not decode are skipped.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(from = "Map<String, Value>", into = "Map<String, Value>")]
pub struct PricingTable {
    models: Vec<(String, ModelRates)>,
}

impl PricingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the rates of a known model in place, otherwise appends.
    pub fn insert(&mut self, model: impl Into<String>, rates: ModelRates) {
        let model = model.into();
        match self.models.iter_mut().find(|(key, _)| *key == model) {
            Some((_, existing)) => *existing = rates,
            None => self.models.push((model, rates)),
        }
    }

    pub fn get(&self, model: &str) -> Option<&ModelRates> {
        self.iter().find(|(key, _)| *key == model).map(|(_, rates)| rates)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ModelRates)> {
        self.models.iter().map(|(key, rates)| (key.as_str(), rates))
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

impl From<Map<String, Value>> for PricingTable {
    fn from(map: Map<String, Value>) -> Self {
        let models = map
            .into_iter()
            .filter_map(|(key, value)| serde_json::from_value(value).ok().map(|rates| (key, rates)))
            .collect();
        Self { models }
    }
}

impl From<PricingTable> for Map<String, Value> {
    fn from(table: PricingTable) -> Self {
        table
            .models
            .into_iter()
            .filter_map(|(key, rates)| serde_json::to_value(rates).ok().map(|value| (key, value)))
            .collect()
    }
}

/// Body of `GET /api/pricing`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PricingResponse {
    #[serde(default)]
    pub pricing: Option<PricingTable>,
}

/// Exact key, then substring either way, then the first `opus` key, then the
/// first key in server order.
pub fn resolve_rates<'a>(table: &'a PricingTable, model_id: Option<&str>) -> Option<&'a ModelRates> {
    let model_id = model_id.filter(|id| !id.is_empty());
    if let Some(id) = model_id {
        if let Some(rates) = table.get(id) {
            return Some(rates);
        }
        let partial = table
            .iter()
            .find(|(key, _)| key.contains(id) || id.contains(key));
        if let Some((_, rates)) = partial {
            return Some(rates);
        }
    }
    table
        .iter()
        .find(|(key, _)| key.contains("opus"))
        .or_else(|| table.iter().next())
        .map(|(_, rates)| rates)
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TokenBuckets {
    pub input: u64,
    pub output: u64,
    pub cache_read: u64,
    pub cache_create: u64,
}

impl TokenBuckets {
    pub fn direct(&self) -> u64 {
        self.input.saturating_add(self.output)
    }

    pub fn cached(&self) -> u64 {
        self.cache_read.saturating_add(self.cache_create)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostEstimate {
    pub rates: ModelRates,
    pub input: f64,
    pub output: f64,
    pub cache_read: f64,
    pub cache_create: f64,
    pub total: f64,
}

pub fn estimate_cost(
    table: Option<&PricingTable>,
    model_id: Option<&str>,
    tokens: TokenBuckets,
) -> Option<CostEstimate> {
    let rates = *resolve_rates(table?, model_id)?;
    let input = tokens.input as f64 * rates.input();
    let output = tokens.output as f64 * rates.output();
    let cache_read = tokens.cache_read as f64 * rates.cache_read();
    let cache_create = tokens.cache_create as f64 * rates.cache_create();
    Some(CostEstimate {
        rates,
        input,
        output,
        cache_read,
        cache_create,
        total: input + output + cache_read + cache_create,
    })
}

/// `Opus`, `Sonnet` or `Haiku` when recognizable, otherwise the raw id.
pub fn model_short_name(model_id: Option<&str>) -> String {
    let Some(id) = model_id.filter(|id| !id.is_empty()) else {
        return String::new();
    };
    for (needle, short) in [("opus", "Opus"), ("sonnet", "Sonnet"), ("haiku", "Haiku")] {
        if id.contains(needle) {
            return short.to_string();
        }
    }
    id.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn table() -> PricingTable {
        let response: PricingResponse = serde_json::from_value(json!({
            "pricing": {
                "claude-haiku-4": {"input_cost_per_token": 1e-6, "output_cost_per_token": 5e-6},
                "claude-opus-4": {
                    "input_cost_per_token": 1.5e-5,
                    "output_cost_per_token": 7.5e-5,
                    "cache_read_input_token_cost": 1.5e-6,
                    "cache_creation_input_token_cost": 1.875e-5
                },
                "claude-sonnet-4-5": {"input_cost_per_token": 3e-6, "output_cost_per_token": null}
            }
        }))
        .expect("pricing");
        response.pricing.expect("table")
    }

    #[test]
    fn resolves_exact_then_substring() {
        let table = table();
        let exact = resolve_rates(&table, Some("claude-haiku-4")).expect("exact");
        assert_eq!(exact.input(), 1e-6);
        let longer = resolve_rates(&table, Some("claude-sonnet-4-5-20250929")).expect("substring");
        assert_eq!(longer.input(), 3e-6);
        assert_eq!(longer.output(), 0.0);
        let shorter = resolve_rates(&table, Some("haiku")).expect("contained");
        assert_eq!(shorter.output(), 5e-6);
    }

    #[test]
    fn falls_back_to_opus_then_first_key() {
        let table = table();
        let fallback = resolve_rates(&table, Some("gpt-5")).expect("opus fallback");
        assert_eq!(fallback.input(), 1.5e-5);
        assert_eq!(resolve_rates(&table, None), Some(fallback));

        let no_opus: PricingTable = serde_json::from_value(json!({
            "zeta-model": {"input_cost_per_token": 2e-6},
            "alpha-model": {"input_cost_per_token": 9e-6},
            "broken": "n/a"
        }))
        .expect("table");
        assert_eq!(no_opus.len(), 2);
        let first = resolve_rates(&no_opus, Some("other")).expect("first key");
        assert_eq!(first.input(), 2e-6);
        assert!(resolve_rates(&PricingTable::new(), Some("x")).is_none());
    }

    #[test]
    fn estimates_each_bucket() {
        let table = table();
        let cost = estimate_cost(
            Some(&table),
            Some("claude-opus-4"),
            TokenBuckets {
                input: 1_000_000,
                output: 100_000,
                cache_read: 2_000_000,
                cache_create: 0,
            },
        )
        .expect("cost");
        assert!((cost.input - 15.0).abs() < 1e-9);
        assert!((cost.output - 7.5).abs() < 1e-9);
        assert!((cost.cache_read - 3.0).abs() < 1e-9);
        assert_eq!(cost.cache_create, 0.0);
        assert!((cost.total - 25.5).abs() < 1e-9);
        assert!(estimate_cost(None, Some("claude-opus-4"), TokenBuckets::default()).is_none());
    }

    #[test]
    fn short_model_names() {
        assert_eq!(model_short_name(Some("claude-opus-4-6")), "Opus");
        assert_eq!(model_short_name(Some("claude-3-5-sonnet")), "Sonnet");
        assert_eq!(model_short_name(Some("claude-haiku-4-5")), "Haiku");
        assert_eq!(model_short_name(Some("gpt-5")), "gpt-5");
        assert_eq!(model_short_name(None), "");
    }
}
