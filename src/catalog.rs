//! Model catalog: static descriptors, tiers, and the cost model.
//!
//! The catalog is read-only configuration. Rates are per-million tokens and
//! costs are computed in exact decimal arithmetic; rounding happens only in
//! read-time views, never while accumulating.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::tenant::Plan;
use crate::types::Usage;

const TOKENS_PER_UNIT_PRICE: Decimal = dec!(1_000_000);

/// Coarse pricing/quality classification used to derive default
/// entitlements from a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Basic,
    Pro,
    Premium,
}

/// Static description of one upstream model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelDescriptor {
    /// Model identifier as the upstream provider knows it
    pub id: String,
    /// Human-readable name
    pub name: String,
    /// USD per million input tokens
    pub input_per_mtok: Decimal,
    /// USD per million output tokens
    pub output_per_mtok: Decimal,
    /// Entitlement tier
    pub tier: Tier,
    /// Short description shown to tenants
    pub description: String,
}

impl ModelDescriptor {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        input_per_mtok: Decimal,
        output_per_mtok: Decimal,
        tier: Tier,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            input_per_mtok,
            output_per_mtok,
            tier,
            description: description.into(),
        }
    }

    /// Cost of the given token counts at this model's rates.
    pub fn cost(&self, usage: &Usage) -> Decimal {
        let input = Decimal::from(usage.input_tokens) / TOKENS_PER_UNIT_PRICE;
        let output = Decimal::from(usage.output_tokens) / TOKENS_PER_UNIT_PRICE;
        input * self.input_per_mtok + output * self.output_per_mtok
    }
}

/// The set of models the gateway fronts, with their rates and tiers.
#[derive(Debug, Clone)]
pub struct ModelCatalog {
    models: Vec<ModelDescriptor>,
}

impl Default for ModelCatalog {
    fn default() -> Self {
        Self {
            models: vec![
                ModelDescriptor::new(
                    "claude-sonnet-4",
                    "Claude Sonnet 4",
                    dec!(3),
                    dec!(15),
                    Tier::Basic,
                    "Fast and economical",
                ),
                ModelDescriptor::new(
                    "claude-sonnet-4.5",
                    "Claude Sonnet 4.5",
                    dec!(3),
                    dec!(15),
                    Tier::Pro,
                    "Smart and fast",
                ),
                ModelDescriptor::new(
                    "claude-opus-4",
                    "Claude Opus 4",
                    dec!(15),
                    dec!(75),
                    Tier::Premium,
                    "Highest quality for complex cases",
                ),
                ModelDescriptor::new(
                    "gpt-4o",
                    "GPT-4o",
                    dec!(2.5),
                    dec!(10),
                    Tier::Pro,
                    "Fast alternative",
                ),
                ModelDescriptor::new(
                    "gemini-2.5-flash",
                    "Gemini 2.5 Flash",
                    dec!(0.15),
                    dec!(0.6),
                    Tier::Basic,
                    "Ultra economical",
                ),
            ],
        }
    }
}

impl ModelCatalog {
    /// An empty catalog; register models with [`ModelCatalog::with_model`].
    pub fn empty() -> Self {
        Self { models: Vec::new() }
    }

    pub fn with_model(mut self, model: ModelDescriptor) -> Self {
        self.models.push(model);
        self
    }

    /// Look up a model descriptor by identifier.
    pub fn get(&self, model_id: &str) -> Option<&ModelDescriptor> {
        self.models.iter().find(|m| m.id == model_id)
    }

    /// All descriptors, in registration order.
    pub fn models(&self) -> &[ModelDescriptor] {
        &self.models
    }

    /// Descriptors for the given model identifiers, preserving catalog order.
    pub fn descriptors_for(&self, model_ids: &[String]) -> Vec<ModelDescriptor> {
        self.models
            .iter()
            .filter(|m| model_ids.iter().any(|id| id == &m.id))
            .cloned()
            .collect()
    }

    /// Default allow-list for a plan: every model whose tier the plan covers.
    pub fn models_for_plan(&self, plan: Plan) -> Vec<String> {
        let tiers = plan.allowed_tiers();
        self.models
            .iter()
            .filter(|m| tiers.contains(&m.tier))
            .map(|m| m.id.clone())
            .collect()
    }

    /// Price the given token counts for a model.
    ///
    /// Unknown model identifiers price as zero so a missing rate entry never
    /// fails a response; the event is still recorded and the gap is logged.
    pub fn price(&self, model_id: &str, usage: &Usage) -> Decimal {
        match self.get(model_id) {
            Some(model) => model.cost(usage),
            None => {
                tracing::warn!(model = %model_id, "no pricing entry; recording zero cost");
                Decimal::ZERO
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_one_million_input_equals_input_rate() {
        let catalog = ModelCatalog::default();
        let cost = catalog.price("claude-sonnet-4", &Usage::new(1_000_000, 0));
        assert_eq!(cost, dec!(3));
    }

    #[test]
    fn test_price_mixed_usage() {
        let catalog = ModelCatalog::default();
        // 1000/1e6 * 3 + 500/1e6 * 15 = 0.003 + 0.0075
        let cost = catalog.price("claude-sonnet-4", &Usage::new(1000, 500));
        assert_eq!(cost, dec!(0.0105));
    }

    #[test]
    fn test_unknown_model_prices_as_zero() {
        let catalog = ModelCatalog::default();
        let cost = catalog.price("mystery-model", &Usage::new(123_456, 789));
        assert_eq!(cost, Decimal::ZERO);
    }

    #[test]
    fn test_zero_usage_costs_nothing() {
        let catalog = ModelCatalog::default();
        assert_eq!(
            catalog.price("claude-opus-4", &Usage::default()),
            Decimal::ZERO
        );
    }

    #[test]
    fn test_models_for_plan_follows_tiers() {
        let catalog = ModelCatalog::default();

        let basic = catalog.models_for_plan(Plan::Basic);
        assert!(basic.contains(&"claude-sonnet-4".to_string()));
        assert!(basic.contains(&"gemini-2.5-flash".to_string()));
        assert!(!basic.contains(&"claude-opus-4".to_string()));

        let premium = catalog.models_for_plan(Plan::Premium);
        assert_eq!(premium.len(), catalog.models().len());
    }

    #[test]
    fn test_descriptors_preserve_catalog_order() {
        let catalog = ModelCatalog::default();
        let ids = vec!["claude-opus-4".to_string(), "claude-sonnet-4".to_string()];
        let descriptors = catalog.descriptors_for(&ids);
        assert_eq!(descriptors.len(), 2);
        assert_eq!(descriptors[0].id, "claude-sonnet-4");
    }

    #[test]
    fn test_custom_catalog() {
        let catalog = ModelCatalog::empty().with_model(ModelDescriptor::new(
            "house-model",
            "House Model",
            dec!(1),
            dec!(2),
            Tier::Basic,
            "In-house",
        ));
        let cost = catalog.price("house-model", &Usage::new(500_000, 500_000));
        assert_eq!(cost, dec!(1.5));
    }
}
