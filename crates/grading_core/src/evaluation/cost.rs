//! crates/grading_core/src/evaluation/cost.rs
//!
//! Static per-model pricing, in USD per million tokens.

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelPricing {
    pub input_per_million: f64,
    pub output_per_million: f64,
}

pub const DEFAULT_PRICED_MODEL: &str = "google/gemini-flash-1.5";

const PRICING: &[(&str, ModelPricing)] = &[
    (
        "google/gemini-flash-1.5",
        ModelPricing {
            input_per_million: 0.075,
            output_per_million: 0.30,
        },
    ),
    (
        "google/gemini-2.0-flash-001",
        ModelPricing {
            input_per_million: 0.10,
            output_per_million: 0.40,
        },
    ),
    (
        "google/gemini-2.0-flash-exp:free",
        ModelPricing {
            input_per_million: 0.0,
            output_per_million: 0.0,
        },
    ),
    (
        "google/gemini-2.5-flash",
        ModelPricing {
            input_per_million: 0.30,
            output_per_million: 2.50,
        },
    ),
    (
        "anthropic/claude-3-haiku",
        ModelPricing {
            input_per_million: 0.25,
            output_per_million: 1.25,
        },
    ),
    (
        "openai/gpt-4o-mini",
        ModelPricing {
            input_per_million: 0.15,
            output_per_million: 0.60,
        },
    ),
    (
        "openai/gpt-4o",
        ModelPricing {
            input_per_million: 2.50,
            output_per_million: 10.0,
        },
    ),
];

/// Looks up a model's price, falling back to [`DEFAULT_PRICED_MODEL`].
pub fn pricing_for(model: &str) -> ModelPricing {
    PRICING
        .iter()
        .find(|(name, _)| *name == model)
        .or_else(|| PRICING.iter().find(|(name, _)| *name == DEFAULT_PRICED_MODEL))
        .map(|(_, pricing)| *pricing)
        .unwrap_or(ModelPricing {
            input_per_million: 0.0,
            output_per_million: 0.0,
        })
}

pub fn evaluation_cost(prompt_tokens: u64, completion_tokens: u64, model: &str) -> f64 {
    let pricing = pricing_for(model);
    (prompt_tokens as f64 / 1_000_000.0) * pricing.input_per_million
        + (completion_tokens as f64 / 1_000_000.0) * pricing.output_per_million
}
