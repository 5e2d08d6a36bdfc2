//! L7 Cost & Token Accountant: static per-model price table, cost formula,
//! and the streaming token-estimate fallback.

use crate::providers::openai_shared::utils::estimate_tokens;
use once_cell::sync::Lazy;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy)]
pub struct ModelPrice {
    pub prompt_usd_per_1k: f64,
    pub completion_usd_per_1k: f64,
    pub embedding_usd_per_1k: f64,
}

static PRICE_TABLE: Lazy<HashMap<&'static str, ModelPrice>> = Lazy::new(|| {
    let mut table = HashMap::new();
    table.insert(
        "gpt-4o",
        ModelPrice {
            prompt_usd_per_1k: 0.0025,
            completion_usd_per_1k: 0.01,
            embedding_usd_per_1k: 0.0,
        },
    );
    table.insert(
        "gpt-4o-mini",
        ModelPrice {
            prompt_usd_per_1k: 0.00015,
            completion_usd_per_1k: 0.0006,
            embedding_usd_per_1k: 0.0,
        },
    );
    table.insert(
        "gpt-3.5-turbo",
        ModelPrice {
            prompt_usd_per_1k: 0.0005,
            completion_usd_per_1k: 0.0015,
            embedding_usd_per_1k: 0.0,
        },
    );
    table.insert(
        "claude-3-5-sonnet-latest",
        ModelPrice {
            prompt_usd_per_1k: 0.003,
            completion_usd_per_1k: 0.015,
            embedding_usd_per_1k: 0.0,
        },
    );
    table.insert(
        "claude-3-5-haiku-latest",
        ModelPrice {
            prompt_usd_per_1k: 0.0008,
            completion_usd_per_1k: 0.004,
            embedding_usd_per_1k: 0.0,
        },
    );
    table.insert(
        "llama-3.1-70b-versatile",
        ModelPrice {
            prompt_usd_per_1k: 0.00059,
            completion_usd_per_1k: 0.00079,
            embedding_usd_per_1k: 0.0,
        },
    );
    table.insert(
        "llama-3.1-8b-instant",
        ModelPrice {
            prompt_usd_per_1k: 0.00005,
            completion_usd_per_1k: 0.00008,
            embedding_usd_per_1k: 0.0,
        },
    );
    table.insert(
        "mixtral-8x7b-32768",
        ModelPrice {
            prompt_usd_per_1k: 0.00024,
            completion_usd_per_1k: 0.00024,
            embedding_usd_per_1k: 0.0,
        },
    );
    table
});

/// Fallback price applied to a model absent from the static table, so cost
/// accounting never panics on an unrecognized (but allow-listed) model.
const FALLBACK_PRICE: ModelPrice = ModelPrice {
    prompt_usd_per_1k: 0.001,
    completion_usd_per_1k: 0.002,
    embedding_usd_per_1k: 0.0001,
};

pub fn price_for(model: &str) -> ModelPrice {
    PRICE_TABLE.get(model).copied().unwrap_or(FALLBACK_PRICE)
}

/// `cost = prompt_tokens/1000 * p_in + completion_tokens/1000 * p_out`.
pub fn compute_cost(model: &str, prompt_tokens: u32, completion_tokens: u32) -> f64 {
    let price = price_for(model);
    (prompt_tokens as f64 / 1000.0) * price.prompt_usd_per_1k
        + (completion_tokens as f64 / 1000.0) * price.completion_usd_per_1k
}

pub fn compute_embedding_cost(model: &str, tokens: u32) -> f64 {
    let price = price_for(model);
    (tokens as f64 / 1000.0) * price.embedding_usd_per_1k
}

/// Usage extracted or estimated for a completed request, flagged when the
/// tokens were estimated rather than provider-reported.
#[derive(Debug, Clone, Copy)]
pub struct ResolvedUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub estimated: bool,
}

/// For streaming responses without a provider usage frame, tokens are
/// estimated from the reconstructed prompt/output text using the same
/// chars-per-token heuristic the provider layer already uses.
pub fn estimate_usage(prompt_text: &str, output_text: &str) -> ResolvedUsage {
    ResolvedUsage {
        prompt_tokens: estimate_tokens(prompt_text),
        completion_tokens: estimate_tokens(output_text),
        estimated: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cost_formula_matches_spec() {
        let cost = compute_cost("gpt-4o-mini", 1000, 500);
        let expected = 1.0 * 0.00015 + 0.5 * 0.0006;
        assert!((cost - expected).abs() < 1e-9);
    }

    #[test]
    fn unknown_model_uses_fallback_price_without_panicking() {
        let cost = compute_cost("some-future-model", 1000, 1000);
        assert!(cost > 0.0);
    }

    #[test]
    fn estimated_usage_is_flagged() {
        let usage = estimate_usage("hello there", "a longer response body");
        assert!(usage.estimated);
        assert!(usage.completion_tokens > 0);
    }
}
