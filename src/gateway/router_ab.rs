//! L5 A/B Router: weighted variant selection, rewriting `model` after
//! admission and before cache fingerprinting.

use crate::gateway::model::AbConfig;

/// Result of routing through a project's A/B config.
#[derive(Debug, Clone)]
pub struct RoutedModel {
    pub model: String,
    pub variant_name: Option<String>,
}

/// Draws one uniform random number on `[0, 100)` and selects the first
/// variant whose cumulative weight exceeds the draw; falls back to the last
/// variant if rounding leaves the draw unclaimed.
pub fn route(config: Option<&AbConfig>, requested_model: &str) -> RoutedModel {
    let Some(config) = config.filter(|c| c.enabled && c.variants.len() >= 2) else {
        return RoutedModel {
            model: requested_model.to_string(),
            variant_name: None,
        };
    };

    let draw = fastrand::f64() * 100.0;
    let mut cumulative = 0.0;
    for variant in &config.variants {
        cumulative += variant.weight;
        if draw < cumulative {
            return RoutedModel {
                model: variant.model.clone(),
                variant_name: Some(variant.name.clone()),
            };
        }
    }

    let last = config.variants.last().expect("checked len >= 2 above");
    RoutedModel {
        model: last.model.clone(),
        variant_name: Some(last.name.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::model::AbVariant;

    fn two_variant_config() -> AbConfig {
        AbConfig {
            enabled: true,
            variants: vec![
                AbVariant {
                    name: "control".to_string(),
                    model: "gpt-4o-mini".to_string(),
                    weight: 50.0,
                },
                AbVariant {
                    name: "treatment".to_string(),
                    model: "gpt-4o".to_string(),
                    weight: 50.0,
                },
            ],
        }
    }

    #[test]
    fn disabled_config_passes_through_requested_model() {
        let mut config = two_variant_config();
        config.enabled = false;
        let routed = route(Some(&config), "claude-3-5-sonnet-latest");
        assert_eq!(routed.model, "claude-3-5-sonnet-latest");
        assert!(routed.variant_name.is_none());
    }

    #[test]
    fn no_config_passes_through_requested_model() {
        let routed = route(None, "gpt-4o");
        assert_eq!(routed.model, "gpt-4o");
    }

    #[test]
    fn enabled_config_always_selects_one_of_the_variants() {
        let config = two_variant_config();
        for _ in 0..50 {
            let routed = route(Some(&config), "gpt-4o-mini");
            assert!(routed.variant_name.is_some());
            assert!(["gpt-4o-mini", "gpt-4o"].contains(&routed.model.as_str()));
        }
    }

    #[test]
    fn validate_rejects_weights_not_summing_to_100() {
        let mut config = two_variant_config();
        config.variants[0].weight = 10.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_duplicate_names() {
        let mut config = two_variant_config();
        config.variants[1].name = config.variants[0].name.clone();
        assert!(config.validate().is_err());
    }
}
