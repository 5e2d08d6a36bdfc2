//! Gateway configuration, loaded from environment variables the same way
//! [`crate::config::LLMConfig::from_env`] loads provider configuration.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone)]
pub struct ProviderEndpoint {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ProvidersConfig {
    pub openai: ProviderEndpoint,
    pub anthropic: ProviderEndpoint,
    pub groq: ProviderEndpoint,
}

#[derive(Debug, Clone)]
pub struct KvConfig {
    pub url: Option<String>,
    pub token: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SemanticCacheConfig {
    pub enabled: bool,
    pub threshold: f32,
    pub max_per_partition: usize,
}

impl Default for SemanticCacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            threshold: 0.92,
            max_per_partition: 50,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DispatcherConfig {
    pub timeout_ms: u64,
    pub retries: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 60_000,
            retries: 2,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ObservabilityConfig {
    pub batch_size: usize,
    pub batch_interval_ms: u64,
    pub max_in_flight: usize,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            batch_size: 128,
            batch_interval_ms: 500,
            max_in_flight: 4096,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct EvaluationQueueConfig {
    pub max_in_flight: usize,
}

impl Default for EvaluationQueueConfig {
    fn default() -> Self {
        Self {
            max_in_flight: 4096,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TraceStoreConfig {
    pub snapshot_store_capacity: usize,
    pub modification_store_capacity: usize,
}

impl Default for TraceStoreConfig {
    fn default() -> Self {
        Self {
            snapshot_store_capacity: 1000,
            modification_store_capacity: 1000,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub providers: ProvidersConfig,
    pub kv: KvConfig,
    pub semantic_cache: SemanticCacheConfig,
    pub dispatcher: DispatcherConfig,
    pub observability: ObservabilityConfig,
    pub evaluation_queue: EvaluationQueueConfig,
    pub trace_store: TraceStoreConfig,
    pub bind_addr: String,
}

fn env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    env(name)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl GatewayConfig {
    /// Loads configuration from the process environment, falling back to
    /// the documented defaults for anything unset.
    pub fn from_env() -> Self {
        Self {
            providers: ProvidersConfig {
                openai: ProviderEndpoint {
                    base_url: env("PROVIDER_OPENAI_BASE_URL"),
                    api_key: env("PROVIDER_OPENAI_API_KEY").or_else(|| env("OPENAI_API_KEY")),
                },
                anthropic: ProviderEndpoint {
                    base_url: env("PROVIDER_ANTHROPIC_BASE_URL"),
                    api_key: env("PROVIDER_ANTHROPIC_API_KEY")
                        .or_else(|| env("ANTHROPIC_API_KEY")),
                },
                groq: ProviderEndpoint {
                    base_url: env("PROVIDER_GROQ_BASE_URL"),
                    api_key: env("PROVIDER_GROQ_API_KEY").or_else(|| env("GROQ_API_KEY")),
                },
            },
            kv: KvConfig {
                url: env("KV_URL"),
                token: env("KV_TOKEN"),
            },
            semantic_cache: SemanticCacheConfig {
                enabled: env_parse("CACHE_SEMANTIC_ENABLED", false),
                threshold: env_parse("CACHE_SEMANTIC_THRESHOLD", 0.92),
                max_per_partition: env_parse("CACHE_SEMANTIC_MAX_PER_PARTITION", 50),
            },
            dispatcher: DispatcherConfig {
                timeout_ms: env_parse("DISPATCHER_TIMEOUT_MS", 60_000),
                retries: env_parse("DISPATCHER_RETRIES", 2),
            },
            observability: ObservabilityConfig {
                batch_size: env_parse("OBSERVABILITY_QUEUE_BATCH_SIZE", 128),
                batch_interval_ms: env_parse("OBSERVABILITY_QUEUE_BATCH_INTERVAL_MS", 500),
                max_in_flight: env_parse("OBSERVABILITY_QUEUE_MAX_IN_FLIGHT", 4096),
            },
            evaluation_queue: EvaluationQueueConfig {
                max_in_flight: env_parse("EVALUATION_QUEUE_MAX_IN_FLIGHT", 4096),
            },
            trace_store: TraceStoreConfig {
                snapshot_store_capacity: env_parse("SNAPSHOT_STORE_CAPACITY", 1000),
                modification_store_capacity: env_parse("MODIFICATION_STORE_CAPACITY", 1000),
            },
            bind_addr: env("GATEWAY_BIND_ADDR").unwrap_or_else(|| "0.0.0.0:8080".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane_without_any_env_vars() {
        let cfg = SemanticCacheConfig::default();
        assert!(!cfg.enabled);
        assert_eq!(cfg.max_per_partition, 50);
        assert!((cfg.threshold - 0.92).abs() < 1e-6);
    }
}
