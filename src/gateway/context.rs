//! The single `ServerContext`: every piece of shared state the route
//! handlers touch, constructed once at startup and passed explicitly as an
//! axum extension.

use crate::gateway::auth::{InMemoryProjectDirectory, KeyResolver, ProjectDirectory};
use crate::gateway::cache::{EmbeddingProvider, ExactCache, HashEmbeddingProvider, SemanticCache};
use crate::gateway::config::GatewayConfig;
use crate::gateway::dispatch::Dispatcher;
use crate::gateway::evaluation::{spawn_evaluation_queue, AlertTracker, EvaluationQueue};
use crate::gateway::model::EvaluationRuleSet;
use crate::gateway::observability::{AnalyticsSink, InMemoryAnalyticsSink, UsageQueue};
use crate::gateway::ratelimit::{InMemoryKvStore, KvStore, RateLimiter, RedisKvStore};
use crate::gateway::admission::ModelAllowList;
use crate::gateway::trace::TraceStore;
use crate::config::DefaultLLMParams;
use dashmap::DashMap;
use std::sync::Arc;

/// Everything a request handler needs, bundled behind one `Arc` clone per
/// request. Holds no per-request state itself.
pub struct ServerContext {
    pub config: GatewayConfig,
    pub dispatcher: Dispatcher,
    pub key_resolver: KeyResolver,
    pub rate_limiter: RateLimiter,
    pub exact_cache: ExactCache,
    pub semantic_cache: SemanticCache,
    pub embedding_provider: Box<dyn EmbeddingProvider>,
    pub model_allow_list: ModelAllowList,
    pub trace_store: TraceStore,
    pub usage_queue: UsageQueue,
    pub evaluation_queue: EvaluationQueue,
    pub alert_tracker: Arc<AlertTracker>,
    pub rule_sets: DashMap<String, Vec<EvaluationRuleSet>>,
    pub slack_webhooks: DashMap<String, String>,
    pub http: reqwest::Client,
}

impl ServerContext {
    /// Builds the full context from `config`, wiring an in-memory KV store
    /// when `config.kv.url` is unset and a Redis-backed one otherwise.
    pub async fn build(config: GatewayConfig) -> Result<Self, String> {
        let dispatcher = Dispatcher::new(config.providers.clone(), DefaultLLMParams::default())
            .map_err(|e| e.to_string())?;

        let kv: Arc<dyn KvStore> = match &config.kv.url {
            Some(url) => Arc::new(RedisKvStore::connect(url).await.map_err(|e| e.to_string())?),
            None => Arc::new(InMemoryKvStore::new()),
        };

        let directory: Arc<dyn ProjectDirectory> = Arc::new(InMemoryProjectDirectory::new());
        let sink: Arc<dyn AnalyticsSink> = Arc::new(InMemoryAnalyticsSink::new());
        let usage_queue = crate::gateway::observability::spawn(config.observability, sink);

        let alert_tracker = Arc::new(AlertTracker::new());
        let http = reqwest::Client::new();
        let evaluation_queue = spawn_evaluation_queue(
            config.evaluation_queue.max_in_flight,
            alert_tracker.clone(),
            http.clone(),
        );

        Ok(Self {
            key_resolver: KeyResolver::new(directory),
            rate_limiter: RateLimiter::new(kv),
            exact_cache: ExactCache::new(),
            semantic_cache: SemanticCache::new(),
            embedding_provider: Box::new(HashEmbeddingProvider::new(64)),
            model_allow_list: ModelAllowList::default(),
            trace_store: TraceStore::new(
                config.trace_store.snapshot_store_capacity,
                config.trace_store.modification_store_capacity,
            ),
            usage_queue,
            evaluation_queue,
            alert_tracker,
            rule_sets: DashMap::new(),
            slack_webhooks: DashMap::new(),
            http,
            dispatcher,
            config,
        })
    }
}
