//! Data model shared across gateway layers: projects, keys, plans, cache
//! entries, usage records, agent-run snapshots, and evaluation rule sets.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Subscription tier. Drives the static plan-limit table in [`PlanLimits`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    Free,
    Starter,
    Pro,
}

/// Per-minute and per-month request ceilings for a plan.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PlanLimits {
    pub requests_per_minute: u32,
    pub requests_per_month: u64,
}

impl Plan {
    /// Static table baked into the binary, as required by the data model.
    pub fn limits(self) -> PlanLimits {
        match self {
            Plan::Free => PlanLimits {
                requests_per_minute: 10,
                requests_per_month: 10_000,
            },
            Plan::Starter => PlanLimits {
                requests_per_minute: 60,
                requests_per_month: 250_000,
            },
            Plan::Pro => PlanLimits {
                requests_per_minute: 600,
                requests_per_month: 5_000_000,
            },
        }
    }
}

/// One arm of a project's A/B configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AbVariant {
    pub name: String,
    pub model: String,
    /// Weight in (0, 100]; all variants in a config must sum to 100 ± 0.1.
    pub weight: f64,
}

/// Enabled A/B configuration for a project, validated at registration time
/// (2..5 variants, unique names, weights summing to 100).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AbConfig {
    pub enabled: bool,
    pub variants: Vec<AbVariant>,
}

impl AbConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !(2..=5).contains(&self.variants.len()) {
            return Err("A/B config requires 2..5 variants".to_string());
        }
        let mut names = std::collections::HashSet::new();
        let mut total = 0.0;
        for v in &self.variants {
            if !names.insert(&v.name) {
                return Err(format!("duplicate variant name: {}", v.name));
            }
            if !(v.weight > 0.0 && v.weight <= 100.0) {
                return Err(format!("variant {} weight out of (0,100]", v.name));
            }
            total += v.weight;
        }
        if (total - 100.0).abs() > 0.1 {
            return Err(format!("variant weights sum to {total}, expected 100"));
        }
        Ok(())
    }
}

/// Identity of a tenant. Immutable from the core's perspective except for
/// `last_used_at` touches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub owner: String,
    pub plan: Plan,
    pub ab_config: Option<AbConfig>,
}

/// Bearer token record. Created and revoked externally; the core only reads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKey {
    pub token: String,
    pub key_prefix: String,
    pub project_id: String,
    pub is_active: bool,
}

/// Cache flavour a response was served from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheStatus {
    Miss,
    Exact,
    Semantic,
}

impl CacheStatus {
    pub fn kind_header(self) -> Option<&'static str> {
        match self {
            CacheStatus::Miss => None,
            CacheStatus::Exact => Some("exact"),
            CacheStatus::Semantic => Some("semantic"),
        }
    }
}

/// Append-only per-request analytics row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageRecord {
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub project_id: String,
    pub key_prefix: String,
    pub path: String,
    pub model: String,
    pub provider: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
    pub cost_usd: f64,
    pub latency_ms: u64,
    pub cached: CacheStatus,
    pub http_status: u16,
    pub error_class: Option<String>,
    pub tags: HashMap<String, String>,
    pub ab_variant: Option<String>,
    pub token_estimate: bool,
}

/// Status of an agent run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
    Cancelled,
}

/// Immutable snapshot of one step's request parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestSnapshot {
    pub model: String,
    pub messages: serde_json::Value,
    pub tools: Option<serde_json::Value>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
    pub top_p: Option<f64>,
    pub tool_choice: Option<serde_json::Value>,
    pub response_format: Option<serde_json::Value>,
}

/// Immutable snapshot of one step's response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseSnapshot {
    pub content: Option<String>,
    pub tool_calls: Option<serde_json::Value>,
    pub finish_reason: Option<String>,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub cost_usd: f64,
    pub latency_ms: u64,
    pub cached: CacheStatus,
    pub error: Option<String>,
}

/// One step of an agent run: its request and response snapshots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepSnapshot {
    pub index: u32,
    pub request: RequestSnapshot,
    pub response: ResponseSnapshot,
}

/// A captured agent run: ordered, dense, append-only step snapshots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRunSnapshot {
    pub run_id: String,
    pub project_id: String,
    pub agent_name: String,
    pub status: RunStatus,
    pub steps: Vec<StepSnapshot>,
}

/// Subset of a step's request fields a replay may override.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReplayModification {
    pub messages: Option<serde_json::Value>,
    pub tools: Option<serde_json::Value>,
    pub model: Option<String>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
    pub top_p: Option<f64>,
    pub tool_choice: Option<serde_json::Value>,
    pub response_format: Option<serde_json::Value>,
}

/// Severity of a failed evaluation criterion, ordered `info < warning <
/// error < critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
    Critical,
}

/// Input passed to every criterion evaluator.
#[derive(Debug, Clone)]
pub struct EvaluationInput {
    pub request_id: String,
    pub model: String,
    pub path: String,
    pub input: String,
    pub output: String,
    pub response_body: Option<serde_json::Value>,
    pub latency_ms: u64,
    pub cost_usd: f64,
    pub requested_at: chrono::DateTime<chrono::Utc>,
    pub tags: HashMap<String, String>,
}

/// Filter selecting which requests an evaluation rule set applies to.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvaluationFilter {
    pub models: Option<Vec<String>>,
    pub paths: Option<Vec<String>>,
    pub tags: Option<Vec<String>>,
    pub min_cost: Option<f64>,
}

impl EvaluationFilter {
    pub fn matches(&self, input: &EvaluationInput) -> bool {
        if let Some(models) = &self.models {
            if !models.iter().any(|m| m == &input.model) {
                return false;
            }
        }
        if let Some(paths) = &self.paths {
            if !paths.iter().any(|p| p == &input.path) {
                return false;
            }
        }
        if let Some(tags) = &self.tags {
            if !tags.iter().any(|t| input.tags.contains_key(t)) {
                return false;
            }
        }
        if let Some(min_cost) = self.min_cost {
            if input.cost_usd < min_cost {
                return false;
            }
        }
        true
    }
}

/// Alerting configuration attached to a rule set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertConfig {
    pub pass_rate_threshold: f64,
    pub window_minutes: i64,
    pub min_samples: usize,
    pub cooldown_minutes: i64,
    pub channels: Vec<String>,
}

/// A named, project-scoped collection of criteria + filter + sampling +
/// alert config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationRuleSet {
    pub id: String,
    pub project_id: String,
    pub name: String,
    pub criteria: Vec<crate::gateway::evaluation::Criterion>,
    pub filter: EvaluationFilter,
    pub is_async: bool,
    pub sample_rate: f64,
    pub alert: Option<AlertConfig>,
}

/// Per-criterion evaluation outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CriterionOutcome {
    pub name: String,
    pub passed: bool,
    pub score: f64,
    pub message: Option<String>,
    pub details: Option<serde_json::Value>,
    pub duration_ms: u64,
}

/// Aggregate result of evaluating one rule set against one request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub id: String,
    pub rule_set_id: String,
    pub request_id: String,
    pub outcomes: Vec<CriterionOutcome>,
    pub passed: bool,
    pub score: f64,
    pub max_failed_severity: Option<Severity>,
    pub evaluated_at: chrono::DateTime<chrono::Utc>,
}
