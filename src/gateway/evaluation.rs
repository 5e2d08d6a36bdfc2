//! Evaluation pipeline: per-criterion checks, rule-set aggregation, and a
//! rolling alerting window dispatched to Slack.

use crate::gateway::model::{
    AlertConfig, CriterionOutcome, EvaluationInput, EvaluationResult, EvaluationRuleSet, Severity,
};
use crate::logging::log_warn;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::sync::mpsc;

/// One evaluation criterion. Tagged by `type` so rule sets deserialize as a
/// plain JSON array of these.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Criterion {
    RegexMatch {
        name: String,
        pattern: String,
        #[serde(default = "default_true")]
        enabled: bool,
        #[serde(default)]
        severity: Severity,
    },
    RegexNoMatch {
        name: String,
        pattern: String,
        #[serde(default = "default_true")]
        enabled: bool,
        #[serde(default)]
        severity: Severity,
    },
    Contains {
        name: String,
        needle: String,
        #[serde(default)]
        case_sensitive: bool,
        #[serde(default = "default_true")]
        enabled: bool,
        #[serde(default)]
        severity: Severity,
    },
    NotContains {
        name: String,
        needle: String,
        #[serde(default)]
        case_sensitive: bool,
        #[serde(default = "default_true")]
        enabled: bool,
        #[serde(default)]
        severity: Severity,
    },
    JsonSchema {
        name: String,
        schema: serde_json::Value,
        #[serde(default = "default_true")]
        enabled: bool,
        #[serde(default)]
        severity: Severity,
    },
    JsonPathExists {
        name: String,
        path: String,
        #[serde(default = "default_true")]
        enabled: bool,
        #[serde(default)]
        severity: Severity,
    },
    JsonPathEquals {
        name: String,
        path: String,
        expected: serde_json::Value,
        #[serde(default = "default_true")]
        enabled: bool,
        #[serde(default)]
        severity: Severity,
    },
    LengthMin {
        name: String,
        min: usize,
        #[serde(default = "default_true")]
        enabled: bool,
        #[serde(default)]
        severity: Severity,
    },
    LengthMax {
        name: String,
        max: usize,
        #[serde(default = "default_true")]
        enabled: bool,
        #[serde(default)]
        severity: Severity,
    },
    LatencyMax {
        name: String,
        max_ms: u64,
        #[serde(default = "default_true")]
        enabled: bool,
        #[serde(default)]
        severity: Severity,
    },
    CostMax {
        name: String,
        max_usd: f64,
        #[serde(default = "default_true")]
        enabled: bool,
        #[serde(default)]
        severity: Severity,
    },
    Sentiment {
        name: String,
        #[serde(default = "default_true")]
        enabled: bool,
        #[serde(default)]
        severity: Severity,
    },
    Toxicity {
        name: String,
        #[serde(default = "default_true")]
        enabled: bool,
        #[serde(default)]
        severity: Severity,
    },
    PiiDetection {
        name: String,
        #[serde(default = "default_true")]
        enabled: bool,
        #[serde(default)]
        severity: Severity,
    },
    Composite {
        name: String,
        mode: CompositeMode,
        #[serde(default)]
        min_score: f64,
        children: Vec<WeightedCriterion>,
        #[serde(default = "default_true")]
        enabled: bool,
        #[serde(default)]
        severity: Severity,
    },
    LlmJudge {
        name: String,
        #[serde(default = "default_true")]
        enabled: bool,
        #[serde(default)]
        severity: Severity,
    },
    CustomFunction {
        name: String,
        #[serde(default = "default_true")]
        enabled: bool,
        #[serde(default)]
        severity: Severity,
    },
}

fn default_true() -> bool {
    true
}

fn default_weight() -> f64 {
    1.0
}

/// One composite child plus its positive weight, used by
/// [`CompositeMode::Weighted`] to compute `Σw·s / Σw`. Flattened so a plain
/// criterion object still deserializes with an implicit weight of 1.0.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeightedCriterion {
    #[serde(default = "default_weight")]
    pub weight: f64,
    #[serde(flatten)]
    pub criterion: Criterion,
}

impl Default for Severity {
    fn default() -> Self {
        Severity::Error
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompositeMode {
    All,
    Any,
    Weighted,
}

const PII_PATTERNS: &[(&str, &str)] = &[
    ("email", r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}"),
    ("phone", r"\b(?:\+?1[-. ]?)?\(?\d{3}\)?[-. ]?\d{3}[-. ]?\d{4}\b"),
    ("ssn", r"\b\d{3}-\d{2}-\d{4}\b"),
    ("credit_card", r"\b(?:\d[ -]*?){13,16}\b"),
];

const TOXIC_KEYWORDS: &[&str] = &["idiot", "stupid", "hate you", "shut up", "moron"];
const POSITIVE_KEYWORDS: &[&str] = &["great", "good", "love", "excellent", "thanks", "happy"];
const NEGATIVE_KEYWORDS: &[&str] = &["bad", "terrible", "awful", "hate", "angry", "sad"];

impl Criterion {
    pub fn name(&self) -> &str {
        match self {
            Criterion::RegexMatch { name, .. }
            | Criterion::RegexNoMatch { name, .. }
            | Criterion::Contains { name, .. }
            | Criterion::NotContains { name, .. }
            | Criterion::JsonSchema { name, .. }
            | Criterion::JsonPathExists { name, .. }
            | Criterion::JsonPathEquals { name, .. }
            | Criterion::LengthMin { name, .. }
            | Criterion::LengthMax { name, .. }
            | Criterion::LatencyMax { name, .. }
            | Criterion::CostMax { name, .. }
            | Criterion::Sentiment { name, .. }
            | Criterion::Toxicity { name, .. }
            | Criterion::PiiDetection { name, .. }
            | Criterion::Composite { name, .. }
            | Criterion::LlmJudge { name, .. }
            | Criterion::CustomFunction { name, .. } => name,
        }
    }

    pub fn enabled(&self) -> bool {
        match self {
            Criterion::RegexMatch { enabled, .. }
            | Criterion::RegexNoMatch { enabled, .. }
            | Criterion::Contains { enabled, .. }
            | Criterion::NotContains { enabled, .. }
            | Criterion::JsonSchema { enabled, .. }
            | Criterion::JsonPathExists { enabled, .. }
            | Criterion::JsonPathEquals { enabled, .. }
            | Criterion::LengthMin { enabled, .. }
            | Criterion::LengthMax { enabled, .. }
            | Criterion::LatencyMax { enabled, .. }
            | Criterion::CostMax { enabled, .. }
            | Criterion::Sentiment { enabled, .. }
            | Criterion::Toxicity { enabled, .. }
            | Criterion::PiiDetection { enabled, .. }
            | Criterion::Composite { enabled, .. }
            | Criterion::LlmJudge { enabled, .. }
            | Criterion::CustomFunction { enabled, .. } => *enabled,
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Criterion::RegexMatch { severity, .. }
            | Criterion::RegexNoMatch { severity, .. }
            | Criterion::Contains { severity, .. }
            | Criterion::NotContains { severity, .. }
            | Criterion::JsonSchema { severity, .. }
            | Criterion::JsonPathExists { severity, .. }
            | Criterion::JsonPathEquals { severity, .. }
            | Criterion::LengthMin { severity, .. }
            | Criterion::LengthMax { severity, .. }
            | Criterion::LatencyMax { severity, .. }
            | Criterion::CostMax { severity, .. }
            | Criterion::Sentiment { severity, .. }
            | Criterion::Toxicity { severity, .. }
            | Criterion::PiiDetection { severity, .. }
            | Criterion::Composite { severity, .. }
            | Criterion::LlmJudge { severity, .. }
            | Criterion::CustomFunction { severity, .. } => *severity,
        }
    }

    /// Evaluate this criterion against `input`, regardless of its `enabled`
    /// flag (callers skip disabled criteria before calling this).
    pub fn evaluate(&self, input: &EvaluationInput) -> CriterionOutcome {
        let started = Instant::now();
        let (passed, score, message, details) = self.evaluate_inner(input);
        CriterionOutcome {
            name: self.name().to_string(),
            passed,
            score,
            message,
            details,
            duration_ms: started.elapsed().as_millis() as u64,
        }
    }

    fn evaluate_inner(
        &self,
        input: &EvaluationInput,
    ) -> (bool, f64, Option<String>, Option<serde_json::Value>) {
        match self {
            Criterion::RegexMatch { pattern, .. } => match regex::Regex::new(pattern) {
                Ok(re) => {
                    let matched = re.is_match(&input.output);
                    (matched, if matched { 1.0 } else { 0.0 }, None, None)
                }
                Err(e) => (false, 0.0, Some(format!("invalid regex: {e}")), None),
            },
            Criterion::RegexNoMatch { pattern, .. } => match regex::Regex::new(pattern) {
                Ok(re) => {
                    let matched = re.is_match(&input.output);
                    (!matched, if matched { 0.0 } else { 1.0 }, None, None)
                }
                Err(e) => (false, 0.0, Some(format!("invalid regex: {e}")), None),
            },
            Criterion::Contains {
                needle,
                case_sensitive,
                ..
            } => {
                let found = if *case_sensitive {
                    input.output.contains(needle.as_str())
                } else {
                    input
                        .output
                        .to_lowercase()
                        .contains(&needle.to_lowercase())
                };
                (found, if found { 1.0 } else { 0.0 }, None, None)
            }
            Criterion::NotContains {
                needle,
                case_sensitive,
                ..
            } => {
                let found = if *case_sensitive {
                    input.output.contains(needle.as_str())
                } else {
                    input
                        .output
                        .to_lowercase()
                        .contains(&needle.to_lowercase())
                };
                (!found, if found { 0.0 } else { 1.0 }, None, None)
            }
            Criterion::JsonSchema { schema, .. } => {
                match serde_json::from_str::<serde_json::Value>(&input.output) {
                    Ok(value) => {
                        let ok = json_schema_matches(&value, schema);
                        (ok, if ok { 1.0 } else { 0.0 }, None, None)
                    }
                    Err(e) => (false, 0.0, Some(format!("output is not valid JSON: {e}")), None),
                }
            }
            Criterion::JsonPathExists { path, .. } => {
                let body = input
                    .response_body
                    .clone()
                    .or_else(|| serde_json::from_str(&input.output).ok());
                let found = body.as_ref().and_then(|b| json_path_get(b, path)).is_some();
                (found, if found { 1.0 } else { 0.0 }, None, None)
            }
            Criterion::JsonPathEquals { path, expected, .. } => {
                let body = input
                    .response_body
                    .clone()
                    .or_else(|| serde_json::from_str(&input.output).ok());
                let matches = body
                    .as_ref()
                    .and_then(|b| json_path_get(b, path))
                    .map(|v| v == *expected)
                    .unwrap_or(false);
                (matches, if matches { 1.0 } else { 0.0 }, None, None)
            }
            Criterion::LengthMin { min, .. } => {
                let len = input.output.len();
                let score = (len as f64 / *min as f64).min(1.0);
                (len >= *min, score, None, None)
            }
            Criterion::LengthMax { max, .. } => {
                let len = input.output.len();
                let score = (1.0 - (len as f64 - *max as f64) / *max as f64).max(0.0);
                (len <= *max, score, None, None)
            }
            Criterion::LatencyMax { max_ms, .. } => {
                let score =
                    (1.0 - (input.latency_ms as f64 - *max_ms as f64) / *max_ms as f64).max(0.0);
                (input.latency_ms <= *max_ms, score, None, None)
            }
            Criterion::CostMax { max_usd, .. } => {
                let score = (1.0 - (input.cost_usd - *max_usd) / *max_usd).max(0.0);
                (input.cost_usd <= *max_usd, score, None, None)
            }
            Criterion::Sentiment { .. } => {
                let text = input.output.to_lowercase();
                let pos = POSITIVE_KEYWORDS
                    .iter()
                    .filter(|k| text.contains(*k))
                    .count();
                let neg = NEGATIVE_KEYWORDS
                    .iter()
                    .filter(|k| text.contains(*k))
                    .count();
                let total = (pos + neg).max(1) as f64;
                let label = if pos > neg {
                    "positive"
                } else if neg > pos {
                    "negative"
                } else {
                    "neutral"
                };
                let confidence = (pos.max(neg) as f64 / total).max(0.5);
                (
                    true,
                    confidence,
                    Some(label.to_string()),
                    Some(serde_json::json!({"label": label, "confidence": confidence})),
                )
            }
            Criterion::Toxicity { .. } => {
                let text = input.output.to_lowercase();
                let hits: Vec<&str> = TOXIC_KEYWORDS
                    .iter()
                    .filter(|k| text.contains(*k))
                    .copied()
                    .collect();
                let toxic = !hits.is_empty();
                (
                    !toxic,
                    if toxic { 0.0 } else { 1.0 },
                    None,
                    Some(serde_json::json!({"matched": hits})),
                )
            }
            Criterion::PiiDetection { .. } => {
                let mut found_types = Vec::new();
                for (kind, pattern) in PII_PATTERNS {
                    if let Ok(re) = regex::Regex::new(pattern) {
                        if re.is_match(&input.output) {
                            found_types.push(*kind);
                        }
                    }
                }
                let clean = found_types.is_empty();
                (
                    clean,
                    if clean { 1.0 } else { 0.0 },
                    None,
                    Some(serde_json::json!({"piiTypes": found_types})),
                )
            }
            Criterion::Composite {
                mode,
                min_score,
                children,
                ..
            } => {
                let active: Vec<&WeightedCriterion> =
                    children.iter().filter(|c| c.criterion.enabled()).collect();
                let outcomes: Vec<CriterionOutcome> =
                    active.iter().map(|c| c.criterion.evaluate(input)).collect();
                if outcomes.is_empty() {
                    return (true, 1.0, None, None);
                }
                match mode {
                    CompositeMode::All => {
                        let passed = outcomes.iter().all(|o| o.passed);
                        let score =
                            outcomes.iter().map(|o| o.score).sum::<f64>() / outcomes.len() as f64;
                        (passed, score, None, None)
                    }
                    CompositeMode::Any => {
                        let passed = outcomes.iter().any(|o| o.passed);
                        let score = outcomes
                            .iter()
                            .map(|o| o.score)
                            .fold(0.0_f64, f64::max);
                        (passed, score, None, None)
                    }
                    CompositeMode::Weighted => {
                        let weight_sum: f64 = active.iter().map(|c| c.weight).sum();
                        let weighted_sum: f64 = active
                            .iter()
                            .zip(outcomes.iter())
                            .map(|(c, o)| c.weight * o.score)
                            .sum();
                        let score = if weight_sum > 0.0 {
                            weighted_sum / weight_sum
                        } else {
                            0.0
                        };
                        (score >= *min_score, score, None, None)
                    }
                }
            }
            Criterion::LlmJudge { .. } | Criterion::CustomFunction { .. } => (
                false,
                0.0,
                Some("criterion type not implemented".to_string()),
                None,
            ),
        }
    }
}

fn json_schema_matches(value: &serde_json::Value, schema: &serde_json::Value) -> bool {
    let Some(expected_type) = schema.get("type").and_then(|t| t.as_str()) else {
        return true;
    };
    let type_matches = match expected_type {
        "object" => value.is_object(),
        "array" => value.is_array(),
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => value.is_boolean(),
        "null" => value.is_null(),
        _ => true,
    };
    if !type_matches {
        return false;
    }
    if expected_type == "object" {
        if let Some(obj) = value.as_object() {
            if let Some(required) = schema.get("required").and_then(|r| r.as_array()) {
                for key in required {
                    let Some(key) = key.as_str() else { continue };
                    if !obj.contains_key(key) {
                        return false;
                    }
                }
            }
            if let Some(props) = schema.get("properties").and_then(|p| p.as_object()) {
                for (key, prop_schema) in props {
                    if let Some(v) = obj.get(key) {
                        if !json_schema_matches(v, prop_schema) {
                            return false;
                        }
                    }
                }
            }
        }
    }
    true
}

/// Minimal `$.a.b[0].c` path lookup. Returns `None` on any missing segment.
fn json_path_get<'a>(value: &'a serde_json::Value, path: &str) -> Option<&'a serde_json::Value> {
    let path = path.strip_prefix('$').unwrap_or(path);
    let mut current = value;
    for segment in path.split('.') {
        if segment.is_empty() {
            continue;
        }
        let (field, indices) = split_indices(segment);
        if !field.is_empty() {
            current = current.as_object()?.get(field)?;
        }
        for idx in indices {
            current = current.as_array()?.get(idx)?;
        }
    }
    Some(current)
}

fn split_indices(segment: &str) -> (&str, Vec<usize>) {
    let mut field_end = segment.len();
    let mut indices = Vec::new();
    if let Some(bracket) = segment.find('[') {
        field_end = bracket;
        let mut rest = &segment[bracket..];
        while let Some(open) = rest.find('[') {
            let Some(close) = rest[open..].find(']') else {
                break;
            };
            if let Ok(idx) = rest[open + 1..open + close].parse::<usize>() {
                indices.push(idx);
            }
            rest = &rest[open + close + 1..];
        }
    }
    (&segment[..field_end], indices)
}

/// Aggregates a rule set's criteria against one request.
pub fn evaluate_rule_set(
    rule_set: &EvaluationRuleSet,
    request_id: &str,
    input: &EvaluationInput,
) -> EvaluationResult {
    let outcomes: Vec<CriterionOutcome> = rule_set
        .criteria
        .iter()
        .filter(|c| c.enabled())
        .map(|c| c.evaluate(input))
        .collect();

    let failed_severities: Vec<Severity> = rule_set
        .criteria
        .iter()
        .filter(|c| c.enabled())
        .zip(outcomes.iter())
        .filter(|(_, o)| !o.passed)
        .map(|(c, _)| c.severity())
        .collect();

    let passed = failed_severities.is_empty();
    let score = if outcomes.is_empty() {
        1.0
    } else {
        outcomes.iter().map(|o| o.score).sum::<f64>() / outcomes.len() as f64
    };
    let max_failed_severity = failed_severities.into_iter().max();

    EvaluationResult {
        id: uuid::Uuid::new_v4().to_string(),
        rule_set_id: rule_set.id.clone(),
        request_id: request_id.to_string(),
        outcomes,
        passed,
        score,
        max_failed_severity,
        evaluated_at: chrono::Utc::now(),
    }
}

/// Rolling pass/fail window for one rule set's alert configuration.
#[derive(Debug, Default)]
struct AlertWindow {
    samples: std::collections::VecDeque<(chrono::DateTime<chrono::Utc>, bool)>,
    last_alert_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Tracks rolling alert windows per rule set and decides when to fire.
#[derive(Debug, Default)]
pub struct AlertTracker {
    windows: Mutex<HashMap<String, AlertWindow>>,
}

impl AlertTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a result and returns `Some(alert_config)` if an alert should
    /// fire now, per the rule set's configured threshold/window/cooldown.
    pub fn record(
        &self,
        rule_set_id: &str,
        alert: &AlertConfig,
        passed: bool,
    ) -> Option<AlertConfig> {
        let now = chrono::Utc::now();
        let mut windows = self.windows.lock().unwrap();
        let window = windows.entry(rule_set_id.to_string()).or_default();
        window.samples.push_back((now, passed));

        let cutoff = now - chrono::Duration::minutes(alert.window_minutes);
        while window
            .samples
            .front()
            .map(|(ts, _)| *ts < cutoff)
            .unwrap_or(false)
        {
            window.samples.pop_front();
        }

        let sample_count = window.samples.len();
        if sample_count < alert.min_samples {
            return None;
        }
        let pass_count = window.samples.iter().filter(|(_, p)| *p).count();
        let pass_rate = pass_count as f64 / sample_count as f64;
        if pass_rate >= alert.pass_rate_threshold {
            return None;
        }
        if let Some(last) = window.last_alert_at {
            if now - last < chrono::Duration::minutes(alert.cooldown_minutes) {
                return None;
            }
        }
        window.last_alert_at = Some(now);
        Some(alert.clone())
    }
}

/// Per-request sampling draw for a rule set's `sample_rate ∈ [0, 1]`: a
/// rate of `1.0` admits every request, `0.0` admits none.
pub fn sample_admits(sample_rate: f64) -> bool {
    fastrand::f64() < sample_rate
}

/// One deferred evaluation: a rule set to run against a single request's
/// input, queued so the response fan-out never blocks on evaluation latency
/// or a Slack round-trip.
pub struct EvaluationJob {
    pub rule_set: EvaluationRuleSet,
    pub request_id: String,
    pub input: EvaluationInput,
    pub slack_webhook: Option<String>,
}

/// Producer handle into the bounded evaluation queue, mirroring
/// [`crate::gateway::observability::UsageQueue`]'s shape.
#[derive(Clone)]
pub struct EvaluationQueue {
    sender: mpsc::Sender<EvaluationJob>,
    dropped: Arc<AtomicU64>,
}

impl EvaluationQueue {
    /// Enqueues a job. On a full queue the job is dropped and a warning
    /// counter is incremented; the hot path is never stalled.
    pub fn enqueue(&self, job: EvaluationJob) {
        if self.sender.try_send(job).is_err() {
            let total_dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
            log_warn!(
                total_dropped,
                "evaluation queue full, dropping job; alerting may miss samples"
            );
        }
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Spawns the background evaluation consumer and returns a producer handle.
/// Each job is scored, fed into the shared [`AlertTracker`], and an alert
/// that fires posts to the project's Slack webhook if one is configured.
pub fn spawn_evaluation_queue(
    max_in_flight: usize,
    alert_tracker: Arc<AlertTracker>,
    http: reqwest::Client,
) -> EvaluationQueue {
    let (sender, mut receiver) = mpsc::channel(max_in_flight);
    let dropped = Arc::new(AtomicU64::new(0));

    tokio::spawn(async move {
        while let Some(job) = receiver.recv().await {
            let result = evaluate_rule_set(&job.rule_set, &job.request_id, &job.input);
            if let Some(alert_cfg) = &job.rule_set.alert {
                if let Some(fired) =
                    alert_tracker.record(&job.rule_set.id, alert_cfg, result.passed)
                {
                    if let Some(webhook) = &job.slack_webhook {
                        let message = crate::gateway::slack::alert_message(
                            &job.rule_set.name,
                            &job.rule_set.project_id,
                            result.score,
                            fired.min_samples,
                            fired.pass_rate_threshold,
                        );
                        if let Err(e) = crate::gateway::slack::send(&http, webhook, &message).await
                        {
                            log_warn!(error = %e, "failed to post evaluation alert to slack");
                        }
                    }
                }
            }
        }
    });

    EvaluationQueue { sender, dropped }
}
