//! L10 Trace Replay Store: two bounded, id-keyed LRU arenas for agent-run
//! snapshots and replay modifications, plus replay + diff APIs.

use crate::gateway::model::{
    AgentRunSnapshot, ReplayModification, RequestSnapshot, ResponseSnapshot, RunStatus,
    StepSnapshot,
};
use std::collections::VecDeque;
use std::sync::Mutex;

struct Arena<T> {
    order: VecDeque<String>,
    items: std::collections::HashMap<String, T>,
    capacity: usize,
}

impl<T> Arena<T> {
    fn new(capacity: usize) -> Self {
        Self {
            order: VecDeque::new(),
            items: std::collections::HashMap::new(),
            capacity: capacity.max(1),
        }
    }

    fn put(&mut self, id: String, value: T) {
        if !self.items.contains_key(&id) {
            self.order.push_back(id.clone());
        }
        self.items.insert(id, value);
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.items.remove(&oldest);
            }
        }
    }

    fn get(&self, id: &str) -> Option<&T>
    where
        T: Clone,
    {
        self.items.get(id)
    }
}

/// Append-only, bounded store of agent-run snapshots and replay
/// modifications, keyed by id. Oldest entries are evicted on overflow
/// (fail-open per §7's snapshot-store policy).
pub struct TraceStore {
    snapshots: Mutex<Arena<AgentRunSnapshot>>,
    modifications: Mutex<Arena<ReplayModification>>,
}

impl TraceStore {
    pub fn new(snapshot_capacity: usize, modification_capacity: usize) -> Self {
        Self {
            snapshots: Mutex::new(Arena::new(snapshot_capacity)),
            modifications: Mutex::new(Arena::new(modification_capacity)),
        }
    }

    /// Appends one step to a run, creating the run if this is its first
    /// step. Step indices must be dense and monotonically increasing.
    pub fn append_step(
        &self,
        run_id: &str,
        project_id: &str,
        agent_name: &str,
        step: StepSnapshot,
    ) -> Result<(), String> {
        let mut snapshots = self.snapshots.lock().unwrap();
        let is_new_run = !snapshots.items.contains_key(run_id);
        let run = snapshots.items.entry(run_id.to_string()).or_insert_with(|| AgentRunSnapshot {
            run_id: run_id.to_string(),
            project_id: project_id.to_string(),
            agent_name: agent_name.to_string(),
            status: RunStatus::Running,
            steps: Vec::new(),
        });

        let expected_index = run.steps.len() as u32;
        if step.index != expected_index {
            return Err(format!(
                "step index {} is not dense/monotonic; expected {}",
                step.index, expected_index
            ));
        }
        run.steps.push(step);
        if is_new_run {
            snapshots.order.push_back(run_id.to_string());
        }
        while snapshots.order.len() > snapshots.capacity {
            if let Some(oldest) = snapshots.order.pop_front() {
                snapshots.items.remove(&oldest);
            }
        }
        Ok(())
    }

    pub fn finish_run(&self, run_id: &str, status: RunStatus) {
        let mut snapshots = self.snapshots.lock().unwrap();
        if let Some(run) = snapshots.items.get_mut(run_id) {
            run.status = status;
        }
    }

    pub fn get_snapshot(&self, run_id: &str) -> Option<AgentRunSnapshot> {
        self.snapshots.lock().unwrap().get(run_id).cloned()
    }

    pub fn put_modification(&self, run_id: &str, modification: ReplayModification) {
        self.modifications
            .lock()
            .unwrap()
            .put(run_id.to_string(), modification);
    }

    pub fn get_modification(&self, run_id: &str) -> Option<ReplayModification> {
        self.modifications.lock().unwrap().get(run_id).cloned()
    }

    /// Applies stored (or explicitly passed) modifications to the original
    /// run's final step request, producing the request that would be sent
    /// on replay.
    pub fn replay_context(
        &self,
        run_id: &str,
        modification: Option<&ReplayModification>,
    ) -> Option<RequestSnapshot> {
        let run = self.get_snapshot(run_id)?;
        let last_step = run.steps.last()?;
        let mut request = last_step.request.clone();
        let stored;
        let modification = match modification {
            Some(m) => m,
            None => {
                stored = self.get_modification(run_id).unwrap_or_default();
                &stored
            }
        };
        if let Some(messages) = &modification.messages {
            request.messages = messages.clone();
        }
        if let Some(tools) = &modification.tools {
            request.tools = Some(tools.clone());
        }
        if let Some(model) = &modification.model {
            request.model = model.clone();
        }
        if modification.temperature.is_some() {
            request.temperature = modification.temperature;
        }
        if modification.max_tokens.is_some() {
            request.max_tokens = modification.max_tokens;
        }
        if modification.top_p.is_some() {
            request.top_p = modification.top_p;
        }
        if let Some(tool_choice) = &modification.tool_choice {
            request.tool_choice = Some(tool_choice.clone());
        }
        if let Some(response_format) = &modification.response_format {
            request.response_format = Some(response_format.clone());
        }
        Some(request)
    }
}

/// Comparison between an original step and a replayed response, yielding a
/// single improvement score in `[-1, 1]`-ish territory.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ReplayComparison {
    pub cost_delta_pct: f64,
    pub success_delta: f64,
    pub latency_delta_pct: f64,
    pub improvement_score: f64,
}

/// `0.3*(-cost_delta_pct/100) + 0.4*success_delta +
///  0.2*clamp(-latency_delta/orig_latency, -1, 1) + 0.1*status_bonus`.
pub fn compare(original: &ResponseSnapshot, replayed: &ResponseSnapshot) -> ReplayComparison {
    let cost_delta_pct = if original.cost_usd > 0.0 {
        (replayed.cost_usd - original.cost_usd) / original.cost_usd * 100.0
    } else {
        0.0
    };
    let original_success = if original.error.is_none() { 1.0 } else { 0.0 };
    let replayed_success = if replayed.error.is_none() { 1.0 } else { 0.0 };
    let success_delta = replayed_success - original_success;

    let latency_delta_pct = if original.latency_ms > 0 {
        (replayed.latency_ms as f64 - original.latency_ms as f64) / original.latency_ms as f64
    } else {
        0.0
    };
    let clamped_latency_term = (-latency_delta_pct).clamp(-1.0, 1.0);

    let status_bonus = if replayed.error.is_none() && original.error.is_some() {
        1.0
    } else if replayed.error.is_some() && original.error.is_none() {
        -1.0
    } else {
        0.0
    };

    let improvement_score = 0.3 * (-cost_delta_pct / 100.0)
        + 0.4 * success_delta
        + 0.2 * clamped_latency_term
        + 0.1 * status_bonus;

    ReplayComparison {
        cost_delta_pct,
        success_delta,
        latency_delta_pct: latency_delta_pct * 100.0,
        improvement_score,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::model::CacheStatus;

    fn step(index: u32) -> StepSnapshot {
        StepSnapshot {
            index,
            request: RequestSnapshot {
                model: "gpt-4o-mini".to_string(),
                messages: serde_json::json!([]),
                tools: None,
                temperature: None,
                max_tokens: None,
                top_p: None,
                tool_choice: None,
                response_format: None,
            },
            response: ResponseSnapshot {
                content: Some("ok".to_string()),
                tool_calls: None,
                finish_reason: Some("stop".to_string()),
                prompt_tokens: 10,
                completion_tokens: 5,
                cost_usd: 0.001,
                latency_ms: 100,
                cached: CacheStatus::Miss,
                error: None,
            },
        }
    }

    #[test]
    fn step_indices_must_be_dense_and_monotonic() {
        let store = TraceStore::new(10, 10);
        assert!(store.append_step("run_1", "proj_1", "agent", step(0)).is_ok());
        assert!(store.append_step("run_1", "proj_1", "agent", step(2)).is_err());
        assert!(store.append_step("run_1", "proj_1", "agent", step(1)).is_ok());
    }

    #[test]
    fn snapshot_store_evicts_oldest_on_overflow() {
        let store = TraceStore::new(2, 10);
        store.append_step("run_1", "proj_1", "agent", step(0)).unwrap();
        store.append_step("run_2", "proj_1", "agent", step(0)).unwrap();
        store.append_step("run_3", "proj_1", "agent", step(0)).unwrap();
        assert!(store.get_snapshot("run_1").is_none());
        assert!(store.get_snapshot("run_3").is_some());
    }

    #[test]
    fn improvement_score_rewards_cheaper_faster_successful_replays() {
        let original = step(0).response;
        let mut replayed = step(0).response;
        replayed.cost_usd = 0.0005;
        replayed.latency_ms = 50;
        let comparison = compare(&original, &replayed);
        assert!(comparison.improvement_score > 0.0);
    }
}
