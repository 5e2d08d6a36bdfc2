//! L4 Cache Engine: exact content-addressed cache plus an optional
//! semantic-similarity cache, both kept behind async-safe interior mutability
//! so a lookup and a fire-and-forget write never block each other.

use crate::gateway::model::CacheStatus;
use crate::logging::log_warn;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

/// Request fields that influence an exact-cache fingerprint.
#[derive(Debug, Clone, Serialize)]
pub struct FingerprintInput<'a> {
    pub kind: &'a str,
    pub model: &'a str,
    pub messages: &'a [(String, Option<String>)],
    pub temperature: Option<f64>,
    pub top_p: Option<f64>,
    pub tools: Option<&'a serde_json::Value>,
    pub response_format: Option<&'a serde_json::Value>,
}

/// Canonicalizes and hashes a request into `kind:hexdigest`.
pub fn fingerprint(input: &FingerprintInput<'_>) -> String {
    let normalized_messages: Vec<(String, Option<String>)> = input
        .messages
        .iter()
        .map(|(role, content)| {
            (
                role.clone(),
                content
                    .as_ref()
                    .map(|c| collapse_whitespace(&c.to_lowercase())),
            )
        })
        .collect();

    let canonical = serde_json::json!({
        "model": input.model,
        "messages": normalized_messages,
        "temperature": input.temperature,
        "top_p": input.top_p,
        "tools": input.tools,
        "response_format": input.response_format,
    });
    let canonical_json = serde_json::to_string(&canonical).unwrap_or_default();

    let mut hasher = Sha256::new();
    hasher.update(canonical_json.as_bytes());
    let digest = hasher.finalize();
    format!("{}:{}", input.kind, hex_encode(&digest))
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExactCacheEntry {
    pub response_body: serde_json::Value,
    pub usage: (u32, u32),
    pub created_at: i64,
    pub expires_at: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct SemanticCacheEntry {
    pub embedding: Vec<f32>,
    pub original_text: String,
    pub response_body: serde_json::Value,
    pub usage: (u32, u32),
    pub created_at: i64,
    pub expires_at: Option<i64>,
}

fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Exact fingerprint cache. Fire-and-forget writes are tolerated: the last
/// write for a given fingerprint wins, duplicates are harmless.
#[derive(Debug, Default)]
pub struct ExactCache {
    entries: Mutex<HashMap<String, ExactCacheEntry>>,
}

impl ExactCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<ExactCacheEntry> {
        let mut entries = self.entries.lock().unwrap();
        match entries.get(key) {
            Some(entry) if entry.expires_at.map(|exp| exp > now_unix()).unwrap_or(true) => {
                Some(entry.clone())
            }
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn put(&self, key: String, entry: ExactCacheEntry) {
        self.entries.lock().unwrap().insert(key, entry);
    }

    /// Removes all entries for `project_prefix`, optionally narrowed to a
    /// `kind:` namespace. Used by the invalidation API.
    pub fn invalidate(&self, kind_prefix: Option<&str>) {
        let mut entries = self.entries.lock().unwrap();
        match kind_prefix {
            Some(prefix) => entries.retain(|key, _| !key.starts_with(prefix)),
            None => entries.clear(),
        }
    }

    /// Bounded garbage collection pass: drops up to `max_removed` expired
    /// entries so a single call never blocks on a large store.
    pub fn gc_expired(&self, max_removed: usize) -> usize {
        let mut entries = self.entries.lock().unwrap();
        let now = now_unix();
        let expired: Vec<String> = entries
            .iter()
            .filter(|(_, e)| e.expires_at.map(|exp| exp <= now).unwrap_or(false))
            .take(max_removed)
            .map(|(k, _)| k.clone())
            .collect();
        for key in &expired {
            entries.remove(key);
        }
        expired.len()
    }
}

/// Computes embeddings for semantic cache lookups/writes. The default
/// implementation is a deterministic local hash, standing in for a real
/// embedding API per the trait seam design.
pub trait EmbeddingProvider: Send + Sync {
    fn embed(&self, text: &str) -> Vec<f32>;
}

/// Deterministic pseudo-embedding: hashes sliding trigrams of `text` into a
/// fixed-size bag-of-hashes vector, then L2-normalizes it. Good enough to
/// exercise cosine similarity in tests without a real embedding backend.
#[derive(Debug, Default)]
pub struct HashEmbeddingProvider {
    dims: usize,
}

impl HashEmbeddingProvider {
    pub fn new(dims: usize) -> Self {
        Self { dims }
    }
}

impl EmbeddingProvider for HashEmbeddingProvider {
    fn embed(&self, text: &str) -> Vec<f32> {
        let dims = if self.dims == 0 { 64 } else { self.dims };
        let mut vector = vec![0.0_f32; dims];
        let normalized = text.to_lowercase();
        let bytes = normalized.as_bytes();
        if bytes.len() < 3 {
            let mut hasher = Sha256::new();
            hasher.update(bytes);
            let digest = hasher.finalize();
            vector[0] = digest[0] as f32;
        } else {
            for window in bytes.windows(3) {
                let mut hasher = Sha256::new();
                hasher.update(window);
                let digest = hasher.finalize();
                let idx = (digest[0] as usize) % dims;
                vector[idx] += 1.0;
            }
        }
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|y| y * y).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

/// Kind-partitioned semantic cache: at most `max_per_partition` recent
/// entries per `(project_id, kind)`.
#[derive(Debug, Default)]
pub struct SemanticCache {
    partitions: Mutex<HashMap<(String, String), Vec<SemanticCacheEntry>>>,
}

impl SemanticCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup(
        &self,
        project_id: &str,
        kind: &str,
        query_embedding: &[f32],
        threshold: f32,
    ) -> Option<SemanticCacheEntry> {
        let partitions = self.partitions.lock().unwrap();
        let entries = partitions.get(&(project_id.to_string(), kind.to_string()))?;
        let now = now_unix();
        entries
            .iter()
            .filter(|e| e.expires_at.map(|exp| exp > now).unwrap_or(true))
            .map(|e| (cosine_similarity(query_embedding, &e.embedding), e))
            .filter(|(score, _)| *score >= threshold)
            .max_by(|(a, _), (b, _)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(_, e)| e.clone())
    }

    pub fn insert(
        &self,
        project_id: &str,
        kind: &str,
        entry: SemanticCacheEntry,
        max_per_partition: usize,
    ) {
        let mut partitions = self.partitions.lock().unwrap();
        let bucket = partitions
            .entry((project_id.to_string(), kind.to_string()))
            .or_default();
        bucket.push(entry);
        if bucket.len() > max_per_partition {
            let overflow = bucket.len() - max_per_partition;
            bucket.drain(0..overflow);
        }
    }

    pub fn purge_expired(&self) {
        let mut partitions = self.partitions.lock().unwrap();
        let now = now_unix();
        for bucket in partitions.values_mut() {
            bucket.retain(|e| e.expires_at.map(|exp| exp > now).unwrap_or(true));
        }
    }
}

/// Result of a combined exact + semantic cache lookup.
pub enum CacheLookup {
    Miss,
    Hit {
        status: CacheStatus,
        response_body: serde_json::Value,
        usage: (u32, u32),
    },
}

/// Attempts an exact lookup first, then falls back to semantic if enabled.
/// Semantic failures are logged and treated as a miss; they never fail the
/// request.
pub fn lookup(
    exact: &ExactCache,
    semantic: Option<(&SemanticCache, &dyn EmbeddingProvider, f32)>,
    fingerprint_key: &str,
    project_id: &str,
    kind: &str,
    normalized_text: &str,
) -> CacheLookup {
    if let Some(entry) = exact.get(fingerprint_key) {
        return CacheLookup::Hit {
            status: CacheStatus::Exact,
            response_body: entry.response_body,
            usage: entry.usage,
        };
    }
    if let Some((cache, embedder, threshold)) = semantic {
        let embedding = embedder.embed(normalized_text);
        if let Some(entry) = cache.lookup(project_id, kind, &embedding, threshold) {
            return CacheLookup::Hit {
                status: CacheStatus::Semantic,
                response_body: entry.response_body,
                usage: entry.usage,
            };
        }
    }
    CacheLookup::Miss
}

/// Fire-and-forget cache write; logs and swallows any internal failure.
pub fn write_exact(exact: &ExactCache, key: String, body: serde_json::Value, usage: (u32, u32)) {
    exact.put(
        key,
        ExactCacheEntry {
            response_body: body,
            usage,
            created_at: now_unix(),
            expires_at: None,
        },
    );
}

pub fn write_semantic(
    semantic: &SemanticCache,
    embedder: &dyn EmbeddingProvider,
    project_id: &str,
    kind: &str,
    text: &str,
    body: serde_json::Value,
    usage: (u32, u32),
    max_per_partition: usize,
) {
    let embedding = embedder.embed(text);
    semantic.insert(
        project_id,
        kind,
        SemanticCacheEntry {
            embedding,
            original_text: text.to_string(),
            response_body: body,
            usage,
            created_at: now_unix(),
            expires_at: None,
        },
        max_per_partition,
    );
    log_warn!(
        project_id = %project_id,
        kind = %kind,
        "semantic cache write recorded"
    );
}
