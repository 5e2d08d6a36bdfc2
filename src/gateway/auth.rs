//! L1 Key/Project Resolver: opaque bearer token -> project + plan, backed by
//! a short-TTL cache in front of a project directory.

use crate::gateway::error::GatewayError;
use crate::gateway::model::{ApiKey, Project};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Stands in for Supabase as the system of record for keys and projects.
#[async_trait]
pub trait ProjectDirectory: Send + Sync {
    async fn lookup_key(&self, token: &str) -> Option<(ApiKey, Project)>;
    async fn touch_last_used(&self, project_id: &str);
}

/// In-memory stub directory, seeded at construction.
#[derive(Debug, Default)]
pub struct InMemoryProjectDirectory {
    keys: DashMap<String, (ApiKey, Project)>,
}

impl InMemoryProjectDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, key: ApiKey, project: Project) {
        self.keys.insert(key.token.clone(), (key, project));
    }
}

#[async_trait]
impl ProjectDirectory for InMemoryProjectDirectory {
    async fn lookup_key(&self, token: &str) -> Option<(ApiKey, Project)> {
        self.keys.get(token).map(|entry| entry.value().clone())
    }

    async fn touch_last_used(&self, _project_id: &str) {
        // best-effort, no-op for the in-memory stand-in
    }
}

struct CacheEntry {
    key: ApiKey,
    project: Project,
    cached_at: Instant,
}

/// Resolved identity of an authenticated request.
#[derive(Debug, Clone)]
pub struct ResolvedIdentity {
    pub project: Project,
    pub key_prefix: String,
}

/// Short-TTL cache in front of a [`ProjectDirectory`]. Misses are fatal
/// (fail closed): auth never admits on an unreachable directory.
pub struct KeyResolver {
    directory: Arc<dyn ProjectDirectory>,
    cache: DashMap<String, CacheEntry>,
    ttl: Duration,
}

const DEFAULT_TTL: Duration = Duration::from_secs(60);

impl KeyResolver {
    pub fn new(directory: Arc<dyn ProjectDirectory>) -> Self {
        Self {
            directory,
            cache: DashMap::new(),
            ttl: DEFAULT_TTL,
        }
    }

    pub fn with_ttl(directory: Arc<dyn ProjectDirectory>, ttl: Duration) -> Self {
        Self {
            directory,
            cache: DashMap::new(),
            ttl,
        }
    }

    pub async fn resolve(&self, bearer_token: &str) -> Result<ResolvedIdentity, GatewayError> {
        if let Some(entry) = self.cache.get(bearer_token) {
            if entry.cached_at.elapsed() < self.ttl && entry.key.is_active {
                return Ok(ResolvedIdentity {
                    project: entry.project.clone(),
                    key_prefix: entry.key.key_prefix.clone(),
                });
            }
        }

        let Some((key, project)) = self.directory.lookup_key(bearer_token).await else {
            return Err(GatewayError::unauthorized("invalid API key"));
        };
        if !key.is_active {
            return Err(GatewayError::unauthorized("API key has been revoked"));
        }

        let identity = ResolvedIdentity {
            project: project.clone(),
            key_prefix: key.key_prefix.clone(),
        };
        self.cache.insert(
            bearer_token.to_string(),
            CacheEntry {
                key,
                project,
                cached_at: Instant::now(),
            },
        );

        let directory = Arc::clone(&self.directory);
        let project_id = identity.project.id.clone();
        tokio::spawn(async move {
            directory.touch_last_used(&project_id).await;
        });

        Ok(identity)
    }
}

/// Extracts and validates the `Authorization: Bearer <token>` header.
pub fn extract_bearer_token(headers: &axum::http::HeaderMap) -> Result<&str, GatewayError> {
    let value = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| GatewayError::unauthorized("missing Authorization header"))?;
    value
        .strip_prefix("Bearer ")
        .filter(|token| !token.is_empty())
        .ok_or_else(|| GatewayError::unauthorized("Authorization header must be a Bearer token"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::model::Plan;

    fn seeded_resolver() -> KeyResolver {
        let directory = Arc::new(InMemoryProjectDirectory::new());
        directory.seed(
            ApiKey {
                token: "sk-live-abc".to_string(),
                key_prefix: "sk-live-ab".to_string(),
                project_id: "proj_1".to_string(),
                is_active: true,
            },
            Project {
                id: "proj_1".to_string(),
                owner: "owner_1".to_string(),
                plan: Plan::Starter,
                ab_config: None,
            },
        );
        KeyResolver::new(directory)
    }

    #[tokio::test]
    async fn unknown_token_is_rejected() {
        let resolver = seeded_resolver();
        let result = resolver.resolve("sk-unknown").await;
        assert!(matches!(result, Err(GatewayError::Unauthorized { .. })));
    }

    #[tokio::test]
    async fn known_token_resolves_project_and_caches() {
        let resolver = seeded_resolver();
        let identity = resolver.resolve("sk-live-abc").await.unwrap();
        assert_eq!(identity.project.id, "proj_1");
        assert_eq!(identity.key_prefix, "sk-live-ab");
        // second call should hit the cache and still succeed
        let identity2 = resolver.resolve("sk-live-abc").await.unwrap();
        assert_eq!(identity2.project.id, "proj_1");
    }
}
