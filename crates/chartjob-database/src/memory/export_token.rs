//! In-memory export token store.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;

use chartjob_core::result::AppResult;
use chartjob_entity::token::ExportToken;

use crate::repositories::export_token::generate_token;
use crate::store::ExportTokenStore;

/// Token store backed by a [`DashMap`]. Counts revocations per token so
/// callers can check that a token was destroyed exactly once.
#[derive(Debug, Clone, Default)]
pub struct MemoryTokenStore {
    tokens: Arc<DashMap<String, ExportToken>>,
    destroyed: Arc<DashMap<String, u32>>,
}

impl MemoryTokenStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a token is currently live.
    pub fn contains(&self, token: &str) -> bool {
        self.tokens.contains_key(token)
    }

    /// Number of live tokens.
    pub fn live_count(&self) -> usize {
        self.tokens.len()
    }

    /// How many times `destroy` was called for a token.
    pub fn destroy_count(&self, token: &str) -> u32 {
        self.destroyed.get(token).map(|count| *count).unwrap_or(0)
    }

    /// Tokens ever passed to `destroy`.
    pub fn destroyed_tokens(&self) -> Vec<String> {
        self.destroyed.iter().map(|entry| entry.key().clone()).collect()
    }
}

#[async_trait]
impl ExportTokenStore for MemoryTokenStore {
    async fn create(&self, chart_id: &str, user_id: i64) -> AppResult<ExportToken> {
        let token = ExportToken {
            token: generate_token(),
            chart_id: chart_id.to_string(),
            user_id,
            created_at: Utc::now(),
        };
        self.tokens.insert(token.token.clone(), token.clone());
        Ok(token)
    }

    async fn destroy(&self, token: &str) -> AppResult<bool> {
        *self.destroyed.entry(token.to_string()).or_insert(0) += 1;
        Ok(self.tokens.remove(token).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_destroy_counts_calls() {
        let store = MemoryTokenStore::new();
        let token = store.create("abc12", 7).await.unwrap();
        assert!(store.contains(&token.token));

        assert!(store.destroy(&token.token).await.unwrap());
        assert!(!store.destroy(&token.token).await.unwrap());
        assert_eq!(store.destroy_count(&token.token), 2);
        assert_eq!(store.live_count(), 0);
    }
}
