//! The daily usage gate.
//!
//! Consulted before any AI-backed operation. The counter lives in the
//! store keyed by (user, calendar day), so it resets implicitly at
//! midnight UTC. The gate is the sole writer of the counter, and the
//! underlying store increment is a single conditional statement — two
//! concurrent requests at `limit - 1` cannot both pass.
//!
//! A store failure is returned as an error: the gate fails closed.
//! Callers of purely cosmetic operations may catch it and proceed with a
//! fallback payload instead; that choice belongs to the caller.

use reframe_core::error::StoreError;
use reframe_core::store::usage_date_today;
use reframe_core::Store;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateDecision {
    pub allowed: bool,
    pub remaining: u32,
}

pub struct UsageGate {
    store: Arc<dyn Store>,
    limit: u32,
}

impl UsageGate {
    pub fn new(store: Arc<dyn Store>, limit: u32) -> Self {
        Self { store, limit }
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Consume one unit of today's allowance, if any remains.
    pub async fn check_and_consume(&self, user_id: &str) -> Result<GateDecision, StoreError> {
        let decision = self
            .store
            .try_consume_usage(user_id, usage_date_today(), self.limit)
            .await?;

        let remaining = self.limit.saturating_sub(decision.count);
        debug!(
            user_id,
            allowed = decision.allowed,
            remaining,
            "Usage gate decision"
        );

        Ok(GateDecision {
            allowed: decision.allowed,
            remaining: if decision.allowed { remaining } else { 0 },
        })
    }

    /// Today's remaining allowance, without consuming.
    pub async fn peek(&self, user_id: &str) -> Result<u32, StoreError> {
        let count = self
            .store
            .usage_count(user_id, usage_date_today())
            .await?;
        Ok(self.limit.saturating_sub(count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reframe_store::InMemoryStore;

    #[tokio::test]
    async fn gate_allows_until_ceiling_then_denies() {
        let gate = UsageGate::new(Arc::new(InMemoryStore::new()), 3);

        for expected_remaining in [2, 1, 0] {
            let decision = gate.check_and_consume("kid").await.unwrap();
            assert!(decision.allowed);
            assert_eq!(decision.remaining, expected_remaining);
        }

        // Ceiling reached: denied, remaining pinned at zero, counter stable.
        for _ in 0..2 {
            let decision = gate.check_and_consume("kid").await.unwrap();
            assert!(!decision.allowed);
            assert_eq!(decision.remaining, 0);
        }
        assert_eq!(gate.peek("kid").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn gate_tracks_users_independently() {
        let gate = UsageGate::new(Arc::new(InMemoryStore::new()), 1);

        assert!(gate.check_and_consume("a").await.unwrap().allowed);
        assert!(!gate.check_and_consume("a").await.unwrap().allowed);
        assert!(gate.check_and_consume("b").await.unwrap().allowed);
    }

    #[tokio::test]
    async fn peek_does_not_consume() {
        let gate = UsageGate::new(Arc::new(InMemoryStore::new()), 5);
        assert_eq!(gate.peek("kid").await.unwrap(), 5);
        assert_eq!(gate.peek("kid").await.unwrap(), 5);
        gate.check_and_consume("kid").await.unwrap();
        assert_eq!(gate.peek("kid").await.unwrap(), 4);
    }
}
