//! In-process cache store
//!
//! Records values and set members together with the TTL they were written
//! with. Expiry is not simulated; callers inspect the TTL instead.

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::time::Duration;
use tokio::sync::Mutex;

use super::CacheStore;
use crate::error::PipelineError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CachedValue {
    Text(String),
    Set(BTreeSet<String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub value: CachedValue,
    pub ttl: Duration,
}

#[derive(Debug, Default)]
struct State {
    entries: BTreeMap<String, CacheEntry>,
    failing_keys: HashSet<String>,
    writes: usize,
}

#[derive(Debug, Default)]
pub struct MemoryCache {
    state: Mutex<State>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following write to `key` fail.
    pub async fn fail_writes_to(&self, key: &str) {
        self.state.lock().await.failing_keys.insert(key.to_string());
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        match self.state.lock().await.entries.get(key) {
            Some(CacheEntry {
                value: CachedValue::Text(text),
                ..
            }) => Some(text.clone()),
            _ => None,
        }
    }

    pub async fn ttl(&self, key: &str) -> Option<Duration> {
        self.state.lock().await.entries.get(key).map(|e| e.ttl)
    }

    pub async fn set_members(&self, key: &str) -> BTreeSet<String> {
        match self.state.lock().await.entries.get(key) {
            Some(CacheEntry {
                value: CachedValue::Set(members),
                ..
            }) => members.clone(),
            _ => BTreeSet::new(),
        }
    }

    pub async fn keys(&self) -> Vec<String> {
        self.state.lock().await.entries.keys().cloned().collect()
    }

    /// Number of successful write operations so far.
    pub async fn write_count(&self) -> usize {
        self.state.lock().await.writes
    }

    pub async fn snapshot(&self) -> BTreeMap<String, CacheEntry> {
        self.state.lock().await.entries.clone()
    }
}

fn rejected(key: &str) -> PipelineError {
    PipelineError::CacheWrite {
        key: key.to_string(),
        reason: "write rejected".to_string(),
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn set_with_expiry(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<(), PipelineError> {
        let mut state = self.state.lock().await;
        if state.failing_keys.contains(key) {
            return Err(rejected(key));
        }
        state.entries.insert(
            key.to_string(),
            CacheEntry {
                value: CachedValue::Text(value.to_string()),
                ttl,
            },
        );
        state.writes += 1;
        Ok(())
    }

    async fn add_to_set_with_expiry(
        &self,
        key: &str,
        member: &str,
        ttl: Duration,
    ) -> Result<(), PipelineError> {
        let mut state = self.state.lock().await;
        if state.failing_keys.contains(key) {
            return Err(rejected(key));
        }
        let entry = state.entries.entry(key.to_string()).or_insert(CacheEntry {
            value: CachedValue::Set(BTreeSet::new()),
            ttl,
        });
        match &mut entry.value {
            CachedValue::Set(members) => {
                members.insert(member.to_string());
            }
            CachedValue::Text(_) => {
                return Err(PipelineError::CacheWrite {
                    key: key.to_string(),
                    reason: "WRONGTYPE key holds a string value".to_string(),
                })
            }
        }
        entry.ttl = ttl;
        state.writes += 1;
        Ok(())
    }
}
