//! Menu-presence oracle.
//!
//! External collaborator consulted only for corners flagged
//! `requires_menu_data`. The HTTP implementation is wrapped in a bounded,
//! time-expiring cache: TTL plus capacity-bounded eviction of the
//! least-recently-inserted entry (insertion order, not LRU-by-access).

use crate::error::QueryError;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(600);
pub const DEFAULT_CACHE_CAPACITY: usize = 512;

#[async_trait]
pub trait MenuOracle: Send + Sync {
    async fn has_menu(
        &self,
        restaurant_id: &str,
        corner_id: &str,
        date: NaiveDate,
    ) -> Result<bool, QueryError>;
}

#[derive(Deserialize)]
struct MenuPresenceResponse {
    exists: bool,
}

/// Queries the menu service over HTTP.
pub struct HttpMenuOracle {
    base_url: String,
    client: reqwest::Client,
}

impl HttpMenuOracle {
    pub fn new(base_url: impl Into<String>) -> Result<Self, QueryError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| QueryError::SourceUnavailable(e.to_string()))?;
        Ok(Self {
            base_url: base_url.into(),
            client,
        })
    }
}

#[async_trait]
impl MenuOracle for HttpMenuOracle {
    async fn has_menu(
        &self,
        restaurant_id: &str,
        corner_id: &str,
        date: NaiveDate,
    ) -> Result<bool, QueryError> {
        let url = format!(
            "{}/restaurants/{}/corners/{}/menus/{}",
            self.base_url,
            restaurant_id,
            corner_id,
            date.format("%Y-%m-%d"),
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| QueryError::SourceUnavailable(format!("menu service: {e}")))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(false);
        }
        if !response.status().is_success() {
            return Err(QueryError::SourceUnavailable(format!(
                "menu service returned {}",
                response.status()
            )));
        }

        let body: MenuPresenceResponse = response
            .json()
            .await
            .map_err(|e| QueryError::SourceUnavailable(format!("menu service: {e}")))?;
        Ok(body.exists)
    }
}

type MenuKey = (String, String, NaiveDate);

struct CacheState {
    entries: HashMap<MenuKey, (Instant, bool)>,
    insertion_order: VecDeque<MenuKey>,
}

/// TTL + capacity-bounded cache over any oracle. Multiple concurrent
/// requests may race on eviction, hence the mutex around insert/evict/read.
pub struct CachedMenuOracle<O> {
    inner: O,
    ttl: Duration,
    capacity: usize,
    state: Mutex<CacheState>,
}

impl<O: MenuOracle> CachedMenuOracle<O> {
    pub fn new(inner: O) -> Self {
        Self::with_limits(inner, DEFAULT_CACHE_TTL, DEFAULT_CACHE_CAPACITY)
    }

    pub fn with_limits(inner: O, ttl: Duration, capacity: usize) -> Self {
        Self {
            inner,
            ttl,
            capacity: capacity.max(1),
            state: Mutex::new(CacheState {
                entries: HashMap::new(),
                insertion_order: VecDeque::new(),
            }),
        }
    }

    fn cached(&self, key: &MenuKey) -> Option<bool> {
        let state = self.state.lock().expect("menu cache lock poisoned");
        state
            .entries
            .get(key)
            .filter(|(inserted, _)| inserted.elapsed() < self.ttl)
            .map(|(_, present)| *present)
    }

    fn insert(&self, key: MenuKey, present: bool) {
        let mut state = self.state.lock().expect("menu cache lock poisoned");
        // Refreshes of an existing key overwrite in place; only new keys
        // need room made for them.
        if !state.entries.contains_key(&key) {
            while state.entries.len() >= self.capacity {
                match state.insertion_order.pop_front() {
                    Some(oldest) => {
                        state.entries.remove(&oldest);
                    }
                    None => break,
                }
            }
        }
        if state.entries.insert(key.clone(), (Instant::now(), present)).is_none() {
            state.insertion_order.push_back(key);
        }
    }
}

#[async_trait]
impl<O: MenuOracle> MenuOracle for CachedMenuOracle<O> {
    async fn has_menu(
        &self,
        restaurant_id: &str,
        corner_id: &str,
        date: NaiveDate,
    ) -> Result<bool, QueryError> {
        let key = (restaurant_id.to_string(), corner_id.to_string(), date);
        if let Some(present) = self.cached(&key) {
            return Ok(present);
        }
        let present = self.inner.has_menu(restaurant_id, corner_id, date).await?;
        self.insert(key, present);
        Ok(present)
    }
}

/// Fixed oracle for tests and for running without a menu service.
#[derive(Default)]
pub struct StaticMenuOracle {
    present: HashSet<(String, String)>,
    default_present: bool,
}

impl StaticMenuOracle {
    /// Reports a menu present for every corner.
    pub fn all_present() -> Self {
        Self {
            present: HashSet::new(),
            default_present: true,
        }
    }

    pub fn with_menu(mut self, restaurant_id: &str, corner_id: &str) -> Self {
        self.present
            .insert((restaurant_id.to_string(), corner_id.to_string()));
        self
    }
}

#[async_trait]
impl MenuOracle for StaticMenuOracle {
    async fn has_menu(
        &self,
        restaurant_id: &str,
        corner_id: &str,
        _date: NaiveDate,
    ) -> Result<bool, QueryError> {
        Ok(self.default_present
            || self
                .present
                .contains(&(restaurant_id.to_string(), corner_id.to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingOracle(AtomicUsize);

    #[async_trait]
    impl MenuOracle for CountingOracle {
        async fn has_menu(&self, _r: &str, c: &str, _d: NaiveDate) -> Result<bool, QueryError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(c == "western")
        }
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 4).unwrap()
    }

    #[tokio::test]
    async fn cache_hits_skip_the_inner_oracle() {
        let oracle = CachedMenuOracle::new(CountingOracle(AtomicUsize::new(0)));
        assert!(oracle.has_menu("hall", "western", date()).await.unwrap());
        assert!(oracle.has_menu("hall", "western", date()).await.unwrap());
        assert_eq!(oracle.inner.0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn eviction_drops_the_oldest_insertion() {
        let oracle = CachedMenuOracle::with_limits(
            CountingOracle(AtomicUsize::new(0)),
            Duration::from_secs(600),
            2,
        );
        oracle.has_menu("hall", "a", date()).await.unwrap();
        oracle.has_menu("hall", "b", date()).await.unwrap();
        // Re-reading "a" does not refresh its insertion position.
        oracle.has_menu("hall", "a", date()).await.unwrap();
        assert_eq!(oracle.inner.0.load(Ordering::SeqCst), 2);

        // Third distinct key evicts "a", the least-recently-inserted.
        oracle.has_menu("hall", "c", date()).await.unwrap();
        oracle.has_menu("hall", "a", date()).await.unwrap();
        assert_eq!(oracle.inner.0.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn refreshing_an_expired_entry_keeps_the_working_set() {
        let oracle = CachedMenuOracle::with_limits(
            CountingOracle(AtomicUsize::new(0)),
            Duration::from_millis(0), // every entry expires immediately
            2,
        );
        oracle.has_menu("hall", "a", date()).await.unwrap();
        oracle.has_menu("hall", "b", date()).await.unwrap();
        // The expired refresh of "b" overwrites in place; "a" stays cached.
        oracle.has_menu("hall", "b", date()).await.unwrap();

        let state = oracle.state.lock().unwrap();
        assert_eq!(state.entries.len(), 2);
        assert_eq!(state.insertion_order.len(), 2);
    }

    #[tokio::test]
    async fn expired_entries_are_refetched() {
        let oracle = CachedMenuOracle::with_limits(
            CountingOracle(AtomicUsize::new(0)),
            Duration::from_millis(0),
            8,
        );
        oracle.has_menu("hall", "western", date()).await.unwrap();
        oracle.has_menu("hall", "western", date()).await.unwrap();
        assert_eq!(oracle.inner.0.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn static_oracle_defaults() {
        let oracle = StaticMenuOracle::default().with_menu("hall", "western");
        assert!(oracle.has_menu("hall", "western", date()).await.unwrap());
        assert!(!oracle.has_menu("hall", "ramen", date()).await.unwrap());
        assert!(
            StaticMenuOracle::all_present()
                .has_menu("hall", "ramen", date())
                .await
                .unwrap()
        );
    }
}
