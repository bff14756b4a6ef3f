//! Admission controller.

use crate::{categories, AdmissionError, RateLimit, SystemTimeProvider, TimeProvider};
use companion_storage::{DurableStore, StorageKeys, StorageResult};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

/// Lock shared by every category outside the fixed table, keeping the lock
/// map bounded however many category names the host sends.
const UNLISTED_LOCK_KEY: &str = "*";

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The call may proceed and has been recorded.
    Allowed,
    /// The call must wait; nothing was recorded.
    Denied {
        /// Seconds until a slot frees up (at least 1).
        wait_seconds: u64,
    },
}

impl Admission {
    /// Whether the call may proceed.
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }

    /// Convert a denial into [`AdmissionError::RateLimitExceeded`].
    pub fn into_result(self, category: &str) -> Result<(), AdmissionError> {
        match self {
            Self::Allowed => Ok(()),
            Self::Denied { wait_seconds } => Err(AdmissionError::RateLimitExceeded {
                category: category.to_string(),
                wait_seconds,
            }),
        }
    }
}

/// Sliding-window rate limiter backed by durable storage.
pub struct AdmissionController {
    store: Arc<dyn DurableStore>,
    clock: Arc<dyn TimeProvider>,
    category_locks: RwLock<HashMap<String, Arc<Mutex<()>>>>,
}

impl AdmissionController {
    /// Create a controller using wall-clock time.
    pub fn new(store: Arc<dyn DurableStore>) -> Self {
        Self::with_clock(store, Arc::new(SystemTimeProvider))
    }

    /// Create a controller with an injected time source.
    pub fn with_clock(store: Arc<dyn DurableStore>, clock: Arc<dyn TimeProvider>) -> Self {
        Self {
            store,
            clock,
            category_locks: RwLock::new(HashMap::new()),
        }
    }

    /// Decide whether a call in `category` may proceed, recording it if so.
    ///
    /// Rejected calls are never recorded. Storage failures admit the call.
    pub async fn check_and_record(&self, category: &str) -> Admission {
        let lock = self.category_lock(category).await;
        let _guard = lock.lock().await;

        let limit = RateLimit::for_category(category);
        let key = StorageKeys::rate_limit(category);

        let mut timestamps = match self.load(&key).await {
            Ok(timestamps) => timestamps,
            Err(e) => {
                warn!(category = %category, error = %e, "Rate limit state unreadable, allowing call");
                return Admission::Allowed;
            }
        };

        let now = self.clock.now_unix_ms();
        prune(&mut timestamps, now, &limit);

        if timestamps.len() >= limit.max_calls {
            let wait_seconds = wait_seconds(&timestamps, now, &limit);
            warn!(
                category = %category,
                calls = timestamps.len(),
                max = limit.max_calls,
                wait_seconds,
                "Rate limit exceeded"
            );
            return Admission::Denied { wait_seconds };
        }

        timestamps.push(now);
        if let Err(e) = self.store.set_one(&key, serde_json::json!(timestamps)).await {
            warn!(category = %category, error = %e, "Failed to record call, allowing anyway");
            return Admission::Allowed;
        }

        debug!(
            category = %category,
            calls = timestamps.len(),
            max = limit.max_calls,
            "Call admitted"
        );
        Admission::Allowed
    }

    /// Number of calls currently counted against `category`, without recording.
    pub async fn recorded_count(&self, category: &str) -> StorageResult<usize> {
        let lock = self.category_lock(category).await;
        let _guard = lock.lock().await;

        let limit = RateLimit::for_category(category);
        let mut timestamps = self.load(&StorageKeys::rate_limit(category)).await?;
        prune(&mut timestamps, self.clock.now_unix_ms(), &limit);
        Ok(timestamps.len())
    }

    /// Get or create the mutex guarding one category's window.
    async fn category_lock(&self, category: &str) -> Arc<Mutex<()>> {
        let category = lock_key(category);
        {
            let locks = self.category_locks.read().await;
            if let Some(lock) = locks.get(category) {
                return lock.clone();
            }
        }

        let mut locks = self.category_locks.write().await;
        locks
            .entry(category.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    async fn load(&self, key: &str) -> StorageResult<Vec<u64>> {
        let value = match self.store.get_one(key).await? {
            Some(value) => value,
            None => return Ok(Vec::new()),
        };

        match serde_json::from_value::<Vec<u64>>(value) {
            Ok(timestamps) => Ok(timestamps),
            Err(e) => {
                // Unparseable state is replaced on the next recorded call.
                warn!(key = %key, error = %e, "Discarding malformed rate window");
                Ok(Vec::new())
            }
        }
    }
}

fn lock_key(category: &str) -> &str {
    match category {
        categories::CHAT_COMPLETION | categories::FETCH_MODELS => category,
        _ => UNLISTED_LOCK_KEY,
    }
}

/// Drop timestamps older than `now - window`.
fn prune(timestamps: &mut Vec<u64>, now: u64, limit: &RateLimit) {
    let cutoff = now.saturating_sub(limit.window_ms());
    timestamps.retain(|&t| t >= cutoff);
}

/// Seconds until the oldest counted call leaves the window, rounded up.
fn wait_seconds(timestamps: &[u64], now: u64, limit: &RateLimit) -> u64 {
    let oldest = timestamps.iter().copied().min().unwrap_or(now);
    let elapsed = now.saturating_sub(oldest);
    let remaining_ms = limit.window_ms().saturating_sub(elapsed);
    remaining_ms.div_ceil(1000).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::categories::{CHAT_COMPLETION, FETCH_MODELS};
    use async_trait::async_trait;
    use companion_storage::{JsonFileStore, MemoryStore, StorageError};
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::Duration;
    use tempfile::tempdir;

    /// Clock that only moves when told to.
    struct ManualClock {
        now_ms: AtomicU64,
    }

    impl ManualClock {
        fn at(now_ms: u64) -> Arc<Self> {
            Arc::new(Self {
                now_ms: AtomicU64::new(now_ms),
            })
        }

        fn set(&self, now_ms: u64) {
            self.now_ms.store(now_ms, Ordering::SeqCst);
        }
    }

    impl TimeProvider for ManualClock {
        fn now_unix_ms(&self) -> u64 {
            self.now_ms.load(Ordering::SeqCst)
        }
    }

    /// Store that fails reads or writes on demand.
    struct FailingStore {
        fail_get: bool,
        fail_set: bool,
        inner: MemoryStore,
    }

    #[async_trait]
    impl DurableStore for FailingStore {
        async fn get(&self, keys: &[&str]) -> StorageResult<HashMap<String, Value>> {
            if self.fail_get {
                return Err(StorageError::Backend("store unavailable".to_string()));
            }
            self.inner.get(keys).await
        }

        async fn set(&self, entries: HashMap<String, Value>) -> StorageResult<()> {
            if self.fail_set {
                return Err(StorageError::Backend("store unavailable".to_string()));
            }
            self.inner.set(entries).await
        }

        async fn remove(&self, keys: &[&str]) -> StorageResult<()> {
            self.inner.remove(keys).await
        }
    }

    /// Store that suspends between operations, widening the read/write gap.
    struct SlowStore {
        inner: MemoryStore,
    }

    #[async_trait]
    impl DurableStore for SlowStore {
        async fn get(&self, keys: &[&str]) -> StorageResult<HashMap<String, Value>> {
            tokio::time::sleep(Duration::from_millis(5)).await;
            self.inner.get(keys).await
        }

        async fn set(&self, entries: HashMap<String, Value>) -> StorageResult<()> {
            tokio::time::sleep(Duration::from_millis(5)).await;
            self.inner.set(entries).await
        }

        async fn remove(&self, keys: &[&str]) -> StorageResult<()> {
            self.inner.remove(keys).await
        }
    }

    fn controller_at(now_ms: u64) -> (AdmissionController, Arc<ManualClock>) {
        let clock = ManualClock::at(now_ms);
        let controller = AdmissionController::with_clock(Arc::new(MemoryStore::new()), clock.clone());
        (controller, clock)
    }

    #[tokio::test]
    async fn test_boundary_at_max() {
        let (controller, clock) = controller_at(1_000_000);

        for i in 0..5 {
            clock.set(1_000_000 + i * 100);
            assert_eq!(controller.check_and_record(FETCH_MODELS).await, Admission::Allowed);
        }

        clock.set(1_000_500);
        match controller.check_and_record(FETCH_MODELS).await {
            Admission::Denied { wait_seconds } => {
                assert!(wait_seconds > 0);
                assert!(wait_seconds <= 60);
            }
            Admission::Allowed => panic!("sixth call within the window must be denied"),
        }
    }

    #[tokio::test]
    async fn test_window_slides() {
        let t0 = 5_000_000;
        let (controller, clock) = controller_at(t0);

        assert!(controller.check_and_record(FETCH_MODELS).await.is_allowed());
        for i in 1..5 {
            clock.set(t0 + 30_000 + i);
            assert!(controller.check_and_record(FETCH_MODELS).await.is_allowed());
        }

        clock.set(t0 + 30_010);
        assert!(!controller.check_and_record(FETCH_MODELS).await.is_allowed());

        // First call has expired; the other four still count
        clock.set(t0 + 60_001);
        assert_eq!(controller.recorded_count(FETCH_MODELS).await.unwrap(), 4);
        assert!(controller.check_and_record(FETCH_MODELS).await.is_allowed());
        assert_eq!(controller.recorded_count(FETCH_MODELS).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_timestamp_exactly_at_window_edge_still_counts() {
        let t0 = 10_000_000;
        let (controller, clock) = controller_at(t0);
        controller.check_and_record(FETCH_MODELS).await;

        clock.set(t0 + 60_000);
        assert_eq!(controller.recorded_count(FETCH_MODELS).await.unwrap(), 1);

        clock.set(t0 + 60_001);
        assert_eq!(controller.recorded_count(FETCH_MODELS).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_rejected_calls_do_not_consume_budget() {
        let (controller, clock) = controller_at(0);
        for i in 0..5 {
            clock.set(i);
            controller.check_and_record(FETCH_MODELS).await;
        }

        clock.set(10);
        let before = controller.recorded_count(FETCH_MODELS).await.unwrap();
        for _ in 0..3 {
            assert!(!controller.check_and_record(FETCH_MODELS).await.is_allowed());
        }
        assert_eq!(controller.recorded_count(FETCH_MODELS).await.unwrap(), before);

        // Once the first call expires exactly one slot is free
        clock.set(60_001);
        assert!(controller.check_and_record(FETCH_MODELS).await.is_allowed());
        assert!(!controller.check_and_record(FETCH_MODELS).await.is_allowed());
    }

    #[tokio::test]
    async fn test_chat_completion_scenario() {
        let (controller, clock) = controller_at(0);

        for t in 0..10 {
            clock.set(t);
            assert_eq!(controller.check_and_record(CHAT_COMPLETION).await, Admission::Allowed);
        }

        clock.set(10);
        assert_eq!(
            controller.check_and_record(CHAT_COMPLETION).await,
            Admission::Denied { wait_seconds: 60 }
        );

        clock.set(60_010);
        assert_eq!(controller.check_and_record(CHAT_COMPLETION).await, Admission::Allowed);
    }

    #[tokio::test]
    async fn test_wait_rounds_up() {
        let (controller, clock) = controller_at(100_000);
        for _ in 0..5 {
            controller.check_and_record(FETCH_MODELS).await;
        }

        // 58.5s elapsed, 1.5s remaining
        clock.set(158_500);
        assert_eq!(
            controller.check_and_record(FETCH_MODELS).await,
            Admission::Denied { wait_seconds: 2 }
        );

        // Exactly at the edge the wait never reports zero
        clock.set(160_000);
        assert_eq!(
            controller.check_and_record(FETCH_MODELS).await,
            Admission::Denied { wait_seconds: 1 }
        );
    }

    #[tokio::test]
    async fn test_categories_are_independent() {
        let (controller, _clock) = controller_at(0);
        for _ in 0..5 {
            controller.check_and_record(FETCH_MODELS).await;
        }
        assert!(!controller.check_and_record(FETCH_MODELS).await.is_allowed());
        assert!(controller.check_and_record(CHAT_COMPLETION).await.is_allowed());
        assert!(controller.check_and_record("summarizePage").await.is_allowed());
    }

    #[tokio::test]
    async fn test_unlisted_categories_share_one_lock() {
        let (controller, _clock) = controller_at(0);
        for i in 0..50 {
            controller.check_and_record(&format!("made-up-{}", i)).await;
        }
        controller.check_and_record(CHAT_COMPLETION).await;
        controller.check_and_record(FETCH_MODELS).await;

        assert_eq!(controller.category_locks.read().await.len(), 3);
        // Windows stay per category even when the lock is shared
        assert_eq!(controller.recorded_count("made-up-7").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_unknown_category_uses_default() {
        let (controller, _clock) = controller_at(0);
        for _ in 0..RateLimit::DEFAULT.max_calls {
            assert!(controller.check_and_record("summarizePage").await.is_allowed());
        }
        assert!(!controller.check_and_record("summarizePage").await.is_allowed());
    }

    #[tokio::test]
    async fn test_fails_open_when_store_unreadable() {
        let store = Arc::new(FailingStore {
            fail_get: true,
            fail_set: false,
            inner: MemoryStore::new(),
        });
        let controller = AdmissionController::with_clock(store, ManualClock::at(0));

        for _ in 0..20 {
            assert!(controller.check_and_record(FETCH_MODELS).await.is_allowed());
        }
        assert!(controller.recorded_count(FETCH_MODELS).await.is_err());
    }

    #[tokio::test]
    async fn test_fails_open_when_store_unwritable() {
        let store = Arc::new(FailingStore {
            fail_get: false,
            fail_set: true,
            inner: MemoryStore::new(),
        });
        let controller = AdmissionController::with_clock(store, ManualClock::at(0));

        for _ in 0..20 {
            assert!(controller.check_and_record(FETCH_MODELS).await.is_allowed());
        }
    }

    #[tokio::test]
    async fn test_malformed_state_is_replaced() {
        let store = Arc::new(MemoryStore::new());
        store
            .set_one(&StorageKeys::rate_limit(FETCH_MODELS), json!("garbage"))
            .await
            .unwrap();
        let controller = AdmissionController::with_clock(store.clone(), ManualClock::at(42));

        assert!(controller.check_and_record(FETCH_MODELS).await.is_allowed());
        assert_eq!(
            store.get_one(&StorageKeys::rate_limit(FETCH_MODELS)).await.unwrap(),
            Some(json!([42]))
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_checks_admit_only_free_slots() {
        let clock = ManualClock::at(0);
        let controller = Arc::new(AdmissionController::with_clock(
            Arc::new(SlowStore {
                inner: MemoryStore::new(),
            }),
            clock,
        ));

        // Use four of five slots
        for _ in 0..4 {
            assert!(controller.check_and_record(FETCH_MODELS).await.is_allowed());
        }

        let mut handles = Vec::new();
        for _ in 0..8 {
            let controller = controller.clone();
            handles.push(tokio::spawn(async move {
                controller.check_and_record(FETCH_MODELS).await
            }));
        }

        let mut allowed = 0;
        for handle in handles {
            if handle.await.unwrap().is_allowed() {
                allowed += 1;
            }
        }
        assert_eq!(allowed, 1);
        assert_eq!(controller.recorded_count(FETCH_MODELS).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_limits_survive_restart() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("storage.json");
        let clock = ManualClock::at(1_000);

        {
            let controller =
                AdmissionController::with_clock(Arc::new(JsonFileStore::new(&path)), clock.clone());
            for _ in 0..5 {
                assert!(controller.check_and_record(FETCH_MODELS).await.is_allowed());
            }
        }

        let controller = AdmissionController::with_clock(Arc::new(JsonFileStore::new(&path)), clock);
        assert!(!controller.check_and_record(FETCH_MODELS).await.is_allowed());
    }

    #[test]
    fn test_denial_into_error() {
        let err = Admission::Denied { wait_seconds: 42 }
            .into_result("chatCompletion")
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Rate limit exceeded for chatCompletion. Please wait 42 seconds."
        );
        assert!(Admission::Allowed.into_result("chatCompletion").is_ok());
    }
}
