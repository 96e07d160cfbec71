//! Thumbnail cache with bounded capacity and age-based expiry
//!
//! List views render dozens of avatars at once; re-compositing each one is
//! wasteful when nothing changed. The cache memoizes rendered data-URL
//! snapshots keyed by student id, bounded to the most recently written
//! entries and lazily expiring old ones.
//!
//! The cache is an explicitly constructed object: callers inject the clock
//! and the persistence backend, so tests control time and storage without
//! process-global state.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Default entry cap: the 100 most-recently-written thumbnails survive.
pub const DEFAULT_CAPACITY: usize = 100;

/// Default entry lifetime in days.
pub const DEFAULT_MAX_AGE_DAYS: i64 = 7;

/// Schema version of the persisted cache.
const STORE_VERSION: u32 = 1;

/// Cache errors (persistence only; in-memory operations are infallible)
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cannot read thumbnail cache '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot write thumbnail cache '{path}': {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed thumbnail cache: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("unsupported thumbnail cache version {0}")]
    UnsupportedVersion(u32),
}

/// Time source for entry timestamps and expiry checks.
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time; the production clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A cached rendered thumbnail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThumbnailEntry {
    /// `data:image/png;base64,…` snapshot of the rendered avatar
    pub data_url: String,
    /// Write time, the recency and expiry reference
    pub timestamp: DateTime<Utc>,
    pub species: String,
    pub primary_color: String,
    pub secondary_color: String,
    /// Fingerprint of the equipped item ids at render time; `None` on
    /// entries written before outfits participated in invalidation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outfit: Option<String>,
}

/// The persisted shape: a versioned map of thumbnails.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersistedThumbnails {
    pub version: u32,
    pub thumbnails: HashMap<String, ThumbnailEntry>,
}

/// Persistence backend for the cache.
pub trait CacheStorage {
    /// Load the persisted snapshot, `None` when no cache exists yet.
    fn load(&self) -> Result<Option<PersistedThumbnails>, CacheError>;
    /// Replace the persisted snapshot.
    fn save(&self, snapshot: &PersistedThumbnails) -> Result<(), CacheError>;
}

/// JSON-file persistence, the production backend.
#[derive(Debug, Clone)]
pub struct JsonFileStorage {
    path: PathBuf,
}

impl JsonFileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CacheStorage for JsonFileStorage {
    fn load(&self) -> Result<Option<PersistedThumbnails>, CacheError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let data = fs::read_to_string(&self.path).map_err(|source| CacheError::Read {
            path: self.path.display().to_string(),
            source,
        })?;
        let snapshot: PersistedThumbnails = serde_json::from_str(&data)?;
        Ok(Some(snapshot))
    }

    fn save(&self, snapshot: &PersistedThumbnails) -> Result<(), CacheError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(|source| CacheError::Write {
                    path: self.path.display().to_string(),
                    source,
                })?;
            }
        }
        let data = serde_json::to_string(snapshot)?;
        fs::write(&self.path, data).map_err(|source| CacheError::Write {
            path: self.path.display().to_string(),
            source,
        })
    }
}

/// In-memory persistence for tests and ephemeral use.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    snapshot: RefCell<Option<PersistedThumbnails>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CacheStorage for MemoryStorage {
    fn load(&self) -> Result<Option<PersistedThumbnails>, CacheError> {
        Ok(self.snapshot.borrow().clone())
    }

    fn save(&self, snapshot: &PersistedThumbnails) -> Result<(), CacheError> {
        *self.snapshot.borrow_mut() = Some(snapshot.clone());
        Ok(())
    }
}

/// Aggregate cache statistics for inspection tooling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub oldest: Option<DateTime<Utc>>,
}

/// Fingerprint an equipped-item list for invalidation: sorted ids joined
/// with `+`, so slot order does not matter.
pub fn outfit_fingerprint(item_ids: &[String]) -> String {
    let mut ids: Vec<&str> = item_ids.iter().map(String::as_str).collect();
    ids.sort_unstable();
    ids.join("+")
}

/// The thumbnail cache.
///
/// Eviction is recency-of-write: overflowing the capacity keeps the entries
/// with the newest timestamps, not the most recently read. Expiry is lazy:
/// [`get`](Self::get) purges an over-age entry instead of returning it, and
/// [`cleanup_old_entries`](Self::cleanup_old_entries) does one full sweep
/// when the CLI starts up.
pub struct ThumbnailCache {
    storage: Box<dyn CacheStorage>,
    clock: Box<dyn Clock>,
    capacity: usize,
    max_age: Duration,
    entries: HashMap<String, ThumbnailEntry>,
}

impl ThumbnailCache {
    /// Construct a cache over the given backend and clock, loading whatever
    /// the backend holds.
    pub fn new(storage: Box<dyn CacheStorage>, clock: Box<dyn Clock>) -> Result<Self, CacheError> {
        let entries = match storage.load()? {
            Some(snapshot) => {
                if snapshot.version != STORE_VERSION {
                    return Err(CacheError::UnsupportedVersion(snapshot.version));
                }
                snapshot.thumbnails
            }
            None => HashMap::new(),
        };
        Ok(Self {
            storage,
            clock,
            capacity: DEFAULT_CAPACITY,
            max_age: Duration::days(DEFAULT_MAX_AGE_DAYS),
            entries,
        })
    }

    /// Production convenience: JSON file backend, system clock.
    pub fn open(path: &Path) -> Result<Self, CacheError> {
        Self::new(Box::new(JsonFileStorage::new(path)), Box::new(SystemClock))
    }

    /// Override capacity and max age (project config hook).
    pub fn with_limits(mut self, capacity: usize, max_age_days: i64) -> Self {
        self.capacity = capacity.max(1);
        self.max_age = Duration::days(max_age_days.max(1));
        self
    }

    /// Insert or overwrite an entry, stamped with the current time.
    ///
    /// When the insert pushes the cache past capacity, only the entries with
    /// the newest write timestamps are retained.
    pub fn set(
        &mut self,
        key: &str,
        data_url: String,
        species: &str,
        primary_color: &str,
        secondary_color: &str,
        outfit: Option<String>,
    ) {
        self.entries.insert(
            key.to_string(),
            ThumbnailEntry {
                data_url,
                timestamp: self.clock.now(),
                species: species.to_string(),
                primary_color: primary_color.to_string(),
                secondary_color: secondary_color.to_string(),
                outfit,
            },
        );
        self.enforce_capacity();
    }

    fn enforce_capacity(&mut self) {
        if self.entries.len() <= self.capacity {
            return;
        }
        let mut ordered: Vec<(String, DateTime<Utc>)> = self
            .entries
            .iter()
            .map(|(key, entry)| (key.clone(), entry.timestamp))
            .collect();
        // Newest first; key as tiebreaker keeps eviction deterministic
        ordered.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        let evicted = ordered.split_off(self.capacity);
        for (key, _) in &evicted {
            self.entries.remove(key);
        }
        debug!(count = evicted.len(), "evicted thumbnails over capacity");
    }

    /// Fetch an entry, treating an over-age one as a miss and purging it.
    pub fn get(&mut self, key: &str) -> Option<&ThumbnailEntry> {
        let expired = match self.entries.get(key) {
            Some(entry) => self.clock.now() - entry.timestamp > self.max_age,
            None => return None,
        };
        if expired {
            self.entries.remove(key);
            debug!(key, "expired thumbnail purged");
            return None;
        }
        self.entries.get(key)
    }

    /// Whether a student's thumbnail must be re-rendered, judged by colors
    /// alone: true when no entry exists or either customization color
    /// differs from the cached one.
    pub fn needs_refresh(&self, key: &str, primary_color: &str, secondary_color: &str) -> bool {
        match self.entries.get(key) {
            Some(entry) => {
                entry.primary_color != primary_color || entry.secondary_color != secondary_color
            }
            None => true,
        }
    }

    /// [`needs_refresh`](Self::needs_refresh) extended with the outfit
    /// fingerprint, so changing hats invalidates too. Entries written
    /// without a fingerprint always refresh under this check.
    pub fn needs_refresh_with_outfit(
        &self,
        key: &str,
        primary_color: &str,
        secondary_color: &str,
        outfit: &str,
    ) -> bool {
        if self.needs_refresh(key, primary_color, secondary_color) {
            return true;
        }
        match self.entries.get(key) {
            Some(entry) => entry.outfit.as_deref() != Some(outfit),
            None => true,
        }
    }

    /// One-shot sweep removing every over-age entry. Returns the number
    /// removed.
    pub fn cleanup_old_entries(&mut self) -> usize {
        let now = self.clock.now();
        let max_age = self.max_age;
        let before = self.entries.len();
        self.entries.retain(|_, entry| now - entry.timestamp <= max_age);
        let removed = before - self.entries.len();
        if removed > 0 {
            debug!(removed, "cleaned up expired thumbnails");
        }
        removed
    }

    /// Unconditional reset.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            oldest: self.entries.values().map(|entry| entry.timestamp).min(),
        }
    }

    /// Write the current table through to the backend.
    pub fn persist(&self) -> Result<(), CacheError> {
        let snapshot = PersistedThumbnails {
            version: STORE_VERSION,
            thumbnails: self.entries.clone(),
        };
        self.storage.save(&snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::cell::Cell;
    use std::rc::Rc;

    /// Test clock that only moves when told to.
    struct ManualClock {
        now: Cell<DateTime<Utc>>,
    }

    impl ManualClock {
        fn starting_at(now: DateTime<Utc>) -> Rc<Self> {
            Rc::new(Self { now: Cell::new(now) })
        }

        fn advance(&self, by: Duration) {
            self.now.set(self.now.get() + by);
        }
    }

    impl Clock for Rc<ManualClock> {
        fn now(&self) -> DateTime<Utc> {
            self.now.get()
        }
    }

    fn epoch() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap()
    }

    fn test_cache() -> (ThumbnailCache, Rc<ManualClock>) {
        let clock = ManualClock::starting_at(epoch());
        let cache = ThumbnailCache::new(
            Box::new(MemoryStorage::new()),
            Box::new(Rc::clone(&clock)),
        )
        .unwrap();
        (cache, clock)
    }

    fn set_simple(cache: &mut ThumbnailCache, key: &str) {
        cache.set(key, "data:image/png;base64,AAAA".into(), "otter", "#fff", "#000", None);
    }

    #[test]
    fn test_set_then_get() {
        let (mut cache, _clock) = test_cache();
        set_simple(&mut cache, "ABC-123");
        let entry = cache.get("ABC-123").unwrap();
        assert_eq!(entry.species, "otter");
        assert_eq!(entry.timestamp, epoch());
    }

    #[test]
    fn test_needs_refresh_matches_colors() {
        let (mut cache, _clock) = test_cache();
        cache.set("ABC-123", "data:...".into(), "otter", "#fff", "#000", None);
        assert!(!cache.needs_refresh("ABC-123", "#fff", "#000"));
        assert!(cache.needs_refresh("ABC-123", "#000", "#000"));
        assert!(cache.needs_refresh("ABC-123", "#fff", "#111"));
        assert!(cache.needs_refresh("missing", "#fff", "#000"));
    }

    #[test]
    fn test_needs_refresh_ignores_outfit() {
        // Color-only invalidation: a changed outfit alone is not a refresh
        let (mut cache, _clock) = test_cache();
        cache.set(
            "ABC-123",
            "data:...".into(),
            "otter",
            "#fff",
            "#000",
            Some("hat_wizard".into()),
        );
        assert!(!cache.needs_refresh("ABC-123", "#fff", "#000"));
    }

    #[test]
    fn test_needs_refresh_with_outfit_detects_change() {
        let (mut cache, _clock) = test_cache();
        cache.set(
            "ABC-123",
            "data:...".into(),
            "otter",
            "#fff",
            "#000",
            Some("glasses_round+hat_wizard".into()),
        );
        assert!(!cache.needs_refresh_with_outfit(
            "ABC-123",
            "#fff",
            "#000",
            "glasses_round+hat_wizard"
        ));
        assert!(cache.needs_refresh_with_outfit("ABC-123", "#fff", "#000", "hat_wizard"));
        // Entries without a recorded outfit always refresh under this check
        cache.set("XYZ-789", "data:...".into(), "owl", "#fff", "#000", None);
        assert!(cache.needs_refresh_with_outfit("XYZ-789", "#fff", "#000", ""));
    }

    #[test]
    fn test_outfit_fingerprint_is_order_independent() {
        let a = outfit_fingerprint(&["hat_wizard".into(), "glasses_round".into()]);
        let b = outfit_fingerprint(&["glasses_round".into(), "hat_wizard".into()]);
        assert_eq!(a, b);
        assert_eq!(a, "glasses_round+hat_wizard");
        assert_eq!(outfit_fingerprint(&[]), "");
    }

    #[test]
    fn test_capacity_keeps_most_recent_writes() {
        let (mut cache, clock) = test_cache();
        for i in 0..101 {
            set_simple(&mut cache, &format!("student-{:03}", i));
            clock.advance(Duration::seconds(1));
        }
        assert_eq!(cache.len(), 100);
        assert!(cache.get("student-000").is_none(), "oldest write evicted");
        for i in 1..101 {
            assert!(
                cache.get(&format!("student-{:03}", i)).is_some(),
                "student-{:03} should survive",
                i
            );
        }
    }

    #[test]
    fn test_eviction_is_write_recency_not_read_recency() {
        let (mut cache, clock) = test_cache();
        set_simple(&mut cache, "first");
        clock.advance(Duration::seconds(1));
        for i in 0..99 {
            set_simple(&mut cache, &format!("filler-{:02}", i));
        }
        clock.advance(Duration::seconds(1));
        // Reading "first" does not refresh its write timestamp
        assert!(cache.get("first").is_some());
        set_simple(&mut cache, "overflow");
        assert!(cache.get("first").is_none());
        assert!(cache.get("overflow").is_some());
    }

    #[test]
    fn test_get_expires_old_entries() {
        let (mut cache, clock) = test_cache();
        set_simple(&mut cache, "ABC-123");
        clock.advance(Duration::days(8));
        assert!(cache.get("ABC-123").is_none());
        // Purged as a side effect, not just hidden
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_get_keeps_entries_within_age() {
        let (mut cache, clock) = test_cache();
        set_simple(&mut cache, "ABC-123");
        clock.advance(Duration::days(6));
        assert!(cache.get("ABC-123").is_some());
    }

    #[test]
    fn test_cleanup_old_entries_sweeps() {
        let (mut cache, clock) = test_cache();
        set_simple(&mut cache, "old-1");
        set_simple(&mut cache, "old-2");
        clock.advance(Duration::days(8));
        set_simple(&mut cache, "fresh");
        let removed = cache.cleanup_old_entries();
        assert_eq!(removed, 2);
        assert_eq!(cache.len(), 1);
        assert!(cache.get("fresh").is_some());
    }

    #[test]
    fn test_clear() {
        let (mut cache, _clock) = test_cache();
        set_simple(&mut cache, "a");
        set_simple(&mut cache, "b");
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_stats() {
        let (mut cache, clock) = test_cache();
        set_simple(&mut cache, "a");
        clock.advance(Duration::seconds(10));
        set_simple(&mut cache, "b");
        let stats = cache.stats();
        assert_eq!(stats.entries, 2);
        assert_eq!(stats.oldest, Some(epoch()));
    }

    #[test]
    fn test_persist_and_reload_via_memory_storage() {
        let storage = Rc::new(MemoryStorage::new());

        // Wrapper so two cache instances can share the backend
        struct Shared(Rc<MemoryStorage>);
        impl CacheStorage for Shared {
            fn load(&self) -> Result<Option<PersistedThumbnails>, CacheError> {
                self.0.load()
            }
            fn save(&self, snapshot: &PersistedThumbnails) -> Result<(), CacheError> {
                self.0.save(snapshot)
            }
        }

        let clock = ManualClock::starting_at(epoch());
        let mut cache = ThumbnailCache::new(
            Box::new(Shared(Rc::clone(&storage))),
            Box::new(Rc::clone(&clock)),
        )
        .unwrap();
        set_simple(&mut cache, "ABC-123");
        cache.persist().unwrap();

        let mut reloaded = ThumbnailCache::new(
            Box::new(Shared(storage)),
            Box::new(Rc::clone(&clock)),
        )
        .unwrap();
        assert_eq!(reloaded.len(), 1);
        assert!(reloaded.get("ABC-123").is_some());
    }
}
