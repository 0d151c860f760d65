//! Tag-invalidated read cache
//!
//! Every read path goes through [`TagCache::cached`] with a set of tags.
//! Mutations call [`TagCache::revalidate`], which bumps tag generations.
//! An entry stores the generation of each of its tags as they were before its
//! loader ran. It is served only while all of them are unchanged.
//!
//! Id tags of deleted rows are retired: their generation is dropped once every
//! entry that could carry it has outlived the time-to-live.

use crate::model::UserId;
use dashmap::DashMap;
use moka::sync::Cache;
use parking_lot::Mutex;
use std::any::Any;
use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Cached data families
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CacheKind {
    Products,
    Subscriptions,
    Countries,
    CountryGroups,
    ProductViews,
}

impl CacheKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Products => "products",
            Self::Subscriptions => "subscriptions",
            Self::Countries => "countries",
            Self::CountryGroups => "countryGroups",
            Self::ProductViews => "productViews",
        }
    }
}

/// Invalidation scope
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum CacheTag {
    Global(CacheKind),
    User(UserId, CacheKind),
    Id(String, CacheKind),
    /// Attached to every entry
    All,
}

impl CacheTag {
    pub fn global(kind: CacheKind) -> Self {
        Self::Global(kind)
    }

    pub fn user(user: &UserId, kind: CacheKind) -> Self {
        Self::User(user.clone(), kind)
    }

    pub fn id(id: impl fmt::Display, kind: CacheKind) -> Self {
        Self::Id(id.to_string(), kind)
    }
}

impl fmt::Display for CacheTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Global(kind) => write!(f, "global:{}", kind.as_str()),
            Self::User(user, kind) => write!(f, "user:{}-{}", user, kind.as_str()),
            Self::Id(id, kind) => write!(f, "id:{}-{}", id, kind.as_str()),
            Self::All => f.write_str("*"),
        }
    }
}

#[derive(Clone)]
struct Entry {
    value: Arc<dyn Any + Send + Sync>,
    tags: Arc<[(String, u64)]>,
}

/// Tag cache over moka
pub struct TagCache {
    entries: Cache<String, Entry>,
    generations: DashMap<String, u64>,
    /// Retired tags, oldest first
    retired: Mutex<VecDeque<(Instant, String)>>,
    ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl TagCache {
    /// Create cache with capacity and time-to-live
    pub fn new(capacity: u64, ttl: Duration) -> Self {
        let entries = Cache::builder()
            .max_capacity(capacity)
            .time_to_live(ttl)
            .build();

        Self {
            entries,
            generations: DashMap::new(),
            retired: Mutex::new(VecDeque::new()),
            ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    fn generation(&self, tag: &str) -> u64 {
        self.generations.get(tag).map(|g| *g).unwrap_or(0)
    }

    fn snapshot(&self, tags: &[CacheTag]) -> Arc<[(String, u64)]> {
        let mut rendered: Vec<String> = tags
            .iter()
            .filter(|t| **t != CacheTag::All)
            .map(ToString::to_string)
            .collect();
        rendered.push(CacheTag::All.to_string());

        rendered
            .into_iter()
            .map(|tag| {
                let generation = self.generation(&tag);
                (tag, generation)
            })
            .collect()
    }

    fn is_fresh(&self, entry: &Entry) -> bool {
        entry
            .tags
            .iter()
            .all(|(tag, generation)| self.generation(tag) == *generation)
    }

    /// Return the cached value for `key`, or run `loader` and cache its result
    ///
    /// Loader errors are returned as-is and never cached.
    pub async fn cached<T, E, F, Fut>(
        &self,
        key: impl Into<String>,
        tags: &[CacheTag],
        loader: F,
    ) -> Result<T, E>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let key = key.into();

        if let Some(entry) = self.entries.get(&key) {
            if self.is_fresh(&entry) {
                if let Some(value) = entry.value.downcast_ref::<T>() {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    tracing::trace!(key = %key, "cache hit");
                    return Ok(value.clone());
                }
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let tags = self.snapshot(tags);
        let value = loader().await?;
        let entry = Entry {
            value: Arc::new(value.clone()),
            tags,
        };

        // Invalidated while loading: hand the value back but do not keep it.
        if self.is_fresh(&entry) {
            self.entries.insert(key, entry);
        }
        Ok(value)
    }

    /// Invalidate every entry carrying `tag`
    pub fn invalidate(&self, tag: &CacheTag) {
        *self.generations.entry(tag.to_string()).or_insert(0) += 1;
    }

    /// Invalidate the global tag of `kind`, plus the user and id tags when given
    pub fn revalidate(&self, kind: CacheKind, user: Option<&UserId>, id: Option<&str>) {
        self.invalidate(&CacheTag::Global(kind));
        if let Some(user) = user {
            self.invalidate(&CacheTag::user(user, kind));
        }
        if let Some(id) = id {
            self.invalidate(&CacheTag::id(id, kind));
        }
        tracing::debug!(
            kind = kind.as_str(),
            user = ?user.map(UserId::as_str),
            id = ?id,
            "cache revalidated"
        );
    }

    /// Invalidate the id tag of a deleted row and schedule its generation for removal
    pub fn retire(&self, kind: CacheKind, id: &str) {
        let tag = CacheTag::id(id, kind);
        self.invalidate(&tag);
        let now = Instant::now();
        self.retired.lock().push_back((now, tag.to_string()));
        self.purge_retired(now);
    }

    /// Drop generations retired at least one time-to-live before `now`
    fn purge_retired(&self, now: Instant) {
        let mut retired = self.retired.lock();
        while let Some((at, _)) = retired.front() {
            if now.saturating_duration_since(*at) < self.ttl {
                break;
            }
            if let Some((_, tag)) = retired.pop_front() {
                self.generations.remove(&tag);
            }
        }
    }

    /// Number of tags with a live generation
    pub fn tracked_tags(&self) -> usize {
        self.generations.len()
    }

    /// Invalidate everything
    pub fn clear_full(&self) {
        self.invalidate(&CacheTag::All);
        self.entries.invalidate_all();
    }

    /// (hits, misses) since creation
    pub fn stats(&self) -> (u64, u64) {
        (self.hits.load(Ordering::Relaxed), self.misses.load(Ordering::Relaxed))
    }
}

impl Default for TagCache {
    fn default() -> Self {
        Self::new(10_000, Duration::from_secs(3600))
    }
}
