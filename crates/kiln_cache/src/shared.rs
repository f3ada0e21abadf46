//! Shared, leased access to a translation cache with generation-driven pruning.

use crate::translation::TranslationCache;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// When automatic pruning runs after the last lease of a generation is released.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PrunePolicy {
    /// Prune rounds run while the cache holds more than this many records.
    /// `None` disables automatic pruning.
    pub max_entries: Option<usize>,
}

impl PrunePolicy {
    /// Never prune automatically.
    pub fn unbounded() -> Self {
        Self { max_entries: None }
    }

    /// Prune until at most `max_entries` records remain.
    pub fn limit(max_entries: usize) -> Self {
        Self {
            max_entries: Some(max_entries),
        }
    }

    /// Runs prune rounds on `cache` until it satisfies this policy.
    /// Returns the number of records removed.
    pub fn apply(&self, cache: &mut TranslationCache) -> usize {
        let Some(limit) = self.max_entries else {
            return 0;
        };
        let mut removed = 0;
        while cache.len() > limit {
            let round = cache.prune();
            if round == 0 {
                break;
            }
            removed += round;
        }
        removed
    }
}

struct Slot {
    cache: TranslationCache,
    active_leases: usize,
    generation: u64,
    policy: PrunePolicy,
}

/// A translation cache shared between artifact builds.
///
/// Cloning the handle shares the same cache. Every access goes through a
/// mutex, so two builds never mutate the cache concurrently. Builds hold a
/// [`CacheLease`] while in flight; when the last lease of a generation is
/// dropped the generation advances and the [`PrunePolicy`] is applied.
#[derive(Clone)]
pub struct SharedTranslationCache {
    slot: Arc<Mutex<Slot>>,
}

impl SharedTranslationCache {
    /// Wraps `cache` with automatic pruning disabled.
    pub fn new(cache: TranslationCache) -> Self {
        Self::with_policy(cache, PrunePolicy::unbounded())
    }

    /// Wraps `cache` with the given pruning policy.
    pub fn with_policy(cache: TranslationCache, policy: PrunePolicy) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Slot {
                cache,
                active_leases: 0,
                generation: 0,
                policy,
            })),
        }
    }

    fn slot(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Locks the cache for reading or mutation.
    pub fn lock(&self) -> CacheGuard<'_> {
        CacheGuard { guard: self.slot() }
    }

    /// Registers an in-flight build and returns its lease.
    pub fn lease(&self) -> CacheLease {
        let mut slot = self.slot();
        slot.active_leases += 1;
        CacheLease {
            generation: slot.generation,
            cache: self.clone(),
        }
    }

    /// The current generation. It advances each time the last outstanding
    /// lease is released.
    pub fn generation(&self) -> u64 {
        self.slot().generation
    }

    /// Number of leases currently held.
    pub fn active_leases(&self) -> usize {
        self.slot().active_leases
    }

    /// Runs one prune round immediately, regardless of leases.
    pub fn prune(&self) -> usize {
        self.slot().cache.prune()
    }

    /// Replaces the pruning policy.
    pub fn set_policy(&self, policy: PrunePolicy) {
        self.slot().policy = policy;
    }

    fn release(&self) {
        let mut slot = self.slot();
        slot.active_leases = slot.active_leases.saturating_sub(1);
        if slot.active_leases == 0 {
            slot.generation += 1;
            let policy = slot.policy;
            policy.apply(&mut slot.cache);
        }
    }
}

impl Default for SharedTranslationCache {
    fn default() -> Self {
        Self::new(TranslationCache::new())
    }
}

impl std::fmt::Debug for SharedTranslationCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let slot = self.slot();
        f.debug_struct("SharedTranslationCache")
            .field("entries", &slot.cache.len())
            .field("generation", &slot.generation)
            .field("active_leases", &slot.active_leases)
            .finish()
    }
}

/// Exclusive access to a shared translation cache.
pub struct CacheGuard<'a> {
    guard: MutexGuard<'a, Slot>,
}

impl Deref for CacheGuard<'_> {
    type Target = TranslationCache;

    fn deref(&self) -> &TranslationCache {
        &self.guard.cache
    }
}

impl DerefMut for CacheGuard<'_> {
    fn deref_mut(&mut self) -> &mut TranslationCache {
        &mut self.guard.cache
    }
}

/// Marks a build as using a shared translation cache. Released on drop.
pub struct CacheLease {
    generation: u64,
    cache: SharedTranslationCache,
}

impl CacheLease {
    /// The generation this lease was taken in.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Locks the leased cache.
    pub fn lock(&self) -> CacheGuard<'_> {
        self.cache.lock()
    }
}

impl Drop for CacheLease {
    fn drop(&mut self) {
        self.cache.release();
    }
}
