use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};

/// Errors resolving a handle (spec.md §7 "Handle" taxonomy).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandleError {
    /// No entry was ever stored under this id, or it belongs to a
    /// different tab's registry instance (spec.md §3 invariant iv).
    NotFound,
    /// The entry existed but its element is gone — reclaimed by
    /// navigation or GC (spec.md §3 invariant iii: "a typed error, never
    /// a silent miss").
    Gced,
}

impl fmt::Display for HandleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "handle-not-found"),
            Self::Gced => write!(f, "handle-gc'd"),
        }
    }
}

impl std::error::Error for HandleError {}

struct Entry<T> {
    value: T,
    last_accessed: Instant,
}

/// Maps `el_<n>` ids to element references within the lifetime of one tab's
/// isolated execution context (spec.md §3, §4.3). Fresh per navigation: the
/// page-bridge constructs a new registry every time it (re)injects the
/// content script into a tab (spec.md §9: "handles are never transmitted
/// to, or meaningful in, any other tab").
///
/// `T` stands in for the host's real element reference (a `web_sys::Element`
/// on the wasm target). Liveness ("has this been reclaimed by GC or
/// navigation") is not something this registry can determine on its own —
/// it takes an `is_alive` predicate at resolution time, matching spec.md
/// §9's allowance for either a true weak reference or "a strong map +
/// eager nav-invalidation + periodic isConnected mark-sweep".
pub struct HandleRegistry<T> {
    next_id: u64,
    entries: HashMap<String, Entry<T>>,
}

impl<T> Default for HandleRegistry<T> {
    fn default() -> Self {
        Self {
            next_id: 0,
            entries: HashMap::new(),
        }
    }
}

impl<T: Clone> HandleRegistry<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint a fresh `el_<n>` id for `element` (spec.md §3: "an opaque
    /// string of the form `el_<monotonic integer>`").
    pub fn store(&mut self, element: T) -> String {
        self.next_id += 1;
        let id = format!("el_{}", self.next_id);
        self.entries.insert(
            id.clone(),
            Entry {
                value: element,
                last_accessed: Instant::now(),
            },
        );
        id
    }

    /// Resolve `id`, bumping `lastAccessed` on success. `is_alive` is
    /// consulted to decide whether a present-but-stale entry should be
    /// reported as GC'd and evicted.
    pub fn resolve(
        &mut self,
        id: &str,
        is_alive: impl FnOnce(&T) -> bool,
    ) -> Result<T, HandleError> {
        let Some(entry) = self.entries.get_mut(id) else {
            return Err(HandleError::NotFound);
        };
        if !is_alive(&entry.value) {
            self.entries.remove(id);
            return Err(HandleError::Gced);
        }
        entry.last_accessed = Instant::now();
        Ok(entry.value.clone())
    }

    /// Background sweep (spec.md §4.3: "every `cleanupIntervalMs` removes
    /// handles unaccessed within `ttlMs` or empty weak ref"). Returns the
    /// number of entries removed.
    pub fn sweep(&mut self, ttl: Duration, is_alive: impl Fn(&T) -> bool) -> usize {
        let now = Instant::now();
        let stale: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, e)| now.duration_since(e.last_accessed) >= ttl || !is_alive(&e.value))
            .map(|(id, _)| id.clone())
            .collect();
        let removed = stale.len();
        for id in stale {
            self.entries.remove(&id);
        }
        removed
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The background sweeper's schedule. Config changes to `ttlMs`/
/// `cleanupIntervalMs` restart the sweeper (spec.md §4.3) — modeled here
/// as simply replacing this struct and re-arming whatever timer drives
/// calls to [`HandleRegistry::sweep`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepSchedule {
    pub ttl: Duration,
    pub cleanup_interval: Duration,
}

impl Default for SweepSchedule {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(15 * 60),
            cleanup_interval: Duration::from_secs(60),
        }
    }
}

impl From<protocol::HandlesTuning> for SweepSchedule {
    fn from(t: protocol::HandlesTuning) -> Self {
        Self {
            ttl: Duration::from_millis(t.ttl_ms),
            cleanup_interval: Duration::from_millis(t.cleanup_interval_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stored_ids_are_monotonic_and_well_formed() {
        let mut reg: HandleRegistry<u32> = HandleRegistry::new();
        let id1 = reg.store(1);
        let id2 = reg.store(2);
        assert_eq!(id1, "el_1");
        assert_eq!(id2, "el_2");
    }

    #[test]
    fn resolve_unknown_id_is_not_found() {
        let mut reg: HandleRegistry<u32> = HandleRegistry::new();
        assert_eq!(reg.resolve("el_99", |_| true), Err(HandleError::NotFound));
    }

    #[test]
    fn resolve_dead_entry_is_gced_and_evicted() {
        let mut reg: HandleRegistry<u32> = HandleRegistry::new();
        let id = reg.store(1);
        assert_eq!(reg.resolve(&id, |_| false), Err(HandleError::Gced));
        // Evicted: a second resolve is now "not found", not "gc'd" again.
        assert_eq!(reg.resolve(&id, |_| true), Err(HandleError::NotFound));
    }

    #[test]
    fn resolve_live_entry_bumps_last_accessed() {
        let mut reg: HandleRegistry<u32> = HandleRegistry::new();
        let id = reg.store(42);
        assert_eq!(reg.resolve(&id, |_| true), Ok(42));
    }

    #[test]
    fn sweep_removes_stale_and_dead_entries_only() {
        let mut reg: HandleRegistry<u32> = HandleRegistry::new();
        let fresh = reg.store(1);
        let dead = reg.store(2);
        let removed = reg.sweep(Duration::from_secs(3600), |v| *v != 2);
        assert_eq!(removed, 1);
        assert!(reg.resolve(&dead, |_| true).is_err());
        assert!(reg.resolve(&fresh, |_| true).is_ok());
    }

    #[test]
    fn sweep_respects_ttl() {
        let mut reg: HandleRegistry<u32> = HandleRegistry::new();
        reg.store(1);
        // TTL of zero means "unaccessed since the beginning of time", so
        // everything is immediately stale.
        let removed = reg.sweep(Duration::from_secs(0), |_| true);
        assert_eq!(removed, 1);
        assert!(reg.is_empty());
    }
}
