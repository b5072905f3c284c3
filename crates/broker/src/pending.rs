use std::collections::HashMap;
use tokio::time::Instant;

/// A request forwarded to the extension, awaiting its response. Keyed by a
/// broker-minted correlation id distinct from the client's own `id` — the
/// broker never forwards a client id to the extension, mirroring
/// `cdp/transport.rs`'s own `PendingRequest` table keyed by a locally
/// minted message id (spec.md §4.1: "broker mints its own correlation
/// id").
#[derive(Debug, Clone)]
pub struct PendingRequest {
    pub client_session: String,
    pub client_id: String,
    pub action: String,
    pub deadline: Instant,
}

/// The correlation table plus the monotonic id counter that mints broker
/// ids. Lives entirely inside the single broker actor task; nothing else
/// touches it, so no locking is needed (spec.md §5: "all shared state via
/// single loop").
#[derive(Debug, Default)]
pub struct PendingTable {
    next_id: u64,
    entries: HashMap<u64, PendingRequest>,
}

impl PendingTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint a new broker-side correlation id and register the pending
    /// entry, returning the id to use as the outbound message's `id`.
    pub fn insert(&mut self, entry: PendingRequest) -> u64 {
        self.next_id += 1;
        let id = self.next_id;
        self.entries.insert(id, entry);
        id
    }

    /// Remove and return the entry for `id`, if still pending. A response
    /// for an id that already timed out (and was swept) returns `None` —
    /// the caller should drop it silently (spec.md §4.1: "late replies
    /// dropped silently").
    pub fn remove(&mut self, id: u64) -> Option<PendingRequest> {
        self.entries.remove(&id)
    }

    /// The earliest deadline among all pending entries, used to size the
    /// broker actor's next `sleep_until` branch.
    #[must_use]
    pub fn earliest_deadline(&self) -> Option<Instant> {
        self.entries.values().map(|e| e.deadline).min()
    }

    /// Remove and return every entry whose deadline has passed.
    pub fn sweep_expired(&mut self, now: Instant) -> Vec<(u64, PendingRequest)> {
        let expired: Vec<u64> = self
            .entries
            .iter()
            .filter(|(_, e)| e.deadline <= now)
            .map(|(id, _)| *id)
            .collect();
        expired
            .into_iter()
            .map(|id| (id, self.entries.remove(&id).expect("just found by key")))
            .collect()
    }

    /// Drain every pending entry (extension disconnect or shutdown).
    pub fn drain(&mut self) -> Vec<(u64, PendingRequest)> {
        self.entries.drain().collect()
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

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn entry(action: &str, deadline: Instant) -> PendingRequest {
        PendingRequest {
            client_session: "client-1".into(),
            client_id: "req-1".into(),
            action: action.into(),
            deadline,
        }
    }

    #[test]
    fn ids_are_monotonic() {
        let mut table = PendingTable::new();
        let now = Instant::now() + Duration::from_secs(1);
        let id1 = table.insert(entry("dom.click", now));
        let id2 = table.insert(entry("dom.click", now));
        assert!(id2 > id1);
    }

    #[test]
    fn remove_returns_none_for_unknown_id() {
        let mut table = PendingTable::new();
        assert!(table.remove(999).is_none());
    }

    #[test]
    fn sweep_expired_removes_only_past_deadlines() {
        let mut table = PendingTable::new();
        let past = Instant::now() - Duration::from_secs(1);
        let future = Instant::now() + Duration::from_secs(60);
        let expired_id = table.insert(entry("dom.click", past));
        let live_id = table.insert(entry("dom.click", future));

        let expired = table.sweep_expired(Instant::now());
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].0, expired_id);
        assert_eq!(table.len(), 1);
        assert!(table.remove(live_id).is_some());
    }

    #[test]
    fn earliest_deadline_picks_the_minimum() {
        let mut table = PendingTable::new();
        let soon = Instant::now() + Duration::from_secs(1);
        let later = Instant::now() + Duration::from_secs(30);
        table.insert(entry("a", later));
        table.insert(entry("b", soon));
        assert_eq!(table.earliest_deadline(), Some(soon));
    }

    #[test]
    fn drain_empties_the_table() {
        let mut table = PendingTable::new();
        table.insert(entry("a", Instant::now() + Duration::from_secs(1)));
        table.insert(entry("b", Instant::now() + Duration::from_secs(1)));
        let drained = table.drain();
        assert_eq!(drained.len(), 2);
        assert!(table.is_empty());
    }
}
