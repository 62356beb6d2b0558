//! Member store.
//!
//! Owns the authoritative map from subscriber identity to
//! [`SubscriptionRecord`]. Every mutation is followed by a full snapshot
//! write through the injected [`SnapshotStore`].
//!
//! The store has no locking of its own. Callers serialize access through the
//! engine's event lane.

mod record;
mod snapshot;

pub use record::{Payment, Stage, SubscriptionRecord, transfer_note};
pub use snapshot::{JsonFileSnapshot, SnapshotStore};

#[cfg(any(test, feature = "test-platform"))]
pub use snapshot::test;

use std::collections::HashMap;

use crate::error::Result;
use crate::plans::UserId;

/// Subscriber identity to record.
pub type MemberMap = HashMap<UserId, SubscriptionRecord>;

pub struct MemberStore {
    members: MemberMap,
    snapshot: Box<dyn SnapshotStore>,
}

impl MemberStore {
    /// Load the member map from the snapshot. Call once at process start.
    pub fn load(snapshot: impl SnapshotStore + 'static) -> Result<Self> {
        let members = snapshot.load()?;
        tracing::info!(members = members.len(), "Member store loaded");
        Ok(Self {
            members,
            snapshot: Box::new(snapshot),
        })
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&SubscriptionRecord> {
        self.members.get(id)
    }

    /// Read-modify-write of one record, creating a fresh record if absent.
    pub fn upsert<F>(&mut self, id: &str, mutate: F) -> Result<&SubscriptionRecord>
    where
        F: FnOnce(&mut SubscriptionRecord),
    {
        mutate(self.members.entry(id.to_string()).or_default());
        self.persist()?;
        self.members
            .get(id)
            .ok_or_else(|| crate::error::TollgateError::internal("record vanished after upsert"))
    }

    /// Delete a record. Persists only if something was removed.
    pub fn remove(&mut self, id: &str) -> Result<Option<SubscriptionRecord>> {
        let removed = self.members.remove(id);
        if removed.is_some() {
            self.persist()?;
        }
        Ok(removed)
    }

    /// Ids of records whose grace period has run out at `now`.
    #[must_use]
    pub fn expired_ids(&self, now: i64, grace_ms: i64) -> Vec<UserId> {
        let mut ids: Vec<UserId> = self
            .members
            .iter()
            .filter(|(_, record)| record.is_past_grace(now, grace_ms))
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    pub fn iter(&self) -> impl Iterator<Item = (&UserId, &SubscriptionRecord)> {
        self.members.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Write the whole map to the snapshot. Failure is fatal to the caller.
    pub fn persist(&self) -> Result<()> {
        self.snapshot.save(&self.members)
    }
}

#[cfg(test)]
mod tests {
    use super::test::InMemorySnapshot;
    use super::*;
    use crate::plans::Plan;

    #[test]
    fn test_upsert_creates_zero_record_and_persists() {
        let snapshot = InMemorySnapshot::new();
        let mut store = MemberStore::load(snapshot.clone()).unwrap();

        let record = store.upsert("42", |_| {}).unwrap();
        assert_eq!(record.expire_at, 0);
        assert_eq!(record.stage, Stage::Fresh);
        assert_eq!(snapshot.save_count(), 1);
        assert!(snapshot.contents().contains_key("42"));
    }

    #[test]
    fn test_upsert_mutates_existing() {
        let snapshot = InMemorySnapshot::new();
        let mut store = MemberStore::load(snapshot.clone()).unwrap();

        store
            .upsert("42", |r| r.stage = Stage::PlanChosen { plan: Plan::MidTerm })
            .unwrap();
        store.upsert("42", |r| r.expire_at = 99).unwrap();

        let record = store.get("42").unwrap();
        assert_eq!(record.stage.plan(), Some(Plan::MidTerm));
        assert_eq!(record.expire_at, 99);
        assert_eq!(snapshot.save_count(), 2);
        assert_eq!(snapshot.contents()["42"].expire_at, 99);
    }

    #[test]
    fn test_remove_absent_does_not_persist() {
        let snapshot = InMemorySnapshot::new();
        let mut store = MemberStore::load(snapshot.clone()).unwrap();

        assert!(store.remove("nobody").unwrap().is_none());
        assert_eq!(snapshot.save_count(), 0);

        store.upsert("1", |_| {}).unwrap();
        assert!(store.remove("1").unwrap().is_some());
        assert_eq!(snapshot.save_count(), 2);
        assert!(snapshot.contents().is_empty());
    }

    #[test]
    fn test_persist_failure_surfaces_as_fatal() {
        let snapshot = InMemorySnapshot::new();
        let mut store = MemberStore::load(snapshot.clone()).unwrap();
        snapshot.fail_writes(true);

        let err = store.upsert("1", |_| {}).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_expired_ids_respects_grace_boundary() {
        let snapshot = InMemorySnapshot::new();
        let mut store = MemberStore::load(snapshot).unwrap();
        let now = 10_000_000;
        let grace = 1_000;

        store.upsert("never", |r| r.expire_at = 0).unwrap();
        store.upsert("swept", |r| r.expire_at = now - grace - 1).unwrap();
        store.upsert("edge", |r| r.expire_at = now - grace).unwrap();
        store.upsert("kept", |r| r.expire_at = now - grace + 1).unwrap();

        assert_eq!(store.expired_ids(now, grace), vec!["swept".to_string()]);
    }

    #[test]
    fn test_load_reads_existing_snapshot() {
        let snapshot = InMemorySnapshot::new();
        {
            let mut store = MemberStore::load(snapshot.clone()).unwrap();
            store.upsert("7", |r| r.expire_at = 5).unwrap();
        }
        let store = MemberStore::load(snapshot).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("7").unwrap().expire_at, 5);
    }
}
