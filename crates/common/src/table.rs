//! Bucket -> mount record bookkeeping.
//!
//! Each bucket gets its own async lock ("slot"), so a slow mount of one bucket
//! never holds up another. The map of slots is guarded by a short synchronous
//! lock that is never held across an await.
//!
//! Lock order is always slot, then map. Nothing waits on a slot while holding
//! the map lock.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

/// A live physical mount shared by `refcount` consumers.
#[derive(Debug)]
pub struct MountRecord<H> {
    pub bucket: String,
    pub refcount: usize,
    pub handle: H,
}

impl<H> MountRecord<H> {
    pub fn new(bucket: &str, handle: H) -> Self {
        Self {
            bucket: bucket.to_string(),
            refcount: 1,
            handle,
        }
    }
}

/// Per-bucket lock around the bucket's record. `None` means unmounted.
pub type Slot<H> = Arc<tokio::sync::Mutex<Option<MountRecord<H>>>>;

#[derive(Debug)]
pub struct MountTable<H> {
    slots: Mutex<HashMap<String, Slot<H>>>,
}

impl<H> Default for MountTable<H> {
    fn default() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }
}

impl<H> MountTable<H> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Slot for `bucket`, created empty if the bucket has none yet.
    pub fn slot(&self, bucket: &str) -> Slot<H> {
        self.slots
            .lock()
            .entry(bucket.to_string())
            .or_default()
            .clone()
    }

    /// Slot for `bucket` if one exists.
    pub fn existing(&self, bucket: &str) -> Option<Slot<H>> {
        self.slots.lock().get(bucket).cloned()
    }

    /// Drop `slot` from the table if it is empty and nobody else can reach it.
    ///
    /// The caller must hold the slot's lock and pass the record it sees, so
    /// the check and the removal cannot race with another task picking the
    /// slot up. Only the table's and the caller's references may remain.
    pub fn prune(&self, bucket: &str, slot: &Slot<H>, record: &Option<MountRecord<H>>) -> bool {
        if record.is_some() {
            return false;
        }

        let mut slots = self.slots.lock();
        match slots.get(bucket) {
            Some(current) if Arc::ptr_eq(current, slot) && Arc::strong_count(slot) == 2 => {
                slots.remove(bucket);
                true
            }
            _ => false,
        }
    }

    /// Buckets that currently have a slot, mounted or in flight.
    pub fn buckets(&self) -> Vec<String> {
        let mut buckets: Vec<String> = self.slots.lock().keys().cloned().collect();
        buckets.sort();
        buckets
    }

    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_slot_is_shared_per_bucket() {
        let table: MountTable<()> = MountTable::new();
        let a = table.slot("a");
        let again = table.slot("a");
        let b = table.slot("b");

        assert!(Arc::ptr_eq(&a, &again));
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(table.buckets(), vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn test_prune_empty_slot() {
        let table: MountTable<()> = MountTable::new();
        let slot = table.slot("a");
        let guard = slot.lock().await;

        assert!(table.prune("a", &slot, &guard));
        assert!(table.existing("a").is_none());
    }

    #[tokio::test]
    async fn test_prune_keeps_mounted_slot() {
        let table: MountTable<()> = MountTable::new();
        let slot = table.slot("a");
        let mut guard = slot.lock().await;
        *guard = Some(MountRecord::new("a", ()));

        assert!(!table.prune("a", &slot, &guard));
        assert!(table.existing("a").is_some());
    }

    #[tokio::test]
    async fn test_prune_keeps_slot_with_waiters() {
        let table: MountTable<()> = MountTable::new();
        let slot = table.slot("a");
        let _waiter = table.slot("a");
        let guard = slot.lock().await;

        assert!(!table.prune("a", &slot, &guard));
        assert!(table.existing("a").is_some());
    }
}
