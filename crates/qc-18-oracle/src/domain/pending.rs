//! # Pending Task Table
//!
//! Bounded concurrent map `request_id → AggregationTask`.
//!
//! ## Locking
//!
//! - The map itself only guards insert/remove (sharded, via `DashMap`).
//! - Each task sits behind its own mutex; callers clone the `Arc` out of the
//!   map and lock it without holding any map shard.
//!
//! ## Capacity
//!
//! Creating a task beyond capacity fails with `TaskTableFull`. Merges into
//! existing tasks are never refused, and nothing is evicted to make room.
//!
//! ## Finished Requests
//!
//! Finalized request ids are remembered until the TTL sweep passes them, so
//! late payloads for an answered request do not open a fresh task.

use super::response::Millis;
use super::task::AggregationTask;
use crate::error::{OracleError, OracleResult};
use dashmap::mapref::entry::Entry as MapEntry;
use dashmap::DashMap;
use parking_lot::Mutex;
use shared_types::Hash;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Shared handle to a task.
pub type TaskHandle = Arc<Mutex<AggregationTask>>;

/// Result of [`PendingTaskTable::get_or_create`].
#[derive(Debug)]
pub enum TaskSlot {
    /// The task was already in the table.
    Existing(TaskHandle),
    /// A fresh task was inserted.
    Created(TaskHandle),
    /// The request was finalized recently; no task is opened.
    Finished,
}

/// Table entry. `created_at` is copied out of the task so the sweep can
/// filter without taking task locks.
struct Entry {
    created_at: Millis,
    task: TaskHandle,
}

/// Bounded table of in-flight aggregation tasks.
pub struct PendingTaskTable {
    tasks: DashMap<Hash, Entry>,
    finished: DashMap<Hash, Millis>,
    len: AtomicUsize,
    capacity: usize,
}

impl PendingTaskTable {
    /// Create a table holding at most `capacity` tasks.
    pub fn new(capacity: usize) -> Self {
        Self {
            tasks: DashMap::new(),
            finished: DashMap::new(),
            len: AtomicUsize::new(0),
            capacity,
        }
    }

    /// Find the task for `request_id`, creating it if absent.
    ///
    /// The finished check runs under the entry's shard lock: `finish`
    /// records the marker before it removes the task, so a vacant entry
    /// for a finalized request always sees the marker.
    pub fn get_or_create(&self, request_id: Hash, now: Millis) -> OracleResult<TaskSlot> {
        match self.tasks.entry(request_id) {
            MapEntry::Occupied(entry) => Ok(TaskSlot::Existing(Arc::clone(&entry.get().task))),
            MapEntry::Vacant(entry) => {
                if self.finished.contains_key(&request_id) {
                    return Ok(TaskSlot::Finished);
                }
                let reserved = self
                    .len
                    .fetch_update(Ordering::AcqRel, Ordering::Acquire, |len| {
                        (len < self.capacity).then_some(len + 1)
                    });
                if reserved.is_err() {
                    return Err(OracleError::TaskTableFull {
                        capacity: self.capacity,
                    });
                }
                let task = Arc::new(Mutex::new(AggregationTask::new(request_id, now)));
                entry.insert(Entry {
                    created_at: now,
                    task: Arc::clone(&task),
                });
                Ok(TaskSlot::Created(task))
            }
        }
    }

    /// Look up a task without creating it.
    pub fn get(&self, request_id: &Hash) -> Option<TaskHandle> {
        self.tasks
            .get(request_id)
            .map(|entry| Arc::clone(&entry.value().task))
    }

    /// Remove a task. Idempotent; returns whether something was removed.
    pub fn remove(&self, request_id: &Hash) -> bool {
        let removed = self.tasks.remove(request_id).is_some();
        if removed {
            self.len.fetch_sub(1, Ordering::AcqRel);
        }
        removed
    }

    /// Remove `request_id` only if it still maps to `task`.
    ///
    /// A finished task must not take down a newer task created for the same
    /// request after it was evicted.
    pub fn remove_task(&self, request_id: &Hash, task: &TaskHandle) -> bool {
        let removed = self
            .tasks
            .remove_if(request_id, |_, current| Arc::ptr_eq(&current.task, task))
            .is_some();
        if removed {
            self.len.fetch_sub(1, Ordering::AcqRel);
        }
        removed
    }

    /// Remove a finalized task and remember its request id.
    pub fn finish(&self, request_id: &Hash, task: &TaskHandle, now: Millis) -> bool {
        self.finished.insert(*request_id, now);
        self.remove_task(request_id, task)
    }

    /// Whether `request_id` was finalized since the last sweep passed it.
    pub fn is_finished(&self, request_id: &Hash) -> bool {
        self.finished.contains_key(request_id)
    }

    /// Evict every task created before `cutoff`, pending or not.
    ///
    /// Evicted tasks are marked so a merge already holding the handle
    /// cannot finalize them. Returns the evicted request ids.
    pub fn evict_older_than(&self, cutoff: Millis) -> Vec<Hash> {
        self.finished.retain(|_, finished_at| *finished_at >= cutoff);

        let expired: Vec<(Hash, TaskHandle)> = self
            .tasks
            .iter()
            .filter(|entry| entry.value().created_at < cutoff)
            .map(|entry| (*entry.key(), Arc::clone(&entry.value().task)))
            .collect();

        // Task locks are taken only after the map iteration has ended.
        let mut evicted = Vec::with_capacity(expired.len());
        for (request_id, task) in expired {
            task.lock().evict();
            if self.remove_task(&request_id, &task) {
                evicted.push(request_id);
            }
        }
        evicted
    }

    /// Drop every task and finished marker.
    pub fn clear(&self) {
        self.finished.clear();
        let ids: Vec<Hash> = self.tasks.iter().map(|entry| *entry.key()).collect();
        for request_id in ids {
            if let Some((_, entry)) = self.tasks.remove(&request_id) {
                entry.task.lock().evict();
                self.len.fetch_sub(1, Ordering::AcqRel);
            }
        }
    }

    /// Number of tasks.
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Acquire)
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of tasks.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
