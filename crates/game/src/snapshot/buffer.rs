use std::collections::VecDeque;

use crate::model::{TransformError, TransformSnapshot};

/// Bounded, timestamp-ordered history of authoritative poses for one remote
/// entity.
#[derive(Debug, Clone)]
pub struct StateBuffer {
    snapshots: VecDeque<TransformSnapshot>,
    capacity: usize,
}

impl StateBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(2);
        Self {
            snapshots: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Insert keeping ascending timestamp order. Snapshots sharing a
    /// timestamp stay in arrival order. The oldest entries are evicted once
    /// the buffer is over capacity.
    pub fn push(&mut self, snapshot: TransformSnapshot) -> Result<(), TransformError> {
        snapshot.transform.validate()?;

        let timestamp = snapshot.timestamp_ms();
        let insert_pos = self
            .snapshots
            .iter()
            .rposition(|s| s.timestamp_ms() <= timestamp)
            .map_or(0, |idx| idx + 1);
        self.snapshots.insert(insert_pos, snapshot);

        while self.snapshots.len() > self.capacity {
            self.snapshots.pop_front();
        }

        Ok(())
    }

    /// Drop every snapshot strictly older than `timestamp_ms`.
    pub fn evict_before(&mut self, timestamp_ms: f64) -> usize {
        let mut evicted = 0;
        while self
            .snapshots
            .front()
            .is_some_and(|s| s.timestamp_ms() < timestamp_ms)
        {
            self.snapshots.pop_front();
            evicted += 1;
        }
        evicted
    }

    pub fn get(&self, index: usize) -> Option<&TransformSnapshot> {
        self.snapshots.get(index)
    }

    pub fn oldest(&self) -> Option<&TransformSnapshot> {
        self.snapshots.front()
    }

    pub fn latest(&self) -> Option<&TransformSnapshot> {
        self.snapshots.back()
    }

    /// The snapshot just before the latest one.
    pub fn previous(&self) -> Option<&TransformSnapshot> {
        let len = self.snapshots.len();
        if len >= 2 {
            self.snapshots.get(len - 2)
        } else {
            None
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &TransformSnapshot> {
        self.snapshots.iter()
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}
