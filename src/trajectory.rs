use std::collections::VecDeque;

use crate::types::{Displacement, TrajectoryPoint};

/// Fixed-capacity FIFO; pushing onto a full buffer evicts the oldest entry.
#[derive(Clone, Debug)]
pub struct BoundedBuffer<T> {
    items: VecDeque<T>,
    capacity: usize,
    evicted: u64,
}

impl<T> BoundedBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
            evicted: 0,
        }
    }

    pub fn push(&mut self, item: T) {
        while self.items.len() >= self.capacity {
            self.items.pop_front();
            self.evicted += 1;
        }
        self.items.push_back(item);
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> + '_ {
        self.items.iter()
    }

    pub fn back(&self) -> Option<&T> {
        self.items.back()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Entries dropped off the front since creation
    pub fn evicted(&self) -> u64 {
        self.evicted
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct ViewOffset {
    since: f64,
    origin: Displacement,
}

/// Live trajectory: the most recent integrated points plus a movable view.
///
/// `offset` re-bases what `snapshot` shows without touching stored points;
/// `reset` drops the points themselves.
#[derive(Clone, Debug)]
pub struct TrajectoryBuffer {
    points: BoundedBuffer<TrajectoryPoint>,
    offset: Option<ViewOffset>,
}

impl TrajectoryBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            points: BoundedBuffer::new(capacity),
            offset: None,
        }
    }

    pub fn append(&mut self, point: TrajectoryPoint) {
        self.points.push(point);
    }

    /// Empty the buffer and clear any view offset.
    pub fn reset(&mut self) {
        self.points.clear();
        self.offset = None;
    }

    /// Show only points newer than `since`, displaced relative to the newest
    /// point at or before `since` (or the origin if there is none).
    pub fn offset(&mut self, since: f64) {
        let origin = self
            .points
            .iter()
            .rev()
            .find(|p| p.timestamp <= since)
            .map(|p| p.displacement)
            .unwrap_or_else(Displacement::zeros);
        self.offset = Some(ViewOffset { since, origin });
    }

    pub fn clear_offset(&mut self) {
        self.offset = None;
    }

    /// Visible points in time order.
    pub fn snapshot(&self) -> Vec<TrajectoryPoint> {
        match self.offset {
            None => self.points.iter().cloned().collect(),
            Some(view) => self
                .points
                .iter()
                .filter(|p| p.timestamp > view.since)
                .map(|p| TrajectoryPoint {
                    displacement: p.displacement - view.origin,
                    ..p.clone()
                })
                .collect(),
        }
    }

    /// Stored points, ignoring any offset.
    pub fn raw(&self) -> impl Iterator<Item = &TrajectoryPoint> + '_ {
        self.points.iter()
    }

    pub fn latest(&self) -> Option<&TrajectoryPoint> {
        self.points.back()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.points.capacity()
    }

    pub fn evicted(&self) -> u64 {
        self.points.evicted()
    }
}
