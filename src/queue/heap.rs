//! # WorkHeap: min-heap of work items with in-item position tracking.
//!
//! The dispatcher's priority queue. Each stored item records its own
//! heap index ([`WorkItem::position`]), so removal and re-sifting
//! after a priority change are O(log n) — no scanning.
//!
//! ## Rules
//! - Heap property: `priority[parent] ≤ priority[child]` for every
//!   parent/child pair; ties break arbitrarily.
//! - `push` marks the item Queued and records its position; `pop` and
//!   removal reset the position to −1.
//! - `pop` is the dispatch commit point: the popped item is marked
//!   InProgress under the same write lock, so a racing control
//!   operation never mistakes a committed item for a queued one.
//! - `remove_item`/`fix_item` validate both the recorded position and
//!   the item's identity before touching the vector, so a racing `pop`
//!   degrades them to no-ops instead of corrupting the heap.
//! - `adjust_priorities` runs under the write lock: it both reads
//!   adjuster outputs and restructures the heap.

use std::sync::Arc;

use parking_lot::RwLock;

use super::work::{WorkItem, WorkState};

/// Min-heap of `Arc<WorkItem>` keyed by mutable priority.
pub(crate) struct WorkHeap {
    items: RwLock<Vec<Arc<WorkItem>>>,
}

impl WorkHeap {
    pub(crate) fn new() -> Self {
        Self {
            items: RwLock::new(Vec::new()),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.items.read().len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }

    /// Adds `item` to the heap: state becomes Queued, position is the
    /// new tail index, then the item sifts up.
    pub(crate) fn push(&self, item: Arc<WorkItem>) {
        let mut items = self.items.write();
        item.set_state(WorkState::Queued);
        let tail = items.len();
        item.set_position(tail as i64);
        items.push(item);
        sift_up(&mut items, tail);
    }

    /// Removes and returns the minimum-priority item, marking it
    /// InProgress before the lock is released (popping commits the
    /// item to execution).
    pub(crate) fn pop(&self) -> Option<Arc<WorkItem>> {
        let mut items = self.items.write();
        let n = items.len();
        if n == 0 {
            return None;
        }
        if n > 1 {
            swap_entries(&mut items, 0, n - 1);
        }
        let item = items.pop()?;
        if !items.is_empty() {
            sift_down(&mut items, 0);
        }
        item.set_position(-1);
        item.set_state(WorkState::InProgress);
        Some(item)
    }

    /// Removes `target` via its recorded position. Returns false when
    /// the item is no longer in the heap (already popped or removed).
    pub(crate) fn remove_item(&self, target: &Arc<WorkItem>) -> bool {
        let mut items = self.items.write();
        let Some(pos) = valid_position(&items, target) else {
            return false;
        };
        let last = items.len() - 1;
        if pos != last {
            swap_entries(&mut items, pos, last);
        }
        let Some(removed) = items.pop() else {
            return false;
        };
        removed.set_position(-1);
        if pos < items.len() {
            resift(&mut items, pos);
        }
        true
    }

    /// Restores the heap property around `target` after an external
    /// priority write. No-op when the item is not in the heap.
    pub(crate) fn fix_item(&self, target: &Arc<WorkItem>) -> bool {
        let mut items = self.items.write();
        let Some(pos) = valid_position(&items, target) else {
            return false;
        };
        resift(&mut items, pos);
        true
    }

    /// Re-reads the intended priority of every item carrying an
    /// adjuster; on change, writes it back and re-sifts that entry.
    pub(crate) fn adjust_priorities(&self) {
        let mut items = self.items.write();
        let mut i = 0;
        while i < items.len() {
            let item = Arc::clone(&items[i]);
            if let Some(adjust) = item.adjuster() {
                let intended = adjust();
                if intended != item.priority() {
                    item.set_priority(intended);
                    let pos = item.position();
                    if pos >= 0 {
                        resift(&mut items, pos as usize);
                    }
                }
            }
            i += 1;
        }
    }
}

/// Position check: the item must claim a position that is in bounds
/// and actually holds it.
fn valid_position(items: &[Arc<WorkItem>], target: &Arc<WorkItem>) -> Option<usize> {
    let pos = target.position();
    if pos < 0 {
        return None;
    }
    let pos = pos as usize;
    if pos >= items.len() || !Arc::ptr_eq(&items[pos], target) {
        return None;
    }
    Some(pos)
}

fn swap_entries(items: &mut [Arc<WorkItem>], i: usize, j: usize) {
    items.swap(i, j);
    items[i].set_position(i as i64);
    items[j].set_position(j as i64);
}

fn sift_up(items: &mut [Arc<WorkItem>], mut i: usize) -> bool {
    let start = i;
    while i > 0 {
        let parent = (i - 1) / 2;
        if items[i].priority() >= items[parent].priority() {
            break;
        }
        swap_entries(items, i, parent);
        i = parent;
    }
    i != start
}

fn sift_down(items: &mut [Arc<WorkItem>], mut i: usize) -> bool {
    let start = i;
    let n = items.len();
    loop {
        let left = 2 * i + 1;
        if left >= n {
            break;
        }
        let mut child = left;
        let right = left + 1;
        if right < n && items[right].priority() < items[left].priority() {
            child = right;
        }
        if items[child].priority() >= items[i].priority() {
            break;
        }
        swap_entries(items, i, child);
        i = child;
    }
    i != start
}

/// The displaced entry may need to travel either direction.
fn resift(items: &mut [Arc<WorkItem>], pos: usize) {
    if !sift_down(items, pos) {
        sift_up(items, pos);
    }
}
