//! Parking lot for live entities nobody references anymore.
//!
//! A binary min-heap over `(total references, parked sequence)`. Entities that were
//! referenced the least over their lifetime are evicted first; among equals, the one
//! parked earliest goes first. A side index from handle to heap slot lets a parked
//! entity be pulled back out when it gets referenced again.

use crate::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Key {
    total_references: u64,
    sequence: u64,
}

#[derive(Debug, Default)]
pub struct DisposalQueue {
    heap: Vec<(Key, EntityId)>,
    slots: HashMap<EntityId, usize>,
    next_sequence: u64,
}
impl DisposalQueue {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn len(&self) -> usize {
        self.heap.len()
    }
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
    pub fn contains(&self, entity: EntityId) -> bool {
        self.slots.contains_key(&entity)
    }
    /// Parks `entity`. Returns false if it was already parked.
    pub fn push(&mut self, entity: EntityId, total_references: u64) -> bool {
        if self.slots.contains_key(&entity) {
            return false;
        }
        let key = Key { total_references, sequence: self.next_sequence };
        self.next_sequence += 1;
        self.heap.push((key, entity));
        self.slots.insert(entity, self.heap.len() - 1);
        self.sift_up(self.heap.len() - 1);
        true
    }
    pub fn peek(&self) -> Option<EntityId> {
        self.heap.first().map(|(_, entity)| *entity)
    }
    /// Removes the eviction victim.
    pub fn pop(&mut self) -> Option<EntityId> {
        if self.heap.is_empty() {
            return None;
        }
        Some(self.remove_at(0))
    }
    /// Pulls a specific entity back out. Returns false if it wasn't parked.
    pub fn remove(&mut self, entity: EntityId) -> bool {
        match self.slots.get(&entity) {
            Some(&slot) => {
                self.remove_at(slot);
                true
            }
            None => false,
        }
    }
    pub fn clear(&mut self) {
        self.heap.clear();
        self.slots.clear();
    }

    fn remove_at(&mut self, slot: usize) -> EntityId {
        let last = self.heap.len() - 1;
        self.swap(slot, last);
        let (_, entity) = self.heap.pop().expect("corrupted disposal queue");
        self.slots.remove(&entity);
        if slot < self.heap.len() {
            self.sift_down(slot);
            self.sift_up(slot);
        }
        entity
    }
    fn swap(&mut self, a: usize, b: usize) {
        self.heap.swap(a, b);
        self.slots.insert(self.heap[a].1, a);
        self.slots.insert(self.heap[b].1, b);
    }
    fn sift_up(&mut self, mut slot: usize) {
        while slot > 0 {
            let parent = (slot - 1) / 2;
            if self.heap[slot].0 >= self.heap[parent].0 {
                break;
            }
            self.swap(slot, parent);
            slot = parent;
        }
    }
    fn sift_down(&mut self, mut slot: usize) {
        loop {
            let (left, right) = (2 * slot + 1, 2 * slot + 2);
            let mut smallest = slot;
            if left < self.heap.len() && self.heap[left].0 < self.heap[smallest].0 {
                smallest = left;
            }
            if right < self.heap.len() && self.heap[right].0 < self.heap[smallest].0 {
                smallest = right;
            }
            if smallest == slot {
                break;
            }
            self.swap(slot, smallest);
            slot = smallest;
        }
    }
}
