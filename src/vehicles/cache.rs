use crate::prelude::*;

/// Instances that left the live set but are kept around, oldest first out.
///
/// Bounding is up to the owner: it pops the oldest entries until there's room.
#[derive(Debug, Default)]
pub struct RecencyCache {
    order: BTreeMap<u64, EntityId>,
    entries: HashMap<EntityId, (u64, InstanceId)>,
    next_sequence: u64,
}
impl RecencyCache {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn len(&self) -> usize {
        self.entries.len()
    }
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
    pub fn contains(&self, entity: EntityId) -> bool {
        self.entries.contains_key(&entity)
    }
    /// Inserts as the most recent entry, returning the instance it replaced.
    pub fn insert(&mut self, entity: EntityId, instance: InstanceId) -> Option<InstanceId> {
        let replaced = self.take(entity);
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.order.insert(sequence, entity);
        self.entries.insert(entity, (sequence, instance));
        replaced
    }
    pub fn take(&mut self, entity: EntityId) -> Option<InstanceId> {
        let (sequence, instance) = self.entries.remove(&entity)?;
        self.order.remove(&sequence);
        Some(instance)
    }
    pub fn pop_oldest(&mut self) -> Option<(EntityId, InstanceId)> {
        let (_, entity) = self.order.pop_first()?;
        let (_, instance) = self.entries.remove(&entity)?;
        Some((entity, instance))
    }
    pub fn drain(&mut self) -> impl Iterator<Item = (EntityId, InstanceId)> + '_ {
        self.order.clear();
        self.entries.drain().map(|(entity, (_, instance))| (entity, instance))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oldest_entries_leave_first() {
        let mut arena = SlotMap::new();
        let ids: Vec<_> = (0..3).map(|_| arena.insert(())).collect();
        let mut cache = RecencyCache::new();
        cache.insert(ids[0], InstanceId(10));
        cache.insert(ids[1], InstanceId(11));
        cache.insert(ids[2], InstanceId(12));
        // re-inserting refreshes recency
        assert_eq!(cache.insert(ids[0], InstanceId(13)), Some(InstanceId(10)));

        assert_eq!(cache.pop_oldest(), Some((ids[1], InstanceId(11))));
        assert_eq!(cache.take(ids[2]), Some(InstanceId(12)));
        assert_eq!(cache.take(ids[2]), None);
        assert_eq!(cache.pop_oldest(), Some((ids[0], InstanceId(13))));
        assert!(cache.is_empty());
        assert_eq!(cache.pop_oldest(), None);
    }
}
