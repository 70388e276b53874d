use crate::prelude::*;

/// Vehicles used recently by a player, exempt from streaming them out.
///
/// Every pin holds until `delay` ticks after it was last refreshed.
#[derive(Debug)]
pub struct RespawnManager {
    delay: u32,
    // entity -> tick the pin expires on
    pinned: HashMap<EntityId, u32>,
}
impl RespawnManager {
    pub fn new(delay: u32) -> Self {
        Self { delay, pinned: HashMap::new() }
    }
    pub fn len(&self) -> usize {
        self.pinned.len()
    }
    pub fn is_empty(&self) -> bool {
        self.pinned.is_empty()
    }
    pub fn is_pinned(&self, entity: EntityId) -> bool {
        self.pinned.contains_key(&entity)
    }
    /// Pins `entity`, or pushes back the expiry of an existing pin.
    pub fn pin(&mut self, entity: EntityId, tick: u32) {
        self.pinned.insert(entity, tick.saturating_add(self.delay));
    }
    pub fn unpin(&mut self, entity: EntityId) -> bool {
        self.pinned.remove(&entity).is_some()
    }
    pub fn clear(&mut self) {
        self.pinned.clear();
    }
    /// Unpins and returns everything whose pin ran out by `tick`, earliest first.
    pub fn expired(&mut self, tick: u32) -> Vec<EntityId> {
        let mut expired: Vec<(u32, EntityId)> = self.pinned.iter()
            .filter(|(_, deadline)| **deadline <= tick)
            .map(|(&entity, &deadline)| (deadline, entity))
            .collect();
        expired.sort_unstable();
        for (_, entity) in &expired {
            self.pinned.remove(entity);
        }
        expired.into_iter().map(|(_, entity)| entity).collect()
    }
}
