//! Shared fixtures: a host that remembers every call it got.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};

use entstream::types::{EntityId, InstanceId, V3};
use entstream::{Entities, Entity, Factory, Registry};

#[derive(Debug, Default)]
pub struct Host {
    next: u32,
    pub connected: HashSet<InstanceId>,
    pub created: Vec<InstanceId>,
    pub destroyed: Vec<InstanceId>,
    pub respawned: Vec<InstanceId>,
    pub relocated: Vec<(usize, InstanceId)>,
    pub occupants: HashMap<InstanceId, Vec<usize>>,
}
impl Host {
    /// Removes an instance behind the streamer's back.
    pub fn vanish(&mut self, instance: InstanceId) {
        self.connected.remove(&instance);
    }
}
impl<D> Factory<D> for Host {
    fn create_instance(&mut self, _descriptor: &D, _position: V3<f32>) -> InstanceId {
        self.next += 1;
        let instance = InstanceId(self.next);
        self.connected.insert(instance);
        self.created.push(instance);
        instance
    }
    fn destroy_instance(&mut self, instance: InstanceId) {
        assert!(self.connected.remove(&instance), "destroyed {instance:?} twice");
        self.destroyed.push(instance);
    }
    fn is_connected(&self, instance: InstanceId) -> bool {
        self.connected.contains(&instance)
    }
    fn respawn(&mut self, instance: InstanceId) {
        self.respawned.push(instance);
    }
    fn dependents(&self, instance: InstanceId) -> Vec<usize> {
        self.occupants.get(&instance).cloned().unwrap_or_default()
    }
    fn relocate(&mut self, dependent: usize, instance: InstanceId) {
        assert!(self.connected.contains(&instance), "relocated off a destroyed {instance:?}");
        self.relocated.push((dependent, instance));
    }
}

#[derive(Debug, Default)]
pub struct Slots {
    pub freed: Vec<EntityId>,
}
impl Registry for Slots {
    fn on_ephemeral_destroyed(&mut self, entity: EntityId) {
        self.freed.push(entity);
    }
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// `side` x `side` records `spacing` apart on the z = 0 plane, row by row.
pub fn grid<D: Clone>(entities: &mut Entities<D>, descriptor: D, side: usize, spacing: f32) -> Vec<EntityId> {
    let mut ids = Vec::with_capacity(side * side);
    for x in 0..side {
        for y in 0..side {
            let position = V3(x as f32 * spacing, y as f32 * spacing, 0.0);
            ids.push(entities.insert(Entity::new(descriptor.clone(), position)));
        }
    }
    ids
}
