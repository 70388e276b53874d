//! The contracts between the engine and whatever actually materializes entities.

use crate::prelude::*;

/// Creates and destroys the expensive live instances.
pub trait Factory<D> {
    fn create_instance(&mut self, descriptor: &D, position: V3<f32>) -> InstanceId;
    fn destroy_instance(&mut self, instance: InstanceId);
    /// False once the instance was removed by someone other than us.
    fn is_connected(&self, instance: InstanceId) -> bool;

    /// Resets the instance to its spawn state in place.
    fn respawn(&mut self, _instance: InstanceId) {}
    /// Players attached to the instance, e.g. sitting in a vehicle.
    fn dependents(&self, _instance: InstanceId) -> Vec<usize> {
        vec![]
    }
    /// Moves a dependent off an instance that's about to be destroyed.
    fn relocate(&mut self, _dependent: usize, _instance: InstanceId) {}
}

/// Upstream bookkeeping for entities that only exist temporarily.
pub trait Registry {
    fn on_ephemeral_destroyed(&mut self, entity: EntityId);
}
impl Registry for () {
    fn on_ephemeral_destroyed(&mut self, _entity: EntityId) {}
}

/// What a [`CapacityManager`](crate::CapacityManager) does when an entity becomes live,
/// or stops being live.
///
/// `()` does nothing, leaving the live set as a pure selection for a consumer to act on.
pub trait Lifecycle<D> {
    fn create_entity(&mut self, entity: EntityId, record: &Entity<D>);
    fn delete_entity(&mut self, entity: EntityId, record: &Entity<D>);
}
impl<D> Lifecycle<D> for () {
    fn create_entity(&mut self, _entity: EntityId, _record: &Entity<D>) {}
    fn delete_entity(&mut self, _entity: EntityId, _record: &Entity<D>) {}
}

/// Lifecycle that materializes directly through a factory, one instance per live entity.
#[derive(Debug)]
pub struct Instances<F> {
    pub factory: F,
    live: HashMap<EntityId, InstanceId>,
}
impl<F> Instances<F> {
    pub fn new(factory: F) -> Self {
        Self { factory, live: HashMap::new() }
    }
    /// None while the entity isn't live.
    pub fn get(&self, entity: EntityId) -> Option<InstanceId> {
        self.live.get(&entity).copied()
    }
    pub fn len(&self) -> usize {
        self.live.len()
    }
    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }
}
impl<D, F: Factory<D>> Lifecycle<D> for Instances<F> {
    fn create_entity(&mut self, entity: EntityId, record: &Entity<D>) {
        let instance = self.factory.create_instance(&record.descriptor, record.position());
        if let Some(old) = self.live.insert(entity, instance) {
            log::warn!("{entity:?} was materialized twice, dropping {old:?}");
            self.factory.destroy_instance(old);
        }
    }
    fn delete_entity(&mut self, entity: EntityId, _record: &Entity<D>) {
        match self.live.remove(&entity) {
            Some(instance) if self.factory.is_connected(instance) => self.factory.destroy_instance(instance),
            Some(instance) => log::warn!("{instance:?} of {entity:?} was already removed"),
            None => log::warn!("{entity:?} was deleted without being live"),
        }
    }
}
