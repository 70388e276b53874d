//! Vehicle streaming.
//!
//! The capacity manager decides which vehicles should be live. This module turns that
//! selection into actual vehicles, and tries hard not to destroy any it may need again:
//!   - vehicles leaving the selection go to a recency cache, and come back from it
//!     without being recreated
//!   - vehicles a player just used stay pinned until their respawn delay runs out,
//!     at which point they respawn in place
//!   - ephemeral vehicles (spawned on request, not part of the map) are never cached,
//!     and are removed for good once their pin runs out

use serde::{Deserialize, Serialize};

use crate::prelude::*;
use crate::config::StreamerConfig;
use crate::factory::{Factory, Registry};
use crate::manager::CapacityManager;

pub mod cache;
pub mod respawn;

use cache::RecencyCache;
use respawn::RespawnManager;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VehicleSpawn {
    pub model: u16,
    pub rotation: f32,
    pub colors: (u8, u8),
    #[serde(default)]
    pub ephemeral: bool,
}
impl VehicleSpawn {
    pub fn new(model: u16) -> Self {
        Self { model, rotation: 0.0, colors: (0, 0), ephemeral: false }
    }
    pub fn ephemeral(model: u16) -> Self {
        Self { ephemeral: true, ..Self::new(model) }
    }
}

#[derive(Debug)]
pub struct VehicleStreamer<F, R = ()> {
    manager: CapacityManager,
    factory: F,
    registry: R,

    live: HashMap<EntityId, InstanceId>,
    cache: RecencyCache,
    respawn: RespawnManager,

    disposed: bool,
}
impl<F, R> VehicleStreamer<F, R> {
    /// `respawn_delay` is in ticks.
    pub fn new(owner: OwnerId, config: &StreamerConfig, respawn_delay: u32, factory: F, registry: R) -> Self {
        Self {
            manager: CapacityManager::new(owner, config, ()),
            factory,
            registry,
            live: HashMap::new(),
            cache: RecencyCache::new(),
            respawn: RespawnManager::new(respawn_delay),
            disposed: false,
        }
    }
    pub fn manager(&self) -> &CapacityManager {
        &self.manager
    }
    pub fn factory(&self) -> &F {
        &self.factory
    }
    pub fn factory_mut(&mut self) -> &mut F {
        &mut self.factory
    }
    pub fn registry_mut(&mut self) -> &mut R {
        &mut self.registry
    }
    /// Registered vehicles.
    pub fn len(&self) -> usize {
        self.manager.len()
    }
    pub fn is_empty(&self) -> bool {
        self.manager.is_empty()
    }
    /// Materialized vehicles.
    pub fn live_count(&self) -> usize {
        self.live.len()
    }
    pub fn cached_count(&self) -> usize {
        self.cache.len()
    }
    pub fn pinned_count(&self) -> usize {
        self.respawn.len()
    }
    pub fn is_pinned(&self, entity: EntityId) -> bool {
        self.respawn.is_pinned(entity)
    }
    pub fn is_cached(&self, entity: EntityId) -> bool {
        self.cache.contains(entity)
    }
    /// None while the vehicle isn't materialized.
    pub fn live_instance(&self, entity: EntityId) -> Option<InstanceId> {
        self.live.get(&entity).copied()
    }
    pub fn is_disposed(&self) -> bool {
        self.disposed
    }
    /// Stops all further updates.
    pub fn dispose(&mut self) {
        self.disposed = true;
    }

    pub fn on_observer_connect(&mut self, pid: usize, position: V3<f32>) {
        self.manager.on_observer_connect(pid, position);
    }
    pub fn on_observer_move(&mut self, pid: usize, position: V3<f32>) {
        self.manager.on_observer_move(pid, position);
    }
    pub fn on_observer_disconnect(&mut self, entities: &mut Entities<VehicleSpawn>, pid: usize) {
        self.manager.on_observer_disconnect(entities, pid);
    }
    pub fn relocate(&self, entities: &mut Entities<VehicleSpawn>, entity: EntityId, position: V3<f32>) -> Result<(), StreamError> {
        self.manager.relocate(entities, entity, position)
    }
    /// Marks the vehicle as just used, pinning it for the respawn delay from `tick`.
    pub fn pin(&mut self, entity: EntityId, tick: u32) {
        self.respawn.pin(entity, tick);
    }
}
impl<F: Factory<VehicleSpawn>, R: Registry> VehicleStreamer<F, R> {
    /// One reconciliation: stream, then materialize the difference.
    pub fn update(&mut self, entities: &mut Entities<VehicleSpawn>, tick: u32) {
        if self.disposed {
            return;
        }
        if let Err(e) = self.manager.stream(entities) {
            log::error!("skipping vehicle pass on tick {tick}: {e}");
            return;
        }
        let selection = self.manager.selection();
        let mut added: Vec<EntityId> = selection.iter()
            .filter(|entity| !self.live.contains_key(*entity))
            .copied()
            .collect();
        let mut removed: Vec<EntityId> = self.live.keys()
            .filter(|entity| !selection.contains(*entity))
            .copied()
            .collect();
        added.sort_unstable();
        removed.sort_unstable();

        for entity in added {
            self.create(entities, entity);
        }
        for entity in removed {
            if !self.respawn.is_pinned(entity) {
                self.delete(entities, entity, false);
            }
        }
        self.process_respawns(entities, tick);
    }

    /// Registers a vehicle. If a player is already near it, it's materialized right away.
    pub fn add(&mut self, entities: &mut Entities<VehicleSpawn>, entity: EntityId) -> Result<bool, StreamError> {
        if !self.manager.add(entities, entity, false)? {
            return Ok(false);
        }
        if !self.disposed && self.manager.is_live(entity) {
            self.create(entities, entity);
        }
        Ok(true)
    }
    /// Removes a vehicle for good.
    pub fn remove(&mut self, entities: &mut Entities<VehicleSpawn>, entity: EntityId) -> Result<bool, StreamError> {
        let ephemeral = entities.get(entity).map_or(false, |record| record.descriptor.ephemeral);
        if let Some(instance) = self.live.remove(&entity).or_else(|| self.cache.take(entity)) {
            self.teardown(entity, instance);
        }
        self.respawn.unpin(entity);
        let removed = self.manager.delete(entities, entity)?;
        if removed && ephemeral {
            self.registry.on_ephemeral_destroyed(entity);
        }
        Ok(removed)
    }

    /// Materializes `entity` now, whether or not a player is near, and pins it.
    pub fn request_create(&mut self, entities: &mut Entities<VehicleSpawn>, entity: EntityId, tick: u32) -> Result<(), StreamError> {
        if !self.manager.streamer().contains(entity) {
            self.manager.add(entities, entity, true)?;
        }
        self.create(entities, entity);
        self.respawn.pin(entity, tick);
        Ok(())
    }
    /// Destroys the instance of `entity` now. Ephemeral vehicles are removed for good,
    /// others come back once they're selected again.
    pub fn request_delete(&mut self, entities: &mut Entities<VehicleSpawn>, entity: EntityId) -> Result<(), StreamError> {
        if entities.get(entity).map_or(false, |record| record.descriptor.ephemeral) {
            return self.remove(entities, entity).map(|_| ());
        }
        self.respawn.unpin(entity);
        self.delete(entities, entity, true);
        if let Some(instance) = self.cache.take(entity) {
            self.teardown(entity, instance);
        }
        Ok(())
    }

    /// Destroys every instance and deregisters every vehicle.
    pub fn clear(&mut self, entities: &mut Entities<VehicleSpawn>) {
        let instances: Vec<(EntityId, InstanceId)> = self.live.drain()
            .chain(self.cache.drain())
            .collect();
        for (entity, instance) in instances {
            self.teardown(entity, instance);
        }
        self.respawn.clear();
        self.manager.clear(entities);
    }

    fn create(&mut self, entities: &Entities<VehicleSpawn>, entity: EntityId) {
        if self.live.contains_key(&entity) {
            return;
        }
        match self.cache.take(entity) {
            Some(instance) if self.factory.is_connected(instance) => {
                log::trace!("recovered {entity:?} from the cache");
                self.live.insert(entity, instance);
                return;
            }
            Some(instance) => log::warn!("cached {instance:?} of {entity:?} was removed externally"),
            None => {}
        }
        let Some(record) = entities.get(entity) else {
            log::warn!("can't materialize {entity:?}, its record is gone");
            return;
        };
        self.make_room();
        let instance = self.factory.create_instance(&record.descriptor, record.position());
        self.live.insert(entity, instance);
    }

    /// Persistent vehicles are cached unless `immediate`. The cache gives way first when
    /// live and cached vehicles together would exceed `max_visible` plus the pinned ones.
    fn delete(&mut self, entities: &Entities<VehicleSpawn>, entity: EntityId, immediate: bool) {
        let Some(instance) = self.live.remove(&entity) else {
            return;
        };
        let persistent = entities.get(entity).map_or(false, |record| !record.descriptor.ephemeral);
        if persistent && !immediate {
            self.make_room();
            if self.live.len() + self.cache.len() < self.budget() {
                self.cache.insert(entity, instance);
                return;
            }
        }
        self.teardown(entity, instance);
    }

    /// Instances the host may hold at once, live and cached together.
    fn budget(&self) -> usize {
        self.manager.max_visible() + self.respawn.len()
    }
    /// Destroys the oldest cached instances until one more fits in the budget.
    fn make_room(&mut self) {
        while self.live.len() + self.cache.len() + 1 > self.budget() {
            let Some((oldest, instance)) = self.cache.pop_oldest() else {
                break;
            };
            self.teardown(oldest, instance);
        }
    }

    fn teardown(&mut self, entity: EntityId, instance: InstanceId) {
        if self.factory.is_connected(instance) {
            for dependent in self.factory.dependents(instance) {
                self.factory.relocate(dependent, instance);
            }
            self.factory.destroy_instance(instance);
        } else {
            log::warn!("{instance:?} of {entity:?} was already removed externally");
        }
        self.live.remove(&entity);
        self.cache.take(entity);
        self.respawn.unpin(entity);
    }

    fn process_respawns(&mut self, entities: &mut Entities<VehicleSpawn>, tick: u32) {
        for entity in self.respawn.expired(tick) {
            let ephemeral = entities.get(entity).map_or(true, |record| record.descriptor.ephemeral);
            if ephemeral {
                if let Err(e) = self.remove(entities, entity) {
                    log::error!("couldn't remove ephemeral {entity:?}: {e}");
                }
                continue;
            }
            match self.live.get(&entity).copied() {
                Some(instance) if self.factory.is_connected(instance) => self.factory.respawn(instance),
                Some(instance) => {
                    log::warn!("{instance:?} of {entity:?} vanished before it could respawn");
                    self.live.remove(&entity);
                }
                None => {}
            }
        }
    }
}
