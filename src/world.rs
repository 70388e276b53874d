use serde::{Deserialize, Serialize};

use crate::prelude::*;
use crate::config::ServerConfig;
use crate::factory::{Factory, Instances, Registry};
use crate::manager::CapacityManager;
use crate::vehicles::{VehicleSpawn, VehicleStreamer};

// What does the world own?
//   Every streamed record, in one arena per kind. Handles outlive nothing: when a vehicle
//   is removed for good its record is released and the handle goes dead.
//   The players, since they're what every streamer observes.
//
// The tick loop is the only writer. A tick runs a full pass for vehicles and objects, so
// nothing outside ever sees half-applied reference counts.
//
// Objects don't need the vehicle tiers: they can't be used, so they're never pinned, and
// recreating them is cheap enough for the disposal queue alone.

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ObjectSpawn {
    pub model: u32,
    pub rotation: V3<f32>,
}

#[derive(Debug, Clone)]
struct Player {
    position: V3<f32>,
    vehicle: Option<EntityId>,
}

/// Ephemeral vehicles the streamer is done with. The world releases their records.
#[derive(Debug, Default)]
pub struct Released(Vec<EntityId>);
impl Registry for Released {
    fn on_ephemeral_destroyed(&mut self, entity: EntityId) {
        self.0.push(entity);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamerStats {
    pub candidates: usize,
    pub live: usize,
    pub cached: usize,
    pub pinned: usize,
}
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub tick: u32,
    pub players: usize,
    pub vehicles: StreamerStats,
    pub objects: StreamerStats,
}

pub struct World<V, O> {
    vehicles: Entities<VehicleSpawn>,
    vehicle_streamer: VehicleStreamer<V, Released>,
    objects: Entities<ObjectSpawn>,
    object_streamer: CapacityManager<Instances<O>>,

    players: BTreeMap<usize, Player>,
    tick: u32,
    disposed: bool,
}
impl<V, O> World<V, O>
where
    V: Factory<VehicleSpawn>,
    O: Factory<ObjectSpawn>,
{
    pub fn new(config: &ServerConfig, vehicle_factory: V, object_factory: O) -> Self {
        Self {
            vehicles: Entities::new(),
            vehicle_streamer: VehicleStreamer::new(
                OwnerId(0),
                &config.vehicles,
                config.respawn_delay_ticks(),
                vehicle_factory,
                Released::default(),
            ),
            objects: Entities::new(),
            object_streamer: CapacityManager::new(OwnerId(1), &config.objects, Instances::new(object_factory)),
            players: BTreeMap::new(),
            tick: 0,
            disposed: false,
        }
    }
    pub fn vehicles(&self) -> &Entities<VehicleSpawn> {
        &self.vehicles
    }
    pub fn vehicle_streamer(&self) -> &VehicleStreamer<V, Released> {
        &self.vehicle_streamer
    }
    pub fn objects(&self) -> &Entities<ObjectSpawn> {
        &self.objects
    }
    pub fn object_streamer(&self) -> &CapacityManager<Instances<O>> {
        &self.object_streamer
    }
    pub fn player_pos(&self, pid: usize) -> Option<V3<f32>> {
        self.players.get(&pid).map(|player| player.position)
    }
    pub fn is_disposed(&self) -> bool {
        self.disposed
    }
    pub fn stats(&self) -> Stats {
        Stats {
            tick: self.tick,
            players: self.players.len(),
            vehicles: StreamerStats {
                candidates: self.vehicle_streamer.len(),
                live: self.vehicle_streamer.live_count(),
                cached: self.vehicle_streamer.cached_count(),
                pinned: self.vehicle_streamer.pinned_count(),
            },
            objects: StreamerStats {
                candidates: self.object_streamer.len(),
                live: self.object_streamer.live_count(),
                cached: self.object_streamer.cached_count(),
                pinned: 0,
            },
        }
    }
}
impl<V, O> World<V, O>
where
    V: Factory<VehicleSpawn>,
    O: Factory<ObjectSpawn>,
{
    pub fn tick_until(&mut self, tickn: u32) {
        while self.tick < tickn && !self.disposed {
            self.tick();
            self.tick += 1;
        }
    }
    pub fn next_tick(&self) -> u32 {
        self.tick + 1
    }
    /// Tears down everything live. Later ticks do nothing.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        self.vehicle_streamer.dispose();
        self.vehicle_streamer.clear(&mut self.vehicles);
        self.object_streamer.clear(&mut self.objects);
        log::info!("world disposed on tick {}", self.tick);
    }

    pub fn login(&mut self, pid: usize, position: V3<f32>) {
        self.players.insert(pid, Player { position, vehicle: None });
        self.vehicle_streamer.on_observer_connect(pid, position);
        self.object_streamer.on_observer_connect(pid, position);
        log::debug!("player {pid} joined at {position:?}");
    }
    pub fn logout(&mut self, pid: usize) {
        let Some(player) = self.players.remove(&pid) else {
            return;
        };
        if let Some(vehicle) = player.vehicle {
            self.vehicle_streamer.pin(vehicle, self.tick);
        }
        self.vehicle_streamer.on_observer_disconnect(&mut self.vehicles, pid);
        self.object_streamer.on_observer_disconnect(&mut self.objects, pid);
        log::debug!("player {pid} left");
    }
    /// A driver takes their vehicle along.
    pub fn request_move(&mut self, pid: usize, position: V3<f32>) {
        let Some(player) = self.players.get_mut(&pid) else {
            return;
        };
        player.position = position;
        if let Some(vehicle) = player.vehicle {
            if let Err(e) = self.vehicle_streamer.relocate(&mut self.vehicles, vehicle, position) {
                log::warn!("player {pid} drove {vehicle:?} which isn't streamed: {e}");
            }
        }
        self.vehicle_streamer.on_observer_move(pid, position);
        self.object_streamer.on_observer_move(pid, position);
    }
    /// Returns false if the vehicle isn't materialized, there's nothing to enter.
    pub fn enter_vehicle(&mut self, pid: usize, vehicle: EntityId) -> bool {
        if self.vehicle_streamer.live_instance(vehicle).is_none() {
            return false;
        }
        let Some(player) = self.players.get_mut(&pid) else {
            return false;
        };
        player.vehicle = Some(vehicle);
        self.vehicle_streamer.pin(vehicle, self.tick);
        true
    }
    /// The respawn delay starts counting now.
    pub fn leave_vehicle(&mut self, pid: usize) {
        if let Some(vehicle) = self.players.get_mut(&pid).and_then(|player| player.vehicle.take()) {
            self.vehicle_streamer.pin(vehicle, self.tick);
        }
    }

    /// Ephemeral vehicles are materialized immediately next to whoever asked for them.
    pub fn spawn_vehicle(&mut self, spawn: VehicleSpawn, position: V3<f32>) -> Result<EntityId, StreamError> {
        let id = self.vehicles.insert(Entity::new(spawn, position));
        let result = if spawn.ephemeral {
            self.vehicle_streamer.request_create(&mut self.vehicles, id, self.tick)
        } else {
            self.vehicle_streamer.add(&mut self.vehicles, id).map(|_| ())
        };
        if let Err(e) = result {
            // never half-registered: roll back
            let _ = self.vehicle_streamer.remove(&mut self.vehicles, id);
            self.vehicles.release(id);
            return Err(e);
        }
        Ok(id)
    }
    pub fn despawn_vehicle(&mut self, id: EntityId) -> Result<bool, StreamError> {
        for player in self.players.values_mut() {
            if player.vehicle == Some(id) {
                player.vehicle = None;
            }
        }
        let removed = self.vehicle_streamer.remove(&mut self.vehicles, id)?;
        self.vehicles.release(id);
        Ok(removed)
    }
    pub fn spawn_object(&mut self, spawn: ObjectSpawn, position: V3<f32>) -> Result<EntityId, StreamError> {
        let id = self.objects.insert(Entity::new(spawn, position));
        if let Err(e) = self.object_streamer.add(&mut self.objects, id, false) {
            let _ = self.object_streamer.delete(&mut self.objects, id);
            self.objects.release(id);
            return Err(e);
        }
        Ok(id)
    }
    pub fn despawn_object(&mut self, id: EntityId) -> Result<bool, StreamError> {
        let removed = self.object_streamer.delete(&mut self.objects, id)?;
        self.objects.release(id);
        Ok(removed)
    }

    fn tick(&mut self) {
        for player in self.players.values() {
            if let Some(vehicle) = player.vehicle {
                self.vehicle_streamer.pin(vehicle, self.tick);
            }
        }
        self.vehicle_streamer.update(&mut self.vehicles, self.tick);
        for id in self.vehicle_streamer.registry_mut().0.drain(..) {
            self.vehicles.release(id);
        }
        if let Err(e) = self.object_streamer.stream(&mut self.objects) {
            log::error!("skipping object pass on tick {}: {e}", self.tick);
        }
        if self.tick % (5 * TICKS_PER_SECOND) == 0 {
            match serde_json::to_string(&self.stats()) {
                Ok(stats) => log::debug!("{stats}"),
                Err(e) => log::warn!("unable to serialize stats: {e}"),
            }
        }
    }
}
