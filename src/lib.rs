mod collections;
pub mod types;
pub mod error;
pub mod config;
pub mod entity;
pub mod streamer;
pub mod disposal;
pub mod factory;
pub mod manager;
pub mod vehicles;
pub mod world;

pub use collections::SlotMap;
pub use config::{ServerConfig, StreamerConfig};
pub use entity::{Entities, Entity};
pub use error::{ConfigError, StreamError};
pub use factory::{Factory, Instances, Lifecycle, Registry};
pub use manager::CapacityManager;
pub use streamer::Streamer;
pub use vehicles::{VehicleSpawn, VehicleStreamer};
pub use world::World;

mod prelude {
    pub(crate) use crate::collections::*;
    pub(crate) use crate::types::*;
    pub(crate) use crate::entity::{Entities, Entity};
    pub(crate) use crate::error::StreamError;
    pub(crate) use std::collections::{BTreeMap, HashMap, HashSet};
}

/// How much can be live at once?
///
/// The host platform caps how many vehicles, objects and pickups may exist, and every
/// creation or destruction is expensive for connected clients. Gamemodes want far more
/// than the cap: a few thousand parked vehicles spread over the map.
///
/// So every candidate is only a record until someone is near it.
///   - each tick, every player asks for its nearest candidates, bounded by
///     max-visible * saturation-ratio / players
///   - a candidate is live while any player counts it
///   - when nobody counts it anymore, it either dies or gets parked for reuse
///   - a parked candidate is the first thing to go when the cap is reached,
///     least-referenced first
///
/// The saturation ratio keeps headroom for fast movers. With every slot handed out,
/// a player in a fast car would have nothing left to take on the next tick.
///
/// Vehicles get one more tier on top: a recency cache, because respawning a vehicle in
/// place is much cheaper than destroying and recreating it. Vehicles somebody just used
/// are pinned for a while so they don't vanish from under a player who walked away.
///
/// If the cap is configured below what the players demand at once there's nothing to
/// reclaim, and the pass fails with CapacityExhausted. That's logged and the pass is
/// skipped, the server keeps running with fewer entities than it wanted.
struct capacity;
