use serde::{Deserialize, Serialize};

/// Ticks per second of the world loop. One tick is 50ms.
pub const TICKS_PER_SECOND: u32 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct V3<T> {
    pub x: T,
    pub y: T,
    pub z: T,
}
#[allow(non_snake_case)]
pub const fn V3<T>(x: T, y: T, z: T) -> V3<T> {
    V3 { x, y, z }
}
impl V3<f32> {
    pub fn distance_squared(self, other: V3<f32>) -> f32 {
        let (dx, dy, dz) = (self.x - other.x, self.y - other.y, self.z - other.z);
        dx * dx + dy * dy + dz * dz
    }
}

/// Stable handle into a [`SlotMap`](crate::SlotMap).
///
/// The generation makes a handle to a released slot dead forever, even once the slot
/// gets reused by another value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle {
    pub(crate) idx: u32,
    pub(crate) generation: u32,
}
impl Handle {
    pub fn index(self) -> usize {
        self.idx as usize
    }
}

pub type EntityId = Handle;

/// Identifies a streamer an entity can be attached to.
///
/// Streamers sharing an arena must be given distinct ids. Whoever owns the arena hands
/// them out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OwnerId(pub u32);

/// A materialized instance, as handed out by a [`Factory`](crate::Factory).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstanceId(pub u32);
