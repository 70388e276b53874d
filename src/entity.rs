use crate::prelude::*;

/// Arena holding every entity record of one kind, keyed by [`EntityId`].
pub type Entities<D> = SlotMap<Entity<D>>;

/// A candidate for streaming. `D` describes how to spawn it and is opaque to the engine.
#[derive(Debug, Clone)]
pub struct Entity<D> {
    pub descriptor: D,
    position: V3<f32>,

    // observers currently counting this entity
    active_references: u32,
    // lifetime counter, the eviction priority. Never decreases.
    total_references: u64,

    owner: Option<OwnerId>,
}
impl<D> Entity<D> {
    pub fn new(descriptor: D, position: V3<f32>) -> Self {
        Self {
            descriptor,
            position,
            active_references: 0,
            total_references: 0,
            owner: None,
        }
    }
    pub fn position(&self) -> V3<f32> {
        self.position
    }
    pub fn set_position(&mut self, position: V3<f32>) {
        self.position = position;
    }
    pub fn active_references(&self) -> u32 {
        self.active_references
    }
    pub fn total_references(&self) -> u64 {
        self.total_references
    }

    pub fn declare_reference_added(&mut self) {
        self.active_references += 1;
        self.total_references += 1;
    }
    pub fn declare_reference_deleted(&mut self) -> Result<(), StreamError> {
        self.active_references = self.active_references.checked_sub(1)
            .ok_or(StreamError::InvalidState("entity has no active references to delete"))?;
        Ok(())
    }

    pub fn owner(&self) -> Option<OwnerId> {
        self.owner
    }
    pub fn is_attached(&self) -> bool {
        self.owner.is_some()
    }
    pub fn attach_to_owner(&mut self, owner: OwnerId) -> Result<(), StreamError> {
        if self.owner.is_some() {
            return Err(StreamError::InvalidState("entity is already attached to a streamer"));
        }
        self.owner = Some(owner);
        self.active_references = 0;
        Ok(())
    }
    pub fn detach_from_owner(&mut self, owner: OwnerId) -> Result<(), StreamError> {
        match self.owner {
            None => Err(StreamError::InvalidState("entity is not attached to a streamer")),
            Some(current) if current != owner => {
                Err(StreamError::InvalidState("entity is attached to a different streamer"))
            }
            Some(_) => {
                self.owner = None;
                Ok(())
            }
        }
    }
}
