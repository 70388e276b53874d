use crate::prelude::*;

/// The candidate set of one kind of entity, answering nearest-K queries.
///
/// Entity records live in an [`Entities`] arena owned by the caller. The streamer only
/// keeps handles, and marks each member as attached to itself so an entity can't be
/// streamed twice.
#[derive(Debug)]
pub struct Streamer {
    id: OwnerId,
    max_visible: usize,
    streaming_distance: f32,

    // handle -> insertion sequence, the tie-break for equal distances
    members: HashMap<EntityId, u64>,
    next_sequence: u64,
}
impl Streamer {
    pub fn new(id: OwnerId, max_visible: usize, streaming_distance: f32) -> Self {
        Self {
            id,
            max_visible,
            streaming_distance,
            members: HashMap::new(),
            next_sequence: 0,
        }
    }
    pub fn id(&self) -> OwnerId {
        self.id
    }
    pub fn max_visible(&self) -> usize {
        self.max_visible
    }
    pub fn streaming_distance(&self) -> f32 {
        self.streaming_distance
    }
    pub fn len(&self) -> usize {
        self.members.len()
    }
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
    pub fn contains(&self, entity: EntityId) -> bool {
        self.members.contains_key(&entity)
    }
    pub fn iter(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.members.keys().copied()
    }

    /// Returns false if the entity was already a member.
    pub fn add<D>(&mut self, entities: &mut Entities<D>, entity: EntityId) -> Result<bool, StreamError> {
        if self.members.contains_key(&entity) {
            return Ok(false);
        }
        entities.get_mut(entity)
            .ok_or(StreamError::UnknownEntity(entity))?
            .attach_to_owner(self.id)?;
        self.members.insert(entity, self.next_sequence);
        self.next_sequence += 1;
        Ok(true)
    }
    /// Returns false if the entity wasn't a member.
    ///
    /// A record that was already released from the arena is simply forgotten.
    pub fn delete<D>(&mut self, entities: &mut Entities<D>, entity: EntityId) -> Result<bool, StreamError> {
        if !self.members.contains_key(&entity) {
            return Ok(false);
        }
        if let Some(record) = entities.get_mut(entity) {
            record.detach_from_owner(self.id)?;
        }
        self.members.remove(&entity);
        Ok(true)
    }
    pub fn clear<D>(&mut self, entities: &mut Entities<D>) {
        for (entity, _) in self.members.drain() {
            if let Some(record) = entities.get_mut(entity) {
                // members are always attached to us
                let _ = record.detach_from_owner(self.id);
            }
        }
    }
    /// Moves a member. Observers see the change on the next pass.
    pub fn relocate<D>(&self, entities: &mut Entities<D>, entity: EntityId, position: V3<f32>) -> Result<(), StreamError> {
        if !self.members.contains_key(&entity) {
            return Err(StreamError::InvalidState("entity is not part of this streamer"));
        }
        entities.get_mut(entity)
            .ok_or(StreamError::UnknownEntity(entity))?
            .set_position(position);
        Ok(())
    }

    /// The `min(limit, in range)` members closest to `position`, closest first.
    ///
    /// Equal distances are ordered by insertion into the streamer, so the result is fully
    /// determined by the inputs. `limit` defaults to `max_visible`.
    pub fn stream_for_observer<D>(&self, entities: &Entities<D>, position: V3<f32>, limit: Option<usize>) -> Vec<EntityId> {
        let limit = limit.unwrap_or(self.max_visible);
        let max_distance = self.streaming_distance * self.streaming_distance;

        let mut in_range: Vec<(f32, u64, EntityId)> = self.members.iter()
            .filter_map(|(&entity, &sequence)| {
                let distance = entities.get(entity)?.position().distance_squared(position);
                (distance <= max_distance).then_some((distance, sequence, entity))
            })
            .collect();

        let order = |a: &(f32, u64, EntityId), b: &(f32, u64, EntityId)| {
            a.0.total_cmp(&b.0).then(a.1.cmp(&b.1))
        };
        if limit == 0 {
            return vec![];
        }
        if in_range.len() > limit {
            in_range.select_nth_unstable_by(limit - 1, order);
            in_range.truncate(limit);
        }
        in_range.sort_unstable_by(order);
        in_range.into_iter().map(|(_, _, entity)| entity).collect()
    }
}
