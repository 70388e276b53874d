use crate::prelude::*;
use crate::config::StreamerConfig;
use crate::disposal::DisposalQueue;
use crate::factory::Lifecycle;
use crate::streamer::Streamer;

#[derive(Debug, Clone)]
struct Observer {
    position: V3<f32>,
    // exactly the entities this observer holds a reference on
    visible: HashSet<EntityId>,
}

/// Keeps the live entities of one kind within `max_visible`, across every observer.
///
/// Each observer counts a reference on the entities closest to it. An entity becomes
/// live on its first reference and stops being live when the last one is dropped,
/// either right away or, with the `lru` tier, once it's evicted from the disposal
/// queue to make room for something else.
///
/// What "becoming live" means is up to the [`Lifecycle`] `L`.
#[derive(Debug)]
pub struct CapacityManager<L = ()> {
    streamer: Streamer,
    saturation_ratio: f64,
    disposal: Option<DisposalQueue>,

    // ascending pid is the order observers are reconciled in
    observers: BTreeMap<usize, Observer>,
    live: HashSet<EntityId>,

    pub lifecycle: L,
}
impl<L> CapacityManager<L> {
    pub fn new(owner: OwnerId, config: &StreamerConfig, lifecycle: L) -> Self {
        Self {
            streamer: Streamer::new(owner, config.max_visible, config.streaming_distance),
            saturation_ratio: config.saturation_ratio,
            disposal: config.lru.then(DisposalQueue::new),
            observers: BTreeMap::new(),
            live: HashSet::new(),
            lifecycle,
        }
    }
    pub fn streamer(&self) -> &Streamer {
        &self.streamer
    }
    pub fn max_visible(&self) -> usize {
        self.streamer.max_visible()
    }
    /// Number of registered candidates.
    pub fn len(&self) -> usize {
        self.streamer.len()
    }
    pub fn is_empty(&self) -> bool {
        self.streamer.is_empty()
    }
    /// Entities counted against `max_visible`, parked ones included.
    pub fn live_count(&self) -> usize {
        self.live.len()
    }
    /// Entities parked in the disposal queue.
    pub fn cached_count(&self) -> usize {
        self.disposal.as_ref().map_or(0, DisposalQueue::len)
    }
    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }
    pub fn is_live(&self, entity: EntityId) -> bool {
        self.live.contains(&entity)
    }
    pub fn is_cached(&self, entity: EntityId) -> bool {
        self.disposal.as_ref().map_or(false, |queue| queue.contains(entity))
    }
    /// Everything currently live. This is what a consumer materializes.
    pub fn selection(&self) -> &HashSet<EntityId> {
        &self.live
    }
    /// The entities `pid` holds a reference on.
    pub fn visible_to(&self, pid: usize) -> Option<&HashSet<EntityId>> {
        self.observers.get(&pid).map(|observer| &observer.visible)
    }
    pub fn stream_for_observer<D>(&self, entities: &Entities<D>, position: V3<f32>, limit: Option<usize>) -> Vec<EntityId> {
        self.streamer.stream_for_observer(entities, position, limit)
    }
    pub fn relocate<D>(&self, entities: &mut Entities<D>, entity: EntityId, position: V3<f32>) -> Result<(), StreamError> {
        self.streamer.relocate(entities, entity, position)
    }

    pub fn on_observer_connect(&mut self, pid: usize, position: V3<f32>) {
        let observer = self.observers.entry(pid).or_insert_with(|| Observer {
            position,
            visible: HashSet::new(),
        });
        observer.position = position;
    }
    /// Positions are only sampled by the next pass.
    pub fn on_observer_move(&mut self, pid: usize, position: V3<f32>) {
        if let Some(observer) = self.observers.get_mut(&pid) {
            observer.position = position;
        }
    }

    /// Slots handed to each observer this pass.
    fn observer_budget(&self) -> usize {
        if self.observers.is_empty() {
            return 0;
        }
        let share = self.streamer.max_visible() as f64 * self.saturation_ratio / self.observers.len() as f64;
        // ratios like 0.29 don't multiply out exactly
        (share + 1e-9).floor() as usize
    }
}
impl<L> CapacityManager<L> {
    /// Reconciles every observer once.
    ///
    /// Runs in three sweeps over all observers, so one observer's shrinking set makes
    /// room for another's before anything new is created:
    ///   - references on entities that are already live are taken first, so an entity
    ///     handed from one observer to another is never destroyed in between
    ///   - every reference that left an observer's set is dropped
    ///   - the remaining additions are made, creating or evicting as needed
    ///
    /// An error stops the last sweep. Every cached set still mirrors the references held,
    /// and the next pass picks up where this one stopped.
    pub fn stream<D>(&mut self, entities: &mut Entities<D>) -> Result<(), StreamError>
    where
        L: Lifecycle<D>,
    {
        let budget = self.observer_budget();
        let mut wanted: Vec<(usize, Vec<EntityId>)> = Vec::with_capacity(self.observers.len());
        for (pid, observer) in &self.observers {
            wanted.push((*pid, self.streamer.stream_for_observer(entities, observer.position, Some(budget))));
        }

        for (pid, closest) in &wanted {
            for entity in closest {
                let live = entities.get(*entity).map_or(false, |record| record.active_references() > 0);
                if (live || self.is_cached(*entity)) && !self.holds(*pid, *entity) {
                    self.take_observer_reference(entities, *pid, *entity)?;
                }
            }
        }
        for (pid, closest) in &wanted {
            let leaving: Vec<EntityId> = self.observers.get(pid)
                .map(|observer| {
                    observer.visible.iter()
                        .filter(|entity| !closest.contains(*entity))
                        .copied()
                        .collect()
                })
                .unwrap_or_default();
            for entity in leaving {
                self.drop_observer_reference(entities, *pid, entity, true)?;
            }
        }
        for (pid, closest) in &wanted {
            for entity in closest {
                if !self.holds(*pid, *entity) {
                    self.take_observer_reference(entities, *pid, *entity)?;
                }
            }
        }
        Ok(())
    }

    pub fn add_entity_reference<D>(&mut self, entities: &mut Entities<D>, entity: EntityId) -> Result<(), StreamError>
    where
        L: Lifecycle<D>,
    {
        if !self.streamer.contains(entity) {
            return Err(StreamError::InvalidState("entity is not part of this streamer"));
        }
        let record = entities.get(entity).ok_or(StreamError::UnknownEntity(entity))?;
        if record.active_references() == 0 {
            let resurrected = self.disposal.as_mut().map_or(false, |queue| queue.remove(entity));
            if resurrected {
                log::trace!("resurrected {entity:?} from the disposal queue");
            } else {
                if self.live.len() >= self.streamer.max_visible() {
                    self.evict(entities)?;
                }
                self.lifecycle.create_entity(entity, record);
                self.live.insert(entity);
            }
        }
        if let Some(record) = entities.get_mut(entity) {
            record.declare_reference_added();
        }
        Ok(())
    }

    /// With `lru`, and an lru tier configured, an entity losing its last reference is
    /// parked instead of destroyed.
    pub fn delete_entity_reference<D>(&mut self, entities: &mut Entities<D>, entity: EntityId, lru: bool) -> Result<(), StreamError>
    where
        L: Lifecycle<D>,
    {
        let record = entities.get_mut(entity).ok_or(StreamError::UnknownEntity(entity))?;
        record.declare_reference_deleted()?;
        if record.active_references() > 0 {
            return Ok(());
        }
        match &mut self.disposal {
            Some(queue) if lru => {
                queue.push(entity, record.total_references());
            }
            _ => {
                self.live.remove(&entity);
                self.lifecycle.delete_entity(entity, record);
            }
        }
        Ok(())
    }

    /// Registers `entity`. Unless `lazy`, every observer already in range references it
    /// right away instead of on the next pass.
    pub fn add<D>(&mut self, entities: &mut Entities<D>, entity: EntityId, lazy: bool) -> Result<bool, StreamError>
    where
        L: Lifecycle<D>,
    {
        if !self.streamer.add(entities, entity)? {
            return Ok(false);
        }
        if lazy {
            return Ok(true);
        }
        let position = entities.get(entity).ok_or(StreamError::UnknownEntity(entity))?.position();
        let max_distance = self.streamer.streaming_distance() * self.streamer.streaming_distance();
        let in_range: Vec<usize> = self.observers.iter()
            .filter(|(_, observer)| observer.position.distance_squared(position) <= max_distance)
            .map(|(pid, _)| *pid)
            .collect();
        for pid in in_range {
            self.take_observer_reference(entities, pid, entity)?;
        }
        Ok(true)
    }

    /// Deregisters `entity`, forcing every observer holding it to let go.
    pub fn delete<D>(&mut self, entities: &mut Entities<D>, entity: EntityId) -> Result<bool, StreamError>
    where
        L: Lifecycle<D>,
    {
        if !self.streamer.contains(entity) {
            return Ok(false);
        }
        let holders: Vec<usize> = self.observers.iter()
            .filter(|(_, observer)| observer.visible.contains(&entity))
            .map(|(pid, _)| *pid)
            .collect();
        for pid in holders {
            self.drop_observer_reference(entities, pid, entity, false)?;
        }
        if self.disposal.as_mut().map_or(false, |queue| queue.remove(entity)) {
            self.live.remove(&entity);
            if let Some(record) = entities.get(entity) {
                self.lifecycle.delete_entity(entity, record);
            }
        }
        self.streamer.delete(entities, entity)
    }

    /// Drops every reference `pid` held. Those entities are destroyed right away rather
    /// than parked, unless another observer still holds them.
    pub fn on_observer_disconnect<D>(&mut self, entities: &mut Entities<D>, pid: usize)
    where
        L: Lifecycle<D>,
    {
        let Some(observer) = self.observers.remove(&pid) else {
            return;
        };
        for entity in observer.visible {
            if let Err(e) = self.delete_entity_reference(entities, entity, false) {
                log::error!("observer {pid} couldn't release {entity:?}: {e}");
            }
        }
    }

    /// Destroys everything live and deregisters every candidate.
    pub fn clear<D>(&mut self, entities: &mut Entities<D>)
    where
        L: Lifecycle<D>,
    {
        for observer in self.observers.values_mut() {
            observer.visible.clear();
        }
        if let Some(queue) = &mut self.disposal {
            queue.clear();
        }
        for entity in self.live.drain() {
            if let Some(record) = entities.get(entity) {
                self.lifecycle.delete_entity(entity, record);
            }
        }
        self.streamer.clear(entities);
    }

    fn holds(&self, pid: usize, entity: EntityId) -> bool {
        self.observers.get(&pid).map_or(false, |observer| observer.visible.contains(&entity))
    }
    fn take_observer_reference<D>(&mut self, entities: &mut Entities<D>, pid: usize, entity: EntityId) -> Result<(), StreamError>
    where
        L: Lifecycle<D>,
    {
        self.add_entity_reference(entities, entity)?;
        if let Some(observer) = self.observers.get_mut(&pid) {
            observer.visible.insert(entity);
        }
        Ok(())
    }
    fn drop_observer_reference<D>(&mut self, entities: &mut Entities<D>, pid: usize, entity: EntityId, lru: bool) -> Result<(), StreamError>
    where
        L: Lifecycle<D>,
    {
        if let Some(observer) = self.observers.get_mut(&pid) {
            observer.visible.remove(&entity);
        }
        self.delete_entity_reference(entities, entity, lru)
    }
    fn evict<D>(&mut self, entities: &Entities<D>) -> Result<(), StreamError>
    where
        L: Lifecycle<D>,
    {
        let max_visible = self.streamer.max_visible();
        let victim = self.disposal.as_mut()
            .and_then(DisposalQueue::pop)
            .ok_or(StreamError::CapacityExhausted { max_visible })?;
        self.live.remove(&victim);
        match entities.get(victim) {
            Some(record) => self.lifecycle.delete_entity(victim, record),
            None => log::warn!("evicted {victim:?} after its record was released"),
        }
        log::debug!("evicted {victim:?}, {max_visible} entities were live");
        Ok(())
    }
}
