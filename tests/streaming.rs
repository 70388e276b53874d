mod common;

use std::collections::HashSet;

use entstream::types::{EntityId, OwnerId, V3};
use entstream::{CapacityManager, Entities, Instances, StreamError, Streamer, StreamerConfig};

use common::{grid, init_logging, Host};

fn brute_force(entities: &Entities<()>, ids: &[EntityId], at: V3<f32>, radius: f32, k: usize) -> Vec<EntityId> {
    let mut in_range: Vec<(f32, usize)> = ids.iter().enumerate()
        .map(|(i, id)| (entities.get(*id).unwrap().position().distance_squared(at), i))
        .filter(|(distance, _)| *distance <= radius * radius)
        .collect();
    in_range.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
    in_range.into_iter().take(k).map(|(_, i)| ids[i]).collect()
}

fn config(max_visible: usize, streaming_distance: f32, lru: bool) -> StreamerConfig {
    StreamerConfig { max_visible, streaming_distance, saturation_ratio: 1.0, lru }
}

#[test]
fn nearest_ten_on_a_grid() {
    let mut entities = Entities::new();
    let ids = grid(&mut entities, (), 10, 10.0);
    let mut streamer = Streamer::new(OwnerId(0), 10, 300.0);
    for id in &ids {
        streamer.add(&mut entities, *id).unwrap();
    }
    let at = V3(52.0, 48.0, 0.0);
    let closest = streamer.stream_for_observer(&entities, at, None);
    assert_eq!(closest.len(), 10);
    assert_eq!(closest, brute_force(&entities, &ids, at, 300.0, 10));
    // (50, 50) is the single nearest point
    assert_eq!(closest[0], ids[55]);
}

#[test]
fn nearest_matches_brute_force_everywhere() {
    let mut entities = Entities::new();
    let ids = grid(&mut entities, (), 12, 7.0);
    let mut streamer = Streamer::new(OwnerId(0), 9, 20.0);
    for id in &ids {
        streamer.add(&mut entities, *id).unwrap();
    }
    for (x, y) in [(0.0, 0.0), (3.5, 3.5), (40.0, 12.25), (77.0, 77.0), (-15.0, 30.0), (200.0, 200.0)] {
        let at = V3(x, y, 0.0);
        let expected = brute_force(&entities, &ids, at, 20.0, 9);
        assert_eq!(streamer.stream_for_observer(&entities, at, None), expected, "at {at:?}");
        let expected = brute_force(&entities, &ids, at, 20.0, 3);
        assert_eq!(streamer.stream_for_observer(&entities, at, Some(3)), expected, "at {at:?}");
    }
}

#[test]
fn standing_on_an_entity_streams_only_that_entity() {
    let mut entities = Entities::new();
    let ids = grid(&mut entities, (), 10, 10.0);
    let mut streamer = Streamer::new(OwnerId(0), 10, 5.0);
    for id in &ids {
        streamer.add(&mut entities, *id).unwrap();
    }
    let at = entities.get(ids[23]).unwrap().position();
    assert_eq!(streamer.stream_for_observer(&entities, at, None), vec![ids[23]]);

    assert_eq!(streamer.delete(&mut entities, ids[23]), Ok(true));
    assert!(streamer.stream_for_observer(&entities, at, None).is_empty());
}

#[test]
fn clearing_detaches_every_entity() {
    let mut entities = Entities::new();
    let ids = grid(&mut entities, (), 5, 10.0);
    let mut streamer = Streamer::new(OwnerId(0), 10, 5.0);
    for id in &ids {
        streamer.add(&mut entities, *id).unwrap();
    }
    assert_eq!(streamer.iter().collect::<HashSet<_>>(), ids.iter().copied().collect::<HashSet<_>>());
    streamer.clear(&mut entities);
    assert_eq!(streamer.len(), 0);
    for id in &ids {
        assert!(!entities.get(*id).unwrap().is_attached());
    }
}

#[test]
fn live_count_stays_within_capacity_while_observers_roam() {
    init_logging();
    let mut entities = Entities::new();
    let ids = grid(&mut entities, (), 20, 10.0);
    let mut manager = CapacityManager::new(OwnerId(0), &config(12, 40.0, true), Instances::new(Host::default()));
    for id in &ids {
        manager.add(&mut entities, *id, true).unwrap();
    }
    for pid in 0..3 {
        manager.on_observer_connect(pid, V3(0.0, 0.0, 0.0));
    }
    for step in 0..40 {
        for pid in 0..3 {
            let offset = (step * (pid + 1) * 7) as f32;
            manager.on_observer_move(pid, V3(offset % 190.0, (offset * 1.3) % 190.0, 0.0));
        }
        manager.stream(&mut entities).unwrap();
        assert!(manager.live_count() <= 12);
        assert_eq!(manager.lifecycle.len(), manager.live_count());
        assert_eq!(manager.lifecycle.factory.connected.len(), manager.live_count());
        for pid in 0..3 {
            assert!(manager.visible_to(pid).unwrap().len() <= 4);
        }
    }
}

#[test]
fn full_capacity_evicts_exactly_the_least_referenced() {
    let mut entities = Entities::new();
    let ids = grid(&mut entities, (), 1, 10.0);
    let more = grid(&mut entities, (), 3, 1000.0);
    let mut manager = CapacityManager::new(OwnerId(0), &config(3, 50.0, true), Instances::new(Host::default()));
    for id in ids.iter().chain(&more) {
        manager.add(&mut entities, *id, true).unwrap();
    }
    // give the first three different lifetime counts, then park them
    let parked = [more[0], more[1], ids[0]];
    for (times, id) in [3, 1, 2].into_iter().zip(parked) {
        for _ in 0..times {
            manager.add_entity_reference(&mut entities, id).unwrap();
            manager.delete_entity_reference(&mut entities, id, true).unwrap();
        }
    }
    assert_eq!(manager.live_count(), 3);
    let victim = manager.lifecycle.get(more[1]).unwrap();

    manager.add_entity_reference(&mut entities, more[2]).unwrap();
    assert_eq!(manager.lifecycle.factory.destroyed, vec![victim]);
    assert!(!manager.is_live(more[1]));
    assert!(manager.is_live(more[2]));
    assert_eq!(manager.live_count(), 3);
    assert_eq!(manager.lifecycle.factory.created.len(), 4);
}

#[test]
fn demand_above_capacity_fails_the_pass_without_corrupting_counts() {
    init_logging();
    let mut entities = Entities::new();
    let ids = grid(&mut entities, (), 4, 10.0);
    let mut manager = CapacityManager::new(OwnerId(0), &config(2, 100.0, false), Instances::new(Host::default()));
    manager.on_observer_connect(0, V3(0.0, 0.0, 0.0));
    manager.add(&mut entities, ids[0], false).unwrap();
    manager.add(&mut entities, ids[1], false).unwrap();
    assert_eq!(
        manager.add(&mut entities, ids[2], false),
        Err(StreamError::CapacityExhausted { max_visible: 2 }),
    );

    // the next pass trims back to the budget
    manager.stream(&mut entities).unwrap();
    assert_eq!(manager.live_count(), 2);
    let held: usize = ids.iter().map(|id| entities.get(*id).unwrap().active_references() as usize).sum();
    assert_eq!(held, manager.visible_to(0).unwrap().len());
}

#[test]
fn disconnecting_frees_what_nobody_else_sees() {
    let mut entities = Entities::new();
    let ids = grid(&mut entities, (), 10, 10.0);
    let mut manager = CapacityManager::new(OwnerId(0), &config(20, 25.0, false), Instances::new(Host::default()));
    for id in &ids {
        manager.add(&mut entities, *id, true).unwrap();
    }
    manager.on_observer_connect(0, V3(20.0, 20.0, 0.0));
    manager.on_observer_connect(1, V3(40.0, 20.0, 0.0));
    manager.stream(&mut entities).unwrap();

    let mine: HashSet<EntityId> = manager.visible_to(0).unwrap().clone();
    let theirs: HashSet<EntityId> = manager.visible_to(1).unwrap().clone();
    let exclusive = mine.difference(&theirs).count();
    assert!(exclusive > 0);
    let before = manager.live_count();

    manager.on_observer_disconnect(&mut entities, 0);
    assert_eq!(manager.live_count(), before - exclusive);
    assert!(manager.visible_to(0).is_none());
    for id in &mine {
        assert_eq!(manager.is_live(*id), theirs.contains(id));
    }
}

#[test]
fn re_added_entities_start_without_active_references() {
    let mut entities = Entities::new();
    let ids = grid(&mut entities, (), 1, 10.0);
    let mut manager = CapacityManager::new(OwnerId(0), &config(4, 25.0, false), ());
    manager.on_observer_connect(0, V3(0.0, 0.0, 0.0));
    manager.add(&mut entities, ids[0], false).unwrap();
    assert_eq!(entities.get(ids[0]).unwrap().active_references(), 1);

    manager.delete(&mut entities, ids[0]).unwrap();
    let mut other = Streamer::new(OwnerId(1), 4, 25.0);
    assert_eq!(other.add(&mut entities, ids[0]), Ok(true));
    let record = entities.get(ids[0]).unwrap();
    assert_eq!(record.active_references(), 0);
    assert_eq!(record.total_references(), 1);
}
