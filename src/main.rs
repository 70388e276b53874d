use std::collections::HashSet;
use std::time::*;

use entstream::types::{InstanceId, V3, TICKS_PER_SECOND};
use entstream::world::ObjectSpawn;
use entstream::{Factory, ServerConfig, VehicleSpawn, World};

/// Stands in for the host platform: hands out ids and logs what it was asked to do.
#[derive(Debug, Default)]
struct Host {
    kind: &'static str,
    next: u32,
    connected: HashSet<InstanceId>,
}
impl Host {
    fn new(kind: &'static str) -> Self {
        Self { kind, ..Self::default() }
    }
}
impl<D: std::fmt::Debug> Factory<D> for Host {
    fn create_instance(&mut self, descriptor: &D, position: V3<f32>) -> InstanceId {
        self.next += 1;
        let instance = InstanceId(self.next);
        self.connected.insert(instance);
        log::trace!("created {} {instance:?} {descriptor:?} at {position:?}", self.kind);
        instance
    }
    fn destroy_instance(&mut self, instance: InstanceId) {
        self.connected.remove(&instance);
        log::trace!("destroyed {} {instance:?}", self.kind);
    }
    fn is_connected(&self, instance: InstanceId) -> bool {
        self.connected.contains(&instance)
    }
    fn respawn(&mut self, instance: InstanceId) {
        log::trace!("respawned {} {instance:?}", self.kind);
    }
}

/// Players walking in circles around the map.
struct Walker {
    pid: usize,
    centre: V3<f32>,
    radius: f32,
}
impl Walker {
    fn position(&self, tick: u32) -> V3<f32> {
        let angle = tick as f32 / (TICKS_PER_SECOND * 60) as f32 * std::f32::consts::TAU;
        V3(
            self.centre.x + self.radius * angle.cos(),
            self.centre.y + self.radius * angle.sin(),
            self.centre.z,
        )
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let mut args = std::env::args_os();

    let config = if let Some(path) = args.nth(1) {
        ServerConfig::from_path(path)?
    } else {
        ServerConfig::default()
    };
    let mut world = World::new(&config, Host::new("vehicle"), Host::new("object"));

    for x in -20i32..20 {
        for y in -20..20 {
            let position = V3(x as f32 * 50.0, y as f32 * 50.0, 10.0);
            world.spawn_vehicle(VehicleSpawn::new(400 + ((x * y).rem_euclid(200)) as u16), position)?;
            world.spawn_object(ObjectSpawn { model: 1225, rotation: V3(0.0, 0.0, 0.0) }, V3(position.x + 25.0, position.y + 25.0, 10.0))?;
        }
    }
    let walkers: Vec<Walker> = (0..8)
        .map(|pid| Walker {
            pid,
            centre: V3(pid as f32 * 100.0 - 400.0, 0.0, 10.0),
            radius: 300.0 + pid as f32 * 50.0,
        })
        .collect();
    for walker in &walkers {
        world.login(walker.pid, walker.position(0));
    }
    log::info!("streaming {} vehicles and {} objects", world.vehicles().len(), world.objects().len());

    let starttime = Instant::now();
    loop {
        let next_tick_due = starttime + world.next_tick() * Duration::from_millis(50);
        if let Some(wait) = next_tick_due.checked_duration_since(Instant::now()) {
            std::thread::sleep(wait);
        }

        let time_passed_in_ticks = (Instant::now() - starttime).as_millis() / 50;
        for walker in &walkers {
            world.request_move(walker.pid, walker.position(time_passed_in_ticks as u32));
        }
        world.tick_until(time_passed_in_ticks as u32);
    }
}
