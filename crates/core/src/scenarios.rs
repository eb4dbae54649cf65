//! End-to-end tests: wire frames in, host calls and mirror state out

use std::sync::Arc;
use std::thread;

use coopbridge_engine::{PropertyDesc, RawObject};
use coopbridge_sdk::PROPERTY_FLAG_PARM;
use proptest::prelude::*;

use crate::config::CoreConfig;
use crate::mirror::{AvatarState, InputFlags, Season, Vec3};
use crate::net::{
    EnvClockAdvance, EnvSeason, HumanDespawn, HumanSpawn, HumanUpdate, Message,
};
use crate::runtime::Runtime;
use crate::status::BridgeStatus;
use crate::testing::FakeHost;
use crate::thread::GameThread;

struct World {
    host: Arc<FakeHost>,
    runtime: Runtime,
    frame: u64,
}

impl World {
    fn new() -> Self {
        Self::with_config(CoreConfig::default())
    }

    fn with_config(config: CoreConfig) -> Self {
        let host = Arc::new(FakeHost::new());
        let runtime = Runtime::new(
            host.clone(),
            GameThread::current(),
            Arc::new(BridgeStatus::new()),
            config,
        );
        Self {
            host,
            runtime,
            frame: 0,
        }
    }

    fn add_season_changer(&self) -> RawObject {
        let class = self.host.add_class("Game.SeasonChanger");
        self.host
            .add_function(class, "SetCurrentSeason", param("NewSeason", 1));
        self.host.add_instance(class, "Level.SeasonChanger_0")
    }

    fn add_schedulers(&self, count: usize) -> Vec<RawObject> {
        let class = self.host.add_class("Game.Scheduler");
        self.host
            .add_function(class, "AdvanceHours", param("InHours", 4));
        (0..count)
            .map(|n| self.host.add_instance(class, &format!("Level.Scheduler_{}", n)))
            .collect()
    }

    fn send(&self, message: Message) {
        let frame = message.encode().unwrap();
        self.runtime.channel().receive_frame(&frame).unwrap();
    }

    fn run_frame(&mut self) -> usize {
        self.frame += 1;
        self.runtime.run_frame(self.frame)
    }

    fn hours_dispatched(&self) -> Vec<i32> {
        self.host
            .calls_to("AdvanceHours")
            .iter()
            .map(|c| i32::from_ne_bytes([c.params[0], c.params[1], c.params[2], c.params[3]]))
            .collect()
    }
}

fn param(name: &str, size: usize) -> Vec<PropertyDesc> {
    vec![PropertyDesc {
        name: name.to_string(),
        offset: 0,
        size,
        flags: PROPERTY_FLAG_PARM,
    }]
}

fn avatar_at(id: u64, x: f32, y: f32, z: f32) -> AvatarState {
    AvatarState::new(id).with_position(Vec3::new(x, y, z))
}

#[test]
fn season_message_reaches_host() {
    let mut world = World::new();
    let changer = world.add_season_changer();

    world.send(Message::EnvSeason(EnvSeason { season: 3 }));
    world.run_frame();

    assert_eq!(world.runtime.mirror().season(), Season::Spring);
    let calls = world.host.calls_to("SetCurrentSeason");
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].target, changer);
    assert_eq!(calls[0].params, vec![3]);
}

#[test]
fn invalid_season_is_dropped() {
    let mut world = World::new();
    world.add_season_changer();

    let frame = Message::EnvSeason(EnvSeason { season: 0 }).encode().unwrap();
    assert!(world.runtime.channel().receive_frame(&frame).is_err());
    world.run_frame();

    assert_eq!(world.runtime.mirror().season(), Season::Invalid);
    assert!(world.host.calls().is_empty());
    assert_eq!(world.runtime.channel().stats().invalid, 1);
}

#[test]
fn clock_advance_hits_every_scheduler() {
    let mut world = World::new();
    let schedulers = world.add_schedulers(3);

    world.send(Message::EnvClockAdvance(EnvClockAdvance { hours: 5 }));
    world.run_frame();

    let calls = world.host.calls_to("AdvanceHours");
    assert_eq!(calls.len(), 3);
    assert_eq!(world.hours_dispatched(), vec![5, 5, 5]);
    let targets: Vec<RawObject> = calls.iter().map(|c| c.target).collect();
    assert_eq!(targets, schedulers);
    assert_eq!(world.runtime.mirror().clock(), 5);
}

#[test]
fn update_after_spawn_moves_avatar() {
    let mut world = World::new();
    world.send(Message::HumanSpawn(HumanSpawn {
        state: avatar_at(42, 1.0, 2.0, 3.0),
    }));
    world.send(Message::HumanUpdate(HumanUpdate {
        state: avatar_at(42, 4.0, 5.0, 6.0),
    }));
    world.run_frame();

    let avatar = world.runtime.mirror().avatar(42).unwrap();
    assert_eq!(avatar.position(), Vec3::new(4.0, 5.0, 6.0));
}

#[test]
fn unspawned_update_expires() {
    let mut world = World::new();
    world.send(Message::HumanUpdate(HumanUpdate {
        state: avatar_at(99, 1.0, 1.0, 1.0),
    }));

    for _ in 0..59 {
        world.run_frame();
    }
    assert_eq!(world.runtime.channel().pending_updates(), 1);

    world.run_frame();
    assert_eq!(world.runtime.channel().pending_updates(), 0);
    assert_eq!(world.runtime.channel().stats().expired, 1);

    // A late spawn starts from its own initial state
    world.send(Message::HumanSpawn(HumanSpawn {
        state: avatar_at(99, 0.0, 0.0, 0.0),
    }));
    world.run_frame();
    assert_eq!(
        world.runtime.mirror().avatar(99).map(|a| a.position()),
        Some(Vec3::ZERO)
    );
}

#[test]
fn never_spawned_avatar_is_absent() {
    let mut world = World::new();
    world.send(Message::HumanUpdate(HumanUpdate {
        state: avatar_at(99, 1.0, 1.0, 1.0),
    }));
    for _ in 0..60 {
        world.run_frame();
    }
    assert!(world.runtime.mirror().avatar(99).is_none());
}

#[test]
fn local_authority_wins() {
    let mut world = World::new();
    let mirror = world.runtime.mirror().clone();
    mirror.set_local_entity(7);
    world
        .runtime
        .channel()
        .send_local_update(avatar_at(7, 10.0, 0.0, 0.0))
        .unwrap();

    world.send(Message::HumanUpdate(HumanUpdate {
        state: avatar_at(7, -50.0, 0.0, 0.0),
    }));
    world.run_frame();

    assert_eq!(mirror.avatar(7).map(|a| a.position().x), Some(10.0));
    assert_eq!(world.runtime.channel().pending_updates(), 0);
}

#[test]
fn lookups_are_idempotent() {
    let world = World::new();
    let changer = world.add_season_changer();
    let registry = world.runtime.registry();

    let first = registry.lookup("Level.SeasonChanger_0").unwrap();
    for _ in 0..10 {
        assert_eq!(registry.lookup("Level.SeasonChanger_0").unwrap(), first);
    }
    assert_eq!(first.raw(), changer);

    for _ in 0..3 {
        assert!(registry.lookup("Level.Missing").is_err());
    }
}

#[test]
fn season_stays_in_bounds() {
    let mut world = World::new();
    world.add_season_changer();

    for value in [2u8, 0, 7, 4, 255, 1] {
        let frame = Message::EnvSeason(EnvSeason { season: value }).encode().unwrap();
        let _ = world.runtime.channel().receive_frame(&frame);
        world.run_frame();
        assert!(world.runtime.mirror().season().is_target());
    }
    assert_eq!(world.runtime.mirror().season(), Season::Fall);

    let applied: Vec<Vec<u8>> = world
        .host
        .calls_to("SetCurrentSeason")
        .into_iter()
        .map(|c| c.params)
        .collect();
    assert_eq!(applied, vec![vec![2], vec![4], vec![1]]);
}

#[test]
fn clock_deltas_survive_late_scheduler() {
    let mut world = World::new();
    let deltas = [3, -1, i32::MAX, 2];

    // No scheduler yet: the mirror clock moves, host effects wait
    for hours in deltas {
        world.send(Message::EnvClockAdvance(EnvClockAdvance { hours }));
    }
    world.run_frame();
    assert!(world.hours_dispatched().is_empty());
    assert!(world.runtime.mirror().has_pending_effects());

    world.add_schedulers(1);
    world.run_frame();

    let dispatched = world.hours_dispatched();
    assert_eq!(dispatched, deltas.to_vec());
    let total = dispatched.iter().fold(0i32, |acc, h| acc.wrapping_add(*h));
    let expected = deltas.iter().fold(0i32, |acc, h| acc.wrapping_add(*h));
    assert_eq!(total, expected);
    assert!(!world.runtime.mirror().has_pending_effects());
}

#[test]
fn coalesced_updates_keep_final_state() {
    let mut config = CoreConfig::default();
    config.scheduler.soft_cap = 8;
    let mut world = World::with_config(config);

    for id in [1u64, 2] {
        world.send(Message::HumanSpawn(HumanSpawn {
            state: AvatarState::new(id),
        }));
    }
    world.run_frame();

    for step in 0..100 {
        for id in [1u64, 2] {
            let mut state = avatar_at(id, step as f32, id as f32, 0.0);
            state.input = InputFlags::from_bits_retain(step);
            world.send(Message::HumanUpdate(HumanUpdate { state }));
        }
    }
    world.run_frame();

    for id in [1u64, 2] {
        let avatar = world.runtime.mirror().avatar(id).unwrap();
        assert_eq!(avatar.position(), Vec3::new(99.0, id as f32, 0.0));
        assert_eq!(avatar.input.bits(), 99);
    }
    assert!(world.runtime.scheduler().stats().coalesced > 0);
}

#[test]
fn despawn_after_spawn_removes_avatar() {
    let mut world = World::new();
    world.send(Message::HumanSpawn(HumanSpawn {
        state: AvatarState::new(5),
    }));
    world.send(Message::HumanUpdate(HumanUpdate {
        state: avatar_at(5, 1.0, 0.0, 0.0),
    }));
    world.send(Message::HumanDespawn(HumanDespawn { entity_id: 5 }));
    world.send(Message::HumanUpdate(HumanUpdate {
        state: avatar_at(5, 2.0, 0.0, 0.0),
    }));
    world.run_frame();

    assert!(world.runtime.mirror().avatar(5).is_none());
    // The trailing update waits for a respawn that never comes
    assert_eq!(world.runtime.channel().pending_updates(), 1);
}

#[test]
fn concurrent_receivers_keep_per_entity_order() {
    const PRODUCERS: u64 = 4;
    const PER_PRODUCER: u32 = 200;

    let mut world = World::new();
    for id in 0..PRODUCERS {
        world.send(Message::HumanSpawn(HumanSpawn {
            state: AvatarState::new(id),
        }));
    }
    world.run_frame();

    let handles: Vec<_> = (0..PRODUCERS)
        .map(|id| {
            let channel = world.runtime.channel().clone();
            thread::spawn(move || {
                for step in 0..PER_PRODUCER {
                    let frame = Message::HumanUpdate(HumanUpdate {
                        state: avatar_at(id, step as f32, 0.0, 0.0),
                    })
                    .encode()
                    .unwrap();
                    channel.receive_frame(&frame).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let executed = world.run_frame();
    assert_eq!(executed, (PRODUCERS * PER_PRODUCER as u64) as usize);
    for id in 0..PRODUCERS {
        let avatar = world.runtime.mirror().avatar(id).unwrap();
        assert_eq!(avatar.position().x, (PER_PRODUCER - 1) as f32);
    }
}

proptest! {
    #[test]
    fn clock_sum_matches_dispatched(deltas in prop::collection::vec(any::<i32>(), 1..24)) {
        let mut world = World::new();
        world.add_schedulers(1);

        for &hours in &deltas {
            world.send(Message::EnvClockAdvance(EnvClockAdvance { hours }));
        }
        world.run_frame();

        let dispatched = world.hours_dispatched();
        let sent = deltas.iter().fold(0i32, |acc, h| acc.wrapping_add(*h));
        let applied = dispatched.iter().fold(0i32, |acc, h| acc.wrapping_add(*h));
        prop_assert_eq!(dispatched.len(), deltas.len());
        prop_assert_eq!(applied, sent);
    }
}
