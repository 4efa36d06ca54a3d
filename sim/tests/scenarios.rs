//! End-to-end matches driven through the `SimWorld` facade.

use lanesiege_sim::*;

fn world(step: f32) -> SimWorld {
    let config = SimConfig {
        fixed_timestep: step,
        seed: Some(3),
        spawn: SpawnConfig {
            enabled: false,
            ..SpawnConfig::default()
        },
        ..SimConfig::default()
    };
    SimWorld::with_config(config)
}

fn straight_lane(sim: &mut SimWorld, x: f32, zs: &[f32]) -> LaneId {
    let points: Vec<Position> = zs.iter().map(|z| Position::new(x, 0.0, *z)).collect();
    sim.register_lane_points(&points)
}

#[test]
fn tank_brings_down_structure_in_ten_hits() {
    let mut sim = world(0.1);
    let lane = straight_lane(&mut sim, 0.0, &[0.0, 10.0, 20.0]);
    let keep = sim.spawn_structure(Faction::Defender, Position::new(0.0, 0.0, 22.0), 200);
    let tank = sim.create_unit(Faction::Attacker, UnitKind::Tank, lane, 0).unwrap();

    sim.step(25.0);

    assert_eq!(sim.outcome(), Some(MatchOutcome::Victory));
    assert_eq!(sim.structure_health(keep), Some(0));
    assert!(!sim.is_unit_alive(tank));

    let events = sim.drain_events();
    let hits = events
        .iter()
        .filter(|e| matches!(e, SimEvent::StructureDamaged { amount: 20, .. }))
        .count();
    assert_eq!(hits, 10);
    assert!(events.contains(&SimEvent::GameOver { victory: true }));
    assert!(events.contains(&SimEvent::UnitDied {
        unit: tank,
        faction: Faction::Attacker,
        cause: DeathCause::SiegeComplete,
    }));

    // Time stops once the match is decided.
    let frozen = sim.current_tick();
    sim.step(5.0);
    assert_eq!(sim.current_tick(), frozen);
}

#[test]
fn fallen_keep_is_struck_once_and_ends_every_siege() {
    let mut sim = world(0.1);
    let lane = straight_lane(&mut sim, 0.0, &[0.0, 20.0]);
    let keep = sim.spawn_structure(Faction::Defender, Position::new(0.0, 0.0, 22.0), 20);
    let a = sim.create_unit(Faction::Attacker, UnitKind::Tank, lane, 1).unwrap();
    let b = sim.create_unit(Faction::Attacker, UnitKind::Tank, lane, 1).unwrap();

    for _ in 0..5 {
        sim.step(0.1);
    }

    assert_eq!(sim.structure_health(keep), Some(0));
    assert!(!sim.is_unit_alive(a));
    assert!(!sim.is_unit_alive(b));
    let strikes = sim
        .drain_events()
        .into_iter()
        .filter(|e| matches!(e, SimEvent::StructureDamaged { .. }))
        .count();
    assert_eq!(strikes, 1);
}

#[test]
fn zero_timestep_config_is_rejected() {
    let result = SimWorld::from_json_config(r#"{"fixed_timestep": 0.0}"#);
    assert!(matches!(result, Err(SimError::InvalidTimestep(_))));
}

#[test]
fn attacker_without_enemy_structure_is_removed() {
    let mut sim = world(0.1);
    let lane = straight_lane(&mut sim, 0.0, &[0.0, 10.0]);
    let unit = sim.create_unit(Faction::Attacker, UnitKind::Archer, lane, 0).unwrap();

    sim.step(0.1);

    assert!(!sim.is_unit_alive(unit));
    assert_eq!(sim.unit_count(), 0);
    let events = sim.drain_events();
    assert!(events.iter().any(|e| matches!(
        e,
        SimEvent::UnitDied {
            cause: DeathCause::StructureMissing,
            ..
        }
    )));
}

#[test]
fn warriors_meet_mid_lane_and_fight() {
    let mut sim = world(0.1);
    let lane = straight_lane(&mut sim, 0.0, &[0.0, 50.0, 100.0]);
    sim.spawn_structure(Faction::Attacker, Position::new(0.0, 0.0, -50.0), 10_000);
    sim.spawn_structure(Faction::Defender, Position::new(0.0, 0.0, 103.0), 10_000);

    let attacker = sim.create_unit(Faction::Attacker, UnitKind::Warrior, lane, 0).unwrap();
    let defender = sim.create_unit(Faction::Defender, UnitKind::Warrior, lane, 0).unwrap();
    // Defenders walk the lane from its far end.
    assert_eq!(sim.unit_position(defender).map(|p| p.z), Some(100.0));

    sim.step(25.0);

    assert!(!sim.is_unit_alive(defender));
    assert!(sim.is_unit_alive(attacker));
    let health = sim.unit_health(attacker).unwrap();
    assert!(health < 100 && health > 0, "attacker health {health}");
    assert!(sim.outcome().is_none());
}

#[test]
fn nearest_lane_by_centroid() {
    let mut sim = world(0.1);
    let left = straight_lane(&mut sim, -10.0, &[0.0, 20.0]);
    let mid = straight_lane(&mut sim, 0.0, &[0.0, 20.0]);
    let right = straight_lane(&mut sim, 10.0, &[0.0, 20.0]);

    assert_eq!(sim.find_nearest_lane(&Position::new(8.0, 0.0, 5.0)), Some(right));
    assert_eq!(sim.find_nearest_lane(&Position::new(-6.0, 0.0, 30.0)), Some(left));
    assert_eq!(sim.find_nearest_lane(&Position::new(1.0, 0.0, 10.0)), Some(mid));

    sim.deregister_lane(right).unwrap();
    assert_eq!(sim.find_nearest_lane(&Position::new(8.0, 0.0, 5.0)), Some(mid));
}

#[test]
fn spending_never_goes_negative() {
    let mut sim = world(0.1);
    assert!(sim.try_spend(50).unwrap());
    assert_eq!(sim.energy(), 50.0);

    assert!(!sim.try_spend(60).unwrap());
    assert_eq!(sim.energy(), 50.0);
    assert!(matches!(sim.try_spend(0), Err(SimError::InvalidSpendAmount(0))));

    // Regeneration is clamped to the pool maximum.
    sim.step(10.0);
    assert_eq!(sim.energy(), sim.max_energy());
}

#[test]
fn capacity_upgrades_escalate() {
    let mut sim = world(0.1);
    sim.step(3.0);
    assert_eq!(sim.energy(), 200.0);

    assert_eq!(sim.upgrade_cost(), 50);
    assert!(sim.upgrade_capacity().unwrap());
    assert_eq!(sim.max_energy(), 250.0);
    assert_eq!(sim.energy(), 200.0);
    assert_eq!(sim.upgrade_cost(), 100);
}

#[test]
fn placed_units_walk_their_lane() {
    let mut sim = world(0.1);
    let lane = straight_lane(&mut sim, 0.0, &[0.0, 40.0]);
    sim.spawn_structure(Faction::Defender, Position::new(0.0, 0.0, 45.0), 500);

    let mage = sim.place_unit(UnitKind::Mage, lane).unwrap().unwrap();
    assert_eq!(sim.energy(), 60.0);
    assert_eq!(sim.unit_lane(mage), Some(lane));

    for _ in 0..10 {
        sim.step(0.1);
    }
    let z = sim.unit_position(mage).map(|p| p.z).unwrap();
    assert!((z - 2.0).abs() < 0.05, "mage at z={z}");
    assert_eq!(sim.unit_state(mage), Some(UnitState::Moving));
}

#[test]
fn path_edits_are_validated() {
    let mut sim = world(0.1);
    let lane = straight_lane(&mut sim, 0.0, &[0.0, 10.0]);
    let unit = sim.create_unit(Faction::Attacker, UnitKind::Tank, lane, 0).unwrap();

    assert!(matches!(sim.set_waypoints(unit, Vec::new()), Err(SimError::EmptyWaypoints)));
    assert!(matches!(
        sim.set_waypoints(unit, vec![WaypointId(99)]),
        Err(SimError::UnknownWaypoint(WaypointId(99)))
    ));
    assert!(sim.set_starting_waypoint_index(unit, 2).is_err());
    assert!(matches!(
        sim.set_waypoints(UnitId(500), vec![WaypointId(0)]),
        Err(SimError::UnknownUnit(UnitId(500)))
    ));
    assert!(matches!(
        sim.create_unit(Faction::Attacker, UnitKind::Tank, lane, 5),
        Err(SimError::WaypointIndexOutOfRange { index: 5, len: 2 })
    ));
}

#[test]
fn spawner_never_repeats_a_lane() {
    let config = SimConfig {
        fixed_timestep: 0.1,
        seed: Some(21),
        spawn: SpawnConfig {
            interval: 1.0,
            ..SpawnConfig::default()
        },
        ..SimConfig::default()
    };
    let mut sim = SimWorld::with_config(config);
    for x in [-10.0, 0.0, 10.0] {
        straight_lane(&mut sim, x, &[0.0, 30.0]);
    }
    sim.spawn_structure(Faction::Attacker, Position::new(0.0, 0.0, -100.0), 1_000);

    sim.step(20.0);

    let lanes: Vec<LaneId> = sim
        .drain_events()
        .into_iter()
        .filter_map(|e| match e {
            SimEvent::UnitSpawned {
                faction: Faction::Defender,
                lane,
                ..
            } => Some(lane),
            _ => None,
        })
        .collect();
    assert!(lanes.len() >= 15, "only {} spawns", lanes.len());
    for pair in lanes.windows(2) {
        assert_ne!(pair[0], pair[1]);
    }
}

#[test]
fn spawner_honors_lane_subset() {
    let config = SimConfig {
        fixed_timestep: 0.1,
        seed: Some(5),
        spawn: SpawnConfig {
            interval: 0.5,
            ..SpawnConfig::default()
        },
        ..SimConfig::default()
    };
    let mut sim = SimWorld::with_config(config);
    let _a = straight_lane(&mut sim, -10.0, &[0.0, 30.0]);
    let b = straight_lane(&mut sim, 10.0, &[0.0, 30.0]);
    sim.configure_spawner(vec![b], None);

    sim.step(5.0);

    let spawned: Vec<SimEvent> = sim
        .drain_events()
        .into_iter()
        .filter(|e| matches!(e, SimEvent::UnitSpawned { .. }))
        .collect();
    assert!(!spawned.is_empty());
    assert!(spawned
        .iter()
        .all(|e| matches!(e, SimEvent::UnitSpawned { lane, .. } if *lane == b)));
}

#[test]
fn json_config_drives_the_match() {
    let mut sim = SimWorld::from_json_config(
        r#"{
            "fixed_timestep": 0.1,
            "spawn": {"enabled": false},
            "economy": {"start_energy": 10.0, "regen_rate": 0.0}
        }"#,
    )
    .unwrap();
    let lane = straight_lane(&mut sim, 0.0, &[0.0, 10.0]);

    assert_eq!(sim.place_unit(UnitKind::Archer, lane).unwrap(), None);
    for _ in 0..10 {
        sim.step(0.1);
    }
    assert_eq!(sim.energy(), 10.0);
    assert_eq!(sim.current_tick(), 10);
}

#[test]
fn snapshot_reflects_world() {
    let mut sim = world(0.1);
    let lane = straight_lane(&mut sim, 0.0, &[0.0, 10.0]);
    let keep = sim.spawn_structure(Faction::Defender, Position::new(0.0, 0.0, 30.0), 300);
    let unit = sim.create_unit(Faction::Attacker, UnitKind::Warrior, lane, 0).unwrap();
    for _ in 0..5 {
        sim.step(0.1);
    }

    let snapshot = sim.snapshot();
    assert_eq!(snapshot.tick, 5);
    let view = snapshot.unit(unit).unwrap();
    assert_eq!(view.kind, UnitKind::Warrior);
    assert_eq!(view.facing, 1.0);
    assert_eq!(snapshot.structures[0].id, keep);

    let restored = Snapshot::from_json(&snapshot.to_json().unwrap()).unwrap();
    assert_eq!(restored, snapshot);
}
