//! Basic demonstration of the Lane Siege simulation.
//!
//! Run with: cargo run --example basic_demo
//! Set `RUST_LOG=lanesiege_sim=debug` for per-unit decisions.

use lanesiege_sim::{Faction, SimEvent, SimWorld, UnitKind};
use tracing_subscriber::EnvFilter;

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    println!("=== Lane Siege - Simulation Demo ===\n");

    // Three lanes, a structure per side and one attacker of every kind
    let mut sim = SimWorld::new_default_test_world();

    println!("Initial state:");
    print_snapshot(&mut sim);

    // Spend some energy on reinforcements
    let lanes = sim.registry().lane_ids();
    for (kind, lane) in [(UnitKind::Tank, lanes[1]), (UnitKind::Archer, lanes[0])] {
        match sim.place_unit(kind, lane) {
            Ok(Some(id)) => println!("Placed {} as unit {id} on lane {lane}", kind.as_str()),
            Ok(None) => println!("Not enough energy for {}", kind.as_str()),
            Err(err) => println!("Placement failed: {err}"),
        }
    }

    // Run for 60 seconds of game time at 30 ticks/sec
    println!("\nRunning simulation for 60 seconds...\n");
    for second in 0..60 {
        for _ in 0..30 {
            sim.step(1.0 / 30.0);
        }

        for event in sim.drain_events() {
            match event {
                SimEvent::UnitDied { unit, faction, cause } => {
                    println!("  [{second:>2}s] {} unit {unit} died ({cause:?})", faction.as_str());
                }
                SimEvent::StructureDestroyed { structure, owner } => {
                    println!("  [{second:>2}s] {} structure {structure} destroyed", owner.as_str());
                }
                SimEvent::GameOver { victory } => {
                    println!("  [{second:>2}s] game over, victory: {victory}");
                }
                _ => {}
            }
        }

        if (second + 1) % 10 == 0 {
            println!("--- Tick {} (t={:.1}s) ---", sim.current_tick(), sim.current_time());
            print_snapshot(&mut sim);
        }
        if sim.is_over() {
            break;
        }
    }

    println!("\n=== Final State (JSON) ===\n");
    match sim.snapshot().to_json_pretty() {
        Ok(json) => println!("{json}"),
        Err(err) => println!("snapshot failed: {err}"),
    }
}

fn print_snapshot(sim: &mut SimWorld) {
    let snapshot = sim.snapshot();
    println!("  energy {:.0}/{:.0}", snapshot.energy, snapshot.max_energy);

    for faction in [Faction::Attacker, Faction::Defender] {
        println!("  {} units:", faction.as_str());
        for unit in snapshot.units.iter().filter(|u| u.faction == faction) {
            println!(
                "    Unit {}: {} lane={} z={:.1} hp={}/{} [{}]",
                unit.id,
                unit.kind.as_str(),
                unit.lane,
                unit.z,
                unit.health,
                unit.health_max,
                unit.state.as_str()
            );
        }
    }
    for structure in &snapshot.structures {
        println!(
            "  Structure {} ({}): hp={}/{}",
            structure.id,
            structure.owner.as_str(),
            structure.health,
            structure.health_max
        );
    }
}
