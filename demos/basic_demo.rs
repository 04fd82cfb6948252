//! Basic demonstration of the Ironrun encounter simulation.
//!
//! Run with: cargo run --example basic_demo

use ironrun_sim::{Explosive, MemoryStore, SimWorld, Tag, TagMask, Upgrade};
use ironrun_sim::{Archetype, EncounterConfig};

fn main() {
    println!("=== Ironrun - Encounter Demo ===\n");

    let mut config = EncounterConfig::default();
    config.sim.seed = Some(2024);
    config.waves.wave_duration = 10.0;
    let mut sim = SimWorld::with_config(config);

    sim.spawn_player(0.0, 0.0);
    sim.spawn_enemy(Archetype::Mine, 6.0, 12.0);
    sim.spawn_prop(
        -4.0,
        10.0,
        15.0,
        5,
        Some(Explosive {
            radius: 5.0,
            damage: 30.0,
            targets: TagMask::of(&[Tag::Enemy, Tag::Player]),
        }),
    );
    sim.apply_upgrade(Upgrade::Shield {
        amount: 40.0,
        duration: Some(8.0),
    });

    println!("Initial state:");
    print_snapshot(&mut sim);

    // Drive north in a slow weave, firing every half second.
    println!("\nRunning 30 seconds at 20 frames/sec...\n");
    for frame in 0..600 {
        let t = frame as f32 * 0.05;
        sim.set_player_input((t * 0.7).sin() * 0.6, 1.0);
        if frame % 10 == 0 {
            sim.player_fire();
        }
        sim.step(0.05);

        if (frame + 1) % 100 == 0 {
            println!("--- Tick {} (t={:.1}s) ---", sim.current_tick(), sim.current_time());
            print_snapshot(&mut sim);
        }
        if sim.is_game_over() {
            println!("\nPlayer destroyed at t={:.1}s", sim.current_time());
            break;
        }
    }

    let mut store = MemoryStore::new();
    sim.flush_stats(&mut store);

    println!("\n=== Persisted Stats ===\n");
    println!("{}", store.to_json().unwrap_or_default());

    println!("\n=== Final State (JSON) ===\n");
    println!("{}", sim.snapshot().to_json_pretty().unwrap_or_default());
}

fn print_snapshot(sim: &mut SimWorld) {
    let snapshot = sim.snapshot();

    if let Some(player) = &snapshot.player {
        println!(
            "  Player: pos=({:.1}, {:.1}) hp={:.0}/{:.0} shield={:.0}",
            player.x, player.y, player.health, player.health_max, player.shield
        );
    }
    println!(
        "  Wave {} difficulty={:.2} currency={}",
        snapshot.wave, snapshot.difficulty, snapshot.currency
    );

    println!("  Enemies:");
    for enemy in &snapshot.enemies {
        println!(
            "    {:?} #{}: pos=({:.1}, {:.1}) hp={:.0}/{:.0} [{}]",
            enemy.archetype, enemy.id, enemy.x, enemy.y, enemy.health, enemy.health_max, enemy.state
        );
    }
    println!("  Projectiles in flight: {}", snapshot.projectiles.len());
}
