//! Wave pacing and enemy spawning.
//!
//! [`SpawnScheduler`] decides *whether*, *what* and *where* to spawn; the
//! system turns a decision into an entity. Gating, in order:
//!
//! 1. total live enemies below the global cap,
//! 2. the jittered global interval has elapsed,
//! 3. at least one archetype is below its own cap and off cooldown.
//!
//! The eligible archetypes are then picked by weight, and a placement strategy
//! is picked by its own weight. Every spawned enemy carries a [`SpawnTicket`]
//! that gives its slot back exactly once when it dies or is removed.

use std::collections::BTreeMap;

use bevy_ecs::prelude::*;
use rand::distributions::{Distribution, WeightedIndex};
use serde::Serialize;
use tracing::{debug, info};

use crate::components::*;
use crate::config::{ArchetypeConfig, EncounterConfig, SpawnConfig, WaveConfig};
use crate::stats::RunStats;
use crate::systems::behavior::Behavior;
use crate::systems::player::PlayerTracker;
use crate::systems::timing::{SimClock, SimRng};

/// Where a new enemy is placed relative to the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Placement {
    BehindTarget,
    ScreenEdge,
    UniformRadius,
}

impl Placement {
    const ALL: [Placement; 3] = [Placement::BehindTarget, Placement::ScreenEdge, Placement::UniformRadius];
}

/// Player state the placement strategies read.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpawnAnchor {
    pub position: Position,
    pub facing: Velocity,
    pub velocity: Velocity,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpawnDecision {
    pub archetype: Archetype,
    pub position: Position,
    pub placement: Placement,
    pub health_multiplier: f32,
    pub wave: u32,
}

#[derive(Debug, Clone, Copy)]
struct SpawnRule {
    archetype: Archetype,
    weight: f32,
    max_on_screen: u32,
    cooldown: f32,
}

#[derive(Resource, Debug, Clone)]
pub struct SpawnScheduler {
    enabled: bool,
    waves: WaveConfig,
    spawn: SpawnConfig,
    rules: Vec<SpawnRule>,
    current_wave: u32,
    wave_start: f32,
    difficulty: f32,
    active: BTreeMap<Archetype, u32>,
    last_spawn: BTreeMap<Archetype, f32>,
    last_global_spawn: f32,
    next_gap: f32,
}

impl Default for SpawnScheduler {
    fn default() -> Self {
        Self::from_config(&EncounterConfig::default())
    }
}

impl SpawnScheduler {
    pub fn from_config(config: &EncounterConfig) -> Self {
        let rules = config
            .archetypes
            .iter()
            .map(|a| SpawnRule {
                archetype: a.archetype,
                weight: a.weight,
                max_on_screen: a.max_on_screen,
                cooldown: a.cooldown,
            })
            .collect();

        Self {
            enabled: true,
            waves: config.waves.clone(),
            spawn: config.spawn.clone(),
            rules,
            current_wave: 1,
            wave_start: 0.0,
            difficulty: config.waves.difficulty_for_wave(1),
            active: BTreeMap::new(),
            last_spawn: BTreeMap::new(),
            last_global_spawn: 0.0,
            next_gap: config.spawn.interval,
        }
    }

    /// A scheduler that never spawns. Used when the config is rejected.
    pub fn disabled(config: &EncounterConfig) -> Self {
        Self {
            enabled: false,
            ..Self::from_config(config)
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn current_wave(&self) -> u32 {
        self.current_wave
    }

    pub fn difficulty(&self) -> f32 {
        self.difficulty
    }

    pub fn active_count(&self, archetype: Archetype) -> u32 {
        self.active.get(&archetype).copied().unwrap_or(0)
    }

    pub fn total_active(&self) -> u32 {
        self.active.values().sum()
    }

    /// Give back the slot of an enemy that left play.
    pub fn release(&mut self, archetype: Archetype) {
        if let Some(count) = self.active.get_mut(&archetype) {
            *count = count.saturating_sub(1);
        }
    }

    /// Waves start on exact multiples of the wave duration, whatever the tick rate.
    fn advance_wave(&mut self, now: f32) {
        let duration = self.waves.wave_duration;
        if duration <= 0.0 {
            return;
        }
        let before = self.current_wave;
        while now - self.wave_start >= duration {
            self.current_wave += 1;
            self.wave_start += duration;
        }
        if self.current_wave != before {
            self.difficulty = self.waves.difficulty_for_wave(self.current_wave);
            info!(wave = self.current_wave, difficulty = self.difficulty, "wave advanced");
        }
    }

    fn eligible(&self, now: f32) -> Vec<SpawnRule> {
        self.rules
            .iter()
            .filter(|r| r.weight > 0.0)
            .filter(|r| self.active_count(r.archetype) < r.max_on_screen)
            .filter(|r| {
                self.last_spawn
                    .get(&r.archetype)
                    .map_or(true, |last| now - last >= r.cooldown)
            })
            .copied()
            .collect()
    }

    /// Run one scheduling step.
    pub fn tick(&mut self, now: f32, anchor: Option<&SpawnAnchor>, rng: &mut SimRng) -> Option<SpawnDecision> {
        if !self.enabled {
            return None;
        }
        self.advance_wave(now);

        if self.total_active() >= self.spawn.max_total_enemies {
            return None;
        }
        if now < self.last_global_spawn + self.next_gap {
            return None;
        }
        let anchor = anchor?;

        let eligible = self.eligible(now);
        if eligible.is_empty() {
            return None;
        }
        let weights = WeightedIndex::new(eligible.iter().map(|r| r.weight)).ok()?;
        let rule = eligible[weights.sample(rng.rng_mut())];

        let placement_weights = WeightedIndex::new(self.spawn.placement.as_array()).ok()?;
        let placement = Placement::ALL[placement_weights.sample(rng.rng_mut())];
        let position = place(placement, anchor, &self.spawn, rng);

        *self.active.entry(rule.archetype).or_insert(0) += 1;
        self.last_spawn.insert(rule.archetype, now);
        self.last_global_spawn = now;
        self.next_gap = (self.spawn.interval + rng.random_range(-self.spawn.jitter, self.spawn.jitter)).max(0.0);

        Some(SpawnDecision {
            archetype: rule.archetype,
            position,
            placement,
            health_multiplier: self.waves.health_multiplier(self.difficulty),
            wave: self.current_wave,
        })
    }
}

/// Compute a spawn point for the given strategy.
pub fn place(placement: Placement, anchor: &SpawnAnchor, cfg: &SpawnConfig, rng: &mut SimRng) -> Position {
    let origin = anchor.position;
    match placement {
        Placement::BehindTarget => {
            let facing = if anchor.facing.is_zero() {
                Velocity::new(0.0, 1.0)
            } else {
                anchor.facing.normalized()
            };
            let lateral = facing
                .perpendicular()
                .scaled(rng.random_range(-cfg.lateral_jitter, cfg.lateral_jitter));
            origin.offset(
                -facing.vx * cfg.spawn_distance + lateral.vx,
                -facing.vy * cfg.spawn_distance + lateral.vy,
            )
        }
        Placement::ScreenEdge => {
            // Bias toward the edge the player is scrolling into.
            let heading = if anchor.velocity.is_zero() {
                anchor.facing
            } else {
                anchor.velocity
            };
            let horizontal = heading.vx.abs() >= heading.vy.abs();
            let (half_w, half_h) = cfg.screen_half_extents;
            let leading = rng.random_f32() < 0.75;
            let sign = |v: f32| if v < 0.0 { -1.0 } else { 1.0 };
            let random_sign = |rng: &mut SimRng| if rng.random_f32() < 0.5 { -1.0 } else { 1.0 };

            let use_x_edge = horizontal == leading;
            if use_x_edge {
                let side = if horizontal { sign(heading.vx) } else { random_sign(rng) };
                origin.offset(side * (half_w + cfg.edge_margin), rng.random_range(-half_h, half_h))
            } else {
                let side = if horizontal { random_sign(rng) } else { sign(heading.vy) };
                origin.offset(rng.random_range(-half_w, half_w), side * (half_h + cfg.edge_margin))
            }
        }
        Placement::UniformRadius => {
            let angle = rng.random_range(0.0, std::f32::consts::TAU);
            origin.offset(angle.cos() * cfg.spawn_distance, angle.sin() * cfg.spawn_distance)
        }
    }
}

/// Lookup of archetype stats by kind.
#[derive(Resource, Debug, Clone, Default)]
pub struct ArchetypeRoster(pub BTreeMap<Archetype, ArchetypeConfig>);

impl ArchetypeRoster {
    pub fn from_config(config: &EncounterConfig) -> Self {
        Self(config.archetypes.iter().map(|a| (a.archetype, a.clone())).collect())
    }

    pub fn get(&self, archetype: Archetype) -> Option<&ArchetypeConfig> {
        self.0.get(&archetype)
    }
}

/// Components of an enemy with difficulty-scaled health, ready before its
/// first tick. Scheduler spawns add a [`SpawnTicket`] on top.
pub fn enemy_bundle(
    cfg: &ArchetypeConfig,
    position: Position,
    health_multiplier: f32,
    behavior: Behavior,
) -> impl Bundle {
    let mut combatant = Combatant::new(cfg.max_health, cfg.armor);
    combatant.scale_health(health_multiplier);

    (
        EnemyAgent::new(cfg.archetype),
        Tag::Enemy,
        position,
        Velocity::default(),
        HitRadius(0.6),
        MoveStats { speed: cfg.speed },
        combatant,
        Loot { currency: cfg.loot },
        behavior,
    )
}

pub fn spawn_enemy(
    commands: &mut Commands,
    cfg: &ArchetypeConfig,
    position: Position,
    health_multiplier: f32,
    behavior: Behavior,
) -> Entity {
    commands
        .spawn((
            enemy_bundle(cfg, position, health_multiplier, behavior),
            SpawnTicket::new(cfg.archetype),
        ))
        .id()
}

/// System that runs the scheduler and spawns what it decides.
pub fn spawn_scheduler_system(
    mut commands: Commands,
    clock: Res<SimClock>,
    tracker: Res<PlayerTracker>,
    roster: Res<ArchetypeRoster>,
    mut scheduler: ResMut<SpawnScheduler>,
    mut rng: ResMut<SimRng>,
    mut stats: ResMut<RunStats>,
) {
    let anchor = tracker.entity.map(|_| SpawnAnchor {
        position: tracker.position,
        facing: tracker.facing,
        velocity: tracker.velocity,
    });

    let decision = scheduler.tick(clock.now(), anchor.as_ref(), &mut rng);
    stats.reach_wave(scheduler.current_wave());

    let Some(decision) = decision else {
        return;
    };
    let Some(cfg) = roster.get(decision.archetype) else {
        scheduler.release(decision.archetype);
        return;
    };

    let mut behavior = Behavior::from_params(&cfg.behavior);
    if let Behavior::PackHound(hound) = &mut behavior {
        *hound = hound.with_orbit_sign(rng.random_range(-1.0, 1.0));
    }

    let entity = spawn_enemy(&mut commands, cfg, decision.position, decision.health_multiplier, behavior);
    debug!(
        ?entity,
        archetype = decision.archetype.name(),
        placement = ?decision.placement,
        x = decision.position.x,
        y = decision.position.y,
        "enemy spawned"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn anchor() -> SpawnAnchor {
        SpawnAnchor {
            position: Position::new(0.0, 0.0),
            facing: Velocity::new(0.0, 1.0),
            velocity: Velocity::default(),
        }
    }

    fn config_with(archetypes: Vec<ArchetypeConfig>) -> EncounterConfig {
        let mut config = EncounterConfig {
            archetypes,
            ..Default::default()
        };
        config.spawn.interval = 1.0;
        config.spawn.jitter = 0.0;
        config
    }

    /// Run the scheduler at 10 Hz for `seconds`, collecting decisions.
    fn run(scheduler: &mut SpawnScheduler, rng: &mut SimRng, from: f32, seconds: f32) -> Vec<SpawnDecision> {
        let steps = (seconds * 10.0).round() as u32;
        (1..=steps)
            .filter_map(|i| scheduler.tick(from + i as f32 * 0.1, Some(&anchor()), rng))
            .collect()
    }

    #[test]
    fn test_global_cap_blocks_spawning() {
        let mut config = config_with(Archetype::ALL.iter().map(|a| ArchetypeConfig::default_for(*a)).collect());
        config.spawn.max_total_enemies = 8;
        for rule in &mut config.archetypes {
            rule.max_on_screen = 8;
            rule.cooldown = 0.0;
        }
        let mut scheduler = SpawnScheduler::from_config(&config);
        let mut rng = SimRng::from_seed(7);

        let spawned = run(&mut scheduler, &mut rng, 0.0, 30.0);
        assert_eq!(spawned.len(), 8);
        assert_eq!(scheduler.total_active(), 8);

        // Slots come back one at a time.
        scheduler.release(spawned[0].archetype);
        let more = run(&mut scheduler, &mut rng, 30.0, 5.0);
        assert_eq!(more.len(), 1);
    }

    #[test]
    fn test_per_type_cap_and_cooldown() {
        let mut mine = ArchetypeConfig::default_for(Archetype::Mine);
        mine.max_on_screen = 2;
        mine.cooldown = 3.0;
        let mut scheduler = SpawnScheduler::from_config(&config_with(vec![mine]));
        let mut rng = SimRng::from_seed(1);

        let spawned = run(&mut scheduler, &mut rng, 0.0, 20.0);
        assert_eq!(spawned.len(), 2);
        // Second spawn waited out the archetype cooldown, not just the interval.
        assert!(scheduler.active_count(Archetype::Mine) == 2);

        scheduler.release(Archetype::Mine);
        scheduler.release(Archetype::Mine);
        scheduler.release(Archetype::Mine);
        assert_eq!(scheduler.active_count(Archetype::Mine), 0);
    }

    #[test]
    fn test_cooldown_spacing() {
        let mut guard = ArchetypeConfig::default_for(Archetype::Guard);
        guard.max_on_screen = 10;
        guard.cooldown = 3.0;
        let mut scheduler = SpawnScheduler::from_config(&config_with(vec![guard]));
        let mut rng = SimRng::from_seed(3);

        let mut times = Vec::new();
        for i in 1..=100 {
            let now = i as f32 * 0.1;
            if scheduler.tick(now, Some(&anchor()), &mut rng).is_some() {
                times.push(now);
            }
        }
        assert!(times.len() >= 2);
        for pair in times.windows(2) {
            assert!(pair[1] - pair[0] >= 2.99);
        }
    }

    #[test]
    fn test_no_target_no_spawn() {
        let mut scheduler = SpawnScheduler::default();
        let mut rng = SimRng::from_seed(1);
        assert!(scheduler.tick(10.0, None, &mut rng).is_none());
        assert_eq!(scheduler.total_active(), 0);
    }

    #[test]
    fn test_disabled_scheduler_never_spawns() {
        let config = EncounterConfig::default();
        let mut scheduler = SpawnScheduler::disabled(&config);
        let mut rng = SimRng::from_seed(1);
        assert!(run(&mut scheduler, &mut rng, 0.0, 10.0).is_empty());
        assert_eq!(scheduler.current_wave(), 1);
    }

    #[test]
    fn test_waves_raise_difficulty_and_health() {
        let mut config = EncounterConfig::default();
        config.waves.wave_duration = 10.0;
        config.waves.difficulty_rate = 0.5;
        config.waves.max_difficulty = 2.0;
        config.waves.health_scaling = 1.0;
        let mut scheduler = SpawnScheduler::from_config(&config);
        let mut rng = SimRng::from_seed(5);

        scheduler.tick(10.0, None, &mut rng);
        assert_eq!(scheduler.current_wave(), 2);
        assert_eq!(scheduler.difficulty(), 1.5);

        scheduler.tick(20.0, None, &mut rng);
        scheduler.tick(30.0, None, &mut rng);
        assert_eq!(scheduler.current_wave(), 4);
        assert_eq!(scheduler.difficulty(), 2.0);

        let decision = scheduler.tick(31.0, Some(&anchor()), &mut rng).unwrap();
        assert_eq!(decision.wave, 4);
        assert_eq!(decision.health_multiplier, 2.0);
    }

    #[test]
    fn test_wave_boundaries_do_not_drift() {
        let mut config = EncounterConfig::default();
        config.waves.wave_duration = 1.0;
        let mut scheduler = SpawnScheduler::from_config(&config);
        let mut rng = SimRng::from_seed(5);

        scheduler.tick(0.7, None, &mut rng);
        assert_eq!(scheduler.current_wave(), 1);
        // Late tick: wave 2 still began at 1.0.
        scheduler.tick(1.4, None, &mut rng);
        assert_eq!(scheduler.current_wave(), 2);
        scheduler.tick(2.1, None, &mut rng);
        assert_eq!(scheduler.current_wave(), 3);

        // A long gap catches up every missed wave.
        scheduler.tick(5.0, None, &mut rng);
        assert_eq!(scheduler.current_wave(), 6);
    }

    #[test]
    fn test_weighted_pick_follows_weights() {
        let mut bulldozer = ArchetypeConfig::default_for(Archetype::Bulldozer);
        bulldozer.weight = 9.0;
        let mut guard = ArchetypeConfig::default_for(Archetype::Guard);
        guard.weight = 1.0;
        let mut sniper = ArchetypeConfig::default_for(Archetype::Sniper);
        sniper.weight = 0.0;
        let mut rules = vec![bulldozer, guard, sniper];
        for rule in &mut rules {
            rule.max_on_screen = 100;
            rule.cooldown = 0.0;
        }
        let mut config = config_with(rules);
        config.spawn.interval = 0.0;
        config.spawn.max_total_enemies = 100;
        let mut scheduler = SpawnScheduler::from_config(&config);
        let mut rng = SimRng::from_seed(11);

        let mut counts = BTreeMap::new();
        for i in 1..=2000 {
            let decision = scheduler.tick(i as f32 * 0.01, Some(&anchor()), &mut rng).unwrap();
            *counts.entry(decision.archetype).or_insert(0u32) += 1;
            scheduler.release(decision.archetype);
        }

        assert!(!counts.contains_key(&Archetype::Sniper));
        let share = counts[&Archetype::Bulldozer] as f32 / 2000.0;
        assert!((share - 0.9).abs() < 0.03, "bulldozer share {share}");
        assert_eq!(counts.values().sum::<u32>(), 2000);
    }

    #[test]
    fn test_same_seed_same_decisions() {
        let config = EncounterConfig::default();
        let mut a = SpawnScheduler::from_config(&config);
        let mut b = SpawnScheduler::from_config(&config);
        let mut rng_a = SimRng::from_seed(99);
        let mut rng_b = SimRng::from_seed(99);

        assert_eq!(
            run(&mut a, &mut rng_a, 0.0, 20.0),
            run(&mut b, &mut rng_b, 0.0, 20.0)
        );
    }

    #[test]
    fn test_behind_target_placement() {
        let cfg = SpawnConfig {
            spawn_distance: 20.0,
            lateral_jitter: 4.0,
            ..Default::default()
        };
        let mut rng = SimRng::from_seed(11);
        for _ in 0..20 {
            let pos = place(Placement::BehindTarget, &anchor(), &cfg, &mut rng);
            assert!((pos.y + 20.0).abs() < 0.001);
            assert!(pos.x.abs() <= 4.0);
        }
    }

    #[test]
    fn test_screen_edge_and_radius_placement_stay_off_screen() {
        let cfg = SpawnConfig::default();
        let (half_w, half_h) = cfg.screen_half_extents;
        let moving = SpawnAnchor {
            velocity: Velocity::new(5.0, 0.0),
            ..anchor()
        };
        let mut rng = SimRng::from_seed(13);
        for _ in 0..50 {
            let pos = place(Placement::ScreenEdge, &moving, &cfg, &mut rng);
            assert!(pos.x.abs() > half_w || pos.y.abs() > half_h);

            let pos = place(Placement::UniformRadius, &moving, &cfg, &mut rng);
            assert!((pos.distance_to(&moving.position) - cfg.spawn_distance).abs() < 0.01);
        }
    }

    #[test]
    fn test_spawn_system_scales_health_and_tags_enemy() {
        let mut config = EncounterConfig::default();
        config.spawn.interval = 0.0;
        config.spawn.jitter = 0.0;

        let mut world = World::new();
        let mut clock = SimClock::default();
        clock.advance(0.1);
        world.insert_resource(clock);
        world.insert_resource(PlayerTracker {
            entity: Some(Entity::from_raw(1000)),
            ..Default::default()
        });
        world.insert_resource(ArchetypeRoster::from_config(&config));
        world.insert_resource(SpawnScheduler::from_config(&config));
        world.insert_resource(SimRng::from_seed(2));
        world.insert_resource(RunStats::default());

        let mut schedule = Schedule::default();
        schedule.add_systems(spawn_scheduler_system);
        schedule.run(&mut world);

        let mut query = world.query::<(&EnemyAgent, &Tag, &Combatant, &SpawnTicket, &Behavior)>();
        let (agent, tag, combatant, ticket, behavior) = query.single(&world);
        assert_eq!(*tag, Tag::Enemy);
        assert_eq!(ticket.archetype, agent.archetype);
        assert_eq!(behavior.archetype(), agent.archetype);
        assert_eq!(combatant.current_health, combatant.max_health);
        assert_eq!(world.resource::<SpawnScheduler>().total_active(), 1);
        assert_eq!(world.resource::<RunStats>().best_wave, 1);
    }
}
