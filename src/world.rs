//! Snapshot types.
//!
//! The `Snapshot` struct provides a serializable view of the encounter that
//! a presentation layer can render without touching the ECS world. Entities
//! are identified by their `to_bits()` value.

use crate::components::*;
use crate::stats::RunStats;
use crate::systems::behavior::Behavior;
use crate::systems::combat::{CombatEvent, CombatEvents};
use crate::systems::projectile::Projectile;
use crate::systems::spawner::SpawnScheduler;
use crate::systems::timing::SimClock;
use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlayerSnapshot {
    pub id: u64,
    pub x: f32,
    pub y: f32,
    pub facing_x: f32,
    pub facing_y: f32,
    pub health: f32,
    pub health_max: f32,
    pub shield: f32,
    pub alive: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EnemySnapshot {
    pub id: u64,
    pub archetype: Archetype,
    pub state: String,
    pub x: f32,
    pub y: f32,
    pub health: f32,
    pub health_max: f32,
    pub stunned: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProjectileSnapshot {
    pub id: u64,
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub hostile: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PropSnapshot {
    pub id: u64,
    pub x: f32,
    pub y: f32,
    pub health: f32,
    pub health_max: f32,
    pub explosive: bool,
}

/// Combat notification in wire form.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum EventSnapshot {
    DamageTaken {
        target: u64,
        source: Option<u64>,
        amount: f32,
        health_after: f32,
    },
    Died {
        target: u64,
        source: Option<u64>,
    },
    PassThrough {
        projectile: u64,
        other: u64,
    },
    Expired {
        projectile: u64,
    },
    Exploded {
        x: f32,
        y: f32,
        radius: f32,
    },
}

impl From<&CombatEvent> for EventSnapshot {
    fn from(event: &CombatEvent) -> Self {
        let id = |e: Entity| e.to_bits();
        match *event {
            CombatEvent::DamageTaken {
                target,
                source,
                amount,
                health_after,
                ..
            } => EventSnapshot::DamageTaken {
                target: id(target),
                source: source.map(id),
                amount,
                health_after,
            },
            CombatEvent::Died { target, source } => EventSnapshot::Died {
                target: id(target),
                source: source.map(id),
            },
            CombatEvent::ProjectilePassThrough { projectile, other } => EventSnapshot::PassThrough {
                projectile: id(projectile),
                other: id(other),
            },
            CombatEvent::ProjectileExpired { projectile } => EventSnapshot::Expired {
                projectile: id(projectile),
            },
            CombatEvent::Exploded { x, y, radius } => EventSnapshot::Exploded { x, y, radius },
        }
    }
}

/// Complete encounter state for one frame.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Snapshot {
    /// Current simulation tick.
    pub tick: u64,
    /// Elapsed simulation time in seconds.
    pub time: f32,
    pub wave: u32,
    pub difficulty: f32,
    pub currency: u64,
    pub game_over: bool,
    pub player: Option<PlayerSnapshot>,
    pub enemies: Vec<EnemySnapshot>,
    pub projectiles: Vec<ProjectileSnapshot>,
    pub props: Vec<PropSnapshot>,
    /// Events of the last tick.
    pub events: Vec<EventSnapshot>,
}

impl Snapshot {
    /// Create a snapshot from the ECS world.
    pub fn from_world(world: &mut World) -> Self {
        let clock = world.get_resource::<SimClock>().copied().unwrap_or_default();
        let (wave, difficulty) = world
            .get_resource::<SpawnScheduler>()
            .map(|s| (s.current_wave(), s.difficulty()))
            .unwrap_or((1, 1.0));
        let (currency, game_over) = world
            .get_resource::<RunStats>()
            .map(|s| (s.currency, s.game_over))
            .unwrap_or_default();
        let events = world
            .get_resource::<CombatEvents>()
            .map(|e| e.events.iter().map(EventSnapshot::from).collect())
            .unwrap_or_default();

        let mut player_query = world.query_filtered::<(Entity, &Position, &Facing, &Combatant), With<Player>>();
        let player = player_query
            .iter(world)
            .next()
            .map(|(entity, pos, facing, c)| PlayerSnapshot {
                id: entity.to_bits(),
                x: pos.x,
                y: pos.y,
                facing_x: facing.0.vx,
                facing_y: facing.0.vy,
                health: c.current_health,
                health_max: c.max_health,
                shield: c.shield_health,
                alive: c.is_alive,
            });

        let mut enemy_query =
            world.query::<(Entity, &EnemyAgent, &Position, &Combatant, Option<&Behavior>, Has<Stunned>)>();
        let enemies = enemy_query
            .iter(world)
            .map(|(entity, agent, pos, c, behavior, stunned)| EnemySnapshot {
                id: entity.to_bits(),
                archetype: agent.archetype,
                state: behavior.map_or("Disabled", |b| b.state_name()).to_string(),
                x: pos.x,
                y: pos.y,
                health: c.current_health,
                health_max: c.max_health,
                stunned,
            })
            .collect();

        let mut projectile_query = world.query::<(Entity, &Position, &Velocity, &Projectile)>();
        let projectiles = projectile_query
            .iter(world)
            .map(|(entity, pos, vel, p)| ProjectileSnapshot {
                id: entity.to_bits(),
                x: pos.x,
                y: pos.y,
                vx: vel.vx,
                vy: vel.vy,
                hostile: p.filter.tags.contains(Tag::Player),
            })
            .collect();

        let mut prop_query = world.query_filtered::<(Entity, &Position, &Combatant, Has<Explosive>), With<Prop>>();
        let props = prop_query
            .iter(world)
            .map(|(entity, pos, c, explosive)| PropSnapshot {
                id: entity.to_bits(),
                x: pos.x,
                y: pos.y,
                health: c.current_health,
                health_max: c.max_health,
                explosive,
            })
            .collect();

        Self {
            tick: clock.tick,
            time: clock.elapsed,
            wave,
            difficulty,
            currency,
            game_over,
            player,
            enemies,
            projectiles,
            props,
            events,
        }
    }

    /// Serialize snapshot to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Serialize snapshot to pretty JSON string.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_survives_json() {
        let snapshot = Snapshot {
            tick: 42,
            time: 1.4,
            wave: 2,
            difficulty: 1.15,
            enemies: vec![EnemySnapshot {
                id: 7,
                archetype: Archetype::Sniper,
                state: "Aim".to_string(),
                x: 10.0,
                y: 20.0,
                health: 20.0,
                health_max: 20.0,
                stunned: false,
            }],
            events: vec![EventSnapshot::Died {
                target: 7,
                source: None,
            }],
            ..Default::default()
        };

        let json = snapshot.to_json().unwrap();
        assert!(json.contains("\"type\":\"Died\""));

        let restored: Snapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, snapshot);
    }

    #[test]
    fn test_empty_world_snapshot_uses_defaults() {
        let mut world = World::new();
        let snapshot = Snapshot::from_world(&mut world);
        assert_eq!(snapshot.wave, 1);
        assert_eq!(snapshot.difficulty, 1.0);
        assert!(snapshot.player.is_none());
        assert!(snapshot.enemies.is_empty());
    }
}
