//! Combat resolution - applies damage to combatants.
//!
//! Every damage source (projectiles, contact attacks, explosions) pushes a
//! [`DamageEvent`] onto the [`DamageQueue`]. The queue is drained by
//! `damage_resolution_system` in push order, one event at a time, so two hits
//! on the same target never interleave mid-calculation.
//!
//! ## Resolution order
//!
//! 1. Dead or invulnerable targets ignore the hit.
//! 2. Armor mitigation with a floor of 1: `max(1, raw - armor)`.
//! 3. Shield absorbs `min(shield, mitigated)` first.
//! 4. The remainder is taken from health, clamped at 0.
//! 5. `DamageTaken` is emitted, then `Died` if health reached 0.

use bevy_ecs::prelude::*;
use tracing::debug;

use crate::components::*;
use crate::stats::RunStats;
use crate::systems::timing::SimClock;

/// Minimum damage a hit can deal after armor.
pub const MIN_DAMAGE: f32 = 1.0;

/// A single hit waiting to be resolved. Consumed exactly once.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DamageEvent {
    pub raw_damage: f32,
    pub source: Option<Entity>,
    pub target: Entity,
}

/// Hits queued this tick, in arrival order.
#[derive(Resource, Debug, Default)]
pub struct DamageQueue {
    pending: Vec<DamageEvent>,
}

impl DamageQueue {
    pub fn push(&mut self, raw_damage: f32, source: Option<Entity>, target: Entity) {
        self.pending.push(DamageEvent {
            raw_damage,
            source,
            target,
        });
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn drain(&mut self) -> std::vec::Drain<'_, DamageEvent> {
        self.pending.drain(..)
    }
}

/// What a single resolved hit did.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DamageOutcome {
    /// Post-mitigation damage applied (shield portion + health portion).
    pub actual: f32,
    /// Portion soaked by the shield.
    pub absorbed: f32,
    /// True only for the hit that killed the target.
    pub died: bool,
}

impl DamageOutcome {
    pub fn to_health(&self) -> f32 {
        self.actual - self.absorbed
    }
}

/// Resolve one hit against a combatant.
pub fn resolve_damage(combatant: &mut Combatant, raw_damage: f32) -> DamageOutcome {
    if !combatant.is_alive || combatant.is_invulnerable() {
        return DamageOutcome::default();
    }

    let mut mitigated = (raw_damage.max(0.0) - combatant.armor).max(MIN_DAMAGE);

    let mut absorbed = 0.0;
    if combatant.shield_health > 0.0 {
        absorbed = combatant.shield_health.min(mitigated);
        combatant.shield_health = (combatant.shield_health - absorbed).max(0.0);
        mitigated -= absorbed;
    }

    let mut to_health = 0.0;
    if mitigated > 0.0 {
        to_health = mitigated.min(combatant.current_health);
        combatant.current_health = (combatant.current_health - mitigated).max(0.0);
        if combatant.hit_invulnerability > 0.0 {
            combatant.invulnerability_remaining = combatant.hit_invulnerability;
        }
    }

    let died = combatant.current_health <= 0.0;
    if died {
        combatant.is_alive = false;
    }

    DamageOutcome {
        actual: absorbed + to_health,
        absorbed,
        died,
    }
}

/// Restore health, clamped to max. Dead combatants cannot be healed.
/// Returns the amount actually restored.
pub fn heal(combatant: &mut Combatant, amount: f32) -> f32 {
    if !combatant.is_alive || amount <= 0.0 {
        return 0.0;
    }
    let before = combatant.current_health;
    combatant.current_health = (combatant.current_health + amount).min(combatant.max_health);
    combatant.current_health - before
}

/// Notifications produced during a tick, in the order they happened.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CombatEvent {
    DamageTaken {
        target: Entity,
        source: Option<Entity>,
        amount: f32,
        absorbed: f32,
        health_after: f32,
        shield_after: f32,
    },
    Died {
        target: Entity,
        source: Option<Entity>,
    },
    /// A projectile touched a tagged target with nothing to damage and kept flying.
    ProjectilePassThrough {
        projectile: Entity,
        other: Entity,
    },
    ProjectileExpired {
        projectile: Entity,
    },
    Exploded {
        x: f32,
        y: f32,
        radius: f32,
    },
}

/// Observer list for the current tick. Cleared at the start of every tick.
#[derive(Resource, Debug, Default)]
pub struct CombatEvents {
    pub events: Vec<CombatEvent>,
}

impl CombatEvents {
    pub fn push(&mut self, event: CombatEvent) {
        self.events.push(event);
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn deaths(&self) -> impl Iterator<Item = (Entity, Option<Entity>)> + '_ {
        self.events.iter().filter_map(|e| match e {
            CombatEvent::Died { target, source } => Some((*target, *source)),
            _ => None,
        })
    }
}

/// System that drains the damage queue and applies each hit.
///
/// ## Data Access
/// - Reads: SimClock, Player markers
/// - Writes: DamageQueue, CombatEvents, RunStats, Combatant, Dying (insert)
pub fn damage_resolution_system(
    mut commands: Commands,
    clock: Res<SimClock>,
    mut queue: ResMut<DamageQueue>,
    mut events: ResMut<CombatEvents>,
    mut stats: ResMut<RunStats>,
    mut combatants: Query<(&mut Combatant, Has<Player>)>,
    players: Query<(), With<Player>>,
) {
    for hit in queue.drain() {
        let Ok((mut combatant, target_is_player)) = combatants.get_mut(hit.target) else {
            continue;
        };

        let outcome = resolve_damage(&mut combatant, hit.raw_damage);
        if outcome.actual <= 0.0 && !outcome.died {
            continue;
        }

        events.push(CombatEvent::DamageTaken {
            target: hit.target,
            source: hit.source,
            amount: outcome.actual,
            absorbed: outcome.absorbed,
            health_after: combatant.current_health,
            shield_after: combatant.shield_health,
        });

        if target_is_player {
            stats.damage_taken += outcome.actual;
        } else if hit.source.is_some_and(|s| players.contains(s)) {
            stats.damage_dealt += outcome.actual;
        }

        if outcome.died {
            debug!(target = ?hit.target, source = ?hit.source, "combatant died");
            events.push(CombatEvent::Died {
                target: hit.target,
                source: hit.source,
            });
            if !target_is_player {
                commands.entity(hit.target).insert(Dying {
                    since_tick: clock.tick,
                });
            }
        }
    }
}

/// System that counts down post-hit invulnerability.
pub fn combatant_timer_system(
    dt: Res<crate::systems::movement::DeltaTime>,
    mut query: Query<&mut Combatant>,
) {
    let delta = dt.0;
    for mut combatant in query.iter_mut() {
        if combatant.invulnerability_remaining > 0.0 {
            combatant.invulnerability_remaining =
                (combatant.invulnerability_remaining - delta).max(0.0);
        }
    }
}
