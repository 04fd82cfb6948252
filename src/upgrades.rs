//! Temporary and permanent stat upgrades.
//!
//! Applying an upgrade snapshots exactly the stats it touches into an
//! [`UpgradeInstance`], mutates them, and (for timed upgrades) schedules a
//! revert on the [`DeferredQueue`]. Reverting restores the snapshot. Each
//! instance only ever restores its own snapshot, so overlapping upgrades that
//! expire out of order leave the value each one saw when it was applied.
//! Reverting twice is a no-op.
//!
//! These functions take `&mut World` directly: they are called from the host
//! API between ticks and from exclusive systems.

use std::collections::BTreeMap;

use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use tracing::{debug, warn};

use crate::components::{Combatant, EnemyAgent, MoveStats, Position, Stunned, Tag, TagMask};
use crate::error::{DiagnosticKind, Diagnostics};
use crate::spatial::SpatialGrid;
use crate::systems::deferred::{DeferredAction, DeferredQueue};
use crate::systems::timing::SimClock;

/// Upgrade kinds a pickup or shop item can grant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Upgrade {
    DamageBoost { multiplier: f32, duration: Option<f32> },
    SpeedBoost { multiplier: f32, duration: Option<f32> },
    ArmorBoost { bonus: f32, duration: Option<f32> },
    /// Extra shield layer. Removed early when depleted.
    Shield { amount: f32, duration: Option<f32> },
    /// Freeze nearby enemies.
    StunPulse { radius: f32, duration: f32 },
}

impl Upgrade {
    pub fn duration(&self) -> Option<f32> {
        match *self {
            Upgrade::DamageBoost { duration, .. }
            | Upgrade::SpeedBoost { duration, .. }
            | Upgrade::ArmorBoost { duration, .. }
            | Upgrade::Shield { duration, .. } => duration,
            Upgrade::StunPulse { duration, .. } => Some(duration),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UpgradeId(pub u64);

/// Pre-upgrade values of the stats an upgrade changed.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SavedStats {
    pub damage_multiplier: Option<f32>,
    pub speed: Option<f32>,
    pub armor: Option<f32>,
    pub shield_health: Option<f32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpgradeInstance {
    pub id: UpgradeId,
    pub upgrade: Upgrade,
    pub target: Entity,
    pub saved: SavedStats,
    pub applied_at: f32,
    /// Entities other than the target this upgrade put a status on.
    pub affected: SmallVec<[Entity; 8]>,
}

/// Every upgrade currently in effect.
#[derive(Resource, Debug, Default)]
pub struct UpgradeLedger {
    next_id: u64,
    active: BTreeMap<UpgradeId, UpgradeInstance>,
}

impl UpgradeLedger {
    fn allocate(&mut self) -> UpgradeId {
        self.next_id += 1;
        UpgradeId(self.next_id)
    }

    pub fn get(&self, id: UpgradeId) -> Option<&UpgradeInstance> {
        self.active.get(&id)
    }

    pub fn is_active(&self, id: UpgradeId) -> bool {
        self.active.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &UpgradeInstance> {
        self.active.values()
    }

    pub fn ids_for(&self, target: Entity) -> Vec<UpgradeId> {
        self.active
            .values()
            .filter(|i| i.target == target)
            .map(|i| i.id)
            .collect()
    }

    fn take(&mut self, id: UpgradeId) -> Option<UpgradeInstance> {
        self.active.remove(&id)
    }
}

fn missing(world: &mut World, target: Entity, what: &str) {
    warn!(?target, "upgrade target has no {what}");
    world
        .resource_mut::<Diagnostics>()
        .push(DiagnosticKind::MissingCollaborator, format!("upgrade target {target:?} has no {what}"));
}

/// Apply `upgrade` to `target`. Returns `None` when the target cannot take it.
pub fn apply_upgrade(world: &mut World, target: Entity, upgrade: Upgrade) -> Option<UpgradeId> {
    let now = world.resource::<SimClock>().now();

    let alive = world.get::<Combatant>(target).map(|c| c.is_alive);
    match alive {
        None => {
            missing(world, target, "Combatant");
            return None;
        }
        Some(false) => return None,
        Some(true) => {}
    }

    let mut saved = SavedStats::default();
    let mut affected = SmallVec::new();

    match upgrade {
        Upgrade::DamageBoost { multiplier, .. } => {
            let mut c = world.get_mut::<Combatant>(target)?;
            saved.damage_multiplier = Some(c.damage_multiplier);
            c.damage_multiplier *= multiplier;
        }
        Upgrade::SpeedBoost { multiplier, .. } => {
            if world.get::<MoveStats>(target).is_none() {
                missing(world, target, "MoveStats");
                return None;
            }
            let mut stats = world.get_mut::<MoveStats>(target)?;
            saved.speed = Some(stats.speed);
            stats.speed *= multiplier;
        }
        Upgrade::ArmorBoost { bonus, .. } => {
            let mut c = world.get_mut::<Combatant>(target)?;
            saved.armor = Some(c.armor);
            c.armor += bonus;
        }
        Upgrade::Shield { amount, .. } => {
            let mut c = world.get_mut::<Combatant>(target)?;
            saved.shield_health = Some(c.shield_health);
            c.shield_health += amount;
        }
        Upgrade::StunPulse { radius, duration } => {
            let center = *world.get::<Position>(target)?;
            let until = now + duration;
            let candidates = world
                .resource::<SpatialGrid>()
                .query_circle_tagged(center.x, center.y, radius, TagMask::of(&[Tag::Enemy]));

            for entry in candidates {
                let eligible = world.get::<EnemyAgent>(entry.entity).is_some()
                    && world.get::<Combatant>(entry.entity).is_some_and(|c| c.is_alive);
                if !eligible {
                    continue;
                }
                let existing = world.get::<Stunned>(entry.entity).map(|s| s.until);
                world.entity_mut(entry.entity).insert(Stunned {
                    until: existing.map_or(until, |u| u.max(until)),
                });
                affected.push(entry.entity);
            }
        }
    }

    let id = {
        let mut ledger = world.resource_mut::<UpgradeLedger>();
        let id = ledger.allocate();
        ledger.active.insert(
            id,
            UpgradeInstance {
                id,
                upgrade,
                target,
                saved,
                applied_at: now,
                affected,
            },
        );
        id
    };

    if let Some(duration) = upgrade.duration() {
        world
            .resource_mut::<DeferredQueue>()
            .schedule(now + duration, DeferredAction::RevertUpgrade(id), target);
    }

    debug!(?id, ?target, ?upgrade, "upgrade applied");
    Some(id)
}

/// Undo an upgrade. Returns `false` if it was already reverted or discarded.
pub fn revert_upgrade(world: &mut World, id: UpgradeId) -> bool {
    let Some(instance) = world.resource_mut::<UpgradeLedger>().take(id) else {
        return false;
    };
    world
        .resource_mut::<DeferredQueue>()
        .cancel_action(DeferredAction::RevertUpgrade(id));

    let saved = instance.saved;
    if let Some(mut c) = world.get_mut::<Combatant>(instance.target) {
        if let Some(v) = saved.damage_multiplier {
            c.damage_multiplier = v;
        }
        if let Some(v) = saved.armor {
            c.armor = v;
        }
        // Never hand back shield the target already lost.
        if let Some(v) = saved.shield_health {
            c.shield_health = c.shield_health.min(v);
        }
    }
    if let Some(v) = saved.speed {
        if let Some(mut stats) = world.get_mut::<MoveStats>(instance.target) {
            stats.speed = v;
        }
    }

    release_affected(world, &instance);
    debug!(?id, target = ?instance.target, "upgrade reverted");
    true
}

/// Drop an upgrade without restoring the target's stats.
pub fn discard_upgrade(world: &mut World, id: UpgradeId) -> bool {
    let Some(instance) = world.resource_mut::<UpgradeLedger>().take(id) else {
        return false;
    };
    world
        .resource_mut::<DeferredQueue>()
        .cancel_action(DeferredAction::RevertUpgrade(id));
    release_affected(world, &instance);
    true
}

fn release_affected(world: &mut World, instance: &UpgradeInstance) {
    let Upgrade::StunPulse { duration, .. } = instance.upgrade else {
        return;
    };
    let ours = instance.applied_at + duration;
    for &entity in &instance.affected {
        // Missing entities and stuns extended by a later pulse are left alone.
        let owned = world.get::<Stunned>(entity).is_some_and(|s| s.until <= ours);
        if owned {
            world.entity_mut(entity).remove::<Stunned>();
        }
    }
}

/// Exclusive system that reverts shields whose layer has been used up.
pub fn upgrade_depletion_system(world: &mut World) {
    let depleted: Vec<UpgradeId> = world
        .resource::<UpgradeLedger>()
        .iter()
        .filter(|i| matches!(i.upgrade, Upgrade::Shield { .. }))
        .filter(|i| {
            world
                .get::<Combatant>(i.target)
                .map_or(true, |c| c.shield_health <= i.saved.shield_health.unwrap_or(0.0))
        })
        .map(|i| i.id)
        .collect();

    for id in depleted {
        revert_upgrade(world, id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::systems::deferred::deferred_action_system;
    use crate::spatial::SpatialEntry;

    fn upgrade_world() -> World {
        let mut world = World::new();
        world.insert_resource(SimClock::default());
        world.insert_resource(DeferredQueue::default());
        world.insert_resource(UpgradeLedger::default());
        world.insert_resource(Diagnostics::default());
        world.insert_resource(SpatialGrid::new(10.0));
        world
    }

    fn advance(world: &mut World, seconds: f32) {
        world.resource_mut::<SimClock>().advance(seconds);
        deferred_action_system(world);
    }

    #[test]
    fn test_timed_boost_reverts_once() {
        let mut world = upgrade_world();
        let player = world.spawn((Combatant::new(100.0, 2.0), MoveStats { speed: 5.0 })).id();

        let id = apply_upgrade(
            &mut world,
            player,
            Upgrade::ArmorBoost {
                bonus: 3.0,
                duration: Some(2.0),
            },
        )
        .unwrap();
        assert_eq!(world.get::<Combatant>(player).unwrap().armor, 5.0);

        advance(&mut world, 1.0);
        assert_eq!(world.get::<Combatant>(player).unwrap().armor, 5.0);
        advance(&mut world, 1.0);
        assert_eq!(world.get::<Combatant>(player).unwrap().armor, 2.0);

        // Already reverted by the timer.
        assert!(!revert_upgrade(&mut world, id));
        assert_eq!(world.get::<Combatant>(player).unwrap().armor, 2.0);
    }

    #[test]
    fn test_manual_revert_is_idempotent() {
        let mut world = upgrade_world();
        let player = world.spawn((Combatant::new(100.0, 0.0), MoveStats { speed: 5.0 })).id();

        let id = apply_upgrade(
            &mut world,
            player,
            Upgrade::SpeedBoost {
                multiplier: 2.0,
                duration: None,
            },
        )
        .unwrap();
        assert_eq!(world.get::<MoveStats>(player).unwrap().speed, 10.0);

        assert!(revert_upgrade(&mut world, id));
        assert!(!revert_upgrade(&mut world, id));
        assert_eq!(world.get::<MoveStats>(player).unwrap().speed, 5.0);
        assert!(world.resource::<UpgradeLedger>().is_empty());
    }

    #[test]
    fn test_out_of_order_reverts_restore_snapshots() {
        let mut world = upgrade_world();
        let player = world.spawn(Combatant::new(100.0, 0.0)).id();
        let boost = |m| Upgrade::DamageBoost {
            multiplier: m,
            duration: None,
        };

        let a = apply_upgrade(&mut world, player, boost(2.0)).unwrap();
        let b = apply_upgrade(&mut world, player, boost(3.0)).unwrap();
        assert_eq!(world.get::<Combatant>(player).unwrap().damage_multiplier, 6.0);

        // A first: value goes back to what A saw.
        revert_upgrade(&mut world, a);
        assert_eq!(world.get::<Combatant>(player).unwrap().damage_multiplier, 1.0);
        // Then B: value goes back to what B saw.
        revert_upgrade(&mut world, b);
        assert_eq!(world.get::<Combatant>(player).unwrap().damage_multiplier, 2.0);
    }

    #[test]
    fn test_shield_reverts_on_depletion() {
        let mut world = upgrade_world();
        let player = world.spawn(Combatant::new(100.0, 0.0)).id();

        let id = apply_upgrade(
            &mut world,
            player,
            Upgrade::Shield {
                amount: 20.0,
                duration: None,
            },
        )
        .unwrap();
        assert_eq!(world.get::<Combatant>(player).unwrap().shield_health, 20.0);

        upgrade_depletion_system(&mut world);
        assert!(world.resource::<UpgradeLedger>().is_active(id));

        world.get_mut::<Combatant>(player).unwrap().shield_health = 0.0;
        upgrade_depletion_system(&mut world);
        assert!(!world.resource::<UpgradeLedger>().is_active(id));
    }

    #[test]
    fn test_stun_pulse_releases_enemies_and_tolerates_missing_ones() {
        let mut world = upgrade_world();
        let player = world.spawn((Combatant::new(100.0, 0.0), Position::new(0.0, 0.0))).id();
        let near = world
            .spawn((
                Combatant::new(10.0, 0.0),
                EnemyAgent::new(crate::components::Archetype::Guard),
                Position::new(2.0, 0.0),
            ))
            .id();
        let gone = world
            .spawn((
                Combatant::new(10.0, 0.0),
                EnemyAgent::new(crate::components::Archetype::Mine),
                Position::new(3.0, 0.0),
            ))
            .id();
        {
            let mut grid = world.resource_mut::<SpatialGrid>();
            for (entity, x) in [(near, 2.0), (gone, 3.0)] {
                grid.insert(SpatialEntry {
                    entity,
                    x,
                    y: 0.0,
                    radius: 0.5,
                    tag: Tag::Enemy,
                    damageable: true,
                });
            }
        }

        apply_upgrade(
            &mut world,
            player,
            Upgrade::StunPulse {
                radius: 5.0,
                duration: 1.0,
            },
        )
        .unwrap();
        assert!(world.get::<Stunned>(near).is_some());
        assert!(world.get::<Stunned>(gone).is_some());

        world.despawn(gone);
        advance(&mut world, 1.0);
        assert!(world.get::<Stunned>(near).is_none());
        assert!(world.resource::<UpgradeLedger>().is_empty());
    }

    #[test]
    fn test_expiry_against_dead_owner_is_a_no_op() {
        let mut world = upgrade_world();
        let player = world.spawn(Combatant::new(100.0, 0.0)).id();
        apply_upgrade(
            &mut world,
            player,
            Upgrade::ArmorBoost {
                bonus: 5.0,
                duration: Some(1.0),
            },
        )
        .unwrap();

        world.get_mut::<Combatant>(player).unwrap().is_alive = false;
        advance(&mut world, 2.0);

        // Stats untouched, instance gone.
        assert_eq!(world.get::<Combatant>(player).unwrap().armor, 5.0);
        assert!(world.resource::<UpgradeLedger>().is_empty());
    }

    #[test]
    fn test_missing_stats_reports_collaborator() {
        let mut world = upgrade_world();
        let entity = world.spawn(Position::new(0.0, 0.0)).id();
        let result = apply_upgrade(
            &mut world,
            entity,
            Upgrade::DamageBoost {
                multiplier: 2.0,
                duration: None,
            },
        );
        assert!(result.is_none());
        assert_eq!(
            world
                .resource::<Diagnostics>()
                .count(DiagnosticKind::MissingCollaborator),
            1
        );
    }
}
