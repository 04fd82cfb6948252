//! Death handling.
//!
//! A combatant that dies this tick is marked [`Dying`] and stays in the world
//! until the start of the next tick, so observers can still read it. The
//! player is never despawned; its death ends the run.

use bevy_ecs::prelude::*;
use tracing::{debug, info};

use crate::components::*;
use crate::stats::RunStats;
use crate::systems::combat::CombatEvents;
use crate::systems::deferred::DeferredQueue;
use crate::systems::explosion::{Explosion, PendingExplosions};
use crate::systems::spawner::SpawnScheduler;
use crate::upgrades::{discard_upgrade, UpgradeLedger};

/// System that reacts to this tick's deaths: loot, kill counts, spawn slots,
/// explosive props and pending timers.
pub fn death_effects_system(
    events: Res<CombatEvents>,
    mut stats: ResMut<RunStats>,
    mut scheduler: ResMut<SpawnScheduler>,
    mut deferred: ResMut<DeferredQueue>,
    mut explosions: ResMut<PendingExplosions>,
    mut dead: Query<(
        Option<&Loot>,
        Option<&EnemyAgent>,
        Option<&mut SpawnTicket>,
        Option<&Explosive>,
        Option<&Position>,
        Has<Player>,
    )>,
) {
    for (target, source) in events.deaths() {
        deferred.cancel_owner(target);

        let Ok((loot, agent, ticket, explosive, pos, is_player)) = dead.get_mut(target) else {
            continue;
        };

        if is_player {
            stats.game_over = true;
            info!(?source, "player destroyed; run over");
            continue;
        }

        if let Some(loot) = loot {
            stats.currency += u64::from(loot.currency);
        }
        if let Some(agent) = agent {
            stats.record_kill(agent.archetype);
        }
        if let Some(mut ticket) = ticket {
            if ticket.release() {
                scheduler.release(ticket.archetype);
            }
        }
        if let (Some(explosive), Some(pos)) = (explosive, pos) {
            explosions.push(Explosion {
                x: pos.x,
                y: pos.y,
                radius: explosive.radius,
                damage: explosive.damage,
                targets: explosive.targets,
                source: Some(target),
            });
        }
    }
}

/// Exclusive system that removes last tick's dying entities.
pub fn despawn_dead_system(world: &mut World) {
    let doomed: Vec<Entity> = world
        .query_filtered::<Entity, (With<Dying>, Without<Player>)>()
        .iter(world)
        .collect();

    for entity in doomed {
        let released = world
            .get_mut::<SpawnTicket>(entity)
            .and_then(|mut t| t.release().then_some(t.archetype));
        if let Some(archetype) = released {
            world.resource_mut::<SpawnScheduler>().release(archetype);
        }

        world.resource_mut::<DeferredQueue>().cancel_owner(entity);
        let upgrades = world.resource::<UpgradeLedger>().ids_for(entity);
        for id in upgrades {
            discard_upgrade(world, id);
        }

        world.despawn(entity);
        debug!(?entity, "despawned");
    }
}
