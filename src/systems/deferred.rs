//! Time-scheduled follow-up actions.
//!
//! Anything that must happen "N seconds from now" (upgrade expiry, stun
//! release) goes through [`DeferredQueue`] instead of a free-running timer.
//! Every entry names an owner; entries whose owner died are cancelled, and an
//! entry that still fires against a missing owner is discarded.

use bevy_ecs::prelude::*;
use tracing::trace;

use crate::components::Combatant;
use crate::systems::timing::SimClock;
use crate::upgrades::{discard_upgrade, revert_upgrade, UpgradeId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeferredAction {
    RevertUpgrade(UpgradeId),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Deferred {
    pub fire_at: f32,
    pub action: DeferredAction,
    pub owner: Entity,
}

#[derive(Resource, Debug, Default)]
pub struct DeferredQueue {
    entries: Vec<Deferred>,
}

impl DeferredQueue {
    pub fn schedule(&mut self, fire_at: f32, action: DeferredAction, owner: Entity) {
        self.entries.push(Deferred {
            fire_at,
            action,
            owner,
        });
    }

    /// Remove and return every entry due at `now`, earliest first.
    pub fn drain_due(&mut self, now: f32) -> Vec<Deferred> {
        let (mut due, keep): (Vec<_>, Vec<_>) = self.entries.drain(..).partition(|d| d.fire_at <= now);
        self.entries = keep;
        due.sort_by(|a, b| a.fire_at.total_cmp(&b.fire_at));
        due
    }

    /// Drop everything owned by `owner`. Returns how many entries were removed.
    pub fn cancel_owner(&mut self, owner: Entity) -> usize {
        let before = self.entries.len();
        self.entries.retain(|d| d.owner != owner);
        before - self.entries.len()
    }

    pub fn cancel_action(&mut self, action: DeferredAction) {
        self.entries.retain(|d| d.action != action);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn owner_alive(world: &World, owner: Entity) -> bool {
    world.get::<Combatant>(owner).is_some_and(|c| c.is_alive)
}

/// Exclusive system that fires due deferred actions.
pub fn deferred_action_system(world: &mut World) {
    let now = world.resource::<SimClock>().now();
    let due = world.resource_mut::<DeferredQueue>().drain_due(now);

    for entry in due {
        match entry.action {
            DeferredAction::RevertUpgrade(id) => {
                if owner_alive(world, entry.owner) {
                    revert_upgrade(world, id);
                } else {
                    trace!(?id, owner = ?entry.owner, "owner gone; upgrade discarded");
                    discard_upgrade(world, id);
                }
            }
        }
    }
}
