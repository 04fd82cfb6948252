//! Player input and target tracking.
//!
//! The host owns input capture. It writes a movement vector into
//! [`PlayerInput`]; the simulation turns that into velocity and facing, and
//! publishes the player's position in [`PlayerTracker`] for enemy behaviors.
//! Behaviors only ever look the player up through the tracker, never own it.

use bevy_ecs::prelude::*;

use crate::components::*;

/// Movement input injected by the host each frame.
#[derive(Resource, Debug, Clone, Copy, Default)]
pub struct PlayerInput {
    pub move_x: f32,
    pub move_y: f32,
}

/// Where the player is this tick. `entity` is `None` when there is no live player.
#[derive(Resource, Debug, Clone, Copy, Default)]
pub struct PlayerTracker {
    pub entity: Option<Entity>,
    pub position: Position,
    pub facing: Velocity,
    pub velocity: Velocity,
}

impl PlayerTracker {
    /// Position of the live player, if any.
    pub fn target(&self) -> Option<(Entity, Position)> {
        self.entity.map(|e| (e, self.position))
    }
}

/// System that converts input into player velocity and facing.
pub fn player_movement_system(
    input: Res<PlayerInput>,
    mut query: Query<(&Combatant, &MoveStats, &mut Velocity, &mut Facing), With<Player>>,
) {
    let wish = Velocity::new(input.move_x, input.move_y);
    // Analog sticks may report less than full deflection.
    let throttle = wish.magnitude().min(1.0);
    let dir = wish.normalized();

    for (combatant, stats, mut vel, mut facing) in query.iter_mut() {
        if !combatant.is_alive {
            *vel = Velocity::default();
            continue;
        }
        *vel = dir.scaled(stats.speed * throttle);
        if !dir.is_zero() {
            facing.0 = dir;
        }
    }
}

/// System that publishes the player's position for this tick.
pub fn player_tracking_system(
    mut tracker: ResMut<PlayerTracker>,
    query: Query<(Entity, &Position, &Combatant, Option<&Facing>, Option<&Velocity>), With<Player>>,
) {
    let live = query.iter().find(|(_, _, c, _, _)| c.is_alive);
    match live {
        Some((entity, pos, _, facing, vel)) => {
            tracker.entity = Some(entity);
            tracker.position = *pos;
            tracker.facing = facing.copied().unwrap_or_default().0;
            tracker.velocity = vel.copied().unwrap_or_default();
        }
        None => tracker.entity = None,
    }
}
