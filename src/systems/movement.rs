//! Movement system - applies velocity to position.

use crate::components::*;
use bevy_ecs::prelude::*;

/// Resource containing the delta time for the current tick.
#[derive(Resource, Default)]
pub struct DeltaTime(pub f32);

/// System that applies velocity to position. Stunned entities stay put.
pub fn movement_system(
    dt: Res<DeltaTime>,
    mut query: Query<(&mut Position, &Velocity), Without<Stunned>>,
) {
    let delta = dt.0;
    for (mut pos, vel) in query.iter_mut() {
        pos.x += vel.vx * delta;
        pos.y += vel.vy * delta;
    }
}
