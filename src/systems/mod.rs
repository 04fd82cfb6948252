//! ECS systems for the encounter simulation.
//!
//! Systems contain the game logic that operates on components.
//!
//! ## Tick Order
//!
//! Every fixed tick runs these in sequence (see [`crate::api::SimWorld`]):
//!
//! **Housekeeping**
//! - `despawn_dead_system` - Removes last tick's dying entities
//! - `player_tracking_system` - Publishes the player target
//! - `deferred_action_system` - Fires due upgrade expiries
//!
//! **Decisions**
//! - `spawn_scheduler_system` - Wave pacing and spawning
//! - `behavior_system` - Enemy state machines
//! - `player_movement_system` - Input to velocity
//!
//! **Physics**
//! - `movement_system` - Applies velocity to position
//! - `spatial_grid_update_system` - Rebuilds spatial grid
//! - `explosion_system` - Radial damage from mines and barrels
//! - `projectile_lifetime_system` - Expires old projectiles
//! - `overlap_detection_system` - Projectile overlaps (parallel with `parallel`)
//! - `projectile_hit_system` - Classifies overlaps into hits
//!
//! **Resolution**
//! - `damage_resolution_system` - Applies queued damage one hit at a time
//! - `death_effects_system` - Loot, kills, spawn slots
//! - `upgrade_depletion_system` - Drops used-up shields
//! - `combatant_timer_system` - Hit invulnerability countdown

pub mod behavior;
pub mod combat;
pub mod deferred;
pub mod explosion;
pub mod lifecycle;
pub mod movement;
pub mod player;
pub mod projectile;
pub mod spawner;
pub mod timing;

pub use behavior::*;
pub use combat::*;
pub use deferred::*;
pub use explosion::*;
pub use lifecycle::*;
pub use movement::*;
pub use player::*;
pub use projectile::*;
pub use spawner::*;
pub use timing::*;
