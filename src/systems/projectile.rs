//! Projectile emitter - traveling damage carriers.
//!
//! Projectiles fly in a straight line at constant velocity and expire after
//! their lifetime without dealing damage. Hits come from [`OverlapEvent`]s,
//! produced either by the built-in circle detector (reads the `SpatialGrid`)
//! or pushed by the host's physics layer.
//!
//! ## Hit eligibility
//!
//! | Target                                   | Result        |
//! |------------------------------------------|---------------|
//! | owner (with owner exclusion)             | ignored       |
//! | damageable, tag in filter                | damage        |
//! | damageable, any-damageable filter        | damage        |
//! | tag in filter, nothing to damage         | pass-through  |
//! | anything else                            | ignored       |
//!
//! A pass-through does not consume the projectile. It is reported as a
//! `CombatEvent::ProjectilePassThrough` so hosts and tests can observe it.
//!
//! ## Parallel Feature
//!
//! With `--features parallel` the overlap gather phase runs on rayon. Results
//! are merged and applied sequentially.

use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::components::*;
use crate::spatial::SpatialGrid;
use crate::systems::combat::{CombatEvent, CombatEvents, DamageQueue};
use crate::systems::movement::DeltaTime;

/// Which entities a projectile may hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetFilter {
    pub tags: TagMask,
    /// Anything with a live `Combatant` is eligible regardless of tag.
    pub any_damageable: bool,
}

impl TargetFilter {
    /// Player shots hit enemies and every damageable thing, including untagged props.
    pub fn player_weapon() -> Self {
        Self {
            tags: TagMask::of(&[Tag::Enemy, Tag::Prop]),
            any_damageable: true,
        }
    }

    /// Enemy shots only hit the player and props.
    pub fn enemy_weapon() -> Self {
        Self {
            tags: TagMask::of(&[Tag::Player, Tag::Prop]),
            any_damageable: false,
        }
    }
}

/// A traveling damage carrier.
#[derive(Component, Debug, Clone)]
pub struct Projectile {
    pub damage: f32,
    /// Seconds left before the projectile expires.
    pub remaining: f32,
    pub radius: f32,
    pub owner: Option<Entity>,
    pub exclude_owner: bool,
    pub filter: TargetFilter,
    pub pierce: bool,
    /// Entities already damaged by this projectile.
    pub hits: SmallVec<[Entity; 4]>,
    /// Set once a non-piercing projectile has delivered its hit.
    pub spent: bool,
}

/// Everything needed to emit a projectile.
#[derive(Debug, Clone, Copy)]
pub struct ProjectileSpec {
    pub position: Position,
    pub direction: Velocity,
    pub speed: f32,
    pub damage: f32,
    pub lifetime: f32,
    pub radius: f32,
    pub owner: Option<Entity>,
    pub exclude_owner: bool,
    pub filter: TargetFilter,
    pub pierce: bool,
}

impl ProjectileSpec {
    fn into_components(self) -> (Position, Velocity, Projectile) {
        let velocity = self.direction.normalized().scaled(self.speed);
        (
            self.position,
            velocity,
            Projectile {
                damage: self.damage,
                remaining: self.lifetime,
                radius: self.radius,
                owner: self.owner,
                exclude_owner: self.exclude_owner,
                filter: self.filter,
                pierce: self.pierce,
                hits: SmallVec::new(),
                spent: false,
            },
        )
    }
}

/// Emit a projectile from inside a system. Returns its handle.
pub fn spawn_projectile(commands: &mut Commands, spec: ProjectileSpec) -> Entity {
    commands.spawn(spec.into_components()).id()
}

/// Emit a projectile with direct world access (host-driven fire).
pub fn spawn_projectile_in(world: &mut World, spec: ProjectileSpec) -> Entity {
    world.spawn(spec.into_components()).id()
}

/// Outcome of a projectile touching another entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitClass {
    Ignore,
    Deliver,
    PassThrough,
}

/// Decide what touching `other` does to this projectile.
pub fn classify_hit(projectile: &Projectile, other: Entity, other_tag: Tag, damageable: bool) -> HitClass {
    if projectile.exclude_owner && projectile.owner == Some(other) {
        return HitClass::Ignore;
    }
    if projectile.hits.contains(&other) {
        return HitClass::Ignore;
    }

    let tag_match = projectile.filter.tags.contains(other_tag);
    if damageable && (tag_match || projectile.filter.any_damageable) {
        HitClass::Deliver
    } else if tag_match {
        HitClass::PassThrough
    } else {
        HitClass::Ignore
    }
}

/// Contact report from the physics collaborator (or the built-in detector).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlapEvent {
    pub self_id: Entity,
    pub other_id: Entity,
    pub other_tag: Tag,
    pub other_damageable: bool,
}

/// Overlaps reported this tick.
#[derive(Resource, Debug, Default)]
pub struct OverlapEvents {
    events: Vec<OverlapEvent>,
}

impl OverlapEvents {
    pub fn push(&mut self, event: OverlapEvent) {
        self.events.push(event);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn drain(&mut self) -> std::vec::Drain<'_, OverlapEvent> {
        self.events.drain(..)
    }
}

/// System that ages projectiles and removes expired ones. No damage on expiry.
pub fn projectile_lifetime_system(
    mut commands: Commands,
    dt: Res<DeltaTime>,
    mut events: ResMut<CombatEvents>,
    mut query: Query<(Entity, &mut Projectile)>,
) {
    let delta = dt.0;
    for (entity, mut projectile) in query.iter_mut() {
        if projectile.spent {
            continue;
        }
        projectile.remaining -= delta;
        if projectile.remaining <= 0.0 {
            projectile.spent = true;
            events.push(CombatEvent::ProjectileExpired { projectile: entity });
            commands.entity(entity).despawn();
        }
    }
}

/// Projectile data extracted for the gather phase.
#[derive(Clone, Copy)]
struct ProjectileProbe {
    entity: Entity,
    x: f32,
    y: f32,
    radius: f32,
}

fn gather_overlaps(probe: &ProjectileProbe, grid: &SpatialGrid) -> Vec<OverlapEvent> {
    grid.query_circle(probe.x, probe.y, probe.radius)
        .into_iter()
        .map(|entry| OverlapEvent {
            self_id: probe.entity,
            other_id: entry.entity,
            other_tag: entry.tag,
            other_damageable: entry.damageable,
        })
        .collect()
}

/// Built-in circle overlap detector for projectiles.
///
/// ## Data Access
/// - Reads: SpatialGrid, Position, Projectile
/// - Writes: OverlapEvents (resource only)
pub fn overlap_detection_system(
    grid: Res<SpatialGrid>,
    mut overlaps: ResMut<OverlapEvents>,
    query: Query<(Entity, &Position, &Projectile)>,
) {
    let probes: Vec<ProjectileProbe> = query
        .iter()
        .filter(|(_, _, p)| !p.spent)
        .map(|(entity, pos, p)| ProjectileProbe {
            entity,
            x: pos.x,
            y: pos.y,
            radius: p.radius,
        })
        .collect();

    #[cfg(feature = "parallel")]
    {
        let partial: Vec<Vec<OverlapEvent>> = probes
            .par_iter()
            .map(|probe| gather_overlaps(probe, &grid))
            .collect();
        for batch in partial {
            for event in batch {
                overlaps.push(event);
            }
        }
    }

    #[cfg(not(feature = "parallel"))]
    {
        for probe in &probes {
            for event in gather_overlaps(probe, &grid) {
                overlaps.push(event);
            }
        }
    }
}

/// System that turns overlaps into damage events.
///
/// ## Data Access
/// - Reads: OverlapEvents, Combatant
/// - Writes: Projectile, DamageQueue, CombatEvents
pub fn projectile_hit_system(
    mut commands: Commands,
    mut overlaps: ResMut<OverlapEvents>,
    mut queue: ResMut<DamageQueue>,
    mut events: ResMut<CombatEvents>,
    mut projectiles: Query<&mut Projectile>,
    combatants: Query<&Combatant>,
) {
    for overlap in overlaps.drain() {
        let Ok(mut projectile) = projectiles.get_mut(overlap.self_id) else {
            continue;
        };
        if projectile.spent {
            continue;
        }

        let damageable = overlap.other_damageable
            && combatants
                .get(overlap.other_id)
                .is_ok_and(|c| c.is_alive);

        match classify_hit(&projectile, overlap.other_id, overlap.other_tag, damageable) {
            HitClass::Ignore => {}
            HitClass::PassThrough => {
                events.push(CombatEvent::ProjectilePassThrough {
                    projectile: overlap.self_id,
                    other: overlap.other_id,
                });
            }
            HitClass::Deliver => {
                queue.push(projectile.damage, projectile.owner, overlap.other_id);
                projectile.hits.push(overlap.other_id);
                if !projectile.pierce {
                    projectile.spent = true;
                    commands.entity(overlap.self_id).despawn();
                }
            }
        }
    }
}
