//! Radial falloff explosions from mines and explosive props.

use bevy_ecs::prelude::*;
use tracing::debug;

use crate::components::TagMask;
use crate::spatial::SpatialGrid;
use crate::systems::combat::{CombatEvent, CombatEvents, DamageQueue};

/// One detonation waiting to be resolved.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Explosion {
    pub x: f32,
    pub y: f32,
    pub radius: f32,
    /// Damage at the center. Falls off linearly to zero at `radius`.
    pub damage: f32,
    pub targets: TagMask,
    pub source: Option<Entity>,
}

impl Explosion {
    /// Damage dealt to a target whose edge is `distance` from the center.
    pub fn damage_at(&self, distance: f32) -> f32 {
        if self.radius <= 0.0 || distance > self.radius {
            return 0.0;
        }
        self.damage * (1.0 - distance.max(0.0) / self.radius)
    }
}

#[derive(Resource, Debug, Default)]
pub struct PendingExplosions {
    pending: Vec<Explosion>,
}

impl PendingExplosions {
    pub fn push(&mut self, explosion: Explosion) {
        self.pending.push(explosion);
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn drain(&mut self) -> std::vec::Drain<'_, Explosion> {
        self.pending.drain(..)
    }
}

/// System that turns pending explosions into queued damage.
///
/// Only damageable entries whose tag is in the explosion's mask are hit. The
/// source never damages itself.
pub fn explosion_system(
    grid: Res<SpatialGrid>,
    mut pending: ResMut<PendingExplosions>,
    mut queue: ResMut<DamageQueue>,
    mut events: ResMut<CombatEvents>,
) {
    for blast in pending.drain() {
        events.push(CombatEvent::Exploded {
            x: blast.x,
            y: blast.y,
            radius: blast.radius,
        });

        let hits = grid.query_circle_tagged(blast.x, blast.y, blast.radius, blast.targets);
        debug!(x = blast.x, y = blast.y, candidates = hits.len(), "explosion");

        for entry in hits {
            if !entry.damageable || Some(entry.entity) == blast.source {
                continue;
            }
            let center = ((entry.x - blast.x).powi(2) + (entry.y - blast.y).powi(2)).sqrt();
            let amount = blast.damage_at(center - entry.radius);
            if amount > 0.0 {
                queue.push(amount, blast.source, entry.entity);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::Tag;
    use crate::spatial::SpatialEntry;

    fn blast(targets: TagMask) -> Explosion {
        Explosion {
            x: 0.0,
            y: 0.0,
            radius: 4.0,
            damage: 40.0,
            targets,
            source: Some(Entity::from_raw(100)),
        }
    }

    #[test]
    fn test_linear_falloff() {
        let b = blast(TagMask::of(&[Tag::Player]));
        assert_eq!(b.damage_at(0.0), 40.0);
        assert_eq!(b.damage_at(2.0), 20.0);
        assert_eq!(b.damage_at(4.0), 0.0);
        assert_eq!(b.damage_at(5.0), 0.0);
    }

    #[test]
    fn test_explosion_hits_only_masked_damageable_targets() {
        let mut world = World::new();
        let mut grid = SpatialGrid::new(10.0);
        let entry = |id, x, tag, damageable| SpatialEntry {
            entity: Entity::from_raw(id),
            x,
            y: 0.0,
            radius: 0.0,
            tag,
            damageable,
        };
        grid.insert(entry(1, 2.0, Tag::Player, true));
        grid.insert(entry(2, 1.0, Tag::Enemy, true));
        grid.insert(entry(3, 1.0, Tag::Prop, false));
        grid.insert(entry(100, 0.0, Tag::Player, true));
        world.insert_resource(grid);
        world.insert_resource(DamageQueue::default());
        world.insert_resource(CombatEvents::default());
        let mut pending = PendingExplosions::default();
        pending.push(blast(TagMask::of(&[Tag::Player, Tag::Prop])));
        world.insert_resource(pending);

        let mut schedule = Schedule::default();
        schedule.add_systems(explosion_system);
        schedule.run(&mut world);

        let hits: Vec<_> = world.resource_mut::<DamageQueue>().drain().collect();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].target, Entity::from_raw(1));
        assert_eq!(hits[0].raw_damage, 20.0);
        assert!(world.resource::<PendingExplosions>().is_empty());
        assert_eq!(world.resource::<CombatEvents>().events.len(), 1);
    }
}
