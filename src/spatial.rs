//! Spatial partitioning for radius queries.
//!
//! Provides O(1) cell lookup and O(k) neighbor queries where k is the number
//! of entities in nearby cells, rather than O(n) for brute force. The grid is
//! the simulation's stand-in for the physics collaborator's circle query:
//! explosions and the projectile overlap detector read it.

use bevy_ecs::prelude::*;
use std::collections::HashMap;

use crate::components::{Combatant, HitRadius, Position, Tag, TagMask};
use crate::systems::projectile::Projectile;

/// Grid-based spatial partitioning structure.
///
/// Divides the world into cells and tracks which entities are in each cell.
/// Enables fast neighbor queries by only checking nearby cells.
#[derive(Resource, Debug)]
pub struct SpatialGrid {
    /// Cell size in world units.
    pub cell_size: f32,
    /// Map from cell coordinates to list of entities in that cell.
    cells: HashMap<(i32, i32), Vec<SpatialEntry>>,
    /// Reverse lookup: entity to cell.
    entity_cells: HashMap<Entity, (i32, i32)>,
    /// Largest radius inserted since the last clear.
    max_radius: f32,
}

/// Entry in a spatial cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpatialEntry {
    pub entity: Entity,
    pub x: f32,
    pub y: f32,
    pub radius: f32,
    pub tag: Tag,
    /// Entity carries a live `Combatant` and can take damage.
    pub damageable: bool,
}

impl Default for SpatialGrid {
    fn default() -> Self {
        Self::new(10.0)
    }
}

impl SpatialGrid {
    /// Create a new spatial grid with the given cell size.
    pub fn new(cell_size: f32) -> Self {
        Self {
            cell_size,
            cells: HashMap::new(),
            entity_cells: HashMap::new(),
            max_radius: 0.0,
        }
    }

    /// Convert world coordinates to cell coordinates.
    #[inline]
    pub fn world_to_cell(&self, x: f32, y: f32) -> (i32, i32) {
        (
            (x / self.cell_size).floor() as i32,
            (y / self.cell_size).floor() as i32,
        )
    }

    /// Clear all entries (call at start of each frame before rebuilding).
    pub fn clear(&mut self) {
        self.cells.clear();
        self.entity_cells.clear();
        self.max_radius = 0.0;
    }

    /// Insert an entry, replacing any previous entry for the same entity.
    pub fn insert(&mut self, entry: SpatialEntry) {
        let cell = self.world_to_cell(entry.x, entry.y);

        if let Some(&old_cell) = self.entity_cells.get(&entry.entity) {
            if let Some(entries) = self.cells.get_mut(&old_cell) {
                entries.retain(|e| e.entity != entry.entity);
            }
        }

        self.max_radius = self.max_radius.max(entry.radius);
        self.cells.entry(cell).or_default().push(entry);
        self.entity_cells.insert(entry.entity, cell);
    }

    /// Remove an entity from the grid.
    pub fn remove(&mut self, entity: Entity) {
        if let Some(cell) = self.entity_cells.remove(&entity) {
            if let Some(entries) = self.cells.get_mut(&cell) {
                entries.retain(|e| e.entity != entity);
            }
        }
    }

    /// Query all entities whose circle overlaps the query circle.
    /// Returns entries sorted by center distance (closest first).
    pub fn query_circle(&self, x: f32, y: f32, radius: f32) -> Vec<SpatialEntry> {
        let reach = radius + self.max_radius;
        let cells_to_check = (reach / self.cell_size).ceil() as i32 + 1;
        let center_cell = self.world_to_cell(x, y);

        let mut results = Vec::new();

        for dx in -cells_to_check..=cells_to_check {
            for dy in -cells_to_check..=cells_to_check {
                let cell = (center_cell.0 + dx, center_cell.1 + dy);
                if let Some(entries) = self.cells.get(&cell) {
                    for entry in entries {
                        let limit = radius + entry.radius;
                        let dist_sq = (entry.x - x).powi(2) + (entry.y - y).powi(2);
                        if dist_sq <= limit * limit {
                            results.push(*entry);
                        }
                    }
                }
            }
        }

        results.sort_by(|a, b| {
            let dist_a = (a.x - x).powi(2) + (a.y - y).powi(2);
            let dist_b = (b.x - x).powi(2) + (b.y - y).powi(2);
            dist_a.partial_cmp(&dist_b).unwrap_or(std::cmp::Ordering::Equal)
        });

        results
    }

    /// Circle query restricted to the given tags.
    pub fn query_circle_tagged(&self, x: f32, y: f32, radius: f32, tags: TagMask) -> Vec<SpatialEntry> {
        let mut results = self.query_circle(x, y, radius);
        results.retain(|e| tags.contains(e.tag));
        results
    }

    pub fn get(&self, entity: Entity) -> Option<&SpatialEntry> {
        let cell = self.entity_cells.get(&entity)?;
        self.cells.get(cell)?.iter().find(|e| e.entity == entity)
    }

    /// Get total entity count.
    pub fn total_count(&self) -> usize {
        self.entity_cells.len()
    }
}

/// System that rebuilds the spatial grid each tick.
///
/// Dead combatants are left out so they can no longer be hit or block shots.
pub fn spatial_grid_update_system(
    mut grid: ResMut<SpatialGrid>,
    query: Query<
        (Entity, &Position, Option<&Tag>, Option<&Combatant>, Option<&HitRadius>),
        Without<Projectile>,
    >,
) {
    grid.clear();

    for (entity, pos, tag, combatant, radius) in query.iter() {
        if combatant.is_some_and(|c| !c.is_alive) {
            continue;
        }

        grid.insert(SpatialEntry {
            entity,
            x: pos.x,
            y: pos.y,
            radius: radius.copied().unwrap_or_default().0,
            tag: tag.copied().unwrap_or_default(),
            damageable: combatant.is_some(),
        });
    }
}
