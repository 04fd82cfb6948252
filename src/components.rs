//! ECS Components for the Ironrun simulation.
//!
//! Components are pure data containers attached to entities.
//! All game logic lives in systems that query these components.

use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};

// ============================================================================
// SPATIAL COMPONENTS
// ============================================================================

/// 2D position on the map (x = east/west, y = north/south).
#[derive(Component, Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: &Position) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// Unit vector pointing from `self` toward `other`, or zero when coincident.
    pub fn direction_to(&self, other: &Position) -> Velocity {
        Velocity::new(other.x - self.x, other.y - self.y).normalized()
    }

    pub fn offset(&self, dx: f32, dy: f32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }
}

/// 2D velocity vector.
#[derive(Component, Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Velocity {
    pub vx: f32,
    pub vy: f32,
}

impl Velocity {
    pub fn new(vx: f32, vy: f32) -> Self {
        Self { vx, vy }
    }

    pub fn magnitude(&self) -> f32 {
        (self.vx * self.vx + self.vy * self.vy).sqrt()
    }

    pub fn normalized(&self) -> Self {
        let mag = self.magnitude();
        if mag < 0.0001 {
            Self::default()
        } else {
            Self {
                vx: self.vx / mag,
                vy: self.vy / mag,
            }
        }
    }

    pub fn scaled(&self, factor: f32) -> Self {
        Self::new(self.vx * factor, self.vy * factor)
    }

    /// Counter-clockwise perpendicular.
    pub fn perpendicular(&self) -> Self {
        Self::new(-self.vy, self.vx)
    }

    pub fn is_zero(&self) -> bool {
        self.magnitude() < 0.0001
    }
}

/// Direction the entity is facing (unit vector). Only the player uses it today.
#[derive(Component, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Facing(pub Velocity);

impl Default for Facing {
    fn default() -> Self {
        Self(Velocity::new(0.0, 1.0))
    }
}

/// Movement capability.
#[derive(Component, Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MoveStats {
    /// Base movement speed (units per second).
    pub speed: f32,
}

impl Default for MoveStats {
    fn default() -> Self {
        Self { speed: 5.0 }
    }
}

/// Collision radius used for overlap and radius queries.
#[derive(Component, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HitRadius(pub f32);

impl Default for HitRadius {
    fn default() -> Self {
        Self(0.5)
    }
}

// ============================================================================
// IDENTITY COMPONENTS
// ============================================================================

/// Collision/targeting tag of an entity.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Tag {
    Player,
    Enemy,
    Prop,
    #[default]
    Untagged,
}

impl Tag {
    #[inline]
    pub fn bit(self) -> u8 {
        match self {
            Tag::Player => 0b0001,
            Tag::Enemy => 0b0010,
            Tag::Prop => 0b0100,
            Tag::Untagged => 0b1000,
        }
    }
}

/// Set of tags used by target filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TagMask(pub u8);

impl TagMask {
    pub const NONE: TagMask = TagMask(0);

    pub fn of(tags: &[Tag]) -> Self {
        Self(tags.iter().fold(0, |acc, t| acc | t.bit()))
    }

    #[inline]
    pub fn contains(&self, tag: Tag) -> bool {
        self.0 & tag.bit() != 0
    }

    pub fn with(self, tag: Tag) -> Self {
        Self(self.0 | tag.bit())
    }
}

/// Enemy archetype identifier.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Archetype {
    Bulldozer,
    Guard,
    Sniper,
    PackHound,
    Mine,
}

impl Archetype {
    pub const ALL: [Archetype; 5] = [
        Archetype::Bulldozer,
        Archetype::Guard,
        Archetype::Sniper,
        Archetype::PackHound,
        Archetype::Mine,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Archetype::Bulldozer => "Bulldozer",
            Archetype::Guard => "Guard",
            Archetype::Sniper => "Sniper",
            Archetype::PackHound => "PackHound",
            Archetype::Mine => "Mine",
        }
    }
}

/// Marker for the player-controlled vehicle.
#[derive(Component, Debug, Clone, Copy, Default)]
pub struct Player;

/// Marker for breakable scenery.
#[derive(Component, Debug, Clone, Copy, Default)]
pub struct Prop;

// ============================================================================
// COMBAT COMPONENTS
// ============================================================================

/// Health, armor and shield of anything that can take damage.
///
/// Only the combat resolver and the upgrade system write to this.
#[derive(Component, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Combatant {
    pub current_health: f32,
    pub max_health: f32,
    /// Flat reduction applied to every incoming hit.
    pub armor: f32,
    /// Multiplier applied to damage this combatant deals.
    pub damage_multiplier: f32,
    /// Absorbs mitigated damage before health does.
    pub shield_health: f32,
    /// Terminal once false.
    pub is_alive: bool,
    /// Seconds left during which incoming damage is ignored.
    pub invulnerability_remaining: f32,
    /// Invulnerability granted after each hit that reaches health.
    pub hit_invulnerability: f32,
}

impl Combatant {
    pub fn new(max_health: f32, armor: f32) -> Self {
        Self {
            current_health: max_health,
            max_health,
            armor,
            damage_multiplier: 1.0,
            shield_health: 0.0,
            is_alive: max_health > 0.0,
            invulnerability_remaining: 0.0,
            hit_invulnerability: 0.0,
        }
    }

    pub fn with_hit_invulnerability(mut self, seconds: f32) -> Self {
        self.hit_invulnerability = seconds.max(0.0);
        self
    }

    pub fn health_fraction(&self) -> f32 {
        if self.max_health <= 0.0 {
            0.0
        } else {
            (self.current_health / self.max_health).clamp(0.0, 1.0)
        }
    }

    #[inline]
    pub fn is_invulnerable(&self) -> bool {
        self.invulnerability_remaining > 0.0
    }

    /// Scale max and current health together (difficulty scaling at spawn).
    pub fn scale_health(&mut self, multiplier: f32) {
        let multiplier = multiplier.max(0.0);
        self.max_health *= multiplier;
        self.current_health = (self.current_health * multiplier).min(self.max_health);
    }
}

impl Default for Combatant {
    fn default() -> Self {
        Self::new(100.0, 0.0)
    }
}

/// Death transition marker: the entity is removed at the start of the next tick.
#[derive(Component, Debug, Clone, Copy)]
pub struct Dying {
    pub since_tick: u64,
}

/// Currency credited to the run when this entity dies.
#[derive(Component, Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Loot {
    pub currency: u32,
}

/// Explodes with radial falloff damage when destroyed.
#[derive(Component, Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Explosive {
    pub radius: f32,
    pub damage: f32,
    pub targets: TagMask,
}

// ============================================================================
// ENEMY STATUS COMPONENTS
// ============================================================================

/// Per-enemy bookkeeping shared by every archetype.
#[derive(Component, Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EnemyAgent {
    pub archetype: Archetype,
    /// Sim time of the last attack this agent performed.
    pub last_action: f32,
}

impl EnemyAgent {
    pub fn new(archetype: Archetype) -> Self {
        Self {
            archetype,
            last_action: f32::NEG_INFINITY,
        }
    }
}

/// Enemy is frozen until the given sim time.
#[derive(Component, Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Stunned {
    pub until: f32,
}

/// Behavior permanently switched off because a required component is absent.
#[derive(Component, Debug, Clone, Copy, Default)]
pub struct BehaviorDisabled;

/// Links a spawned enemy back to the scheduler's live counts.
#[derive(Component, Debug, Clone, Copy)]
pub struct SpawnTicket {
    pub archetype: Archetype,
    pub released: bool,
}

impl SpawnTicket {
    pub fn new(archetype: Archetype) -> Self {
        Self {
            archetype,
            released: false,
        }
    }

    /// Returns true only the first time it is called.
    pub fn release(&mut self) -> bool {
        if self.released {
            false
        } else {
            self.released = true;
            true
        }
    }
}

// ============================================================================
// PLAYER COMPONENTS
// ============================================================================

/// Projectile parameters used when the host triggers the player's gun.
#[derive(Component, Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PlayerWeapon {
    pub damage: f32,
    pub speed: f32,
    pub lifetime: f32,
    pub radius: f32,
    pub pierce: bool,
}

impl Default for PlayerWeapon {
    fn default() -> Self {
        Self {
            damage: 10.0,
            speed: 30.0,
            lifetime: 1.5,
            radius: 0.3,
            pierce: false,
        }
    }
}

// ============================================================================
// BUNDLE HELPERS
// ============================================================================

/// Bundle for spawning the player vehicle.
#[derive(Bundle, Default)]
pub struct PlayerBundle {
    pub marker: Player,
    pub tag: Tag,
    pub position: Position,
    pub velocity: Velocity,
    pub facing: Facing,
    pub radius: HitRadius,
    pub stats: MoveStats,
    pub combatant: Combatant,
    pub weapon: PlayerWeapon,
}

/// Bundle for spawning a breakable prop.
#[derive(Bundle, Default)]
pub struct PropBundle {
    pub marker: Prop,
    pub tag: Tag,
    pub position: Position,
    pub radius: HitRadius,
    pub combatant: Combatant,
    pub loot: Loot,
}

impl PropBundle {
    pub fn new(x: f32, y: f32, health: f32, tag: Tag) -> Self {
        Self {
            marker: Prop,
            tag,
            position: Position::new(x, y),
            radius: HitRadius(1.0),
            combatant: Combatant::new(health, 0.0),
            loot: Loot::default(),
        }
    }
}
