//! Encounter configuration.
//!
//! One [`EncounterConfig`] describes a whole run: timestep and seed, the player
//! vehicle, wave pacing, spawn gating and placement, and a table of enemy
//! archetypes with their behavior parameters. Every field has a default, so a
//! JSON file only needs to list what it overrides.

use std::collections::HashSet;

use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};

use crate::components::{Archetype, PlayerWeapon};
use crate::error::ConfigError;
use crate::systems::behavior::{
    BehaviorParams, BulldozerParams, GuardParams, HoundParams, HoundVariant, MineParams,
    ShotParams, SniperParams,
};

/// Configuration for the simulation loop itself.
#[derive(Resource, Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Fixed timestep in seconds (e.g., 1/30 = 0.0333 for 30 Hz).
    pub fixed_timestep: f32,
    /// RNG seed. `None` seeds from entropy.
    pub seed: Option<u64>,
    /// Spatial grid cell size in world units.
    pub grid_cell_size: f32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            fixed_timestep: 1.0 / 30.0, // 30 Hz
            seed: None,
            grid_cell_size: 10.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    pub max_health: f32,
    pub armor: f32,
    pub speed: f32,
    /// Seconds of invulnerability after a hit reaches health.
    pub hit_invulnerability: f32,
    pub weapon: PlayerWeapon,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            max_health: 100.0,
            armor: 0.0,
            speed: 8.0,
            hit_invulnerability: 0.25,
            weapon: PlayerWeapon::default(),
        }
    }
}

/// Wave pacing and difficulty curve.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WaveConfig {
    /// Seconds per wave.
    pub wave_duration: f32,
    /// Difficulty gained per wave.
    pub difficulty_rate: f32,
    /// Upper bound on the difficulty multiplier.
    pub max_difficulty: f32,
    /// Share of the difficulty bonus applied to spawned health (1.0 = all of it).
    pub health_scaling: f32,
}

impl Default for WaveConfig {
    fn default() -> Self {
        Self {
            wave_duration: 30.0,
            difficulty_rate: 0.15,
            max_difficulty: 3.0,
            health_scaling: 1.0,
        }
    }
}

impl WaveConfig {
    /// `min(1 + (wave - 1) * rate, max)`.
    pub fn difficulty_for_wave(&self, wave: u32) -> f32 {
        let raw = 1.0 + wave.saturating_sub(1) as f32 * self.difficulty_rate;
        raw.min(self.max_difficulty)
    }

    pub fn health_multiplier(&self, difficulty: f32) -> f32 {
        1.0 + (difficulty - 1.0) * self.health_scaling
    }
}

/// Relative probability of each spawn placement strategy.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct PlacementWeights {
    pub behind_target: f32,
    pub screen_edge: f32,
    pub uniform_radius: f32,
}

impl Default for PlacementWeights {
    fn default() -> Self {
        Self {
            behind_target: 0.4,
            screen_edge: 0.4,
            uniform_radius: 0.2,
        }
    }
}

impl PlacementWeights {
    pub fn as_array(&self) -> [f32; 3] {
        [self.behind_target, self.screen_edge, self.uniform_radius]
    }
}

/// Global spawn gating and placement.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpawnConfig {
    /// Seconds between spawns.
    pub interval: f32,
    /// Uniform +/- jitter applied to each interval.
    pub jitter: f32,
    pub max_total_enemies: u32,
    /// Distance from the target for behind-target and uniform-radius placement.
    pub spawn_distance: f32,
    /// Lateral spread for behind-target placement.
    pub lateral_jitter: f32,
    /// Half width/height of the visible area, for screen-edge placement.
    pub screen_half_extents: (f32, f32),
    /// Extra distance beyond the screen edge.
    pub edge_margin: f32,
    pub placement: PlacementWeights,
}

impl Default for SpawnConfig {
    fn default() -> Self {
        Self {
            interval: 1.5,
            jitter: 0.3,
            max_total_enemies: 8,
            spawn_distance: 25.0,
            lateral_jitter: 8.0,
            screen_half_extents: (20.0, 12.0),
            edge_margin: 2.0,
            placement: PlacementWeights::default(),
        }
    }
}

/// Spawn table entry plus stats for one enemy archetype.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchetypeConfig {
    pub archetype: Archetype,
    pub weight: f32,
    pub max_on_screen: u32,
    /// Minimum seconds between two spawns of this archetype.
    pub cooldown: f32,
    pub max_health: f32,
    pub armor: f32,
    pub speed: f32,
    pub loot: u32,
    pub behavior: BehaviorParams,
}

impl ArchetypeConfig {
    pub fn default_for(archetype: Archetype) -> Self {
        match archetype {
            Archetype::Bulldozer => Self {
                archetype,
                weight: 4.0,
                max_on_screen: 4,
                cooldown: 1.0,
                max_health: 40.0,
                armor: 2.0,
                speed: 4.0,
                loot: 3,
                behavior: BehaviorParams::Bulldozer(BulldozerParams::default()),
            },
            Archetype::Guard => Self {
                archetype,
                weight: 3.0,
                max_on_screen: 3,
                cooldown: 2.0,
                max_health: 30.0,
                armor: 1.0,
                speed: 3.5,
                loot: 4,
                behavior: BehaviorParams::Guard(GuardParams::default()),
            },
            Archetype::Sniper => Self {
                archetype,
                weight: 1.5,
                max_on_screen: 2,
                cooldown: 5.0,
                max_health: 20.0,
                armor: 0.0,
                speed: 3.0,
                loot: 6,
                behavior: BehaviorParams::Sniper(SniperParams::default()),
            },
            Archetype::PackHound => Self {
                archetype,
                weight: 3.0,
                max_on_screen: 4,
                cooldown: 1.5,
                max_health: 15.0,
                armor: 0.0,
                speed: 6.0,
                loot: 2,
                behavior: BehaviorParams::PackHound(HoundParams {
                    variant: HoundVariant::OrbitStrike,
                    ..HoundParams::default()
                }),
            },
            Archetype::Mine => Self {
                archetype,
                weight: 2.0,
                max_on_screen: 3,
                cooldown: 3.0,
                max_health: 5.0,
                armor: 0.0,
                speed: 0.0,
                loot: 1,
                behavior: BehaviorParams::Mine(MineParams::default()),
            },
        }
    }
}

/// Complete run configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EncounterConfig {
    pub sim: SimConfig,
    pub player: PlayerConfig,
    pub waves: WaveConfig,
    pub spawn: SpawnConfig,
    pub archetypes: Vec<ArchetypeConfig>,
}

impl Default for EncounterConfig {
    fn default() -> Self {
        Self {
            sim: SimConfig::default(),
            player: PlayerConfig::default(),
            waves: WaveConfig::default(),
            spawn: SpawnConfig::default(),
            archetypes: Archetype::ALL
                .iter()
                .map(|a| ArchetypeConfig::default_for(*a))
                .collect(),
        }
    }
}

impl EncounterConfig {
    /// Parse a JSON document. Missing fields fall back to defaults.
    pub fn from_json_str(data: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(data)?)
    }

    pub fn archetype(&self, archetype: Archetype) -> Option<&ArchetypeConfig> {
        self.archetypes.iter().find(|a| a.archetype == archetype)
    }

    /// Check everything the spawn scheduler and behaviors rely on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("sim.fixed_timestep", self.sim.fixed_timestep)?;
        positive("sim.grid_cell_size", self.sim.grid_cell_size)?;
        positive("waves.wave_duration", self.waves.wave_duration)?;
        positive("waves.max_difficulty", self.waves.max_difficulty)?;
        positive("spawn.interval", self.spawn.interval)?;

        let placement = self.spawn.placement.as_array();
        if placement.iter().any(|p| !p.is_finite() || *p < 0.0)
            || placement.iter().sum::<f32>() <= 0.0
        {
            return Err(ConfigError::InvalidPlacement);
        }

        if self.archetypes.is_empty() {
            return Err(ConfigError::EmptySpawnTable);
        }

        let mut seen = HashSet::new();
        let mut total_weight = 0.0;
        for entry in &self.archetypes {
            if !seen.insert(entry.archetype) {
                return Err(ConfigError::DuplicateArchetype(entry.archetype));
            }
            if !entry.weight.is_finite() || entry.weight < 0.0 {
                return Err(ConfigError::InvalidWeight {
                    archetype: entry.archetype,
                    weight: entry.weight,
                });
            }
            total_weight += entry.weight;
            positive("archetype.max_health", entry.max_health)?;
            entry.behavior.validate(entry.archetype)?;
        }
        if total_weight <= 0.0 {
            return Err(ConfigError::ZeroTotalWeight);
        }
        Ok(())
    }
}

fn positive(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NonPositive { field, value })
    }
}

/// Shot parameters shared by the ranged archetypes' defaults.
pub(crate) fn default_shot(damage: f32, speed: f32) -> ShotParams {
    ShotParams {
        damage,
        speed,
        lifetime: 2.0,
        radius: 0.3,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(EncounterConfig::default().validate().is_ok());
    }

    #[test]
    fn test_difficulty_curve_is_capped() {
        let waves = WaveConfig {
            difficulty_rate: 0.5,
            max_difficulty: 2.0,
            ..Default::default()
        };
        assert_eq!(waves.difficulty_for_wave(1), 1.0);
        assert_eq!(waves.difficulty_for_wave(2), 1.5);
        assert_eq!(waves.difficulty_for_wave(10), 2.0);
    }

    #[test]
    fn test_rejects_duplicate_archetypes() {
        let mut config = EncounterConfig::default();
        config
            .archetypes
            .push(ArchetypeConfig::default_for(Archetype::Mine));
        assert!(matches!(
            config.validate(),
            Err(ConfigError::DuplicateArchetype(Archetype::Mine))
        ));
    }

    #[test]
    fn test_rejects_zero_total_weight() {
        let mut config = EncounterConfig::default();
        for entry in &mut config.archetypes {
            entry.weight = 0.0;
        }
        assert!(matches!(config.validate(), Err(ConfigError::ZeroTotalWeight)));
    }

    #[test]
    fn test_rejects_inverted_sniper_ranges() {
        let mut config = EncounterConfig::default();
        config.archetypes = vec![ArchetypeConfig {
            behavior: BehaviorParams::Sniper(SniperParams {
                min_range: 30.0,
                attack_range: 10.0,
                ..Default::default()
            }),
            ..ArchetypeConfig::default_for(Archetype::Sniper)
        }];
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidBehavior { .. })
        ));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = EncounterConfig::from_json_str(
            r#"{ "spawn": { "max_total_enemies": 3 }, "sim": { "seed": 7 } }"#,
        )
        .unwrap();
        assert_eq!(config.spawn.max_total_enemies, 3);
        assert_eq!(config.sim.seed, Some(7));
        assert_eq!(config.archetypes.len(), 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_bad_json_is_parse_error() {
        assert!(matches!(
            EncounterConfig::from_json_str("{ not json"),
            Err(ConfigError::Parse(_))
        ));
    }
}
