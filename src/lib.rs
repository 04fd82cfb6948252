//! Ironrun - Combat & Encounter Simulation Core
//!
//! A deterministic, fixed-timestep ECS simulation of a top-down vehicle
//! survival game: damage resolution, projectiles, enemy state machines, wave
//! spawning and temporary upgrades. Uses `bevy_ecs` for the
//! entity-component-system architecture. Rendering, input capture and audio
//! belong to the host, which drives [`SimWorld`] and reads [`Snapshot`]s.

pub mod api;
pub mod components;
pub mod config;
pub mod error;
pub mod spatial;
pub mod stats;
pub mod systems;
pub mod upgrades;
pub mod world;

pub use components::*;
pub use config::{ArchetypeConfig, EncounterConfig, PlayerConfig, SimConfig, SpawnConfig, WaveConfig};
pub use error::{ConfigError, Diagnostic, DiagnosticKind, Diagnostics};
pub use spatial::{SpatialEntry, SpatialGrid};
pub use stats::{flush_stats, KeyValueStore, MemoryStore, RunStats, StatValue};
pub use systems::*;
pub use upgrades::{apply_upgrade, revert_upgrade, Upgrade, UpgradeId, UpgradeLedger};
pub use world::Snapshot;
pub use api::SimWorld;
