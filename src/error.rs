//! Error and diagnostic types.
//!
//! Nothing in the per-tick path returns an error. Configuration problems are
//! reported once at startup as [`ConfigError`]s; runtime problems (a missing
//! component, a redundant transition) are absorbed and, where useful, recorded
//! in the [`Diagnostics`] resource.

use bevy_ecs::prelude::*;
use serde::Serialize;
use thiserror::Error;

use crate::components::Archetype;

/// Invalid encounter configuration, detected before the first tick.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("spawn table is empty")]
    EmptySpawnTable,
    #[error("archetype {0:?} appears more than once in the spawn table")]
    DuplicateArchetype(Archetype),
    #[error("archetype {archetype:?} has invalid weight {weight}")]
    InvalidWeight { archetype: Archetype, weight: f32 },
    #[error("total spawn weight must be positive")]
    ZeroTotalWeight,
    #[error("placement probabilities must be non-negative with a positive sum")]
    InvalidPlacement,
    #[error("{field} must be positive, got {value}")]
    NonPositive { field: &'static str, value: f32 },
    #[error("{archetype:?}: {reason}")]
    InvalidBehavior {
        archetype: Archetype,
        reason: &'static str,
    },
    #[error("failed to parse encounter config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Category of a recorded diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DiagnosticKind {
    /// A required component or target was absent; the dependent behavior is off.
    MissingCollaborator,
    /// Startup configuration was rejected; the owning subsystem is disabled.
    InvalidConfiguration,
}

#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
}

/// Diagnostics collected since the world was created.
#[derive(Resource, Debug, Default)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn push(&mut self, kind: DiagnosticKind, message: impl Into<String>) {
        self.entries.push(Diagnostic {
            kind,
            message: message.into(),
        });
    }

    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    pub fn count(&self, kind: DiagnosticKind) -> usize {
        self.entries.iter().filter(|d| d.kind == kind).count()
    }
}
