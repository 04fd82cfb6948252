//! Run statistics and their persistence.
//!
//! [`RunStats`] accumulates during a run. At the end (or at any checkpoint) the
//! host calls [`flush_stats`] with a [`KeyValueStore`]; only what changed since
//! the previous flush is added, so flushing twice never double-counts.

use std::collections::{BTreeMap, HashMap};

use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::components::Archetype;

pub const KEY_CURRENCY: &str = "currency";
pub const KEY_KILLS_TOTAL: &str = "kills.total";
pub const KEY_DAMAGE_DEALT: &str = "damage.dealt";
pub const KEY_DAMAGE_TAKEN: &str = "damage.taken";
pub const KEY_BEST_WAVE: &str = "best_wave";

/// Per-run counters.
#[derive(Resource, Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunStats {
    pub currency: u64,
    pub kills: BTreeMap<Archetype, u32>,
    pub damage_dealt: f32,
    pub damage_taken: f32,
    pub best_wave: u32,
    pub game_over: bool,
    #[serde(skip)]
    flushed: FlushMark,
}

/// Values already written out by the last flush.
#[derive(Debug, Clone, Default, PartialEq)]
struct FlushMark {
    currency: u64,
    kills: BTreeMap<Archetype, u32>,
    damage_dealt: f32,
    damage_taken: f32,
}

impl RunStats {
    pub fn record_kill(&mut self, archetype: Archetype) {
        *self.kills.entry(archetype).or_insert(0) += 1;
    }

    pub fn total_kills(&self) -> u32 {
        self.kills.values().sum()
    }

    pub fn kills_of(&self, archetype: Archetype) -> u32 {
        self.kills.get(&archetype).copied().unwrap_or(0)
    }

    pub fn reach_wave(&mut self, wave: u32) {
        self.best_wave = self.best_wave.max(wave);
    }
}

/// Value type understood by the persistence layer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StatValue {
    Int(i64),
    Float(f64),
}

impl StatValue {
    pub fn as_int(&self) -> i64 {
        match *self {
            StatValue::Int(v) => v,
            StatValue::Float(v) => v as i64,
        }
    }

    pub fn as_float(&self) -> f64 {
        match *self {
            StatValue::Int(v) => v as f64,
            StatValue::Float(v) => v,
        }
    }
}

/// Opaque key-value persistence collaborator.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Option<StatValue>;
    fn upsert(&mut self, key: &str, value: StatValue);
}

/// In-memory store, used by tests and headless runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryStore {
    values: HashMap<String, StatValue>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.values)
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<StatValue> {
        self.values.get(key).copied()
    }

    fn upsert(&mut self, key: &str, value: StatValue) {
        self.values.insert(key.to_string(), value);
    }
}

fn kills_key(archetype: Archetype) -> String {
    format!("kills.{}", archetype.name())
}

fn add_int(store: &mut dyn KeyValueStore, key: &str, delta: i64) {
    if delta == 0 {
        return;
    }
    let current = store.get(key).map(|v| v.as_int()).unwrap_or(0);
    store.upsert(key, StatValue::Int(current + delta));
}

fn add_float(store: &mut dyn KeyValueStore, key: &str, delta: f64) {
    if delta == 0.0 {
        return;
    }
    let current = store.get(key).map(|v| v.as_float()).unwrap_or(0.0);
    store.upsert(key, StatValue::Float(current + delta));
}

/// Accumulate this run's unflushed stats into persistent totals.
pub fn flush_stats(stats: &mut RunStats, store: &mut dyn KeyValueStore) {
    add_int(store, KEY_CURRENCY, stats.currency.saturating_sub(stats.flushed.currency) as i64);

    let mut new_kills = 0i64;
    for (&archetype, &count) in &stats.kills {
        let already = stats.flushed.kills.get(&archetype).copied().unwrap_or(0);
        let delta = i64::from(count.saturating_sub(already));
        add_int(store, &kills_key(archetype), delta);
        new_kills += delta;
    }
    add_int(store, KEY_KILLS_TOTAL, new_kills);

    add_float(
        store,
        KEY_DAMAGE_DEALT,
        f64::from(stats.damage_dealt - stats.flushed.damage_dealt),
    );
    add_float(
        store,
        KEY_DAMAGE_TAKEN,
        f64::from(stats.damage_taken - stats.flushed.damage_taken),
    );

    let best = store.get(KEY_BEST_WAVE).map(|v| v.as_int()).unwrap_or(0);
    if i64::from(stats.best_wave) > best {
        store.upsert(KEY_BEST_WAVE, StatValue::Int(i64::from(stats.best_wave)));
    }

    stats.flushed = FlushMark {
        currency: stats.currency,
        kills: stats.kills.clone(),
        damage_dealt: stats.damage_dealt,
        damage_taken: stats.damage_taken,
    };

    info!(
        currency = stats.currency,
        kills = stats.total_kills(),
        best_wave = stats.best_wave,
        "run stats flushed"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flush_accumulates_onto_stored_values() {
        let mut store = MemoryStore::new();
        store.upsert(KEY_CURRENCY, StatValue::Int(100));
        store.upsert(KEY_BEST_WAVE, StatValue::Int(7));

        let mut stats = RunStats {
            currency: 25,
            best_wave: 3,
            ..Default::default()
        };
        stats.record_kill(Archetype::Guard);
        stats.record_kill(Archetype::Guard);
        stats.record_kill(Archetype::Mine);

        flush_stats(&mut stats, &mut store);

        assert_eq!(store.get(KEY_CURRENCY), Some(StatValue::Int(125)));
        assert_eq!(store.get(KEY_KILLS_TOTAL), Some(StatValue::Int(3)));
        assert_eq!(store.get("kills.Guard"), Some(StatValue::Int(2)));
        // Best wave only ever goes up.
        assert_eq!(store.get(KEY_BEST_WAVE), Some(StatValue::Int(7)));
    }

    #[test]
    fn test_second_flush_only_adds_the_delta() {
        let mut store = MemoryStore::new();
        let mut stats = RunStats {
            currency: 10,
            ..Default::default()
        };

        flush_stats(&mut stats, &mut store);
        flush_stats(&mut stats, &mut store);
        assert_eq!(store.get(KEY_CURRENCY), Some(StatValue::Int(10)));

        stats.currency += 5;
        stats.record_kill(Archetype::Bulldozer);
        flush_stats(&mut stats, &mut store);
        assert_eq!(store.get(KEY_CURRENCY), Some(StatValue::Int(15)));
        assert_eq!(store.get(KEY_KILLS_TOTAL), Some(StatValue::Int(1)));
    }

    #[test]
    fn test_stat_value_json_shape() {
        let mut store = MemoryStore::new();
        store.upsert(KEY_CURRENCY, StatValue::Int(3));
        let json = store.to_json().unwrap();
        assert!(json.contains("\"currency\": 3"));

        let parsed: StatValue = serde_json::from_str("2.5").unwrap();
        assert_eq!(parsed, StatValue::Float(2.5));
    }
}
