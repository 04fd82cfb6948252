//! Enemy behavior state machines.
//!
//! Every enemy is a fixed [`Combatant`] plus one [`Behavior`] variant. A
//! behavior never mutates the world directly: each tick it is handed a
//! [`BehaviorContext`] (its own position and stats, the tracked player, the sim
//! time) and returns a [`BehaviorIntent`] (desired velocity plus attack
//! actions). `behavior_system` applies intents: contact strikes go to the
//! damage queue, shots go through the projectile emitter, explosions are
//! queued for the explosion system.
//!
//! | Archetype | States                                   |
//! |-----------|------------------------------------------|
//! | Bulldozer | Chase                                    |
//! | Guard     | Reposition, Engage                       |
//! | Sniper    | Approach, Aim, Fire, Retreat             |
//! | PackHound | Orbit, Attack, Recover (charge-bounce)   |
//! | Mine      | Idle, Activated, Exploded (terminal)     |
//!
//! A behavior that cannot resolve its target performs no transition that
//! tick. An enemy without a `Combatant` has its behavior disabled for good.

use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use tracing::warn;

use crate::components::*;
use crate::config::default_shot;
use crate::error::{ConfigError, DiagnosticKind, Diagnostics};
use crate::systems::combat::DamageQueue;
use crate::systems::explosion::{Explosion, PendingExplosions};
use crate::systems::player::PlayerTracker;
use crate::systems::projectile::{spawn_projectile, ProjectileSpec, TargetFilter};
use crate::systems::timing::SimClock;

// ============================================================================
// PARAMETERS
// ============================================================================

/// Projectile fired by a ranged archetype.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShotParams {
    pub damage: f32,
    pub speed: f32,
    pub lifetime: f32,
    pub radius: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BulldozerParams {
    /// Distance at which contact damage lands.
    pub contact_range: f32,
    pub contact_damage: f32,
    /// Seconds between contact hits while touching.
    pub contact_cooldown: f32,
}

impl Default for BulldozerParams {
    fn default() -> Self {
        Self {
            contact_range: 1.5,
            contact_damage: 12.0,
            contact_cooldown: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardParams {
    pub fire_range: f32,
    /// Beyond this distance the guard walks toward the target.
    pub reposition_distance: f32,
    pub fire_cooldown: f32,
    pub shot: ShotParams,
}

impl Default for GuardParams {
    fn default() -> Self {
        Self {
            fire_range: 12.0,
            reposition_distance: 16.0,
            fire_cooldown: 1.2,
            shot: default_shot(6.0, 18.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SniperParams {
    pub min_range: f32,
    pub attack_range: f32,
    /// Telegraph length. Not interruptible.
    pub aim_duration: f32,
    /// Longest a retreat may last before approaching again.
    pub retreat_duration: f32,
    pub retreat_speed_multiplier: f32,
    pub shot: ShotParams,
}

impl Default for SniperParams {
    fn default() -> Self {
        Self {
            min_range: 12.0,
            attack_range: 22.0,
            aim_duration: 1.2,
            retreat_duration: 2.5,
            retreat_speed_multiplier: 1.2,
            shot: ShotParams {
                lifetime: 1.5,
                ..default_shot(20.0, 35.0)
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HoundVariant {
    /// Dash in, strike, fall straight back into orbit.
    OrbitStrike,
    /// Dash in, strike, bounce away before orbiting again.
    ChargeBounce,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HoundParams {
    pub variant: HoundVariant,
    pub orbit_radius: f32,
    pub attack_range: f32,
    pub attack_cooldown: f32,
    pub dash_speed_multiplier: f32,
    /// Length of one attack window.
    pub dash_duration: f32,
    pub strike_range: f32,
    pub damage: f32,
    pub bounce_duration: f32,
}

impl Default for HoundParams {
    fn default() -> Self {
        Self {
            variant: HoundVariant::OrbitStrike,
            orbit_radius: 6.0,
            attack_range: 8.0,
            attack_cooldown: 2.5,
            dash_speed_multiplier: 2.5,
            dash_duration: 0.6,
            strike_range: 1.2,
            damage: 8.0,
            bounce_duration: 0.4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MineParams {
    pub activation_range: f32,
    /// Fuse length once activated.
    pub explosion_delay: f32,
    pub explosion_radius: f32,
    pub explosion_damage: f32,
    pub targets: TagMask,
}

impl Default for MineParams {
    fn default() -> Self {
        Self {
            activation_range: 3.5,
            explosion_delay: 1.0,
            explosion_radius: 4.0,
            explosion_damage: 30.0,
            targets: TagMask::of(&[Tag::Player, Tag::Prop]),
        }
    }
}

/// Behavior parameters for one archetype, as loaded from config.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum BehaviorParams {
    Bulldozer(BulldozerParams),
    Guard(GuardParams),
    Sniper(SniperParams),
    PackHound(HoundParams),
    Mine(MineParams),
}

impl BehaviorParams {
    pub fn archetype(&self) -> Archetype {
        match self {
            BehaviorParams::Bulldozer(_) => Archetype::Bulldozer,
            BehaviorParams::Guard(_) => Archetype::Guard,
            BehaviorParams::Sniper(_) => Archetype::Sniper,
            BehaviorParams::PackHound(_) => Archetype::PackHound,
            BehaviorParams::Mine(_) => Archetype::Mine,
        }
    }

    pub fn validate(&self, archetype: Archetype) -> Result<(), ConfigError> {
        let fail = |reason| Err(ConfigError::InvalidBehavior { archetype, reason });
        if self.archetype() != archetype {
            return fail("behavior kind does not match archetype");
        }
        match self {
            BehaviorParams::Bulldozer(p) => {
                if p.contact_range <= 0.0 || p.contact_cooldown <= 0.0 {
                    return fail("contact range and cooldown must be positive");
                }
            }
            BehaviorParams::Guard(p) => {
                if p.fire_range <= 0.0 || p.fire_cooldown <= 0.0 {
                    return fail("fire range and cooldown must be positive");
                }
                if p.reposition_distance < p.fire_range {
                    return fail("reposition distance must be at least the fire range");
                }
            }
            BehaviorParams::Sniper(p) => {
                if p.min_range < 0.0 || p.min_range > p.attack_range {
                    return fail("min range must lie in [0, attack range]");
                }
                if p.aim_duration <= 0.0 || p.retreat_duration <= 0.0 {
                    return fail("aim and retreat durations must be positive");
                }
            }
            BehaviorParams::PackHound(p) => {
                if p.orbit_radius <= 0.0 || p.dash_duration <= 0.0 || p.attack_cooldown <= 0.0 {
                    return fail("orbit radius, dash duration and cooldown must be positive");
                }
            }
            BehaviorParams::Mine(p) => {
                if p.activation_range <= 0.0 || p.explosion_radius <= 0.0 || p.explosion_delay < 0.0 {
                    return fail("activation range and blast radius must be positive");
                }
            }
        }
        Ok(())
    }
}

// ============================================================================
// INTENT
// ============================================================================

/// Everything a behavior may read for one decision.
#[derive(Debug, Clone, Copy)]
pub struct BehaviorContext {
    pub entity: Entity,
    pub position: Position,
    pub speed: f32,
    pub damage_multiplier: f32,
    pub now: f32,
    pub target: Option<(Entity, Position)>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BehaviorAction {
    /// Direct contact damage on the target.
    Strike { target: Entity, damage: f32 },
    /// Emit a projectile.
    Fire {
        origin: Position,
        direction: Velocity,
        shot: ShotParams,
    },
    /// Radial falloff damage centered on the enemy.
    Explode {
        at: Position,
        radius: f32,
        damage: f32,
        targets: TagMask,
    },
    /// Remove this enemy without a kill.
    SelfDestruct,
}

/// What a behavior wants to do this tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BehaviorIntent {
    pub velocity: Velocity,
    pub actions: SmallVec<[BehaviorAction; 2]>,
}

impl BehaviorIntent {
    fn moving(velocity: Velocity) -> Self {
        Self {
            velocity,
            actions: SmallVec::new(),
        }
    }

    fn idle() -> Self {
        Self::default()
    }

    fn with(mut self, action: BehaviorAction) -> Self {
        self.actions.push(action);
        self
    }
}

// ============================================================================
// BULLDOZER
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BulldozerBrain {
    pub params: BulldozerParams,
    pub last_contact: f32,
}

impl BulldozerBrain {
    pub fn new(params: BulldozerParams) -> Self {
        Self {
            params,
            last_contact: f32::NEG_INFINITY,
        }
    }

    fn think(&mut self, ctx: &BehaviorContext, target: Entity, target_pos: Position) -> BehaviorIntent {
        let dir = ctx.position.direction_to(&target_pos);
        let mut intent = BehaviorIntent::moving(dir.scaled(ctx.speed));

        let dist = ctx.position.distance_to(&target_pos);
        if dist <= self.params.contact_range
            && ctx.now - self.last_contact >= self.params.contact_cooldown
        {
            self.last_contact = ctx.now;
            intent = intent.with(BehaviorAction::Strike {
                target,
                damage: self.params.contact_damage * ctx.damage_multiplier,
            });
        }
        intent
    }
}

// ============================================================================
// GUARD
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GuardState {
    Reposition,
    Engage,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GuardBrain {
    pub params: GuardParams,
    pub state: GuardState,
    pub last_shot: f32,
}

impl GuardBrain {
    pub fn new(params: GuardParams) -> Self {
        Self {
            params,
            state: GuardState::Reposition,
            last_shot: f32::NEG_INFINITY,
        }
    }

    fn think(&mut self, ctx: &BehaviorContext, target_pos: Position) -> BehaviorIntent {
        let dist = ctx.position.distance_to(&target_pos);
        let dir = ctx.position.direction_to(&target_pos);

        if dist <= self.params.fire_range {
            self.state = GuardState::Engage;
        } else if dist > self.params.reposition_distance {
            self.state = GuardState::Reposition;
        }

        // Between fire range and reposition distance the guard holds still.
        let velocity = if dist > self.params.reposition_distance {
            dir.scaled(ctx.speed)
        } else {
            Velocity::default()
        };
        let mut intent = BehaviorIntent::moving(velocity);

        // Engage persists through the band, and so does the fire cadence.
        if self.state == GuardState::Engage && ctx.now - self.last_shot >= self.params.fire_cooldown {
            self.last_shot = ctx.now;
            intent = intent.with(BehaviorAction::Fire {
                origin: ctx.position,
                direction: dir,
                shot: scaled_shot(self.params.shot, ctx.damage_multiplier),
            });
        }
        intent
    }
}

// ============================================================================
// SNIPER
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SniperState {
    Approach,
    /// Telegraph: aim point is locked when the aim starts.
    Aim { started: f32, aim_at: Position },
    Fire { aim_at: Position },
    Retreat { started: f32 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SniperBrain {
    pub params: SniperParams,
    pub state: SniperState,
}

impl SniperBrain {
    pub fn new(params: SniperParams) -> Self {
        Self {
            params,
            state: SniperState::Approach,
        }
    }

    fn think(&mut self, ctx: &BehaviorContext, target_pos: Position) -> BehaviorIntent {
        let dist = ctx.position.distance_to(&target_pos);
        let toward = ctx.position.direction_to(&target_pos);
        let p = self.params;

        match self.state {
            SniperState::Approach => {
                if dist > p.attack_range {
                    BehaviorIntent::moving(toward.scaled(ctx.speed))
                } else if dist < p.min_range {
                    BehaviorIntent::moving(toward.scaled(-ctx.speed))
                } else {
                    self.state = SniperState::Aim {
                        started: ctx.now,
                        aim_at: target_pos,
                    };
                    BehaviorIntent::idle()
                }
            }
            SniperState::Aim { started, aim_at } => {
                if ctx.now - started >= p.aim_duration {
                    self.state = SniperState::Fire { aim_at };
                }
                BehaviorIntent::idle()
            }
            SniperState::Fire { aim_at } => {
                self.state = SniperState::Retreat { started: ctx.now };
                BehaviorIntent::idle().with(BehaviorAction::Fire {
                    origin: ctx.position,
                    direction: ctx.position.direction_to(&aim_at),
                    shot: scaled_shot(p.shot, ctx.damage_multiplier),
                })
            }
            SniperState::Retreat { started } => {
                if dist > p.attack_range || ctx.now - started >= p.retreat_duration {
                    self.state = SniperState::Approach;
                    BehaviorIntent::idle()
                } else {
                    BehaviorIntent::moving(toward.scaled(-ctx.speed * p.retreat_speed_multiplier))
                }
            }
        }
    }
}

// ============================================================================
// PACK HOUND
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum HoundState {
    Orbit,
    /// Dash window. A strike always leaves this state, so it lands at most once.
    Attack { started: f32 },
    Recover { started: f32, away: Velocity },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HoundBrain {
    pub params: HoundParams,
    pub state: HoundState,
    pub last_attack: f32,
    /// +1 counter-clockwise, -1 clockwise.
    pub orbit_sign: f32,
}

impl HoundBrain {
    pub fn new(params: HoundParams) -> Self {
        Self {
            params,
            state: HoundState::Orbit,
            last_attack: f32::NEG_INFINITY,
            orbit_sign: 1.0,
        }
    }

    pub fn with_orbit_sign(mut self, sign: f32) -> Self {
        self.orbit_sign = if sign < 0.0 { -1.0 } else { 1.0 };
        self
    }

    fn orbit_velocity(&self, ctx: &BehaviorContext, target_pos: Position) -> Velocity {
        let dist = ctx.position.distance_to(&target_pos);
        let toward = ctx.position.direction_to(&target_pos);
        let tangent = toward.perpendicular().scaled(self.orbit_sign);
        // Pull in or push out proportionally to the radius error.
        let radial = ((dist - self.params.orbit_radius) / self.params.orbit_radius).clamp(-1.0, 1.0);
        let steer = Velocity::new(tangent.vx + toward.vx * radial, tangent.vy + toward.vy * radial);
        steer.normalized().scaled(ctx.speed)
    }

    fn think(&mut self, ctx: &BehaviorContext, target: Entity, target_pos: Position) -> BehaviorIntent {
        let dist = ctx.position.distance_to(&target_pos);
        let toward = ctx.position.direction_to(&target_pos);
        let p = self.params;

        match self.state {
            HoundState::Orbit => {
                if dist <= p.attack_range && ctx.now - self.last_attack >= p.attack_cooldown {
                    self.last_attack = ctx.now;
                    self.state = HoundState::Attack { started: ctx.now };
                    BehaviorIntent::moving(toward.scaled(ctx.speed * p.dash_speed_multiplier))
                } else {
                    BehaviorIntent::moving(self.orbit_velocity(ctx, target_pos))
                }
            }
            HoundState::Attack { started } => {
                if dist <= p.strike_range {
                    let strike = BehaviorAction::Strike {
                        target,
                        damage: p.damage * ctx.damage_multiplier,
                    };
                    self.state = match p.variant {
                        HoundVariant::OrbitStrike => HoundState::Orbit,
                        HoundVariant::ChargeBounce => HoundState::Recover {
                            started: ctx.now,
                            away: toward.scaled(-1.0),
                        },
                    };
                    let velocity = match self.state {
                        HoundState::Recover { away, .. } => away.scaled(ctx.speed * p.dash_speed_multiplier),
                        _ => self.orbit_velocity(ctx, target_pos),
                    };
                    return BehaviorIntent::moving(velocity).with(strike);
                }
                if ctx.now - started >= p.dash_duration {
                    self.state = HoundState::Orbit;
                    return BehaviorIntent::moving(self.orbit_velocity(ctx, target_pos));
                }
                BehaviorIntent::moving(toward.scaled(ctx.speed * p.dash_speed_multiplier))
            }
            HoundState::Recover { started, away } => {
                if ctx.now - started >= p.bounce_duration {
                    self.state = HoundState::Orbit;
                    BehaviorIntent::moving(self.orbit_velocity(ctx, target_pos))
                } else {
                    BehaviorIntent::moving(away.scaled(ctx.speed * p.dash_speed_multiplier))
                }
            }
        }
    }
}

// ============================================================================
// MINE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MineState {
    Idle,
    Activated { armed_at: f32 },
    Exploded,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MineBrain {
    pub params: MineParams,
    pub state: MineState,
}

impl MineBrain {
    pub fn new(params: MineParams) -> Self {
        Self {
            params,
            state: MineState::Idle,
        }
    }

    fn think(&mut self, ctx: &BehaviorContext, target_pos: Position) -> BehaviorIntent {
        let p = self.params;
        match self.state {
            MineState::Idle => {
                // One-way: a mine never disarms.
                if ctx.position.distance_to(&target_pos) <= p.activation_range {
                    self.state = MineState::Activated { armed_at: ctx.now };
                }
                BehaviorIntent::idle()
            }
            MineState::Activated { armed_at } => {
                if ctx.now - armed_at >= p.explosion_delay {
                    self.state = MineState::Exploded;
                    BehaviorIntent::idle()
                        .with(BehaviorAction::Explode {
                            at: ctx.position,
                            radius: p.explosion_radius,
                            damage: p.explosion_damage * ctx.damage_multiplier,
                            targets: p.targets,
                        })
                        .with(BehaviorAction::SelfDestruct)
                } else {
                    BehaviorIntent::idle()
                }
            }
            MineState::Exploded => BehaviorIntent::idle(),
        }
    }
}

// ============================================================================
// BEHAVIOR COMPONENT
// ============================================================================

/// Archetype-specific brain of an enemy.
#[derive(Component, Debug, Clone, Copy, PartialEq)]
pub enum Behavior {
    Bulldozer(BulldozerBrain),
    Guard(GuardBrain),
    Sniper(SniperBrain),
    PackHound(HoundBrain),
    Mine(MineBrain),
}

impl Behavior {
    pub fn from_params(params: &BehaviorParams) -> Self {
        match *params {
            BehaviorParams::Bulldozer(p) => Behavior::Bulldozer(BulldozerBrain::new(p)),
            BehaviorParams::Guard(p) => Behavior::Guard(GuardBrain::new(p)),
            BehaviorParams::Sniper(p) => Behavior::Sniper(SniperBrain::new(p)),
            BehaviorParams::PackHound(p) => Behavior::PackHound(HoundBrain::new(p)),
            BehaviorParams::Mine(p) => Behavior::Mine(MineBrain::new(p)),
        }
    }

    pub fn archetype(&self) -> Archetype {
        match self {
            Behavior::Bulldozer(_) => Archetype::Bulldozer,
            Behavior::Guard(_) => Archetype::Guard,
            Behavior::Sniper(_) => Archetype::Sniper,
            Behavior::PackHound(_) => Archetype::PackHound,
            Behavior::Mine(_) => Archetype::Mine,
        }
    }

    /// Short label of the current state, for snapshots.
    pub fn state_name(&self) -> &'static str {
        match self {
            Behavior::Bulldozer(_) => "Chase",
            Behavior::Guard(b) => match b.state {
                GuardState::Reposition => "Reposition",
                GuardState::Engage => "Engage",
            },
            Behavior::Sniper(b) => match b.state {
                SniperState::Approach => "Approach",
                SniperState::Aim { .. } => "Aim",
                SniperState::Fire { .. } => "Fire",
                SniperState::Retreat { .. } => "Retreat",
            },
            Behavior::PackHound(b) => match b.state {
                HoundState::Orbit => "Orbit",
                HoundState::Attack { .. } => "Attack",
                HoundState::Recover { .. } => "Recover",
            },
            Behavior::Mine(b) => match b.state {
                MineState::Idle => "Idle",
                MineState::Activated { .. } => "Activated",
                MineState::Exploded => "Exploded",
            },
        }
    }

    /// Decide this tick's movement and actions. Without a target the behavior
    /// stays idle and keeps its state.
    pub fn think(&mut self, ctx: &BehaviorContext) -> BehaviorIntent {
        let Some((target, target_pos)) = ctx.target else {
            return BehaviorIntent::idle();
        };
        match self {
            Behavior::Bulldozer(b) => b.think(ctx, target, target_pos),
            Behavior::Guard(b) => b.think(ctx, target_pos),
            Behavior::Sniper(b) => b.think(ctx, target_pos),
            Behavior::PackHound(b) => b.think(ctx, target, target_pos),
            Behavior::Mine(b) => b.think(ctx, target_pos),
        }
    }
}

fn scaled_shot(shot: ShotParams, multiplier: f32) -> ShotParams {
    ShotParams {
        damage: shot.damage * multiplier,
        ..shot
    }
}

// ============================================================================
// BEHAVIOR SYSTEM
// ============================================================================

/// System that runs every enemy's behavior and applies the resulting intents.
///
/// ## Data Access
/// - Reads: SimClock, PlayerTracker, Position, MoveStats, Combatant, Stunned
/// - Writes: Behavior, EnemyAgent, Velocity, DamageQueue, PendingExplosions, Diagnostics
pub fn behavior_system(
    mut commands: Commands,
    clock: Res<SimClock>,
    tracker: Res<PlayerTracker>,
    mut queue: ResMut<DamageQueue>,
    mut explosions: ResMut<PendingExplosions>,
    mut diagnostics: ResMut<Diagnostics>,
    mut agents: Query<
        (
            Entity,
            &mut Behavior,
            &mut EnemyAgent,
            &Position,
            &mut Velocity,
            Option<&MoveStats>,
            Option<&mut Combatant>,
            Option<&Stunned>,
        ),
        (Without<BehaviorDisabled>, Without<Dying>),
    >,
) {
    let now = clock.now();

    for (entity, mut behavior, mut agent, pos, mut vel, stats, combatant, stunned) in agents.iter_mut() {
        let Some(mut combatant) = combatant else {
            warn!(?entity, archetype = agent.archetype.name(), "enemy has no combatant; behavior disabled");
            diagnostics.push(
                DiagnosticKind::MissingCollaborator,
                format!("{} {:?} has no Combatant", agent.archetype.name(), entity),
            );
            *vel = Velocity::default();
            commands.entity(entity).insert(BehaviorDisabled);
            continue;
        };
        if !combatant.is_alive {
            *vel = Velocity::default();
            continue;
        }
        if let Some(stun) = stunned {
            if now < stun.until {
                *vel = Velocity::default();
                continue;
            }
            commands.entity(entity).remove::<Stunned>();
        }

        let ctx = BehaviorContext {
            entity,
            position: *pos,
            speed: stats.map(|s| s.speed).unwrap_or(0.0),
            damage_multiplier: combatant.damage_multiplier,
            now,
            target: tracker.target(),
        };

        let intent = behavior.think(&ctx);
        *vel = intent.velocity;

        for action in intent.actions {
            match action {
                BehaviorAction::Strike { target, damage } => {
                    agent.last_action = now;
                    queue.push(damage, Some(entity), target);
                }
                BehaviorAction::Fire { origin, direction, shot } => {
                    agent.last_action = now;
                    spawn_projectile(
                        &mut commands,
                        ProjectileSpec {
                            position: origin,
                            direction,
                            speed: shot.speed,
                            damage: shot.damage,
                            lifetime: shot.lifetime,
                            radius: shot.radius,
                            owner: Some(entity),
                            exclude_owner: true,
                            filter: TargetFilter::enemy_weapon(),
                            pierce: false,
                        },
                    );
                }
                BehaviorAction::Explode { at, radius, damage, targets } => {
                    agent.last_action = now;
                    explosions.push(Explosion {
                        x: at.x,
                        y: at.y,
                        radius,
                        damage,
                        targets,
                        source: Some(entity),
                    });
                }
                BehaviorAction::SelfDestruct => {
                    // Dead from here on, so a hit later this tick cannot kill it again.
                    combatant.is_alive = false;
                    *vel = Velocity::default();
                    commands.entity(entity).insert(Dying { since_tick: clock.tick });
                }
            }
        }
    }
}
