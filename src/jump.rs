//! Scripted jump arc.
//!
//! A jump takes over the avatar's vertical axis: the ground constraint is
//! disabled, the height is animated up (ease-out) and back down (ease-in),
//! and horizontal velocity is pinned to the momentum captured at takeoff.
//! After landing the constraint goes back to the state it had at takeoff,
//! with its next write suppressed when that state is enabled, and a short
//! cooldown follows before the next jump is accepted.
//!
//! Phase changes are driven by an explicit clock (`now`) instead of
//! animation callbacks, so [`JumpController`] can be stepped directly in
//! tests.

use std::time::Duration;

use bevy::prelude::*;

use crate::config::JumpConfig;
use crate::error::InteractionError;
use crate::ground::GroundConstraint;
use crate::intent::{InputLock, MovementIntent, MovementVelocity};
use crate::state::WallProximity;

/// Phase of a jump.
#[derive(Reflect, Debug, Clone, Copy, PartialEq, Default)]
pub enum JumpPhase {
    /// On the ground, a jump may start.
    #[default]
    Ready,
    /// Going up.
    Rising,
    /// Coming down.
    Falling,
    /// Touched down this update.
    Landing {
        /// When the landing happened.
        at: Duration,
    },
    /// Landed; new jumps are rejected for the configured cooldown.
    Cooldown {
        /// When the cooldown started.
        since: Duration,
    },
}

/// What an update asks the caller to do.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum JumpStep {
    /// Nothing to write.
    Idle,
    /// Airborne: set the vertical position.
    Airborne(f32),
    /// Landed: set the vertical position, then hand control back to the
    /// ground constraint.
    Landed(f32),
    /// The jump overran its safety bound and was reset; hand control back.
    TimedOut,
}

/// Jump state of an avatar.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use bevy::prelude::*;
/// use msg_interaction_controller::prelude::*;
///
/// let config = JumpConfig::default();
/// let mut jump = JumpController::default();
/// assert!(jump.trigger(&config, Duration::ZERO, 0.0, Vec3::ZERO));
/// assert!(jump.is_airborne());
/// assert!(!jump.can_jump());
/// ```
#[derive(Component, Reflect, Debug, Clone, Default)]
#[reflect(Component)]
pub struct JumpController {
    phase: JumpPhase,
    start_y: f32,
    max_y: f32,
    momentum: Vec3,
    takeoff: Option<Duration>,
    /// Whether the ground constraint was enabled when the jump took off.
    constraint_was_enabled: bool,
}

impl JumpController {
    /// Current phase.
    pub fn phase(&self) -> JumpPhase {
        self.phase
    }

    /// Whether a jump would be accepted.
    pub fn can_jump(&self) -> bool {
        matches!(self.phase, JumpPhase::Ready)
    }

    /// Whether the jump currently owns vertical motion.
    pub fn is_airborne(&self) -> bool {
        matches!(self.phase, JumpPhase::Rising | JumpPhase::Falling)
    }

    /// Horizontal velocity captured at takeoff.
    pub fn momentum(&self) -> Vec3 {
        self.momentum
    }

    /// Height the jump started from (and lands on).
    pub fn start_y(&self) -> f32 {
        self.start_y
    }

    /// Start a jump from `current_y`. Returns `false` if not ready.
    pub fn trigger(&mut self, config: &JumpConfig, now: Duration, current_y: f32, velocity: Vec3) -> bool {
        if !self.can_jump() {
            return false;
        }
        self.start_y = current_y;
        self.max_y = current_y + config.height;
        self.momentum = Vec3::new(velocity.x, 0.0, velocity.z);
        self.takeoff = Some(now);
        self.phase = JumpPhase::Rising;
        true
    }

    /// End the current arc immediately, landing on the start height.
    ///
    /// Returns the landing height, or `None` when not airborne.
    pub fn land_early(&mut self, now: Duration) -> Option<f32> {
        if !self.is_airborne() {
            return None;
        }
        self.land(now);
        Some(self.start_y)
    }

    /// Advance the jump to `now`.
    pub fn update(&mut self, config: &JumpConfig, now: Duration) -> JumpStep {
        let airtime = self.takeoff.map(|takeoff| now.saturating_sub(takeoff));
        if let Some(elapsed) = airtime {
            if elapsed.as_secs_f32() >= config.safety_timeout {
                let limit = Duration::from_secs_f32(config.safety_timeout.max(0.0));
                warn!("{}", InteractionError::SafetyTimeout { elapsed, limit });
                self.reset();
                return JumpStep::TimedOut;
            }
        }
        let airtime = airtime.map(|a| a.as_secs_f32()).unwrap_or(0.0);

        match self.phase {
            JumpPhase::Ready => JumpStep::Idle,
            JumpPhase::Rising => {
                let t = progress(airtime, config.up_duration);
                if t < 1.0 {
                    return JumpStep::Airborne(self.start_y + (self.max_y - self.start_y) * ease_out(t));
                }
                debug!("jump reached apex at {}", self.max_y);
                self.phase = JumpPhase::Falling;
                self.update(config, now)
            }
            JumpPhase::Falling => {
                let t = progress(airtime - config.up_duration.max(0.0), config.down_duration);
                if t < 1.0 {
                    return JumpStep::Airborne(self.max_y + (self.start_y - self.max_y) * ease_in(t));
                }
                self.land(now);
                JumpStep::Landed(self.start_y)
            }
            JumpPhase::Landing { at } => {
                self.phase = JumpPhase::Cooldown { since: at };
                JumpStep::Idle
            }
            JumpPhase::Cooldown { since } => {
                if now.saturating_sub(since).as_secs_f32() >= config.cooldown {
                    self.phase = JumpPhase::Ready;
                }
                JumpStep::Idle
            }
        }
    }

    /// Take the ground constraint over for the length of the jump.
    fn suspend_constraint(&mut self, constraint: &mut GroundConstraint) {
        self.constraint_was_enabled = constraint.enabled;
        constraint.enabled = false;
    }

    /// Give the ground constraint back in the state it had at takeoff.
    fn resume_constraint(&self, constraint: &mut GroundConstraint, suppress_write: bool) {
        constraint.enabled = self.constraint_was_enabled;
        if constraint.enabled && suppress_write {
            constraint.suppress_next_write();
        }
    }

    fn land(&mut self, now: Duration) {
        debug!("jump landed at {}", self.start_y);
        self.phase = JumpPhase::Landing { at: now };
        self.takeoff = None;
        self.momentum = Vec3::ZERO;
    }

    fn reset(&mut self) {
        self.phase = JumpPhase::Ready;
        self.takeoff = None;
        self.momentum = Vec3::ZERO;
    }
}

fn progress(elapsed: f32, duration: f32) -> f32 {
    if duration <= 0.0 {
        return 1.0;
    }
    (elapsed / duration).clamp(0.0, 1.0)
}

fn ease_out(t: f32) -> f32 {
    1.0 - (1.0 - t) * (1.0 - t)
}

fn ease_in(t: f32) -> f32 {
    t * t
}

/// Start jumps on the rising edge of [`MovementIntent::jump_pressed`].
pub fn trigger_jumps(
    time: Res<Time>,
    lock: Res<InputLock>,
    mut q_avatars: Query<(
        &mut JumpController,
        &JumpConfig,
        &mut MovementIntent,
        &Transform,
        Option<&MovementVelocity>,
        Option<&mut GroundConstraint>,
    )>,
) {
    let now = time.elapsed();
    for (mut jump, config, mut intent, transform, velocity, constraint) in &mut q_avatars {
        if !intent.take_jump_edge() || lock.movement {
            continue;
        }

        let velocity = velocity.map(|v| v.0).unwrap_or(Vec3::ZERO);
        if !jump.trigger(config, now, transform.translation.y, velocity) {
            continue;
        }

        if let Some(mut constraint) = constraint {
            jump.suspend_constraint(&mut constraint);
        }
    }
}

/// Animate active jumps and hand control back to the ground constraint on
/// landing.
pub fn update_jumps(
    time: Res<Time>,
    mut q_avatars: Query<(
        &mut JumpController,
        &JumpConfig,
        &mut Transform,
        Option<&mut MovementVelocity>,
        Option<&mut GroundConstraint>,
        Option<&WallProximity>,
    )>,
) {
    let now = time.elapsed();
    for (mut jump, config, mut transform, velocity, constraint, wall) in &mut q_avatars {
        let step = match wall.filter(|w| w.imminent) {
            Some(wall) => match jump.land_early(now) {
                Some(y) => {
                    transform.translation += wall.away * config.wall_push_back;
                    JumpStep::Landed(y)
                }
                None => jump.update(config, now),
            },
            None => jump.update(config, now),
        };

        match step {
            JumpStep::Idle => {}
            JumpStep::Airborne(y) => transform.translation.y = y,
            JumpStep::Landed(y) => {
                transform.translation.y = y;
                if let Some(mut constraint) = constraint {
                    jump.resume_constraint(&mut constraint, true);
                }
            }
            JumpStep::TimedOut => {
                if let Some(mut constraint) = constraint {
                    jump.resume_constraint(&mut constraint, false);
                }
            }
        }

        if jump.is_airborne() {
            if let Some(mut velocity) = velocity {
                velocity.0.x = jump.momentum.x;
                velocity.0.z = jump.momentum.z;
            }
        }
    }
}
