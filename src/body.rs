//! Physics body lifecycle.
//!
//! Objects switch between two simulation modes while they are handled:
//! user-controlled (kinematic, positioned by the holder every frame) and
//! physically simulated (dynamic). Converting captures a [`BodySnapshot`] of
//! the original parameters; restoring rebuilds a dynamic body from it and can
//! hand the new body a release velocity.
//!
//! A freshly reinstalled body is not necessarily live in the physics engine
//! within the same tick, so release velocities are delivered through a short
//! [`PendingVelocity`] delay instead of being written immediately.

use bevy::prelude::*;

use crate::backend::InteractionPhysicsBackend;
use crate::error::{InteractionError, InteractionResult};

/// Simulation mode of a body.
#[derive(Reflect, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BodyMode {
    /// Moved by the physics solver.
    #[default]
    Dynamic,
    /// Never moves.
    Static,
    /// Positioned externally; pushes dynamic bodies but is not pushed.
    Kinematic,
}

/// Collision shape of a body, as far as the lifecycle manager cares.
#[derive(Reflect, Debug, Clone, Copy, PartialEq)]
pub enum BodyShape {
    /// Box with the given half extents.
    Cuboid {
        /// Half extents on each axis.
        half_extents: Vec3,
    },
    /// Sphere.
    Ball {
        /// Sphere radius.
        radius: f32,
    },
    /// Capsule along Y.
    Capsule {
        /// Half length of the segment.
        half_height: f32,
        /// Radius around the segment.
        radius: f32,
    },
    /// Cylinder along Y.
    Cylinder {
        /// Half height.
        half_height: f32,
        /// Radius.
        radius: f32,
    },
    /// Any other shape; backends keep the existing collider untouched.
    Other,
}

/// Declarative parameter set of a simulation body.
#[derive(Reflect, Debug, Clone, Copy, PartialEq)]
pub struct BodyParams {
    /// Simulation mode.
    pub mode: BodyMode,
    /// Mass.
    pub mass: f32,
    /// Collision shape.
    pub shape: BodyShape,
    /// Friction coefficient.
    pub friction: f32,
    /// Restitution coefficient.
    pub restitution: f32,
}

impl Default for BodyParams {
    fn default() -> Self {
        Self {
            mode: BodyMode::Dynamic,
            mass: 1.0,
            shape: BodyShape::Other,
            friction: 0.5,
            restitution: 0.0,
        }
    }
}

impl BodyParams {
    /// The same parameters in another mode.
    pub fn with_mode(mut self, mode: BodyMode) -> Self {
        self.mode = mode;
        self
    }
}

/// Simulation parameters captured right before an object was taken over by
/// the user.
///
/// Created on pickup, consumed on release or throw.
#[derive(Reflect, Debug, Clone, Copy, PartialEq)]
pub struct BodySnapshot {
    original: BodyParams,
}

impl BodySnapshot {
    /// Capture `params`.
    pub fn new(original: BodyParams) -> Self {
        Self { original }
    }

    /// The parameters as they were captured.
    pub fn original(&self) -> &BodyParams {
        &self.original
    }

    /// Parameters for the restored body: the captured ones, always dynamic.
    pub fn restored(&self) -> BodyParams {
        self.original.with_mode(BodyMode::Dynamic)
    }
}

/// A release velocity waiting for its body to become live.
#[derive(Component, Debug, Clone)]
pub struct PendingVelocity {
    /// Linear velocity to apply.
    pub velocity: Vec3,
    /// Delivery delay.
    pub timer: Timer,
}

impl PendingVelocity {
    /// Deliver `velocity` after `delay` seconds.
    pub fn new(velocity: Vec3, delay: f32) -> Self {
        Self {
            velocity,
            timer: Timer::from_seconds(delay.max(0.0), TimerMode::Once),
        }
    }
}

/// Swap an entity's dynamic body for a user-controlled (kinematic) one.
///
/// The entity's transform is the same before and after the swap. Fails with
/// [`InteractionError::MissingBody`] (logged) when the entity has no body.
pub fn convert_to_user_controlled<B: InteractionPhysicsBackend>(
    world: &mut World,
    entity: Entity,
) -> InteractionResult<BodySnapshot> {
    let Some(params) = B::read_body(world, entity) else {
        let err = InteractionError::MissingBody(entity);
        warn!("{err}");
        return Err(err);
    };

    let transform = world.get::<Transform>(entity).copied();
    B::remove_body(world, entity);
    B::insert_body(world, entity, &params.with_mode(BodyMode::Kinematic));
    reapply_transform(world, entity, transform);

    Ok(BodySnapshot::new(params))
}

/// Rebuild a dynamic body from `snapshot`.
///
/// The body is always restored as dynamic, whatever mode was captured. The
/// transform from before the swap is written back, and a `velocity`, if
/// given, is scheduled for delivery after `velocity_delay` seconds. Returns
/// `false` if the entity no longer exists.
pub fn restore<B: InteractionPhysicsBackend>(
    world: &mut World,
    entity: Entity,
    snapshot: &BodySnapshot,
    velocity: Option<Vec3>,
    velocity_delay: f32,
) -> bool {
    if !world.entities().contains(entity) {
        warn!("cannot restore body of despawned entity {entity}");
        return false;
    }

    let transform = world.get::<Transform>(entity).copied();
    B::remove_body(world, entity);
    B::insert_body(world, entity, &snapshot.restored());
    reapply_transform(world, entity, transform);

    if let Some(velocity) = velocity {
        apply_velocity(world, entity, velocity, velocity_delay);
    }
    true
}

/// Schedule `velocity` for the entity's body after `delay` seconds.
///
/// On delivery the linear velocity is set, angular velocity zeroed and the
/// body woken. If the body is not live and dynamic by then, the velocity is
/// dropped with a warning; there is no retry.
pub fn apply_velocity(world: &mut World, entity: Entity, velocity: Vec3, delay: f32) {
    if let Ok(mut entity_mut) = world.get_entity_mut(entity) {
        entity_mut.insert(PendingVelocity::new(velocity, delay));
    }
}

/// Throw velocity for a viewpoint orientation and force.
///
/// The direction is forward (-Z) with a small upward bias, rotated into the
/// viewpoint's orientation.
pub fn calculate_throw_velocity(viewpoint_rotation: Quat, force: f32, upward_bias: f32) -> Vec3 {
    let direction = Vec3::new(0.0, upward_bias, -1.0).normalize();
    viewpoint_rotation * direction * force
}

/// Deliver pending velocities whose delay has elapsed.
pub fn deliver_pending_velocities<B: InteractionPhysicsBackend>(world: &mut World) {
    let delta = world
        .get_resource::<Time>()
        .map(|t| t.delta())
        .unwrap_or_default();

    let due: Vec<(Entity, Vec3)> = world
        .query::<(Entity, &mut PendingVelocity)>()
        .iter_mut(world)
        .filter_map(|(entity, mut pending)| {
            pending.timer.tick(delta);
            pending
                .timer
                .finished()
                .then_some((entity, pending.velocity))
        })
        .collect();

    for (entity, velocity) in due {
        world.entity_mut(entity).remove::<PendingVelocity>();

        if B::live_body_mode(world, entity) != Some(BodyMode::Dynamic) {
            warn!("{}", InteractionError::DeferredVelocityRace(entity));
            continue;
        }

        B::set_linear_velocity(world, entity, velocity);
        B::set_angular_velocity(world, entity, Vec3::ZERO);
        B::wake(world, entity);
    }
}

fn reapply_transform(world: &mut World, entity: Entity, transform: Option<Transform>) {
    let Some(transform) = transform else {
        return;
    };
    if let Some(mut current) = world.get_mut::<Transform>(entity) {
        *current = transform;
    }
}
