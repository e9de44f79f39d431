//! Physics backend abstraction.
//!
//! This module defines the trait that physics backends must implement to
//! work with the interaction controller. The controller never touches a
//! physics engine directly: body swaps, velocity writes and raycasts all go
//! through [`InteractionPhysicsBackend`], so engines can be swapped (Rapier3D,
//! Avian, a test double) without touching the controller logic.
//!
//! Every method is required. Binding a backend to
//! [`InteractionControllerPlugin`](crate::InteractionControllerPlugin) is
//! therefore a complete capability check done once, at compile time.

use std::collections::HashSet;

use bevy::prelude::*;

use crate::body::{BodyMode, BodyParams};
use crate::collision::SurfaceHit;

/// Trait for physics backend implementations.
///
/// Implementations are zero-sized marker types; all operations are
/// associated functions over the ECS [`World`].
///
/// For an example implementation, see the `rapier` module's
/// `Rapier3dBackend`.
pub trait InteractionPhysicsBackend: 'static + Send + Sync {
    /// Returns the plugin that sets up this backend.
    fn plugin() -> impl Plugin;

    /// Read the simulation parameters of an entity's body.
    ///
    /// Returns `None` when the entity has no simulation body.
    fn read_body(world: &World, entity: Entity) -> Option<BodyParams>;

    /// Remove the entity's simulation body, leaving its transform alone.
    ///
    /// Engines that can change a body's mode in place may keep the body and
    /// only reset its motion here; [`insert_body`](Self::insert_body) always
    /// follows.
    fn remove_body(world: &mut World, entity: Entity);

    /// Install a simulation body built from `params`.
    fn insert_body(world: &mut World, entity: Entity, params: &BodyParams);

    /// Mode of the entity's body if the engine has finished instantiating it.
    ///
    /// A body that was just inserted may not be live until the engine's next
    /// sync; backends report `None` until then.
    fn live_body_mode(world: &World, entity: Entity) -> Option<BodyMode>;

    /// Set the linear velocity of an entity's body.
    fn set_linear_velocity(world: &mut World, entity: Entity, velocity: Vec3);

    /// Set the angular velocity of an entity's body.
    fn set_angular_velocity(world: &mut World, entity: Entity, velocity: Vec3);

    /// Wake the entity's body if the engine put it to sleep.
    fn wake(world: &mut World, entity: Entity);

    /// Cast a ray against `targets` and return every intersection, nearest
    /// first.
    fn cast_ray(
        world: &mut World,
        request: &RaycastRequest,
        targets: &HashSet<Entity>,
    ) -> Vec<SurfaceHit>;
}

/// Empty plugin for backends that don't need additional setup.
pub struct NoOpBackendPlugin;

impl Plugin for NoOpBackendPlugin {
    fn build(&self, _app: &mut App) {}
}

/// Helper struct for building raycasts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RaycastRequest {
    /// Origin point of the ray.
    pub origin: Vec3,
    /// Direction of the ray (normalized).
    pub direction: Vec3,
    /// Maximum distance to cast.
    pub max_distance: f32,
}

impl RaycastRequest {
    /// Create a new raycast request.
    pub fn new(origin: Vec3, direction: Vec3, max_distance: f32) -> Self {
        Self {
            origin,
            direction: direction.normalize_or_zero(),
            max_distance,
        }
    }

    /// Straight down from `origin`.
    pub fn down(origin: Vec3, max_distance: f32) -> Self {
        Self::new(origin, Vec3::NEG_Y, max_distance)
    }

    /// Point along the ray at `distance`.
    pub fn point_at(&self, distance: f32) -> Vec3 {
        self.origin + self.direction * distance
    }
}
