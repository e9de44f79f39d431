//! Rapier3D physics backend implementation.
//!
//! This module provides the physics backend for Bevy Rapier3D.
//! Enable with the `rapier3d` feature.

use std::collections::HashSet;

use bevy::ecs::system::SystemState;
use bevy::prelude::*;
use bevy_rapier3d::prelude::*;

use crate::backend::{InteractionPhysicsBackend, RaycastRequest};
use crate::body::{BodyMode, BodyParams, BodyShape};
use crate::collision::{sort_by_distance, SurfaceHit};
use crate::config::JumpConfig;
use crate::jump::JumpController;
use crate::state::{Pickupable, WallProximity};

/// Rapier3D physics backend for the interaction controller.
///
/// Bodies are swapped by replacing the `RigidBody` component and its
/// material components; raycasts go through the default Rapier context.
pub struct Rapier3dBackend;

impl InteractionPhysicsBackend for Rapier3dBackend {
    fn plugin() -> impl Plugin {
        Rapier3dBackendPlugin
    }

    fn read_body(world: &World, entity: Entity) -> Option<BodyParams> {
        let rigid_body = world.get::<RigidBody>(entity)?;
        let defaults = BodyParams::default();

        let mass = match world.get::<ColliderMassProperties>(entity) {
            Some(ColliderMassProperties::Mass(mass)) => *mass,
            _ => world
                .get::<ReadMassProperties>(entity)
                .map(|props| props.mass)
                .filter(|mass| *mass > 0.0 && mass.is_finite())
                .unwrap_or(defaults.mass),
        };

        Some(BodyParams {
            mode: body_mode(rigid_body),
            mass,
            shape: world
                .get::<Collider>(entity)
                .map(body_shape)
                .unwrap_or(BodyShape::Other),
            friction: world
                .get::<Friction>(entity)
                .map(|f| f.coefficient)
                .unwrap_or(defaults.friction),
            restitution: world
                .get::<Restitution>(entity)
                .map(|r| r.coefficient)
                .unwrap_or(defaults.restitution),
        })
    }

    fn remove_body(world: &mut World, entity: Entity) {
        // The Rapier body itself survives the swap: `insert_body` changes its
        // type in place. Removing the handle and re-adding a body in one frame
        // would race Rapier's removal sync.
        if let Some(mut velocity) = world.get_mut::<Velocity>(entity) {
            *velocity = Velocity::zero();
        }
    }

    fn insert_body(world: &mut World, entity: Entity, params: &BodyParams) {
        let Ok(mut entity_mut) = world.get_entity_mut(entity) else {
            return;
        };

        entity_mut.insert((
            rigid_body(params.mode),
            Velocity::zero(),
            ColliderMassProperties::Mass(params.mass),
            Friction::coefficient(params.friction),
            Restitution::coefficient(params.restitution),
        ));

        if !entity_mut.contains::<Collider>() {
            if let Some(collider) = collider(&params.shape) {
                entity_mut.insert(collider);
            }
        }
    }

    fn live_body_mode(world: &World, entity: Entity) -> Option<BodyMode> {
        world.get::<RapierRigidBodyHandle>(entity)?;
        world.get::<RigidBody>(entity).map(body_mode)
    }

    fn set_linear_velocity(world: &mut World, entity: Entity, velocity: Vec3) {
        if let Some(mut vel) = world.get_mut::<Velocity>(entity) {
            vel.linvel = velocity;
        } else if let Ok(mut entity_mut) = world.get_entity_mut(entity) {
            entity_mut.insert(Velocity::linear(velocity));
        }
    }

    fn set_angular_velocity(world: &mut World, entity: Entity, velocity: Vec3) {
        if let Some(mut vel) = world.get_mut::<Velocity>(entity) {
            vel.angvel = velocity;
        } else if let Ok(mut entity_mut) = world.get_entity_mut(entity) {
            entity_mut.insert(Velocity::angular(velocity));
        }
    }

    fn wake(world: &mut World, entity: Entity) {
        if let Some(mut sleeping) = world.get_mut::<Sleeping>(entity) {
            sleeping.sleeping = false;
        } else if let Ok(mut entity_mut) = world.get_entity_mut(entity) {
            entity_mut.insert(Sleeping::default());
        }
    }

    fn cast_ray(
        world: &mut World,
        request: &RaycastRequest,
        targets: &HashSet<Entity>,
    ) -> Vec<SurfaceHit> {
        if targets.is_empty() || !world.contains_resource::<RapierQueryState>() {
            return Vec::new();
        }

        world.resource_scope(|world, mut state: Mut<RapierQueryState>| {
            let rapier_context = state.0.get(world);
            let Ok(context) = rapier_context.single() else {
                return Vec::new();
            };
            rapier_ray_hits(&context, request, targets)
        })
    }
}

/// Cached system state used to reach the Rapier context from exclusive
/// systems.
#[derive(Resource)]
pub struct RapierQueryState(SystemState<ReadRapierContext<'static, 'static>>);

impl FromWorld for RapierQueryState {
    fn from_world(world: &mut World) -> Self {
        Self(SystemState::new(world))
    }
}

/// Plugin that sets up Rapier3D-specific systems for the interaction
/// controller.
pub struct Rapier3dBackendPlugin;

impl Plugin for Rapier3dBackendPlugin {
    fn build(&self, app: &mut App) {
        use crate::InteractionSet;

        app.init_resource::<RapierQueryState>();
        app.add_systems(
            Update,
            rapier_wall_proximity.in_set(InteractionSet::Sensors),
        );
    }
}

fn body_mode(rigid_body: &RigidBody) -> BodyMode {
    match rigid_body {
        RigidBody::Dynamic => BodyMode::Dynamic,
        RigidBody::Fixed => BodyMode::Static,
        RigidBody::KinematicPositionBased | RigidBody::KinematicVelocityBased => BodyMode::Kinematic,
    }
}

fn rigid_body(mode: BodyMode) -> RigidBody {
    match mode {
        BodyMode::Dynamic => RigidBody::Dynamic,
        BodyMode::Static => RigidBody::Fixed,
        BodyMode::Kinematic => RigidBody::KinematicPositionBased,
    }
}

/// Describe a collider as a [`BodyShape`].
pub fn body_shape(collider: &Collider) -> BodyShape {
    if let Some(cuboid) = collider.as_cuboid() {
        return BodyShape::Cuboid {
            half_extents: cuboid.half_extents(),
        };
    }
    if let Some(ball) = collider.as_ball() {
        return BodyShape::Ball {
            radius: ball.radius(),
        };
    }
    if let Some(capsule) = collider.as_capsule() {
        let segment = capsule.segment();
        return BodyShape::Capsule {
            half_height: (segment.a() - segment.b()).length() / 2.0,
            radius: capsule.radius(),
        };
    }
    if let Some(cylinder) = collider.as_cylinder() {
        return BodyShape::Cylinder {
            half_height: cylinder.half_height(),
            radius: cylinder.radius(),
        };
    }
    BodyShape::Other
}

fn collider(shape: &BodyShape) -> Option<Collider> {
    match *shape {
        BodyShape::Cuboid { half_extents } => {
            Some(Collider::cuboid(half_extents.x, half_extents.y, half_extents.z))
        }
        BodyShape::Ball { radius } => Some(Collider::ball(radius)),
        BodyShape::Capsule { half_height, radius } => Some(Collider::capsule_y(half_height, radius)),
        BodyShape::Cylinder { half_height, radius } => Some(Collider::cylinder(half_height, radius)),
        BodyShape::Other => None,
    }
}

/// Every intersection of `request` with colliders in `targets`, nearest
/// first.
fn rapier_ray_hits(
    context: &RapierContext,
    request: &RaycastRequest,
    targets: &HashSet<Entity>,
) -> Vec<SurfaceHit> {
    let predicate = |entity: Entity| targets.contains(&entity);
    let filter = QueryFilter::default()
        .exclude_sensors()
        .predicate(&predicate);

    let mut hits = Vec::new();
    context.intersections_with_ray(
        request.origin,
        request.direction,
        request.max_distance,
        true,
        filter,
        |entity, intersection| {
            hits.push(SurfaceHit::new(
                intersection.time_of_impact,
                intersection.point,
                intersection.normal,
                entity,
            ));
            true
        },
    );
    sort_by_distance(&mut hits);
    hits
}

/// Report walls ahead of airborne avatars.
///
/// Casts along the jump momentum for `wall_check_distance`; a hit marks the
/// wall as imminent with the hit normal as the push-back direction.
fn rapier_wall_proximity(
    rapier_context: ReadRapierContext,
    mut q_avatars: Query<(
        Entity,
        &GlobalTransform,
        &JumpController,
        &JumpConfig,
        &mut WallProximity,
    )>,
) {
    let Ok(context) = rapier_context.single() else {
        return;
    };

    for (entity, transform, jump, config, mut wall) in &mut q_avatars {
        let direction = jump.momentum().normalize_or_zero();
        if !jump.is_airborne() || direction == Vec3::ZERO {
            if wall.imminent {
                wall.clear();
            }
            continue;
        }

        let filter = QueryFilter::default()
            .exclude_sensors()
            .exclude_rigid_body(entity)
            .exclude_collider(entity);

        match context.cast_ray_and_get_normal(
            transform.translation(),
            direction,
            config.wall_check_distance,
            true,
            filter,
        ) {
            Some((_, hit)) => *wall = WallProximity::imminent(hit.normal),
            None => {
                if wall.imminent {
                    wall.clear();
                }
            }
        }
    }
}

/// Bundle for a Rapier body that can be picked up.
///
/// # Example
///
/// ```ignore
/// use bevy::prelude::*;
/// use bevy_rapier3d::prelude::*;
/// use msg_interaction_controller::rapier::Rapier3dPickupBundle;
///
/// fn spawn_crate(mut commands: Commands) {
///     commands.spawn((
///         Transform::from_xyz(0.0, 1.0, -2.0),
///         Rapier3dPickupBundle::with_mass(2.0),
///         Collider::cuboid(0.25, 0.25, 0.25),
///     ));
/// }
/// ```
#[derive(Bundle)]
pub struct Rapier3dPickupBundle {
    /// Marks the body as a pickup target.
    pub pickupable: Pickupable,
    /// Rigid body type, dynamic by default.
    pub rigid_body: RigidBody,
    /// Current linear and angular velocity.
    pub velocity: Velocity,
    /// Sleep state; woken after a throw.
    pub sleeping: Sleeping,
    /// Mass, read back when the object is picked up.
    pub mass: ColliderMassProperties,
    /// Friction coefficient.
    pub friction: Friction,
    /// Restitution coefficient.
    pub restitution: Restitution,
}

impl Default for Rapier3dPickupBundle {
    fn default() -> Self {
        Self::with_mass(1.0)
    }
}

impl Rapier3dPickupBundle {
    /// A dynamic pickup of the given mass.
    pub fn with_mass(mass: f32) -> Self {
        let defaults = BodyParams::default();
        Self {
            pickupable: Pickupable,
            rigid_body: RigidBody::Dynamic,
            velocity: Velocity::zero(),
            sleeping: Sleeping::default(),
            mass: ColliderMassProperties::Mass(mass),
            friction: Friction::coefficient(defaults.friction),
            restitution: Restitution::coefficient(defaults.restitution),
        }
    }

    /// Set friction and restitution.
    pub fn with_material(mut self, friction: f32, restitution: f32) -> Self {
        self.friction = Friction::coefficient(friction);
        self.restitution = Restitution::coefficient(restitution);
        self
    }
}
