//! Shared test fixtures: a small in-memory physics backend and app setup.
//!
//! `TestBackend` stores bodies as plain components and raycasts against
//! axis-aligned boxes. Newly inserted bodies become live on the next frame,
//! like a real engine that builds bodies during its own sync step.

#![allow(dead_code)]

use std::collections::HashSet;
use std::time::Duration;

use bevy::prelude::*;
use bevy::time::TimeUpdateStrategy;
use msg_interaction_controller::backend::{InteractionPhysicsBackend, RaycastRequest};
use msg_interaction_controller::collision::{sort_by_distance, SurfaceHit};
use msg_interaction_controller::prelude::*;

/// Simulation body of the test backend.
#[derive(Component, Debug, Clone)]
pub struct TestBody {
    pub params: BodyParams,
    pub live: bool,
    pub linear_velocity: Vec3,
    pub angular_velocity: Vec3,
    pub awake: bool,
}

impl TestBody {
    /// A body that is already live.
    pub fn live(params: BodyParams) -> Self {
        Self {
            params,
            live: true,
            linear_velocity: Vec3::ZERO,
            angular_velocity: Vec3::ZERO,
            awake: false,
        }
    }
}

/// Axis-aligned box collider centered on the entity's translation.
#[derive(Component, Debug, Clone, Copy)]
pub struct TestCollider {
    pub half_extents: Vec3,
}

pub struct TestBackend;

impl InteractionPhysicsBackend for TestBackend {
    fn plugin() -> impl Plugin {
        TestBackendPlugin
    }

    fn read_body(world: &World, entity: Entity) -> Option<BodyParams> {
        world.get::<TestBody>(entity).map(|body| body.params)
    }

    fn remove_body(world: &mut World, entity: Entity) {
        world.entity_mut(entity).remove::<TestBody>();
    }

    fn insert_body(world: &mut World, entity: Entity, params: &BodyParams) {
        world.entity_mut(entity).insert(TestBody {
            live: false,
            ..TestBody::live(*params)
        });
    }

    fn live_body_mode(world: &World, entity: Entity) -> Option<BodyMode> {
        world
            .get::<TestBody>(entity)
            .filter(|body| body.live)
            .map(|body| body.params.mode)
    }

    fn set_linear_velocity(world: &mut World, entity: Entity, velocity: Vec3) {
        if let Some(mut body) = world.get_mut::<TestBody>(entity) {
            body.linear_velocity = velocity;
        }
    }

    fn set_angular_velocity(world: &mut World, entity: Entity, velocity: Vec3) {
        if let Some(mut body) = world.get_mut::<TestBody>(entity) {
            body.angular_velocity = velocity;
        }
    }

    fn wake(world: &mut World, entity: Entity) {
        if let Some(mut body) = world.get_mut::<TestBody>(entity) {
            body.awake = true;
        }
    }

    fn cast_ray(
        world: &mut World,
        request: &RaycastRequest,
        targets: &HashSet<Entity>,
    ) -> Vec<SurfaceHit> {
        let mut hits: Vec<SurfaceHit> = world
            .query::<(Entity, &Transform, &TestCollider)>()
            .iter(world)
            .filter(|(entity, _, _)| targets.contains(entity))
            .filter_map(|(entity, transform, collider)| {
                let min = transform.translation - collider.half_extents;
                let max = transform.translation + collider.half_extents;
                ray_aabb(request, min, max).map(|(distance, normal)| {
                    SurfaceHit::new(distance, request.point_at(distance), normal, entity)
                })
            })
            .collect();
        sort_by_distance(&mut hits);
        hits
    }
}

/// Slab test. Returns the entry distance and the normal of the entry face.
fn ray_aabb(request: &RaycastRequest, min: Vec3, max: Vec3) -> Option<(f32, Vec3)> {
    let mut t_enter = 0.0_f32;
    let mut t_exit = request.max_distance;
    let mut normal = -request.direction;

    for axis in 0..3 {
        let origin = request.origin[axis];
        let direction = request.direction[axis];
        if direction.abs() < 1e-8 {
            if origin < min[axis] || origin > max[axis] {
                return None;
            }
            continue;
        }
        let mut t0 = (min[axis] - origin) / direction;
        let mut t1 = (max[axis] - origin) / direction;
        let mut face = Vec3::ZERO;
        face[axis] = -direction.signum();
        if t0 > t1 {
            std::mem::swap(&mut t0, &mut t1);
        }
        if t0 > t_enter {
            t_enter = t0;
            normal = face;
        }
        t_exit = t_exit.min(t1);
        if t_enter > t_exit {
            return None;
        }
    }
    Some((t_enter, normal))
}

/// Marks bodies inserted last frame as live.
fn activate_test_bodies(mut q_bodies: Query<&mut TestBody>) {
    for mut body in &mut q_bodies {
        if !body.live {
            body.live = true;
        }
    }
}

pub struct TestBackendPlugin;

impl Plugin for TestBackendPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(PreUpdate, activate_test_bodies);
    }
}

pub const FRAME: Duration = Duration::from_millis(16);

/// Headless app with the controller bound to the test backend.
pub fn create_test_app() -> App {
    let mut app = App::new();
    app.add_plugins(MinimalPlugins);
    app.add_plugins(TransformPlugin);
    app.add_plugins(InteractionControllerPlugin::<TestBackend>::default());
    app.insert_resource(TimeUpdateStrategy::ManualDuration(FRAME));
    app.finish();
    app.cleanup();
    app
}

/// Run updates until at least `seconds` of frame time have passed.
pub fn run_for(app: &mut App, seconds: f32) {
    let frames = (seconds / FRAME.as_secs_f32()).ceil() as usize;
    for _ in 0..frames {
        app.update();
    }
}

/// Spawn the viewpoint at `position`, looking down -Z.
pub fn spawn_viewpoint(app: &mut App, position: Vec3) -> Entity {
    let transform = Transform::from_translation(position);
    app.world_mut()
        .spawn((transform, GlobalTransform::from(transform), InteractionViewpoint))
        .id()
}

/// Spawn a live, dynamic, pickupable cube.
pub fn spawn_pickup(app: &mut App, position: Vec3, params: BodyParams) -> Entity {
    let transform = Transform::from_translation(position);
    app.world_mut()
        .spawn((
            transform,
            GlobalTransform::from(transform),
            Pickupable,
            TestBody::live(params),
            TestCollider {
                half_extents: Vec3::splat(0.25),
            },
        ))
        .id()
}

/// Spawn a box of tagged geometry whose top face is at `top`.
pub fn spawn_surface(app: &mut App, center_xz: Vec2, half_xz: Vec2, top: f32, tags: &[&str]) -> Entity {
    let transform = Transform::from_xyz(center_xz.x, top - 0.5, center_xz.y);
    app.world_mut()
        .spawn((
            transform,
            GlobalTransform::from(transform),
            SurfaceTags::new(tags.iter().copied()),
            TestCollider {
                half_extents: Vec3::new(half_xz.x, 0.5, half_xz.y),
            },
        ))
        .id()
}

/// Read every event of type `E` still buffered.
pub fn drain_events<E: Event + Clone>(app: &App) -> Vec<E> {
    let events = app.world().resource::<Events<E>>();
    events.get_cursor().read(events).cloned().collect()
}

/// Send an interaction action and run one frame.
pub fn act(app: &mut App, action: InteractionAction) {
    app.world_mut().send_event(action);
    app.update();
}

pub fn interaction_state(app: &App) -> InteractionState {
    app.world().resource::<ObjectInteraction>().state()
}
