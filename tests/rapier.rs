//! Integration tests against the Rapier3D backend.

#![cfg(feature = "rapier3d")]

use std::time::Duration;

use bevy::prelude::*;
use bevy::time::TimeUpdateStrategy;
use bevy_rapier3d::prelude::*;
use msg_interaction_controller::prelude::*;

fn create_test_app() -> App {
    let mut app = App::new();

    app.add_plugins(MinimalPlugins);
    app.add_plugins(TransformPlugin);
    app.add_plugins(RapierPhysicsPlugin::<NoUserData>::default());
    app.add_plugins(InteractionControllerPlugin::<Rapier3dBackend>::default());
    app.insert_resource(TimeUpdateStrategy::ManualDuration(Duration::from_millis(16)));

    app.finish();
    app.cleanup();
    app
}

fn run_frames(app: &mut App, frames: usize) {
    for _ in 0..frames {
        app.update();
    }
}

/// Spawn a fixed walkable slab with its top at y = 0.
fn spawn_floor(app: &mut App, half_size: Vec2) -> Entity {
    let transform = Transform::from_xyz(0.0, -0.5, 0.0);
    app.world_mut()
        .spawn((
            transform,
            GlobalTransform::from(transform),
            RigidBody::Fixed,
            Collider::cuboid(half_size.x, 0.5, half_size.y),
            SurfaceTags::new(["walkable"]),
        ))
        .id()
}

fn spawn_avatar(app: &mut App, position: Vec3) -> Entity {
    let transform = Transform::from_translation(position);
    app.world_mut()
        .spawn((
            transform,
            GlobalTransform::from(transform),
            MovementIntent::new(),
            MovementVelocity::default(),
            MovementConfig::default(),
            GroundConstraint::default(),
            JumpController::default(),
            JumpConfig::default(),
            WallProximity::default(),
        ))
        .id()
}

#[test]
fn avatar_is_held_on_rapier_floor() {
    let mut app = create_test_app();
    spawn_floor(&mut app, Vec2::splat(2.0));
    let avatar = spawn_avatar(&mut app, Vec3::new(0.0, 1.6, 0.0));
    run_frames(&mut app, 3);

    app.world_mut()
        .get_mut::<MovementIntent>(avatar)
        .unwrap()
        .set_direction(Vec2::new(0.0, 1.0));
    run_frames(&mut app, 120);

    let position = app.world().get::<Transform>(avatar).unwrap().translation;
    assert!(position.z >= -2.0 - 1e-2, "avatar left the floor: {position}");
    assert!((position.y - 1.6).abs() < 1e-3);

    let constraint = app.world().get::<GroundConstraint>(avatar).unwrap();
    assert!(constraint.has_footing());
}

#[test]
fn pickup_and_throw_rapier_body() {
    let mut app = create_test_app();
    spawn_floor(&mut app, Vec2::splat(20.0));
    let viewpoint_transform = Transform::from_xyz(0.0, 1.6, 0.0);
    app.world_mut().spawn((
        viewpoint_transform,
        GlobalTransform::from(viewpoint_transform),
        InteractionViewpoint,
    ));
    let object = app
        .world_mut()
        .spawn((
            Transform::from_xyz(0.0, 1.6, -2.0),
            Rapier3dPickupBundle::with_mass(2.0),
            Collider::cuboid(0.25, 0.25, 0.25),
        ))
        .id();
    run_frames(&mut app, 2);

    app.world_mut()
        .send_event(InteractionAction::Grab { target: None });
    app.update();

    let interaction = app.world().resource::<ObjectInteraction>();
    assert_eq!(interaction.held(), Some(object));
    assert_eq!(
        app.world().get::<RigidBody>(object),
        Some(&RigidBody::KinematicPositionBased)
    );
    assert_eq!(
        interaction.snapshot().map(|s| s.original().mass),
        Some(2.0)
    );

    app.world_mut().send_event(InteractionAction::Charge);
    run_frames(&mut app, 120);
    app.world_mut().send_event(InteractionAction::Release);
    app.update();

    assert_eq!(
        app.world().resource::<ObjectInteraction>().state(),
        InteractionState::Idle
    );
    assert_eq!(app.world().get::<RigidBody>(object), Some(&RigidBody::Dynamic));

    let z_at_release = app.world().get::<Transform>(object).unwrap().translation.z;
    run_frames(&mut app, 20);
    let z_after = app.world().get::<Transform>(object).unwrap().translation.z;
    assert!(z_after < z_at_release - 1.0, "object did not fly: {z_at_release} -> {z_after}");
}
