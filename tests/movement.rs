//! Integration tests for walking, ground following and jumping inside a Bevy
//! app with the in-memory test backend.

mod common;

use bevy::prelude::*;
use common::*;
use msg_interaction_controller::prelude::*;

/// Spawn an avatar standing at `position` (1.6 above its feet).
fn spawn_avatar(app: &mut App, position: Vec3) -> Entity {
    let transform = Transform::from_translation(position);
    app.world_mut()
        .spawn((
            transform,
            GlobalTransform::from(transform),
            MovementIntent::new(),
            MovementVelocity::default(),
            MovementConfig::default(),
            GroundConstraint::new(GroundConstraintConfig::default().with_walkable(["walkable"])),
            JumpController::default(),
            JumpConfig::default(),
        ))
        .id()
}

/// A 4x4 walkable floor centered on the origin with its top at y = 0.
fn spawn_floor(app: &mut App) -> Entity {
    spawn_surface(app, Vec2::ZERO, Vec2::splat(2.0), 0.0, &["walkable"])
}

fn translation(app: &App, entity: Entity) -> Vec3 {
    app.world().get::<Transform>(entity).unwrap().translation
}

fn constraint(app: &App, entity: Entity) -> &GroundConstraint {
    app.world().get::<GroundConstraint>(entity).unwrap()
}

fn jump(app: &App, entity: Entity) -> &JumpController {
    app.world().get::<JumpController>(entity).unwrap()
}

fn set_intent(app: &mut App, entity: Entity, apply: impl FnOnce(&mut MovementIntent)) {
    let mut intent = app.world_mut().get_mut::<MovementIntent>(entity).unwrap();
    apply(&mut intent);
}

// ==================== Ground constraint ====================

#[test]
fn constraint_picks_up_tagged_floor() {
    let mut app = create_test_app();
    spawn_floor(&mut app);
    let avatar = spawn_avatar(&mut app, Vec3::new(0.0, 1.6, 0.0));

    app.update();

    let constraint = constraint(&app, avatar);
    assert!(constraint.enabled);
    assert!(!constraint.is_inert());
    assert_eq!(constraint.last_valid_position(), Some(Vec3::new(0.0, 1.6, 0.0)));
}

#[test]
fn walking_stays_on_floor_height() {
    let mut app = create_test_app();
    spawn_floor(&mut app);
    let avatar = spawn_avatar(&mut app, Vec3::new(0.0, 1.6, 0.0));
    app.update();

    set_intent(&mut app, avatar, |intent| intent.set_direction(Vec2::new(1.0, 0.0)));
    run_for(&mut app, 0.3);

    let position = translation(&app, avatar);
    assert!(position.x > 0.5);
    assert!((position.y - 1.6).abs() < 1e-4);
    assert!(constraint(&app, avatar).has_footing());
}

#[test]
fn walking_off_the_edge_is_stopped() {
    let mut app = create_test_app();
    spawn_floor(&mut app);
    let avatar = spawn_avatar(&mut app, Vec3::new(0.0, 1.6, 0.0));
    app.update();

    // Forward is -Z; the floor ends at z = -2.
    set_intent(&mut app, avatar, |intent| intent.set_direction(Vec2::new(0.0, 1.0)));
    run_for(&mut app, 2.0);

    let position = translation(&app, avatar);
    assert!(position.z >= -2.0 - 1e-3, "avatar left the floor: {position}");
    assert!(position.z < -1.5);
    assert!((position.y - 1.6).abs() < 1e-4);
}

#[test]
fn no_walkable_geometry_leaves_movement_free() {
    let mut app = create_test_app();
    spawn_surface(&mut app, Vec2::ZERO, Vec2::splat(2.0), 0.0, &["decor"]);
    let avatar = spawn_avatar(&mut app, Vec3::new(0.0, 1.6, 0.0));
    app.update();

    assert!(constraint(&app, avatar).is_inert());

    set_intent(&mut app, avatar, |intent| intent.set_direction(Vec2::new(0.0, 1.0)));
    run_for(&mut app, 2.0);

    assert!(translation(&app, avatar).z < -4.0);
}

#[test]
fn floor_added_later_is_picked_up() {
    let mut app = create_test_app();
    let avatar = spawn_avatar(&mut app, Vec3::new(0.0, 1.6, 0.0));
    app.update();
    assert!(constraint(&app, avatar).is_inert());

    spawn_floor(&mut app);
    app.update();
    app.update();

    let constraint = constraint(&app, avatar);
    assert!(!constraint.is_inert());
    assert!(constraint.last_valid_position().is_some());
}

#[test]
fn excluded_surface_blocks_walking() {
    let mut app = create_test_app();
    spawn_floor(&mut app);
    // A raised "water" strip across the path at x in [0.5, 1.5].
    spawn_surface(&mut app, Vec2::new(1.0, 0.0), Vec2::new(0.5, 2.0), 0.1, &["water"]);
    let avatar = app
        .world_mut()
        .spawn((
            Transform::from_xyz(0.0, 1.6, 0.0),
            GlobalTransform::from_xyz(0.0, 1.6, 0.0),
            MovementIntent::new(),
            MovementVelocity::default(),
            MovementConfig::default(),
            GroundConstraint::new(
                GroundConstraintConfig::default()
                    .with_walkable(["walkable"])
                    .with_exclude(["water"]),
            ),
        ))
        .id();
    app.update();

    set_intent(&mut app, avatar, |intent| intent.set_direction(Vec2::new(1.0, 0.0)));
    run_for(&mut app, 1.0);

    assert!(translation(&app, avatar).x < 0.5 + 1e-3);
}

#[test]
fn unconstrained_context_disables_new_constraints() {
    let mut app = create_test_app();
    app.insert_resource(InteractionContext {
        constrain_movement: false,
        ..default()
    });
    spawn_floor(&mut app);
    let avatar = spawn_avatar(&mut app, Vec3::new(0.0, 1.6, 0.0));
    app.update();

    assert!(!constraint(&app, avatar).enabled);

    set_intent(&mut app, avatar, |intent| intent.set_direction(Vec2::new(0.0, 1.0)));
    run_for(&mut app, 2.0);
    assert!(translation(&app, avatar).z < -4.0);
}

#[test]
fn xz_origin_child_drives_the_edge_check() {
    let mut app = create_test_app();
    spawn_floor(&mut app);
    let avatar = app
        .world_mut()
        .spawn((
            Transform::from_xyz(0.0, 1.6, 0.0),
            GlobalTransform::from_xyz(0.0, 1.6, 0.0),
            MovementIntent::new(),
            MovementVelocity::default(),
            MovementConfig::default(),
        ))
        .id();
    // Tracked head one meter ahead of the rig origin.
    let head = app
        .world_mut()
        .spawn((
            Transform::from_xyz(0.0, 0.0, -1.0),
            GlobalTransform::from_xyz(0.0, 1.6, -1.0),
            ChildOf(avatar),
        ))
        .id();
    app.world_mut().entity_mut(avatar).insert(GroundConstraint::new(
        GroundConstraintConfig::default()
            .with_walkable(["walkable"])
            .with_xz_origin(head),
    ));
    app.update();

    set_intent(&mut app, avatar, |intent| intent.set_direction(Vec2::new(0.0, 1.0)));
    run_for(&mut app, 2.0);

    // The head stops at the floor edge (z = -2), so the rig stops a meter short.
    let position = translation(&app, avatar);
    assert!(position.z >= -1.0 - 1e-3, "rig followed past the edge: {position}");
    assert!(position.z < -0.5);

    let last_valid = constraint(&app, avatar).last_valid_position().unwrap();
    assert!((last_valid.z - (position.z - 1.0)).abs() < 1e-3);
}

// ==================== Jump ====================

#[test]
fn jump_arc_and_landing() {
    let mut app = create_test_app();
    spawn_floor(&mut app);
    let avatar = spawn_avatar(&mut app, Vec3::new(0.0, 1.6, 0.0));
    app.update();

    set_intent(&mut app, avatar, |intent| intent.set_jump_pressed(true));
    app.update();
    assert!(jump(&app, avatar).is_airborne());
    assert!(!constraint(&app, avatar).enabled);
    set_intent(&mut app, avatar, |intent| intent.set_jump_pressed(false));

    let mut max_y = f32::MIN;
    for _ in 0..60 {
        app.update();
        max_y = max_y.max(translation(&app, avatar).y);
    }

    assert!((max_y - 3.1).abs() < 0.02, "apex was {max_y}");
    assert!((translation(&app, avatar).y - 1.6).abs() < 1e-4);
    assert!(constraint(&app, avatar).enabled);
    assert_eq!(jump(&app, avatar).phase(), JumpPhase::Ready);
}

#[test]
fn held_jump_does_not_retrigger() {
    let mut app = create_test_app();
    spawn_floor(&mut app);
    let avatar = spawn_avatar(&mut app, Vec3::new(0.0, 1.6, 0.0));
    app.update();

    set_intent(&mut app, avatar, |intent| intent.set_jump_pressed(true));
    run_for(&mut app, 1.2);

    assert_eq!(jump(&app, avatar).phase(), JumpPhase::Ready);
    assert!((translation(&app, avatar).y - 1.6).abs() < 1e-4);
}

#[test]
fn jump_keeps_takeoff_momentum() {
    let mut app = create_test_app();
    spawn_floor(&mut app);
    let avatar = spawn_avatar(&mut app, Vec3::new(-1.5, 1.6, 0.0));
    app.update();

    set_intent(&mut app, avatar, |intent| {
        intent.set_direction(Vec2::new(1.0, 0.0));
        intent.set_jump_pressed(true);
    });
    app.update();
    // Letting go mid-air keeps the takeoff velocity.
    set_intent(&mut app, avatar, |intent| intent.set_direction(Vec2::ZERO));
    let x_before = translation(&app, avatar).x;
    run_for(&mut app, 0.3);

    let walk_speed = MovementConfig::default().walk_speed;
    let travelled = translation(&app, avatar).x - x_before;
    assert!((travelled - walk_speed * 0.3).abs() < walk_speed * 0.05);
}

#[test]
fn locked_movement_blocks_jump() {
    let mut app = create_test_app();
    spawn_floor(&mut app);
    let avatar = spawn_avatar(&mut app, Vec3::new(0.0, 1.6, 0.0));
    app.update();

    app.world_mut().resource_mut::<InputLock>().lock_all();
    set_intent(&mut app, avatar, |intent| {
        intent.set_direction(Vec2::new(1.0, 0.0));
        intent.set_jump_pressed(true);
    });
    run_for(&mut app, 0.2);

    assert_eq!(jump(&app, avatar).phase(), JumpPhase::Ready);
    assert_eq!(translation(&app, avatar), Vec3::new(0.0, 1.6, 0.0));
}

#[test]
fn jump_keeps_constraint_disabled_in_unconstrained_context() {
    let mut app = create_test_app();
    app.insert_resource(InteractionContext {
        constrain_movement: false,
        ..default()
    });
    spawn_floor(&mut app);
    let avatar = spawn_avatar(&mut app, Vec3::new(0.0, 1.6, 0.0));
    app.update();

    set_intent(&mut app, avatar, |intent| intent.set_jump_pressed(true));
    app.update();
    set_intent(&mut app, avatar, |intent| intent.set_jump_pressed(false));
    run_for(&mut app, 1.0);

    assert_eq!(jump(&app, avatar).phase(), JumpPhase::Ready);
    assert!(!constraint(&app, avatar).enabled);

    set_intent(&mut app, avatar, |intent| intent.set_direction(Vec2::new(0.0, 1.0)));
    run_for(&mut app, 2.0);
    assert!(translation(&app, avatar).z < -4.0);
}

#[test]
fn wall_ahead_lands_jump_early() {
    let mut app = create_test_app();
    spawn_floor(&mut app);
    let avatar = spawn_avatar(&mut app, Vec3::new(0.0, 1.6, 0.0));
    app.world_mut().entity_mut(avatar).insert(WallProximity::default());
    app.update();

    set_intent(&mut app, avatar, |intent| intent.set_jump_pressed(true));
    app.update();
    set_intent(&mut app, avatar, |intent| intent.set_jump_pressed(false));
    run_for(&mut app, 0.1);
    assert!(translation(&app, avatar).y > 1.7);

    // A wall facing +X is about to be hit.
    app.world_mut()
        .entity_mut(avatar)
        .insert(WallProximity::imminent(Vec3::X));
    app.update();

    let push_back = JumpConfig::default().wall_push_back;
    let position = translation(&app, avatar);
    assert!((position - Vec3::new(push_back, 1.6, 0.0)).length() < 1e-4, "landed at {position}");
    assert!(matches!(jump(&app, avatar).phase(), JumpPhase::Landing { .. }));

    // The landing placement survives the constraint tick that followed it.
    let constraint = constraint(&app, avatar);
    assert!(constraint.enabled);
    assert!(!constraint.write_suppressed());
}

#[test]
fn overlong_jump_times_out_and_restores_constraint() {
    let mut app = create_test_app();
    spawn_floor(&mut app);
    let avatar = spawn_avatar(&mut app, Vec3::new(0.0, 1.6, 0.0));
    let config = JumpConfig::default().with_durations(5.0, 5.0);
    let safety_timeout = config.safety_timeout;
    app.world_mut().entity_mut(avatar).insert(config);
    app.update();

    set_intent(&mut app, avatar, |intent| intent.set_jump_pressed(true));
    app.update();
    set_intent(&mut app, avatar, |intent| intent.set_jump_pressed(false));

    run_for(&mut app, safety_timeout - 0.2);
    assert!(jump(&app, avatar).is_airborne());
    assert!(!constraint(&app, avatar).enabled);

    run_for(&mut app, 0.4);
    assert_eq!(jump(&app, avatar).phase(), JumpPhase::Ready);
    assert!(constraint(&app, avatar).enabled);
    assert!(constraint(&app, avatar).has_footing());
}
