//! Pickup and Walk Example
//!
//! A first-person room with:
//! - A walkable floor the avatar cannot step off
//! - A raised walkable platform to jump onto
//! - A wall that ends jumps early
//! - A row of crates to pick up, inspect and throw
//!
//! ## Controls
//! - **W/A/S/D**: Walk
//! - **Mouse**: Look
//! - **Space**: Jump
//! - **Left click**: Grab; hold and release to throw, tap to drop
//! - **Right click**: Cancel a charging throw
//! - **E**: Inspect the held crate (drag with the mouse to turn it)

use bevy::prelude::*;
use bevy_rapier3d::prelude::*;
use msg_interaction_controller::prelude::*;

// ==================== Constants ====================

const FLOOR_HALF_SIZE: f32 = 8.0;
const EYE_HEIGHT: f32 = 1.6;

const PLATFORM_HALF_SIZE: Vec3 = Vec3::new(1.5, 0.25, 1.5);
const PLATFORM_CENTER: Vec3 = Vec3::new(3.0, 0.25, -3.0);

const CRATE_HALF_SIZE: f32 = 0.25;
const CRATE_COUNT: usize = 5;

// ==================== Main ====================

fn main() {
    App::new()
        .add_plugins(DefaultPlugins.set(WindowPlugin {
            primary_window: Some(Window {
                title: "Pickup and Walk - Interaction Controller Example".into(),
                resolution: (1280.0, 720.0).into(),
                ..default()
            }),
            ..default()
        }))
        // Physics
        .add_plugins(RapierPhysicsPlugin::<NoUserData>::default())
        // Interaction controller
        .add_plugins(InteractionControllerPlugin::<Rapier3dBackend>::default())
        .insert_resource(InteractionConfig::default().with_reach(3.0))
        // Systems
        .add_systems(Startup, setup)
        .add_systems(Update, log_grabs)
        .run();
}

// ==================== Setup ====================

fn setup(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    spawn_room(&mut commands, &mut meshes, &mut materials);
    spawn_crates(&mut commands, &mut meshes, &mut materials);
    spawn_avatar(&mut commands);

    commands.spawn((
        DirectionalLight {
            illuminance: 8_000.0,
            shadows_enabled: true,
            ..default()
        },
        Transform::from_xyz(4.0, 8.0, 4.0).looking_at(Vec3::ZERO, Vec3::Y),
    ));

    commands.spawn((
        Text::new("WASD: Walk | Space: Jump | LMB: Grab / Throw | RMB: Cancel | E: Inspect"),
        TextFont {
            font_size: 20.0,
            ..default()
        },
        TextColor(Color::WHITE),
        Node {
            position_type: PositionType::Absolute,
            top: Val::Px(10.0),
            left: Val::Px(10.0),
            ..default()
        },
        Pickable::IGNORE,
    ));
}

fn spawn_room(
    commands: &mut Commands,
    meshes: &mut ResMut<Assets<Mesh>>,
    materials: &mut ResMut<Assets<StandardMaterial>>,
) {
    // Floor, top face at y = 0.
    spawn_block(
        commands,
        meshes,
        materials,
        Vec3::new(0.0, -0.5, 0.0),
        Vec3::new(FLOOR_HALF_SIZE, 0.5, FLOOR_HALF_SIZE),
        Color::srgb(0.3, 0.3, 0.3),
        Some(SurfaceTags::new(["walkable"])),
    );

    // Platform
    spawn_block(
        commands,
        meshes,
        materials,
        PLATFORM_CENTER,
        PLATFORM_HALF_SIZE,
        Color::srgb(0.4, 0.5, 0.3),
        Some(SurfaceTags::new(["walkable"])),
    );

    // Back wall, not walkable.
    spawn_block(
        commands,
        meshes,
        materials,
        Vec3::new(0.0, 1.5, -FLOOR_HALF_SIZE + 0.25),
        Vec3::new(FLOOR_HALF_SIZE, 1.5, 0.25),
        Color::srgb(0.5, 0.35, 0.3),
        None,
    );
}

fn spawn_block(
    commands: &mut Commands,
    meshes: &mut ResMut<Assets<Mesh>>,
    materials: &mut ResMut<Assets<StandardMaterial>>,
    center: Vec3,
    half_size: Vec3,
    color: Color,
    tags: Option<SurfaceTags>,
) {
    let mut block = commands.spawn((
        Transform::from_translation(center),
        RigidBody::Fixed,
        Collider::cuboid(half_size.x, half_size.y, half_size.z),
        Mesh3d(meshes.add(Cuboid::from_size(half_size * 2.0))),
        MeshMaterial3d(materials.add(color)),
    ));
    if let Some(tags) = tags {
        block.insert(tags);
    }
}

fn spawn_crates(
    commands: &mut Commands,
    meshes: &mut ResMut<Assets<Mesh>>,
    materials: &mut ResMut<Assets<StandardMaterial>>,
) {
    let mesh = meshes.add(Cuboid::from_length(CRATE_HALF_SIZE * 2.0));
    let material = materials.add(Color::srgb(0.8, 0.6, 0.3));

    for i in 0..CRATE_COUNT {
        let x = -2.0 + i as f32;
        commands.spawn((
            Transform::from_xyz(x, CRATE_HALF_SIZE, -2.0),
            Rapier3dPickupBundle::with_mass(1.0 + i as f32 * 0.5),
            Collider::cuboid(CRATE_HALF_SIZE, CRATE_HALF_SIZE, CRATE_HALF_SIZE),
            Mesh3d(mesh.clone()),
            MeshMaterial3d(material.clone()),
        ));
    }
}

fn spawn_avatar(commands: &mut Commands) {
    commands
        .spawn((
            Transform::from_xyz(0.0, EYE_HEIGHT, 2.0),
            Visibility::default(),
            MovementIntent::new(),
            MovementVelocity::default(),
            MovementConfig::default(),
            GroundConstraint::new(GroundConstraintConfig::default().with_walkable(["walkable"])),
            JumpController::default(),
            JumpConfig::default(),
            WallProximity::default(),
        ))
        .with_children(|avatar| {
            avatar.spawn((Camera3d::default(), Transform::default(), InteractionViewpoint));
        });
}

// ==================== Feedback ====================

fn log_grabs(mut started: EventReader<GrabStarted>, mut ended: EventReader<GrabEnded>) {
    for event in started.read() {
        info!("picked up {}", event.entity);
    }
    for event in ended.read() {
        let how = if event.thrown { "threw" } else { "dropped" };
        info!("{how} {}", event.entity);
    }
}
