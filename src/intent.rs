//! Movement intent components.
//!
//! Intents represent what the user wants the avatar to do this frame, as
//! written by an input adapter (desktop, touch, headset or a script). The
//! movement systems read these intents and move the avatar.

use bevy::prelude::*;

use crate::config::MovementConfig;
use crate::state::InteractionViewpoint;

/// Desired avatar movement.
///
/// # Example
///
/// ```rust
/// use bevy::prelude::*;
/// use msg_interaction_controller::prelude::*;
///
/// let mut intent = MovementIntent::new();
/// intent.set_direction(Vec2::new(0.0, 2.0));
/// assert_eq!(intent.direction, Vec2::Y);
/// assert!(intent.is_moving());
///
/// intent.clear();
/// assert!(!intent.is_moving());
/// ```
#[derive(Component, Reflect, Debug, Clone, Default)]
#[reflect(Component)]
pub struct MovementIntent {
    /// Planar direction relative to the view: `x` right, `y` forward.
    /// Length is at most 1.
    pub direction: Vec2,
    /// Accumulated view rotation request (yaw, pitch) in pointer units.
    /// Consumed by the look system.
    pub look: Vec2,
    /// Whether the jump action is held.
    ///
    /// A jump is triggered when this goes from `false` to `true`.
    pub jump_pressed: bool,
    /// Previous jump state for edge detection, managed by the jump system.
    pub(crate) jump_pressed_prev: bool,
}

impl MovementIntent {
    /// Create a new empty movement intent.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the planar direction; vectors longer than 1 are normalized.
    pub fn set_direction(&mut self, direction: Vec2) {
        self.direction = direction.clamp_length_max(1.0);
    }

    /// Add a pointer delta to the pending look rotation.
    pub fn add_look(&mut self, delta: Vec2) {
        self.look += delta;
    }

    /// Set the jump state. Call every frame with the current input.
    pub fn set_jump_pressed(&mut self, pressed: bool) {
        self.jump_pressed = pressed;
    }

    /// Clear direction and pending look.
    pub fn clear(&mut self) {
        self.direction = Vec2::ZERO;
        self.look = Vec2::ZERO;
    }

    /// Check if there is active movement input.
    pub fn is_moving(&self) -> bool {
        self.direction.length_squared() > 1e-6
    }

    /// Whether jump went down since the last call. Updates edge tracking.
    pub(crate) fn take_jump_edge(&mut self) -> bool {
        let edge = self.jump_pressed && !self.jump_pressed_prev;
        self.jump_pressed_prev = self.jump_pressed;
        edge
    }
}

/// Current avatar velocity in world space.
///
/// Written from [`MovementIntent`] each frame (and overridden horizontally by
/// the jump controller while airborne), then integrated into the transform.
#[derive(Component, Reflect, Debug, Clone, Copy, Default, PartialEq)]
#[reflect(Component)]
pub struct MovementVelocity(pub Vec3);

/// Input channels currently locked out, e.g. while inspecting an object.
#[derive(Resource, Reflect, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[reflect(Resource)]
pub struct InputLock {
    /// View rotation is locked.
    pub look: bool,
    /// Walking and jumping are locked.
    pub movement: bool,
}

impl InputLock {
    /// Lock both channels.
    pub fn lock_all(&mut self) {
        self.look = true;
        self.movement = true;
    }

    /// Unlock both channels.
    pub fn unlock_all(&mut self) {
        self.look = false;
        self.movement = false;
    }
}

/// Turn movement intent into a world-space horizontal velocity relative to
/// the avatar's heading.
pub fn apply_movement_intent(
    lock: Res<InputLock>,
    mut q_avatars: Query<(
        &MovementIntent,
        &MovementConfig,
        &Transform,
        &mut MovementVelocity,
    )>,
) {
    for (intent, config, transform, mut velocity) in &mut q_avatars {
        if lock.movement || !intent.is_moving() {
            velocity.0.x = 0.0;
            velocity.0.z = 0.0;
            continue;
        }

        let forward = flatten(transform.forward().as_vec3());
        let right = flatten(transform.right().as_vec3());
        let planar = (right * intent.direction.x + forward * intent.direction.y) * config.walk_speed;
        velocity.0.x = planar.x;
        velocity.0.z = planar.z;
    }
}

/// Rotate avatars (yaw) and their viewpoint children (pitch) from pending
/// look input.
pub fn apply_look(
    lock: Res<InputLock>,
    mut q_avatars: Query<
        (&mut MovementIntent, &MovementConfig, &mut Transform, Option<&Children>),
        Without<InteractionViewpoint>,
    >,
    mut q_viewpoints: Query<&mut Transform, With<InteractionViewpoint>>,
) {
    for (mut intent, config, mut transform, children) in &mut q_avatars {
        let look = std::mem::take(&mut intent.look);
        if lock.look || look == Vec2::ZERO {
            continue;
        }

        transform.rotate_y(-look.x * config.look_sensitivity);

        let children: &[Entity] = children.map(|c| &**c).unwrap_or(&[]);
        for &child in children {
            if let Ok(mut viewpoint) = q_viewpoints.get_mut(child) {
                let (yaw, pitch, roll) = viewpoint.rotation.to_euler(EulerRot::YXZ);
                let pitch = (pitch - look.y * config.look_sensitivity)
                    .clamp(-MAX_PITCH, MAX_PITCH);
                viewpoint.rotation = Quat::from_euler(EulerRot::YXZ, yaw, pitch, roll);
            }
        }
    }
}

/// Integrate avatar velocity into the transform.
pub fn integrate_movement(
    time: Res<Time>,
    mut q_avatars: Query<(&MovementVelocity, &mut Transform)>,
) {
    let dt = time.delta_secs();
    for (velocity, mut transform) in &mut q_avatars {
        transform.translation += velocity.0 * dt;
    }
}

const MAX_PITCH: f32 = std::f32::consts::FRAC_PI_2 - 0.01;

fn flatten(v: Vec3) -> Vec3 {
    Vec3::new(v.x, 0.0, v.z).normalize_or_zero()
}
