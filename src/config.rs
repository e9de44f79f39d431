//! Configuration types.
//!
//! This module defines the tunables for object interaction, the ground
//! constraint, the jump controller and avatar movement, plus the
//! [`InteractionContext`] resource describing the active input modality.

use bevy::prelude::*;

use crate::state::SurfaceTags;

/// Input modality the runtime is currently driven by.
#[derive(Reflect, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputModality {
    /// Mouse and keyboard.
    #[default]
    Desktop,
    /// Touch screen with on-screen controls.
    Touch,
    /// Tracked headset with controllers.
    Headset,
}

/// Runtime context shared by the input adapters and the movement systems.
///
/// Inserted once at startup by whatever detects the device capabilities.
#[derive(Resource, Reflect, Debug, Clone, Copy)]
#[reflect(Resource)]
pub struct InteractionContext {
    /// Active input modality.
    pub modality: InputModality,
    /// Whether the device orientation sensor drives the view (touch only).
    pub gyro_enabled: bool,
    /// Whether avatar movement is held to walkable surfaces.
    pub constrain_movement: bool,
}

impl Default for InteractionContext {
    fn default() -> Self {
        Self {
            modality: InputModality::Desktop,
            gyro_enabled: false,
            constrain_movement: true,
        }
    }
}

impl InteractionContext {
    /// Context for a headset session.
    pub fn headset() -> Self {
        Self {
            modality: InputModality::Headset,
            ..default()
        }
    }

    /// Context for a touch device.
    pub fn touch(gyro_enabled: bool) -> Self {
        Self {
            modality: InputModality::Touch,
            gyro_enabled,
            ..default()
        }
    }

    /// Whether pointer motion should steer the view.
    ///
    /// Headsets steer the view with tracking and gyro-enabled touch devices
    /// with the orientation sensor.
    pub fn pointer_look(&self) -> bool {
        match self.modality {
            InputModality::Desktop => true,
            InputModality::Touch => !self.gyro_enabled,
            InputModality::Headset => false,
        }
    }
}

/// Appearance of the interaction cursor.
#[derive(Reflect, Debug, Clone, Copy, PartialEq)]
pub struct CursorStyle {
    /// Uniform scale of the cursor.
    pub scale: f32,
    /// Cursor color.
    pub color: Color,
}

impl CursorStyle {
    /// Create a cursor style.
    pub const fn new(scale: f32, color: Color) -> Self {
        Self { scale, color }
    }

    /// Interpolate towards `other` by `t` in `[0, 1]`.
    pub fn lerp(&self, other: &CursorStyle, t: f32) -> CursorStyle {
        let t = t.clamp(0.0, 1.0);
        let a = self.color.to_linear();
        let b = other.color.to_linear();
        let color = LinearRgba::new(
            a.red + (b.red - a.red) * t,
            a.green + (b.green - a.green) * t,
            a.blue + (b.blue - a.blue) * t,
            a.alpha + (b.alpha - a.alpha) * t,
        );
        CursorStyle {
            scale: self.scale + (other.scale - self.scale) * t,
            color: Color::from(color),
        }
    }
}

/// Cursor appearance for each interaction state.
#[derive(Reflect, Debug, Clone, Copy, PartialEq)]
pub struct CursorStyles {
    /// Nothing held.
    pub idle: CursorStyle,
    /// Holding an object.
    pub holding: CursorStyle,
    /// Inspecting the held object.
    pub inspecting: CursorStyle,
    /// Charging, at zero charge.
    pub charge_start: CursorStyle,
    /// Charging, at full charge.
    pub charge_full: CursorStyle,
}

impl Default for CursorStyles {
    fn default() -> Self {
        Self {
            idle: CursorStyle::new(1.0, Color::WHITE),
            holding: CursorStyle::new(0.8, Color::srgb(0.3, 0.9, 0.4)),
            inspecting: CursorStyle::new(0.5, Color::srgb(0.3, 0.6, 1.0)),
            charge_start: CursorStyle::new(1.0, Color::srgb(1.0, 0.9, 0.2)),
            charge_full: CursorStyle::new(1.8, Color::srgb(1.0, 0.2, 0.1)),
        }
    }
}

/// Configuration for picking up, holding, charging and throwing objects.
#[derive(Resource, Reflect, Debug, Clone, Copy)]
#[reflect(Resource)]
pub struct InteractionConfig {
    /// Offset of a held object in viewpoint space (-Z is forward).
    pub hold_offset: Vec3,
    /// Maximum distance of the pickup ray.
    pub reach: f32,
    /// A charge released sooner than this (seconds) drops instead of throwing.
    pub quick_tap_threshold: f32,
    /// Charge time (seconds) at which the throw reaches full force.
    pub max_charge_time: f32,
    /// Throw force at zero charge.
    pub min_throw_force: f32,
    /// Throw force at full charge.
    pub max_throw_force: f32,
    /// Upward component added to the forward throw direction.
    pub throw_upward_bias: f32,
    /// Delay (seconds) before a release velocity reaches the new body.
    pub velocity_delay: f32,
    /// Radians of inspect rotation per pixel of pointer motion.
    pub inspect_sensitivity: f32,
    /// Cursor appearance per state.
    pub cursor: CursorStyles,
}

impl Default for InteractionConfig {
    fn default() -> Self {
        Self {
            hold_offset: Vec3::new(0.0, -0.2, -1.5),
            reach: 5.0,
            quick_tap_threshold: 0.2,
            max_charge_time: 1.5,
            min_throw_force: 2.0,
            max_throw_force: 15.0,
            throw_upward_bias: 0.1,
            velocity_delay: 0.05,
            inspect_sensitivity: 0.01,
            cursor: CursorStyles::default(),
        }
    }
}

impl InteractionConfig {
    /// Charge ratio in `[0, 1]` for a charge held for `elapsed` seconds.
    pub fn charge_ratio(&self, elapsed: f32) -> f32 {
        if self.max_charge_time <= 0.0 {
            return 1.0;
        }
        (elapsed / self.max_charge_time).clamp(0.0, 1.0)
    }

    /// Throw force for a charge ratio, interpolated between the min and max
    /// force. A full charge yields exactly `max_throw_force`.
    pub fn throw_force(&self, ratio: f32) -> f32 {
        let ratio = ratio.clamp(0.0, 1.0);
        if ratio >= 1.0 {
            return self.max_throw_force;
        }
        let force = self.min_throw_force + (self.max_throw_force - self.min_throw_force) * ratio;
        force.min(self.max_throw_force)
    }

    /// Builder: set the hold offset.
    pub fn with_hold_offset(mut self, offset: Vec3) -> Self {
        self.hold_offset = offset;
        self
    }

    /// Builder: set the pickup reach.
    pub fn with_reach(mut self, reach: f32) -> Self {
        self.reach = reach;
        self
    }

    /// Builder: set the throw force range.
    pub fn with_throw_force(mut self, min: f32, max: f32) -> Self {
        self.min_throw_force = min;
        self.max_throw_force = max;
        self
    }

    /// Builder: set the full-charge time.
    pub fn with_max_charge_time(mut self, seconds: f32) -> Self {
        self.max_charge_time = seconds;
        self
    }

    /// Builder: set the quick-tap threshold.
    pub fn with_quick_tap_threshold(mut self, seconds: f32) -> Self {
        self.quick_tap_threshold = seconds;
        self
    }

    /// Builder: set the velocity delivery delay.
    pub fn with_velocity_delay(mut self, seconds: f32) -> Self {
        self.velocity_delay = seconds;
        self
    }
}

/// Tags an entity must carry (any of them) to be matched.
#[derive(Reflect, Debug, Clone, Default, PartialEq, Eq)]
pub struct SurfaceSelector(pub Vec<String>);

impl SurfaceSelector {
    /// Selector matching any of `tags`.
    pub fn new<I, T>(tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self(tags.into_iter().map(Into::into).collect())
    }

    /// Selector matching nothing.
    pub fn none() -> Self {
        Self(Vec::new())
    }

    /// Whether `tags` satisfies this selector.
    pub fn matches(&self, tags: &SurfaceTags) -> bool {
        self.0.iter().any(|tag| tags.has(tag))
    }

    /// Whether the selector has no tags at all.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// One scan candidate: rotation around the vertical axis (degrees) and the
/// fraction of the movement vector to reach.
#[derive(Reflect, Debug, Clone, Copy, PartialEq)]
pub struct ScanCandidate {
    /// Rotation of the movement vector around the vertical axis, in degrees.
    pub angle_degrees: f32,
    /// Fraction of the movement vector's length.
    pub reach: f32,
}

impl ScanCandidate {
    /// Create a candidate.
    pub const fn new(angle_degrees: f32, reach: f32) -> Self {
        Self {
            angle_degrees,
            reach,
        }
    }

    /// Apply this candidate to a movement vector.
    pub fn offset(&self, movement: Vec3) -> Vec3 {
        Quat::from_axis_angle(Vec3::NEG_Y, self.angle_degrees.to_radians()) * movement * self.reach
    }
}

/// Ordered candidates tried by the ground constraint when the avatar moves.
///
/// The default table is empirically tuned: straight ahead, half-way, then
/// progressively wider and shorter probes to either side.
#[derive(Reflect, Debug, Clone, PartialEq)]
pub struct ScanPattern(pub Vec<ScanCandidate>);

impl ScanPattern {
    /// The tuned default table.
    pub const DEFAULT: [ScanCandidate; 8] = [
        ScanCandidate::new(0.0, 1.0),
        ScanCandidate::new(0.0, 0.5),
        ScanCandidate::new(30.0, 0.4),
        ScanCandidate::new(-30.0, 0.4),
        ScanCandidate::new(60.0, 0.2),
        ScanCandidate::new(-60.0, 0.2),
        ScanCandidate::new(80.0, 0.06),
        ScanCandidate::new(-80.0, 0.06),
    ];

    /// Iterate the candidates in order.
    pub fn iter(&self) -> impl Iterator<Item = &ScanCandidate> {
        self.0.iter()
    }
}

impl Default for ScanPattern {
    fn default() -> Self {
        Self(Self::DEFAULT.to_vec())
    }
}

/// Configuration of a ground constraint.
///
/// Immutable after setup; only [`GroundConstraint::enabled`](crate::ground::GroundConstraint)
/// changes at runtime.
#[derive(Reflect, Debug, Clone)]
pub struct GroundConstraintConfig {
    /// Geometry the avatar may stand on.
    pub walkable: SurfaceSelector,
    /// Geometry that invalidates a probe even where walkable geometry exists.
    pub exclude: SurfaceSelector,
    /// How far below the avatar a surface may be and still count (0 = any).
    pub fall: f32,
    /// Distance from the constrained entity's origin down to the feet.
    pub height: f32,
    /// Entity whose world position supplies the horizontal position, e.g. a
    /// tracked head under the avatar rig.
    pub xz_origin: Option<Entity>,
    /// Movement below this distance is ignored.
    pub movement_epsilon: f32,
    /// Per-frame vertical allowance above the feet where probes start.
    pub max_fall_velocity: f32,
    /// Rate at which the descent over a ledge speeds up.
    pub fall_gravity: f32,
    /// Probe candidates.
    pub scan_pattern: ScanPattern,
}

impl Default for GroundConstraintConfig {
    fn default() -> Self {
        Self {
            walkable: SurfaceSelector::new(["walkable"]),
            exclude: SurfaceSelector::none(),
            fall: 0.5,
            height: 1.6,
            xz_origin: None,
            movement_epsilon: 0.01,
            max_fall_velocity: 0.5,
            fall_gravity: -1.0,
            scan_pattern: ScanPattern::default(),
        }
    }
}

impl GroundConstraintConfig {
    /// Maximum length of every probe ray.
    pub fn probe_length(&self) -> f32 {
        if self.fall > 0.0 {
            self.fall + self.max_fall_velocity
        } else {
            f32::MAX
        }
    }

    /// Builder: set the walkable selector.
    pub fn with_walkable<I, T>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.walkable = SurfaceSelector::new(tags);
        self
    }

    /// Builder: set the exclusion selector.
    pub fn with_exclude<I, T>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.exclude = SurfaceSelector::new(tags);
        self
    }

    /// Builder: set the avatar height.
    pub fn with_height(mut self, height: f32) -> Self {
        self.height = height;
        self
    }

    /// Builder: set the fall tolerance.
    pub fn with_fall(mut self, fall: f32) -> Self {
        self.fall = fall;
        self
    }

    /// Builder: take the horizontal position from another entity.
    pub fn with_xz_origin(mut self, origin: Entity) -> Self {
        self.xz_origin = Some(origin);
        self
    }

    /// Builder: replace the scan pattern.
    pub fn with_scan_pattern(mut self, pattern: ScanPattern) -> Self {
        self.scan_pattern = pattern;
        self
    }
}

/// Configuration of the jump controller.
#[derive(Component, Reflect, Debug, Clone, Copy)]
#[reflect(Component)]
pub struct JumpConfig {
    /// Height gained at the apex.
    pub height: f32,
    /// Rise duration in seconds.
    pub up_duration: f32,
    /// Fall duration in seconds.
    pub down_duration: f32,
    /// Seconds after landing during which jumps are rejected.
    pub cooldown: f32,
    /// Upper bound (seconds) after which a jump is forcibly ended.
    pub safety_timeout: f32,
    /// Distance the avatar is pushed back from a wall on early landing.
    pub wall_push_back: f32,
    /// Look-ahead distance for wall proximity checks.
    pub wall_check_distance: f32,
}

impl Default for JumpConfig {
    fn default() -> Self {
        Self {
            height: 1.5,
            up_duration: 0.4,
            down_duration: 0.4,
            cooldown: 0.1,
            safety_timeout: 3.0,
            wall_push_back: 0.3,
            wall_check_distance: 0.5,
        }
    }
}

impl JumpConfig {
    /// Builder: set the jump height.
    pub fn with_height(mut self, height: f32) -> Self {
        self.height = height;
        self
    }

    /// Builder: set rise and fall durations.
    pub fn with_durations(mut self, up: f32, down: f32) -> Self {
        self.up_duration = up;
        self.down_duration = down;
        self
    }

    /// Builder: set the cooldown.
    pub fn with_cooldown(mut self, cooldown: f32) -> Self {
        self.cooldown = cooldown;
        self
    }
}

/// Avatar movement tunables.
#[derive(Component, Reflect, Debug, Clone, Copy)]
#[reflect(Component)]
pub struct MovementConfig {
    /// Walking speed (units/second).
    pub walk_speed: f32,
    /// Radians of view rotation per pixel of pointer motion.
    pub look_sensitivity: f32,
}

impl Default for MovementConfig {
    fn default() -> Self {
        Self {
            walk_speed: 3.0,
            look_sensitivity: 0.002,
        }
    }
}

impl MovementConfig {
    /// Builder: set the walk speed.
    pub fn with_walk_speed(mut self, speed: f32) -> Self {
        self.walk_speed = speed;
        self
    }
}
