//! Marker and tag components.
//!
//! These components tag scene entities with the role they play in
//! interaction and movement. `Held` and `Inspecting` are added and removed
//! automatically from the interaction state machine; the rest are placed by
//! the scene author.

use bevy::prelude::*;

/// Marker for objects the user can pick up.
///
/// The object also needs a simulation body; pickup of an object without one
/// is refused.
#[derive(Component, Reflect, Debug, Clone, Copy, Default)]
#[reflect(Component)]
pub struct Pickupable;

/// Marker on the object currently held.
///
/// At most one entity carries this at any time.
#[derive(Component, Reflect, Debug, Clone, Copy, Default)]
#[reflect(Component)]
pub struct Held;

/// Marker on the held object while it is being inspected.
#[derive(Component, Reflect, Debug, Clone, Copy, Default)]
#[reflect(Component)]
pub struct Inspecting;

/// Marker for the viewpoint (camera) that aims pickups, carries held objects
/// and orients throws.
#[derive(Component, Reflect, Debug, Clone, Copy, Default)]
#[reflect(Component)]
pub struct InteractionViewpoint;

/// Free-form tags used by [`SurfaceSelector`](crate::config::SurfaceSelector)s
/// to classify geometry as walkable or excluded.
///
/// # Example
///
/// ```rust
/// use msg_interaction_controller::prelude::*;
///
/// let floor = SurfaceTags::new(["walkable"]);
/// assert!(floor.has("walkable"));
/// ```
#[derive(Component, Reflect, Debug, Clone, Default, PartialEq, Eq)]
#[reflect(Component)]
pub struct SurfaceTags(pub Vec<String>);

impl SurfaceTags {
    /// Create a tag set.
    pub fn new<I, T>(tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self(tags.into_iter().map(Into::into).collect())
    }

    /// Whether `tag` is present.
    pub fn has(&self, tag: &str) -> bool {
        self.0.iter().any(|t| t == tag)
    }
}

/// Wall proximity report for an avatar.
///
/// Written by a wall-detection collaborator (the Rapier backend ships one);
/// read by the jump controller, which lands early when a wall is imminent.
#[derive(Component, Reflect, Debug, Clone, Copy, Default)]
#[reflect(Component)]
pub struct WallProximity {
    /// Whether a collision is imminent along the current motion.
    pub imminent: bool,
    /// Horizontal direction pointing away from the wall.
    pub away: Vec3,
}

impl WallProximity {
    /// Report an imminent wall whose surface faces `away`.
    pub fn imminent(away: Vec3) -> Self {
        Self {
            imminent: true,
            away: Vec3::new(away.x, 0.0, away.z).normalize_or_zero(),
        }
    }

    /// Report that no wall is close.
    pub fn clear(&mut self) {
        self.imminent = false;
        self.away = Vec3::ZERO;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn surface_tags_has() {
        let tags = SurfaceTags::new(["walkable", "stone"]);
        assert!(tags.has("stone"));
        assert!(!tags.has("hole"));
    }

    #[test]
    fn wall_proximity_flattens_direction() {
        let wall = WallProximity::imminent(Vec3::new(2.0, 5.0, 0.0));
        assert!(wall.imminent);
        assert_eq!(wall.away, Vec3::X);
    }

    #[test]
    fn wall_proximity_clear() {
        let mut wall = WallProximity::imminent(Vec3::Z);
        wall.clear();
        assert!(!wall.imminent);
        assert_eq!(wall.away, Vec3::ZERO);
    }
}
