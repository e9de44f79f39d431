//! Raycast intersection records.

use bevy::prelude::*;

/// One intersection of a ray with scene geometry.
///
/// Backends return these ordered by increasing `distance`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceHit {
    /// Distance from the ray origin to the hit point.
    pub distance: f32,
    /// World position of the hit point.
    pub point: Vec3,
    /// Surface normal at the hit point.
    pub normal: Vec3,
    /// Entity that was hit.
    pub entity: Entity,
}

impl SurfaceHit {
    /// Create a hit record.
    pub fn new(distance: f32, point: Vec3, normal: Vec3, entity: Entity) -> Self {
        Self {
            distance,
            point,
            normal,
            entity,
        }
    }
}

/// Sort hits nearest first.
pub fn sort_by_distance(hits: &mut [SurfaceHit]) {
    hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
}
