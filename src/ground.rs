//! Ground-following movement constraint.
//!
//! Each frame the constrained entity has moved, downward rays are cast from
//! a fixed pattern of candidate points between its last supported position
//! and where it wants to be. The first candidate that lands on walkable
//! geometry (and not on an exclusion zone) becomes the new position. When no
//! candidate finds support the entity is put back on its last supported
//! position, unless it never had one yet.
//!
//! The solver itself ([`GroundConstraint::solve`]) is engine-agnostic: it
//! only needs something implementing [`SurfaceRaycast`]. The ECS systems at
//! the bottom of this module feed it positions and apply its answers.

use std::collections::HashSet;

use bevy::prelude::*;

use crate::backend::{InteractionPhysicsBackend, RaycastRequest};
use crate::collision::SurfaceHit;
use crate::config::{GroundConstraintConfig, InteractionContext, ScanPattern, SurfaceSelector};
use crate::error::InteractionError;
use crate::jump::JumpController;
use crate::state::SurfaceTags;

/// Downward raycasting used by the ground constraint.
pub trait SurfaceRaycast {
    /// Cast `request` against `targets`, returning hits nearest first.
    fn cast(&mut self, request: &RaycastRequest, targets: &HashSet<Entity>) -> Vec<SurfaceHit>;
}

impl<F> SurfaceRaycast for F
where
    F: FnMut(&RaycastRequest, &HashSet<Entity>) -> Vec<SurfaceHit>,
{
    fn cast(&mut self, request: &RaycastRequest, targets: &HashSet<Entity>) -> Vec<SurfaceHit> {
        self(request, targets)
    }
}

/// Outcome of one solver tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GroundFix {
    /// No walkable geometry is known; nothing was done.
    Inert,
    /// Movement below the epsilon; nothing was cast.
    Idle,
    /// Airborne over a gap while a jump owns vertical motion.
    DeferredToJump,
    /// Support found; move the entity here (world space).
    Corrected(Vec3),
    /// Support found but this frame's write is suppressed after a landing.
    Suppressed(Vec3),
    /// No support; put the entity back on its last supported position.
    Reverted(Vec3),
    /// No support and no footing ever established; leave the entity alone.
    Searching,
}

impl GroundFix {
    /// World position the entity should be moved to, if any.
    pub fn target(&self) -> Option<Vec3> {
        match self {
            GroundFix::Corrected(position) | GroundFix::Reverted(position) => Some(*position),
            _ => None,
        }
    }
}

/// Keeps an entity on walkable geometry.
///
/// `enabled` is toggled by the jump controller while it owns vertical
/// motion, and initialized from [`InteractionContext`] when the component
/// is added.
#[derive(Component, Debug, Clone)]
pub struct GroundConstraint {
    /// Immutable configuration.
    pub config: GroundConstraintConfig,
    /// Whether the solver runs.
    pub enabled: bool,
    first_try: bool,
    last_valid_position: Option<Vec3>,
    fall_velocity: f32,
    suppress_next_write: bool,
    walkable: HashSet<Entity>,
    excluded: HashSet<Entity>,
    probe_targets: HashSet<Entity>,
    surfaces_dirty: bool,
}

impl Default for GroundConstraint {
    fn default() -> Self {
        Self::new(GroundConstraintConfig::default())
    }
}

impl GroundConstraint {
    /// Create an enabled constraint with no known surfaces.
    pub fn new(config: GroundConstraintConfig) -> Self {
        Self {
            config,
            enabled: true,
            first_try: true,
            last_valid_position: None,
            fall_velocity: 0.0,
            suppress_next_write: false,
            walkable: HashSet::new(),
            excluded: HashSet::new(),
            probe_targets: HashSet::new(),
            surfaces_dirty: true,
        }
    }

    /// Disabled constraint with empty configuration.
    ///
    /// Stands in the component slot while the solver runs with world
    /// access. Builds no heap storage.
    pub(crate) fn vacant() -> Self {
        Self {
            config: GroundConstraintConfig {
                walkable: SurfaceSelector::none(),
                exclude: SurfaceSelector::none(),
                fall: 0.0,
                height: 0.0,
                xz_origin: None,
                movement_epsilon: 0.0,
                max_fall_velocity: 0.0,
                fall_gravity: 0.0,
                scan_pattern: ScanPattern(Vec::new()),
            },
            enabled: false,
            first_try: true,
            last_valid_position: None,
            fall_velocity: 0.0,
            suppress_next_write: false,
            walkable: HashSet::new(),
            excluded: HashSet::new(),
            probe_targets: HashSet::new(),
            surfaces_dirty: false,
        }
    }

    /// Most recent supported position (world space).
    pub fn last_valid_position(&self) -> Option<Vec3> {
        self.last_valid_position
    }

    /// Whether a supported position has ever been found.
    pub fn has_footing(&self) -> bool {
        !self.first_try
    }

    /// Whether the solver has no walkable geometry to work with.
    pub fn is_inert(&self) -> bool {
        self.walkable.is_empty()
    }

    /// Skip the position write of the next tick.
    ///
    /// Set right after a jump lands so the solver does not fight the landing
    /// placement for a frame.
    pub fn suppress_next_write(&mut self) {
        self.suppress_next_write = true;
    }

    /// Whether the next tick's write is suppressed.
    pub fn write_suppressed(&self) -> bool {
        self.suppress_next_write
    }

    /// Current descent speed when stepping off a ledge.
    pub fn fall_velocity(&self) -> f32 {
        self.fall_velocity
    }

    /// Request a rescan of tagged geometry.
    pub fn mark_surfaces_dirty(&mut self) {
        self.surfaces_dirty = true;
    }

    /// Replace the walkable and excluded surface sets.
    pub fn set_surfaces(&mut self, walkable: HashSet<Entity>, excluded: HashSet<Entity>) {
        self.probe_targets = walkable.union(&excluded).copied().collect();
        self.walkable = walkable;
        self.excluded = excluded;
        self.surfaces_dirty = false;
    }

    /// Run one tick of the solver.
    ///
    /// - `next_position`: where the entity wants to be this frame (world).
    /// - `dt`: frame time in seconds.
    /// - `jumping`: whether a jump currently owns vertical motion.
    pub fn solve(
        &mut self,
        next_position: Vec3,
        dt: f32,
        jumping: bool,
        raycast: &mut impl SurfaceRaycast,
    ) -> GroundFix {
        // The landing suppression covers exactly one tick, whatever happens in it.
        let suppress = std::mem::take(&mut self.suppress_next_write);

        if self.walkable.is_empty() {
            return GroundFix::Inert;
        }

        let Some(last) = self.last_valid_position else {
            self.last_valid_position = Some(next_position);
            return GroundFix::Idle;
        };

        if next_position.distance(last) < self.config.movement_epsilon {
            return GroundFix::Idle;
        }

        let probe_length = self.config.probe_length();
        let lift = Vec3::Y * (self.config.max_fall_velocity - self.config.height);

        if jumping {
            let guard = RaycastRequest::down(next_position + lift, probe_length);
            if raycast.cast(&guard, &self.walkable).is_empty() {
                return GroundFix::DeferredToJump;
            }
        }

        let movement = next_position - last;
        for candidate in self.config.scan_pattern.iter() {
            let origin = last + candidate.offset(movement) + lift;
            let hits = raycast.cast(&RaycastRequest::down(origin, probe_length), &self.probe_targets);

            let Some(nearest) = hits
                .iter()
                .min_by(|a, b| a.distance.total_cmp(&b.distance))
            else {
                continue;
            };

            if self.excluded.contains(&nearest.entity) {
                continue;
            }

            let mut target = nearest.point + Vec3::Y * self.config.height;
            if next_position.y - (target.y - self.fall_velocity * 2.0) > 0.01 {
                self.fall_velocity += (self.config.fall_gravity * dt).max(-self.config.max_fall_velocity);
                target.y = next_position.y + self.fall_velocity;
            } else {
                self.fall_velocity = 0.0;
            }

            self.last_valid_position = Some(target);
            self.first_try = false;

            return if suppress {
                GroundFix::Suppressed(target)
            } else {
                GroundFix::Corrected(target)
            };
        }

        if self.first_try {
            GroundFix::Searching
        } else {
            GroundFix::Reverted(last)
        }
    }
}

/// Initialize `enabled` of new constraints from the movement context.
pub fn initialize_ground_constraints(
    context: Res<InteractionContext>,
    mut q_constraints: Query<&mut GroundConstraint, Added<GroundConstraint>>,
) {
    for mut constraint in &mut q_constraints {
        constraint.enabled = context.constrain_movement;
    }
}

/// Flag every constraint for a rescan when tagged geometry changes.
pub fn track_surface_changes(
    q_changed: Query<(), Changed<SurfaceTags>>,
    mut removed: RemovedComponents<SurfaceTags>,
    mut q_constraints: Query<&mut GroundConstraint>,
) {
    let removed_any = removed.read().count() > 0;
    if q_changed.is_empty() && !removed_any {
        return;
    }
    for mut constraint in &mut q_constraints {
        constraint.mark_surfaces_dirty();
    }
}

/// Rebuild the surface sets of constraints flagged for a rescan.
pub fn rescan_surfaces(
    q_surfaces: Query<(Entity, &SurfaceTags)>,
    mut q_constraints: Query<(Entity, &mut GroundConstraint)>,
) {
    for (entity, mut constraint) in &mut q_constraints {
        if !constraint.surfaces_dirty {
            continue;
        }

        let mut walkable = HashSet::new();
        let mut excluded = HashSet::new();
        for (surface, tags) in &q_surfaces {
            if constraint.config.exclude.matches(tags) {
                excluded.insert(surface);
            } else if constraint.config.walkable.matches(tags) {
                walkable.insert(surface);
            }
        }

        if walkable.is_empty() {
            let err = InteractionError::UnmatchedSelector {
                selector: constraint.config.walkable.0.clone(),
            };
            warn!("{err} (entity {entity})");
        } else {
            debug!(
                "ground constraint on {entity}: {} walkable, {} excluded surfaces",
                walkable.len(),
                excluded.len()
            );
        }
        constraint.set_surfaces(walkable, excluded);
    }
}

/// Run the ground constraint solver for every enabled constraint.
pub fn apply_ground_constraint<B: InteractionPhysicsBackend>(world: &mut World) {
    let dt = world
        .get_resource::<Time>()
        .map(|t| t.delta_secs())
        .unwrap_or(0.0);

    let entities: Vec<Entity> = world
        .query::<(Entity, &GroundConstraint)>()
        .iter(world)
        .filter(|(_, constraint)| constraint.enabled && !constraint.is_inert())
        .map(|(entity, _)| entity)
        .collect();

    for entity in entities {
        let Some(local) = world.get::<Transform>(entity).map(|t| t.translation) else {
            continue;
        };
        let parent = parent_affine(world, entity);
        let entity_world = parent.transform_point3(local);

        let mut constraint = match world.get_mut::<GroundConstraint>(entity) {
            Some(mut constraint) => std::mem::replace(&mut *constraint, GroundConstraint::vacant()),
            None => continue,
        };

        let origin_offset = constraint
            .config
            .xz_origin
            .and_then(|origin| horizontal_offset(world, entity, origin))
            .unwrap_or(Vec3::ZERO);

        let jumping = world
            .get::<JumpController>(entity)
            .is_some_and(JumpController::is_airborne);

        let next_position = entity_world + origin_offset;
        let mut raycast =
            |request: &RaycastRequest, targets: &HashSet<Entity>| B::cast_ray(world, request, targets);
        let fix = constraint.solve(next_position, dt, jumping, &mut raycast);

        if let GroundFix::Reverted(position) = fix {
            debug!("entity {entity} left walkable ground, reverting to {position}");
        }

        if let Some(target) = fix.target() {
            let local_target = parent.inverse().transform_point3(target - origin_offset);
            if let Some(mut transform) = world.get_mut::<Transform>(entity) {
                transform.translation = local_target;
            }
        }

        if let Some(mut slot) = world.get_mut::<GroundConstraint>(entity) {
            *slot = constraint;
        }
    }
}

/// World transform of an entity's parent, or identity for roots.
pub(crate) fn parent_affine(world: &World, entity: Entity) -> bevy::math::Affine3A {
    world
        .get::<ChildOf>(entity)
        .and_then(|child_of| world.get::<GlobalTransform>(child_of.parent()))
        .map(|global| global.affine())
        .unwrap_or(bevy::math::Affine3A::IDENTITY)
}

/// Horizontal offset from `entity` to `origin`, both in world space.
fn horizontal_offset(world: &World, entity: Entity, origin: Entity) -> Option<Vec3> {
    let entity_global = world.get::<GlobalTransform>(entity)?.translation();
    let origin_global = world.get::<GlobalTransform>(origin)?.translation();
    let offset = origin_global - entity_global;
    Some(Vec3::new(offset.x, 0.0, offset.z))
}
