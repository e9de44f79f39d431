//! # `msg_interaction_controller`
//!
//! First-person object interaction and ground-following movement for Bevy,
//! with physics backend abstraction.
//!
//! This crate provides:
//! - A pickup / hold / charge / throw / inspect controller driven by a
//!   table-based finite-state machine
//! - Safe swapping of physics bodies between simulated and user-controlled
//!   modes, with deferred release velocities
//! - A ground constraint that keeps an avatar on tagged walkable geometry
//!   using a fan of downward raycasts
//! - A scripted jump arc that temporarily takes over from the ground
//!   constraint
//! - A desktop input adapter and a Rapier3D backend
//!
//! ## Architecture
//!
//! All physics access goes through [`InteractionPhysicsBackend`]. Each
//! frame runs, in order:
//! 1. Input adapters write [`InteractionAction`] events and [`MovementIntent`]
//! 2. Intent becomes view-relative velocity; look rotates the view
//! 3. Sensors refresh wall proximity and walkable-surface sets
//! 4. Jumps trigger and animate the vertical axis
//! 5. Velocity is integrated, then the ground constraint corrects position
//! 6. Interaction actions are applied and held objects follow the view
//! 7. Cursor feedback is synchronized
//!
//! ## Usage
//!
//! ```rust
//! use bevy::prelude::*;
//! use msg_interaction_controller::prelude::*;
//!
//! // An avatar that walks on anything tagged "walkable" and can jump.
//! let avatar = (
//!     Transform::from_xyz(0.0, 1.6, 0.0),
//!     MovementIntent::default(),
//!     MovementVelocity::default(),
//!     MovementConfig::default(),
//!     GroundConstraint::new(GroundConstraintConfig::default().with_walkable(["walkable"])),
//!     JumpController::default(),
//!     JumpConfig::default(),
//!     WallProximity::default(),
//! );
//!
//! // Floor geometry.
//! let floor = (Transform::default(), SurfaceTags::new(["walkable"]));
//! # let _ = (avatar, floor);
//! ```
//!
//! [`InteractionPhysicsBackend`]: backend::InteractionPhysicsBackend
//! [`InteractionAction`]: interaction::InteractionAction
//! [`MovementIntent`]: intent::MovementIntent

use bevy::prelude::*;

pub mod backend;
pub mod body;
pub mod collision;
pub mod config;
pub mod error;
pub mod fsm;
pub mod ground;
pub mod input;
pub mod intent;
pub mod interaction;
pub mod jump;
pub mod state;

#[cfg(feature = "rapier3d")]
pub mod rapier;

pub mod prelude {
    //! Convenient re-exports for common usage.

    pub use crate::backend::{InteractionPhysicsBackend, RaycastRequest};
    pub use crate::body::{BodyMode, BodyParams, BodyShape, BodySnapshot, PendingVelocity};
    pub use crate::collision::SurfaceHit;
    pub use crate::config::{
        CursorStyle, CursorStyles, GroundConstraintConfig, InputModality, InteractionConfig,
        InteractionContext, JumpConfig, MovementConfig, ScanCandidate, ScanPattern,
        SurfaceSelector,
    };
    pub use crate::error::{InteractionError, InteractionResult};
    pub use crate::ground::{GroundConstraint, GroundFix};
    pub use crate::intent::{InputLock, MovementIntent, MovementVelocity};
    pub use crate::interaction::{
        GrabEnded, GrabStarted, InspectDrag, InteractionAction, InteractionCursor,
        InteractionState, InteractionVerb, ObjectInteraction,
    };
    pub use crate::jump::{JumpController, JumpPhase};
    pub use crate::state::{
        Held, InteractionViewpoint, Inspecting, Pickupable, SurfaceTags, WallProximity,
    };
    pub use crate::{InteractionControllerPlugin, InteractionSet};

    #[cfg(feature = "rapier3d")]
    pub use crate::rapier::{Rapier3dBackend, Rapier3dPickupBundle};
}

/// Ordered phases of the per-frame update, all in `Update`.
#[derive(SystemSet, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InteractionSet {
    /// Input adapters write actions and intents.
    Input,
    /// Intents become velocity and view rotation.
    Intent,
    /// Wall proximity and surface rescans.
    Sensors,
    /// Jump trigger and arc.
    Jump,
    /// Velocity integration.
    Movement,
    /// Ground constraint.
    Constraint,
    /// Interaction actions, velocity delivery and held-object following.
    Interaction,
    /// Cursor and other feedback.
    Feedback,
}

/// Main plugin for the interaction controller.
///
/// This plugin is generic over a physics backend `B` which provides the actual
/// physics operations (body swaps, velocity writes, raycasts).
///
/// # Type Parameters
/// - `B`: The physics backend implementation (e.g., `Rapier3dBackend`)
///
/// # Examples
///
/// With Rapier3D backend:
/// ```rust,no_run
/// use bevy::prelude::*;
/// use bevy_rapier3d::prelude::*;
/// use msg_interaction_controller::prelude::*;
///
/// App::new()
///     .add_plugins(DefaultPlugins)
///     .add_plugins(RapierPhysicsPlugin::<NoUserData>::default())
///     .add_plugins(InteractionControllerPlugin::<Rapier3dBackend>::default())
///     .run();
/// ```
pub struct InteractionControllerPlugin<B: backend::InteractionPhysicsBackend> {
    _marker: std::marker::PhantomData<B>,
}

impl<B: backend::InteractionPhysicsBackend> Default for InteractionControllerPlugin<B> {
    fn default() -> Self {
        Self {
            _marker: std::marker::PhantomData,
        }
    }
}

impl<B: backend::InteractionPhysicsBackend> Plugin for InteractionControllerPlugin<B> {
    fn build(&self, app: &mut App) {
        // Register core types
        app.register_type::<config::InteractionConfig>();
        app.register_type::<config::InteractionContext>();
        app.register_type::<config::JumpConfig>();
        app.register_type::<config::MovementConfig>();
        app.register_type::<intent::MovementIntent>();
        app.register_type::<intent::MovementVelocity>();
        app.register_type::<intent::InputLock>();
        app.register_type::<interaction::InteractionCursor>();
        app.register_type::<jump::JumpController>();
        app.register_type::<state::Pickupable>();
        app.register_type::<state::Held>();
        app.register_type::<state::Inspecting>();
        app.register_type::<state::InteractionViewpoint>();
        app.register_type::<state::SurfaceTags>();
        app.register_type::<state::WallProximity>();

        app.init_resource::<config::InteractionConfig>();
        app.init_resource::<config::InteractionContext>();
        app.init_resource::<intent::InputLock>();
        app.init_resource::<interaction::ObjectInteraction>();

        app.add_event::<interaction::InteractionAction>();
        app.add_event::<interaction::InspectDrag>();
        app.add_event::<interaction::GrabStarted>();
        app.add_event::<interaction::GrabEnded>();

        // Add the physics backend plugin
        app.add_plugins(B::plugin());

        app.configure_sets(
            Update,
            (
                InteractionSet::Input,
                InteractionSet::Intent,
                InteractionSet::Sensors,
                InteractionSet::Jump,
                InteractionSet::Movement,
                InteractionSet::Constraint,
                InteractionSet::Interaction,
                InteractionSet::Feedback,
            )
                .chain(),
        );

        app.add_systems(
            Update,
            (input::desktop_interaction_input, input::desktop_movement_input)
                .run_if(input::desktop_input_active)
                .in_set(InteractionSet::Input),
        );
        app.add_systems(
            Update,
            (intent::apply_look, intent::apply_movement_intent).in_set(InteractionSet::Intent),
        );
        app.add_systems(
            Update,
            (
                ground::initialize_ground_constraints,
                ground::track_surface_changes,
                ground::rescan_surfaces,
            )
                .chain()
                .in_set(InteractionSet::Sensors),
        );
        app.add_systems(
            Update,
            (jump::trigger_jumps, jump::update_jumps)
                .chain()
                .in_set(InteractionSet::Jump),
        );
        app.add_systems(
            Update,
            intent::integrate_movement.in_set(InteractionSet::Movement),
        );
        app.add_systems(
            Update,
            ground::apply_ground_constraint::<B>.in_set(InteractionSet::Constraint),
        );
        app.add_systems(
            Update,
            (
                interaction::handle_interaction_actions::<B>,
                body::deliver_pending_velocities::<B>,
                interaction::follow_viewpoint,
                interaction::rotate_inspected,
            )
                .chain()
                .in_set(InteractionSet::Interaction),
        );
        app.add_systems(
            Update,
            interaction::sync_cursor.in_set(InteractionSet::Feedback),
        );
    }
}
