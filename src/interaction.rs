//! Object interaction: pickup, hold, charge, throw and inspect.
//!
//! The lifecycle of a held object is a four-state machine
//! (`Idle → Holding ⇄ Charging`, `Holding ⇄ Inspecting`) kept in the
//! [`ObjectInteraction`] resource, so there is at most one held object at a
//! time. Input adapters send [`InteractionAction`] events; the exclusive
//! [`handle_interaction_actions`] system turns them into body swaps through
//! the physics backend and FSM transitions.
//!
//! Side effects (body conversion, restore) happen before the transition is
//! fired; when they fail the transition is not attempted and the state is
//! left unchanged.

use std::collections::HashSet;
use std::time::Duration;

use bevy::ecs::event::EventCursor;
use bevy::prelude::*;

use crate::backend::{InteractionPhysicsBackend, RaycastRequest};
use crate::body::{self, BodySnapshot};
use crate::config::{CursorStyle, InteractionConfig};
use crate::error::{InteractionError, InteractionResult};
use crate::fsm::{DataKey, StateMachine};
use crate::intent::InputLock;
use crate::jump::JumpController;
use crate::state::{Held, InteractionViewpoint, Inspecting, Pickupable};

/// State of the interaction machine.
#[derive(Reflect, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum InteractionState {
    /// Nothing held.
    #[default]
    Idle,
    /// An object follows the viewpoint.
    Holding,
    /// A throw is being charged.
    Charging,
    /// The held object is being inspected; look and movement are locked.
    Inspecting,
}

/// Verbs accepted by the interaction machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InteractionVerb {
    /// Take an object.
    Pickup,
    /// Start charging a throw.
    Charge,
    /// Abort a charge.
    Cancel,
    /// Drop or throw the held object.
    Release,
    /// Start inspecting the held object.
    Inspect,
    /// Stop inspecting.
    ExitInspect,
}

/// Requests from input adapters.
#[derive(Event, Debug, Clone, Copy, PartialEq)]
pub enum InteractionAction {
    /// Pick up `target`, or whatever pickupable object the viewpoint aims at
    /// when `None`.
    Grab {
        /// Object chosen by the adapter, if it did its own targeting.
        target: Option<Entity>,
    },
    /// Start charging a throw.
    Charge,
    /// Abort the current charge.
    Cancel,
    /// Release the held object: drop, or throw if charged long enough.
    Release,
    /// Start inspecting the held object.
    Inspect,
    /// Stop inspecting.
    ExitInspect,
}

/// Pointer motion to rotate the inspected object by, in pointer units.
#[derive(Event, Debug, Clone, Copy, PartialEq)]
pub struct InspectDrag(pub Vec2);

/// An object was picked up ("grab-start").
#[derive(Event, Debug, Clone, Copy, PartialEq, Eq)]
pub struct GrabStarted {
    /// The object.
    pub entity: Entity,
}

/// An object was let go ("grab-end").
#[derive(Event, Debug, Clone, Copy, PartialEq, Eq)]
pub struct GrabEnded {
    /// The object.
    pub entity: Entity,
    /// Whether it was thrown rather than dropped.
    pub thrown: bool,
}

/// Held object.
pub const HELD_OBJECT: DataKey<Entity> = DataKey::new("held_object");
/// Body parameters of the held object before pickup.
pub const BODY_SNAPSHOT: DataKey<BodySnapshot> = DataKey::new("body_snapshot");
/// When the current charge started.
pub const CHARGE_START: DataKey<Duration> = DataKey::new("charge_start");
/// Object under inspection.
pub const INSPECTED_OBJECT: DataKey<Entity> = DataKey::new("inspected_object");
/// Viewpoint orientation when inspection started.
pub const VIEW_SNAPSHOT: DataKey<Quat> = DataKey::new("view_snapshot");

/// Arguments carried by a verb into its handler.
#[derive(Debug, Clone, Copy, Default)]
pub struct VerbArgs {
    /// Current time.
    pub now: Duration,
    /// Pickup target.
    pub target: Option<Entity>,
    /// Body snapshot of the pickup target.
    pub snapshot: Option<BodySnapshot>,
    /// Viewpoint orientation to restore after inspection.
    pub view_rotation: Option<Quat>,
}

type InteractionMachine = StateMachine<InteractionState, InteractionVerb, VerbArgs>;

fn build_machine() -> InteractionMachine {
    use InteractionState::*;
    use InteractionVerb::*;

    InteractionMachine::new(Idle)
        .on(Idle, Pickup, |data, args| {
            let target = args.target?;
            let snapshot = args.snapshot?;
            data.set(HELD_OBJECT, target);
            data.set(BODY_SNAPSHOT, snapshot);
            Some(Holding)
        })
        .on(Holding, Charge, |data, args| {
            data.set(CHARGE_START, args.now);
            Some(Charging)
        })
        .on(Charging, Cancel, |data, _| {
            data.take(CHARGE_START);
            Some(Holding)
        })
        .on(Holding, Release, |data, _| {
            data.take(HELD_OBJECT);
            data.take(BODY_SNAPSHOT);
            Some(Idle)
        })
        .on(Charging, Release, |data, _| {
            data.take(CHARGE_START);
            data.take(HELD_OBJECT);
            data.take(BODY_SNAPSHOT);
            Some(Idle)
        })
        .on(Holding, Inspect, |data, args| {
            let held = *data.get(HELD_OBJECT)?;
            data.set(INSPECTED_OBJECT, held);
            if let Some(rotation) = args.view_rotation {
                data.set(VIEW_SNAPSHOT, rotation);
            }
            Some(Inspecting)
        })
        .on(Inspecting, ExitInspect, |data, _| {
            data.take(INSPECTED_OBJECT);
            data.take(VIEW_SNAPSHOT);
            Some(Holding)
        })
        .observe(|from, to, verb| debug!("interaction {from:?} -> {to:?} on {verb:?}"))
}

/// The interaction controller.
///
/// Exposes the machine's `is`/`can`/`transition` surface plus the
/// operations that pair a transition with its side effects.
#[derive(Resource)]
pub struct ObjectInteraction {
    machine: InteractionMachine,
}

impl Default for ObjectInteraction {
    fn default() -> Self {
        Self {
            machine: build_machine(),
        }
    }
}

impl std::fmt::Debug for ObjectInteraction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectInteraction")
            .field("machine", &self.machine)
            .finish()
    }
}

impl ObjectInteraction {
    /// Current state.
    pub fn state(&self) -> InteractionState {
        *self.machine.state()
    }

    /// Whether the controller is in `state`.
    pub fn is(&self, state: InteractionState) -> bool {
        self.machine.is(&state)
    }

    /// Whether `verb` is accepted in the current state.
    pub fn can(&self, verb: InteractionVerb) -> bool {
        self.machine.can(&verb)
    }

    /// Fire a verb without side effects.
    pub fn transition(&mut self, verb: InteractionVerb, args: &VerbArgs) -> bool {
        self.machine.transition(verb, args)
    }

    /// The held object.
    pub fn held(&self) -> Option<Entity> {
        self.machine.data().get(HELD_OBJECT).copied()
    }

    /// The object under inspection.
    pub fn inspected(&self) -> Option<Entity> {
        self.machine.data().get(INSPECTED_OBJECT).copied()
    }

    /// Snapshot of the held object's original body.
    pub fn snapshot(&self) -> Option<BodySnapshot> {
        self.machine.data().get(BODY_SNAPSHOT).copied()
    }

    /// Charge ratio at `now`, zero when not charging.
    pub fn charge_ratio(&self, config: &InteractionConfig, now: Duration) -> f32 {
        self.charge_elapsed(now)
            .map(|elapsed| config.charge_ratio(elapsed))
            .unwrap_or(0.0)
    }

    fn charge_elapsed(&self, now: Duration) -> Option<f32> {
        self.machine
            .data()
            .get(CHARGE_START)
            .map(|start| now.saturating_sub(*start).as_secs_f32())
    }

    /// Pick up `target`.
    ///
    /// Only valid while idle. Converts the target's body to user-controlled;
    /// if that fails the state stays idle.
    pub fn on_pickup<B: InteractionPhysicsBackend>(
        &mut self,
        world: &mut World,
        target: Entity,
        now: Duration,
    ) -> bool {
        if !self.can(InteractionVerb::Pickup) {
            return false;
        }
        if world.get::<Pickupable>(target).is_none() {
            debug!("Refusing pickup of {target:?}: not pickupable");
            return false;
        }

        let Ok(snapshot) = body::convert_to_user_controlled::<B>(world, target) else {
            return false;
        };

        let args = VerbArgs {
            now,
            target: Some(target),
            snapshot: Some(snapshot),
            ..default()
        };
        if !self.transition(InteractionVerb::Pickup, &args) {
            body::restore::<B>(world, target, &snapshot, None, 0.0);
            return false;
        }

        world.entity_mut(target).insert(Held);
        world.send_event(GrabStarted { entity: target });
        true
    }

    /// Start charging a throw. Only valid while holding.
    pub fn on_charge(&mut self, now: Duration) -> bool {
        self.transition(
            InteractionVerb::Charge,
            &VerbArgs {
                now,
                ..default()
            },
        )
    }

    /// Abort the current charge. Only valid while charging.
    pub fn on_cancel(&mut self) -> bool {
        self.transition(InteractionVerb::Cancel, &VerbArgs::default())
    }

    /// Release the held object.
    ///
    /// While holding, or when the charge is shorter than the quick-tap
    /// threshold, the object is dropped with no velocity. Otherwise it is
    /// thrown along the viewpoint with a force set by the charge ratio.
    pub fn on_release<B: InteractionPhysicsBackend>(&mut self, world: &mut World, now: Duration) -> bool {
        if !self.can(InteractionVerb::Release) {
            return false;
        }
        let (Some(held), Some(snapshot)) = (self.held(), self.snapshot()) else {
            return false;
        };

        let config = world
            .get_resource::<InteractionConfig>()
            .copied()
            .unwrap_or_default();

        let velocity = self
            .charge_elapsed(now)
            .filter(|elapsed| *elapsed >= config.quick_tap_threshold)
            .map(|elapsed| {
                let force = config.throw_force(config.charge_ratio(elapsed));
                let rotation = viewpoint_pose(world)
                    .map(|(_, rotation)| rotation)
                    .unwrap_or(Quat::IDENTITY);
                body::calculate_throw_velocity(rotation, force, config.throw_upward_bias)
            });

        if !body::restore::<B>(world, held, &snapshot, velocity, config.velocity_delay) {
            return false;
        }

        self.transition(InteractionVerb::Release, &VerbArgs::default());
        world.entity_mut(held).remove::<Held>();
        world.send_event(GrabEnded {
            entity: held,
            thrown: velocity.is_some(),
        });
        true
    }

    /// Start inspecting the held object.
    ///
    /// Only valid while holding, and refused while any jump is airborne.
    /// Locks look and movement input and remembers the view orientation.
    pub fn on_inspect(&mut self, world: &mut World) -> bool {
        if !self.can(InteractionVerb::Inspect) || any_airborne(world) {
            return false;
        }

        let view_rotation = viewpoint_entity(world)
            .and_then(|viewpoint| world.get::<Transform>(viewpoint))
            .map(|transform| transform.rotation);

        let args = VerbArgs {
            view_rotation,
            ..default()
        };
        if !self.transition(InteractionVerb::Inspect, &args) {
            return false;
        }

        if let Some(inspected) = self.inspected() {
            world.entity_mut(inspected).insert(Inspecting);
        }
        world.get_resource_or_init::<InputLock>().lock_all();
        true
    }

    /// Stop inspecting and restore the view orientation.
    pub fn on_exit_inspect(&mut self, world: &mut World) -> bool {
        if !self.can(InteractionVerb::ExitInspect) {
            return false;
        }

        let view_rotation = self.machine.data().get(VIEW_SNAPSHOT).copied();
        let inspected = self.inspected();
        if !self.transition(InteractionVerb::ExitInspect, &VerbArgs::default()) {
            return false;
        }

        if let (Some(rotation), Some(viewpoint)) = (view_rotation, viewpoint_entity(world)) {
            if let Some(mut transform) = world.get_mut::<Transform>(viewpoint) {
                transform.rotation = rotation;
            }
        }
        if let Some(inspected) = inspected {
            if let Ok(mut entity) = world.get_entity_mut(inspected) {
                entity.remove::<Inspecting>();
            }
        }
        world.get_resource_or_init::<InputLock>().unlock_all();
        true
    }

    /// Apply an adapter request.
    pub fn apply<B: InteractionPhysicsBackend>(
        &mut self,
        world: &mut World,
        action: InteractionAction,
        now: Duration,
    ) -> bool {
        match action {
            InteractionAction::Grab { target } => {
                if !self.can(InteractionVerb::Pickup) {
                    return false;
                }
                let target = match target {
                    Some(target) => target,
                    None => match pick_target::<B>(world) {
                        Ok(target) => target,
                        Err(err) => {
                            debug!("{err}");
                            return false;
                        }
                    },
                };
                self.on_pickup::<B>(world, target, now)
            }
            InteractionAction::Charge => self.on_charge(now),
            InteractionAction::Cancel => self.on_cancel(),
            InteractionAction::Release => self.on_release::<B>(world, now),
            InteractionAction::Inspect => self.on_inspect(world),
            InteractionAction::ExitInspect => self.on_exit_inspect(world),
        }
    }

    /// Return to idle when the held object was despawned.
    fn forget_despawned(&mut self, world: &mut World) {
        let Some(held) = self.held() else {
            return;
        };
        if world.entities().contains(held) {
            return;
        }

        warn!("held object {held} was despawned");
        if self.is(InteractionState::Inspecting) {
            self.transition(InteractionVerb::ExitInspect, &VerbArgs::default());
            world.get_resource_or_init::<InputLock>().unlock_all();
        }
        self.transition(InteractionVerb::Release, &VerbArgs::default());
        world.send_event(GrabEnded {
            entity: held,
            thrown: false,
        });
    }
}

/// Find the pickupable object the viewpoint is aiming at.
pub fn pick_target<B: InteractionPhysicsBackend>(world: &mut World) -> InteractionResult<Entity> {
    let reach = world
        .get_resource::<InteractionConfig>()
        .map(|config| config.reach)
        .unwrap_or_else(|| InteractionConfig::default().reach);

    let Some((origin, rotation)) = viewpoint_pose(world) else {
        return Err(InteractionError::NoIntersection { reach });
    };

    let targets: HashSet<Entity> = world
        .query_filtered::<Entity, With<Pickupable>>()
        .iter(world)
        .collect();
    if targets.is_empty() {
        return Err(InteractionError::NoIntersection { reach });
    }

    let request = RaycastRequest::new(origin, rotation * Vec3::NEG_Z, reach);
    B::cast_ray(world, &request, &targets)
        .first()
        .map(|hit| hit.entity)
        .ok_or(InteractionError::NoIntersection { reach })
}

fn viewpoint_entity(world: &mut World) -> Option<Entity> {
    world
        .query_filtered::<Entity, With<InteractionViewpoint>>()
        .iter(world)
        .next()
}

fn viewpoint_pose(world: &mut World) -> Option<(Vec3, Quat)> {
    let viewpoint = viewpoint_entity(world)?;
    let global = world.get::<GlobalTransform>(viewpoint)?;
    let (_, rotation, translation) = global.to_scale_rotation_translation();
    Some((translation, rotation))
}

fn any_airborne(world: &mut World) -> bool {
    world
        .query::<&JumpController>()
        .iter(world)
        .any(JumpController::is_airborne)
}

/// Feed queued [`InteractionAction`]s to the controller.
pub fn handle_interaction_actions<B: InteractionPhysicsBackend>(
    world: &mut World,
    mut cursor: Local<EventCursor<InteractionAction>>,
) {
    let actions: Vec<InteractionAction> = match world.get_resource::<Events<InteractionAction>>() {
        Some(events) => cursor.read(events).copied().collect(),
        None => return,
    };
    let now = world
        .get_resource::<Time>()
        .map(|t| t.elapsed())
        .unwrap_or_default();

    world.resource_scope(|world, mut interaction: Mut<ObjectInteraction>| {
        interaction.forget_despawned(world);
        for action in actions {
            if !interaction.apply::<B>(world, action, now) {
                debug!("interaction action {action:?} ignored in {:?}", interaction.state());
            }
        }
    });
}

/// Keep the held object at the hold offset in front of the viewpoint while
/// holding or charging.
pub fn follow_viewpoint(
    interaction: Res<ObjectInteraction>,
    config: Res<InteractionConfig>,
    q_viewpoint: Query<&GlobalTransform, With<InteractionViewpoint>>,
    mut q_held: Query<&mut Transform, (With<Held>, Without<InteractionViewpoint>)>,
) {
    if !matches!(
        interaction.state(),
        InteractionState::Holding | InteractionState::Charging
    ) {
        return;
    }
    let (Some(held), Ok(viewpoint)) = (interaction.held(), q_viewpoint.single()) else {
        return;
    };
    if let Ok(mut transform) = q_held.get_mut(held) {
        transform.translation = viewpoint.transform_point(config.hold_offset);
    }
}

/// Rotate the inspected object from pointer drags, around the view's up and
/// right axes.
pub fn rotate_inspected(
    config: Res<InteractionConfig>,
    mut drags: EventReader<InspectDrag>,
    q_viewpoint: Query<&GlobalTransform, With<InteractionViewpoint>>,
    mut q_inspected: Query<&mut Transform, With<Inspecting>>,
) {
    let delta: Vec2 = drags.read().map(|drag| drag.0).sum();
    if delta == Vec2::ZERO {
        return;
    }
    let (up, right) = q_viewpoint
        .single()
        .map(|view| (view.up().as_vec3(), view.right().as_vec3()))
        .unwrap_or((Vec3::Y, Vec3::X));

    let rotation = Quat::from_axis_angle(up, delta.x * config.inspect_sensitivity)
        * Quat::from_axis_angle(right, delta.y * config.inspect_sensitivity);
    for mut transform in &mut q_inspected {
        transform.rotate(rotation);
    }
}

/// Visual feedback for the interaction state.
///
/// Put this on whatever entity renders the cursor; its fields are updated
/// every frame.
#[derive(Component, Reflect, Debug, Clone, Copy, PartialEq)]
#[reflect(Component)]
pub struct InteractionCursor {
    /// State the cursor reflects.
    pub mode: InteractionState,
    /// Uniform scale.
    pub scale: f32,
    /// Color.
    pub color: Color,
}

impl Default for InteractionCursor {
    fn default() -> Self {
        let idle = InteractionConfig::default().cursor.idle;
        Self {
            mode: InteractionState::Idle,
            scale: idle.scale,
            color: idle.color,
        }
    }
}

/// Cursor appearance for a state and charge ratio.
pub fn cursor_style(config: &InteractionConfig, state: InteractionState, charge_ratio: f32) -> CursorStyle {
    let styles = &config.cursor;
    match state {
        InteractionState::Idle => styles.idle,
        InteractionState::Holding => styles.holding,
        InteractionState::Inspecting => styles.inspecting,
        InteractionState::Charging => styles.charge_start.lerp(&styles.charge_full, charge_ratio),
    }
}

/// Update every [`InteractionCursor`] from the controller.
pub fn sync_cursor(
    time: Res<Time>,
    interaction: Res<ObjectInteraction>,
    config: Res<InteractionConfig>,
    mut q_cursors: Query<&mut InteractionCursor>,
) {
    let state = interaction.state();
    let style = cursor_style(&config, state, interaction.charge_ratio(&config, time.elapsed()));
    for mut cursor in &mut q_cursors {
        let next = InteractionCursor {
            mode: state,
            scale: style.scale,
            color: style.color,
        };
        cursor.set_if_neq(next);
    }
}
