//! Desktop input adapter.
//!
//! Maps mouse and keyboard to [`InteractionAction`]s and [`MovementIntent`]:
//!
//! | Input | Effect |
//! |-------|--------|
//! | Left press | grab when idle, start charging when holding |
//! | Left release | release (throw or drop) when charging |
//! | Right press | cancel the charge |
//! | `E` | enter / leave inspect |
//! | `W` `A` `S` `D` | walk |
//! | `Space` | jump |
//! | Mouse motion | look, or rotate the inspected object |
//!
//! Only active when [`InteractionContext::modality`] is
//! [`InputModality::Desktop`]. Touch and headset adapters live outside this
//! crate and write the same events and intents.

use bevy::input::mouse::AccumulatedMouseMotion;
use bevy::prelude::*;

use crate::config::{InputModality, InteractionContext};
use crate::intent::MovementIntent;
use crate::interaction::{InspectDrag, InteractionAction, InteractionState, ObjectInteraction};

/// Whether the desktop adapter should run.
pub fn desktop_input_active(context: Res<InteractionContext>) -> bool {
    context.modality == InputModality::Desktop
}

/// The action a desktop button edge maps to in `state`.
///
/// `grab_pending` tracks whether the current left press was spent on a grab,
/// so that its release does not immediately let go again.
pub fn desktop_action(
    state: InteractionState,
    left_pressed: bool,
    left_released: bool,
    right_pressed: bool,
    inspect_pressed: bool,
    grab_pending: &mut bool,
) -> Option<InteractionAction> {
    if inspect_pressed {
        return match state {
            InteractionState::Holding => Some(InteractionAction::Inspect),
            InteractionState::Inspecting => Some(InteractionAction::ExitInspect),
            _ => None,
        };
    }

    if right_pressed && state == InteractionState::Charging {
        return Some(InteractionAction::Cancel);
    }

    if left_pressed {
        return match state {
            InteractionState::Idle => {
                *grab_pending = true;
                Some(InteractionAction::Grab { target: None })
            }
            InteractionState::Holding => Some(InteractionAction::Charge),
            _ => None,
        };
    }

    if left_released {
        if std::mem::take(grab_pending) {
            return None;
        }
        if state == InteractionState::Charging {
            return Some(InteractionAction::Release);
        }
    }

    None
}

/// Send interaction actions from mouse buttons and the inspect key.
pub fn desktop_interaction_input(
    mouse: Option<Res<ButtonInput<MouseButton>>>,
    keys: Option<Res<ButtonInput<KeyCode>>>,
    interaction: Res<ObjectInteraction>,
    mut grab_pending: Local<bool>,
    mut actions: EventWriter<InteractionAction>,
) {
    let (Some(mouse), Some(keys)) = (mouse, keys) else {
        return;
    };

    let action = desktop_action(
        interaction.state(),
        mouse.just_pressed(MouseButton::Left),
        mouse.just_released(MouseButton::Left),
        mouse.just_pressed(MouseButton::Right),
        keys.just_pressed(KeyCode::KeyE),
        &mut *grab_pending,
    );
    if let Some(action) = action {
        actions.write(action);
    }
}

/// Write movement intent from the keyboard and route mouse motion to look
/// or inspect rotation.
pub fn desktop_movement_input(
    keys: Option<Res<ButtonInput<KeyCode>>>,
    motion: Option<Res<AccumulatedMouseMotion>>,
    interaction: Res<ObjectInteraction>,
    mut drags: EventWriter<InspectDrag>,
    mut q_intents: Query<&mut MovementIntent>,
) {
    let Some(keys) = keys else {
        return;
    };

    let axis = |positive: KeyCode, negative: KeyCode| {
        keys.pressed(positive) as i8 as f32 - keys.pressed(negative) as i8 as f32
    };
    let direction = Vec2::new(axis(KeyCode::KeyD, KeyCode::KeyA), axis(KeyCode::KeyW, KeyCode::KeyS));
    let jump = keys.pressed(KeyCode::Space);
    let delta = motion.map(|m| m.delta).unwrap_or(Vec2::ZERO);
    let inspecting = interaction.is(InteractionState::Inspecting);

    if inspecting && delta != Vec2::ZERO {
        drags.write(InspectDrag(delta));
    }

    for mut intent in &mut q_intents {
        intent.set_direction(direction);
        intent.set_jump_pressed(jump);
        if !inspecting {
            intent.add_look(delta);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(state: InteractionState, pending: &mut bool) -> Option<InteractionAction> {
        desktop_action(state, true, false, false, false, pending)
    }

    fn release(state: InteractionState, pending: &mut bool) -> Option<InteractionAction> {
        desktop_action(state, false, true, false, false, pending)
    }

    #[test]
    fn grab_press_release_is_swallowed() {
        let mut pending = false;
        assert_eq!(
            press(InteractionState::Idle, &mut pending),
            Some(InteractionAction::Grab { target: None })
        );
        // The grab went through; the release of the same click does nothing.
        assert_eq!(release(InteractionState::Holding, &mut pending), None);
        assert!(!pending);
    }

    #[test]
    fn second_click_charges_then_releases() {
        let mut pending = false;
        assert_eq!(
            press(InteractionState::Holding, &mut pending),
            Some(InteractionAction::Charge)
        );
        assert_eq!(
            release(InteractionState::Charging, &mut pending),
            Some(InteractionAction::Release)
        );
    }

    #[test]
    fn release_after_cancel_keeps_holding() {
        let mut pending = false;
        assert_eq!(
            desktop_action(InteractionState::Charging, false, false, true, false, &mut pending),
            Some(InteractionAction::Cancel)
        );
        assert_eq!(release(InteractionState::Holding, &mut pending), None);
    }

    #[test]
    fn inspect_key_toggles() {
        let mut pending = false;
        let toggle = |state, pending: &mut bool| desktop_action(state, false, false, false, true, pending);
        assert_eq!(
            toggle(InteractionState::Holding, &mut pending),
            Some(InteractionAction::Inspect)
        );
        assert_eq!(
            toggle(InteractionState::Inspecting, &mut pending),
            Some(InteractionAction::ExitInspect)
        );
        assert_eq!(toggle(InteractionState::Idle, &mut pending), None);
    }

    #[test]
    fn right_click_outside_charging_is_ignored() {
        let mut pending = false;
        assert_eq!(
            desktop_action(InteractionState::Holding, false, false, true, false, &mut pending),
            None
        );
    }
}
