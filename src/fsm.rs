//! Generic finite-state engine.
//!
//! A [`StateMachine`] holds a current state and a table of
//! `state -> action -> handler`. Firing an action that has no handler in the
//! current state is a no-op that reports failure; it never panics. Handlers
//! receive the machine's [`StateData`] store so that state-scoped payloads
//! (held object, snapshots, timers) live with the machine instead of in ad
//! hoc fields on whoever drives it.
//!
//! # Example
//!
//! ```rust
//! use msg_interaction_controller::fsm::{DataKey, StateMachine};
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
//! enum Door { Open, Closed }
//! #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
//! enum Push { Toggle }
//!
//! const TOGGLES: DataKey<u32> = DataKey::new("toggles");
//!
//! let mut door: StateMachine<Door, Push> = StateMachine::new(Door::Closed)
//!     .on(Door::Closed, Push::Toggle, |data, _| {
//!         data.update(TOGGLES, 0, |toggles| *toggles += 1);
//!         Some(Door::Open)
//!     })
//!     .on(Door::Open, Push::Toggle, |_, _| Some(Door::Closed));
//!
//! assert!(door.transition(Push::Toggle, &()));
//! assert!(door.is(&Door::Open));
//! assert_eq!(door.data().get(TOGGLES), Some(&1));
//! ```

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::marker::PhantomData;

/// Transition handler. Returns the next state, or `None` to refuse.
pub type Handler<S, P> = Box<dyn Fn(&mut StateData, &P) -> Option<S> + Send + Sync>;

/// Enter/exit hook.
pub type Hook = Box<dyn Fn(&mut StateData) + Send + Sync>;

/// Global transition observer: `(from, to, action)`.
pub type Observer<S, A> = Box<dyn Fn(&S, &S, &A) + Send + Sync>;

/// Typed key into a [`StateData`] store.
pub struct DataKey<T> {
    name: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T> DataKey<T> {
    /// Create a key. Keys are compared by name.
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _marker: PhantomData,
        }
    }

    /// The key's name.
    pub const fn name(&self) -> &'static str {
        self.name
    }
}

impl<T> Clone for DataKey<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for DataKey<T> {}

impl<T> fmt::Debug for DataKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("DataKey").field(&self.name).finish()
    }
}

/// Keyed, type-erased storage for state-scoped payloads.
#[derive(Default)]
pub struct StateData {
    values: HashMap<&'static str, Box<dyn Any + Send + Sync>>,
}

impl StateData {
    /// Store a value, returning the previous one under the same key.
    pub fn set<T: Any + Send + Sync>(&mut self, key: DataKey<T>, value: T) -> Option<T> {
        self.values
            .insert(key.name, Box::new(value))
            .and_then(|old| old.downcast::<T>().ok())
            .map(|old| *old)
    }

    /// Borrow a value.
    pub fn get<T: Any + Send + Sync>(&self, key: DataKey<T>) -> Option<&T> {
        self.values.get(key.name).and_then(|v| v.downcast_ref::<T>())
    }

    /// Mutably borrow a value.
    pub fn get_mut<T: Any + Send + Sync>(&mut self, key: DataKey<T>) -> Option<&mut T> {
        self.values
            .get_mut(key.name)
            .and_then(|v| v.downcast_mut::<T>())
    }

    /// Modify a value in place, starting from `default` if the key is empty.
    ///
    /// A value stored with a different type under the same name is replaced.
    pub fn update<T, R>(&mut self, key: DataKey<T>, default: T, f: impl FnOnce(&mut T) -> R) -> R
    where
        T: Any + Send + Sync,
    {
        let mut value = self.take(key).unwrap_or(default);
        let result = f(&mut value);
        self.values.insert(key.name, Box::new(value));
        result
    }

    /// Remove and return a value.
    ///
    /// A value stored with a different type under the same name is left in
    /// place and `None` is returned.
    pub fn take<T: Any + Send + Sync>(&mut self, key: DataKey<T>) -> Option<T> {
        let value = self.values.remove(key.name)?;
        match value.downcast::<T>() {
            Ok(value) => Some(*value),
            Err(other) => {
                self.values.insert(key.name, other);
                None
            }
        }
    }

    /// Whether anything is stored under the key.
    pub fn contains<T>(&self, key: DataKey<T>) -> bool {
        self.values.contains_key(key.name)
    }

    /// Drop all stored values.
    pub fn clear(&mut self) {
        self.values.clear();
    }

    /// Number of stored values.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Debug for StateData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.values.keys()).finish()
    }
}

/// Table-driven state machine.
///
/// - `S`: state type
/// - `A`: action type
/// - `P`: per-transition argument passed to handlers (defaults to `()`)
pub struct StateMachine<S, A, P = ()> {
    current: S,
    transitions: HashMap<S, HashMap<A, Handler<S, P>>>,
    enter_hooks: HashMap<S, Hook>,
    exit_hooks: HashMap<S, Hook>,
    observer: Option<Observer<S, A>>,
    data: StateData,
}

impl<S, A, P> StateMachine<S, A, P>
where
    S: Clone + Eq + Hash + Send + Sync + 'static,
    A: Eq + Hash + Send + Sync + 'static,
    P: 'static,
{
    /// Create a machine in `initial` with no transitions.
    pub fn new(initial: S) -> Self {
        Self {
            current: initial,
            transitions: HashMap::new(),
            enter_hooks: HashMap::new(),
            exit_hooks: HashMap::new(),
            observer: None,
            data: StateData::default(),
        }
    }

    /// Builder: register the handler for `action` in `state`.
    pub fn on<F>(mut self, state: S, action: A, handler: F) -> Self
    where
        F: Fn(&mut StateData, &P) -> Option<S> + Send + Sync + 'static,
    {
        self.transitions
            .entry(state)
            .or_default()
            .insert(action, Box::new(handler));
        self
    }

    /// Builder: hook run after entering `state`.
    pub fn on_enter<F>(mut self, state: S, hook: F) -> Self
    where
        F: Fn(&mut StateData) + Send + Sync + 'static,
    {
        self.enter_hooks.insert(state, Box::new(hook));
        self
    }

    /// Builder: hook run when leaving `state`.
    pub fn on_exit<F>(mut self, state: S, hook: F) -> Self
    where
        F: Fn(&mut StateData) + Send + Sync + 'static,
    {
        self.exit_hooks.insert(state, Box::new(hook));
        self
    }

    /// Builder: observer called after every successful transition.
    pub fn observe<F>(mut self, observer: F) -> Self
    where
        F: Fn(&S, &S, &A) + Send + Sync + 'static,
    {
        self.observer = Some(Box::new(observer));
        self
    }

    /// Fire `action` from the current state.
    ///
    /// Returns `false` without touching anything when the current state has
    /// no handler for `action` or the handler refuses. On success the hooks
    /// run in order: exit(old), enter(new), observer(old, new, action).
    pub fn transition(&mut self, action: A, args: &P) -> bool {
        let Some(handler) = self
            .transitions
            .get(&self.current)
            .and_then(|actions| actions.get(&action))
        else {
            return false;
        };

        let Some(next) = handler(&mut self.data, args) else {
            return false;
        };

        let previous = std::mem::replace(&mut self.current, next);

        if let Some(exit) = self.exit_hooks.get(&previous) {
            exit(&mut self.data);
        }
        if let Some(enter) = self.enter_hooks.get(&self.current) {
            enter(&mut self.data);
        }
        if let Some(observer) = &self.observer {
            observer(&previous, &self.current, &action);
        }
        true
    }

    /// Whether the machine is in `state`.
    pub fn is(&self, state: &S) -> bool {
        self.current == *state
    }

    /// Whether the current state has a handler for `action`.
    pub fn can(&self, action: &A) -> bool {
        self.transitions
            .get(&self.current)
            .is_some_and(|actions| actions.contains_key(action))
    }

    /// The current state.
    pub fn state(&self) -> &S {
        &self.current
    }

    /// The data store.
    pub fn data(&self) -> &StateData {
        &self.data
    }

    /// The data store, mutably.
    pub fn data_mut(&mut self) -> &mut StateData {
        &mut self.data
    }
}

impl<S: fmt::Debug, A, P> fmt::Debug for StateMachine<S, A, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateMachine")
            .field("current", &self.current)
            .field("data", &self.data)
            .finish_non_exhaustive()
    }
}
