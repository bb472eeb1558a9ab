// Keybind Context Resolver
// Hierarchical context stack plus a temporary override, with change notification

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

/// An application-defined context name, or no context at all.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ContextValue(Option<Arc<str>>);

impl ContextValue {
    /// The "no context" value
    pub const NONE: ContextValue = ContextValue(None);

    /// A named context
    pub fn named(name: impl AsRef<str>) -> Self {
        Self(Some(Arc::from(name.as_ref())))
    }

    /// The context name, if any
    pub fn name(&self) -> Option<&str> {
        self.0.as_deref()
    }

    /// Returns true for the "no context" value
    pub fn is_none(&self) -> bool {
        self.0.is_none()
    }
}

impl fmt::Display for ContextValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{}", name),
            None => write!(f, "<none>"),
        }
    }
}

impl From<&str> for ContextValue {
    fn from(name: &str) -> Self {
        Self::named(name)
    }
}

impl From<String> for ContextValue {
    fn from(name: String) -> Self {
        Self::named(name)
    }
}

impl From<Option<&str>> for ContextValue {
    fn from(name: Option<&str>) -> Self {
        name.map(Self::named).unwrap_or_default()
    }
}

impl From<Option<String>> for ContextValue {
    fn from(name: Option<String>) -> Self {
        name.map(Self::named).unwrap_or_default()
    }
}

/// Override slot of the resolver.
///
/// `Set(ContextValue::NONE)` forces "no context" and is distinct from `Unset`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ContextOverride {
    #[default]
    Unset,
    Set(ContextValue),
}

type Listener = Arc<Mutex<Box<dyn FnMut(&ContextValue) + Send>>>;

struct ResolverState {
    /// Never empty; the bottom element is the initial context
    stack: Vec<ContextValue>,
    override_value: ContextOverride,
    /// Last value announced to listeners
    last_resolved: ContextValue,
    listeners: Vec<(u64, Listener)>,
    next_listener_id: u64,
    closed: bool,
}

impl ResolverState {
    fn resolve(&self) -> ContextValue {
        match &self.override_value {
            ContextOverride::Set(value) => value.clone(),
            ContextOverride::Unset => self.stack.last().cloned().unwrap_or_default(),
        }
    }
}

/// Resolves the currently active context.
///
/// The active context is the override when one is set, otherwise the top of
/// the context stack. Cloning yields another handle to the same state.
#[derive(Clone)]
pub struct ContextResolver {
    state: Arc<Mutex<ResolverState>>,
}

impl ContextResolver {
    /// Create a resolver whose non-poppable base is `initial`
    pub fn new(initial: impl Into<ContextValue>) -> Self {
        let initial = initial.into();
        Self {
            state: Arc::new(Mutex::new(ResolverState {
                stack: vec![initial.clone()],
                override_value: ContextOverride::Unset,
                last_resolved: initial,
                listeners: Vec::new(),
                next_listener_id: 0,
                closed: false,
            })),
        }
    }

    /// The currently active context
    pub fn resolve(&self) -> ContextValue {
        self.state.lock().resolve()
    }

    /// Push a context onto the stack
    pub fn enter(&self, context: impl Into<ContextValue>) {
        let context = context.into();
        self.mutate("enter", move |state| state.stack.push(context));
    }

    /// Pop the top of the stack.
    ///
    /// Returns `None` when only the base context remains; the base is never
    /// popped.
    pub fn leave(&self) -> Option<ContextValue> {
        self.mutate("leave", |state| {
            if state.stack.len() > 1 {
                state.stack.pop()
            } else {
                None
            }
        })
        .flatten()
    }

    /// Set the override, even if it already holds the same value.
    ///
    /// The returned handle clears the override only while it still holds the
    /// value set here, so a stale restore cannot clobber a newer override.
    pub fn set_override(&self, context: impl Into<ContextValue>) -> ContextRestore {
        let context = context.into();
        let value = context.clone();
        self.mutate("set_override", move |state| {
            state.override_value = ContextOverride::Set(value);
        });
        ContextRestore {
            state: Arc::downgrade(&self.state),
            value: context,
        }
    }

    /// Clear the override unconditionally; returns false if none was set
    pub fn clear_override(&self) -> bool {
        self.mutate("clear_override", |state| {
            let was_set = state.override_value != ContextOverride::Unset;
            state.override_value = ContextOverride::Unset;
            was_set
        })
        .unwrap_or(false)
    }

    /// Current override slot
    pub fn override_value(&self) -> ContextOverride {
        self.state.lock().override_value.clone()
    }

    /// Number of entries on the stack, base included
    pub fn depth(&self) -> usize {
        self.state.lock().stack.len()
    }

    /// Subscribe to changes of the resolved context.
    ///
    /// The listener runs once per actual change; consecutive duplicates are
    /// never announced.
    pub fn on_change(
        &self,
        listener: impl FnMut(&ContextValue) + Send + 'static,
    ) -> ContextSubscription {
        let mut state = self.state.lock();
        let id = state.next_listener_id;
        state.next_listener_id += 1;
        if state.closed {
            log::warn!("context listener registered on a closed resolver; it will never run");
        } else {
            let callback: Box<dyn FnMut(&ContextValue) + Send> = Box::new(listener);
            state.listeners.push((id, Arc::new(Mutex::new(callback))));
        }
        ContextSubscription {
            state: Arc::downgrade(&self.state),
            id,
        }
    }

    /// Drop every listener and refuse further mutation
    pub fn close(&self) {
        let mut state = self.state.lock();
        state.closed = true;
        state.listeners.clear();
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    fn restore_if(&self, value: &ContextValue) -> bool {
        self.mutate("restore", |state| {
            let holds = matches!(&state.override_value, ContextOverride::Set(current) if current == value);
            if holds {
                state.override_value = ContextOverride::Unset;
            }
            holds
        })
        .unwrap_or(false)
    }

    /// Apply a mutation and notify listeners if the resolved value changed.
    ///
    /// Listeners run after the state lock is released so they may call back
    /// into the resolver.
    fn mutate<R>(&self, op: &str, f: impl FnOnce(&mut ResolverState) -> R) -> Option<R> {
        let (result, notify) = {
            let mut state = self.state.lock();
            if state.closed {
                log::warn!("context {} ignored: resolver is closed", op);
                return None;
            }
            let result = f(&mut state);
            let resolved = state.resolve();
            if resolved == state.last_resolved {
                (result, None)
            } else {
                log::debug!("active context {} -> {} ({})", state.last_resolved, resolved, op);
                state.last_resolved = resolved.clone();
                let listeners: Vec<Listener> =
                    state.listeners.iter().map(|(_, l)| Arc::clone(l)).collect();
                (result, Some((resolved, listeners)))
            }
        };

        if let Some((value, listeners)) = notify {
            for listener in listeners {
                match listener.try_lock() {
                    Some(mut callback) => (&mut **callback)(&value),
                    None => log::warn!(
                        "context listener re-entered while handling a change; skipped {}",
                        value
                    ),
                }
            }
        }
        Some(result)
    }
}

impl fmt::Debug for ContextResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("ContextResolver")
            .field("stack", &state.stack)
            .field("override", &state.override_value)
            .field("closed", &state.closed)
            .finish()
    }
}

/// Clears an override set by [`ContextResolver::set_override`]
#[must_use = "dropping a ContextRestore leaves the override in place"]
#[derive(Debug)]
pub struct ContextRestore {
    state: Weak<Mutex<ResolverState>>,
    value: ContextValue,
}

impl ContextRestore {
    /// The override value this handle restores from
    pub fn value(&self) -> &ContextValue {
        &self.value
    }

    /// Clear the override if it still holds this handle's value.
    ///
    /// Returns true if the override was cleared.
    pub fn restore(self) -> bool {
        match self.state.upgrade() {
            Some(state) => ContextResolver { state }.restore_if(&self.value),
            None => false,
        }
    }
}

/// Handle to a context change listener
#[derive(Debug)]
pub struct ContextSubscription {
    state: Weak<Mutex<ResolverState>>,
    id: u64,
}

impl ContextSubscription {
    /// Stop receiving change notifications
    pub fn unsubscribe(self) {
        if let Some(state) = self.state.upgrade() {
            state.lock().listeners.retain(|(id, _)| *id != self.id);
        }
    }
}
