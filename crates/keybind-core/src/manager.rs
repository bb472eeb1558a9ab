// Keybind Shortcut Manager
// Registration, dispatch and teardown of keyboard shortcuts
//
// The manager owns the registry and the shared event source, and holds a
// handle to the context resolver. The platform feeds key events in through
// `dispatch`; every registered rule listening on the event's target and type
// is evaluated against one snapshot of the active context, then the matched
// subscribers are notified once all internal locks are released.

use std::fmt;
use std::time::Duration;

use parking_lot::Mutex;

use crate::context::{ContextResolver, ContextRestore, ContextSubscription, ContextValue};
use crate::event::{EventKind, KeyPressEvent, Target};
use crate::priority;
use crate::registry::{Registry, RegistryEntry};
use crate::rule::{CompiledRule, RuleConfig, RuleError, RuleSummary};
use crate::source::{KeyEventSource, SharedSources, SourceError, SourceKey};
use crate::stream::{self, RuleStream, SharedObserver};

/// Result type for manager construction
pub type ManagerResult<T> = Result<T, ManagerError>;

/// Fatal errors: the manager cannot run at all
#[derive(Debug, thiserror::Error)]
pub enum ManagerError {
    #[error("cannot start shortcut manager: {0}")]
    SourceUnavailable(#[from] SourceError),
}

/// Why a rule was not registered
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegisterError {
    #[error("invalid shortcut: {0}")]
    Rule(#[from] RuleError),

    #[error("event source refused listener: {0}")]
    Source(#[from] SourceError),

    #[error("shortcut manager has been shut down")]
    ShutDown,
}

/// Construction options of a [`ShortcutManager`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagerOptions {
    /// Base of the context stack; it can never be left
    pub initial_context: ContextValue,
    /// Listening target for rules that do not name one
    pub default_target: Target,
    /// Timeout for sequence rules that do not set their own
    pub default_sequence_timeout: Option<Duration>,
}

impl Default for ManagerOptions {
    fn default() -> Self {
        Self {
            initial_context: ContextValue::NONE,
            default_target: Target::default(),
            default_sequence_timeout: None,
        }
    }
}

struct ManagerInner {
    registry: Registry,
    sources: SharedSources,
    options: ManagerOptions,
    shut_down: bool,
}

/// Keyboard shortcut manager.
///
/// All methods take `&self`; observers and context listeners may call back
/// into the manager (through an `Arc`) while they run.
pub struct ShortcutManager {
    context: ContextResolver,
    inner: Mutex<ManagerInner>,
}

impl ShortcutManager {
    /// Create a manager with default options
    pub fn new(source: impl KeyEventSource + 'static) -> ManagerResult<Self> {
        Self::with_options(source, ManagerOptions::default())
    }

    /// Create a manager.
    ///
    /// # Errors
    ///
    /// Fails if the event source reports that the platform cannot deliver
    /// key events.
    pub fn with_options(
        source: impl KeyEventSource + 'static,
        options: ManagerOptions,
    ) -> ManagerResult<Self> {
        source.probe()?;
        log::debug!(
            "shortcut manager started (context {}, target {})",
            options.initial_context,
            options.default_target
        );
        Ok(Self {
            context: ContextResolver::new(options.initial_context.clone()),
            inner: Mutex::new(ManagerInner {
                registry: Registry::new(),
                sources: SharedSources::new(Box::new(source)),
                options,
                shut_down: false,
            }),
        })
    }

    /// Handle to the context resolver
    pub fn context(&self) -> &ContextResolver {
        &self.context
    }

    /// Push a context onto the context stack
    pub fn enter(&self, context: impl Into<ContextValue>) {
        self.context.enter(context);
    }

    /// Pop the context stack; `None` when only the base context remains
    pub fn leave(&self) -> Option<ContextValue> {
        self.context.leave()
    }

    /// Override the active context until the returned handle is restored
    pub fn set_context(&self, context: impl Into<ContextValue>) -> ContextRestore {
        self.context.set_override(context)
    }

    pub fn active_context(&self) -> ContextValue {
        self.context.resolve()
    }

    pub fn on_context_change(
        &self,
        listener: impl FnMut(&ContextValue) + Send + 'static,
    ) -> ContextSubscription {
        self.context.on_change(listener)
    }

    /// Register a rule, surfacing why it was rejected.
    ///
    /// An id that is already registered is replaced: the old rule's stream
    /// completes before this returns. A rejected rule never touches the
    /// registry, so an existing rule with the same id stays in place.
    pub fn try_register(&self, config: RuleConfig) -> Result<RuleStream, RegisterError> {
        let (stream, replaced) = {
            let mut inner = self.inner.lock();
            if inner.shut_down {
                return Err(RegisterError::ShutDown);
            }

            let rule = CompiledRule::compile(
                config,
                &inner.options.default_target,
                inner.options.default_sequence_timeout,
            )?;
            // Take the new reference first so a shared listener survives
            // the replacement
            inner.sources.acquire(&rule.source_key())?;

            log::debug!(
                "registered {} shortcut '{}': {} ({} on {}, context {})",
                rule.kind(),
                rule.id(),
                rule.matcher(),
                rule.event_kind(),
                rule.target(),
                rule.context()
            );
            let stream = RuleStream::new(rule.id());
            let replaced = inner.registry.insert(RegistryEntry {
                rule,
                stream: stream.clone(),
            });
            if let Some(old) = &replaced {
                log::warn!("shortcut '{}' was already registered; replacing it", old.rule.id());
                inner.sources.release(&old.rule.source_key());
            }
            (stream, replaced)
        };

        if let Some(old) = replaced {
            old.stream.complete();
        }
        Ok(stream)
    }

    /// Register a rule.
    ///
    /// Invalid rules are logged and yield an already completed stream.
    pub fn register(&self, config: RuleConfig) -> RuleStream {
        let id = config.id.clone();
        match self.try_register(config) {
            Ok(stream) => stream,
            Err(e) => {
                log::warn!("shortcut '{}' not registered: {}", id, e);
                RuleStream::inert(&id)
            }
        }
    }

    /// Remove a rule and complete its stream; returns false if `id` is unknown
    pub fn remove(&self, id: &str) -> bool {
        let removed = {
            let mut inner = self.inner.lock();
            let removed = inner.registry.remove(id);
            if let Some(entry) = &removed {
                inner.sources.release(&entry.rule.source_key());
            }
            removed
        };

        match removed {
            Some(entry) => {
                entry.stream.complete();
                log::debug!("removed shortcut '{}'", id);
                true
            }
            None => {
                log::warn!("cannot remove shortcut '{}': not registered", id);
                false
            }
        }
    }

    pub fn has(&self, id: &str) -> bool {
        self.inner.lock().registry.contains(id)
    }

    /// Summaries of the active rules, in dispatch order
    pub fn list(&self) -> Vec<RuleSummary> {
        self.inner.lock().registry.summaries()
    }

    /// Stream of an active rule
    pub fn stream(&self, id: &str) -> Option<RuleStream> {
        self.inner.lock().registry.get(id).map(|entry| entry.stream.clone())
    }

    /// Returns true while some rule depends on the `kind` listener of `target`
    pub fn is_listening(&self, target: impl Into<Target>, kind: EventKind) -> bool {
        self.inner
            .lock()
            .sources
            .is_listening(&SourceKey::new(target.into(), kind))
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.lock().shut_down
    }

    /// Deliver one key event.
    ///
    /// Returns the number of subscriber notifications it produced. Events on
    /// a target and type nobody listens to are ignored.
    pub fn dispatch(&self, event: &mut KeyPressEvent) -> usize {
        let active = self.context.resolve();
        let mut deliveries: Vec<(String, SharedObserver)> = Vec::new();

        {
            let inner = self.inner.lock();
            if inner.shut_down {
                log::warn!("key event '{}' ignored: manager has been shut down", event.key());
                return 0;
            }
            let key = SourceKey::new(event.target().clone(), event.kind());
            if !inner.sources.is_listening(&key) {
                log::trace!("no listener for {}; '{}' ignored", key, event.key());
                return 0;
            }

            for entry in inner.registry.iter() {
                let rule = &entry.rule;
                if !rule.listens_to(event) || !rule.admits_context(&active) {
                    continue;
                }

                let observers = entry.stream.evaluate(rule.matcher(), event, || {
                    priority::admits(rule, event, &active, inner.registry.rules())
                });
                if observers.is_empty() {
                    continue;
                }

                log::debug!(
                    "shortcut '{}' matched '{}' ({} subscriber(s), context {})",
                    rule.id(),
                    event.key(),
                    observers.len(),
                    active
                );
                if rule.prevents_default() {
                    event.prevent_default();
                }
                deliveries.extend(
                    observers
                        .into_iter()
                        .map(|observer| (rule.id().to_string(), observer)),
                );
            }
        }

        let event: &KeyPressEvent = event;
        for (rule_id, observer) in &deliveries {
            stream::deliver(rule_id, observer, event);
        }
        deliveries.len()
    }

    /// Complete every stream, release every listener and close the context
    /// resolver. Later registrations are rejected and events are ignored.
    pub fn shutdown(&self) {
        let entries = {
            let mut inner = self.inner.lock();
            if inner.shut_down {
                return;
            }
            inner.shut_down = true;
            inner.sources.release_all();
            inner.registry.drain()
        };

        let count = entries.len();
        for entry in entries {
            entry.stream.complete();
        }
        self.context.close();
        log::debug!("shortcut manager shut down ({} shortcut(s) completed)", count);
    }
}

impl Drop for ShortcutManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for ShortcutManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("ShortcutManager")
            .field("context", &self.context)
            .field("rules", &inner.registry.len())
            .field("options", &inner.options)
            .field("shut_down", &inner.shut_down)
            .finish()
    }
}
