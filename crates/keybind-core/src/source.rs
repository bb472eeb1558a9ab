// Keybind Event Source
//
// This module defines the interface to the platform service that delivers
// key-press notifications, and the reference-counted bookkeeping that lets
// every rule on the same (target, event-type) pair share one listener.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::event::{EventKind, Target};

/// Errors reported by a key event source
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    /// The platform primitives needed to observe key events are missing
    #[error("key event source unavailable: {0}")]
    Unavailable(String),

    /// Listening on one target failed
    #[error("failed to listen for {kind} on '{target}': {reason}")]
    ListenFailed {
        target: Target,
        kind: EventKind,
        reason: String,
    },
}

/// Identifies one shared platform listener
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceKey {
    pub target: Target,
    pub kind: EventKind,
}

impl SourceKey {
    pub fn new(target: Target, kind: EventKind) -> Self {
        Self { target, kind }
    }
}

impl fmt::Display for SourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.kind, self.target)
    }
}

/// Platform collaborator that observes key events on listening targets.
///
/// The source only manages listener lifetime. Observed events are handed to
/// [`ShortcutManager::dispatch`](crate::ShortcutManager::dispatch) in arrival
/// order on the thread that received them.
pub trait KeyEventSource: Send {
    /// Check that the platform primitives are present
    fn probe(&self) -> Result<(), SourceError>;

    /// Start observing `kind` events on `target`
    fn listen(&mut self, target: &Target, kind: EventKind) -> Result<(), SourceError>;

    /// Stop observing `kind` events on `target`
    fn unlisten(&mut self, target: &Target, kind: EventKind);
}

/// One platform listener per key, shared by every dependent rule
pub(crate) struct SharedSources {
    source: Box<dyn KeyEventSource>,
    refs: HashMap<SourceKey, usize>,
}

impl SharedSources {
    pub(crate) fn new(source: Box<dyn KeyEventSource>) -> Self {
        Self {
            source,
            refs: HashMap::new(),
        }
    }

    /// Take a reference on the listener for `key`, creating it on first use
    pub(crate) fn acquire(&mut self, key: &SourceKey) -> Result<(), SourceError> {
        if let Some(count) = self.refs.get_mut(key) {
            *count += 1;
            return Ok(());
        }
        self.source.listen(&key.target, key.kind)?;
        log::debug!("listening for {}", key);
        self.refs.insert(key.clone(), 1);
        Ok(())
    }

    /// Drop a reference; the listener goes away with its last dependent
    pub(crate) fn release(&mut self, key: &SourceKey) {
        match self.refs.get_mut(key) {
            Some(count) if *count > 1 => *count -= 1,
            Some(_) => {
                self.refs.remove(key);
                self.source.unlisten(&key.target, key.kind);
                log::debug!("stopped listening for {}", key);
            }
            None => log::warn!("release of unknown listener {}", key),
        }
    }

    /// Tear down every listener
    pub(crate) fn release_all(&mut self) {
        for (key, _) in self.refs.drain() {
            self.source.unlisten(&key.target, key.kind);
            log::debug!("stopped listening for {}", key);
        }
    }

    pub(crate) fn is_listening(&self, key: &SourceKey) -> bool {
        self.refs.contains_key(key)
    }

    #[cfg(test)]
    pub(crate) fn ref_count(&self, key: &SourceKey) -> usize {
        self.refs.get(key).copied().unwrap_or(0)
    }
}

#[derive(Debug, Default)]
struct InProcessState {
    active: HashSet<SourceKey>,
    listen_calls: usize,
    refused: HashSet<Target>,
}

/// In-process key event source.
///
/// Events are injected by calling `dispatch` directly; this source only
/// records which listeners are active. Clones share the same record, so a
/// handle kept outside the manager can observe listener lifetime.
#[derive(Debug, Clone, Default)]
pub struct InProcessSource {
    state: Arc<Mutex<InProcessState>>,
    unavailable: Option<String>,
}

impl InProcessSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// A source whose probe fails, as on a platform without key events
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            unavailable: Some(reason.into()),
            ..Self::default()
        }
    }

    /// Make `listen` fail for one target
    pub fn refuse_target(&self, target: impl Into<Target>) {
        self.state.lock().refused.insert(target.into());
    }

    pub fn is_listening(&self, target: impl Into<Target>, kind: EventKind) -> bool {
        self.state
            .lock()
            .active
            .contains(&SourceKey::new(target.into(), kind))
    }

    /// Number of active listeners
    pub fn active_listeners(&self) -> usize {
        self.state.lock().active.len()
    }

    /// Total number of `listen` calls accepted so far
    pub fn listen_calls(&self) -> usize {
        self.state.lock().listen_calls
    }
}

impl KeyEventSource for InProcessSource {
    fn probe(&self) -> Result<(), SourceError> {
        match &self.unavailable {
            Some(reason) => Err(SourceError::Unavailable(reason.clone())),
            None => Ok(()),
        }
    }

    fn listen(&mut self, target: &Target, kind: EventKind) -> Result<(), SourceError> {
        let mut state = self.state.lock();
        if state.refused.contains(target) {
            return Err(SourceError::ListenFailed {
                target: target.clone(),
                kind,
                reason: "target refused listener".to_string(),
            });
        }
        state.listen_calls += 1;
        state.active.insert(SourceKey::new(target.clone(), kind));
        Ok(())
    }

    fn unlisten(&mut self, target: &Target, kind: EventKind) {
        self.state
            .lock()
            .active
            .remove(&SourceKey::new(target.clone(), kind));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(target: &str, kind: EventKind) -> SourceKey {
        SourceKey::new(Target::from(target), kind)
    }

    #[test]
    fn test_listener_shared_between_dependents() {
        let source = InProcessSource::new();
        let mut shared = SharedSources::new(Box::new(source.clone()));
        let doc = key("document", EventKind::KeyDown);

        shared.acquire(&doc).unwrap();
        shared.acquire(&doc).unwrap();
        assert_eq!(source.listen_calls(), 1);
        assert_eq!(shared.ref_count(&doc), 2);

        shared.release(&doc);
        assert!(source.is_listening("document", EventKind::KeyDown));
        shared.release(&doc);
        assert!(!source.is_listening("document", EventKind::KeyDown));
        assert!(!shared.is_listening(&doc));
    }

    #[test]
    fn test_event_kinds_are_separate_listeners() {
        let source = InProcessSource::new();
        let mut shared = SharedSources::new(Box::new(source.clone()));

        shared.acquire(&key("document", EventKind::KeyDown)).unwrap();
        shared.acquire(&key("document", EventKind::KeyUp)).unwrap();
        assert_eq!(source.active_listeners(), 2);

        shared.release_all();
        assert_eq!(source.active_listeners(), 0);
    }

    #[test]
    fn test_refused_listen_is_not_counted() {
        let source = InProcessSource::new();
        source.refuse_target("canvas");
        let mut shared = SharedSources::new(Box::new(source.clone()));
        let canvas = key("canvas", EventKind::KeyDown);

        let err = shared.acquire(&canvas).unwrap_err();
        assert!(matches!(err, SourceError::ListenFailed { .. }));
        assert!(!shared.is_listening(&canvas));
    }

    #[test]
    fn test_unavailable_probe() {
        let source = InProcessSource::unavailable("no keyboard");
        assert_eq!(
            source.probe(),
            Err(SourceError::Unavailable("no keyboard".to_string()))
        );
        assert!(InProcessSource::new().probe().is_ok());
    }
}
