// Keybind Input Layer - Key Events
// Key-press notifications delivered by the platform, plus target and event-type identifiers

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

use serde::Deserialize;

use crate::modifier::Modifiers;

/// Which platform notification a rule listens to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    #[default]
    KeyDown,
    KeyUp,
}

impl EventKind {
    /// Platform name of this event type
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::KeyDown => "keydown",
            EventKind::KeyUp => "keyup",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "keydown" => Ok(EventKind::KeyDown),
            "keyup" => Ok(EventKind::KeyUp),
            other => Err(format!("unknown event type '{}'", other)),
        }
    }
}

/// Identifier of a listening target (a window, a document, a widget).
///
/// Cheap to clone; compared by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Target(Arc<str>);

impl Target {
    /// Name of the default listening target
    pub const DEFAULT_NAME: &'static str = "document";

    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl Default for Target {
    fn default() -> Self {
        Self::new(Self::DEFAULT_NAME)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Target {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for Target {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

/// One key-press notification.
///
/// Read-only to the matching pipeline except for the default-action
/// suppression flag, which matching rules may set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPressEvent {
    key: String,
    modifiers: Modifiers,
    target: Target,
    kind: EventKind,
    timestamp: Instant,
    default_prevented: bool,
}

impl KeyPressEvent {
    /// Create a keydown event on the default target, stamped now
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            modifiers: Modifiers::NONE,
            target: Target::default(),
            kind: EventKind::KeyDown,
            timestamp: Instant::now(),
            default_prevented: false,
        }
    }

    /// Set the modifier state
    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    /// Set the originating target
    pub fn on(mut self, target: impl Into<Target>) -> Self {
        self.target = target.into();
        self
    }

    /// Set the event type
    pub fn of_kind(mut self, kind: EventKind) -> Self {
        self.kind = kind;
        self
    }

    /// Set the timestamp
    pub fn at(mut self, timestamp: Instant) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn modifiers(&self) -> &Modifiers {
        &self.modifiers
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    pub fn timestamp(&self) -> Instant {
        self.timestamp
    }

    /// Returns true once some rule has suppressed the default action
    pub fn default_prevented(&self) -> bool {
        self.default_prevented
    }

    /// Suppress the default action.
    ///
    /// Returns false if it was already suppressed; the flag is only ever set
    /// once.
    pub fn prevent_default(&mut self) -> bool {
        if self.default_prevented {
            return false;
        }
        self.default_prevented = true;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modifier::Modifier;

    #[test]
    fn test_event_defaults() {
        let event = KeyPressEvent::new("a");
        assert_eq!(event.key(), "a");
        assert!(event.modifiers().is_empty());
        assert_eq!(event.target().name(), "document");
        assert_eq!(event.kind(), EventKind::KeyDown);
        assert!(!event.default_prevented());
    }

    #[test]
    fn test_event_builder() {
        let event = KeyPressEvent::new("Enter")
            .with_modifiers(Modifiers::held([Modifier::Alt]))
            .on("sidebar")
            .of_kind(EventKind::KeyUp);
        assert!(event.modifiers().alt);
        assert_eq!(event.target(), &Target::from("sidebar"));
        assert_eq!(event.kind(), EventKind::KeyUp);
    }

    #[test]
    fn test_prevent_default_once() {
        let mut event = KeyPressEvent::new("s");
        assert!(event.prevent_default());
        assert!(!event.prevent_default());
        assert!(event.default_prevented());
    }

    #[test]
    fn test_event_kind_parse() {
        assert_eq!("keydown".parse::<EventKind>(), Ok(EventKind::KeyDown));
        assert_eq!("KeyUp".parse::<EventKind>(), Ok(EventKind::KeyUp));
        assert!("keypress".parse::<EventKind>().is_err());
        assert_eq!(EventKind::KeyUp.to_string(), "keyup");
    }
}
