// Keybind Key Type
// Canonical key tokens and the key matcher

use std::fmt;

use crate::rule::RuleError;

/// A canonical string identifying one key.
///
/// Either a single character (`"a"`, `"/"`, `" "`) which is compared
/// case-insensitively, or a named key (`"Escape"`, `"ArrowUp"`) which must
/// match the event's key identifier exactly. A token is never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyToken(String);

impl KeyToken {
    /// Create a key token, rejecting the empty string
    pub fn new(token: impl Into<String>) -> Result<Self, RuleError> {
        let token = token.into();
        if token.is_empty() {
            return Err(RuleError::EmptyKey);
        }
        Ok(Self(token))
    }

    /// Get the token as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if this token is a single character
    pub fn is_single_char(&self) -> bool {
        is_single_char(&self.0)
    }

    /// Check whether an event key identifier satisfies this token
    pub fn matches(&self, event_key: &str) -> bool {
        key_matches(event_key, &self.0)
    }
}

impl fmt::Display for KeyToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.as_str() {
            " " => write!(f, "Space"),
            other => write!(f, "{}", other),
        }
    }
}

impl AsRef<str> for KeyToken {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Does a raw event key identifier satisfy a configured key token?
///
/// Single characters on both sides compare case-insensitively, since letter
/// keys report a different case depending on Shift. Anything else must be an
/// exact match: named keys always report one canonical spelling.
pub fn key_matches(event_key: &str, token: &str) -> bool {
    if is_single_char(token) && is_single_char(event_key) {
        return event_key == token || event_key.to_lowercase() == token.to_lowercase();
    }
    event_key == token
}

#[inline]
fn is_single_char(s: &str) -> bool {
    let mut chars = s.chars();
    chars.next().is_some() && chars.next().is_none()
}
