// Keybind Modifier System
// Modifier flags carried by key events and the requirements rules place on them

use std::fmt;

/// One of the four modifier keys a key event reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Modifier {
    Ctrl,
    Alt,
    Shift,
    Meta,
}

impl Modifier {
    /// All modifiers, in canonical display order
    pub const ALL: [Modifier; 4] = [Modifier::Ctrl, Modifier::Alt, Modifier::Shift, Modifier::Meta];

    /// Look up a modifier by one of its aliases (case-insensitive)
    ///
    /// Recognized: `ctrl`/`control`, `alt`/`opt`/`option`, `shift`,
    /// `meta`/`cmd`/`command`/`super`/`win`.
    pub fn from_alias(alias: &str) -> Option<Modifier> {
        match alias.trim().to_ascii_lowercase().as_str() {
            "ctrl" | "control" => Some(Modifier::Ctrl),
            "alt" | "opt" | "option" => Some(Modifier::Alt),
            "shift" => Some(Modifier::Shift),
            "meta" | "cmd" | "command" | "super" | "win" => Some(Modifier::Meta),
            _ => None,
        }
    }

    /// Primary alias used when displaying combinations
    pub fn primary_alias(self) -> &'static str {
        match self {
            Modifier::Ctrl => "Ctrl",
            Modifier::Alt => "Alt",
            Modifier::Shift => "Shift",
            Modifier::Meta => "Meta",
        }
    }
}

impl fmt::Display for Modifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.primary_alias())
    }
}

/// Modifier state reported by a key event
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Modifiers {
    pub ctrl: bool,
    pub alt: bool,
    pub shift: bool,
    pub meta: bool,
}

impl Modifiers {
    /// No modifiers held
    pub const NONE: Modifiers = Modifiers {
        ctrl: false,
        alt: false,
        shift: false,
        meta: false,
    };

    /// Build a modifier state from the modifiers that are held
    pub fn held(modifiers: impl IntoIterator<Item = Modifier>) -> Self {
        modifiers
            .into_iter()
            .fold(Self::NONE, |acc, m| acc.with(m))
    }

    /// Return a copy with `modifier` held
    pub fn with(mut self, modifier: Modifier) -> Self {
        self.set(modifier, true);
        self
    }

    /// Get the state of one modifier
    pub fn get(&self, modifier: Modifier) -> bool {
        match modifier {
            Modifier::Ctrl => self.ctrl,
            Modifier::Alt => self.alt,
            Modifier::Shift => self.shift,
            Modifier::Meta => self.meta,
        }
    }

    /// Set the state of one modifier
    pub fn set(&mut self, modifier: Modifier, pressed: bool) {
        match modifier {
            Modifier::Ctrl => self.ctrl = pressed,
            Modifier::Alt => self.alt = pressed,
            Modifier::Shift => self.shift = pressed,
            Modifier::Meta => self.meta = pressed,
        }
    }

    /// Returns true if no modifier is held
    pub fn is_empty(&self) -> bool {
        !(self.ctrl || self.alt || self.shift || self.meta)
    }
}

/// Modifier requirements of one trigger.
///
/// Each field is `None` for "don't care", or the exact state the event must
/// report. A trigger with no requirement set at all only accepts events with
/// every modifier released: a bare key means "only this key".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ModifierRequirements {
    pub ctrl: Option<bool>,
    pub alt: Option<bool>,
    pub shift: Option<bool>,
    pub meta: Option<bool>,
}

impl ModifierRequirements {
    /// Get the requirement for one modifier
    pub fn get(&self, modifier: Modifier) -> Option<bool> {
        match modifier {
            Modifier::Ctrl => self.ctrl,
            Modifier::Alt => self.alt,
            Modifier::Shift => self.shift,
            Modifier::Meta => self.meta,
        }
    }

    /// Set the requirement for one modifier
    pub fn require(&mut self, modifier: Modifier, pressed: bool) {
        let slot = match modifier {
            Modifier::Ctrl => &mut self.ctrl,
            Modifier::Alt => &mut self.alt,
            Modifier::Shift => &mut self.shift,
            Modifier::Meta => &mut self.meta,
        };
        *slot = Some(pressed);
    }

    /// Returns true if no requirement is set
    pub fn is_unconstrained(&self) -> bool {
        Modifier::ALL.iter().all(|m| self.get(*m).is_none())
    }

    /// Check an event's modifier state against these requirements
    pub fn satisfied_by(&self, modifiers: &Modifiers) -> bool {
        if self.is_unconstrained() {
            return modifiers.is_empty();
        }
        Modifier::ALL.iter().all(|m| match self.get(*m) {
            Some(required) => modifiers.get(*m) == required,
            None => true,
        })
    }
}

impl fmt::Display for ModifierRequirements {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let held: Vec<&str> = Modifier::ALL
            .iter()
            .filter(|m| self.get(**m) == Some(true))
            .map(|m| m.primary_alias())
            .collect();
        write!(f, "{}", held.join("+"))
    }
}
