// Keybind Config API - Shortcut String Parser
// Parses strings like "ctrl+shift+s" and "g -> i" into rule definitions

use crate::modifier::Modifier;
use crate::rule::TriggerDef;

/// Separator between the modifiers and the key of a combination
const COMBO_SEPARATOR: char = '+';

/// Separator between the steps of a sequence
const SEQUENCE_SEPARATOR: &str = "->";

/// Errors that can occur while parsing a shortcut string
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComboParseError {
    /// Empty input string
    EmptyInput,
    /// A part before the key is not a modifier alias
    UnknownModifier(String),
    /// Input ends with a separator (e.g., "ctrl+")
    MissingKey,
    /// One step of a sequence is empty (e.g., "g -> -> i")
    EmptyStep(usize),
    /// A sequence step carries modifiers
    ModifierInSequence(String),
}

impl std::fmt::Display for ComboParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ComboParseError::EmptyInput => write!(f, "shortcut string cannot be empty"),
            ComboParseError::UnknownModifier(name) => write!(f, "unknown modifier: '{}'", name),
            ComboParseError::MissingKey => write!(f, "shortcut string has no key after '+'"),
            ComboParseError::EmptyStep(index) => write!(f, "sequence step {} is empty", index),
            ComboParseError::ModifierInSequence(step) => {
                write!(f, "sequence steps cannot carry modifiers: '{}'", step)
            }
        }
    }
}

impl std::error::Error for ComboParseError {}

/// Parse a combination string like "ctrl+shift+s" into a trigger definition
///
/// Naming at least one modifier pins all four: named modifiers must be held,
/// the others must not. A bare key leaves every modifier unset, which only
/// matches when no modifier is held.
///
/// # Examples
/// ```
/// use keybind_core::config::parse_combination;
/// let trigger = parse_combination("Ctrl+S").unwrap();
/// assert_eq!(trigger.key, "S");
/// assert_eq!(trigger.ctrl, Some(true));
/// assert_eq!(trigger.shift, Some(false));
/// ```
pub fn parse_combination(exp: &str) -> Result<TriggerDef, ComboParseError> {
    let trimmed = exp.trim();
    if trimmed.is_empty() {
        return Err(ComboParseError::EmptyInput);
    }

    let (modifier_part, key_part) = split_key(trimmed)?;
    let key = canonical_key(key_part);

    let mut modifiers = Vec::new();
    if let Some(modifier_part) = modifier_part {
        for alias in modifier_part.split(COMBO_SEPARATOR) {
            let modifier = Modifier::from_alias(alias)
                .ok_or_else(|| ComboParseError::UnknownModifier(alias.trim().to_string()))?;
            if !modifiers.contains(&modifier) {
                modifiers.push(modifier);
            }
        }
    }

    if modifiers.is_empty() {
        return Ok(TriggerDef::new(key));
    }

    Ok(Modifier::ALL
        .into_iter()
        .fold(TriggerDef::new(key), |trigger, modifier| {
            trigger.with(modifier, modifiers.contains(&modifier))
        }))
}

/// Parse a sequence string like "g -> i" into its key tokens
pub fn parse_sequence(exp: &str) -> Result<Vec<String>, ComboParseError> {
    if exp.trim().is_empty() {
        return Err(ComboParseError::EmptyInput);
    }

    exp.split(SEQUENCE_SEPARATOR)
        .enumerate()
        .map(|(index, step)| parse_sequence_step(index, step.trim()))
        .collect()
}

/// Parse one sequence step given on its own (e.g. an entry of a TOML array)
pub fn parse_sequence_step(index: usize, step: &str) -> Result<String, ComboParseError> {
    // A lone space is the space bar, not an empty step
    if step == " " {
        return Ok(step.to_string());
    }
    let trimmed = step.trim();
    if trimmed.is_empty() {
        return Err(ComboParseError::EmptyStep(index));
    }
    if trimmed.len() > 1 && trimmed.contains(COMBO_SEPARATOR) {
        return Err(ComboParseError::ModifierInSequence(trimmed.to_string()));
    }
    Ok(canonical_key(trimmed))
}

/// Split "mods+key" into its modifier part and key part.
///
/// "+" on its own, or as the part after a separator ("ctrl++"), is the plus
/// key.
fn split_key(exp: &str) -> Result<(Option<&str>, &str), ComboParseError> {
    if exp == "+" {
        return Ok((None, exp));
    }
    if let Some(modifiers) = exp.strip_suffix("++") {
        return Ok((Some(modifiers), "+"));
    }
    match exp.rsplit_once(COMBO_SEPARATOR) {
        Some((_, key)) if key.trim().is_empty() => Err(ComboParseError::MissingKey),
        Some((modifiers, key)) => Ok((Some(modifiers), key.trim())),
        None => Ok((None, exp)),
    }
}

/// Map a key name to the identifier key events report.
///
/// Single characters are kept as written. Known aliases of named keys are
/// normalized; any other name is kept verbatim since named keys are matched
/// exactly.
pub fn canonical_key(name: &str) -> String {
    if name.chars().count() == 1 {
        return name.to_string();
    }

    let canonical = match name.to_ascii_lowercase().as_str() {
        "esc" | "escape" => "Escape",
        "space" | "spacebar" => " ",
        "enter" | "return" => "Enter",
        "tab" => "Tab",
        "backspace" | "bksp" => "Backspace",
        "del" | "delete" => "Delete",
        "ins" | "insert" => "Insert",
        "up" | "arrowup" => "ArrowUp",
        "down" | "arrowdown" => "ArrowDown",
        "left" | "arrowleft" => "ArrowLeft",
        "right" | "arrowright" => "ArrowRight",
        "home" => "Home",
        "end" => "End",
        "pageup" | "pgup" => "PageUp",
        "pagedown" | "pgdn" => "PageDown",
        "plus" => "+",
        "minus" => "-",
        lower => return function_key(lower).unwrap_or_else(|| name.to_string()),
    };
    canonical.to_string()
}

/// "f1" ... "f24" -> "F1" ... "F24"
fn function_key(lower: &str) -> Option<String> {
    let number: u8 = lower.strip_prefix('f')?.parse().ok()?;
    (1..=24).contains(&number).then(|| format!("F{}", number))
}
