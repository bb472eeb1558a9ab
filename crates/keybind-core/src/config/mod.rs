// Keybind Config API
// Shortcut string parsing and TOML shortcut files

pub mod combo_parser;

#[cfg(feature = "config")]
pub mod parser;

pub use combo_parser::{
    canonical_key, parse_combination, parse_sequence, parse_sequence_step, ComboParseError,
};

#[cfg(feature = "config")]
pub use parser::{Config, ConfigError, ConfigToml, ManagerToml, ShortcutToml, StringOrList};
