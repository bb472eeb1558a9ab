// Keybind Config Parser - TOML with Serde
// Loads shortcut definitions and manager options from TOML files

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use super::combo_parser::{
    parse_combination, parse_sequence, parse_sequence_step, ComboParseError,
};
use crate::context::ContextValue;
use crate::event::{EventKind, Target};
use crate::manager::{ManagerOptions, ShortcutManager};
use crate::rule::{ComboDef, CompiledRule, RuleConfig, RuleDefinition, RuleError};
use crate::stream::RuleStream;

/// Configuration parser errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(String),

    #[error("shortcut '{id}': {source}")]
    InvalidShortcut {
        id: String,
        #[source]
        source: ComboParseError,
    },

    #[error("shortcut '{id}': {source}")]
    InvalidRule {
        id: String,
        #[source]
        source: RuleError,
    },

    #[error("shortcut '{0}' needs either `keys` or `sequence`")]
    MissingTrigger(String),

    #[error("shortcut '{0}' cannot set both `keys` and `sequence`")]
    ConflictingTrigger(String),
}

/// Root TOML table
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigToml {
    /// Manager options
    #[serde(default)]
    pub manager: ManagerToml,

    /// Shortcut definitions, in registration order
    #[serde(default)]
    pub shortcut: Vec<ShortcutToml>,
}

/// `[manager]` table
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ManagerToml {
    /// Base context; no context when absent
    pub initial_context: Option<String>,
    /// Target used by shortcuts that do not name one
    pub default_target: Option<String>,
    /// Sequence timeout for shortcuts that do not set one (milliseconds)
    pub sequence_timeout_ms: Option<u64>,
}

/// One `[[shortcut]]` entry
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ShortcutToml {
    pub id: String,
    /// Combination: one shortcut string or a list of alternatives
    pub keys: Option<StringOrList>,
    /// Sequence: "g -> i" or a list of keys
    pub sequence: Option<StringOrList>,
    pub context: Option<String>,
    #[serde(default)]
    pub strict: bool,
    pub target: Option<String>,
    pub event: Option<EventKind>,
    #[serde(default)]
    pub prevent_default: bool,
    pub description: Option<String>,
    /// Sequence timeout (milliseconds)
    pub timeout_ms: Option<u64>,
}

/// A single string or a list of strings
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum StringOrList {
    Single(String),
    Multiple(Vec<String>),
}

/// Loaded shortcut configuration
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Options for the manager these shortcuts are registered with
    pub options: ManagerOptions,
    /// Validated shortcut definitions, in file order
    pub shortcuts: Vec<RuleConfig>,
}

impl Config {
    /// Default config location: `<config_dir>/keybind/shortcuts.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("keybind").join("shortcuts.toml"))
    }

    /// Parse a TOML configuration file
    pub fn from_toml_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let toml_config: ConfigToml =
            toml::from_str(content).map_err(|e| ConfigError::TomlParse(e.to_string()))?;
        toml_config.to_config()
    }

    /// Register every shortcut, returning their streams in file order
    pub fn register_all(&self, manager: &ShortcutManager) -> Vec<RuleStream> {
        self.shortcuts
            .iter()
            .map(|shortcut| manager.register(shortcut.clone()))
            .collect()
    }
}

impl ConfigToml {
    fn to_config(&self) -> Result<Config, ConfigError> {
        let options = self.manager.to_options();
        let shortcuts = self
            .shortcut
            .iter()
            .map(|entry| {
                let config = entry.to_rule_config()?;
                // Validate now so a bad file fails to load instead of
                // producing inert shortcuts later
                CompiledRule::compile(
                    config.clone(),
                    &options.default_target,
                    options.default_sequence_timeout,
                )
                .map_err(|source| ConfigError::InvalidRule {
                    id: entry.id.clone(),
                    source,
                })?;
                Ok(config)
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        log::debug!("loaded {} shortcut(s) from config", shortcuts.len());
        Ok(Config { options, shortcuts })
    }
}

impl ManagerToml {
    fn to_options(&self) -> ManagerOptions {
        let defaults = ManagerOptions::default();
        ManagerOptions {
            initial_context: ContextValue::from(self.initial_context.clone()),
            default_target: self
                .default_target
                .as_deref()
                .map(Target::new)
                .unwrap_or(defaults.default_target),
            default_sequence_timeout: self.sequence_timeout_ms.map(Duration::from_millis),
        }
    }
}

impl ShortcutToml {
    fn to_rule_config(&self) -> Result<RuleConfig, ConfigError> {
        let invalid = |source: ComboParseError| ConfigError::InvalidShortcut {
            id: self.id.clone(),
            source,
        };

        let definition = match (&self.keys, &self.sequence) {
            (Some(_), Some(_)) => return Err(ConfigError::ConflictingTrigger(self.id.clone())),
            (None, None) => return Err(ConfigError::MissingTrigger(self.id.clone())),
            (Some(StringOrList::Single(keys)), None) => {
                RuleDefinition::Combination(ComboDef::One(parse_combination(keys).map_err(invalid)?))
            }
            (Some(StringOrList::Multiple(alternatives)), None) => {
                let triggers = alternatives
                    .iter()
                    .map(|keys| parse_combination(keys))
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(invalid)?;
                RuleDefinition::Combination(ComboDef::AnyOf(triggers))
            }
            (None, Some(StringOrList::Single(sequence))) => RuleDefinition::Sequence {
                keys: parse_sequence(sequence).map_err(invalid)?,
                timeout: None,
            },
            (None, Some(StringOrList::Multiple(steps))) => RuleDefinition::Sequence {
                keys: steps
                    .iter()
                    .enumerate()
                    .map(|(index, step)| parse_sequence_step(index, step))
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(invalid)?,
                timeout: None,
            },
        };

        let mut config = RuleConfig {
            id: self.id.clone(),
            definition,
            context: ContextValue::from(self.context.clone()),
            strict: self.strict,
            target: self.target.as_deref().map(Target::new),
            event_kind: self.event.unwrap_or_default(),
            prevent_default: self.prevent_default,
            description: self.description.clone(),
        };
        if let Some(ms) = self.timeout_ms {
            config = config.with_timeout(Duration::from_millis(ms));
        }
        Ok(config)
    }
}
