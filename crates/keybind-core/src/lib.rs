// Keybind Core Library
// Keyboard shortcut matching: combinations, sequences and context scoping

pub mod combo;
pub mod config;
pub mod context;
pub mod event;
pub mod key;
pub mod manager;
pub mod modifier;
mod priority;
mod registry;
pub mod rule;
pub mod sequence;
pub mod source;
pub mod stream;

pub use combo::{Combination, Trigger};
pub use config::{parse_combination, parse_sequence, ComboParseError};
pub use context::{ContextOverride, ContextResolver, ContextRestore, ContextSubscription, ContextValue};
pub use event::{EventKind, KeyPressEvent, Target};
pub use key::{key_matches, KeyToken};
pub use manager::{ManagerError, ManagerOptions, ManagerResult, RegisterError, ShortcutManager};
pub use modifier::{Modifier, ModifierRequirements, Modifiers};
pub use rule::{ComboDef, CompiledRule, Matcher, RuleConfig, RuleDefinition, RuleError, RuleKind, RuleSummary, TriggerDef};
pub use sequence::{Sequence, SequenceProgress, SequenceState};
pub use source::{InProcessSource, KeyEventSource, SourceError, SourceKey};
pub use stream::{Observer, RuleStream, Subscription};

#[cfg(feature = "config")]
pub use config::{Config, ConfigError};
