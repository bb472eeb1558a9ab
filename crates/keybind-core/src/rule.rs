// Keybind Rule Structures
// Registration inputs, their normalized form, and introspection summaries

use std::fmt;
use std::time::Duration;

use crate::combo::{Combination, Trigger};
use crate::context::ContextValue;
use crate::event::{EventKind, KeyPressEvent, Target};
use crate::key::KeyToken;
use crate::modifier::{Modifier, ModifierRequirements};
use crate::sequence::Sequence;
use crate::source::SourceKey;

/// Configuration errors detected at registration time
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuleError {
    #[error("shortcut id cannot be empty")]
    EmptyId,

    #[error("key token cannot be empty")]
    EmptyKey,

    #[error("trigger {index} has an empty key")]
    EmptyTriggerKey { index: usize },

    #[error("combination needs at least one trigger")]
    NoTriggers,

    #[error("sequence needs at least one key")]
    EmptySequence,

    #[error("sequence step {index} has an empty key")]
    EmptySequenceStep { index: usize },
}

/// Raw definition of one trigger: a key plus optional modifier requirements.
///
/// Unset modifier fields mean "don't care"; a trigger with none set only
/// matches when no modifier is held.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TriggerDef {
    pub key: String,
    pub ctrl: Option<bool>,
    pub alt: Option<bool>,
    pub shift: Option<bool>,
    pub meta: Option<bool>,
}

impl TriggerDef {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Self::default()
        }
    }

    pub fn ctrl(mut self, pressed: bool) -> Self {
        self.ctrl = Some(pressed);
        self
    }

    pub fn alt(mut self, pressed: bool) -> Self {
        self.alt = Some(pressed);
        self
    }

    pub fn shift(mut self, pressed: bool) -> Self {
        self.shift = Some(pressed);
        self
    }

    pub fn meta(mut self, pressed: bool) -> Self {
        self.meta = Some(pressed);
        self
    }

    /// Set the requirement for one modifier
    pub fn with(mut self, modifier: Modifier, pressed: bool) -> Self {
        let slot = match modifier {
            Modifier::Ctrl => &mut self.ctrl,
            Modifier::Alt => &mut self.alt,
            Modifier::Shift => &mut self.shift,
            Modifier::Meta => &mut self.meta,
        };
        *slot = Some(pressed);
        self
    }

    fn compile(&self) -> Result<Trigger, RuleError> {
        let key = KeyToken::new(self.key.as_str())?;
        let requirements = ModifierRequirements {
            ctrl: self.ctrl,
            alt: self.alt,
            shift: self.shift,
            meta: self.meta,
        };
        Ok(Trigger::with_requirements(key, requirements))
    }
}

impl From<&str> for TriggerDef {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl From<String> for TriggerDef {
    fn from(key: String) -> Self {
        Self::new(key)
    }
}

/// Trigger definition of a combination rule: one trigger or several
/// alternatives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComboDef {
    One(TriggerDef),
    AnyOf(Vec<TriggerDef>),
}

impl ComboDef {
    pub fn triggers(&self) -> &[TriggerDef] {
        match self {
            ComboDef::One(trigger) => std::slice::from_ref(trigger),
            ComboDef::AnyOf(triggers) => triggers,
        }
    }
}

impl From<TriggerDef> for ComboDef {
    fn from(trigger: TriggerDef) -> Self {
        ComboDef::One(trigger)
    }
}

impl From<&str> for ComboDef {
    fn from(key: &str) -> Self {
        ComboDef::One(TriggerDef::new(key))
    }
}

impl From<Vec<TriggerDef>> for ComboDef {
    fn from(triggers: Vec<TriggerDef>) -> Self {
        ComboDef::AnyOf(triggers)
    }
}

/// What a rule reacts to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleDefinition {
    Combination(ComboDef),
    Sequence {
        keys: Vec<String>,
        timeout: Option<Duration>,
    },
}

/// Kind of a rule, as reported by introspection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleKind {
    Combination,
    Sequence,
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleKind::Combination => write!(f, "combination"),
            RuleKind::Sequence => write!(f, "sequence"),
        }
    }
}

/// Everything needed to register one rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleConfig {
    pub id: String,
    pub definition: RuleDefinition,
    /// Explicit context, or `ContextValue::NONE` for a global rule
    pub context: ContextValue,
    /// Global rules only: fire only while no context is active
    pub strict: bool,
    /// Listening target; the manager's default target when `None`
    pub target: Option<Target>,
    pub event_kind: EventKind,
    pub prevent_default: bool,
    pub description: Option<String>,
}

impl RuleConfig {
    fn with_definition(id: impl Into<String>, definition: RuleDefinition) -> Self {
        Self {
            id: id.into(),
            definition,
            context: ContextValue::NONE,
            strict: false,
            target: None,
            event_kind: EventKind::KeyDown,
            prevent_default: false,
            description: None,
        }
    }

    /// A combination rule
    pub fn combination(id: impl Into<String>, combo: impl Into<ComboDef>) -> Self {
        Self::with_definition(id, RuleDefinition::Combination(combo.into()))
    }

    /// A sequence rule
    pub fn sequence<K: Into<String>>(id: impl Into<String>, keys: impl IntoIterator<Item = K>) -> Self {
        Self::with_definition(
            id,
            RuleDefinition::Sequence {
                keys: keys.into_iter().map(Into::into).collect(),
                timeout: None,
            },
        )
    }

    /// Scope the rule to a context
    pub fn in_context(mut self, context: impl Into<ContextValue>) -> Self {
        self.context = context.into();
        self
    }

    /// Mark a global rule as strict
    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }

    pub fn on_target(mut self, target: impl Into<Target>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn on_event(mut self, kind: EventKind) -> Self {
        self.event_kind = kind;
        self
    }

    pub fn prevent_default(mut self) -> Self {
        self.prevent_default = true;
        self
    }

    pub fn described(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the inter-press timeout; only meaningful for sequence rules
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        match &mut self.definition {
            RuleDefinition::Sequence { timeout: slot, .. } => *slot = Some(timeout),
            RuleDefinition::Combination(_) => {
                log::debug!("timeout ignored for combination shortcut '{}'", self.id);
            }
        }
        self
    }

    pub fn kind(&self) -> RuleKind {
        match self.definition {
            RuleDefinition::Combination(_) => RuleKind::Combination,
            RuleDefinition::Sequence { .. } => RuleKind::Sequence,
        }
    }
}

/// Introspection record for one active rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleSummary {
    pub id: String,
    pub description: Option<String>,
    pub context: ContextValue,
    pub kind: RuleKind,
}

/// Normalized matcher of a rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Matcher {
    Combination(Combination),
    Sequence(Sequence),
}

impl Matcher {
    pub fn kind(&self) -> RuleKind {
        match self {
            Matcher::Combination(_) => RuleKind::Combination,
            Matcher::Sequence(_) => RuleKind::Sequence,
        }
    }
}

impl fmt::Display for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Matcher::Combination(combo) => write!(f, "{}", combo),
            Matcher::Sequence(seq) => write!(f, "{}", seq),
        }
    }
}

/// A validated rule, immutable after registration
#[derive(Debug, Clone)]
pub struct CompiledRule {
    id: String,
    matcher: Matcher,
    context: ContextValue,
    strict: bool,
    target: Target,
    event_kind: EventKind,
    prevent_default: bool,
    description: Option<String>,
}

impl CompiledRule {
    /// Validate and normalize a rule configuration.
    ///
    /// Fails closed: one invalid trigger or step rejects the whole rule.
    pub fn compile(
        config: RuleConfig,
        default_target: &Target,
        default_timeout: Option<Duration>,
    ) -> Result<Self, RuleError> {
        if config.id.is_empty() {
            return Err(RuleError::EmptyId);
        }

        let matcher = match &config.definition {
            RuleDefinition::Combination(combo) => {
                let triggers = combo
                    .triggers()
                    .iter()
                    .enumerate()
                    .map(|(index, def)| {
                        def.compile()
                            .map_err(|_| RuleError::EmptyTriggerKey { index })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Matcher::Combination(Combination::new(triggers)?)
            }
            RuleDefinition::Sequence { keys, timeout } => {
                let tokens = keys
                    .iter()
                    .enumerate()
                    .map(|(index, key)| {
                        KeyToken::new(key.as_str())
                            .map_err(|_| RuleError::EmptySequenceStep { index })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Matcher::Sequence(Sequence::new(tokens, timeout.or(default_timeout))?)
            }
        };

        let strict = if config.strict && !config.context.is_none() {
            log::debug!(
                "strict flag ignored for shortcut '{}' scoped to context {}",
                config.id,
                config.context
            );
            false
        } else {
            config.strict
        };

        Ok(Self {
            matcher,
            context: config.context,
            strict,
            target: config.target.unwrap_or_else(|| default_target.clone()),
            event_kind: config.event_kind,
            prevent_default: config.prevent_default,
            description: config.description,
            id: config.id,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    pub fn kind(&self) -> RuleKind {
        self.matcher.kind()
    }

    pub fn context(&self) -> &ContextValue {
        &self.context
    }

    /// A rule with no explicit context
    pub fn is_global(&self) -> bool {
        self.context.is_none()
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn event_kind(&self) -> EventKind {
        self.event_kind
    }

    pub fn prevents_default(&self) -> bool {
        self.prevent_default
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// The shared listener this rule depends on
    pub fn source_key(&self) -> SourceKey {
        SourceKey::new(self.target.clone(), self.event_kind)
    }

    /// Does this rule listen to the event's target and type?
    pub fn listens_to(&self, event: &KeyPressEvent) -> bool {
        self.event_kind == event.kind() && &self.target == event.target()
    }

    /// Context gate: scoped rules pass only while their context is active,
    /// global rules always pass
    pub fn admits_context(&self, active: &ContextValue) -> bool {
        self.is_global() || &self.context == active
    }

    pub fn summary(&self) -> RuleSummary {
        RuleSummary {
            id: self.id.clone(),
            description: self.description.clone(),
            context: self.context.clone(),
            kind: self.kind(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile(config: RuleConfig) -> Result<CompiledRule, RuleError> {
        CompiledRule::compile(config, &Target::default(), None)
    }

    #[test]
    fn test_compile_combination() {
        let rule = compile(
            RuleConfig::combination("save", TriggerDef::new("s").ctrl(true))
                .in_context("editor")
                .prevent_default()
                .described("Save file"),
        )
        .unwrap();

        assert_eq!(rule.id(), "save");
        assert_eq!(rule.kind(), RuleKind::Combination);
        assert_eq!(rule.context().name(), Some("editor"));
        assert!(rule.prevents_default());
        assert_eq!(rule.description(), Some("Save file"));
        assert_eq!(rule.target().name(), "document");
    }

    #[test]
    fn test_any_invalid_trigger_fails_whole_rule() {
        let result = compile(RuleConfig::combination(
            "broken",
            vec![TriggerDef::new("s").ctrl(true), TriggerDef::new("")],
        ));
        assert_eq!(result.unwrap_err(), RuleError::EmptyTriggerKey { index: 1 });
    }

    #[test]
    fn test_empty_trigger_list() {
        let result = compile(RuleConfig::combination("none", Vec::<TriggerDef>::new()));
        assert_eq!(result.unwrap_err(), RuleError::NoTriggers);
    }

    #[test]
    fn test_empty_sequence() {
        let result = compile(RuleConfig::sequence("seq", Vec::<String>::new()));
        assert_eq!(result.unwrap_err(), RuleError::EmptySequence);

        let result = compile(RuleConfig::sequence("seq", ["g", ""]));
        assert_eq!(result.unwrap_err(), RuleError::EmptySequenceStep { index: 1 });
    }

    #[test]
    fn test_empty_id() {
        let result = compile(RuleConfig::combination("", "a"));
        assert_eq!(result.unwrap_err(), RuleError::EmptyId);
    }

    #[test]
    fn test_default_timeout_applies() {
        let rule = CompiledRule::compile(
            RuleConfig::sequence("seq", ["g", "i"]),
            &Target::default(),
            Some(Duration::from_millis(800)),
        )
        .unwrap();
        match rule.matcher() {
            Matcher::Sequence(seq) => assert_eq!(seq.timeout(), Some(Duration::from_millis(800))),
            other => panic!("unexpected matcher {:?}", other),
        }

        let rule = CompiledRule::compile(
            RuleConfig::sequence("seq", ["g", "i"]).with_timeout(Duration::from_millis(50)),
            &Target::default(),
            Some(Duration::from_millis(800)),
        )
        .unwrap();
        match rule.matcher() {
            Matcher::Sequence(seq) => assert_eq!(seq.timeout(), Some(Duration::from_millis(50))),
            other => panic!("unexpected matcher {:?}", other),
        }
    }

    #[test]
    fn test_strict_only_for_global_rules() {
        let global = compile(RuleConfig::combination("g", "x").strict()).unwrap();
        assert!(global.is_strict());
        let scoped = compile(RuleConfig::combination("s", "x").strict().in_context("a")).unwrap();
        assert!(!scoped.is_strict());
    }

    #[test]
    fn test_context_gate() {
        let scoped = compile(RuleConfig::combination("s", "x").in_context("editor")).unwrap();
        assert!(scoped.admits_context(&ContextValue::named("editor")));
        assert!(!scoped.admits_context(&ContextValue::named("sidebar")));
        assert!(!scoped.admits_context(&ContextValue::NONE));

        let global = compile(RuleConfig::combination("g", "x")).unwrap();
        assert!(global.admits_context(&ContextValue::named("editor")));
        assert!(global.admits_context(&ContextValue::NONE));
    }

    #[test]
    fn test_listens_to() {
        let rule = compile(
            RuleConfig::combination("up", "ArrowUp")
                .on_target("list")
                .on_event(EventKind::KeyUp),
        )
        .unwrap();
        let event = KeyPressEvent::new("ArrowUp").on("list").of_kind(EventKind::KeyUp);
        assert!(rule.listens_to(&event));
        assert!(!rule.listens_to(&KeyPressEvent::new("ArrowUp").on("list")));
        assert!(!rule.listens_to(&KeyPressEvent::new("ArrowUp").of_kind(EventKind::KeyUp)));
    }

    #[test]
    fn test_summary() {
        let rule = compile(RuleConfig::sequence("inbox", ["g", "i"]).described("Go to inbox")).unwrap();
        let summary = rule.summary();
        assert_eq!(summary.id, "inbox");
        assert_eq!(summary.kind, RuleKind::Sequence);
        assert_eq!(summary.description.as_deref(), Some("Go to inbox"));
        assert!(summary.context.is_none());
    }
}
