// Keybind Priority Filter
// Decides whether a matching global rule may fire in the active context
//
// Scoped rules never reach this filter: their context gate already decided.
// A global rule is shadowed by another rule of the same kind that is scoped
// to the active context, listens on the same target and event type, and
// reacts to the same gesture. For combinations the
// competitor only has to match the event; for sequences it must list the
// exact same ordered tokens.

use crate::context::ContextValue;
use crate::event::KeyPressEvent;
use crate::rule::{CompiledRule, Matcher};

/// Returns true if `candidate` may emit for `event` under `active`.
///
/// `rules` is every currently registered rule; `candidate` itself may be part
/// of it.
pub(crate) fn admits<'a>(
    candidate: &CompiledRule,
    event: &KeyPressEvent,
    active: &ContextValue,
    rules: impl IntoIterator<Item = &'a CompiledRule>,
) -> bool {
    if !candidate.is_global() {
        return true;
    }

    if candidate.is_strict() {
        return active.is_none();
    }

    // Global rules have nothing to compete with outside a named context
    if active.is_none() {
        return true;
    }

    let shadowed_by = rules
        .into_iter()
        .filter(|other| other.id() != candidate.id())
        .filter(|other| other.kind() == candidate.kind())
        .filter(|other| other.context() == active)
        .filter(|other| {
            other.event_kind() == candidate.event_kind() && other.target() == candidate.target()
        })
        .find(|other| shadows(candidate.matcher(), other.matcher(), event));

    match shadowed_by {
        Some(other) => {
            log::trace!(
                "global shortcut '{}' suppressed by '{}' in context {}",
                candidate.id(),
                other.id(),
                active
            );
            false
        }
        None => true,
    }
}

fn shadows(candidate: &Matcher, other: &Matcher, event: &KeyPressEvent) -> bool {
    match (candidate, other) {
        (Matcher::Combination(_), Matcher::Combination(combo)) => combo.matches(event),
        (Matcher::Sequence(mine), Matcher::Sequence(theirs)) => mine.same_tokens(theirs),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventKind, Target};
    use crate::modifier::{Modifier, Modifiers};
    use crate::rule::{RuleConfig, TriggerDef};

    fn compile(config: RuleConfig) -> CompiledRule {
        CompiledRule::compile(config, &Target::default(), None).unwrap()
    }

    fn editor() -> ContextValue {
        ContextValue::named("editor")
    }

    #[test]
    fn test_scoped_rules_always_pass() {
        let scoped = compile(RuleConfig::combination("save", "s").in_context("editor"));
        let event = KeyPressEvent::new("s");
        assert!(admits(&scoped, &event, &ContextValue::named("other"), [&scoped]));
    }

    #[test]
    fn test_global_suppressed_by_matching_scoped_combination() {
        let global = compile(RuleConfig::combination("global-save", TriggerDef::new("s").ctrl(true)));
        let scoped = compile(
            RuleConfig::combination("editor-save", TriggerDef::new("s").ctrl(true)).in_context("editor"),
        );
        let rules = [global.clone(), scoped];
        let event = KeyPressEvent::new("s").with_modifiers(Modifiers::held([Modifier::Ctrl]));

        assert!(!admits(&global, &event, &editor(), &rules));
        assert!(admits(&global, &event, &ContextValue::NONE, &rules));
        assert!(admits(&global, &event, &ContextValue::named("sidebar"), &rules));
    }

    #[test]
    fn test_combination_competitor_must_match_event() {
        let global = compile(RuleConfig::combination("g", vec![TriggerDef::new("a"), TriggerDef::new("b")]));
        let scoped = compile(RuleConfig::combination("s", "b").in_context("editor"));
        let rules = [global.clone(), scoped];

        // Alternatives are compared per event, not as whole definitions
        assert!(admits(&global, &KeyPressEvent::new("a"), &editor(), &rules));
        assert!(!admits(&global, &KeyPressEvent::new("b"), &editor(), &rules));
    }

    #[test]
    fn test_sequence_competitor_needs_identical_tokens() {
        let global = compile(RuleConfig::sequence("g", ["g", "i"]));
        let prefix = compile(RuleConfig::sequence("p", ["x", "g", "i"]).in_context("editor"));
        let event = KeyPressEvent::new("i");

        assert!(admits(&global, &event, &editor(), [&global, &prefix]));

        let same = compile(RuleConfig::sequence("s", ["g", "i"]).in_context("editor"));
        assert!(!admits(&global, &event, &editor(), [&global, &prefix, &same]));
    }

    #[test]
    fn test_kinds_do_not_compete() {
        let global = compile(RuleConfig::combination("g", "i"));
        let scoped = compile(RuleConfig::sequence("s", ["i"]).in_context("editor"));
        assert!(admits(&global, &KeyPressEvent::new("i"), &editor(), [&global, &scoped]));
    }

    #[test]
    fn test_competitor_must_share_target_and_event() {
        let global = compile(RuleConfig::combination("g", "s"));
        let keyup = compile(
            RuleConfig::combination("u", "s")
                .in_context("editor")
                .on_event(EventKind::KeyUp),
        );
        let panel = compile(RuleConfig::combination("p", "s").in_context("editor").on_target("panel"));
        let event = KeyPressEvent::new("s");

        assert!(admits(&global, &event, &editor(), [&global, &keyup, &panel]));

        let same = compile(RuleConfig::combination("e", "s").in_context("editor"));
        assert!(!admits(&global, &event, &editor(), [&global, &keyup, &panel, &same]));
    }

    #[test]
    fn test_strict_rule_needs_no_context() {
        let strict = compile(RuleConfig::combination("help", "?").strict());
        let event = KeyPressEvent::new("?");
        assert!(admits(&strict, &event, &ContextValue::NONE, [&strict]));
        assert!(!admits(&strict, &event, &ContextValue::named("quiet"), [&strict]));
    }

    #[test]
    fn test_rule_never_shadows_itself() {
        let global = compile(RuleConfig::combination("g", "x"));
        assert!(admits(&global, &KeyPressEvent::new("x"), &editor(), [&global]));
    }
}
