// Keybind Registry
// Active rules keyed by id, in registration order

use indexmap::IndexMap;

use crate::rule::{CompiledRule, RuleSummary};
use crate::stream::RuleStream;

/// One registered rule and the stream it feeds
#[derive(Debug, Clone)]
pub(crate) struct RegistryEntry {
    pub(crate) rule: CompiledRule,
    pub(crate) stream: RuleStream,
}

/// Id → rule map.
///
/// Iteration order is dispatch order. Re-registering an id moves it to the
/// end, as if the old rule had been removed first.
#[derive(Debug, Default)]
pub(crate) struct Registry {
    entries: IndexMap<String, RegistryEntry>,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Install an entry, returning the one it replaced
    pub(crate) fn insert(&mut self, entry: RegistryEntry) -> Option<RegistryEntry> {
        let id = entry.rule.id().to_string();
        let previous = self.entries.shift_remove(&id);
        self.entries.insert(id, entry);
        previous
    }

    pub(crate) fn remove(&mut self, id: &str) -> Option<RegistryEntry> {
        self.entries.shift_remove(id)
    }

    pub(crate) fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub(crate) fn get(&self, id: &str) -> Option<&RegistryEntry> {
        self.entries.get(id)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &RegistryEntry> {
        self.entries.values()
    }

    pub(crate) fn rules(&self) -> impl Iterator<Item = &CompiledRule> {
        self.entries.values().map(|entry| &entry.rule)
    }

    pub(crate) fn summaries(&self) -> Vec<RuleSummary> {
        self.rules().map(CompiledRule::summary).collect()
    }

    /// Empty the registry, handing back every entry in order
    pub(crate) fn drain(&mut self) -> Vec<RegistryEntry> {
        self.entries.drain(..).map(|(_, entry)| entry).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Target;
    use crate::rule::{RuleConfig, RuleKind};

    fn entry(config: RuleConfig) -> RegistryEntry {
        let rule = CompiledRule::compile(config, &Target::default(), None).unwrap();
        let stream = RuleStream::new(rule.id());
        RegistryEntry { rule, stream }
    }

    fn ids(registry: &Registry) -> Vec<String> {
        registry.rules().map(|r| r.id().to_string()).collect()
    }

    #[test]
    fn test_insert_and_lookup() {
        let mut registry = Registry::new();
        assert_eq!(registry.len(), 0);
        assert!(registry.insert(entry(RuleConfig::combination("a", "a"))).is_none());
        assert!(registry.contains("a"));
        assert!(!registry.contains("b"));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("a").map(|e| e.rule.kind()), Some(RuleKind::Combination));
    }

    #[test]
    fn test_overwrite_moves_to_end() {
        let mut registry = Registry::new();
        registry.insert(entry(RuleConfig::combination("a", "a")));
        registry.insert(entry(RuleConfig::combination("b", "b")));

        let previous = registry.insert(entry(RuleConfig::sequence("a", ["x", "y"])));
        assert_eq!(previous.map(|e| e.rule.kind()), Some(RuleKind::Combination));
        assert_eq!(ids(&registry), vec!["b", "a"]);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_remove_keeps_order() {
        let mut registry = Registry::new();
        for id in ["a", "b", "c"] {
            registry.insert(entry(RuleConfig::combination(id, id)));
        }
        assert!(registry.remove("b").is_some());
        assert!(registry.remove("b").is_none());
        assert_eq!(ids(&registry), vec!["a", "c"]);
    }

    #[test]
    fn test_summaries_and_drain() {
        let mut registry = Registry::new();
        registry.insert(entry(RuleConfig::combination("save", "s").in_context("editor")));
        registry.insert(entry(RuleConfig::sequence("inbox", ["g", "i"]).described("Go to inbox")));

        let summaries = registry.summaries();
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].context.name(), Some("editor"));
        assert_eq!(summaries[1].description.as_deref(), Some("Go to inbox"));

        let drained = registry.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(registry.len(), 0);
    }
}
