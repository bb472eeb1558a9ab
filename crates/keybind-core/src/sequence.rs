// Keybind Sequence Matcher
// Ordered key sequences with an optional inter-press timeout
//
// Each subscription to a sequence rule owns one SequenceProgress. The
// progress is advanced by every event that passes the rule's context gate:
//
//   Idle --(next token)--> InProgress --(last token)--> Completed
//     ^                        |                            |
//     +----(mismatch)----------+        (next event) -------+--> Idle
//
// A mismatching key that happens to be the first token re-anchors the
// sequence at length 1 instead of dropping back to Idle. Timeouts are
// checked lazily when the next event arrives.

use std::fmt;
use std::time::{Duration, Instant};

use smallvec::SmallVec;

use crate::event::KeyPressEvent;
use crate::key::KeyToken;
use crate::rule::RuleError;

/// An ordered, non-empty list of key tokens
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sequence {
    tokens: SmallVec<[KeyToken; 4]>,
    timeout: Option<Duration>,
}

impl Sequence {
    /// Create a sequence from its tokens (at least one)
    pub fn new(
        tokens: impl IntoIterator<Item = KeyToken>,
        timeout: Option<Duration>,
    ) -> Result<Self, RuleError> {
        let tokens: SmallVec<[KeyToken; 4]> = tokens.into_iter().collect();
        if tokens.is_empty() {
            return Err(RuleError::EmptySequence);
        }
        Ok(Self { tokens, timeout })
    }

    pub fn tokens(&self) -> &[KeyToken] {
        &self.tokens
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Maximum gap allowed between two matched presses
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Returns true if both sequences list exactly the same tokens in order
    pub fn same_tokens(&self, other: &Sequence) -> bool {
        self.tokens == other.tokens
    }
}

impl fmt::Display for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.tokens.iter().map(|t| t.to_string()).collect();
        write!(f, "{}", parts.join(" -> "))
    }
}

/// Progress flag of one sequence matcher instance
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SequenceState {
    /// No progress (or broken by a mismatch/timeout)
    #[default]
    Idle,
    /// A strict prefix of the sequence has been matched
    InProgress,
    /// The full sequence was matched by the most recent event
    Completed,
}

/// Matching state for one active sequence subscription
#[derive(Debug, Clone, Default)]
pub struct SequenceProgress {
    matched: SmallVec<[KeyPressEvent; 4]>,
    last_match: Option<Instant>,
    state: SequenceState,
}

impl SequenceProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SequenceState {
        self.state
    }

    /// Events matched so far, in order
    pub fn matched(&self) -> &[KeyPressEvent] {
        &self.matched
    }

    /// Timestamp of the most recent matched event
    pub fn last_match(&self) -> Option<Instant> {
        self.last_match
    }

    /// Drop all progress
    pub fn reset(&mut self) {
        self.matched.clear();
        self.last_match = None;
        self.state = SequenceState::Idle;
    }

    /// Feed one event into the state machine.
    ///
    /// Returns the completing event when this event finishes the sequence.
    pub fn advance(&mut self, sequence: &Sequence, event: &KeyPressEvent) -> Option<&KeyPressEvent> {
        if self.state == SequenceState::Completed {
            self.reset();
        }

        if let (Some(timeout), Some(last)) = (sequence.timeout(), self.last_match) {
            if event.timestamp().saturating_duration_since(last) > timeout {
                self.reset();
            }
        }

        let tokens = sequence.tokens();
        let next = self.matched.len();

        if tokens[next].matches(event.key()) {
            self.push(event);
        } else if tokens[0].matches(event.key()) {
            self.matched.clear();
            self.push(event);
        } else {
            self.reset();
            return None;
        }

        if self.matched.len() == tokens.len() {
            self.state = SequenceState::Completed;
            self.matched.last()
        } else {
            self.state = SequenceState::InProgress;
            None
        }
    }

    fn push(&mut self, event: &KeyPressEvent) {
        self.matched.push(event.clone());
        self.last_match = Some(event.timestamp());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sequence(keys: &[&str], timeout: Option<Duration>) -> Sequence {
        Sequence::new(keys.iter().map(|k| KeyToken::new(*k).unwrap()), timeout).unwrap()
    }

    /// Feed keys one after another and count completions
    fn feed(progress: &mut SequenceProgress, seq: &Sequence, keys: &[&str]) -> usize {
        keys.iter()
            .filter(|k| progress.advance(seq, &KeyPressEvent::new(**k)).is_some())
            .count()
    }

    #[test]
    fn test_simple_sequence() {
        let seq = sequence(&["g", "i"], None);
        let mut progress = SequenceProgress::new();

        assert!(progress.advance(&seq, &KeyPressEvent::new("g")).is_none());
        assert_eq!(progress.state(), SequenceState::InProgress);
        let done = progress.advance(&seq, &KeyPressEvent::new("i")).cloned();
        assert_eq!(done.map(|e| e.key().to_string()), Some("i".to_string()));
        assert_eq!(progress.state(), SequenceState::Completed);
    }

    #[test]
    fn test_reanchor_after_mismatch() {
        let seq = sequence(&["k1", "k2", "k3"], None);
        let mut progress = SequenceProgress::new();
        assert_eq!(feed(&mut progress, &seq, &["k1", "k9", "k1", "k2", "k3"]), 1);
    }

    #[test]
    fn test_broken_sequence_never_completes() {
        let seq = sequence(&["k1", "k2", "k3"], None);
        let mut progress = SequenceProgress::new();
        assert_eq!(feed(&mut progress, &seq, &["k1", "k2", "k9"]), 0);
        assert_eq!(progress.state(), SequenceState::Idle);
        assert!(progress.matched().is_empty());
    }

    #[test]
    fn test_repeated_first_key_restarts() {
        let seq = sequence(&["g", "g", "i"], None);
        let mut progress = SequenceProgress::new();
        // g g g i: third g does not match "i" but restarts at length 1,
        // so this does not complete
        assert_eq!(feed(&mut progress, &seq, &["g", "g", "g", "i"]), 0);
        assert_eq!(feed(&mut progress, &seq, &["g", "g", "i"]), 1);
    }

    #[test]
    fn test_restart_immediately_after_completion() {
        let seq = sequence(&["a", "b"], None);
        let mut progress = SequenceProgress::new();
        assert_eq!(feed(&mut progress, &seq, &["a", "b", "a", "b"]), 2);
    }

    #[test]
    fn test_single_token_sequence() {
        let seq = sequence(&["x"], None);
        let mut progress = SequenceProgress::new();
        assert_eq!(feed(&mut progress, &seq, &["x", "y", "x", "x"]), 3);
    }

    #[test]
    fn test_case_insensitive_steps() {
        let seq = sequence(&["g", "I"], None);
        let mut progress = SequenceProgress::new();
        assert_eq!(feed(&mut progress, &seq, &["G", "i"]), 1);
    }

    #[test]
    fn test_timeout_exceeded() {
        let seq = sequence(&["a", "b"], Some(Duration::from_millis(100)));
        let mut progress = SequenceProgress::new();
        let t0 = Instant::now();

        assert!(progress.advance(&seq, &KeyPressEvent::new("a").at(t0)).is_none());
        let late = KeyPressEvent::new("b").at(t0 + Duration::from_millis(150));
        assert!(progress.advance(&seq, &late).is_none());
        assert_eq!(progress.state(), SequenceState::Idle);
    }

    #[test]
    fn test_timeout_within_window() {
        let seq = sequence(&["a", "b"], Some(Duration::from_millis(100)));
        let mut progress = SequenceProgress::new();
        let t0 = Instant::now();

        assert!(progress.advance(&seq, &KeyPressEvent::new("a").at(t0)).is_none());
        let quick = KeyPressEvent::new("b").at(t0 + Duration::from_millis(90));
        assert!(progress.advance(&seq, &quick).is_some());
    }

    #[test]
    fn test_timeout_reset_then_reanchor() {
        let seq = sequence(&["a", "b"], Some(Duration::from_millis(100)));
        let mut progress = SequenceProgress::new();
        let t0 = Instant::now();

        progress.advance(&seq, &KeyPressEvent::new("a").at(t0));
        // Late "a" resets, then anchors a fresh attempt
        progress.advance(&seq, &KeyPressEvent::new("a").at(t0 + Duration::from_millis(500)));
        assert_eq!(progress.state(), SequenceState::InProgress);
        let b = KeyPressEvent::new("b").at(t0 + Duration::from_millis(550));
        assert!(progress.advance(&seq, &b).is_some());
    }

    #[test]
    fn test_empty_sequence_rejected() {
        assert_eq!(Sequence::new(Vec::new(), None), Err(RuleError::EmptySequence));
    }

    #[test]
    fn test_same_tokens_is_exact() {
        let a = sequence(&["g", "i"], None);
        let b = sequence(&["g", "i"], Some(Duration::from_millis(10)));
        let c = sequence(&["G", "i"], None);
        assert!(a.same_tokens(&b));
        assert!(!a.same_tokens(&c));
        assert_eq!(a.to_string(), "g -> i");
    }
}
