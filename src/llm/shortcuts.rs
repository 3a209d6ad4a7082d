//! Canned answers for identity and provenance questions
//!
//! Matching is a case-insensitive substring test against the user's
//! utterance. Rules are checked in order and the first hit wins.

use serde::{Deserialize, Serialize};

/// Reply given to founder questions
pub const FOUNDER_REPLY: &str = "My founder is Muhammad Bilal Hussain.";

/// Reply given to creator questions
pub const CREATOR_REPLY: &str = "Muhammad Bilal Hussain";

const FOUNDER_PATTERNS: &[&str] = &["who is your founder", "who is ur founder"];

const CREATOR_PATTERNS: &[&str] = &[
    "who created you",
    "who is your developer",
    "who built you",
    "who is the maker of this ai",
    "who is your creator",
    "who is behind your creation",
    "what is your origin",
    "who made you",
    "who is ur creator",
    "who made u",
    "who is ur developer",
    "who built u",
    "who is ur maker",
    "किसने तुम्हें बनाया",
    "आपका निर्माता कौन है",
    "आपने मुझे कौन बनाया",
];

/// One group of patterns sharing a canned reply
///
/// Patterns are stored trimmed and lowercased with blanks dropped, whether
/// the rule is built in code or loaded from configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawShortcutRule")]
pub struct ShortcutRule {
    pub patterns: Vec<String>,
    pub reply: String,
}

#[derive(Deserialize)]
struct RawShortcutRule {
    patterns: Vec<String>,
    reply: String,
}

impl From<RawShortcutRule> for ShortcutRule {
    fn from(raw: RawShortcutRule) -> Self {
        ShortcutRule::new(raw.patterns, raw.reply)
    }
}

impl ShortcutRule {
    pub fn new<I, S>(patterns: I, reply: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            patterns: patterns
                .into_iter()
                .map(|p| p.into().trim().to_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
            reply: reply.into(),
        }
    }

    fn matches(&self, lowered: &str) -> bool {
        self.patterns
            .iter()
            .filter(|pattern| !pattern.trim().is_empty())
            .any(|pattern| lowered.contains(&pattern.to_lowercase()))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShortcutTable {
    rules: Vec<ShortcutRule>,
}

impl Default for ShortcutTable {
    fn default() -> Self {
        Self {
            rules: vec![
                ShortcutRule::new(FOUNDER_PATTERNS.iter().copied(), FOUNDER_REPLY),
                ShortcutRule::new(CREATOR_PATTERNS.iter().copied(), CREATOR_REPLY),
            ],
        }
    }
}

impl ShortcutTable {
    /// A table with no rules; every utterance goes to the model
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// Append a rule, checked after the existing ones
    pub fn with_rule(mut self, rule: ShortcutRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn extend(&mut self, rules: impl IntoIterator<Item = ShortcutRule>) {
        self.rules.extend(rules);
    }

    pub fn rules(&self) -> &[ShortcutRule] {
        &self.rules
    }

    /// Canned reply for `utterance`, if any rule matches
    pub fn find(&self, utterance: &str) -> Option<&str> {
        let lowered = utterance.to_lowercase();
        self.rules
            .iter()
            .find(|rule| rule.matches(&lowered))
            .map(|rule| rule.reply.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_founder_question_any_case() {
        let table = ShortcutTable::default();
        assert_eq!(table.find("who is your founder"), Some(FOUNDER_REPLY));
        assert_eq!(table.find("WHO IS YOUR FOUNDER?"), Some(FOUNDER_REPLY));
        assert_eq!(table.find("Hey, Who Is Ur Founder"), Some(FOUNDER_REPLY));
    }

    #[test]
    fn test_creator_variants() {
        let table = ShortcutTable::default();
        assert_eq!(table.find("So who made you anyway"), Some(CREATOR_REPLY));
        assert_eq!(table.find("who built u"), Some(CREATOR_REPLY));
        assert_eq!(table.find("आपका निर्माता कौन है?"), Some(CREATOR_REPLY));
    }

    #[test]
    fn test_ordinary_questions_pass_through() {
        let table = ShortcutTable::default();
        assert_eq!(table.find("what is two plus two"), None);
        assert_eq!(table.find("Hello"), None);
    }

    #[test]
    fn test_extension_rules() {
        let table = ShortcutTable::empty().with_rule(ShortcutRule::new(
            ["  What Is Your Name "],
            "I'm Parley.",
        ));
        assert_eq!(table.rules()[0].patterns, vec!["what is your name"]);
        assert_eq!(table.find("hi, what is your name?"), Some("I'm Parley."));
        assert_eq!(table.find("who made you"), None);
    }

    #[test]
    fn test_rules_deserialize() {
        let rule: ShortcutRule = toml::from_str(
            r#"
            patterns = ["where are you from"]
            reply = "The internet."
            "#,
        )
        .unwrap();
        assert_eq!(rule.reply, "The internet.");
    }

    #[test]
    fn test_loaded_rules_drop_blank_patterns() {
        let rule: ShortcutRule = toml::from_str(
            r#"
            patterns = ["", "  ", " What Is Your NAME "]
            reply = "Parley."
            "#,
        )
        .unwrap();
        assert_eq!(rule.patterns, vec!["what is your name"]);

        let table = ShortcutTable::empty().with_rule(rule);
        assert_eq!(table.find("what is two plus two"), None);
        assert_eq!(table.find("so, what is your name?"), Some("Parley."));
    }

    #[test]
    fn test_blank_pattern_never_matches() {
        let rule = ShortcutRule {
            patterns: vec![String::new()],
            reply: "always".to_string(),
        };
        let table = ShortcutTable::empty().with_rule(rule);
        assert_eq!(table.find("anything at all"), None);
    }
}
