//! Compiled rewrite rules.

use std::borrow::Cow;

use regex::bytes;
use regex::Regex;

use crate::config::schema::{RewriteConfig, RewriteRuleConfig};
use crate::rewrite::RewriteError;

/// A substitution over text, used on request start lines.
#[derive(Debug, Clone)]
pub struct RewriteRule {
    pattern: Regex,
    replacement: String,
}

impl RewriteRule {
    /// Compile a rule. The replacement may reference capture groups (`$1`, `${name}`).
    pub fn new(pattern: &str, replacement: impl Into<String>) -> Result<Self, RewriteError> {
        let compiled = Regex::new(pattern).map_err(|source| RewriteError::Pattern {
            pattern: pattern.to_string(),
            source,
        })?;
        Ok(Self {
            pattern: compiled,
            replacement: replacement.into(),
        })
    }

    /// Replace every match in `text`.
    pub fn apply<'t>(&self, text: &'t str) -> Cow<'t, str> {
        self.pattern.replace_all(text, self.replacement.as_str())
    }

    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    pub fn replacement(&self) -> &str {
        &self.replacement
    }
}

/// A substitution over raw bytes, used on response bodies.
///
/// Bodies are not assumed to be UTF-8, so matching runs on bytes.
#[derive(Debug, Clone)]
pub struct ByteRewriteRule {
    pattern: bytes::Regex,
    replacement: Vec<u8>,
}

impl ByteRewriteRule {
    pub fn new(pattern: &str, replacement: impl Into<Vec<u8>>) -> Result<Self, RewriteError> {
        let compiled = bytes::Regex::new(pattern).map_err(|source| RewriteError::Pattern {
            pattern: pattern.to_string(),
            source,
        })?;
        Ok(Self {
            pattern: compiled,
            replacement: replacement.into(),
        })
    }

    /// Replace every match in `body`.
    pub fn apply<'b>(&self, body: &'b [u8]) -> Cow<'b, [u8]> {
        self.pattern.replace_all(body, self.replacement.as_slice())
    }

    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    pub fn replacement(&self) -> &[u8] {
        &self.replacement
    }
}

/// Ordered request and response rule sets.
///
/// Rules run in the order they were added.
#[derive(Debug, Clone, Default)]
pub struct RewriteRules {
    request: Vec<RewriteRule>,
    response: Vec<ByteRewriteRule>,
}

impl RewriteRules {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile both rule sets from configuration.
    pub fn from_config(config: &RewriteConfig) -> Result<Self, RewriteError> {
        let mut rules = Self::new();
        for RewriteRuleConfig {
            pattern,
            replacement,
        } in &config.request
        {
            rules.add_request_rule(pattern, replacement.as_str())?;
        }
        for RewriteRuleConfig {
            pattern,
            replacement,
        } in &config.response
        {
            rules.add_response_rule(pattern, replacement.as_str())?;
        }
        Ok(rules)
    }

    /// Append a rule for request start lines.
    pub fn add_request_rule(
        &mut self,
        pattern: &str,
        replacement: impl Into<String>,
    ) -> Result<(), RewriteError> {
        self.push_request(RewriteRule::new(pattern, replacement)?);
        Ok(())
    }

    /// Append a rule for textual response bodies.
    pub fn add_response_rule(
        &mut self,
        pattern: &str,
        replacement: impl Into<Vec<u8>>,
    ) -> Result<(), RewriteError> {
        self.push_response(ByteRewriteRule::new(pattern, replacement)?);
        Ok(())
    }

    /// Append an already compiled request rule.
    pub fn push_request(&mut self, rule: RewriteRule) {
        self.request.push(rule);
    }

    /// Append an already compiled response rule.
    pub fn push_response(&mut self, rule: ByteRewriteRule) {
        self.response.push(rule);
    }

    pub fn request(&self) -> &[RewriteRule] {
        &self.request
    }

    pub fn response(&self) -> &[ByteRewriteRule] {
        &self.response
    }

    pub fn is_empty(&self) -> bool {
        self.request.is_empty() && self.response.is_empty()
    }
}

/// Apply text rules in sequence.
pub fn rewrite_text(rules: &[RewriteRule], text: &str) -> String {
    rules
        .iter()
        .fold(text.to_string(), |acc, rule| rule.apply(&acc).into_owned())
}

/// Apply byte rules in sequence.
pub fn rewrite_bytes(rules: &[ByteRewriteRule], body: &[u8]) -> Vec<u8> {
    rules
        .iter()
        .fold(body.to_vec(), |acc, rule| rule.apply(&acc).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_rule_replaces_every_match() {
        let rule = RewriteRule::new("a", "b").unwrap();
        assert_eq!(rule.apply("banana"), "bbnbnb");
    }

    #[test]
    fn text_rule_supports_captures() {
        let rule = RewriteRule::new(r"/(\w+)\.jpg", "/thumbs/$1.png").unwrap();
        assert_eq!(rule.apply("GET http://h/cat.jpg HTTP/1.1"), "GET http://h/thumbs/cat.png HTTP/1.1");
    }

    #[test]
    fn malformed_pattern_is_rejected() {
        let err = RewriteRule::new("(unclosed", "x").unwrap_err();
        assert!(matches!(err, RewriteError::Pattern { ref pattern, .. } if pattern == "(unclosed"));

        assert!(ByteRewriteRule::new("[z-a]", "x").is_err());
    }

    #[test]
    fn rules_apply_in_insertion_order() {
        let mut rules = RewriteRules::new();
        rules.add_request_rule("one", "two").unwrap();
        rules.add_request_rule("two", "three").unwrap();
        assert_eq!(rewrite_text(rules.request(), "one"), "three");

        let mut reversed = RewriteRules::new();
        reversed.add_request_rule("two", "three").unwrap();
        reversed.add_request_rule("one", "two").unwrap();
        assert_eq!(rewrite_text(reversed.request(), "one"), "two");
    }

    #[test]
    fn byte_rules_tolerate_non_utf8() {
        let mut rules = RewriteRules::new();
        rules.add_response_rule("smiley", "trolly").unwrap();
        let body = b"\xff\xfe This is smiley";
        assert_eq!(rewrite_bytes(rules.response(), body), b"\xff\xfe This is trolly");
    }

    #[test]
    fn greedy_pattern_over_body() {
        let mut rules = RewriteRules::new();
        rules.add_response_rule(".*trolly", "new sentence").unwrap();
        assert_eq!(rewrite_bytes(rules.response(), b"This is trolly"), b"new sentence");
    }

    #[test]
    fn from_config_compiles_both_sets() {
        let config = RewriteConfig {
            request: vec![RewriteRuleConfig {
                pattern: "hello".into(),
                replacement: "bye".into(),
            }],
            response: vec![RewriteRuleConfig {
                pattern: "Smiley".into(),
                replacement: "Trolly".into(),
            }],
        };
        let rules = RewriteRules::from_config(&config).unwrap();
        assert_eq!(rules.request().len(), 1);
        assert_eq!(rules.response()[0].replacement(), b"Trolly");
        assert!(!rules.is_empty());
    }
}
