//! Wildcard pattern matching for IAM actions and resources
//!
//! Supports wildcards:
//! - `*` - Matches zero or more characters (e.g., `iam:*User`)
//! - `?` - Matches exactly one character (e.g., `iam:Get????`)
//!
//! Matching is anchored at both ends and case-sensitive.

use crate::error::PolicyParseError;
use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

/// Pattern matcher for action and resource strings
pub struct PatternMatcher;

impl PatternMatcher {
    /// Check if a value matches a wildcard pattern
    ///
    /// # Examples
    /// ```
    /// use iam_eval::iam::PatternMatcher;
    ///
    /// assert!(PatternMatcher::matches("iam:*User", "iam:CreateUser"));
    /// assert!(PatternMatcher::matches("iam:Get?ser", "iam:GetUser"));
    /// assert!(!PatternMatcher::matches("iam:*User", "iam:ListGroups"));
    /// ```
    pub fn matches(pattern: &str, value: &str) -> bool {
        if !pattern.contains(['*', '?']) {
            return pattern == value;
        }

        let pattern: Vec<char> = pattern.chars().collect();
        let value: Vec<char> = value.chars().collect();

        Self::match_chars(&pattern, &value)
    }

    /// Anchored glob over characters.
    ///
    /// Remembers only the most recent `*`; on mismatch it lets that star
    /// swallow one more character and retries. Runs in O(pattern * value).
    fn match_chars(pattern: &[char], value: &[char]) -> bool {
        let mut pat_idx = 0;
        let mut val_idx = 0;
        let mut star: Option<usize> = None;
        let mut star_val_idx = 0;

        while val_idx < value.len() {
            match pattern.get(pat_idx) {
                Some('*') => {
                    star = Some(pat_idx);
                    star_val_idx = val_idx;
                    pat_idx += 1;
                }
                Some(&c) if c == '?' || c == value[val_idx] => {
                    pat_idx += 1;
                    val_idx += 1;
                }
                _ => match star {
                    Some(star_idx) => {
                        pat_idx = star_idx + 1;
                        star_val_idx += 1;
                        val_idx = star_val_idx;
                    }
                    None => return false,
                },
            }
        }

        // Value exhausted - only trailing stars may remain
        pattern[pat_idx..].iter().all(|&c| c == '*')
    }
}

/// What a pattern is matched against; controls parse-time validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternKind {
    Action,
    Resource,
}

/// A validated wildcard pattern, compiled once when the policy is parsed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WildcardPattern {
    raw: String,
    kind: PatternKind,
    has_wildcards: bool,
}

impl WildcardPattern {
    /// Service prefix of an action (`iam` in `iam:ListUsers`)
    const SERVICE_PREFIX: &'static str = r"^[a-z0-9-]+$";

    /// Parse and validate a pattern
    ///
    /// # Errors
    ///
    /// Returns `InvalidPattern` for empty patterns, patterns containing
    /// control characters, and action patterns that contain whitespace or
    /// are not `*` or `<service>:<name>`. Resource patterns may contain
    /// spaces (S3 keys do).
    pub fn parse(raw: impl Into<String>, kind: PatternKind) -> Result<Self, PolicyParseError> {
        let raw = raw.into();
        Self::validate(&raw, kind)?;

        let has_wildcards = raw.contains(['*', '?']);
        Ok(WildcardPattern {
            raw,
            kind,
            has_wildcards,
        })
    }

    fn validate(raw: &str, kind: PatternKind) -> Result<(), PolicyParseError> {
        let invalid = |reason: &str| PolicyParseError::InvalidPattern {
            pattern: raw.to_string(),
            reason: reason.to_string(),
        };

        if raw.is_empty() {
            return Err(invalid("pattern cannot be empty"));
        }

        if raw.chars().any(char::is_control) {
            return Err(invalid("pattern cannot contain control characters"));
        }

        if kind == PatternKind::Action && raw != "*" {
            if raw.chars().any(char::is_whitespace) {
                return Err(invalid("action cannot contain whitespace"));
            }

            let (service, name) = raw
                .split_once(':')
                .ok_or_else(|| invalid("action must be '*' or '<service>:<action>'"))?;

            if !service_prefix_regex().is_match(service) {
                return Err(invalid(
                    "service prefix must be lowercase letters, digits or hyphens",
                ));
            }

            if name.is_empty() {
                return Err(invalid("action name cannot be empty"));
            }
        }

        Ok(())
    }

    /// Check whether a concrete value matches this pattern
    pub fn matches(&self, value: &str) -> bool {
        if !self.has_wildcards {
            return self.raw == value;
        }
        PatternMatcher::matches(&self.raw, value)
    }

    /// True for the bare `*` pattern
    pub fn is_any(&self) -> bool {
        self.raw == "*"
    }

    pub fn kind(&self) -> PatternKind {
        self.kind
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for WildcardPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

fn service_prefix_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(WildcardPattern::SERVICE_PREFIX).expect("service prefix regex is valid")
    })
}
