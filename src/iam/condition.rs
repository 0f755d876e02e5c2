//! Condition evaluation for IAM policies
//!
//! Conditions allow fine-grained control based on request context:
//! - String operations (Equals, NotEquals, EqualsIgnoreCase, Like, NotLike)
//! - Numeric operations (Equals, NotEquals, LessThan, GreaterThan, ...)
//! - Date operations (Equals, NotEquals, LessThan, GreaterThan; RFC 3339)
//! - Bool and Null checks
//!
//! Within one condition the expected values form a set: the condition holds
//! when that set intersects the context values. All conditions of a
//! statement must hold.

use super::pattern::PatternMatcher;
use super::policy::OneOrMany;
use super::request::Context;
use crate::error::PolicyParseError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;

/// Condition operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConditionOperator {
    /// String equals (case-sensitive)
    StringEquals,
    /// String not equals
    StringNotEquals,
    /// String equals ignoring ASCII case
    StringEqualsIgnoreCase,
    /// String matches pattern (supports `*` and `?`)
    StringLike,
    /// String matches none of the patterns
    StringNotLike,
    NumericEquals,
    NumericNotEquals,
    NumericLessThan,
    NumericLessThanEquals,
    NumericGreaterThan,
    NumericGreaterThanEquals,
    /// Date equals (RFC 3339 or epoch seconds)
    DateEquals,
    DateNotEquals,
    DateLessThan,
    DateGreaterThan,
    Bool,
    /// Tests presence of the key rather than its value
    Null,
}

impl ConditionOperator {
    const IF_EXISTS: &'static str = "IfExists";

    /// Parse an operator name, returning the operator and whether it
    /// carried the `IfExists` suffix
    pub fn parse(name: &str) -> Result<(Self, bool), PolicyParseError> {
        let (base, if_exists) = match name.strip_suffix(Self::IF_EXISTS) {
            Some(base) => (base, true),
            None => (name, false),
        };

        let operator = match base {
            "StringEquals" => ConditionOperator::StringEquals,
            "StringNotEquals" => ConditionOperator::StringNotEquals,
            "StringEqualsIgnoreCase" => ConditionOperator::StringEqualsIgnoreCase,
            "StringLike" => ConditionOperator::StringLike,
            "StringNotLike" => ConditionOperator::StringNotLike,
            "NumericEquals" => ConditionOperator::NumericEquals,
            "NumericNotEquals" => ConditionOperator::NumericNotEquals,
            "NumericLessThan" => ConditionOperator::NumericLessThan,
            "NumericLessThanEquals" => ConditionOperator::NumericLessThanEquals,
            "NumericGreaterThan" => ConditionOperator::NumericGreaterThan,
            "NumericGreaterThanEquals" => ConditionOperator::NumericGreaterThanEquals,
            "DateEquals" => ConditionOperator::DateEquals,
            "DateNotEquals" => ConditionOperator::DateNotEquals,
            "DateLessThan" => ConditionOperator::DateLessThan,
            "DateGreaterThan" => ConditionOperator::DateGreaterThan,
            "Bool" => ConditionOperator::Bool,
            "Null" => ConditionOperator::Null,
            _ => {
                return Err(PolicyParseError::InvalidCondition(format!(
                    "unknown operator '{}'",
                    name
                )))
            }
        };

        if if_exists && operator == ConditionOperator::Null {
            return Err(PolicyParseError::InvalidCondition(
                "Null does not accept the IfExists suffix".to_string(),
            ));
        }

        Ok((operator, if_exists))
    }

    /// Canonical name, without any `IfExists` suffix
    pub fn name(&self) -> &'static str {
        match self {
            ConditionOperator::StringEquals => "StringEquals",
            ConditionOperator::StringNotEquals => "StringNotEquals",
            ConditionOperator::StringEqualsIgnoreCase => "StringEqualsIgnoreCase",
            ConditionOperator::StringLike => "StringLike",
            ConditionOperator::StringNotLike => "StringNotLike",
            ConditionOperator::NumericEquals => "NumericEquals",
            ConditionOperator::NumericNotEquals => "NumericNotEquals",
            ConditionOperator::NumericLessThan => "NumericLessThan",
            ConditionOperator::NumericLessThanEquals => "NumericLessThanEquals",
            ConditionOperator::NumericGreaterThan => "NumericGreaterThan",
            ConditionOperator::NumericGreaterThanEquals => "NumericGreaterThanEquals",
            ConditionOperator::DateEquals => "DateEquals",
            ConditionOperator::DateNotEquals => "DateNotEquals",
            ConditionOperator::DateLessThan => "DateLessThan",
            ConditionOperator::DateGreaterThan => "DateGreaterThan",
            ConditionOperator::Bool => "Bool",
            ConditionOperator::Null => "Null",
        }
    }

    /// Negated operators hold when no context value matches any expected value
    pub fn is_negated(&self) -> bool {
        matches!(
            self,
            ConditionOperator::StringNotEquals
                | ConditionOperator::StringNotLike
                | ConditionOperator::NumericNotEquals
                | ConditionOperator::DateNotEquals
        )
    }

    /// Check that an expected value has the type this operator compares
    fn accepts(&self, value: &ConditionValue) -> bool {
        match self {
            ConditionOperator::NumericEquals
            | ConditionOperator::NumericNotEquals
            | ConditionOperator::NumericLessThan
            | ConditionOperator::NumericLessThanEquals
            | ConditionOperator::NumericGreaterThan
            | ConditionOperator::NumericGreaterThanEquals => {
                value.as_number().is_some_and(f64::is_finite)
            }
            ConditionOperator::DateEquals
            | ConditionOperator::DateNotEquals
            | ConditionOperator::DateLessThan
            | ConditionOperator::DateGreaterThan => value.as_date().is_some(),
            ConditionOperator::Bool | ConditionOperator::Null => value.as_bool().is_some(),
            _ => true,
        }
    }

    /// Compare one expected value against one context value.
    ///
    /// Negated operators compare like their positive counterpart; the
    /// caller inverts the aggregate.
    fn compare(&self, expected: &ConditionValue, actual: &ConditionValue) -> bool {
        match self {
            ConditionOperator::StringEquals | ConditionOperator::StringNotEquals => {
                expected.as_text() == actual.as_text()
            }
            ConditionOperator::StringEqualsIgnoreCase => expected
                .as_text()
                .eq_ignore_ascii_case(&actual.as_text()),
            ConditionOperator::StringLike | ConditionOperator::StringNotLike => {
                PatternMatcher::matches(&expected.as_text(), &actual.as_text())
            }
            ConditionOperator::NumericEquals | ConditionOperator::NumericNotEquals => {
                Self::numeric(expected, actual, |e, a| (e - a).abs() < f64::EPSILON)
            }
            ConditionOperator::NumericLessThan => Self::numeric(expected, actual, |e, a| a < e),
            ConditionOperator::NumericLessThanEquals => {
                Self::numeric(expected, actual, |e, a| a <= e)
            }
            ConditionOperator::NumericGreaterThan => Self::numeric(expected, actual, |e, a| a > e),
            ConditionOperator::NumericGreaterThanEquals => {
                Self::numeric(expected, actual, |e, a| a >= e)
            }
            ConditionOperator::DateEquals | ConditionOperator::DateNotEquals => {
                Self::date(expected, actual, |e, a| a == e)
            }
            ConditionOperator::DateLessThan => Self::date(expected, actual, |e, a| a < e),
            ConditionOperator::DateGreaterThan => Self::date(expected, actual, |e, a| a > e),
            ConditionOperator::Bool => match (expected.as_bool(), actual.as_bool()) {
                (Some(e), Some(a)) => e == a,
                _ => false,
            },
            // Presence is handled by Condition::evaluate
            ConditionOperator::Null => false,
        }
    }

    fn numeric(
        expected: &ConditionValue,
        actual: &ConditionValue,
        op: impl Fn(f64, f64) -> bool,
    ) -> bool {
        match (expected.as_number(), actual.as_number()) {
            (Some(e), Some(a)) => op(e, a),
            _ => false,
        }
    }

    fn date(
        expected: &ConditionValue,
        actual: &ConditionValue,
        op: impl Fn(DateTime<Utc>, DateTime<Utc>) -> bool,
    ) -> bool {
        match (expected.as_date(), actual.as_date()) {
            (Some(e), Some(a)) => op(e, a),
            _ => false,
        }
    }
}

/// Condition value (can be string, number, or bool)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConditionValue {
    String(String),
    Number(f64),
    Bool(bool),
}

impl ConditionValue {
    /// Textual form; numbers and bools render the way they appear in JSON
    pub fn as_text(&self) -> Cow<'_, str> {
        match self {
            ConditionValue::String(s) => Cow::Borrowed(s),
            ConditionValue::Number(n) => Cow::Owned(n.to_string()),
            ConditionValue::Bool(b) => Cow::Owned(b.to_string()),
        }
    }

    /// Numbers, or strings holding a number
    pub fn as_number(&self) -> Option<f64> {
        match self {
            ConditionValue::Number(n) => Some(*n),
            ConditionValue::String(s) => s.trim().parse().ok(),
            ConditionValue::Bool(_) => None,
        }
    }

    /// Bools, or the strings "true"/"false"
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ConditionValue::Bool(b) => Some(*b),
            ConditionValue::String(s) => match s.as_str() {
                "true" => Some(true),
                "false" => Some(false),
                _ => None,
            },
            ConditionValue::Number(_) => None,
        }
    }

    /// RFC 3339 strings, or numbers as epoch seconds
    pub fn as_date(&self) -> Option<DateTime<Utc>> {
        match self {
            ConditionValue::String(s) => DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|d| d.with_timezone(&Utc)),
            ConditionValue::Number(n) if n.fract() == 0.0 => {
                DateTime::from_timestamp(*n as i64, 0)
            }
            _ => None,
        }
    }
}

impl From<&str> for ConditionValue {
    fn from(value: &str) -> Self {
        ConditionValue::String(value.to_string())
    }
}

impl From<String> for ConditionValue {
    fn from(value: String) -> Self {
        ConditionValue::String(value)
    }
}

impl From<f64> for ConditionValue {
    fn from(value: f64) -> Self {
        ConditionValue::Number(value)
    }
}

impl From<i64> for ConditionValue {
    fn from(value: i64) -> Self {
        ConditionValue::Number(value as f64)
    }
}

impl From<bool> for ConditionValue {
    fn from(value: bool) -> Self {
        ConditionValue::Bool(value)
    }
}

/// A single condition: one operator applied to one context key
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub operator: ConditionOperator,
    pub if_exists: bool,
    pub key: String,
    pub values: Vec<ConditionValue>,
}

impl Condition {
    /// Create a new condition, checking value types against the operator
    pub fn new(
        operator: ConditionOperator,
        key: impl Into<String>,
        values: Vec<ConditionValue>,
    ) -> Result<Self, PolicyParseError> {
        let key = key.into();

        if values.is_empty() {
            return Err(PolicyParseError::InvalidCondition(format!(
                "{} on '{}' has no values",
                operator.name(),
                key
            )));
        }

        if let Some(bad) = values.iter().find(|v| !operator.accepts(v)) {
            return Err(PolicyParseError::InvalidCondition(format!(
                "{} on '{}' cannot compare value {}",
                operator.name(),
                key,
                bad.as_text()
            )));
        }

        Ok(Condition {
            operator,
            if_exists: false,
            key,
            values,
        })
    }

    /// Mark this condition as `...IfExists`
    pub fn if_exists(mut self) -> Self {
        self.if_exists = true;
        self
    }

    /// Full operator name as written in a policy
    pub fn operator_name(&self) -> String {
        if self.if_exists {
            format!("{}{}", self.operator.name(), ConditionOperator::IF_EXISTS)
        } else {
            self.operator.name().to_string()
        }
    }

    /// Evaluate this condition against a context
    pub fn evaluate(&self, context: &Context) -> bool {
        let actual = context.get(&self.key).filter(|values| !values.is_empty());

        if self.operator == ConditionOperator::Null {
            let is_null = actual.is_none();
            return self.values.iter().any(|v| v.as_bool() == Some(is_null));
        }

        let actual = match actual {
            Some(values) => values,
            // Key not in context - condition fails unless IfExists
            None => return self.if_exists,
        };

        let any_match = actual.iter().any(|a| {
            self.values
                .iter()
                .any(|expected| self.operator.compare(expected, a))
        });

        if self.operator.is_negated() {
            !any_match
        } else {
            any_match
        }
    }
}

/// Raw JSON shape: operator -> key -> value(s)
pub(crate) type RawConditionBlock = BTreeMap<String, BTreeMap<String, OneOrMany<ConditionValue>>>;

/// All conditions of one statement
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConditionBlock {
    conditions: Vec<Condition>,
}

impl ConditionBlock {
    pub fn new(conditions: Vec<Condition>) -> Self {
        ConditionBlock { conditions }
    }

    pub(crate) fn from_raw(raw: RawConditionBlock) -> Result<Self, PolicyParseError> {
        let mut conditions = Vec::new();

        for (operator_name, entries) in raw {
            let (operator, if_exists) = ConditionOperator::parse(&operator_name)?;

            if entries.is_empty() {
                return Err(PolicyParseError::InvalidCondition(format!(
                    "{} has no keys",
                    operator_name
                )));
            }

            for (key, values) in entries {
                let mut condition = Condition::new(operator, key, values.into_vec())?;
                condition.if_exists = if_exists;
                conditions.push(condition);
            }
        }

        Ok(ConditionBlock { conditions })
    }

    pub(crate) fn to_raw(&self) -> RawConditionBlock {
        let mut raw = RawConditionBlock::new();
        for condition in &self.conditions {
            raw.entry(condition.operator_name()).or_default().insert(
                condition.key.clone(),
                OneOrMany::from_vec(condition.values.clone()),
            );
        }
        raw
    }

    /// True when every condition holds
    pub fn evaluate(&self, context: &Context) -> bool {
        self.conditions.iter().all(|c| c.evaluate(context))
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }
}
