//! IAM policy document structure
//!
//! Policies define which actions are allowed or denied on which resources.
//! The JSON shape follows AWS identity policies:
//!
//! ```json
//! {
//!   "Version": "2012-10-17",
//!   "Statement": [
//!     { "Effect": "Allow", "Action": ["iam:ListUsers"], "Resource": "*" }
//!   ]
//! }
//! ```
//!
//! Documents are validated completely when parsed; a [`Policy`] value is
//! always safe to evaluate.

use super::condition::{ConditionBlock, RawConditionBlock};
use super::pattern::{PatternKind, WildcardPattern};
use super::request::Context;
use crate::config::ParseOptions;
use crate::error::PolicyParseError;
use serde::{Deserialize, Serialize};

/// Effect of a policy statement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Effect {
    /// Allow the action
    Allow,
    /// Deny the action (takes precedence over Allow)
    Deny,
}

impl Effect {
    fn parse(raw: &str) -> Result<Self, PolicyParseError> {
        match raw {
            "Allow" => Ok(Effect::Allow),
            "Deny" => Ok(Effect::Deny),
            other => Err(PolicyParseError::InvalidEffect(other.to_string())),
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            Effect::Allow => "Allow",
            Effect::Deny => "Deny",
        }
    }
}

/// A JSON field that may hold one value or an array of values
// Many is tried first: an all-default struct would also accept an empty array
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> OneOrMany<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::One(one) => vec![one],
            OneOrMany::Many(many) => many,
        }
    }

    /// Single-element vectors collapse to `One`
    pub fn from_vec(mut values: Vec<T>) -> Self {
        if values.len() == 1 {
            if let Some(one) = values.pop() {
                return OneOrMany::One(one);
            }
        }
        OneOrMany::Many(values)
    }
}

/// Which actions or resources a statement covers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    /// `Action` / `Resource`: values matching any pattern
    Include(Vec<WildcardPattern>),
    /// `NotAction` / `NotResource`: values matching none of the patterns
    Exclude(Vec<WildcardPattern>),
}

impl Scope {
    /// Build an `Action` scope from pattern strings
    pub fn actions<S: AsRef<str>>(patterns: &[S]) -> Result<Self, PolicyParseError> {
        Ok(Scope::Include(Self::compile(patterns, PatternKind::Action)?))
    }

    /// Build a `Resource` scope from pattern strings
    pub fn resources<S: AsRef<str>>(patterns: &[S]) -> Result<Self, PolicyParseError> {
        Ok(Scope::Include(Self::compile(patterns, PatternKind::Resource)?))
    }

    /// Turn an inclusive scope into its `Not*` form
    pub fn negate(self) -> Self {
        match self {
            Scope::Include(p) => Scope::Exclude(p),
            Scope::Exclude(p) => Scope::Include(p),
        }
    }

    fn compile<S: AsRef<str>>(
        patterns: &[S],
        kind: PatternKind,
    ) -> Result<Vec<WildcardPattern>, PolicyParseError> {
        patterns
            .iter()
            .map(|p| WildcardPattern::parse(p.as_ref(), kind))
            .collect()
    }

    pub fn matches(&self, value: &str) -> bool {
        match self {
            Scope::Include(patterns) => patterns.iter().any(|p| p.matches(value)),
            Scope::Exclude(patterns) => !patterns.iter().any(|p| p.matches(value)),
        }
    }

    pub fn patterns(&self) -> &[WildcardPattern] {
        match self {
            Scope::Include(p) | Scope::Exclude(p) => p,
        }
    }

    fn to_raw(&self) -> OneOrMany<String> {
        OneOrMany::from_vec(self.patterns().iter().map(|p| p.as_str().to_string()).collect())
    }
}

/// A single policy statement
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    /// Statement ID (optional)
    pub sid: Option<String>,

    /// Effect of this statement
    pub effect: Effect,

    /// Actions this statement applies to (supports wildcards)
    pub actions: Scope,

    /// Resources this statement applies to (supports wildcards)
    pub resources: Scope,

    /// Optional conditions for when this statement applies
    pub conditions: Option<ConditionBlock>,
}

impl Statement {
    /// Create a new statement
    pub fn new(effect: Effect, actions: Scope, resources: Scope) -> Self {
        Statement {
            sid: None,
            effect,
            actions,
            resources,
            conditions: None,
        }
    }

    /// Allow statement over action and resource patterns
    pub fn allow<A: AsRef<str>, R: AsRef<str>>(
        actions: &[A],
        resources: &[R],
    ) -> Result<Self, PolicyParseError> {
        Ok(Self::new(
            Effect::Allow,
            Scope::actions(actions)?,
            Scope::resources(resources)?,
        ))
    }

    /// Deny statement over action and resource patterns
    pub fn deny<A: AsRef<str>, R: AsRef<str>>(
        actions: &[A],
        resources: &[R],
    ) -> Result<Self, PolicyParseError> {
        Ok(Self::new(
            Effect::Deny,
            Scope::actions(actions)?,
            Scope::resources(resources)?,
        ))
    }

    pub fn with_sid(mut self, sid: impl Into<String>) -> Self {
        self.sid = Some(sid.into());
        self
    }

    pub fn with_conditions(mut self, conditions: ConditionBlock) -> Self {
        self.conditions = Some(conditions);
        self
    }

    /// Check if this statement applies to the given action, resource and context
    pub fn applies_to(&self, action: &str, resource: &str, context: &Context) -> bool {
        if !self.actions.matches(action) {
            return false;
        }

        if !self.resources.matches(resource) {
            return false;
        }

        match &self.conditions {
            Some(block) => block.evaluate(context),
            None => true,
        }
    }

    fn from_raw(index: usize, raw: RawStatement) -> Result<Self, PolicyParseError> {
        let effect = raw
            .effect
            .as_deref()
            .ok_or(PolicyParseError::MissingField {
                index,
                field: "Effect",
            })
            .and_then(Effect::parse)?;

        let actions = Self::scope(
            index,
            raw.action,
            raw.not_action,
            ("Action", "NotAction"),
            PatternKind::Action,
        )?;
        let resources = Self::scope(
            index,
            raw.resource,
            raw.not_resource,
            ("Resource", "NotResource"),
            PatternKind::Resource,
        )?;

        let conditions = match raw.condition {
            Some(block) if !block.is_empty() => Some(ConditionBlock::from_raw(block)?),
            _ => None,
        };

        Ok(Statement {
            sid: raw.sid,
            effect,
            actions,
            resources,
            conditions,
        })
    }

    fn scope(
        index: usize,
        include: Option<OneOrMany<String>>,
        exclude: Option<OneOrMany<String>>,
        (field, not_field): (&'static str, &'static str),
        kind: PatternKind,
    ) -> Result<Scope, PolicyParseError> {
        let (patterns, negated) = match (include, exclude) {
            (Some(_), Some(_)) => {
                return Err(PolicyParseError::ConflictingFields {
                    index,
                    first: field,
                    second: not_field,
                })
            }
            (None, None) => return Err(PolicyParseError::MissingField { index, field }),
            (Some(p), None) => (p.into_vec(), false),
            (None, Some(p)) => (p.into_vec(), true),
        };

        if patterns.is_empty() {
            return Err(PolicyParseError::MissingField {
                index,
                field: if negated { not_field } else { field },
            });
        }

        let scope = Scope::Include(Scope::compile(&patterns, kind)?);
        Ok(if negated { scope.negate() } else { scope })
    }

    fn to_raw(&self) -> RawStatement {
        let (action, not_action) = match &self.actions {
            Scope::Include(_) => (Some(self.actions.to_raw()), None),
            Scope::Exclude(_) => (None, Some(self.actions.to_raw())),
        };
        let (resource, not_resource) = match &self.resources {
            Scope::Include(_) => (Some(self.resources.to_raw()), None),
            Scope::Exclude(_) => (None, Some(self.resources.to_raw())),
        };

        RawStatement {
            sid: self.sid.clone(),
            effect: Some(self.effect.as_str().to_string()),
            action,
            not_action,
            resource,
            not_resource,
            condition: self.conditions.as_ref().map(ConditionBlock::to_raw),
        }
    }
}

/// Complete IAM policy document
#[derive(Debug, Clone, PartialEq)]
pub struct Policy {
    /// Policy language version
    pub version: String,

    /// Optional policy identifier
    pub id: Option<String>,

    /// List of policy statements
    pub statement: Vec<Statement>,
}

impl Policy {
    /// Current policy language version
    pub const DEFAULT_VERSION: &'static str = "2012-10-17";

    /// Version assumed when a document omits `Version`
    pub const IMPLICIT_VERSION: &'static str = "2008-10-17";

    /// Create a new empty policy
    pub fn new() -> Self {
        Policy {
            version: Self::DEFAULT_VERSION.to_string(),
            id: None,
            statement: Vec::new(),
        }
    }

    /// Add a statement to this policy
    pub fn add_statement(&mut self, statement: Statement) {
        self.statement.push(statement);
    }

    /// Parse policy from JSON string with default options
    pub fn from_json(json: &str) -> Result<Self, PolicyParseError> {
        Self::from_json_with(json, &ParseOptions::default())
    }

    /// Parse policy from JSON string
    ///
    /// # Errors
    ///
    /// Any structural problem, bad effect, invalid pattern or condition
    /// rejects the whole document.
    pub fn from_json_with(json: &str, options: &ParseOptions) -> Result<Self, PolicyParseError> {
        let raw: RawPolicy = serde_json::from_str(json)?;

        let version = match raw.version {
            Some(version) => version,
            None if options.require_version => return Err(PolicyParseError::MissingVersion),
            None => Self::IMPLICIT_VERSION.to_string(),
        };
        if !options.accepts_version(&version) {
            return Err(PolicyParseError::UnsupportedVersion(version));
        }

        let statement = raw
            .statement
            .into_vec()
            .into_iter()
            .enumerate()
            .map(|(index, stmt)| Statement::from_raw(index, stmt))
            .collect::<Result<Vec<_>, _>>()?;

        let policy = Policy {
            version,
            id: raw.id,
            statement,
        };
        policy.validate()?;

        Ok(policy)
    }

    /// Serialize policy to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.to_raw())
    }

    /// Validate policy structure
    pub fn validate(&self) -> Result<(), PolicyParseError> {
        if self.statement.is_empty() {
            return Err(PolicyParseError::EmptyPolicy);
        }

        for (index, stmt) in self.statement.iter().enumerate() {
            if stmt.actions.patterns().is_empty() {
                return Err(PolicyParseError::MissingField {
                    index,
                    field: "Action",
                });
            }
            if stmt.resources.patterns().is_empty() {
                return Err(PolicyParseError::MissingField {
                    index,
                    field: "Resource",
                });
            }
        }

        Ok(())
    }

    fn to_raw(&self) -> RawPolicy {
        RawPolicy {
            version: Some(self.version.clone()),
            id: self.id.clone(),
            statement: OneOrMany::Many(self.statement.iter().map(Statement::to_raw).collect()),
        }
    }
}

impl Default for Policy {
    fn default() -> Self {
        Self::new()
    }
}

impl std::str::FromStr for Policy {
    type Err = PolicyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_json(s)
    }
}

/// Wire shape of a document, before validation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawPolicy {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,

    statement: OneOrMany<RawStatement>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawStatement {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sid: Option<String>,

    #[serde(default)]
    effect: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    action: Option<OneOrMany<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    not_action: Option<OneOrMany<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    resource: Option<OneOrMany<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    not_resource: Option<OneOrMany<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    condition: Option<RawConditionBlock>,
}
