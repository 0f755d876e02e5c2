//! Authorization requests and their condition context

use super::condition::ConditionValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Runtime values for condition keys.
///
/// Keys are case-sensitive. A key may carry several values (multi-valued
/// keys such as tag lists).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Context {
    values: BTreeMap<String, Vec<ConditionValue>>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a single-valued key, replacing any previous values
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ConditionValue>) {
        self.values.insert(key.into(), vec![value.into()]);
    }

    /// Set a multi-valued key, replacing any previous values
    pub fn insert_many(&mut self, key: impl Into<String>, values: Vec<ConditionValue>) {
        self.values.insert(key.into(), values);
    }

    pub fn get(&self, key: &str) -> Option<&[ConditionValue]> {
        self.values.get(key).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Keys in sorted order with their values
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[ConditionValue])> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }
}

/// "May `principal` perform `action` on `resource`?"
#[derive(Debug, Clone, PartialEq)]
pub struct AuthorizationRequest {
    pub principal: String,
    pub action: String,
    pub resource: String,
    pub context: Context,
}

impl AuthorizationRequest {
    /// Create a request with an empty context
    pub fn new(
        principal: impl Into<String>,
        action: impl Into<String>,
        resource: impl Into<String>,
    ) -> Self {
        AuthorizationRequest {
            principal: principal.into(),
            action: action.into(),
            resource: resource.into(),
            context: Context::new(),
        }
    }

    /// Add a context value
    pub fn with_context(
        mut self,
        key: impl Into<String>,
        value: impl Into<ConditionValue>,
    ) -> Self {
        self.context.insert(key, value);
        self
    }

    /// Replace the whole context
    pub fn with_context_map(mut self, context: Context) -> Self {
        self.context = context;
        self
    }
}
