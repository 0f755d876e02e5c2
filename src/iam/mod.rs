//! Identity and Access Management (IAM) policy evaluation
//!
//! Provides:
//! - JSON policy documents validated at parse time
//! - Allow/Deny statements with explicit deny precedence
//! - Anchored `*`/`?` wildcard matching for actions and resources
//! - Condition evaluation (String, Numeric, Date, Bool, Null operations)
//! - An in-memory policy store with user attachments and an LRU decision cache

mod cache;
mod condition;
mod decision;
mod engine;
mod pattern;
mod policy;
mod request;
mod store;

pub use cache::PolicyCache;
pub use condition::{Condition, ConditionBlock, ConditionOperator, ConditionValue};
pub use decision::{Decision, MatchedStatement, Verdict};
pub use engine::PolicyEvaluator;
pub use pattern::{PatternKind, PatternMatcher, WildcardPattern};
pub use policy::{Effect, OneOrMany, Policy, Scope, Statement};
pub use request::{AuthorizationRequest, Context};
pub use store::{PolicySource, PolicyStore};
