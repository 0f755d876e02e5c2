//! # iam-eval - IAM Policy Decision Engine
//!
//! `iam-eval` answers one question: may this principal perform this action on
//! this resource? It evaluates AWS-style JSON policy documents with:
//!
//! - **Explicit deny precedence**: any matching Deny wins over every Allow
//! - **Default deny**: nothing matched means `ImplicitDeny`
//! - **Wildcards**: anchored `*` and `?` in actions and resources
//! - **Conditions**: String, Numeric, Date, Bool and Null operators
//! - **Policy store**: named policies attached to users, with decision caching
//!
//! ## Quick Start
//!
//! ```rust
//! use iam_eval::iam::{AuthorizationRequest, Policy, PolicyEvaluator, Verdict};
//!
//! # fn main() -> Result<(), iam_eval::PolicyParseError> {
//! let policy = Policy::from_json(r#"{
//!     "Version": "2012-10-17",
//!     "Statement": [
//!         {"Effect": "Allow", "Action": ["iam:ListUsers", "iam:GetUser"], "Resource": "*"},
//!         {"Effect": "Deny", "Action": "iam:*User", "Resource": "*", "Sid": "NoUserWrites"},
//!         {"Effect": "Allow", "Action": "iam:GetUser", "Resource": "*"}
//!     ]
//! }"#)?;
//!
//! let evaluator = PolicyEvaluator::new();
//!
//! let list = AuthorizationRequest::new("alice", "iam:ListUsers", "*");
//! assert_eq!(evaluator.evaluate([&policy], &list).verdict, Verdict::Allow);
//!
//! let create = AuthorizationRequest::new("alice", "iam:CreateUser", "*");
//! let decision = evaluator.evaluate([&policy], &create);
//! assert_eq!(decision.verdict, Verdict::Deny);
//! assert_eq!(decision.matched_statement_ids(), vec!["NoUserWrites"]);
//! # Ok(())
//! # }
//! ```
//!
//! ## Policy Store
//!
//! ```rust
//! use iam_eval::iam::{AuthorizationRequest, PolicyStore};
//!
//! # fn main() -> iam_eval::Result<()> {
//! let store = PolicyStore::new();
//! let arn = store.create_policy(
//!     "ReadOnly",
//!     r#"{
//!         "Version": "2012-10-17",
//!         "Statement": [{"Effect": "Allow", "Action": "iam:Get*", "Resource": "*"}]
//!     }"#,
//! )?;
//! store.create_user("alice")?;
//! store.attach_user_policy("alice", &arn)?;
//!
//! let decision = store.authorize(&AuthorizationRequest::new("alice", "iam:GetUser", "*"))?;
//! assert!(decision.is_allowed());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod iam;

pub use config::{CacheConfig, IamConfig, ParseOptions};
pub use error::{IamError, PolicyParseError, Result};
pub use iam::{
    AuthorizationRequest, Decision, Effect, Policy, PolicyEvaluator, PolicyStore, Statement,
    Verdict,
};
