//! Policy evaluation engine with deny precedence
//!
//! Evaluates IAM policies to determine if an action on a resource is allowed.
//! Key features:
//! - Explicit deny takes precedence over allow
//! - No matching statement means implicit deny
//! - Outcome is independent of statement and policy order
//! - Pure function of its inputs; safe to share across threads

use super::decision::{Decision, MatchedStatement, Verdict};
use super::policy::{Effect, Policy};
use super::request::AuthorizationRequest;
use super::store::PolicySource;
use std::sync::Arc;
use tracing::debug;

/// Policy evaluation engine
#[derive(Debug, Clone, Copy, Default)]
pub struct PolicyEvaluator;

impl PolicyEvaluator {
    pub fn new() -> Self {
        PolicyEvaluator
    }

    /// Evaluate a request against every statement of every policy
    ///
    /// # Examples
    ///
    /// ```
    /// use iam_eval::iam::{AuthorizationRequest, Policy, PolicyEvaluator, Statement, Verdict};
    ///
    /// let mut policy = Policy::new();
    /// policy.add_statement(Statement::allow(&["iam:List*"], &["*"]).unwrap());
    /// policy.add_statement(Statement::deny(&["iam:ListRoles"], &["*"]).unwrap());
    ///
    /// let evaluator = PolicyEvaluator::new();
    /// let request = AuthorizationRequest::new("alice", "iam:ListUsers", "*");
    /// assert_eq!(evaluator.evaluate([&policy], &request).verdict, Verdict::Allow);
    ///
    /// let request = AuthorizationRequest::new("alice", "iam:ListRoles", "*");
    /// assert_eq!(evaluator.evaluate([&policy], &request).verdict, Verdict::Deny);
    /// ```
    pub fn evaluate<'a, I>(&self, policies: I, request: &AuthorizationRequest) -> Decision
    where
        I: IntoIterator<Item = &'a Policy>,
    {
        let mut matched = Vec::new();

        for (policy_index, policy) in policies.into_iter().enumerate() {
            for (statement_index, statement) in policy.statement.iter().enumerate() {
                if statement.applies_to(&request.action, &request.resource, &request.context) {
                    matched.push(MatchedStatement {
                        policy_index,
                        statement_index,
                        sid: statement.sid.clone(),
                        effect: statement.effect,
                    });
                }
            }
        }

        let verdict = Self::combine(&matched);

        debug!(
            "Evaluated {} {} on {}: {} ({} matched)",
            request.principal,
            request.action,
            request.resource,
            verdict,
            matched.len()
        );

        Decision { verdict, matched }
    }

    /// Evaluate a request against the policies `source` supplies for its principal
    ///
    /// # Examples
    ///
    /// ```
    /// use iam_eval::iam::{AuthorizationRequest, Policy, PolicyEvaluator, Statement};
    /// use std::sync::Arc;
    ///
    /// let mut policy = Policy::new();
    /// policy.add_statement(Statement::allow(&["iam:Get*"], &["*"]).unwrap());
    /// let source = vec![Arc::new(policy)];
    ///
    /// let request = AuthorizationRequest::new("alice", "iam:GetUser", "*");
    /// assert!(PolicyEvaluator::new().authorize(&source, &request).is_allowed());
    /// ```
    pub fn authorize<S>(&self, source: &S, request: &AuthorizationRequest) -> Decision
    where
        S: PolicySource + ?Sized,
    {
        let policies = source.policies_for(&request.principal);
        self.evaluate(policies.iter().map(Arc::as_ref), request)
    }

    /// Combine matched effects: any Deny wins, then any Allow
    fn combine(matched: &[MatchedStatement]) -> Verdict {
        if matched.iter().any(|m| m.effect == Effect::Deny) {
            Verdict::Deny
        } else if matched.iter().any(|m| m.effect == Effect::Allow) {
            Verdict::Allow
        } else {
            Verdict::ImplicitDeny
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iam::{Condition, ConditionBlock, ConditionOperator, Statement};

    fn request(action: &str, resource: &str) -> AuthorizationRequest {
        AuthorizationRequest::new("test-user", action, resource)
    }

    #[test]
    fn test_simple_allow() {
        let mut policy = Policy::new();
        policy.add_statement(
            Statement::allow(&["s3:GetObject"], &["arn:aws:s3:::public/*"]).unwrap(),
        );

        let evaluator = PolicyEvaluator::new();
        assert!(evaluator
            .evaluate([&policy], &request("s3:GetObject", "arn:aws:s3:::public/a.txt"))
            .is_allowed());
        assert_eq!(
            evaluator
                .evaluate([&policy], &request("s3:PutObject", "arn:aws:s3:::public/a.txt"))
                .verdict,
            Verdict::ImplicitDeny
        );
        assert_eq!(
            evaluator
                .evaluate([&policy], &request("s3:GetObject", "arn:aws:s3:::private/a.txt"))
                .verdict,
            Verdict::ImplicitDeny
        );
    }

    #[test]
    fn test_deny_precedence() {
        let mut policy = Policy::new();

        // Deny first, allow second: order must not matter
        policy.add_statement(
            Statement::deny(&["s3:GetObject"], &["arn:aws:s3:::secret/*"]).unwrap(),
        );
        policy.add_statement(Statement::allow(&["s3:*"], &["*"]).unwrap());

        let evaluator = PolicyEvaluator::new();
        assert!(evaluator
            .evaluate([&policy], &request("s3:GetObject", "arn:aws:s3:::public/a"))
            .is_allowed());

        let decision =
            evaluator.evaluate([&policy], &request("s3:GetObject", "arn:aws:s3:::secret/a"));
        assert_eq!(decision.verdict, Verdict::Deny);
        assert_eq!(decision.matched.len(), 2);
    }

    #[test]
    fn test_deny_across_policies() {
        let mut allow = Policy::new();
        allow.add_statement(Statement::allow(&["*"], &["*"]).unwrap());

        let mut deny = Policy::new();
        deny.add_statement(
            Statement::deny(&["iam:DeleteUser"], &["*"])
                .unwrap()
                .with_sid("NoDelete"),
        );

        let evaluator = PolicyEvaluator::new();
        let decision = evaluator.evaluate([&allow, &deny], &request("iam:DeleteUser", "*"));
        assert_eq!(decision.verdict, Verdict::Deny);
        assert_eq!(decision.matched_statement_ids(), vec!["0/0", "NoDelete"]);

        let decision = evaluator.evaluate([&deny, &allow], &request("iam:DeleteUser", "*"));
        assert_eq!(decision.verdict, Verdict::Deny);
    }

    #[test]
    fn test_empty_policy_set() {
        let evaluator = PolicyEvaluator::new();
        let decision = evaluator.evaluate(std::iter::empty(), &request("iam:GetUser", "*"));
        assert_eq!(decision, Decision::implicit_deny());
    }

    #[test]
    fn test_conditions_gate_statement() {
        let conditions = ConditionBlock::new(vec![Condition::new(
            ConditionOperator::Bool,
            "aws:MultiFactorAuthPresent",
            vec![true.into()],
        )
        .unwrap()]);

        let mut policy = Policy::new();
        policy.add_statement(
            Statement::allow(&["iam:DeleteUser"], &["*"])
                .unwrap()
                .with_conditions(conditions),
        );

        let evaluator = PolicyEvaluator::new();
        assert_eq!(
            evaluator.evaluate([&policy], &request("iam:DeleteUser", "*")).verdict,
            Verdict::ImplicitDeny
        );
        assert!(evaluator
            .evaluate(
                [&policy],
                &request("iam:DeleteUser", "*").with_context("aws:MultiFactorAuthPresent", true)
            )
            .is_allowed());
    }

    #[test]
    fn test_not_action_deny() {
        let policy = Policy::from_json(
            r#"{
                "Version": "2012-10-17",
                "Statement": [
                    {"Effect": "Allow", "Action": "*", "Resource": "*"},
                    {"Effect": "Deny", "NotAction": ["iam:Get*", "iam:List*"], "Resource": "*"}
                ]
            }"#,
        )
        .unwrap();

        let evaluator = PolicyEvaluator::new();
        assert!(evaluator.evaluate([&policy], &request("iam:GetUser", "*")).is_allowed());
        assert!(evaluator.evaluate([&policy], &request("iam:ListGroups", "*")).is_allowed());
        assert_eq!(
            evaluator.evaluate([&policy], &request("iam:CreateUser", "*")).verdict,
            Verdict::Deny
        );
    }

    #[test]
    fn test_unknown_action_is_implicit_deny() {
        let mut policy = Policy::new();
        policy.add_statement(Statement::allow(&["iam:GetUser"], &["*"]).unwrap());

        let evaluator = PolicyEvaluator::new();
        let decision = evaluator.evaluate([&policy], &request("made-up:Thing", "whatever"));
        assert_eq!(decision.verdict, Verdict::ImplicitDeny);
        assert!(decision.matched.is_empty());
    }

    #[test]
    fn test_authorize_from_source() {
        let mut read = Policy::new();
        read.add_statement(Statement::allow(&["iam:Get*", "iam:List*"], &["*"]).unwrap());
        let mut guard = Policy::new();
        guard.add_statement(Statement::deny(&["iam:ListRoles"], &["*"]).unwrap());

        let source: Vec<Arc<Policy>> = vec![Arc::new(read), Arc::new(guard)];
        let evaluator = PolicyEvaluator::new();

        assert!(evaluator.authorize(&source, &request("iam:GetUser", "*")).is_allowed());
        assert_eq!(
            evaluator.authorize(&source, &request("iam:ListRoles", "*")).verdict,
            Verdict::Deny
        );
        assert_eq!(
            evaluator.authorize(&source, &request("iam:CreateUser", "*")).verdict,
            Verdict::ImplicitDeny
        );

        let empty: Vec<Arc<Policy>> = Vec::new();
        assert_eq!(
            evaluator.authorize(&empty, &request("iam:GetUser", "*")),
            Decision::implicit_deny()
        );
    }
}
