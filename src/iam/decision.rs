//! Authorization decisions

use super::policy::Effect;
use std::fmt;

/// Outcome of an evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verdict {
    /// At least one Allow matched and no Deny matched
    Allow,
    /// An explicit Deny matched
    Deny,
    /// Nothing matched (default deny)
    ImplicitDeny,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Verdict::Allow => "Allow",
            Verdict::Deny => "Deny",
            Verdict::ImplicitDeny => "ImplicitDeny",
        };
        f.write_str(s)
    }
}

/// A statement that matched the request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedStatement {
    /// Position of the policy in the evaluated set
    pub policy_index: usize,
    /// Position of the statement within its policy
    pub statement_index: usize,
    pub sid: Option<String>,
    pub effect: Effect,
}

impl MatchedStatement {
    /// Sid when present, otherwise `<policy>/<statement>` positions
    pub fn id(&self) -> String {
        match &self.sid {
            Some(sid) => sid.clone(),
            None => format!("{}/{}", self.policy_index, self.statement_index),
        }
    }
}

/// Verdict plus the statements that produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub verdict: Verdict,
    pub matched: Vec<MatchedStatement>,
}

impl Decision {
    /// Default-deny decision with no matched statements
    pub fn implicit_deny() -> Self {
        Decision {
            verdict: Verdict::ImplicitDeny,
            matched: Vec::new(),
        }
    }

    pub fn is_allowed(&self) -> bool {
        self.verdict == Verdict::Allow
    }

    pub fn is_explicit_deny(&self) -> bool {
        self.verdict == Verdict::Deny
    }

    /// Identifiers of every matched statement, in evaluation order
    pub fn matched_statement_ids(&self) -> Vec<String> {
        self.matched.iter().map(MatchedStatement::id).collect()
    }

    /// Matched statements with the given effect
    pub fn matched_with(&self, effect: Effect) -> impl Iterator<Item = &MatchedStatement> {
        self.matched.iter().filter(move |m| m.effect == effect)
    }
}
