//! In-memory policy store
//!
//! Holds named managed policies and users, tracks which policies are
//! attached to which user, and authorizes requests against a user's
//! attached policies. Parsed documents are shared as `Arc<Policy>` and
//! never modified after creation.
//!
//! Lock order is always state, then cache. Mutations clear the cache while
//! still holding the state write lock, so a decision computed under an older
//! set of attachments can never be cached after the change.

use super::cache::PolicyCache;
use super::decision::Decision;
use super::engine::PolicyEvaluator;
use super::policy::Policy;
use super::request::AuthorizationRequest;
use crate::config::{IamConfig, ParseOptions};
use crate::error::{IamError, Result};
use ahash::AHashMap;
use parking_lot::{Mutex, RwLock};
use regex::Regex;
use std::sync::{Arc, OnceLock};
use tracing::{debug, info, warn};

/// Anything that can supply the policies attached to a principal
pub trait PolicySource: Send + Sync {
    /// Policies that apply to `principal`, in attachment order.
    /// Unknown principals have none.
    fn policies_for(&self, principal: &str) -> Vec<Arc<Policy>>;
}

/// A fixed list of policies applied to every principal
impl PolicySource for Vec<Arc<Policy>> {
    fn policies_for(&self, _principal: &str) -> Vec<Arc<Policy>> {
        self.clone()
    }
}

struct StoredPolicy {
    name: String,
    document: Arc<Policy>,
    attachment_count: usize,
}

#[derive(Default)]
struct User {
    /// Policy ARNs in attachment order
    attached: Vec<String>,
}

#[derive(Default)]
struct StoreState {
    policies: AHashMap<String, StoredPolicy>,
    users: AHashMap<String, User>,
}

impl PolicySource for StoreState {
    fn policies_for(&self, principal: &str) -> Vec<Arc<Policy>> {
        let Some(user) = self.users.get(principal) else {
            return Vec::new();
        };
        user.attached
            .iter()
            .filter_map(|arn| self.policies.get(arn))
            .map(|p| Arc::clone(&p.document))
            .collect()
    }
}

/// Thread-safe store of managed policies and user attachments
pub struct PolicyStore {
    account_id: String,
    options: ParseOptions,
    evaluator: PolicyEvaluator,
    state: RwLock<StoreState>,
    cache: Mutex<PolicyCache>,
}

impl PolicyStore {
    /// Account used in policy ARNs unless overridden
    pub const DEFAULT_ACCOUNT_ID: &'static str = "123456789012";

    /// Names of policies and users (IAM naming rules, ASCII only)
    const NAME_PATTERN: &'static str = r"^[A-Za-z0-9_+=,.@-]{1,128}$";

    /// Create a store with default configuration
    pub fn new() -> Self {
        Self::with_config(IamConfig::default())
    }

    /// Create a store with the given configuration
    pub fn with_config(config: IamConfig) -> Self {
        PolicyStore {
            account_id: Self::DEFAULT_ACCOUNT_ID.to_string(),
            options: config.parse,
            evaluator: PolicyEvaluator::new(),
            state: RwLock::new(StoreState::default()),
            cache: Mutex::new(PolicyCache::new(config.cache.capacity)),
        }
    }

    /// Use a different account id in generated ARNs
    pub fn with_account_id(mut self, account_id: impl Into<String>) -> Self {
        self.account_id = account_id.into();
        self
    }

    /// ARN a policy named `name` gets in this store
    pub fn policy_arn(&self, name: &str) -> String {
        format!("arn:aws:iam::{}:policy/{}", self.account_id, name)
    }

    /// Parse a JSON document and store it under `name`
    ///
    /// Returns the new policy's ARN.
    ///
    /// # Errors
    ///
    /// `InvalidName`, `Parse` for a bad document, `PolicyAlreadyExists`.
    pub fn create_policy(&self, name: &str, document: &str) -> Result<String> {
        Self::validate_name(name)?;

        let policy = Policy::from_json_with(document, &self.options).map_err(|e| {
            warn!("Rejected policy {}: {}", name, e);
            e
        })?;

        self.insert_policy(name, policy)
    }

    /// Store an already-built policy under `name`
    pub fn create_policy_from(&self, name: &str, policy: Policy) -> Result<String> {
        Self::validate_name(name)?;
        policy.validate()?;
        self.insert_policy(name, policy)
    }

    fn insert_policy(&self, name: &str, policy: Policy) -> Result<String> {
        let arn = self.policy_arn(name);
        let mut state = self.state.write();

        if state.policies.contains_key(&arn) {
            return Err(IamError::PolicyAlreadyExists(name.to_string()));
        }

        state.policies.insert(
            arn.clone(),
            StoredPolicy {
                name: name.to_string(),
                document: Arc::new(policy),
                attachment_count: 0,
            },
        );

        self.cache.lock().clear();

        info!("Created policy {} ({})", name, arn);
        Ok(arn)
    }

    /// Fetch a stored policy document by ARN
    pub fn get_policy(&self, arn: &str) -> Result<Arc<Policy>> {
        self.state
            .read()
            .policies
            .get(arn)
            .map(|p| Arc::clone(&p.document))
            .ok_or_else(|| IamError::NoSuchPolicy(arn.to_string()))
    }

    /// Names of all stored policies, sorted
    pub fn list_policies(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .state
            .read()
            .policies
            .values()
            .map(|p| p.name.clone())
            .collect();
        names.sort();
        names
    }

    /// Delete a policy; fails while it is attached to any user
    pub fn delete_policy(&self, arn: &str) -> Result<()> {
        let mut state = self.state.write();

        let stored = state
            .policies
            .get(arn)
            .ok_or_else(|| IamError::NoSuchPolicy(arn.to_string()))?;

        if stored.attachment_count > 0 {
            return Err(IamError::DeleteConflict(arn.to_string()));
        }

        state.policies.remove(arn);
        self.cache.lock().clear();

        info!("Deleted policy {}", arn);
        Ok(())
    }

    /// Register a user
    pub fn create_user(&self, name: &str) -> Result<()> {
        Self::validate_name(name)?;
        let mut state = self.state.write();

        if state.users.contains_key(name) {
            return Err(IamError::UserAlreadyExists(name.to_string()));
        }

        state.users.insert(name.to_string(), User::default());
        self.cache.lock().clear();

        info!("Created user {}", name);
        Ok(())
    }

    /// Remove a user; fails while policies are attached
    pub fn delete_user(&self, name: &str) -> Result<()> {
        let mut state = self.state.write();

        let user = state
            .users
            .get(name)
            .ok_or_else(|| IamError::NoSuchUser(name.to_string()))?;

        if !user.attached.is_empty() {
            return Err(IamError::DeleteConflict(name.to_string()));
        }

        state.users.remove(name);
        self.cache.lock().clear();

        info!("Deleted user {}", name);
        Ok(())
    }

    /// Attach a policy to a user. Attaching twice is a no-op.
    pub fn attach_user_policy(&self, user: &str, arn: &str) -> Result<()> {
        let mut state = self.state.write();
        let state = &mut *state;

        let entry = state
            .users
            .get_mut(user)
            .ok_or_else(|| IamError::NoSuchUser(user.to_string()))?;
        let stored = state
            .policies
            .get_mut(arn)
            .ok_or_else(|| IamError::NoSuchPolicy(arn.to_string()))?;

        if entry.attached.iter().any(|a| a == arn) {
            debug!("Policy {} already attached to {}", arn, user);
            return Ok(());
        }

        entry.attached.push(arn.to_string());
        stored.attachment_count += 1;
        self.cache.lock().clear();

        info!("Attached policy {} to user {}", stored.name, user);
        Ok(())
    }

    /// Detach a policy from a user
    pub fn detach_user_policy(&self, user: &str, arn: &str) -> Result<()> {
        let mut state = self.state.write();
        let state = &mut *state;

        let entry = state
            .users
            .get_mut(user)
            .ok_or_else(|| IamError::NoSuchUser(user.to_string()))?;

        let position = entry
            .attached
            .iter()
            .position(|a| a == arn)
            .ok_or_else(|| IamError::PolicyNotAttached {
                policy: arn.to_string(),
                user: user.to_string(),
            })?;
        entry.attached.remove(position);

        if let Some(stored) = state.policies.get_mut(arn) {
            stored.attachment_count = stored.attachment_count.saturating_sub(1);
        }
        self.cache.lock().clear();

        info!("Detached policy {} from user {}", arn, user);
        Ok(())
    }

    /// ARNs attached to a user, in attachment order
    pub fn list_attached_user_policies(&self, user: &str) -> Result<Vec<String>> {
        self.state
            .read()
            .users
            .get(user)
            .map(|u| u.attached.clone())
            .ok_or_else(|| IamError::NoSuchUser(user.to_string()))
    }

    /// Decide a request against the principal's attached policies
    ///
    /// # Errors
    ///
    /// `NoSuchUser` when the principal was never created. A known user
    /// without attachments gets an implicit deny.
    pub fn authorize(&self, request: &AuthorizationRequest) -> Result<Decision> {
        let state = self.state.read();

        if !state.users.contains_key(&request.principal) {
            return Err(IamError::NoSuchUser(request.principal.clone()));
        }

        if let Some(cached) = self.cache.lock().get(request) {
            debug!(
                "Cache hit for {} {} on {}",
                request.principal, request.action, request.resource
            );
            return Ok(cached);
        }

        let decision = self.evaluator.authorize(&*state, request);

        self.cache.lock().put(request, decision.clone());
        Ok(decision)
    }

    /// Number of cached decisions
    pub fn cache_size(&self) -> usize {
        self.cache.lock().len()
    }

    fn validate_name(name: &str) -> Result<()> {
        static RE: OnceLock<Regex> = OnceLock::new();
        let re = RE.get_or_init(|| {
            Regex::new(PolicyStore::NAME_PATTERN).expect("name regex is valid")
        });

        if re.is_match(name) {
            Ok(())
        } else {
            Err(IamError::InvalidName(name.to_string()))
        }
    }
}

impl Default for PolicyStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PolicySource for PolicyStore {
    fn policies_for(&self, principal: &str) -> Vec<Arc<Policy>> {
        self.state.read().policies_for(principal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iam::Verdict;

    const READ_ONLY: &str = r#"{
        "Version": "2012-10-17",
        "Statement": [{"Effect": "Allow", "Action": "iam:Get*", "Resource": "*"}]
    }"#;

    #[test]
    fn test_create_and_get_policy() {
        let store = PolicyStore::new();
        let arn = store.create_policy("ReadOnly", READ_ONLY).unwrap();

        assert_eq!(arn, "arn:aws:iam::123456789012:policy/ReadOnly");
        assert_eq!(store.get_policy(&arn).unwrap().statement.len(), 1);
        assert_eq!(store.list_policies(), vec!["ReadOnly"]);
    }

    #[test]
    fn test_duplicate_policy() {
        let store = PolicyStore::new();
        store.create_policy("ReadOnly", READ_ONLY).unwrap();
        assert!(matches!(
            store.create_policy("ReadOnly", READ_ONLY),
            Err(IamError::PolicyAlreadyExists(_))
        ));
    }

    #[test]
    fn test_invalid_document_is_rejected() {
        let store = PolicyStore::new();
        let broken = r#"{"Statement":[{"Effect":"Perhaps","Action":"*","Resource":"*"}]}"#;
        let err = store.create_policy("Broken", broken).unwrap_err();
        assert!(matches!(err, IamError::Parse(_)));
        assert!(store.list_policies().is_empty());
    }

    #[test]
    fn test_invalid_names() {
        let store = PolicyStore::new();
        assert!(matches!(store.create_user(""), Err(IamError::InvalidName(_))));
        assert!(matches!(store.create_user("has space"), Err(IamError::InvalidName(_))));
        assert!(matches!(store.create_user("ålice"), Err(IamError::InvalidName(_))));
        store.create_user("svc_deploy+ci=1,a.b@c-d").unwrap();
        assert!(matches!(
            store.create_policy("a/b", READ_ONLY),
            Err(IamError::InvalidName(_))
        ));
    }

    #[test]
    fn test_custom_account_id() {
        let store = PolicyStore::new().with_account_id("000000000000");
        let arn = store.create_policy("ReadOnly", READ_ONLY).unwrap();
        assert_eq!(arn, "arn:aws:iam::000000000000:policy/ReadOnly");
    }

    #[test]
    fn test_attach_is_idempotent() {
        let store = PolicyStore::new();
        let arn = store.create_policy("ReadOnly", READ_ONLY).unwrap();
        store.create_user("alice").unwrap();

        store.attach_user_policy("alice", &arn).unwrap();
        store.attach_user_policy("alice", &arn).unwrap();
        assert_eq!(store.list_attached_user_policies("alice").unwrap(), vec![arn.clone()]);

        store.detach_user_policy("alice", &arn).unwrap();
        // A single detach releases the policy
        store.delete_policy(&arn).unwrap();
    }

    #[test]
    fn test_attach_unknown() {
        let store = PolicyStore::new();
        let arn = store.create_policy("ReadOnly", READ_ONLY).unwrap();

        assert!(matches!(
            store.attach_user_policy("ghost", &arn),
            Err(IamError::NoSuchUser(_))
        ));

        store.create_user("alice").unwrap();
        assert!(matches!(
            store.attach_user_policy("alice", "arn:aws:iam::123456789012:policy/Nope"),
            Err(IamError::NoSuchPolicy(_))
        ));
        assert!(matches!(
            store.detach_user_policy("alice", &arn),
            Err(IamError::PolicyNotAttached { .. })
        ));
    }

    #[test]
    fn test_delete_conflicts() {
        let store = PolicyStore::new();
        let arn = store.create_policy("ReadOnly", READ_ONLY).unwrap();
        store.create_user("alice").unwrap();
        store.attach_user_policy("alice", &arn).unwrap();

        assert!(matches!(store.delete_policy(&arn), Err(IamError::DeleteConflict(_))));
        assert!(matches!(store.delete_user("alice"), Err(IamError::DeleteConflict(_))));

        store.detach_user_policy("alice", &arn).unwrap();
        store.delete_user("alice").unwrap();
        store.delete_policy(&arn).unwrap();

        assert!(matches!(store.get_policy(&arn), Err(IamError::NoSuchPolicy(_))));
        assert!(matches!(store.delete_user("alice"), Err(IamError::NoSuchUser(_))));
    }

    #[test]
    fn test_authorize_unknown_user() {
        let store = PolicyStore::new();
        let request = AuthorizationRequest::new("ghost", "iam:GetUser", "*");
        assert!(matches!(store.authorize(&request), Err(IamError::NoSuchUser(_))));
    }

    #[test]
    fn test_authorize_without_attachments() {
        let store = PolicyStore::new();
        store.create_user("alice").unwrap();

        let request = AuthorizationRequest::new("alice", "iam:GetUser", "*");
        assert_eq!(store.authorize(&request).unwrap().verdict, Verdict::ImplicitDeny);
    }

    #[test]
    fn test_cache_cleared_on_detach() {
        let store = PolicyStore::new();
        let arn = store.create_policy("ReadOnly", READ_ONLY).unwrap();
        store.create_user("alice").unwrap();
        store.attach_user_policy("alice", &arn).unwrap();

        let request = AuthorizationRequest::new("alice", "iam:GetUser", "*");
        assert!(store.authorize(&request).unwrap().is_allowed());
        assert!(store.authorize(&request).unwrap().is_allowed());
        assert_eq!(store.cache_size(), 1);

        store.detach_user_policy("alice", &arn).unwrap();
        assert_eq!(store.cache_size(), 0);
        assert_eq!(store.authorize(&request).unwrap().verdict, Verdict::ImplicitDeny);
    }

    #[test]
    fn test_cache_cleared_on_create() {
        let store = PolicyStore::new();
        store.create_user("alice").unwrap();

        let request = AuthorizationRequest::new("alice", "iam:GetUser", "*");
        store.authorize(&request).unwrap();
        assert_eq!(store.cache_size(), 1);

        store.create_policy("ReadOnly", READ_ONLY).unwrap();
        assert_eq!(store.cache_size(), 0);

        store.authorize(&request).unwrap();
        store.create_user("bob").unwrap();
        assert_eq!(store.cache_size(), 0);
    }

    #[test]
    fn test_context_dependent_decisions_are_cached_apart() {
        let store = PolicyStore::new();
        let arn = store
            .create_policy(
                "LargeN",
                r#"{
                    "Version": "2012-10-17",
                    "Statement": [{
                        "Effect": "Allow",
                        "Action": "iam:GetUser",
                        "Resource": "*",
                        "Condition": {"NumericGreaterThan": {"n": 5}}
                    }]
                }"#,
            )
            .unwrap();
        store.create_user("alice").unwrap();
        store.attach_user_policy("alice", &arn).unwrap();

        let base = AuthorizationRequest::new("alice", "iam:GetUser", "*");
        let pos = base.clone().with_context("n", f64::INFINITY);
        let neg = base.clone().with_context("n", f64::NEG_INFINITY);
        let nan = base.with_context("n", f64::NAN);

        assert_eq!(store.authorize(&pos).unwrap().verdict, Verdict::Allow);
        assert_eq!(store.authorize(&neg).unwrap().verdict, Verdict::ImplicitDeny);
        assert_eq!(store.authorize(&nan).unwrap().verdict, Verdict::ImplicitDeny);
        assert_eq!(store.cache_size(), 3);

        // Cached answers agree with direct evaluation
        let evaluator = PolicyEvaluator::new();
        for request in [&pos, &neg, &nan] {
            assert_eq!(
                store.authorize(request).unwrap(),
                evaluator.authorize(&store, request)
            );
        }
    }

    #[test]
    fn test_cache_disabled_by_config() {
        let mut config = IamConfig::default();
        config.cache.capacity = 0;
        let store = PolicyStore::with_config(config);
        store.create_user("alice").unwrap();

        let request = AuthorizationRequest::new("alice", "iam:GetUser", "*");
        store.authorize(&request).unwrap();
        assert_eq!(store.cache_size(), 0);
    }

    #[test]
    fn test_parse_options_apply() {
        let mut config = IamConfig::default();
        config.parse.require_version = true;
        let store = PolicyStore::with_config(config);

        let unversioned = r#"{"Statement":[{"Effect":"Allow","Action":"*","Resource":"*"}]}"#;
        assert!(matches!(
            store.create_policy("Loose", unversioned),
            Err(IamError::Parse(crate::error::PolicyParseError::MissingVersion))
        ));
    }

    #[test]
    fn test_policy_source() {
        let store = PolicyStore::new();
        let arn = store.create_policy("ReadOnly", READ_ONLY).unwrap();
        store.create_user("alice").unwrap();
        store.attach_user_policy("alice", &arn).unwrap();

        assert_eq!(store.policies_for("alice").len(), 1);
        assert!(store.policies_for("bob").is_empty());

        let fixed: Vec<Arc<Policy>> = vec![store.get_policy(&arn).unwrap()];
        assert_eq!(fixed.policies_for("anyone").len(), 1);
    }
}
