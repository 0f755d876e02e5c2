//! IAM policy evaluation and store race condition tests

use iam_eval::iam::{AuthorizationRequest, Policy, PolicyEvaluator, PolicyStore, Verdict};
use std::sync::Arc;

const DOCUMENT: &str = r#"{
    "Version": "2012-10-17",
    "Statement": [
        {"Effect": "Allow", "Action": ["iam:List*", "iam:Get*"], "Resource": "*"},
        {"Effect": "Deny", "Action": "iam:*User", "Resource": "arn:aws:iam::*:user/root"}
    ]
}"#;

#[test]
fn test_shared_policy_across_threads() {
    let policy = Arc::new(Policy::from_json(DOCUMENT).unwrap());
    let evaluator = PolicyEvaluator::new();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let policy = Arc::clone(&policy);
            std::thread::spawn(move || {
                for i in 0..500 {
                    let resource = format!("arn:aws:iam::123456789012:user/user{}", i % 20);
                    let request = AuthorizationRequest::new("worker", "iam:GetUser", resource);
                    assert!(evaluator.evaluate([policy.as_ref()], &request).is_allowed());

                    let root = AuthorizationRequest::new(
                        "worker",
                        "iam:GetUser",
                        "arn:aws:iam::123456789012:user/root",
                    );
                    assert_eq!(evaluator.evaluate([policy.as_ref()], &root).verdict, Verdict::Deny);
                }
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }
}

#[test]
fn test_concurrent_authorize_with_cache() {
    let store = Arc::new(PolicyStore::new());
    let arn = store.create_policy("ReadOnly", DOCUMENT).unwrap();
    for i in 0..4 {
        let user = format!("user{}", i);
        store.create_user(&user).unwrap();
        store.attach_user_policy(&user, &arn).unwrap();
    }

    let handles: Vec<_> = (0..10)
        .map(|_| {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                for _ in 0..200 {
                    let user = format!("user{}", rand::random::<usize>() % 4);
                    let request = AuthorizationRequest::new(user, "iam:ListUsers", "*");
                    assert!(store.authorize(&request).unwrap().is_allowed());
                }
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }

    // One entry per distinct user/action/resource
    assert_eq!(store.cache_size(), 4);
}

#[test]
fn test_detach_is_never_masked_by_cache() {
    let store = Arc::new(PolicyStore::new());
    let arn = store.create_policy("ReadOnly", DOCUMENT).unwrap();
    store.create_user("alice").unwrap();
    store.attach_user_policy("alice", &arn).unwrap();

    let readers: Vec<_> = (0..6)
        .map(|_| {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                let request = AuthorizationRequest::new("alice", "iam:GetUser", "*");
                for _ in 0..500 {
                    let verdict = store.authorize(&request).unwrap().verdict;
                    assert!(matches!(verdict, Verdict::Allow | Verdict::ImplicitDeny));
                }
            })
        })
        .collect();

    // Toggle the attachment while readers run
    for _ in 0..50 {
        store.detach_user_policy("alice", &arn).unwrap();
        store.attach_user_policy("alice", &arn).unwrap();
    }
    store.detach_user_policy("alice", &arn).unwrap();

    for h in readers {
        h.join().unwrap();
    }

    // After the final detach every reader must see the change
    let request = AuthorizationRequest::new("alice", "iam:GetUser", "*");
    assert_eq!(store.authorize(&request).unwrap().verdict, Verdict::ImplicitDeny);
}

#[test]
fn test_concurrent_policy_creation() {
    let store = Arc::new(PolicyStore::new());

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                for i in 0..25 {
                    store.create_policy(&format!("policy-{}-{}", t, i), DOCUMENT).unwrap();
                }
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(store.list_policies().len(), 200);
}
