#![no_main]
use iam_eval::iam::{AuthorizationRequest, Policy, PolicyEvaluator};
use libfuzzer_sys::fuzz_target;

// Arbitrary input must either fail to parse or yield a policy that
// evaluates and re-serializes without panicking.
fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    let policy = match Policy::from_json(text) {
        Ok(p) => p,
        Err(_) => return,
    };

    let request = AuthorizationRequest::new("fuzz", "iam:GetUser", "*");
    let _ = PolicyEvaluator::new().evaluate([&policy], &request);

    let json = policy.to_json().expect("parsed policy serializes");
    let reparsed = Policy::from_json(&json).expect("serialized policy parses");
    assert_eq!(reparsed, policy);
});
