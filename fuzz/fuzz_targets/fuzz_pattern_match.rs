#![no_main]
use arbitrary::Arbitrary;
use iam_eval::iam::PatternMatcher;
use libfuzzer_sys::fuzz_target;

#[derive(Arbitrary, Debug)]
struct Input {
    pattern: String,
    value: String,
}

fuzz_target!(|input: Input| {
    let matched = PatternMatcher::matches(&input.pattern, &input.value);

    // A literal pattern only ever matches itself
    if !input.pattern.contains(['*', '?']) {
        assert_eq!(matched, input.pattern == input.value);
    }

    // `*` matches everything
    assert!(PatternMatcher::matches("*", &input.value));
});
