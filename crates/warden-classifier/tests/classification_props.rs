use proptest::prelude::*;
use warden_classifier::{classify_error, ErrorReport, PatternSet};

fn pattern() -> impl Strategy<Value = String> {
    "[a-z0-9_.-]{3,12}"
}

fn flip_case(s: &str, mask: &[bool]) -> String {
    s.chars()
        .zip(mask.iter().cycle())
        .map(|(c, upper)| if *upper { c.to_ascii_uppercase() } else { c })
        .collect()
}

proptest! {
    #[test]
    fn prop_url_containing_pattern_is_blocked(
        patterns in prop::collection::vec(pattern(), 1..6),
        pick in any::<prop::sample::Index>(),
        prefix in "[a-z/:.]{0,20}",
        suffix in "[a-z/?=&.]{0,20}",
        mask in prop::collection::vec(any::<bool>(), 1..8),
    ) {
        let set = PatternSet::new(&patterns);
        let chosen = pick.get(&patterns);
        let url = format!("{prefix}{}{suffix}", flip_case(chosen, &mask));
        prop_assert!(set.classify_url(&url).blocked);
    }

    #[test]
    fn prop_blocked_iff_some_pattern_is_substring(
        patterns in prop::collection::vec(pattern(), 0..6),
        url in "[a-zA-Z0-9/:._-]{0,40}",
    ) {
        let set = PatternSet::new(&patterns);
        let lowered = url.to_lowercase();
        let expected = patterns.iter().any(|p| lowered.contains(p.as_str()));
        let verdict = set.classify_url(&url);
        prop_assert_eq!(verdict.blocked, expected);
        prop_assert_eq!(verdict.matched_pattern.is_some(), expected);
    }

    #[test]
    fn prop_boolean_verdict_is_order_independent(
        patterns in prop::collection::vec(pattern(), 0..6),
        url in "[a-z0-9/:._-]{0,40}",
    ) {
        let forward = PatternSet::new(&patterns);
        let mut reversed_patterns = patterns.clone();
        reversed_patterns.reverse();
        let reversed = PatternSet::new(&reversed_patterns);
        prop_assert_eq!(forward.is_blocked(&url), reversed.is_blocked(&url));
    }

    #[test]
    fn prop_error_classification_is_deterministic(
        name in "[A-Za-z]{0,12}",
        message in ".{0,60}",
    ) {
        let report = ErrorReport::new(name, message);
        prop_assert_eq!(classify_error(&report), classify_error(&report));
    }
}

#[test]
fn reported_pattern_is_first_in_list_order() {
    let set = PatternSet::new(["user", "useuserextension-7c796cda.js"]);
    let verdict = set.classify_url("/assets/useUserExtension-7c796cda.js");
    assert_eq!(verdict.matched_pattern.as_deref(), Some("user"));
}
