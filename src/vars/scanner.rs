//! Extraction of `$(...)` references from string leaves

use once_cell::sync::Lazy;
use regex::Regex;

use super::reference::{ArrayIndex, VariableReference};

/// A reference: `$(`, dot-separated segments (or bracket-quoted names),
/// an optional `[*]` / `[N]`, then `)`
static REFERENCE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"\$\((?P<body>[A-Za-z0-9_-]+(?:\.[A-Za-z0-9_-]+|\[(?:"[^"\]]*"|'[^'\]]*')\])*)(?:\[(?P<index>\*|[0-9]+)\])?\)"#,
    )
    .expect("Valid regex pattern")
});

/// Every well-formed reference in `leaf` that belongs to a known
/// namespace, left to right and non-overlapping.
///
/// Unrecognized namespaces and malformed spans are skipped.
pub fn scan(leaf: &str) -> Vec<VariableReference<'_>> {
    REFERENCE_REGEX
        .captures_iter(leaf)
        .filter_map(|captures| {
            let whole = captures.get(0)?;
            let body = captures.name("body")?.as_str();
            let index = match captures.name("index").map(|m| m.as_str()) {
                None => None,
                Some("*") => Some(ArrayIndex::Star),
                Some(digits) => Some(ArrayIndex::Literal(digits.parse().ok()?)),
            };
            VariableReference::from_body(whole.as_str(), whole.start(), whole.end(), body, index)
        })
        .collect()
}

/// Whether `leaf` contains any recognized reference
pub fn contains_reference(leaf: &str) -> bool {
    REFERENCE_REGEX.is_match(leaf) && !scan(leaf).is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vars::Namespace;
    use proptest::prelude::*;

    fn texts(leaf: &str) -> Vec<&str> {
        scan(leaf).into_iter().map(|r| r.text).collect()
    }

    #[test]
    fn test_finds_all_references() {
        assert_eq!(
            texts("--flag=$(params.a) and $(results.b.path)/$(context.task.name)"),
            vec!["$(params.a)", "$(results.b.path)", "$(context.task.name)"]
        );
    }

    #[test]
    fn test_indexes() {
        let refs = scan("$(params.arr[*]) $(params.arr[12])");
        assert_eq!(refs[0].index, Some(ArrayIndex::Star));
        assert_eq!(refs[0].path, vec!["arr"]);
        assert_eq!(refs[1].index, Some(ArrayIndex::Literal(12)));
    }

    #[test]
    fn test_ignores_malformed_and_foreign() {
        assert!(scan("$(params.foo").is_empty());
        assert!(scan("$(params.foo bar)").is_empty());
        assert!(scan("$(date) and $HOME and ${params.x}").is_empty());
        assert!(scan("$(params.a[-1])").is_empty());
        assert!(scan("$(params.a[99999999999999999999999])").is_empty());
    }

    #[test]
    fn test_bracket_syntax() {
        let refs = scan(r#"$(params["my.param"]) $(params['other'][0])"#);
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].path, vec!["my.param"]);
        assert_eq!(refs[1].path, vec!["other"]);
        assert_eq!(refs[1].index, Some(ArrayIndex::Literal(0)));
    }

    #[test]
    fn test_offsets() {
        let leaf = "x $(params.a) y";
        let reference = &scan(leaf)[0];
        assert_eq!(&leaf[reference.start..reference.end], "$(params.a)");
        assert!(!reference.is_whole(leaf));
        assert!(scan("$(params.a)")[0].is_whole("$(params.a)"));
    }

    #[test]
    fn test_contains_reference() {
        assert!(contains_reference("echo $(params.x)"));
        assert!(!contains_reference("echo $(date)"));
        assert!(!contains_reference("plain"));
    }

    proptest! {
        #[test]
        fn prop_text_is_preserved_verbatim(
            prefix in "[a-z =/-]{0,12}",
            name in "[a-z][a-z0-9_-]{0,10}",
            suffix in "[a-z =/-]{0,12}",
        ) {
            let reference = format!("$(params.{})", name);
            let leaf = format!("{}{}{}", prefix, reference, suffix);
            let refs = scan(&leaf);
            prop_assert_eq!(refs.len(), 1);
            prop_assert_eq!(refs[0].text, reference.as_str());
            prop_assert_eq!(refs[0].namespace, Namespace::Params);
            prop_assert_eq!(&leaf[refs[0].start..refs[0].end], reference.as_str());
        }

        #[test]
        fn prop_scan_never_panics(leaf in ".{0,64}") {
            for reference in scan(&leaf) {
                prop_assert!(reference.text.starts_with("$("));
                prop_assert!(reference.text.ends_with(')'));
            }
        }
    }
}
