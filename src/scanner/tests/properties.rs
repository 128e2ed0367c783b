//! Property-based tests for scanning and projection
//!
//! - Projection round-trip: segment texts of each line rebuild the line
//! - Scanning is idempotent
//! - Matches on a line are disjoint and sorted by start column

use proptest::prelude::*;
use serde_json::json;

use crate::scanner::matcher::scan;
use crate::scanner::overlay::project;
use crate::scanner::rules::TriggerIndex;

fn index() -> TriggerIndex {
    TriggerIndex::compile(&json!({
        "error": [{ "type": "regex", "regex": ["[a-z]@[a-z]+", "\\d{2,}"] }],
        "warning": [{ "type": "match", "match": ["ab", "ab cd", "é"], "handler": { "message": "w" } }],
        "info": [{ "type": "match", "match": ["cd", "@x"], "handler": { "options": [{ "label": "X" }] } }]
    }))
    .index
}

/// Short texts dense in pattern fragments, separators and multi-byte chars
fn text_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        "[abcdx@/ é\\n0-9]{0,40}",
        "(ab|cd|ab cd|@x|a@bc|é|/|12| |\\n){0,12}",
    ]
}

proptest! {
    #[test]
    fn prop_projection_rebuilds_text(text in text_strategy()) {
        let index = index();
        let matches = scan(&index, &text);
        let lines = project(&index, &text, &matches);

        let original: Vec<&str> = text.split('\n').collect();
        prop_assert_eq!(lines.len(), original.len());
        for (segments, line) in lines.iter().zip(original) {
            let rebuilt: String = segments.iter().map(|s| s.text()).collect();
            prop_assert_eq!(rebuilt.as_str(), line);
        }
    }

    #[test]
    fn prop_every_match_is_projected(text in text_strategy()) {
        let index = index();
        let matches = scan(&index, &text);
        let annotated: usize = project(&index, &text, &matches)
            .iter()
            .flatten()
            .filter(|s| s.annotation().is_some())
            .count();
        prop_assert_eq!(annotated, matches.len());
    }

    #[test]
    fn prop_scan_is_idempotent(text in text_strategy()) {
        let index = index();
        prop_assert_eq!(scan(&index, &text), scan(&index, &text));
    }

    #[test]
    fn prop_matches_disjoint_and_sorted(text in text_strategy()) {
        let index = index();
        let matches = scan(&index, &text);
        for pair in matches.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            prop_assert!(a.line_index <= b.line_index);
            if a.line_index == b.line_index {
                prop_assert!(a.end_col <= b.start_col);
            }
        }
    }
}
