// src/quiz/feedback.rs

use serde::{Deserialize, Serialize};

/// One feedback threshold: shown when the correct-answer count reaches
/// `min_correct` and no higher threshold matched first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackRange {
    pub min_correct: i64,
    pub message: String,
}

/// Wire/storage shape of the per-asset feedback configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackConfig {
    pub ranges: Vec<FeedbackRange>,
}

/// Built-in ranges used when an asset has no (usable) configuration.
pub fn default_ranges() -> Vec<FeedbackRange> {
    vec![
        FeedbackRange {
            min_correct: 5,
            message: "Excellent understanding of the Code of Ethics.".to_string(),
        },
        FeedbackRange {
            min_correct: 3,
            message: "Good understanding, review areas of improvement.".to_string(),
        },
        FeedbackRange {
            min_correct: 0,
            message: "Please review the Code of Ethics and attend additional training.".to_string(),
        },
    ]
}

/// Applies the invariants every stored configuration must satisfy: messages
/// trimmed and non-empty, thresholds clamped to >= 0, sorted descending by
/// threshold.
pub fn normalize(ranges: Vec<FeedbackRange>) -> Vec<FeedbackRange> {
    let mut normalized: Vec<FeedbackRange> = ranges
        .into_iter()
        .map(|range| FeedbackRange {
            min_correct: range.min_correct.max(0),
            message: range.message.trim().to_string(),
        })
        .filter(|range| !range.message.is_empty())
        .collect();
    normalized.sort_by(|a, b| b.min_correct.cmp(&a.min_correct));
    normalized
}

/// Parses an asset's stored configuration, falling back to the default list
/// when the blob is absent, malformed, or normalizes to nothing.
pub fn load_ranges(raw: Option<&str>) -> Vec<FeedbackRange> {
    raw.and_then(|blob| serde_json::from_str::<FeedbackConfig>(blob).ok())
        .map(|config| normalize(config.ranges))
        .filter(|ranges| !ranges.is_empty())
        .unwrap_or_else(default_ranges)
}

/// Returns the message of the first range (descending by threshold) whose
/// `min_correct` is satisfied. If nothing matches, the lowest-threshold
/// built-in message is the ultimate fallback, so a message is always
/// produced.
pub fn resolve(correct_count: i64, ranges: &[FeedbackRange]) -> String {
    if let Some(range) = ranges.iter().find(|r| r.min_correct <= correct_count) {
        return range.message.clone();
    }

    default_ranges()
        .last()
        .map(|range| range.message.clone())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(min_correct: i64, message: &str) -> FeedbackRange {
        FeedbackRange {
            min_correct,
            message: message.to_string(),
        }
    }

    #[test]
    fn default_list_resolves_by_descending_threshold() {
        let ranges = default_ranges();
        assert_eq!(
            resolve(4, &ranges),
            "Good understanding, review areas of improvement."
        );
        assert_eq!(
            resolve(5, &ranges),
            "Excellent understanding of the Code of Ethics."
        );
        assert_eq!(
            resolve(0, &ranges),
            "Please review the Code of Ethics and attend additional training."
        );
    }

    #[test]
    fn normalize_trims_sorts_and_drops_empty_messages() {
        let normalized = normalize(vec![
            range(2, "  keep going  "),
            range(-3, "floor me"),
            range(7, "   "),
            range(5, "well done"),
        ]);

        assert_eq!(
            normalized,
            vec![
                range(5, "well done"),
                range(2, "keep going"),
                range(0, "floor me"),
            ]
        );
    }

    #[test]
    fn load_falls_back_on_malformed_blob() {
        assert_eq!(load_ranges(None), default_ranges());
        assert_eq!(load_ranges(Some("not json")), default_ranges());
        assert_eq!(load_ranges(Some("{\"ranges\": []}")), default_ranges());
        // All entries normalized away counts as unconfigured too.
        assert_eq!(
            load_ranges(Some("{\"ranges\": [{\"minCorrect\": 3, \"message\": \"  \"}]}")),
            default_ranges()
        );
    }

    #[test]
    fn load_accepts_valid_custom_config() {
        let ranges = load_ranges(Some(
            "{\"ranges\": [{\"minCorrect\": 1, \"message\": \"ok\"}, {\"minCorrect\": 8, \"message\": \"great\"}]}",
        ));
        assert_eq!(ranges, vec![range(8, "great"), range(1, "ok")]);
        assert_eq!(resolve(9, &ranges), "great");
        assert_eq!(resolve(2, &ranges), "ok");
    }

    #[test]
    fn unmatched_custom_ranges_fall_back_to_lowest_default() {
        let ranges = vec![range(10, "only for perfection")];
        assert_eq!(
            resolve(3, &ranges),
            "Please review the Code of Ethics and attend additional training."
        );
    }
}
