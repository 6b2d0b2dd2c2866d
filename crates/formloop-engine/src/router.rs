//! Feedback routing: which fields a revision round re-queries.

/// Case-insensitive partial similarity on a 0-100 scale.
///
/// The shorter string is aligned against every window of the same length in
/// the longer one; the best window's longest-common-subsequence ratio wins.
#[must_use]
pub fn partial_ratio(a: &str, b: &str) -> u8 {
    let a: Vec<char> = a.to_lowercase().chars().collect();
    let b: Vec<char> = b.to_lowercase().chars().collect();
    let (shorter, longer) = if a.len() <= b.len() { (a, b) } else { (b, a) };

    if shorter.is_empty() {
        return if longer.is_empty() { 100 } else { 0 };
    }

    let m = shorter.len();
    let best = longer
        .windows(m)
        .map(|window| lcs_len(&shorter, window))
        .max()
        .unwrap_or(0);

    ((best as f64 / m as f64) * 100.0).round() as u8
}

fn lcs_len(a: &[char], b: &[char]) -> usize {
    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];
    for &ca in a {
        for (j, &cb) in b.iter().enumerate() {
            curr[j + 1] = if ca == cb {
                prev[j] + 1
            } else {
                curr[j].max(prev[j + 1])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// Fields whose similarity to `feedback` is strictly above `threshold`, in
/// their original order. Falls back to every field when none qualifies, so
/// the result is never empty for a non-empty `fields`.
#[must_use]
pub fn route(fields: &[String], feedback: &str, threshold: u8) -> Vec<String> {
    let matched: Vec<String> = fields
        .iter()
        .filter(|field| partial_ratio(field, feedback) > threshold)
        .cloned()
        .collect();

    if matched.is_empty() {
        tracing::debug!(
            threshold = threshold,
            field_count = fields.len(),
            "No field matched feedback, re-querying all fields"
        );
        fields.to_vec()
    } else {
        matched
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn fields(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_partial_ratio_exact_substring() {
        assert_eq!(partial_ratio("Last Name", "fix the last name"), 100);
        assert_eq!(partial_ratio("fix the last name", "Last Name"), 100);
    }

    #[test]
    fn test_partial_ratio_near_miss() {
        assert_eq!(partial_ratio("First Name", "fix the last name"), 70);
        assert_eq!(partial_ratio("", ""), 100);
        assert_eq!(partial_ratio("", "anything"), 0);
    }

    #[test]
    fn test_route_narrows_to_matching_field() {
        let all = fields(&["First Name", "Last Name"]);
        assert_eq!(route(&all, "fix the last name", 80), fields(&["Last Name"]));
    }

    #[test]
    fn test_route_keeps_original_order() {
        let all = fields(&["Email", "Phone", "Address"]);
        let routed = route(&all, "the address and the phone are wrong", 80);
        assert_eq!(routed, fields(&["Phone", "Address"]));
    }

    #[test]
    fn test_route_falls_back_to_all_fields() {
        let all = fields(&["First Name", "Last Name"]);
        assert_eq!(route(&all, "please try again", 80), all);
    }

    #[test]
    fn test_threshold_is_strict() {
        let all = fields(&["First Name", "Last Name"]);
        // First Name scores exactly 70 here and must not pass a threshold of 70.
        assert_eq!(route(&all, "fix the last name", 70), fields(&["Last Name"]));
        assert_eq!(
            route(&all, "fix the last name", 69),
            fields(&["First Name", "Last Name"])
        );
    }

    proptest! {
        #[test]
        fn prop_route_never_empty(
            names in prop::collection::vec("[a-zA-Z ]{1,12}", 1..6),
            feedback in ".{0,40}",
            threshold in 0u8..=100,
        ) {
            let routed = route(&names, &feedback, threshold);
            prop_assert!(!routed.is_empty());
            prop_assert!(routed.iter().all(|f| names.contains(f)));
        }

        #[test]
        fn prop_ratio_in_range(a in ".{0,20}", b in ".{0,20}") {
            let r = partial_ratio(&a, &b);
            prop_assert!(r <= 100);
            prop_assert_eq!(r, partial_ratio(&b, &a));
        }
    }
}
