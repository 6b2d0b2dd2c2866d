//! Cumulative answer store and draft rendering.

use std::collections::BTreeMap;

/// Overlay `updates` on `previous`. Keys are only ever added or overwritten.
#[must_use]
pub fn merge_answers(
    previous: &BTreeMap<String, String>,
    updates: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    let mut merged = previous.clone();
    merged.extend(updates.iter().map(|(k, v)| (k.clone(), v.clone())));
    merged
}

/// Render the draft form: one `Field: answer` line per field, in form order.
/// Fields without an answer yet are rendered with an empty value.
#[must_use]
pub fn format_draft(fields: &[String], answers: &BTreeMap<String, String>) -> String {
    fields
        .iter()
        .map(|field| {
            let answer = answers.get(field).map_or("", |a| a.trim());
            if answer.is_empty() {
                format!("{field}:")
            } else {
                format!("{field}: {answer}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_updates_overwrite_and_add() {
        let previous = map(&[("First Name", "Ana"), ("Last Name", "Lee")]);
        let updates = map(&[("Last Name", "Lin"), ("Email", "ana@example.com")]);
        let merged = merge_answers(&previous, &updates);
        assert_eq!(
            merged,
            map(&[
                ("Email", "ana@example.com"),
                ("First Name", "Ana"),
                ("Last Name", "Lin")
            ])
        );
    }

    #[test]
    fn test_format_draft_follows_field_order() {
        let fields = vec!["Last Name".to_string(), "First Name".to_string()];
        let answers = map(&[("First Name", " Ana\n"), ("Last Name", "Lin")]);
        assert_eq!(format_draft(&fields, &answers), "Last Name: Lin\nFirst Name: Ana");
    }

    #[test]
    fn test_format_draft_leaves_missing_answers_blank() {
        let fields = vec!["Phone".to_string()];
        assert_eq!(format_draft(&fields, &BTreeMap::new()), "Phone:");
    }

    fn answers() -> impl Strategy<Value = BTreeMap<String, String>> {
        prop::collection::btree_map("[a-z]{1,6}", "[a-z ]{0,10}", 0..8)
    }

    proptest! {
        #[test]
        fn prop_merge_with_empty_is_identity(a in answers()) {
            prop_assert_eq!(merge_answers(&a, &BTreeMap::new()), a);
        }

        #[test]
        fn prop_merge_is_idempotent(a in answers(), b in answers()) {
            let once = merge_answers(&a, &b);
            prop_assert_eq!(merge_answers(&a, &once), once.clone());
            prop_assert_eq!(merge_answers(&once, &b), once);
        }

        #[test]
        fn prop_merge_never_shrinks(a in answers(), b in answers()) {
            let merged = merge_answers(&a, &b);
            prop_assert!(a.keys().all(|k| merged.contains_key(k)));
            prop_assert!(b.iter().all(|(k, v)| merged.get(k) == Some(v)));
        }
    }
}
