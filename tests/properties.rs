//! Property-based tests for column resolution, sanitization and sheet titles

use gridexport::columns::{resolve_columns, snake_case, ColumnResolver, ExclusionSet};
use gridexport::sanitize::{sanitize, strip_tags};
use gridexport::sink::sheet_title;
use gridexport::types::ColumnSpec;
use proptest::prelude::*;

fn column_keys() -> impl Strategy<Value = Vec<String>> {
    prop::collection::hash_set("[a-z]{1,6}(_[a-z]{1,4})?", 0..12)
        .prop_map(|keys| keys.into_iter().collect())
}

fn specs(keys: &[String]) -> Vec<ColumnSpec> {
    keys.iter()
        .map(|key| ColumnSpec::new(key.clone(), key.to_uppercase()))
        .collect()
}

proptest! {
    #[test]
    fn resolved_columns_keep_visible_order(
        keys in column_keys(),
        picks in prop::collection::vec(any::<prop::sample::Index>(), 0..6),
    ) {
        let excluded: ExclusionSet = picks
            .iter()
            .filter(|_| !keys.is_empty())
            .map(|idx| keys[idx.index(keys.len())].clone())
            .collect();

        let headings = resolve_columns(&specs(&keys), &excluded);
        let expected: Vec<&String> = keys.iter().filter(|k| !excluded.excludes(k)).collect();
        let actual: Vec<&String> = headings.keys().collect();

        prop_assert_eq!(actual, expected);
        for (key, label) in &headings {
            prop_assert_eq!(label, &key.to_uppercase());
        }
    }

    #[test]
    fn resolver_is_idempotent(keys in column_keys(), late in "[a-z]{1,6}") {
        let visible = specs(&keys);
        let mut resolver = ColumnResolver::new();

        let first = resolver.resolve(&visible, &ExclusionSet::new()).clone();
        let late: ExclusionSet = [late].into_iter().collect();
        let second = resolver.resolve(&visible, &late).clone();

        prop_assert_eq!(first, second);
    }

    #[test]
    fn lowercase_keys_are_already_snake_case(key in "[a-z]{1,12}") {
        prop_assert_eq!(snake_case(&key), key);
    }

    #[test]
    fn sanitize_never_panics(raw in any::<String>()) {
        let _ = sanitize(Some(&raw));
    }

    #[test]
    fn sanitize_removes_scripts(before in "[a-zA-Z ]{0,10}", body in "[a-z();]{0,20}", after in "[a-zA-Z ]{0,10}") {
        let raw = format!("{}<script type=\"text/javascript\">{}</script>{}", before, body, after);
        let clean = sanitize(Some(&raw));

        prop_assert_eq!(clean, format!("{}{}", before, after).trim().to_string());
    }

    #[test]
    fn plain_text_survives_tag_stripping(text in "[^<]{0,40}") {
        prop_assert_eq!(strip_tags(&text), text);
    }

    #[test]
    fn sheet_titles_are_valid(raw in any::<String>()) {
        let title = sheet_title(&raw);

        prop_assert!(!title.is_empty());
        prop_assert!(title.chars().count() <= 31);
        prop_assert!(!title.contains(['[', ']', ':', '*', '?', '/', '\\']));
        prop_assert!(!title.starts_with('\''));
        prop_assert!(!title.ends_with('\''));
    }
}
