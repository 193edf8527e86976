//! `_merge_category_vals`: reconciles a category's (possibly upgraded)
//! schema against its persisted values.

use std::collections::BTreeMap;

use foglamp_core::ConfigItem;

/// Merges `new` (the incoming schema) with `stored` (the persisted
/// category), preserving operator-set values across schema upgrades.
///
/// - For items present in both: `description`/`type`/`default` come from
///   `new`; `value` comes from `stored`.
/// - Items only in `new` are kept as-is.
/// - Items only in `stored` are kept only when `keep_original_items` is set.
pub fn merge_category_vals(
    new: &BTreeMap<String, ConfigItem>,
    stored: &BTreeMap<String, ConfigItem>,
    keep_original_items: bool,
) -> BTreeMap<String, ConfigItem> {
    let mut merged = BTreeMap::new();

    for (name, new_item) in new {
        let value = stored
            .get(name)
            .and_then(|s| s.value.clone())
            .or_else(|| new_item.value.clone());
        merged.insert(
            name.clone(),
            ConfigItem {
                description: new_item.description.clone(),
                item_type: new_item.item_type,
                default: new_item.default.clone(),
                value,
            },
        );
    }

    if keep_original_items {
        for (name, stored_item) in stored {
            merged
                .entry(name.clone())
                .or_insert_with(|| stored_item.clone());
        }
    }

    merged
}

#[cfg(test)]
mod proptests {
    use super::*;
    use foglamp_core::ItemType;
    use proptest::prelude::*;

    fn item_strategy() -> impl Strategy<Value = ConfigItem> {
        ("[a-z]{1,6}", "[a-z0-9]{1,6}", proptest::option::of("[a-z0-9]{1,6}")).prop_map(
            |(description, default, value)| ConfigItem {
                description,
                item_type: ItemType::String,
                default,
                value,
            },
        )
    }

    fn category_strategy() -> impl Strategy<Value = BTreeMap<String, ConfigItem>> {
        proptest::collection::btree_map("[a-z]{1,4}", item_strategy(), 0..6)
    }

    proptest! {
        /// The merge law: the result always contains every key from `new`,
        /// plus (when `keep_original_items`) every key from `stored` too —
        /// never fewer, and with `keep_original_items` never more than the
        /// union.
        #[test]
        fn merge_contains_union_of_keys(
            new in category_strategy(),
            stored in category_strategy(),
            keep_original_items in any::<bool>(),
        ) {
            let merged = merge_category_vals(&new, &stored, keep_original_items);
            for key in new.keys() {
                prop_assert!(merged.contains_key(key));
            }
            if keep_original_items {
                for key in stored.keys() {
                    prop_assert!(merged.contains_key(key));
                }
                let expected: std::collections::BTreeSet<_> =
                    new.keys().chain(stored.keys()).collect();
                let actual: std::collections::BTreeSet<_> = merged.keys().collect();
                prop_assert_eq!(expected, actual);
            } else {
                let actual: std::collections::BTreeSet<_> = merged.keys().collect();
                let expected: std::collections::BTreeSet<_> = new.keys().collect();
                prop_assert_eq!(expected, actual);
            }
        }

        /// For a key present in both `new` and `stored`, the merged item
        /// always keeps the stored operator value, never the new default.
        #[test]
        fn shared_keys_keep_stored_value(
            new in category_strategy(),
            stored in category_strategy(),
            keep_original_items in any::<bool>(),
        ) {
            let merged = merge_category_vals(&new, &stored, keep_original_items);
            for (key, stored_item) in &stored {
                if let (Some(merged_item), Some(stored_value)) =
                    (merged.get(key), stored_item.value.as_ref())
                {
                    if new.contains_key(key) {
                        prop_assert_eq!(merged_item.value.as_ref(), Some(stored_value));
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use foglamp_core::ItemType;

    fn item(description: &str, default: &str, value: Option<&str>) -> ConfigItem {
        ConfigItem {
            description: description.to_string(),
            item_type: ItemType::String,
            default: default.to_string(),
            value: value.map(str::to_string),
        }
    }

    #[test]
    fn schema_upgrade_preserves_operator_value_and_adds_new_item() {
        let new: BTreeMap<_, _> = [
            ("x".to_string(), item("d", "a", Some("a"))),
            ("y".to_string(), item("d2", "c", Some("c"))),
        ]
        .into();
        let stored: BTreeMap<_, _> = [("x".to_string(), item("d", "a", Some("b")))].into();

        let merged = merge_category_vals(&new, &stored, true);
        assert_eq!(merged["x"].value.as_deref(), Some("b"));
        assert_eq!(merged["y"].value.as_deref(), Some("c"));
    }

    #[test]
    fn items_only_in_stored_dropped_when_not_keeping_originals() {
        let new: BTreeMap<_, _> = [("x".to_string(), item("d", "a", Some("a")))].into();
        let stored: BTreeMap<_, _> = [
            ("x".to_string(), item("d", "a", Some("b"))),
            ("legacy".to_string(), item("old", "z", Some("z"))),
        ]
        .into();

        let merged = merge_category_vals(&new, &stored, false);
        assert!(!merged.contains_key("legacy"));
    }

    #[test]
    fn merge_contains_union_of_keys_with_keep_original_items() {
        let new: BTreeMap<_, _> = [("x".to_string(), item("d", "a", Some("a")))].into();
        let stored: BTreeMap<_, _> = [
            ("x".to_string(), item("d", "a", Some("b"))),
            ("legacy".to_string(), item("old", "z", Some("z"))),
        ]
        .into();

        let merged = merge_category_vals(&new, &stored, true);
        assert_eq!(merged.keys().collect::<Vec<_>>(), vec!["legacy", "x"]);
    }
}
