//! Deep merge of TOML value trees.
//!
//! Merging happens on raw [`toml::Value`] trees rather than deserialized
//! structs, so a key missing from an upper layer never resets the value a
//! lower layer provided.

use std::collections::BTreeSet;

/// Recursively deep-merge `overlay` into `base`.
///
/// - Tables merge recursively per-field.
/// - Scalars and arrays (including `[[app]]` lists) from the overlay
///   **replace** the base value.
pub fn deep_merge(base: &mut toml::Value, overlay: &toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                if let Some(base_val) = base_table.get_mut(key) {
                    deep_merge(base_val, overlay_val);
                } else {
                    base_table.insert(key.clone(), overlay_val.clone());
                }
            }
        },
        (base, overlay) => {
            *base = overlay.clone();
        },
    }
}

/// Dotted paths of every leaf in `value`, added to `out`.
pub fn collect_leaf_paths(value: &toml::Value, prefix: &str, out: &mut BTreeSet<String>) {
    if let toml::Value::Table(table) = value {
        for (key, child) in table {
            let path = if prefix.is_empty() {
                key.clone()
            } else {
                format!("{prefix}.{key}")
            };
            collect_leaf_paths(child, &path, out);
        }
    } else {
        out.insert(prefix.to_owned());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> toml::Value {
        toml::from_str(s).unwrap()
    }

    #[test]
    fn tables_merge_and_scalars_replace() {
        let mut base = parse(
            r#"
            [runtime]
            prefetch = false
            fetch_timeout_secs = 30
            "#,
        );
        let overlay = parse(
            r#"
            [runtime]
            prefetch = ["shop"]
            basename = "/portal"
            "#,
        );
        deep_merge(&mut base, &overlay);

        let runtime = base.get("runtime").unwrap();
        assert_eq!(runtime.get("fetch_timeout_secs").unwrap().as_integer(), Some(30));
        assert_eq!(runtime.get("basename").unwrap().as_str(), Some("/portal"));
        assert!(runtime.get("prefetch").unwrap().is_array());
    }

    #[test]
    fn app_lists_are_replaced_wholesale() {
        let mut base = parse(
            r#"
            [[app]]
            name = "a"
            [[app]]
            name = "b"
            "#,
        );
        deep_merge(&mut base, &parse("[[app]]\nname = \"c\"\n"));
        assert_eq!(base.get("app").unwrap().as_array().unwrap().len(), 1);
    }

    #[test]
    fn leaf_paths() {
        let mut out = BTreeSet::new();
        collect_leaf_paths(
            &parse("[logging]\nlevel = \"debug\"\n[runtime]\nbasename = \"/x\"\n"),
            "",
            &mut out,
        );
        assert!(out.contains("logging.level"));
        assert!(out.contains("runtime.basename"));
        assert_eq!(out.len(), 2);
    }
}
