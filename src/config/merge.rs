//! Configuration merge logic
//!
//! - Tables: merged key by key, recursively
//! - Arrays: replaced wholesale by the later layer
//! - Scalars: later layer wins

use serde_json::Value;

/// Merge `overlay` onto `base`.
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut merged), Value::Object(overlay)) => {
            for (key, value) in overlay {
                let next = match merged.remove(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => value,
                };
                merged.insert(key, next);
            }
            Value::Object(merged)
        }
        (_, overlay) => overlay,
    }
}

/// Merge layers in order; the last layer has the highest precedence.
pub fn merge_layers<I: IntoIterator<Item = Value>>(layers: I) -> Value {
    layers.into_iter().fold(Value::Null, deep_merge)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_nested_tables_merge() {
        let base = json!({"exclude": {"dir_names": ["build"], "patterns": []}});
        let overlay = json!({"exclude": {"patterns": ["*.log"]}});
        let result = deep_merge(base, overlay);

        assert_eq!(result["exclude"]["dir_names"], json!(["build"]));
        assert_eq!(result["exclude"]["patterns"], json!(["*.log"]));
    }

    #[test]
    fn test_arrays_replaced() {
        let base = json!({"resolve": {"manifest_files": ["setup.cfg", "pyproject.toml"]}});
        let overlay = json!({"resolve": {"manifest_files": ["setup.cfg"]}});
        let result = deep_merge(base, overlay);

        assert_eq!(result["resolve"]["manifest_files"], json!(["setup.cfg"]));
    }

    #[test]
    fn test_layer_precedence() {
        let result = merge_layers(vec![
            json!({"install": {"python": "python3"}, "compose": {"entry_point": "__init__.py"}}),
            json!({"install": {"python": "python3.12"}}),
            json!({"compose": {"entry_point": "main.py"}}),
            json!({"install": {"python": "/opt/py/bin/python"}}),
        ]);

        assert_eq!(result["install"]["python"], "/opt/py/bin/python");
        assert_eq!(result["compose"]["entry_point"], "main.py");
    }

    #[test]
    fn test_no_layers_is_null() {
        assert!(merge_layers(Vec::new()).is_null());
    }
}
