use regex::Regex;
use serde_json::Value;
use std::collections::HashSet;

/// Structural comparison of response payloads across probe identities.
///
/// Keys are extracted as dotted paths (`user.profile.email`, `items[].id`)
/// so two payloads can be compared by shape without caring about values
/// that legitimately differ per identity.
pub struct PayloadDiffer {
    ignore_patterns: Vec<String>,
    sensitive_patterns: Vec<Regex>,
}

impl PayloadDiffer {
    pub fn new(ignore_patterns: Vec<String>) -> Self {
        let sensitive_patterns = [
            r"(?i)password",
            r"(?i)secret",
            r"(?i)token",
            r"(?i)api[_-]?key",
            r"(?i)private",
            r"(?i)internal",
            r"(?i)ssn",
            r"(?i)credit[_-]?card",
            r"(?i)cvv",
            r"(?i)account[_-]?number",
        ]
        .iter()
        .filter_map(|p| Regex::new(p).ok())
        .collect();

        Self {
            ignore_patterns,
            sensitive_patterns,
        }
    }

    pub fn extract_keys(&self, value: &Value) -> HashSet<String> {
        let mut keys = HashSet::new();
        self.walk_json(value, String::new(), &mut keys);
        self.filter_ignored(keys)
    }

    /// Key paths a schema fragment declares, in the same dotted-path shape
    /// as [`extract_keys`](Self::extract_keys), so declared and observed
    /// key sets compare directly.
    pub fn schema_keys(&self, schema: &Value) -> HashSet<String> {
        let mut keys = HashSet::new();
        self.walk_schema(schema, String::new(), &mut keys);
        self.filter_ignored(keys)
    }

    pub fn keys_match(&self, keys1: &HashSet<String>, keys2: &HashSet<String>) -> bool {
        keys1 == keys2
    }

    pub fn extra_keys<'a>(
        &self,
        base: &'a HashSet<String>,
        compare: &'a HashSet<String>,
    ) -> Vec<&'a String> {
        compare.difference(base).collect()
    }

    pub fn length_diff_ratio(&self, len1: usize, len2: usize) -> f64 {
        if len1 == 0 && len2 == 0 {
            return 0.0;
        }
        let max_len = len1.max(len2) as f64;
        let diff = (len1 as i64 - len2 as i64).unsigned_abs() as f64;
        diff / max_len
    }

    /// Key paths whose names look like credentials or PII.
    pub fn sensitive_keys(&self, keys: &HashSet<String>) -> Vec<String> {
        let mut hits: Vec<String> = keys
            .iter()
            .filter(|key| self.sensitive_patterns.iter().any(|p| p.is_match(key)))
            .cloned()
            .collect();
        hits.sort();
        hits
    }

    fn walk_json(&self, value: &Value, prefix: String, keys: &mut HashSet<String>) {
        match value {
            Value::Object(map) => {
                for (key, val) in map {
                    let path = if prefix.is_empty() {
                        key.clone()
                    } else {
                        format!("{}.{}", prefix, key)
                    };
                    keys.insert(path.clone());
                    self.walk_json(val, path, keys);
                }
            }
            Value::Array(arr) => {
                if !prefix.is_empty() {
                    let array_path = format!("{}[]", prefix);
                    keys.insert(array_path.clone());
                    if let Some(first) = arr.first() {
                        self.walk_json(first, array_path, keys);
                    }
                }
            }
            _ => {}
        }
    }

    fn walk_schema(&self, schema: &Value, prefix: String, keys: &mut HashSet<String>) {
        if let Some(props) = schema.get("properties").and_then(|p| p.as_object()) {
            for (name, sub) in props {
                let path = if prefix.is_empty() {
                    name.clone()
                } else {
                    format!("{}.{}", prefix, name)
                };
                keys.insert(path.clone());
                self.walk_schema(sub, path, keys);
            }
        }
        if let Some(items) = schema.get("items") {
            if !prefix.is_empty() {
                let array_path = format!("{}[]", prefix);
                keys.insert(array_path.clone());
                self.walk_schema(items, array_path, keys);
            }
        }
    }

    fn filter_ignored(&self, keys: HashSet<String>) -> HashSet<String> {
        if self.ignore_patterns.is_empty() {
            return keys;
        }
        keys.into_iter()
            .filter(|key| {
                !self
                    .ignore_patterns
                    .iter()
                    .any(|pattern| key.contains(pattern) || key.ends_with(pattern))
            })
            .collect()
    }
}

impl Default for PayloadDiffer {
    fn default() -> Self {
        Self::new(vec!["timestamp".to_string(), "updated_at".to_string()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_keys_nested() {
        let differ = PayloadDiffer::new(Vec::new());
        let value = json!({
            "user": {
                "id": 1,
                "profile": { "email": "a@example.com" }
            }
        });

        let keys = differ.extract_keys(&value);
        assert!(keys.contains("user"));
        assert!(keys.contains("user.id"));
        assert!(keys.contains("user.profile.email"));
    }

    #[test]
    fn test_extract_keys_array() {
        let differ = PayloadDiffer::new(Vec::new());
        let value = json!({ "items": [{ "id": 1 }] });
        let keys = differ.extract_keys(&value);
        assert!(keys.contains("items[]"));
        assert!(keys.contains("items[].id"));
    }

    #[test]
    fn test_schema_keys_match_extract_shape() {
        let differ = PayloadDiffer::new(Vec::new());
        let schema = json!({
            "properties": {
                "amount": { "type": "number" },
                "user": { "properties": { "email": {} } },
                "items": { "type": "array", "items": { "properties": { "id": {} } } }
            }
        });

        let declared = differ.schema_keys(&schema);
        assert!(declared.contains("amount"));
        assert!(declared.contains("user.email"));
        assert!(declared.contains("items[].id"));

        let observed = differ.extract_keys(&json!({
            "amount": 1,
            "user": { "email": "a@example.com" },
            "items": [{ "id": 1 }]
        }));
        assert!(differ.keys_match(&declared, &observed));
    }

    #[test]
    fn test_extra_keys_against_schema() {
        let differ = PayloadDiffer::new(Vec::new());
        let declared = differ.schema_keys(&json!({ "properties": { "amount": {} } }));
        let observed = differ.extract_keys(&json!({ "amount": 1, "owner_ssn": "x" }));

        assert!(!differ.keys_match(&declared, &observed));
        let extra = differ.extra_keys(&declared, &observed);
        assert_eq!(extra, vec!["owner_ssn"]);
    }

    #[test]
    fn test_length_diff_ratio() {
        let differ = PayloadDiffer::new(Vec::new());
        assert_eq!(differ.length_diff_ratio(100, 100), 0.0);
        assert_eq!(differ.length_diff_ratio(100, 50), 0.5);
        assert_eq!(differ.length_diff_ratio(0, 0), 0.0);
    }

    #[test]
    fn test_sensitive_keys() {
        let differ = PayloadDiffer::new(Vec::new());
        let keys: HashSet<String> = ["user.password_hash", "user.name", "billing.credit_card"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        let hits = differ.sensitive_keys(&keys);
        assert_eq!(hits, vec!["billing.credit_card", "user.password_hash"]);
    }

    #[test]
    fn test_ignored_patterns_filtered() {
        let differ = PayloadDiffer::default();
        let value = json!({ "id": 1, "timestamp": 123 });
        let keys = differ.extract_keys(&value);
        assert!(keys.contains("id"));
        assert!(!keys.contains("timestamp"));
    }
}
