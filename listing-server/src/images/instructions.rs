//! Image instructions carried by property create/update payloads
//!
//! Clients send `images`, `imagesToRemove` and `replaceImages` in several
//! shapes (JSON arrays, single values, JSON-encoded strings from multipart
//! forms, comma-separated lists). They are normalized once here.

use serde_json::Value;

/// Normalized image instructions for one mutation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageInstructions {
    /// Image ids the client wants to keep (or attach, for staged uploads)
    pub keep: Vec<String>,
    /// Image ids to delete
    pub remove: Vec<String>,
    /// Drop every existing image and use only the new uploads
    pub replace_all: bool,
}

impl ImageInstructions {
    pub const KEEP_FIELD: &'static str = "images";
    pub const REMOVE_FIELD: &'static str = "imagesToRemove";
    pub const REPLACE_FIELD: &'static str = "replaceImages";

    /// Read the instruction fields out of a structured payload
    pub fn from_payload(payload: &Value) -> Self {
        Self {
            keep: reference_list(payload.get(Self::KEEP_FIELD)),
            remove: reference_list(payload.get(Self::REMOVE_FIELD)),
            replace_all: replace_flag(payload.get(Self::REPLACE_FIELD)),
        }
    }

    /// References parsed as image ids; anything non-numeric is returned separately
    pub fn parse_ids(references: &[String]) -> (Vec<i64>, Vec<String>) {
        let mut ids = Vec::with_capacity(references.len());
        let mut invalid = Vec::new();
        for reference in references {
            match reference.trim().parse::<i64>() {
                Ok(id) if id > 0 => {
                    if !ids.contains(&id) {
                        ids.push(id);
                    }
                }
                _ => invalid.push(reference.clone()),
            }
        }
        (ids, invalid)
    }
}

/// Normalize a reference list field into strings
pub fn reference_list(value: Option<&Value>) -> Vec<String> {
    match value {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items.iter().filter_map(scalar_to_string).collect(),
        Some(Value::String(s)) => string_list(s),
        Some(other) => scalar_to_string(other).into_iter().collect(),
    }
}

/// `true`, `"true"` and `"1"` mean replace; anything else does not
pub fn replace_flag(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => matches!(s.trim(), "true" | "1"),
        Some(Value::Number(n)) => n.as_i64() == Some(1),
        _ => false,
    }
}

fn string_list(s: &str) -> Vec<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }

    // JSON-encoded array or scalar (multipart forms)
    if let Ok(parsed) = serde_json::from_str::<Value>(trimmed) {
        match parsed {
            Value::Array(_) => return reference_list(Some(&parsed)),
            Value::Number(_) => return vec![trimmed.to_string()],
            Value::Null => return Vec::new(),
            _ => {}
        }
    }

    trimmed
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_list_shapes() {
        assert_eq!(reference_list(Some(&json!([1, "2", null]))), vec!["1", "2"]);
        assert_eq!(reference_list(Some(&json!(7))), vec!["7"]);
        assert_eq!(reference_list(Some(&json!("[3,4]"))), vec!["3", "4"]);
        assert_eq!(reference_list(Some(&json!("5, 6,"))), vec!["5", "6"]);
        assert_eq!(reference_list(Some(&json!("9"))), vec!["9"]);
        assert!(reference_list(Some(&json!(""))).is_empty());
        assert!(reference_list(Some(&json!(null))).is_empty());
        assert!(reference_list(None).is_empty());
    }

    #[test]
    fn test_replace_flag() {
        assert!(replace_flag(Some(&json!(true))));
        assert!(replace_flag(Some(&json!("true"))));
        assert!(replace_flag(Some(&json!("1"))));
        assert!(!replace_flag(Some(&json!("yes"))));
        assert!(!replace_flag(Some(&json!(false))));
        assert!(!replace_flag(None));
    }

    #[test]
    fn test_from_payload_and_parse_ids() {
        let payload = json!({
            "title": "x",
            "images": "[10, 11, 11]",
            "imagesToRemove": ["12", "abc"],
            "replaceImages": "false"
        });
        let instructions = ImageInstructions::from_payload(&payload);
        assert!(!instructions.replace_all);

        let (keep, _) = ImageInstructions::parse_ids(&instructions.keep);
        assert_eq!(keep, vec![10, 11]);
        let (remove, invalid) = ImageInstructions::parse_ids(&instructions.remove);
        assert_eq!(remove, vec![12]);
        assert_eq!(invalid, vec!["abc".to_string()]);
    }
}
