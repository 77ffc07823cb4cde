use serde_json::{Map, Value};

/// Extracts one JSON object from free-form model text.
///
/// Parses the slice from the first `{` to the last `}`. Returns `None` when either brace
/// is missing, when they are out of order, or when the slice is not a JSON object.
/// Trailing content containing `}` after the real object breaks extraction; see the
/// module docs.
pub fn extract_json_object(text: &str) -> Option<Map<String, Value>> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    match serde_json::from_str::<Value>(&text[start..=end]) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}
