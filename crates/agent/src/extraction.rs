//! Recovery of structured values from free-form model output.
//!
//! Models asked for "only JSON" still wrap it in prose or code fences. Every
//! function here is total: malformed input degrades to defaults instead of failing.

use serde_json::{Map, Value};

use tablechat_core::{Intent, IntentAction, QueryParameters, DEFAULT_MAX_RECORDS};

/// Greedy span from the first `{` to the last `}`, inclusive.
pub fn json_object_span(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (end > start).then(|| &raw[start..=end])
}

fn json_object(raw: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(json_object_span(raw)?) {
        Ok(Value::Object(object)) => Some(object),
        _ => None,
    }
}

pub fn extract_query_parameters(raw: &str) -> QueryParameters {
    let Some(object) = json_object(raw) else {
        return QueryParameters::default();
    };

    let fields = object
        .get("fields")
        .and_then(Value::as_array)
        .map(|entries| entries.iter().filter_map(Value::as_str).map(str::to_string).collect())
        .unwrap_or_default();
    let filter_by_formula =
        object.get("filterByFormula").and_then(Value::as_str).unwrap_or_default().to_string();
    let max_records =
        object.get("maxRecords").and_then(positive_count).unwrap_or(DEFAULT_MAX_RECORDS);

    QueryParameters { fields, filter_by_formula, max_records }
}

pub fn extract_intent(raw: &str) -> Intent {
    let Some(object) = json_object(raw) else {
        return Intent::unknown();
    };

    let action = object
        .get("action")
        .and_then(Value::as_str)
        .map(IntentAction::parse_lenient)
        .unwrap_or(IntentAction::Unknown);
    let confidence = object.get("confidence").and_then(Value::as_f64).unwrap_or(0.0);

    Intent::new(action, confidence as f32)
}

fn positive_count(value: &Value) -> Option<u32> {
    if let Some(count) = value.as_u64() {
        return (count > 0).then(|| u32::try_from(count).unwrap_or(u32::MAX));
    }

    let float = value.as_f64()?;
    (float >= 1.0 && float.fract() == 0.0).then(|| float.min(f64::from(u32::MAX)) as u32)
}
