//! Aggregation strategies

use serde_json::{Map, Value, json};
use tracing::debug;

use crate::protocol::{ErrorCode, error_payload, payload_succeeded};

/// How N per-window payloads collapse into one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AggregationStrategy {
    /// The Primary window's payload, else the first to arrive
    #[default]
    First,

    /// Concatenate the list at `data.<field>` of every successful payload
    Merge { field: &'static str },

    /// Concatenate `data` and `errors` arrays; failed windows become errors
    MergeWithErrors,
}

impl AggregationStrategy {
    /// Collapse `responses` (in arrival order) into one payload
    pub fn aggregate(&self, primary_window: &str, responses: &[(String, Value)]) -> Value {
        debug!(strategy = ?self, count = %responses.len(), "AggregationStrategy::aggregate: called");
        if responses.is_empty() {
            return error_payload(ErrorCode::NoResponses, "No window produced a response");
        }

        match self {
            Self::First => first(primary_window, responses),
            Self::Merge { field } => merge(field, responses),
            Self::MergeWithErrors => merge_with_errors(responses),
        }
    }
}

fn first(primary_window: &str, responses: &[(String, Value)]) -> Value {
    responses
        .iter()
        .find(|(window, _)| window == primary_window)
        .or_else(|| responses.first())
        .map(|(_, payload)| payload.clone())
        .unwrap_or_else(|| error_payload(ErrorCode::NoResponses, "No window produced a response"))
}

/// Set `window_id` on object items that lack one
fn tag(item: &Value, window: &str) -> Value {
    let mut item = item.clone();
    if let Some(obj) = item.as_object_mut()
        && !obj.contains_key("window_id")
    {
        obj.insert("window_id".to_string(), Value::String(window.to_string()));
    }
    item
}

fn merge(field: &str, responses: &[(String, Value)]) -> Value {
    let mut base: Option<Map<String, Value>> = None;
    let mut merged = Vec::new();

    for (window, payload) in responses.iter().filter(|(_, p)| payload_succeeded(p)) {
        let data = payload.get("data");
        if base.is_none() {
            base = Some(data.and_then(Value::as_object).cloned().unwrap_or_default());
        }
        if let Some(items) = data.and_then(|d| d.get(field)).and_then(Value::as_array) {
            merged.extend(items.iter().map(|item| tag(item, window)));
        }
    }

    match base {
        Some(mut data) => {
            data.insert(field.to_string(), Value::Array(merged));
            json!({ "success": true, "data": data })
        }
        // Every window failed
        None => responses[0].1.clone(),
    }
}

fn merge_with_errors(responses: &[(String, Value)]) -> Value {
    let mut data = Vec::new();
    let mut errors = Vec::new();

    for (window, payload) in responses {
        if !payload_succeeded(payload) {
            errors.push(json!({
                "window_id": window,
                "error": payload.get("error").cloned().unwrap_or(Value::Null),
                "errorCode": payload.get("errorCode").cloned().unwrap_or(Value::Null),
            }));
            continue;
        }

        match payload.get("data") {
            Some(Value::Array(items)) => data.extend(items.iter().map(|item| tag(item, window))),
            Some(Value::Null) | None => {}
            Some(other) => data.push(tag(other, window)),
        }

        if let Some(items) = payload.get("errors").and_then(Value::as_array) {
            errors.extend(items.iter().map(|item| tag(item, window)));
        }
    }

    json!({ "success": true, "data": data, "errors": errors })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::success_payload;

    fn hits(n: usize) -> Value {
        let results: Vec<Value> = (0..n).map(|i| json!({"line": i})).collect();
        success_payload(json!({ "results": results }))
    }

    #[test]
    fn test_empty_input_is_no_responses() {
        for strategy in [
            AggregationStrategy::First,
            AggregationStrategy::Merge { field: "results" },
            AggregationStrategy::MergeWithErrors,
        ] {
            let out = strategy.aggregate("w-1", &[]);
            assert_eq!(out["success"], false);
            assert_eq!(out["errorCode"], "NO_RESPONSES");
        }
    }

    #[test]
    fn test_first_prefers_primary() {
        let responses = vec![
            ("w-2".to_string(), success_payload(json!("second"))),
            ("w-1".to_string(), success_payload(json!("primary"))),
        ];
        assert_eq!(AggregationStrategy::First.aggregate("w-1", &responses)["data"], "primary");
        assert_eq!(AggregationStrategy::First.aggregate("w-9", &responses)["data"], "second");
    }

    #[test]
    fn test_merge_concatenates_and_tags() {
        let responses = vec![
            ("w-1".to_string(), hits(2)),
            ("w-2".to_string(), hits(3)),
            (
                "w-3".to_string(),
                error_payload(ErrorCode::WorkspaceNotTrusted, "untrusted"),
            ),
        ];

        let out = AggregationStrategy::Merge { field: "results" }.aggregate("w-1", &responses);
        let results = out["data"]["results"].as_array().unwrap();
        assert_eq!(out["success"], true);
        assert_eq!(results.len(), 5);
        assert_eq!(results[0]["window_id"], "w-1");
        assert_eq!(results[4]["window_id"], "w-2");
        assert_eq!(results[4]["line"], 2);
    }

    #[test]
    fn test_merge_keeps_existing_window_id() {
        let responses = vec![(
            "w-1".to_string(),
            success_payload(json!({"files": [{"uri": "a", "window_id": "w-7"}]})),
        )];
        let out = AggregationStrategy::Merge { field: "files" }.aggregate("w-1", &responses);
        assert_eq!(out["data"]["files"][0]["window_id"], "w-7");
    }

    #[test]
    fn test_merge_all_failed_returns_first_failure() {
        let responses = vec![
            ("w-1".to_string(), error_payload(ErrorCode::NoWorkspaceOpen, "none")),
            ("w-2".to_string(), error_payload(ErrorCode::WorkspaceNotTrusted, "untrusted")),
        ];
        let out = AggregationStrategy::Merge { field: "results" }.aggregate("w-1", &responses);
        assert_eq!(out["errorCode"], "NO_WORKSPACE_OPEN");
    }

    #[test]
    fn test_merge_with_errors() {
        let responses = vec![
            (
                "w-1".to_string(),
                json!({
                    "success": true,
                    "data": [{"uri": "a"}],
                    "errors": [{"uri": "b", "error": "missing"}],
                }),
            ),
            ("w-2".to_string(), error_payload(ErrorCode::NoWorkspaceOpen, "none")),
            ("w-3".to_string(), success_payload(json!([{"uri": "c"}, {"uri": "d"}]))),
        ];

        let out = AggregationStrategy::MergeWithErrors.aggregate("w-1", &responses);
        assert_eq!(out["success"], true);

        let data = out["data"].as_array().unwrap();
        assert_eq!(data.len(), 3);
        assert_eq!(data[2]["window_id"], "w-3");

        let errors = out["errors"].as_array().unwrap();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0]["window_id"], "w-1");
        assert_eq!(errors[1]["window_id"], "w-2");
        assert_eq!(errors[1]["errorCode"], "NO_WORKSPACE_OPEN");
    }
}
