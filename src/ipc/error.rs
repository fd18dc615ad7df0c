use crate::error::EngineError;
use serde_json::json;

pub fn ok(id: &str, result: serde_json::Value) -> serde_json::Value {
    json!({
        "id": id,
        "ok": true,
        "result": result
    })
}

pub fn err(
    id: &str,
    code: &str,
    message: impl Into<String>,
    details: Option<serde_json::Value>,
) -> serde_json::Value {
    let mut error = json!({
        "code": code,
        "message": message.into(),
    });
    if let Some(d) = details {
        error["details"] = d;
    }
    json!({
        "id": id,
        "ok": false,
        "error": error,
    })
}

/// Maps an engine error onto the wire error object. `details.category` is
/// always present so callers can branch on validation/precondition/not_found.
pub fn engine_err(id: &str, e: &EngineError) -> serde_json::Value {
    let mut details = json!({ "category": e.category() });
    match e {
        EngineError::CrossClassSelection {
            student_id,
            class_id,
        } => {
            details["studentId"] = json!(student_id);
            details["classId"] = json!(class_id);
        }
        EngineError::InactiveStudent { student_id, status } => {
            details["studentId"] = json!(student_id);
            details["status"] = json!(status);
        }
        EngineError::InvalidTransition { from, to } => {
            details["fromStatus"] = json!(from);
            details["toStatus"] = json!(to);
        }
        EngineError::NotFound { entity, id } => {
            details["entity"] = json!(entity);
            details["id"] = json!(id);
        }
        EngineError::Duplicate { entity, key } => {
            details["entity"] = json!(entity);
            details["key"] = json!(key);
        }
        _ => {}
    }
    err(id, e.code(), e.to_string(), Some(details))
}
