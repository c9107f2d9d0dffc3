use crate::error::{CoreError, CoreResult};
use serde::Serialize;
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

pub fn core_err(id: &str, e: &CoreError) -> serde_json::Value {
    let details = match e {
        CoreError::NotFound(entity) => Some(json!({ "entity": entity })),
        CoreError::Forbidden { role, method } => Some(json!({ "role": role, "method": method })),
        _ => None,
    };
    err(id, e.code(), e.to_string(), details)
}

pub fn respond<T: Serialize>(id: &str, result: CoreResult<T>) -> serde_json::Value {
    match result.and_then(|v| {
        serde_json::to_value(v).map_err(|e| CoreError::Store(format!("encode result: {e}")))
    }) {
        Ok(v) => ok(id, v),
        Err(e) => core_err(id, &e),
    }
}
