use crate::config::AnalyticsSettings;
use crate::error::{CoreError, CoreResult};
use crate::gateway::{self, Call, QueryContext, RoleGate};
use crate::ipc::error::{err, respond};
use crate::ipc::types::{AppState, Request};
use serde::Serialize;

/// Runs one gated read through the gateway and wraps the outcome in the
/// response envelope.
pub fn run<P, T, V, Q>(
    state: &AppState,
    req: &Request,
    gate: RoleGate,
    validate: V,
    query: Q,
) -> serde_json::Value
where
    T: Serialize,
    V: FnOnce(&serde_json::Value, &AnalyticsSettings) -> CoreResult<P>,
    Q: FnOnce(&QueryContext<'_>, P) -> CoreResult<T>,
{
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let call = Call {
        method: &req.method,
        actor: req.actor.as_ref(),
        params: &req.params,
        gate,
    };
    respond(&req.id, gateway::execute(conn, state.clock, call, validate, query))
}

pub fn no_params(_: &serde_json::Value, _: &AnalyticsSettings) -> CoreResult<()> {
    Ok(())
}

pub fn required_id(params: &serde_json::Value, key: &str) -> CoreResult<i64> {
    params
        .get(key)
        .and_then(|v| v.as_i64())
        .filter(|n| *n > 0)
        .ok_or_else(|| CoreError::bad_params(format!("missing or invalid params.{key}")))
}

pub fn optional_academic_year(params: &serde_json::Value) -> CoreResult<Option<i64>> {
    match params.get("academicYear") {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(v) => v
            .as_i64()
            .filter(|y| (1900..=9999).contains(y))
            .map(Some)
            .ok_or_else(|| CoreError::bad_params("academicYear must be an integer in 1900..=9999")),
    }
}

/// `studentId` plus the optional `academicYear` override.
pub fn student_detail_params(
    params: &serde_json::Value,
    _: &AnalyticsSettings,
) -> CoreResult<(i64, Option<i64>)> {
    Ok((
        required_id(params, "studentId")?,
        optional_academic_year(params)?,
    ))
}
