use crate::gateway::RoleGate;
use crate::ipc::helpers::{no_params, run};
use crate::ipc::types::{AppState, Request};
use crate::model::Role;
use serde_json::json;

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let resp = match req.method.as_str() {
        "setup.get" => run(state, req, RoleGate::Only(Role::Admin), no_params, |ctx, ()| {
            Ok(json!({ "analytics": ctx.settings }))
        }),
        _ => return None,
    };
    Some(resp)
}
