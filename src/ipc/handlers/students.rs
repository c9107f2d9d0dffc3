use crate::dashboard;
use crate::gateway::RoleGate;
use crate::ipc::helpers::{run, student_detail_params};
use crate::ipc::types::{AppState, Request};

/// Role-neutral detail lookup; the resolved scope alone decides visibility.
fn handle_students_open(state: &mut AppState, req: &Request) -> serde_json::Value {
    run(
        state,
        req,
        RoleGate::Any,
        student_detail_params,
        |ctx, (student_id, year)| dashboard::student_detail(ctx, student_id, year),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "students.open" => Some(handle_students_open(state, req)),
        _ => None,
    }
}
