use crate::dashboard;
use crate::gateway::RoleGate;
use crate::ipc::helpers::{no_params, run, student_detail_params};
use crate::ipc::types::{AppState, Request};
use crate::model::Role;
use crate::pagination::parse_page_request;

const MENTOR: RoleGate = RoleGate::Only(Role::Mentor);

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let resp = match req.method.as_str() {
        "mentor.overview" => run(state, req, MENTOR, no_params, |ctx, ()| {
            dashboard::mentor_overview(ctx)
        }),
        "mentor.students.list" => run(
            state,
            req,
            MENTOR,
            |params, settings| parse_page_request(params, settings),
            |ctx, page| dashboard::mentor_student_list(ctx, page),
        ),
        "mentor.students.open" => run(
            state,
            req,
            MENTOR,
            student_detail_params,
            |ctx, (student_id, year)| dashboard::student_detail(ctx, student_id, year),
        ),
        _ => return None,
    };
    Some(resp)
}
