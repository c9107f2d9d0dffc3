use crate::dashboard::{self, StudentListFilter};
use crate::gateway::RoleGate;
use crate::ipc::helpers::{no_params, run, student_detail_params};
use crate::ipc::types::{AppState, Request};
use crate::model::Role;
use crate::pagination::parse_page_request;

const SCHOOL_ADMIN: RoleGate = RoleGate::Only(Role::SchoolAdmin);

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let resp = match req.method.as_str() {
        "schoolAdmin.overview" => run(state, req, SCHOOL_ADMIN, no_params, |ctx, ()| {
            dashboard::school_admin_overview(ctx)
        }),
        "schoolAdmin.students.list" => run(
            state,
            req,
            SCHOOL_ADMIN,
            |params, settings| {
                Ok((
                    StudentListFilter::from_params(params)?,
                    parse_page_request(params, settings)?,
                ))
            },
            |ctx, (filter, page)| dashboard::school_admin_student_list(ctx, &filter, page),
        ),
        "schoolAdmin.students.open" => run(
            state,
            req,
            SCHOOL_ADMIN,
            student_detail_params,
            |ctx, (student_id, year)| dashboard::student_detail(ctx, student_id, year),
        ),
        _ => return None,
    };
    Some(resp)
}
