use crate::dashboard::{self, UserListFilter};
use crate::gateway::RoleGate;
use crate::ipc::helpers::{no_params, required_id, run};
use crate::ipc::types::{AppState, Request};
use crate::model::Role;
use crate::pagination::parse_page_request;

const ADMIN: RoleGate = RoleGate::Only(Role::Admin);

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let resp = match req.method.as_str() {
        "admin.overview" => run(state, req, ADMIN, no_params, |ctx, ()| {
            dashboard::admin_overview(ctx)
        }),
        "admin.analytics" => run(state, req, ADMIN, no_params, |ctx, ()| {
            dashboard::admin_analytics(ctx)
        }),
        "admin.schools.list" => run(
            state,
            req,
            ADMIN,
            |params, settings| parse_page_request(params, settings),
            |ctx, page| dashboard::school_list(ctx, page),
        ),
        "admin.schools.open" => run(
            state,
            req,
            ADMIN,
            |params, _| required_id(params, "schoolId"),
            |ctx, school_id| dashboard::school_detail(ctx, school_id),
        ),
        "admin.users.list" => run(
            state,
            req,
            ADMIN,
            |params, settings| {
                Ok((
                    UserListFilter::from_params(params)?,
                    parse_page_request(params, settings)?,
                ))
            },
            |ctx, (filter, page)| dashboard::user_list(ctx, &filter, page),
        ),
        "admin.users.open" => run(
            state,
            req,
            ADMIN,
            |params, _| required_id(params, "userId"),
            |ctx, user_id| dashboard::user_detail(ctx, user_id),
        ),
        _ => return None,
    };
    Some(resp)
}
