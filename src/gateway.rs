//! Access-controlled entry point for every read. A call goes through, in
//! order: actor authentication, the method's role gate, parameter
//! validation, scope resolution, and finally the query itself. Everything
//! after authentication runs inside one read transaction so scope and
//! metrics come from the same snapshot.

use crate::config::{AnalyticsSettings, Clock};
use crate::error::{CoreError, CoreResult};
use crate::model::Role;
use crate::scope::{self, Actor, ScopeSet};
use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension};
use std::time::Instant;

#[derive(Debug, Clone, Copy)]
pub enum RoleGate {
    Any,
    Only(Role),
}

impl RoleGate {
    fn permits(self, role: Role) -> bool {
        match self {
            RoleGate::Any => true,
            RoleGate::Only(r) => r == role,
        }
    }
}

/// Everything a composer may read from: the snapshot connection, the
/// resolved scope, the pinned date and the analytics settings.
pub struct QueryContext<'a> {
    pub conn: &'a Connection,
    pub actor: Actor,
    pub scope: ScopeSet,
    pub today: NaiveDate,
    pub settings: AnalyticsSettings,
}

impl QueryContext<'_> {
    pub fn academic_year(&self) -> i64 {
        self.settings.academic_year(self.today)
    }
}

pub fn authenticate(conn: &Connection, claim: Option<&serde_json::Value>) -> CoreResult<Actor> {
    let Some(claim) = claim.and_then(|v| v.as_object()) else {
        return Err(CoreError::Unauthenticated);
    };
    let user_id = claim
        .get("userId")
        .and_then(|v| v.as_i64())
        .filter(|id| *id > 0)
        .ok_or(CoreError::Unauthenticated)?;
    let role = claim
        .get("role")
        .and_then(|v| v.as_str())
        .and_then(Role::parse)
        .ok_or(CoreError::Unauthenticated)?;

    let stored: Option<(String, String)> = conn
        .query_row(
            "SELECT role, status FROM users WHERE id = ?",
            [user_id],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )
        .optional()?;
    match stored {
        Some((stored_role, status)) if stored_role == role.as_str() && status == "active" => {
            Ok(Actor { user_id, role })
        }
        _ => Err(CoreError::Unauthenticated),
    }
}

pub struct Call<'a> {
    pub method: &'a str,
    pub actor: Option<&'a serde_json::Value>,
    pub params: &'a serde_json::Value,
    pub gate: RoleGate,
}

pub fn execute<P, T, V, Q>(
    conn: &Connection,
    clock: Clock,
    call: Call<'_>,
    validate: V,
    query: Q,
) -> CoreResult<T>
where
    V: FnOnce(&serde_json::Value, &AnalyticsSettings) -> CoreResult<P>,
    Q: FnOnce(&QueryContext<'_>, P) -> CoreResult<T>,
{
    let started = Instant::now();
    let result = execute_inner(conn, clock, &call, validate, query);
    let elapsed_ms = started.elapsed().as_millis() as u64;
    match &result {
        Ok(_) => tracing::info!(event = "request", method = call.method, elapsed_ms, ok = true),
        Err(e) if e.is_denial() => tracing::warn!(
            event = "request",
            method = call.method,
            elapsed_ms,
            code = e.code(),
            message = %e
        ),
        Err(e) => tracing::info!(
            event = "request",
            method = call.method,
            elapsed_ms,
            code = e.code(),
            message = %e
        ),
    }
    result
}

fn execute_inner<P, T, V, Q>(
    conn: &Connection,
    clock: Clock,
    call: &Call<'_>,
    validate: V,
    query: Q,
) -> CoreResult<T>
where
    V: FnOnce(&serde_json::Value, &AnalyticsSettings) -> CoreResult<P>,
    Q: FnOnce(&QueryContext<'_>, P) -> CoreResult<T>,
{
    // Deferred: the snapshot is taken at the first read below.
    let tx = conn.unchecked_transaction()?;

    let actor = authenticate(&tx, call.actor)?;
    if !call.gate.permits(actor.role) {
        return Err(CoreError::Forbidden {
            role: actor.role.as_str(),
            method: call.method.to_string(),
        });
    }
    tracing::debug!(
        event = "actor_authenticated",
        method = call.method,
        actor_id = actor.user_id,
        role = actor.role.as_str()
    );

    let settings = AnalyticsSettings::load(&tx)
        .map_err(|e| CoreError::Store(format!("analytics settings unreadable: {e}")))?;
    let params = validate(call.params, &settings)?;

    let scope = scope::resolve(&tx, &actor)?;
    let ctx = QueryContext {
        conn: &tx,
        actor,
        scope,
        today: clock.today(),
        settings,
    };
    let out = query(&ctx, params)?;
    drop(ctx);
    tx.commit()?;
    Ok(out)
}
