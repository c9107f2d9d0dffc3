//! Scope resolution: the one place that decides which students, programs and
//! schools an actor may read. Every query downstream takes a [`ScopeSet`] and
//! turns it into a SQL predicate with [`ScopeSet::student_filter`].

use crate::error::{CoreError, CoreResult};
use crate::model::Role;
use rusqlite::{params_from_iter, types::Value, Connection, OptionalExtension};
use std::collections::BTreeSet;

pub const ACTIVE_ASSIGNMENT: &str = "active";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user_id: i64,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeSet {
    Unrestricted,
    School { school_id: i64 },
    Mentor { student_ids: BTreeSet<i64> },
}

/// A WHERE fragment plus its positional parameters.
#[derive(Debug, Clone, Default)]
pub struct SqlFilter {
    pub clause: String,
    pub params: Vec<Value>,
}

impl SqlFilter {
    pub fn new(clause: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            clause: clause.into(),
            params,
        }
    }

    pub fn and(mut self, clause: &str, value: Value) -> Self {
        self.clause = format!("({}) AND {}", self.clause, clause);
        self.params.push(value);
        self
    }
}

fn placeholders(n: usize) -> String {
    std::iter::repeat("?").take(n).collect::<Vec<_>>().join(",")
}

impl ScopeSet {
    pub fn kind(&self) -> &'static str {
        match self {
            ScopeSet::Unrestricted => "unrestricted",
            ScopeSet::School { .. } => "school",
            ScopeSet::Mentor { .. } => "mentor",
        }
    }

    /// Predicate over a `students` table aliased as `alias`.
    pub fn student_filter(&self, alias: &str) -> SqlFilter {
        match self {
            ScopeSet::Unrestricted => SqlFilter::new("1 = 1", Vec::new()),
            ScopeSet::School { school_id } => SqlFilter::new(
                format!("{}.school_id = ?", alias),
                vec![Value::Integer(*school_id)],
            ),
            ScopeSet::Mentor { student_ids, .. } => {
                if student_ids.is_empty() {
                    return SqlFilter::new("0 = 1", Vec::new());
                }
                SqlFilter::new(
                    format!("{}.id IN ({})", alias, placeholders(student_ids.len())),
                    student_ids.iter().map(|id| Value::Integer(*id)).collect(),
                )
            }
        }
    }

    /// Predicate over a school id column (`schools.id`, `programs.school_id`, ...).
    pub fn school_filter(&self, column: &str) -> SqlFilter {
        match self {
            ScopeSet::Unrestricted => SqlFilter::new("1 = 1", Vec::new()),
            ScopeSet::School { school_id } => {
                SqlFilter::new(format!("{} = ?", column), vec![Value::Integer(*school_id)])
            }
            ScopeSet::Mentor { .. } => {
                let students = self.student_filter("ms");
                SqlFilter::new(
                    format!(
                        "{} IN (SELECT ms.school_id FROM students ms WHERE {})",
                        column, students.clause
                    ),
                    students.params,
                )
            }
        }
    }

    /// Scope check for a single student id. Out-of-scope and missing ids are
    /// indistinguishable to the caller.
    pub fn ensure_student(&self, conn: &Connection, student_id: i64) -> CoreResult<()> {
        if let ScopeSet::Mentor { student_ids, .. } = self {
            if !student_ids.contains(&student_id) {
                return Err(CoreError::NotFound("student"));
            }
        }
        let filter = self.student_filter("s").and("s.id = ?", Value::Integer(student_id));
        let sql = format!("SELECT 1 FROM students s WHERE {}", filter.clause);
        let found = conn
            .query_row(&sql, params_from_iter(filter.params), |r| r.get::<_, i64>(0))
            .optional()?;
        match found {
            Some(_) => Ok(()),
            None => Err(CoreError::NotFound("student")),
        }
    }
}

pub fn resolve(conn: &Connection, actor: &Actor) -> CoreResult<ScopeSet> {
    let scope = match actor.role {
        Role::Admin => ScopeSet::Unrestricted,
        Role::SchoolAdmin => {
            let school_id: Option<i64> = conn
                .query_row(
                    "SELECT school_id FROM school_admins
                     WHERE user_id = ?
                     ORDER BY assigned_date, id
                     LIMIT 1",
                    [actor.user_id],
                    |r| r.get(0),
                )
                .optional()?;
            let Some(school_id) = school_id else {
                return Err(CoreError::NotScoped("not assigned to any school"));
            };
            ScopeSet::School { school_id }
        }
        Role::Mentor => {
            let mut stmt = conn.prepare(
                "SELECT DISTINCT student_id FROM mentor_assignments
                 WHERE mentor_id = ? AND status = ?",
            )?;
            let student_ids = stmt
                .query_map((actor.user_id, ACTIVE_ASSIGNMENT), |r| r.get::<_, i64>(0))?
                .collect::<Result<BTreeSet<_>, _>>()?;
            if student_ids.is_empty() {
                return Err(CoreError::NotScoped("no active mentor assignments"));
            }
            ScopeSet::Mentor { student_ids }
        }
    };
    tracing::debug!(
        event = "scope_resolved",
        actor_id = actor.user_id,
        role = actor.role.as_str(),
        scope = scope.kind()
    );
    Ok(scope)
}
