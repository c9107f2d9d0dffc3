use super::{hydrate, program_counts, student_page, student_totals, ProgramStudentCount, StudentRow};
use crate::error::{CoreError, CoreResult};
use crate::gateway::QueryContext;
use crate::metrics;
use crate::model::{SchoolSummary, StudentStatus};
use crate::pagination::{PageRequest, Paginated};
use crate::scope::SqlFilter;
use crate::store::{self, StudentOrder};
use rusqlite::types::Value;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchoolAdminStats {
    pub total_students: i64,
    pub active_students: i64,
    pub total_programs: i64,
    pub avg_gpa: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchoolAdminOverview {
    pub school: SchoolSummary,
    pub stats: SchoolAdminStats,
    pub students_by_program: Vec<ProgramStudentCount>,
    pub recent_students: Vec<StudentRow>,
    pub recent_enrollment_days: i64,
}

fn bound_school(ctx: &QueryContext<'_>) -> CoreResult<SchoolSummary> {
    let filter = ctx.scope.school_filter("id");
    store::load_schools(ctx.conn, &filter, None)?
        .into_iter()
        .next()
        .ok_or(CoreError::NotScoped("not assigned to any school"))
}

pub fn school_admin_overview(ctx: &QueryContext<'_>) -> CoreResult<SchoolAdminOverview> {
    let conn = ctx.conn;
    let school = bound_school(ctx)?;
    let students = ctx.scope.student_filter("s");
    let totals = student_totals(conn, &students)?;
    let students_by_program = program_counts(conn, &ctx.scope.school_filter("school_id"), &students)?;

    let days = ctx.settings.recent_enrollment_days;
    let (since, _) = metrics::trailing_window(ctx.today, days);
    let recent = students.and("s.enrollment_date >= ?", Value::Text(since));
    let recent_students = hydrate(
        conn,
        store::load_students(
            conn,
            &recent,
            StudentOrder::NewestEnrollment,
            Some((ctx.settings.recent_students_limit, 0)),
        )?,
    )?;

    Ok(SchoolAdminOverview {
        school,
        stats: SchoolAdminStats {
            total_students: totals.total,
            active_students: totals.active,
            total_programs: students_by_program.len() as i64,
            avg_gpa: totals.gpa.average(),
        },
        students_by_program,
        recent_students,
        recent_enrollment_days: days,
    })
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StudentListFilter {
    pub program_id: Option<i64>,
    pub year_of_study: Option<i64>,
    pub status: Option<StudentStatus>,
}

fn optional_positive(params: &serde_json::Value, key: &str) -> CoreResult<Option<i64>> {
    match params.get(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(v) => v
            .as_i64()
            .filter(|n| *n > 0)
            .map(Some)
            .ok_or_else(|| CoreError::bad_params(format!("{key} must be a positive integer"))),
    }
}

impl StudentListFilter {
    pub fn from_params(params: &serde_json::Value) -> CoreResult<Self> {
        let status = match params.get("status") {
            None | Some(serde_json::Value::Null) => None,
            Some(v) => Some(v.as_str().and_then(StudentStatus::parse).ok_or_else(|| {
                CoreError::bad_params("status must be active, inactive, graduated or transferred")
            })?),
        };
        Ok(Self {
            program_id: optional_positive(params, "programId")?,
            year_of_study: optional_positive(params, "yearOfStudy")?,
            status,
        })
    }

    fn narrow(&self, mut filter: SqlFilter) -> SqlFilter {
        if let Some(program_id) = self.program_id {
            filter = filter.and("s.program_id = ?", Value::Integer(program_id));
        }
        if let Some(year) = self.year_of_study {
            filter = filter.and("s.year_of_study = ?", Value::Integer(year));
        }
        if let Some(status) = self.status {
            filter = filter.and("s.status = ?", Value::Text(status.as_str().to_string()));
        }
        filter
    }
}

pub fn school_admin_student_list(
    ctx: &QueryContext<'_>,
    filter: &StudentListFilter,
    page: PageRequest,
) -> CoreResult<Paginated<StudentRow>> {
    let scoped = filter.narrow(ctx.scope.student_filter("s"));
    student_page(ctx, &scoped, page)
}
