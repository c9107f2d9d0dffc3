use super::{hydrate, student_page, student_totals, StudentRow};
use crate::error::CoreResult;
use crate::gateway::QueryContext;
use crate::metrics::{self, CohortBucket};
use crate::pagination::{PageRequest, Paginated};
use crate::store::{self, StudentOrder};
use rusqlite::params_from_iter;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MentorStats {
    pub total_assigned: i64,
    pub active_students: i64,
    pub avg_gpa: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MentorOverview {
    pub stats: MentorStats,
    pub students_by_year: Vec<CohortBucket<i64>>,
    pub recent_students: Vec<StudentRow>,
}

pub fn mentor_overview(ctx: &QueryContext<'_>) -> CoreResult<MentorOverview> {
    let conn = ctx.conn;
    let students = ctx.scope.student_filter("s");
    let totals = student_totals(conn, &students)?;

    let sql = format!(
        "SELECT s.year_of_study, COUNT(*) FROM students s WHERE {} GROUP BY s.year_of_study",
        students.clause
    );
    let mut stmt = conn.prepare(&sql)?;
    let by_year = stmt
        .query_map(params_from_iter(students.params.clone()), |r| {
            Ok((r.get::<_, Option<i64>>(0)?, r.get::<_, i64>(1)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let recent_students = hydrate(
        conn,
        store::load_students(
            conn,
            &students,
            StudentOrder::Id,
            Some((ctx.settings.recent_students_limit, 0)),
        )?,
    )?;

    Ok(MentorOverview {
        stats: MentorStats {
            total_assigned: totals.total,
            active_students: totals.active,
            avg_gpa: totals.gpa.average(),
        },
        students_by_year: metrics::cohort_from_counts(by_year),
        recent_students,
    })
}

pub fn mentor_student_list(
    ctx: &QueryContext<'_>,
    page: PageRequest,
) -> CoreResult<Paginated<StudentRow>> {
    student_page(ctx, &ctx.scope.student_filter("s"), page)
}
