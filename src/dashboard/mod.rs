//! Per-role dashboard assembly. Composers read only through the
//! [`QueryContext`](crate::gateway::QueryContext) the gateway hands them, and
//! every student query starts from the resolved scope's filter.
//!
//! Relations are fetched in batches: a page of students first, then one
//! query each for their programs, schools and current mentors.

mod admin;
mod mentor;
mod school_admin;
mod student;

pub use admin::{
    admin_analytics, admin_overview, school_detail, school_list, user_detail, user_list,
    UserListFilter,
};
pub use mentor::{mentor_overview, mentor_student_list};
pub use school_admin::{school_admin_overview, school_admin_student_list, StudentListFilter};
pub use student::student_detail;

use crate::error::CoreResult;
use crate::gateway::QueryContext;
use crate::metrics::GpaTotals;
use crate::model::{MentorAssignmentView, ProgramSummary, SchoolSummary, StudentRecord};
use crate::pagination::{PageRequest, Paginated};
use crate::scope::SqlFilter;
use crate::store::{self, StudentOrder};
use rusqlite::{params_from_iter, Connection};
use serde::Serialize;
use std::collections::BTreeSet;

/// A student with its program, school and current mentor attached.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentRow {
    #[serde(flatten)]
    pub student: StudentRecord,
    pub program: Option<ProgramSummary>,
    pub school: Option<SchoolSummary>,
    pub current_mentor: Option<MentorAssignmentView>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgramStudentCount {
    #[serde(flatten)]
    pub program: ProgramSummary,
    pub student_count: i64,
}

pub(crate) fn hydrate(
    conn: &Connection,
    students: Vec<StudentRecord>,
) -> CoreResult<Vec<StudentRow>> {
    let program_ids = students.iter().map(|s| s.program_id).collect::<BTreeSet<_>>();
    let school_ids = students.iter().map(|s| s.school_id).collect::<BTreeSet<_>>();
    let student_ids = students.iter().map(|s| s.id).collect::<BTreeSet<_>>();

    let programs = store::programs_by_id(conn, &program_ids)?;
    let schools = store::schools_by_id(conn, &school_ids)?;
    let mut mentors = store::current_mentors(conn, &student_ids)?;

    Ok(students
        .into_iter()
        .map(|s| StudentRow {
            program: programs.get(&s.program_id).cloned(),
            school: schools.get(&s.school_id).cloned(),
            current_mentor: mentors.remove(&s.id),
            student: s,
        })
        .collect())
}

/// One page of students ordered by id, plus the total across all pages.
pub(crate) fn student_page(
    ctx: &QueryContext<'_>,
    filter: &SqlFilter,
    page: PageRequest,
) -> CoreResult<Paginated<StudentRow>> {
    let total = store::count_rows(ctx.conn, "students s", filter)?;
    let students = store::load_students(
        ctx.conn,
        filter,
        StudentOrder::Id,
        Some(page.limit_offset()),
    )?;
    Ok(Paginated::new(hydrate(ctx.conn, students)?, page, total))
}

/// Programs matching `programs`, each with its count of students matching
/// `students`. Programs without students report zero.
pub(crate) fn program_counts(
    conn: &Connection,
    programs: &SqlFilter,
    students: &SqlFilter,
) -> CoreResult<Vec<ProgramStudentCount>> {
    let counts = store::student_counts_by(conn, "program_id", students)?;
    Ok(store::load_programs(conn, programs)?
        .into_iter()
        .map(|p| ProgramStudentCount {
            student_count: counts.get(&p.id).copied().unwrap_or(0),
            program: p,
        })
        .collect())
}

/// Head counts and GPA totals over the students matching `filter`.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct StudentTotals {
    pub total: i64,
    pub active: i64,
    pub gpa: GpaTotals,
}

pub(crate) fn student_totals(conn: &Connection, filter: &SqlFilter) -> CoreResult<StudentTotals> {
    let sql = format!(
        "SELECT COUNT(*),
                COALESCE(SUM(CASE WHEN s.status = 'active' THEN 1 ELSE 0 END), 0),
                COUNT(s.gpa),
                TOTAL(s.gpa)
         FROM students s WHERE {}",
        filter.clause
    );
    Ok(conn.query_row(&sql, params_from_iter(filter.params.clone()), |r| {
        Ok(StudentTotals {
            total: r.get(0)?,
            active: r.get(1)?,
            gpa: GpaTotals {
                graded: r.get(2)?,
                sum: r.get(3)?,
            },
        })
    })?)
}
