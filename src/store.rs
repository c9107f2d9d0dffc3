//! Batch readers over the entity store. Dashboards load a page of students
//! first, then fetch every related row for that page in one query per
//! relation, keyed by id.

use crate::error::CoreResult;
use crate::model::{
    AttendanceRecord, CourseSummary, EnrollmentRecord, LmsActivityRecord, MentorAssignmentView,
    ProgramSummary, SchoolSummary, StudentRecord, UserSummary,
};
use crate::scope::{SqlFilter, ACTIVE_ASSIGNMENT};
use rusqlite::{params_from_iter, types::Value, Connection, OptionalExtension, Row};
use std::collections::{BTreeMap, BTreeSet};

const STUDENT_COLUMNS: &str =
    "s.id, s.student_code, s.school_id, s.program_id, s.enrollment_date, s.year_of_study, s.status, s.gpa";
const SCHOOL_COLUMNS: &str = "id, school_code, school_name, university, status";
const PROGRAM_COLUMNS: &str =
    "id, program_code, program_name, school_id, degree_type, duration_years, status";
const USER_COLUMNS: &str = "id, name, email, role, status";

fn student_from_row(r: &Row<'_>) -> rusqlite::Result<StudentRecord> {
    Ok(StudentRecord {
        id: r.get(0)?,
        code: r.get(1)?,
        school_id: r.get(2)?,
        program_id: r.get(3)?,
        enrollment_date: r.get(4)?,
        year_of_study: r.get(5)?,
        status: r.get(6)?,
        gpa: r.get(7)?,
    })
}

fn school_from_row(r: &Row<'_>) -> rusqlite::Result<SchoolSummary> {
    Ok(SchoolSummary {
        id: r.get(0)?,
        code: r.get(1)?,
        name: r.get(2)?,
        university: r.get(3)?,
        status: r.get(4)?,
    })
}

fn program_from_row(r: &Row<'_>) -> rusqlite::Result<ProgramSummary> {
    Ok(ProgramSummary {
        id: r.get(0)?,
        code: r.get(1)?,
        name: r.get(2)?,
        school_id: r.get(3)?,
        degree_type: r.get(4)?,
        duration_years: r.get(5)?,
        status: r.get(6)?,
    })
}

fn user_from_row(r: &Row<'_>) -> rusqlite::Result<UserSummary> {
    Ok(UserSummary {
        id: r.get(0)?,
        name: r.get(1)?,
        email: r.get(2)?,
        role: r.get(3)?,
        status: r.get(4)?,
    })
}

pub fn id_list(column: &str, ids: &BTreeSet<i64>) -> SqlFilter {
    if ids.is_empty() {
        return SqlFilter::new("0 = 1", Vec::new());
    }
    let placeholders = std::iter::repeat("?")
        .take(ids.len())
        .collect::<Vec<_>>()
        .join(",");
    SqlFilter::new(
        format!("{} IN ({})", column, placeholders),
        ids.iter().map(|id| Value::Integer(*id)).collect(),
    )
}

#[derive(Debug, Clone, Copy)]
pub enum StudentOrder {
    Id,
    NewestEnrollment,
}

impl StudentOrder {
    fn sql(self) -> &'static str {
        match self {
            StudentOrder::Id => "s.id",
            StudentOrder::NewestEnrollment => "s.enrollment_date DESC, s.id DESC",
        }
    }
}

pub fn load_students(
    conn: &Connection,
    filter: &SqlFilter,
    order: StudentOrder,
    limit: Option<(i64, i64)>,
) -> CoreResult<Vec<StudentRecord>> {
    let mut sql = format!(
        "SELECT {} FROM students s WHERE {} ORDER BY {}",
        STUDENT_COLUMNS,
        filter.clause,
        order.sql()
    );
    let mut values = filter.params.clone();
    if let Some((limit, offset)) = limit {
        sql.push_str(" LIMIT ? OFFSET ?");
        values.push(Value::Integer(limit));
        values.push(Value::Integer(offset));
    }
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(values), student_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn load_student(conn: &Connection, student_id: i64) -> CoreResult<Option<StudentRecord>> {
    let sql = format!("SELECT {} FROM students s WHERE s.id = ?", STUDENT_COLUMNS);
    Ok(conn
        .query_row(&sql, [student_id], student_from_row)
        .optional()?)
}

pub fn count_rows(conn: &Connection, table_alias: &str, filter: &SqlFilter) -> CoreResult<i64> {
    let sql = format!("SELECT COUNT(*) FROM {} WHERE {}", table_alias, filter.clause);
    Ok(conn.query_row(&sql, params_from_iter(filter.params.clone()), |r| r.get(0))?)
}

pub fn load_schools(
    conn: &Connection,
    filter: &SqlFilter,
    limit: Option<(i64, i64)>,
) -> CoreResult<Vec<SchoolSummary>> {
    let mut sql = format!(
        "SELECT {} FROM schools WHERE {} ORDER BY id",
        SCHOOL_COLUMNS, filter.clause
    );
    let mut values = filter.params.clone();
    if let Some((limit, offset)) = limit {
        sql.push_str(" LIMIT ? OFFSET ?");
        values.push(Value::Integer(limit));
        values.push(Value::Integer(offset));
    }
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(values), school_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn schools_by_id(
    conn: &Connection,
    ids: &BTreeSet<i64>,
) -> CoreResult<BTreeMap<i64, SchoolSummary>> {
    Ok(load_schools(conn, &id_list("id", ids), None)?
        .into_iter()
        .map(|s| (s.id, s))
        .collect())
}

pub fn load_programs(conn: &Connection, filter: &SqlFilter) -> CoreResult<Vec<ProgramSummary>> {
    let sql = format!(
        "SELECT {} FROM programs WHERE {} ORDER BY id",
        PROGRAM_COLUMNS, filter.clause
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(filter.params.clone()), program_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn programs_by_id(
    conn: &Connection,
    ids: &BTreeSet<i64>,
) -> CoreResult<BTreeMap<i64, ProgramSummary>> {
    Ok(load_programs(conn, &id_list("id", ids))?
        .into_iter()
        .map(|p| (p.id, p))
        .collect())
}

pub fn load_users(
    conn: &Connection,
    filter: &SqlFilter,
    limit: Option<(i64, i64)>,
) -> CoreResult<Vec<UserSummary>> {
    let mut sql = format!(
        "SELECT {} FROM users WHERE {} ORDER BY id",
        USER_COLUMNS, filter.clause
    );
    let mut values = filter.params.clone();
    if let Some((limit, offset)) = limit {
        sql.push_str(" LIMIT ? OFFSET ?");
        values.push(Value::Integer(limit));
        values.push(Value::Integer(offset));
    }
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(values), user_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn load_user(conn: &Connection, user_id: i64) -> CoreResult<Option<UserSummary>> {
    let sql = format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS);
    Ok(conn.query_row(&sql, [user_id], user_from_row).optional()?)
}

pub fn users_by_id(
    conn: &Connection,
    ids: &BTreeSet<i64>,
) -> CoreResult<BTreeMap<i64, UserSummary>> {
    Ok(load_users(conn, &id_list("id", ids), None)?
        .into_iter()
        .map(|u| (u.id, u))
        .collect())
}

/// Administrators bound to each school, keyed by school id.
pub fn school_admins_by_school(
    conn: &Connection,
    school_ids: &BTreeSet<i64>,
) -> CoreResult<BTreeMap<i64, Vec<UserSummary>>> {
    let filter = id_list("sa.school_id", school_ids);
    let sql = format!(
        "SELECT sa.school_id, u.id, u.name, u.email, u.role, u.status
         FROM school_admins sa
         JOIN users u ON u.id = sa.user_id
         WHERE {}
         ORDER BY sa.school_id, sa.assigned_date, sa.id",
        filter.clause
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(filter.params), |r| {
            Ok((
                r.get::<_, i64>(0)?,
                UserSummary {
                    id: r.get(1)?,
                    name: r.get(2)?,
                    email: r.get(3)?,
                    role: r.get(4)?,
                    status: r.get(5)?,
                },
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    let mut out: BTreeMap<i64, Vec<UserSummary>> = BTreeMap::new();
    for (school_id, user) in rows {
        out.entry(school_id).or_default().push(user);
    }
    Ok(out)
}

#[derive(Debug, Clone)]
struct AssignmentRow {
    id: i64,
    mentor_id: i64,
    student_id: i64,
    school_id: i64,
    assignment_date: String,
    end_date: Option<String>,
    status: String,
}

fn assignment_views(
    conn: &Connection,
    rows: Vec<AssignmentRow>,
) -> CoreResult<Vec<MentorAssignmentView>> {
    let mentor_ids = rows.iter().map(|r| r.mentor_id).collect::<BTreeSet<_>>();
    let mentors = users_by_id(conn, &mentor_ids)?;
    Ok(rows
        .into_iter()
        .map(|r| MentorAssignmentView {
            id: r.id,
            mentor: mentors.get(&r.mentor_id).cloned(),
            student_id: r.student_id,
            school_id: r.school_id,
            assignment_date: r.assignment_date,
            end_date: r.end_date,
            status: r.status,
        })
        .collect())
}

fn load_assignment_rows(
    conn: &Connection,
    filter: &SqlFilter,
    order: &str,
) -> CoreResult<Vec<AssignmentRow>> {
    let sql = format!(
        "SELECT id, mentor_id, student_id, school_id, assignment_date, end_date, status
         FROM mentor_assignments
         WHERE {}
         ORDER BY {}",
        filter.clause, order
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(filter.params.clone()), |r| {
            Ok(AssignmentRow {
                id: r.get(0)?,
                mentor_id: r.get(1)?,
                student_id: r.get(2)?,
                school_id: r.get(3)?,
                assignment_date: r.get(4)?,
                end_date: r.get(5)?,
                status: r.get(6)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// The current mentor per student: the most recently created active
/// assignment. Several active rows for one student are tolerated.
pub fn current_mentors(
    conn: &Connection,
    student_ids: &BTreeSet<i64>,
) -> CoreResult<BTreeMap<i64, MentorAssignmentView>> {
    let filter = id_list("student_id", student_ids).and(
        "status = ?",
        Value::Text(ACTIVE_ASSIGNMENT.to_string()),
    );
    let rows = load_assignment_rows(conn, &filter, "student_id, created_at DESC, id DESC")?;
    let mut out = BTreeMap::new();
    for view in assignment_views(conn, rows)? {
        out.entry(view.student_id).or_insert(view);
    }
    Ok(out)
}

/// Every assignment held by a mentor, any status, oldest first.
pub fn assignments_for_mentor(
    conn: &Connection,
    mentor_id: i64,
) -> CoreResult<Vec<MentorAssignmentView>> {
    let filter = SqlFilter::new("mentor_id = ?", vec![Value::Integer(mentor_id)]);
    let rows = load_assignment_rows(conn, &filter, "created_at, id")?;
    assignment_views(conn, rows)
}

pub fn enrollments_for_student(
    conn: &Connection,
    student_id: i64,
) -> CoreResult<Vec<EnrollmentRecord>> {
    let mut stmt = conn.prepare(
        "SELECT e.id, e.semester, e.enrollment_date, e.status, e.grade_points, e.letter_grade,
                e.is_repeating, e.completion_date,
                c.id, c.course_code, c.course_name, c.credits, c.year_level
         FROM sis_enrollments e
         LEFT JOIN courses c ON c.id = e.course_id
         WHERE e.student_id = ?
         ORDER BY e.enrollment_date, e.id",
    )?;
    let rows = stmt
        .query_map([student_id], |r| {
            let course_id: Option<i64> = r.get(8)?;
            let course = match course_id {
                Some(id) => Some(CourseSummary {
                    id,
                    code: r.get(9)?,
                    name: r.get(10)?,
                    credits: r.get(11)?,
                    year_level: r.get(12)?,
                }),
                None => None,
            };
            Ok(EnrollmentRecord {
                id: r.get(0)?,
                course,
                semester: r.get(1)?,
                enrollment_date: r.get(2)?,
                status: r.get(3)?,
                grade_points: r.get(4)?,
                letter_grade: r.get(5)?,
                is_repeating: r.get::<_, i64>(6)? != 0,
                completion_date: r.get(7)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn recent_lms_activity(
    conn: &Connection,
    student_id: i64,
    limit: i64,
) -> CoreResult<Vec<LmsActivityRecord>> {
    let mut stmt = conn.prepare(
        "SELECT week_number, academic_year, login_count, time_spent_minutes,
                assignments_submitted, assignments_total, avg_assignment_score,
                quizzes_attempted, resources_accessed, discussion_posts, engagement_score
         FROM lms_activities
         WHERE student_id = ?
         ORDER BY academic_year DESC, week_number DESC
         LIMIT ?",
    )?;
    let rows = stmt
        .query_map((student_id, limit), |r| {
            Ok(LmsActivityRecord {
                week_number: r.get(0)?,
                academic_year: r.get(1)?,
                login_count: r.get(2)?,
                time_spent_minutes: r.get(3)?,
                assignments_submitted: r.get(4)?,
                assignments_total: r.get(5)?,
                avg_assignment_score: r.get(6)?,
                quizzes_attempted: r.get(7)?,
                resources_accessed: r.get(8)?,
                discussion_posts: r.get(9)?,
                engagement_score: r.get(10)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn recent_attendance(
    conn: &Connection,
    student_id: i64,
    limit: i64,
) -> CoreResult<Vec<AttendanceRecord>> {
    let mut stmt = conn.prepare(
        "SELECT date, status, consecutive_absences, arrival_time, notes
         FROM attendance_records
         WHERE student_id = ?
         ORDER BY date DESC
         LIMIT ?",
    )?;
    let rows = stmt
        .query_map((student_id, limit), |r| {
            Ok(AttendanceRecord {
                date: r.get(0)?,
                status: r.get(1)?,
                consecutive_absences: r.get(2)?,
                arrival_time: r.get(3)?,
                notes: r.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Student counts keyed by `column` (`school_id`, `program_id`).
pub fn student_counts_by(
    conn: &Connection,
    column: &str,
    filter: &SqlFilter,
) -> CoreResult<BTreeMap<i64, i64>> {
    let sql = format!(
        "SELECT s.{col}, COUNT(*) FROM students s WHERE {} GROUP BY s.{col}",
        filter.clause,
        col = column
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(filter.params.clone()), |r| {
            Ok((r.get::<_, i64>(0)?, r.get::<_, i64>(1)?))
        })?
        .collect::<Result<BTreeMap<_, _>, _>>()?;
    Ok(rows)
}
