use super::{program_counts, ProgramStudentCount};
use crate::error::{CoreError, CoreResult};
use crate::gateway::QueryContext;
use crate::metrics::{self, CohortBucket, GpaTotals, Metrics, MetricsOptions};
use crate::model::{
    MentorAssignmentView, ProgramSummary, Role, SchoolSummary, StudentStatus, UserSummary,
};
use crate::pagination::{PageRequest, Paginated};
use crate::scope::SqlFilter;
use crate::store::{self, StudentOrder};
use rusqlite::{params_from_iter, types::Value, Connection};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminStats {
    pub total_schools: i64,
    pub total_students: i64,
    pub total_users: i64,
    pub total_programs: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchoolActiveCount {
    #[serde(flatten)]
    pub school: SchoolSummary,
    pub active_student_count: i64,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsersByRole {
    pub admins: i64,
    pub school_admins: i64,
    pub mentors: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminOverview {
    pub stats: AdminStats,
    pub schools: Vec<SchoolActiveCount>,
    pub users_by_role: UsersByRole,
}

fn active_students(ctx: &QueryContext<'_>) -> SqlFilter {
    ctx.scope.student_filter("s").and(
        "s.status = ?",
        Value::Text(StudentStatus::Active.as_str().to_string()),
    )
}

fn users_by_role(conn: &Connection) -> CoreResult<UsersByRole> {
    let mut stmt = conn.prepare("SELECT role, COUNT(*) FROM users GROUP BY role")?;
    let rows = stmt
        .query_map([], |r| Ok((r.get::<_, String>(0)?, r.get::<_, i64>(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    let mut out = UsersByRole::default();
    for (role, n) in rows {
        match Role::parse(&role) {
            Some(Role::Admin) => out.admins += n,
            Some(Role::SchoolAdmin) => out.school_admins += n,
            Some(Role::Mentor) => out.mentors += n,
            None => {}
        }
    }
    Ok(out)
}

pub fn admin_overview(ctx: &QueryContext<'_>) -> CoreResult<AdminOverview> {
    let conn = ctx.conn;
    let schools = store::load_schools(conn, &ctx.scope.school_filter("id"), None)?;
    let active_by_school = store::student_counts_by(conn, "school_id", &active_students(ctx))?;

    let stats = AdminStats {
        total_schools: schools.len() as i64,
        total_students: active_by_school.values().sum(),
        total_users: store::count_rows(
            conn,
            "users",
            &SqlFilter::new("status = ?", vec![Value::Text("active".to_string())]),
        )?,
        total_programs: store::count_rows(conn, "programs", &ctx.scope.school_filter("school_id"))?,
    };

    let schools = schools
        .into_iter()
        .map(|school| SchoolActiveCount {
            active_student_count: active_by_school.get(&school.id).copied().unwrap_or(0),
            school,
        })
        .collect();

    Ok(AdminOverview {
        stats,
        schools,
        users_by_role: users_by_role(conn)?,
    })
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchoolGpa {
    pub school_id: i64,
    pub school_code: String,
    pub school_name: String,
    pub avg_gpa: Option<f64>,
    pub student_count: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminAnalytics {
    pub students_by_status: Vec<CohortBucket<String>>,
    pub gpa_by_school: Vec<SchoolGpa>,
}

pub fn admin_analytics(ctx: &QueryContext<'_>) -> CoreResult<AdminAnalytics> {
    let conn = ctx.conn;
    let students = ctx.scope.student_filter("s");

    let sql = format!(
        "SELECT s.status, COUNT(*) FROM students s WHERE {} GROUP BY s.status",
        students.clause
    );
    let mut stmt = conn.prepare(&sql)?;
    let by_status = stmt
        .query_map(params_from_iter(students.params.clone()), |r| {
            Ok((r.get::<_, Option<String>>(0)?, r.get::<_, i64>(1)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let sql = format!(
        "SELECT s.school_id, COUNT(*), COUNT(s.gpa), TOTAL(s.gpa)
         FROM students s WHERE {} GROUP BY s.school_id",
        students.clause
    );
    let mut stmt = conn.prepare(&sql)?;
    let per_school = stmt
        .query_map(params_from_iter(students.params.clone()), |r| {
            Ok((
                r.get::<_, i64>(0)?,
                (
                    r.get::<_, i64>(1)?,
                    GpaTotals {
                        graded: r.get(2)?,
                        sum: r.get(3)?,
                    },
                ),
            ))
        })?
        .collect::<Result<BTreeMap<_, _>, _>>()?;

    let gpa_by_school = store::load_schools(conn, &ctx.scope.school_filter("id"), None)?
        .into_iter()
        .map(|school| {
            let (student_count, totals) = per_school.get(&school.id).copied().unwrap_or_default();
            SchoolGpa {
                school_id: school.id,
                school_code: school.code,
                school_name: school.name,
                avg_gpa: totals.average(),
                student_count,
            }
        })
        .collect();

    Ok(AdminAnalytics {
        students_by_status: metrics::cohort_from_counts(by_status),
        gpa_by_school,
    })
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchoolListRow {
    #[serde(flatten)]
    pub school: SchoolSummary,
    pub programs: Vec<ProgramSummary>,
    pub admins: Vec<UserSummary>,
    pub student_count: i64,
    pub program_count: i64,
}

pub fn school_list(ctx: &QueryContext<'_>, page: PageRequest) -> CoreResult<Paginated<SchoolListRow>> {
    let conn = ctx.conn;
    let filter = ctx.scope.school_filter("id");
    let total = store::count_rows(conn, "schools", &filter)?;

    let schools = store::load_schools(conn, &filter, Some(page.limit_offset()))?;

    let ids = schools.iter().map(|s| s.id).collect::<BTreeSet<_>>();
    let mut programs: BTreeMap<i64, Vec<_>> = BTreeMap::new();
    for p in store::load_programs(conn, &store::id_list("school_id", &ids))? {
        programs.entry(p.school_id).or_default().push(p);
    }
    let mut admins = store::school_admins_by_school(conn, &ids)?;
    let student_counts =
        store::student_counts_by(conn, "school_id", &store::id_list("s.school_id", &ids))?;

    let rows = schools
        .into_iter()
        .map(|school| {
            let programs = programs.remove(&school.id).unwrap_or_default();
            SchoolListRow {
                program_count: programs.len() as i64,
                student_count: student_counts.get(&school.id).copied().unwrap_or(0),
                admins: admins.remove(&school.id).unwrap_or_default(),
                programs,
                school,
            }
        })
        .collect();
    Ok(Paginated::new(rows, page, total))
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchoolStats {
    pub total_students: i64,
    pub active_students: i64,
    pub avg_gpa: Option<f64>,
    pub programs_offered: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchoolDetail {
    pub school: SchoolSummary,
    pub stats: SchoolStats,
    pub programs: Vec<ProgramStudentCount>,
    pub admins: Vec<UserSummary>,
    pub course_count: i64,
    pub metrics: Metrics,
}

pub fn school_detail(ctx: &QueryContext<'_>, school_id: i64) -> CoreResult<SchoolDetail> {
    let conn = ctx.conn;
    let visible = ctx
        .scope
        .school_filter("id")
        .and("id = ?", Value::Integer(school_id));
    let Some(school) = store::load_schools(conn, &visible, None)?.into_iter().next() else {
        return Err(CoreError::NotFound("school"));
    };

    let students_filter = ctx
        .scope
        .student_filter("s")
        .and("s.school_id = ?", Value::Integer(school.id));
    let students = store::load_students(conn, &students_filter, StudentOrder::Id, None)?;
    let metrics = metrics::aggregate(
        conn,
        &students,
        &students_filter,
        &MetricsOptions {
            today: ctx.today,
            trailing_window_days: ctx.settings.attendance_window_days,
            academic_year: ctx.academic_year(),
        },
    )?;

    let programs = program_counts(
        conn,
        &SqlFilter::new("school_id = ?", vec![Value::Integer(school.id)]),
        &students_filter,
    )?;
    let course_count = store::count_rows(
        conn,
        "courses",
        &SqlFilter::new("school_id = ?", vec![Value::Integer(school.id)]),
    )?;
    let admins = store::school_admins_by_school(conn, &BTreeSet::from([school.id]))?
        .remove(&school.id)
        .unwrap_or_default();

    Ok(SchoolDetail {
        stats: SchoolStats {
            total_students: metrics.student_count,
            active_students: metrics.active_student_count,
            avg_gpa: metrics.average_gpa,
            programs_offered: programs.len() as i64,
        },
        school,
        programs,
        admins,
        course_count,
        metrics,
    })
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserListFilter {
    pub role: Option<Role>,
    pub status: Option<String>,
}

impl UserListFilter {
    pub fn from_params(params: &serde_json::Value) -> CoreResult<Self> {
        let role = match params.get("role") {
            None | Some(serde_json::Value::Null) => None,
            Some(v) => Some(
                v.as_str()
                    .and_then(Role::parse)
                    .ok_or_else(|| CoreError::bad_params("role must be admin, school_admin or mentor"))?,
            ),
        };
        let status = match params.get("status") {
            None | Some(serde_json::Value::Null) => None,
            Some(v) => {
                let s = v
                    .as_str()
                    .map(str::trim)
                    .filter(|s| !s.is_empty() && s.len() <= 32)
                    .ok_or_else(|| CoreError::bad_params("status must be a non-empty string"))?;
                Some(s.to_string())
            }
        };
        Ok(Self { role, status })
    }

    fn sql(&self) -> SqlFilter {
        let mut f = SqlFilter::new("1 = 1", Vec::new());
        if let Some(role) = self.role {
            f = f.and("role = ?", Value::Text(role.as_str().to_string()));
        }
        if let Some(status) = &self.status {
            f = f.and("status = ?", Value::Text(status.clone()));
        }
        f
    }
}

pub fn user_list(
    ctx: &QueryContext<'_>,
    filter: &UserListFilter,
    page: PageRequest,
) -> CoreResult<Paginated<UserSummary>> {
    let filter = filter.sql();
    let total = store::count_rows(ctx.conn, "users", &filter)?;
    let users = store::load_users(ctx.conn, &filter, Some(page.limit_offset()))?;
    Ok(Paginated::new(users, page, total))
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchoolBinding {
    pub school: SchoolSummary,
    pub assigned_date: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentWithStudent {
    #[serde(flatten)]
    pub assignment: MentorAssignmentView,
    pub student_code: Option<String>,
    pub student_status: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDetail {
    pub user: UserSummary,
    pub school_bindings: Vec<SchoolBinding>,
    pub mentor_assignments: Vec<AssignmentWithStudent>,
}

pub fn user_detail(ctx: &QueryContext<'_>, user_id: i64) -> CoreResult<UserDetail> {
    let conn = ctx.conn;
    let Some(user) = store::load_user(conn, user_id)? else {
        return Err(CoreError::NotFound("user"));
    };

    let mut stmt = conn.prepare(
        "SELECT school_id, assigned_date FROM school_admins
         WHERE user_id = ?
         ORDER BY assigned_date, id",
    )?;
    let bindings = stmt
        .query_map([user.id], |r| Ok((r.get::<_, i64>(0)?, r.get::<_, String>(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    let schools = store::schools_by_id(conn, &bindings.iter().map(|b| b.0).collect())?;
    let school_bindings = bindings
        .into_iter()
        .filter_map(|(school_id, assigned_date)| {
            schools.get(&school_id).cloned().map(|school| SchoolBinding {
                school,
                assigned_date,
            })
        })
        .collect();

    let assignments = store::assignments_for_mentor(conn, user.id)?;
    let student_ids = assignments.iter().map(|a| a.student_id).collect::<BTreeSet<_>>();
    let students = store::load_students(
        conn,
        &store::id_list("s.id", &student_ids),
        StudentOrder::Id,
        None,
    )?
    .into_iter()
    .map(|s| (s.id, s))
    .collect::<BTreeMap<_, _>>();
    let mentor_assignments = assignments
        .into_iter()
        .map(|assignment| {
            let student = students.get(&assignment.student_id);
            AssignmentWithStudent {
                student_code: student.map(|s| s.code.clone()),
                student_status: student.map(|s| s.status.clone()),
                assignment,
            }
        })
        .collect();

    Ok(UserDetail {
        user,
        school_bindings,
        mentor_assignments,
    })
}
