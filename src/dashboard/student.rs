use super::{hydrate, StudentRow};
use crate::error::{CoreError, CoreResult};
use crate::gateway::QueryContext;
use crate::metrics::{self, EnrollmentStatusCounts, MetricsOptions};
use crate::model::{AttendanceRecord, EnrollmentRecord, LmsActivityRecord};
use crate::store;
use rusqlite::types::Value;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentMetrics {
    pub current_courses: i64,
    pub completed_courses: i64,
    /// `None` when no attendance was recorded inside the window.
    pub recent_attendance_rate: Option<f64>,
    pub attendance_window_days: i64,
    /// `None` when the student has no activity rows for `academic_year`.
    pub avg_lms_engagement: Option<f64>,
    pub academic_year: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentDetail {
    pub student: StudentRow,
    pub enrollments: Vec<EnrollmentRecord>,
    pub enrollment_counts: EnrollmentStatusCounts,
    pub metrics: StudentMetrics,
    pub recent_activity: Vec<LmsActivityRecord>,
    pub recent_attendance: Vec<AttendanceRecord>,
}

/// Full record for one student the actor can see. Ids outside the scope
/// fail exactly like ids that do not exist.
pub fn student_detail(
    ctx: &QueryContext<'_>,
    student_id: i64,
    academic_year: Option<i64>,
) -> CoreResult<StudentDetail> {
    let conn = ctx.conn;
    ctx.scope.ensure_student(conn, student_id)?;
    let Some(record) = store::load_student(conn, student_id)? else {
        return Err(CoreError::NotFound("student"));
    };
    let Some(student) = hydrate(conn, vec![record])?.into_iter().next() else {
        return Err(CoreError::NotFound("student"));
    };

    let options = MetricsOptions {
        today: ctx.today,
        trailing_window_days: ctx.settings.attendance_window_days,
        academic_year: academic_year.unwrap_or_else(|| ctx.academic_year()),
    };
    let only_this = ctx
        .scope
        .student_filter("s")
        .and("s.id = ?", Value::Integer(student_id));
    let attendance = metrics::attendance_tallies(conn, &only_this, &options)?
        .remove(&student_id)
        .unwrap_or_default();
    let avg_lms_engagement = metrics::engagement_score(conn, &only_this, options.academic_year)?;

    let enrollments = store::enrollments_for_student(conn, student_id)?;
    let enrollment_counts =
        EnrollmentStatusCounts::from_statuses(enrollments.iter().map(|e| e.status.as_str()));

    Ok(StudentDetail {
        metrics: StudentMetrics {
            current_courses: enrollment_counts.enrolled,
            completed_courses: enrollment_counts.completed,
            recent_attendance_rate: metrics::attendance_rate(attendance),
            attendance_window_days: options.trailing_window_days,
            avg_lms_engagement,
            academic_year: options.academic_year,
        },
        recent_activity: store::recent_lms_activity(
            conn,
            student_id,
            ctx.settings.recent_activity_limit,
        )?,
        recent_attendance: store::recent_attendance(
            conn,
            student_id,
            ctx.settings.recent_attendance_limit,
        )?,
        student,
        enrollments,
        enrollment_counts,
    })
}
