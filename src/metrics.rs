//! Derived statistics over a scoped student set.
//!
//! Every average here returns `None` when there is nothing to average. A
//! computed 0.0 and "no rows" are different answers and must stay different
//! all the way to the response.

use crate::error::CoreResult;
use crate::model::{AttendanceStatus, EnrollmentStatus, StudentRecord};
use crate::scope::SqlFilter;
use chrono::{Duration, NaiveDate};
use rusqlite::{params_from_iter, types::Value, Connection};
use serde::Serialize;
use std::collections::BTreeMap;

/// Rounds half away from zero to 2 decimals. The scaled value is first cut
/// to 15 significant digits so decimal ties that land just below `.5` in
/// binary (2.675 * 100 = 267.49999999999997) still round up.
pub fn round_off_2_decimals(x: f64) -> f64 {
    let scaled = 100.0 * x;
    let pre = format!("{:.14e}", scaled).parse::<f64>().unwrap_or(scaled);
    pre.round() / 100.0
}

pub fn mean<I>(values: I) -> Option<f64>
where
    I: IntoIterator<Item = Option<f64>>,
{
    let mut sum = 0.0_f64;
    let mut n = 0usize;
    for v in values.into_iter().flatten() {
        sum += v;
        n += 1;
    }
    if n == 0 {
        None
    } else {
        Some(sum / (n as f64))
    }
}

pub fn average_gpa<I>(gpas: I) -> Option<f64>
where
    I: IntoIterator<Item = Option<f64>>,
{
    mean(gpas).map(round_off_2_decimals)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AttendanceTally {
    pub present: i64,
    pub total: i64,
}

impl AttendanceTally {
    /// Counts one recorded day. Only `present` counts as attended; late,
    /// excused and unrecognised statuses count against the rate.
    pub fn record(&mut self, status: &str) {
        self.total += 1;
        if AttendanceStatus::parse(status) == Some(AttendanceStatus::Present) {
            self.present += 1;
        }
    }

    /// Unrounded percentage; `None` when no days were recorded.
    pub fn rate(&self) -> Option<f64> {
        if self.total == 0 {
            None
        } else {
            Some(100.0 * (self.present as f64) / (self.total as f64))
        }
    }
}

pub fn attendance_rate(tally: AttendanceTally) -> Option<f64> {
    tally.rate().map(round_off_2_decimals)
}

/// Inclusive window `[today - days, today]`, as ISO date strings.
pub fn trailing_window(today: NaiveDate, days: i64) -> (String, String) {
    let start = today - Duration::days(days);
    (
        start.format("%Y-%m-%d").to_string(),
        today.format("%Y-%m-%d").to_string(),
    )
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CohortBucket<K> {
    /// `None` is the "unknown" bucket.
    pub key: Option<K>,
    pub count: i64,
}

/// Counts per key, known keys ascending, the unknown bucket last and only
/// when something fell into it.
pub fn cohort_counts<K, I>(keys: I) -> Vec<CohortBucket<K>>
where
    K: Ord,
    I: IntoIterator<Item = Option<K>>,
{
    cohort_from_counts(keys.into_iter().map(|k| (k, 1)))
}

/// Same bucketing as [`cohort_counts`] for rows that are already grouped.
pub fn cohort_from_counts<K, I>(rows: I) -> Vec<CohortBucket<K>>
where
    K: Ord,
    I: IntoIterator<Item = (Option<K>, i64)>,
{
    let mut known: BTreeMap<K, i64> = BTreeMap::new();
    let mut unknown = 0i64;
    for (k, n) in rows {
        match k {
            Some(k) => *known.entry(k).or_insert(0) += n,
            None => unknown += n,
        }
    }
    let mut out = known
        .into_iter()
        .map(|(key, count)| CohortBucket {
            key: Some(key),
            count,
        })
        .collect::<Vec<_>>();
    if unknown > 0 {
        out.push(CohortBucket {
            key: None,
            count: unknown,
        });
    }
    out
}

/// Running GPA sum over the non-null values only.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GpaTotals {
    pub sum: f64,
    pub graded: i64,
}

impl GpaTotals {
    pub fn average(&self) -> Option<f64> {
        if self.graded == 0 {
            None
        } else {
            Some(round_off_2_decimals(self.sum / (self.graded as f64)))
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentStatusCounts {
    pub enrolled: i64,
    pub completed: i64,
    pub dropped: i64,
    pub failed: i64,
}

impl EnrollmentStatusCounts {
    pub fn from_statuses<'a, I>(statuses: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut c = EnrollmentStatusCounts::default();
        for s in statuses {
            match EnrollmentStatus::parse(s) {
                Some(EnrollmentStatus::Enrolled) => c.enrolled += 1,
                Some(EnrollmentStatus::Completed) => c.completed += 1,
                Some(EnrollmentStatus::Dropped) => c.dropped += 1,
                Some(EnrollmentStatus::Failed) => c.failed += 1,
                None => {}
            }
        }
        c
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MetricsOptions {
    pub today: NaiveDate,
    pub trailing_window_days: i64,
    pub academic_year: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Metrics {
    pub student_count: i64,
    pub active_student_count: i64,
    pub average_gpa: Option<f64>,
    pub attendance_rate: Option<f64>,
    pub students_with_attendance: i64,
    pub engagement_score: Option<f64>,
    pub academic_year: i64,
    pub trailing_window_days: i64,
    pub enrollments_by_status: EnrollmentStatusCounts,
    pub by_status: Vec<CohortBucket<String>>,
    pub by_year_of_study: Vec<CohortBucket<i64>>,
    pub by_program: Vec<CohortBucket<i64>>,
}

pub fn aggregate(
    conn: &Connection,
    students: &[StudentRecord],
    scope: &SqlFilter,
    options: &MetricsOptions,
) -> CoreResult<Metrics> {
    let per_student = attendance_tallies(conn, scope, options)?;
    let attendance_rate = mean(per_student.values().map(|t| t.rate()))
        .map(round_off_2_decimals);

    Ok(Metrics {
        student_count: students.len() as i64,
        active_student_count: students.iter().filter(|s| s.is_active()).count() as i64,
        average_gpa: average_gpa(students.iter().map(|s| s.gpa)),
        attendance_rate,
        students_with_attendance: per_student.len() as i64,
        engagement_score: engagement_score(conn, scope, options.academic_year)?,
        academic_year: options.academic_year,
        trailing_window_days: options.trailing_window_days,
        enrollments_by_status: enrollment_status_counts(conn, scope)?,
        by_status: cohort_counts(students.iter().map(|s| Some(s.status.clone()))),
        by_year_of_study: cohort_counts(students.iter().map(|s| s.year_of_study)),
        by_program: cohort_counts(students.iter().map(|s| Some(s.program_id))),
    })
}

/// Per-student attendance inside the trailing window. Students with no
/// recorded days are absent from the map.
pub fn attendance_tallies(
    conn: &Connection,
    scope: &SqlFilter,
    options: &MetricsOptions,
) -> CoreResult<BTreeMap<i64, AttendanceTally>> {
    let (start, end) = trailing_window(options.today, options.trailing_window_days);
    let sql = format!(
        "SELECT a.student_id, a.status
         FROM attendance_records a
         JOIN students s ON s.id = a.student_id
         WHERE {} AND a.date >= ? AND a.date <= ?
         ORDER BY a.student_id, a.date",
        scope.clause
    );
    let mut values = scope.params.clone();
    values.push(Value::Text(start));
    values.push(Value::Text(end));
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(params_from_iter(values))?;
    let mut out: BTreeMap<i64, AttendanceTally> = BTreeMap::new();
    while let Some(r) = rows.next()? {
        let student_id: i64 = r.get(0)?;
        let status: String = r.get(1)?;
        out.entry(student_id).or_default().record(&status);
    }
    Ok(out)
}

pub fn engagement_score(
    conn: &Connection,
    scope: &SqlFilter,
    academic_year: i64,
) -> CoreResult<Option<f64>> {
    let sql = format!(
        "SELECT l.engagement_score
         FROM lms_activities l
         JOIN students s ON s.id = l.student_id
         WHERE {} AND l.academic_year = ?
         ORDER BY l.student_id, l.week_number",
        scope.clause
    );
    let mut values = scope.params.clone();
    values.push(Value::Integer(academic_year));
    let mut stmt = conn.prepare(&sql)?;
    let scores = stmt
        .query_map(params_from_iter(values), |r| r.get::<_, Option<f64>>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(mean(scores).map(round_off_2_decimals))
}

pub fn enrollment_status_counts(
    conn: &Connection,
    scope: &SqlFilter,
) -> CoreResult<EnrollmentStatusCounts> {
    let sql = format!(
        "SELECT e.status, COUNT(*)
         FROM sis_enrollments e
         JOIN students s ON s.id = e.student_id
         WHERE {}
         GROUP BY e.status",
        scope.clause
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(scope.params.clone()), |r| {
            Ok((r.get::<_, String>(0)?, r.get::<_, i64>(1)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    let mut counts = EnrollmentStatusCounts::default();
    for (status, n) in rows {
        match EnrollmentStatus::parse(&status) {
            Some(EnrollmentStatus::Enrolled) => counts.enrolled += n,
            Some(EnrollmentStatus::Completed) => counts.completed += n,
            Some(EnrollmentStatus::Dropped) => counts.dropped += n,
            Some(EnrollmentStatus::Failed) => counts.failed += n,
            None => {}
        }
    }
    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_off_is_half_up_on_decimal_ties() {
        assert_eq!(round_off_2_decimals(0.0), 0.0);
        assert_eq!(round_off_2_decimals(66.666_666), 66.67);
        assert_eq!(round_off_2_decimals(3.125), 3.13);
        assert_eq!(round_off_2_decimals(3.124), 3.12);
        assert_eq!(round_off_2_decimals(2.675), 2.68);
        assert_eq!(round_off_2_decimals(1.005), 1.01);
        assert_eq!(round_off_2_decimals(-1.005), -1.01);
        assert_eq!(round_off_2_decimals(2.674_999), 2.67);
    }

    #[test]
    fn average_gpa_ignores_nulls() {
        assert_eq!(average_gpa(vec![None, None]), None);
        assert_eq!(average_gpa(Vec::<Option<f64>>::new()), None);
        assert_eq!(average_gpa(vec![Some(3.0), None, None]), Some(3.0));
        assert_eq!(average_gpa(vec![Some(3.0), Some(2.0), None]), Some(2.5));
        // A real zero is a value, not a missing one.
        assert_eq!(average_gpa(vec![Some(0.0), None]), Some(0.0));
    }

    #[test]
    fn attendance_rate_two_of_three() {
        let mut t = AttendanceTally::default();
        for status in ["present", "present", "absent"] {
            t.record(status);
        }
        assert_eq!(t, AttendanceTally { present: 2, total: 3 });
        assert_eq!(attendance_rate(t), Some(66.67));
    }

    #[test]
    fn attendance_rate_undefined_without_records() {
        assert_eq!(attendance_rate(AttendanceTally::default()), None);
        let mut all_absent = AttendanceTally::default();
        for status in ["absent", "late", "excused"] {
            all_absent.record(status);
        }
        assert_eq!(attendance_rate(all_absent), Some(0.0));
    }

    #[test]
    fn trailing_window_is_inclusive_iso() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 1).expect("date");
        assert_eq!(
            trailing_window(today, 30),
            ("2024-01-31".to_string(), "2024-03-01".to_string())
        );
    }

    #[test]
    fn cohort_counts_keep_unknown_bucket_last() {
        let buckets = cohort_counts(vec![Some(2), None, Some(1), Some(2), None]);
        assert_eq!(
            buckets,
            vec![
                CohortBucket { key: Some(1), count: 1 },
                CohortBucket { key: Some(2), count: 2 },
                CohortBucket { key: None, count: 2 },
            ]
        );
        let no_unknown = cohort_counts(vec![Some("active")]);
        assert_eq!(no_unknown.len(), 1);
    }

    #[test]
    fn grouped_counts_merge_duplicate_keys() {
        let buckets = cohort_from_counts(vec![
            (Some("active".to_string()), 3),
            (None, 1),
            (Some("active".to_string()), 2),
        ]);
        assert_eq!(
            buckets,
            vec![
                CohortBucket { key: Some("active".to_string()), count: 5 },
                CohortBucket { key: None, count: 1 },
            ]
        );
    }

    #[test]
    fn gpa_totals_without_grades_are_undefined() {
        assert_eq!(GpaTotals::default().average(), None);
        assert_eq!(GpaTotals { sum: 7.0, graded: 2 }.average(), Some(3.5));
    }

    #[test]
    fn enrollment_counts_by_status() {
        let c = EnrollmentStatusCounts::from_statuses([
            "enrolled", "enrolled", "completed", "failed", "dropped", "bogus",
        ]);
        assert_eq!(
            c,
            EnrollmentStatusCounts {
                enrolled: 2,
                completed: 1,
                dropped: 1,
                failed: 1
            }
        );
    }
}
