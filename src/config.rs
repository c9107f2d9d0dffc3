use crate::db;
use chrono::{Datelike, Local, NaiveDate};
use rusqlite::Connection;
use serde::Serialize;
use serde_json::Value;
use std::path::PathBuf;

pub const ANALYTICS_SETTINGS_KEY: &str = "setup.analytics";

/// Process-level configuration, read once from the environment.
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub workspace: Option<PathBuf>,
    pub today: Option<NaiveDate>,
    pub log_filter: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let workspace = lookup("COHORTD_WORKSPACE")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .map(PathBuf::from);
        let today = match lookup("COHORTD_TODAY").map(|s| s.trim().to_string()) {
            Some(s) if !s.is_empty() => Some(
                NaiveDate::parse_from_str(&s, "%Y-%m-%d")
                    .map_err(|e| anyhow::anyhow!("COHORTD_TODAY must be YYYY-MM-DD: {e}"))?,
            ),
            _ => None,
        };
        let log_filter = lookup("COHORTD_LOG").filter(|s| !s.trim().is_empty());
        Ok(Self {
            workspace,
            today,
            log_filter,
        })
    }
}

#[derive(Debug, Clone, Copy)]
pub enum Clock {
    System,
    Fixed(NaiveDate),
}

impl Clock {
    pub fn today(self) -> NaiveDate {
        match self {
            Clock::System => Local::now().date_naive(),
            Clock::Fixed(d) => d,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsSettings {
    pub default_page_size: i64,
    pub max_page_size: i64,
    pub attendance_window_days: i64,
    pub recent_enrollment_days: i64,
    pub recent_students_limit: i64,
    pub recent_activity_limit: i64,
    pub recent_attendance_limit: i64,
    pub academic_year_start_month: i64,
}

impl Default for AnalyticsSettings {
    fn default() -> Self {
        Self {
            default_page_size: 20,
            max_page_size: 100,
            attendance_window_days: 30,
            recent_enrollment_days: 30,
            recent_students_limit: 10,
            recent_activity_limit: 12,
            recent_attendance_limit: 30,
            academic_year_start_month: 9,
        }
    }
}

fn parse_i64_range(v: &Value, key: &str, min: i64, max: i64) -> Result<i64, String> {
    let n = v
        .as_i64()
        .ok_or_else(|| format!("{} must be integer", key))?;
    if !(min..=max).contains(&n) {
        return Err(format!("{} must be in {}..={}", key, min, max));
    }
    Ok(n)
}

impl AnalyticsSettings {
    fn apply_field(&mut self, key: &str, v: &Value) -> Result<(), String> {
        match key {
            "defaultPageSize" => self.default_page_size = parse_i64_range(v, key, 1, 100)?,
            "maxPageSize" => self.max_page_size = parse_i64_range(v, key, 1, 500)?,
            "attendanceWindowDays" => self.attendance_window_days = parse_i64_range(v, key, 1, 365)?,
            "recentEnrollmentDays" => self.recent_enrollment_days = parse_i64_range(v, key, 1, 365)?,
            "recentStudentsLimit" => self.recent_students_limit = parse_i64_range(v, key, 1, 100)?,
            "recentActivityLimit" => self.recent_activity_limit = parse_i64_range(v, key, 1, 104)?,
            "recentAttendanceLimit" => {
                self.recent_attendance_limit = parse_i64_range(v, key, 1, 366)?
            }
            "academicYearStartMonth" => {
                self.academic_year_start_month = parse_i64_range(v, key, 1, 12)?
            }
            _ => return Err(format!("unknown analytics field: {}", key)),
        }
        Ok(())
    }

    /// Reads the saved section over the defaults. Malformed saved values
    /// never block reads: bad fields are skipped and unparseable text is
    /// ignored.
    pub fn load(conn: &Connection) -> anyhow::Result<Self> {
        let mut current = Self::default();
        let Some(text) = db::settings_get_text(conn, ANALYTICS_SETTINGS_KEY)? else {
            return Ok(current);
        };
        let saved: Value = match serde_json::from_str(&text) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(
                    event = "settings_unparseable",
                    key = ANALYTICS_SETTINGS_KEY,
                    error = %e
                );
                return Ok(current);
            }
        };
        if let Some(saved_obj) = saved.as_object() {
            for (k, v) in saved_obj {
                let mut candidate = current;
                if candidate.apply_field(k, v).is_ok() {
                    current = candidate;
                }
            }
            if current.default_page_size > current.max_page_size {
                current.default_page_size = current.max_page_size;
            }
        }
        Ok(current)
    }

    pub fn academic_year(&self, today: NaiveDate) -> i64 {
        let year = i64::from(today.year());
        if i64::from(today.month()) >= self.academic_year_start_month {
            year
        } else {
            year - 1
        }
    }
}
