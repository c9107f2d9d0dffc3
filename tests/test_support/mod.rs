#![allow(dead_code)]

use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

/// Date every sidecar spawned by [`spawn_sidecar`] treats as "today".
pub const TODAY: &str = "2024-10-15";

pub fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

pub fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    spawn_sidecar_on(TODAY)
}

pub fn spawn_sidecar_on(today: &str) -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_cohortd");
    let mut child = Command::new(exe)
        .env("COHORTD_TODAY", today)
        .env_remove("COHORTD_WORKSPACE")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn cohortd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

pub fn actor(user_id: i64, role: &str) -> serde_json::Value {
    json!({ "userId": user_id, "role": role })
}

pub fn send_line(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    line: &str,
) -> serde_json::Value {
    writeln!(stdin, "{}", line).expect("write request");
    stdin.flush().expect("flush request");

    let mut out = String::new();
    reader.read_line(&mut out).expect("read response line");
    assert!(!out.trim().is_empty(), "empty response for {}", line);
    serde_json::from_str(out.trim()).expect("parse response json")
}

/// Sends a request; `actor` is omitted from the envelope when null.
pub fn call(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    actor: serde_json::Value,
    params: serde_json::Value,
) -> serde_json::Value {
    let mut payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    if !actor.is_null() {
        payload["actor"] = actor;
    }
    let value = send_line(stdin, reader, &payload.to_string());
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

pub fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    call(stdin, reader, id, method, serde_json::Value::Null, params)
}

pub fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    call_ok(stdin, reader, id, method, serde_json::Value::Null, params)
}

pub fn call_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    actor: serde_json::Value,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = call(stdin, reader, id, method, actor, params);
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

/// Returns the error object of a failed call.
pub fn call_err(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    actor: serde_json::Value,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = call(stdin, reader, id, method, actor, params);
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(false),
        "{} unexpectedly succeeded: {}",
        method,
        value
    );
    value.get("error").cloned().unwrap_or_else(|| json!({}))
}

pub fn error_code(error: &serde_json::Value) -> &str {
    error.get("code").and_then(|v| v.as_str()).unwrap_or("")
}

pub fn open_workspace(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    workspace: &Path,
) {
    let _ = request_ok(
        stdin,
        reader,
        "ws",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
}

/// Writes rows straight into the workspace store. The schema must already
/// exist, so call [`open_workspace`] first.
pub fn seed(workspace: &Path, sql: &str) {
    let conn = rusqlite::Connection::open(workspace.join("cohort.sqlite3")).expect("open store");
    conn.execute_batch("PRAGMA foreign_keys = ON;").expect("pragma");
    conn.execute_batch(sql).expect("seed store");
}

/// Three schools, one without students. Bound school admins: Ada (2) on
/// school 1 and Eve (6) on school 2; Ben (3) is unbound. Mentor Cy (4) has
/// active assignments to 1001 and 2001 and an ended one to 1003; mentor Di
/// (5) only has an inactive assignment.
pub const BASE_SEED: &str = "
INSERT INTO schools(id, school_code, school_name, university) VALUES
    (1, 'SCES', 'Computing and Engineering', 'Strathmore'),
    (2, 'SBS', 'Business School', 'Strathmore'),
    (3, 'SLS', 'Law School', 'Strathmore');
INSERT INTO programs(id, program_code, program_name, school_id, degree_type, duration_years) VALUES
    (10, 'BICS', 'Informatics and Computer Science', 1, 'Bachelor', 4),
    (11, 'BBIT', 'Business Information Technology', 1, 'Bachelor', 4),
    (20, 'BCOM', 'Commerce', 2, 'Bachelor', 4),
    (30, 'LLB', 'Laws', 3, 'Bachelor', 4);
INSERT INTO courses(id, course_code, course_name, program_id, school_id, credits, year_level) VALUES
    (100, 'ICS101', 'Introduction to Programming', 10, 1, 3, 1),
    (101, 'ICS102', 'Discrete Mathematics', 10, 1, 3, 1),
    (200, 'COM101', 'Principles of Accounting', 20, 2, 3, 1);
INSERT INTO users(id, name, email, role, status) VALUES
    (1, 'Root Admin', 'root@example.edu', 'admin', 'active'),
    (2, 'Ada School', 'ada@example.edu', 'school_admin', 'active'),
    (3, 'Ben Unbound', 'ben@example.edu', 'school_admin', 'active'),
    (4, 'Cy Mentor', 'cy@example.edu', 'mentor', 'active'),
    (5, 'Di Mentor', 'di@example.edu', 'mentor', 'active'),
    (6, 'Eve School', 'eve@example.edu', 'school_admin', 'active'),
    (7, 'Gone Admin', 'gone@example.edu', 'admin', 'inactive'),
    (8, 'Fay Mentor', 'fay@example.edu', 'mentor', 'inactive');
INSERT INTO school_admins(user_id, school_id, assigned_date) VALUES
    (2, 1, '2024-01-01'),
    (6, 2, '2024-02-01');
INSERT INTO students(id, student_code, program_id, school_id, enrollment_date, year_of_study, status, gpa) VALUES
    (1001, 'S1001', 10, 1, '2024-10-10', 1, 'active', 3.0),
    (1002, 'S1002', 10, 1, '2024-09-20', 1, 'active', NULL),
    (1003, 'S1003', 11, 1, '2023-09-01', 2, 'inactive', NULL),
    (1004, 'S1004', 11, 1, '2024-10-01', NULL, 'graduated', 2.0),
    (2001, 'S2001', 20, 2, '2024-10-12', 1, 'active', 3.5),
    (2002, 'S2002', 20, 2, '2022-09-01', 3, 'active', NULL);
INSERT INTO mentor_assignments(id, mentor_id, student_id, school_id, assignment_date, end_date, status, created_at) VALUES
    (1, 4, 1001, 1, '2024-09-01', NULL, 'active', '2024-09-01 08:00:00'),
    (2, 4, 2001, 2, '2024-09-01', NULL, 'active', '2024-09-01 08:00:00'),
    (3, 4, 1003, 1, '2024-01-01', '2024-06-30', 'ended', '2024-01-01 08:00:00'),
    (4, 5, 1002, 1, '2024-01-01', NULL, 'inactive', '2024-01-01 08:00:00'),
    (5, 8, 1001, 1, '2024-10-01', NULL, 'active', '2024-10-01 08:00:00');
INSERT INTO sis_enrollments(student_id, course_id, semester, enrollment_date, status, grade_points, letter_grade, completion_date) VALUES
    (1001, 100, '2024-1', '2024-09-01', 'enrolled', NULL, NULL, NULL),
    (1001, 101, '2023-2', '2024-01-10', 'completed', 3.0, 'B', '2024-05-01'),
    (2001, 200, '2024-1', '2024-09-01', 'dropped', NULL, NULL, NULL);
INSERT INTO attendance_records(student_id, date, status) VALUES
    (1001, '2024-10-01', 'present'),
    (1001, '2024-10-02', 'present'),
    (1001, '2024-10-03', 'absent'),
    (1001, '2024-08-01', 'present');
INSERT INTO lms_activities(student_id, week_number, academic_year, engagement_score) VALUES
    (1001, 1, 2024, 80.0),
    (1001, 2, 2024, 70.0),
    (1001, 50, 2023, 10.0);
";

pub fn seeded_workspace(
    prefix: &str,
) -> (PathBuf, Child, ChildStdin, BufReader<ChildStdout>) {
    let workspace = temp_dir(prefix);
    let (child, mut stdin, mut reader) = spawn_sidecar();
    open_workspace(&mut stdin, &mut reader, &workspace);
    seed(&workspace, BASE_SEED);
    (workspace, child, stdin, reader)
}

pub fn ids(items: &serde_json::Value) -> Vec<i64> {
    items
        .as_array()
        .map(|a| a.iter().filter_map(|v| v.get("id").and_then(|id| id.as_i64())).collect())
        .unwrap_or_default()
}
