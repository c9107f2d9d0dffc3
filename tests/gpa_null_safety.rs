mod test_support;

use serde_json::json;
use test_support::{actor, call_ok, open_workspace, seed, spawn_sidecar, temp_dir};

const SEED: &str = "
INSERT INTO schools(id, school_code, school_name) VALUES (1, 'A', 'Alpha'), (2, 'B', 'Beta');
INSERT INTO programs(id, program_code, program_name, school_id, degree_type) VALUES
    (1, 'PA', 'Alpha Studies', 1, 'Bachelor'),
    (2, 'PB', 'Beta Studies', 2, 'Bachelor');
INSERT INTO users(id, name, email, role) VALUES
    (1, 'Root', 'root@x', 'admin'),
    (2, 'Alpha Admin', 'alpha@x', 'school_admin'),
    (3, 'Beta Admin', 'beta@x', 'school_admin');
INSERT INTO school_admins(user_id, school_id, assigned_date) VALUES (2, 1, '2024-01-01'), (3, 2, '2024-01-01');
INSERT INTO students(id, student_code, program_id, school_id, enrollment_date, gpa) VALUES
    (1, 'A1', 1, 1, '2024-01-01', NULL),
    (2, 'A2', 1, 1, '2024-01-01', NULL),
    (3, 'B1', 2, 2, '2024-01-01', 3.0),
    (4, 'B2', 2, 2, '2024-01-01', NULL),
    (5, 'B3', 2, 2, '2024-01-01', NULL);
";

#[test]
fn average_gpa_ignores_missing_values() {
    let workspace = temp_dir("cohortd-gpa-nulls");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    open_workspace(&mut stdin, &mut reader, &workspace);
    seed(&workspace, SEED);

    let alpha = call_ok(
        &mut stdin,
        &mut reader,
        "1",
        "schoolAdmin.overview",
        actor(2, "school_admin"),
        json!({}),
    );
    assert!(alpha.pointer("/stats/avgGpa").is_some_and(|v| v.is_null()));

    let beta = call_ok(
        &mut stdin,
        &mut reader,
        "2",
        "schoolAdmin.overview",
        actor(3, "school_admin"),
        json!({}),
    );
    assert_eq!(beta.pointer("/stats/avgGpa").and_then(|v| v.as_f64()), Some(3.0));

    let analytics = call_ok(
        &mut stdin,
        &mut reader,
        "3",
        "admin.analytics",
        actor(1, "admin"),
        json!({}),
    );
    assert!(analytics.pointer("/gpaBySchool/0/avgGpa").is_some_and(|v| v.is_null()));
    assert_eq!(
        analytics.pointer("/gpaBySchool/1/avgGpa").and_then(|v| v.as_f64()),
        Some(3.0)
    );

    let detail = call_ok(
        &mut stdin,
        &mut reader,
        "4",
        "admin.schools.open",
        actor(1, "admin"),
        json!({ "schoolId": 1 }),
    );
    assert!(detail.pointer("/stats/avgGpa").is_some_and(|v| v.is_null()));
    assert!(detail.pointer("/metrics/averageGpa").is_some_and(|v| v.is_null()));
    assert_eq!(detail.pointer("/stats/totalStudents").and_then(|v| v.as_i64()), Some(2));
}
