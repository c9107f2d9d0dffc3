mod test_support;

use serde_json::json;
use test_support::{actor, call_ok, ids, open_workspace, seed, spawn_sidecar, temp_dir};

#[test]
fn recent_students_are_windowed_newest_first_and_capped() {
    let workspace = temp_dir("cohortd-recent-students");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    open_workspace(&mut stdin, &mut reader, &workspace);

    let mut sql = String::from(
        "INSERT INTO schools(id, school_code, school_name) VALUES (1, 'SCES', 'Computing'), (2, 'SBS', 'Business');
         INSERT INTO programs(id, program_code, program_name, school_id, degree_type) VALUES
             (10, 'BICS', 'Informatics', 1, 'Bachelor'),
             (20, 'BCOM', 'Commerce', 2, 'Bachelor');
         INSERT INTO users(id, name, email, role) VALUES (2, 'Ada', 'ada@x', 'school_admin');
         INSERT INTO school_admins(user_id, school_id, assigned_date) VALUES (2, 1, '2024-01-01');
         -- Boundary: exactly 30 days before 2024-10-15 is in, 31 days is out.
         INSERT INTO students(id, student_code, program_id, school_id, enrollment_date) VALUES
             (1, 'EDGE-IN', 10, 1, '2024-09-15'),
             (2, 'EDGE-OUT', 10, 1, '2024-09-14'),
             (3, 'OTHER-SCHOOL', 20, 2, '2024-10-15');\n",
    );
    // Twelve recent enrollments on distinct days, 2024-10-01 .. 2024-10-12.
    for day in 1..=12 {
        sql.push_str(&format!(
            "INSERT INTO students(id, student_code, program_id, school_id, enrollment_date)
                 VALUES ({}, 'R{day}', 10, 1, '2024-10-{day:02}');\n",
            100 + day
        ));
    }
    seed(&workspace, &sql);

    let overview = call_ok(
        &mut stdin,
        &mut reader,
        "1",
        "schoolAdmin.overview",
        actor(2, "school_admin"),
        json!({}),
    );
    let recent = ids(&overview["recentStudents"]);
    assert_eq!(recent, (103..=112).rev().collect::<Vec<_>>());
    assert_eq!(overview["recentEnrollmentDays"].as_i64(), Some(30));
    assert_eq!(
        overview.pointer("/recentStudents/0/program/code").and_then(|v| v.as_str()),
        Some("BICS")
    );

    // Drop the cap-fillers: the boundary student appears, the day before does not.
    seed(&workspace, "DELETE FROM students WHERE id BETWEEN 101 AND 112;");
    let overview = call_ok(
        &mut stdin,
        &mut reader,
        "2",
        "schoolAdmin.overview",
        actor(2, "school_admin"),
        json!({}),
    );
    assert_eq!(ids(&overview["recentStudents"]), vec![1]);
}
