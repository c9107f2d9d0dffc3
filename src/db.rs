use rusqlite::{Connection, OptionalExtension};
use std::path::Path;

pub const DB_FILE_NAME: &str = "cohort.sqlite3";
pub const SCHEMA_VERSION: i64 = 1;

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE_NAME);
    let conn = Connection::open(db_path)?;
    migrate(&conn)?;
    Ok(conn)
}

pub fn migrate(conn: &Connection) -> anyhow::Result<()> {
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    let current: i64 = conn.query_row("PRAGMA user_version", [], |r| r.get(0))?;
    if current > SCHEMA_VERSION {
        anyhow::bail!(
            "unsupported schema version {}, max supported {}",
            current,
            SCHEMA_VERSION
        );
    }

    conn.execute(
        "CREATE TABLE IF NOT EXISTS schools(
            id INTEGER PRIMARY KEY,
            school_code TEXT NOT NULL UNIQUE,
            school_name TEXT NOT NULL,
            university TEXT,
            status TEXT NOT NULL DEFAULT 'active'
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS programs(
            id INTEGER PRIMARY KEY,
            program_code TEXT NOT NULL UNIQUE,
            program_name TEXT NOT NULL,
            school_id INTEGER NOT NULL,
            degree_type TEXT NOT NULL,
            duration_years INTEGER NOT NULL DEFAULT 4,
            status TEXT NOT NULL DEFAULT 'active' CHECK(status IN ('active', 'inactive')),
            FOREIGN KEY(school_id) REFERENCES schools(id) ON DELETE CASCADE
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_programs_school ON programs(school_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS courses(
            id INTEGER PRIMARY KEY,
            course_code TEXT NOT NULL,
            course_name TEXT NOT NULL,
            program_id INTEGER,
            school_id INTEGER NOT NULL,
            credits INTEGER NOT NULL,
            year_level INTEGER NOT NULL,
            semester INTEGER NOT NULL DEFAULT 1,
            FOREIGN KEY(program_id) REFERENCES programs(id) ON DELETE CASCADE,
            FOREIGN KEY(school_id) REFERENCES schools(id) ON DELETE CASCADE
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_courses_school ON courses(school_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS users(
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            email TEXT NOT NULL UNIQUE,
            role TEXT NOT NULL CHECK(role IN ('admin', 'school_admin', 'mentor')),
            status TEXT NOT NULL DEFAULT 'active'
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_users_role ON users(role)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS school_admins(
            id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL,
            school_id INTEGER NOT NULL,
            assigned_date TEXT NOT NULL,
            FOREIGN KEY(user_id) REFERENCES users(id) ON DELETE CASCADE,
            FOREIGN KEY(school_id) REFERENCES schools(id) ON DELETE CASCADE,
            UNIQUE(user_id, school_id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_school_admins_school ON school_admins(school_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            id INTEGER PRIMARY KEY,
            student_code TEXT NOT NULL UNIQUE,
            program_id INTEGER NOT NULL,
            school_id INTEGER NOT NULL,
            enrollment_date TEXT NOT NULL,
            year_of_study INTEGER,
            status TEXT NOT NULL DEFAULT 'active'
                CHECK(status IN ('active', 'inactive', 'graduated', 'transferred')),
            gpa REAL,
            FOREIGN KEY(program_id) REFERENCES programs(id) ON DELETE CASCADE,
            FOREIGN KEY(school_id) REFERENCES schools(id) ON DELETE CASCADE
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_school ON students(school_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_program ON students(program_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_enrollment_date ON students(school_id, enrollment_date)",
        [],
    )?;
    // Program and school refs must agree; the import layer is not trusted to check.
    conn.execute(
        "CREATE TRIGGER IF NOT EXISTS trg_students_program_school_insert
         BEFORE INSERT ON students
         WHEN (SELECT school_id FROM programs WHERE id = NEW.program_id) IS NOT NEW.school_id
         BEGIN
             SELECT RAISE(ABORT, 'student program belongs to a different school');
         END",
        [],
    )?;
    conn.execute(
        "CREATE TRIGGER IF NOT EXISTS trg_students_program_school_update
         BEFORE UPDATE OF program_id, school_id ON students
         WHEN (SELECT school_id FROM programs WHERE id = NEW.program_id) IS NOT NEW.school_id
         BEGIN
             SELECT RAISE(ABORT, 'student program belongs to a different school');
         END",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS sis_enrollments(
            id INTEGER PRIMARY KEY,
            student_id INTEGER NOT NULL,
            course_id INTEGER NOT NULL,
            semester TEXT NOT NULL,
            enrollment_date TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'enrolled'
                CHECK(status IN ('enrolled', 'completed', 'dropped', 'failed')),
            grade_points REAL,
            letter_grade TEXT,
            is_repeating INTEGER NOT NULL DEFAULT 0,
            completion_date TEXT,
            FOREIGN KEY(student_id) REFERENCES students(id) ON DELETE CASCADE,
            FOREIGN KEY(course_id) REFERENCES courses(id) ON DELETE CASCADE
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_sis_enrollments_student ON sis_enrollments(student_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS lms_activities(
            id INTEGER PRIMARY KEY,
            student_id INTEGER NOT NULL,
            week_number INTEGER NOT NULL,
            academic_year INTEGER NOT NULL,
            login_count INTEGER NOT NULL DEFAULT 0,
            time_spent_minutes INTEGER NOT NULL DEFAULT 0,
            assignments_submitted INTEGER NOT NULL DEFAULT 0,
            assignments_total INTEGER NOT NULL DEFAULT 0,
            avg_assignment_score REAL,
            quizzes_attempted INTEGER NOT NULL DEFAULT 0,
            resources_accessed INTEGER NOT NULL DEFAULT 0,
            discussion_posts INTEGER NOT NULL DEFAULT 0,
            engagement_score REAL NOT NULL DEFAULT 0,
            FOREIGN KEY(student_id) REFERENCES students(id) ON DELETE CASCADE,
            UNIQUE(student_id, week_number, academic_year)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_lms_activities_year ON lms_activities(academic_year, student_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS attendance_records(
            id INTEGER PRIMARY KEY,
            student_id INTEGER NOT NULL,
            date TEXT NOT NULL,
            status TEXT NOT NULL CHECK(status IN ('present', 'absent', 'late', 'excused')),
            consecutive_absences INTEGER NOT NULL DEFAULT 0,
            arrival_time TEXT,
            notes TEXT,
            FOREIGN KEY(student_id) REFERENCES students(id) ON DELETE CASCADE,
            UNIQUE(student_id, date)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS mentor_assignments(
            id INTEGER PRIMARY KEY,
            mentor_id INTEGER NOT NULL,
            student_id INTEGER NOT NULL,
            school_id INTEGER NOT NULL,
            assignment_date TEXT NOT NULL,
            end_date TEXT,
            status TEXT NOT NULL DEFAULT 'active',
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            FOREIGN KEY(mentor_id) REFERENCES users(id) ON DELETE CASCADE,
            FOREIGN KEY(student_id) REFERENCES students(id) ON DELETE CASCADE,
            FOREIGN KEY(school_id) REFERENCES schools(id) ON DELETE CASCADE
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_mentor_assignments_mentor ON mentor_assignments(mentor_id, status)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_mentor_assignments_student ON mentor_assignments(student_id, status)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings(
            key TEXT PRIMARY KEY,
            value_json TEXT NOT NULL
        )",
        [],
    )?;

    if current < SCHEMA_VERSION {
        conn.execute_batch(&format!("PRAGMA user_version = {}", SCHEMA_VERSION))?;
    }

    Ok(())
}

/// Raw saved text for a settings section; parsing is left to the caller.
pub fn settings_get_text(conn: &Connection, key: &str) -> anyhow::Result<Option<String>> {
    let raw = conn
        .query_row("SELECT value_json FROM settings WHERE key = ?", [key], |r| {
            r.get(0)
        })
        .optional()?;
    Ok(raw)
}
