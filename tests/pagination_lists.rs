mod test_support;

use serde_json::json;
use std::collections::BTreeSet;
use test_support::{actor, call_ok, open_workspace, seed, spawn_sidecar, temp_dir, ids};

fn bulk_seed(n: i64) -> String {
    let mut sql = String::from(
        "INSERT INTO schools(id, school_code, school_name) VALUES (1, 'SCES', 'Computing');
         INSERT INTO programs(id, program_code, program_name, school_id, degree_type)
             VALUES (10, 'BICS', 'Informatics', 1, 'Bachelor');
         INSERT INTO users(id, name, email, role) VALUES
             (1, 'Root', 'root@x', 'admin'),
             (2, 'Ada', 'ada@x', 'school_admin'),
             (4, 'Cy', 'cy@x', 'mentor');
         INSERT INTO school_admins(user_id, school_id, assigned_date) VALUES (2, 1, '2024-01-01');\n",
    );
    for i in 1..=n {
        // Ids out of insertion order so ordering is actually exercised.
        let id = 5000 - i * 7;
        sql.push_str(&format!(
            "INSERT INTO students(id, student_code, program_id, school_id, enrollment_date, year_of_study)
                 VALUES ({id}, 'S{id}', 10, 1, '2023-09-01', {});\n",
            1 + i % 4
        ));
        if i % 2 == 0 {
            sql.push_str(&format!(
                "INSERT INTO mentor_assignments(mentor_id, student_id, school_id, assignment_date, status)
                     VALUES (4, {id}, 1, '2023-09-02', 'active');\n"
            ));
        }
    }
    sql
}

fn collect_pages(
    stdin: &mut std::process::ChildStdin,
    reader: &mut std::io::BufReader<std::process::ChildStdout>,
    method: &str,
    who: serde_json::Value,
    extra: serde_json::Value,
) -> Vec<Vec<i64>> {
    let mut pages = Vec::new();
    let mut page = 1;
    loop {
        let mut params = extra.clone();
        params["page"] = json!(page);
        let resp = call_ok(stdin, reader, &format!("p{page}"), method, who.clone(), params);
        let last_page = resp["lastPage"].as_i64().unwrap_or(0);
        pages.push(ids(&resp["items"]));
        if page >= last_page {
            break;
        }
        page += 1;
    }
    pages
}

#[test]
fn default_page_size_is_twenty_and_pages_tile_the_set() {
    let workspace = temp_dir("cohortd-pagination");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    open_workspace(&mut stdin, &mut reader, &workspace);
    seed(&workspace, &bulk_seed(45));

    let first = call_ok(
        &mut stdin,
        &mut reader,
        "1",
        "schoolAdmin.students.list",
        actor(2, "school_admin"),
        json!({}),
    );
    assert_eq!(first["pageSize"].as_i64(), Some(20));
    assert_eq!(first["total"].as_i64(), Some(45));
    assert_eq!(first["lastPage"].as_i64(), Some(3));
    assert_eq!(ids(&first["items"]).len(), 20);

    let pages = collect_pages(
        &mut stdin,
        &mut reader,
        "schoolAdmin.students.list",
        actor(2, "school_admin"),
        json!({}),
    );
    assert_eq!(pages.iter().map(Vec::len).collect::<Vec<_>>(), vec![20, 20, 5]);
    for pair in pages.windows(2) {
        let a = pair[0].iter().collect::<BTreeSet<_>>();
        assert!(pair[1].iter().all(|id| !a.contains(id)));
    }
    let all = pages.concat();
    let mut sorted = all.clone();
    sorted.sort_unstable();
    sorted.dedup();
    assert_eq!(all, sorted, "pages must be ordered by id without duplicates");
    assert_eq!(all.len(), 45);

    let past_end = call_ok(
        &mut stdin,
        &mut reader,
        "2",
        "schoolAdmin.students.list",
        actor(2, "school_admin"),
        json!({ "page": 9 }),
    );
    assert_eq!(ids(&past_end["items"]), Vec::<i64>::new());
    assert_eq!(past_end["total"].as_i64(), Some(45));
}

#[test]
fn mentor_list_pages_cover_only_assigned_students() {
    let workspace = temp_dir("cohortd-pagination-mentor");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    open_workspace(&mut stdin, &mut reader, &workspace);
    seed(&workspace, &bulk_seed(45));

    let pages = collect_pages(
        &mut stdin,
        &mut reader,
        "mentor.students.list",
        actor(4, "mentor"),
        json!({ "pageSize": 7 }),
    );
    assert_eq!(pages.iter().map(Vec::len).collect::<Vec<_>>(), vec![7, 7, 7, 1]);
    let all = pages.concat();
    let expected = (1..=45)
        .filter(|i| i % 2 == 0)
        .map(|i| 5000 - i * 7)
        .collect::<BTreeSet<_>>();
    assert_eq!(all.iter().copied().collect::<BTreeSet<_>>(), expected);
    assert_eq!(all.len(), expected.len());
}

#[test]
fn users_list_paginates_with_filters() {
    let workspace = temp_dir("cohortd-pagination-users");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    open_workspace(&mut stdin, &mut reader, &workspace);
    let mut sql = String::from(
        "INSERT INTO users(id, name, email, role) VALUES (1, 'Root', 'root@x', 'admin');\n",
    );
    for i in 2..=26 {
        sql.push_str(&format!(
            "INSERT INTO users(id, name, email, role, status) VALUES ({i}, 'M{i}', 'm{i}@x', 'mentor', '{}');\n",
            if i % 5 == 0 { "inactive" } else { "active" }
        ));
    }
    seed(&workspace, &sql);

    let first = call_ok(
        &mut stdin,
        &mut reader,
        "1",
        "admin.users.list",
        actor(1, "admin"),
        json!({ "role": "mentor" }),
    );
    assert_eq!(first["total"].as_i64(), Some(25));
    assert_eq!(ids(&first["items"]), (2..=21).collect::<Vec<_>>());

    let inactive = call_ok(
        &mut stdin,
        &mut reader,
        "2",
        "admin.users.list",
        actor(1, "admin"),
        json!({ "status": "inactive", "pageSize": 2, "page": 2 }),
    );
    assert_eq!(inactive["total"].as_i64(), Some(5));
    assert_eq!(ids(&inactive["items"]), vec![15, 20]);
}
