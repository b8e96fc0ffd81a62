mod test_support;

use serde_json::json;
use std::io::BufReader;
use std::process::{ChildStdin, ChildStdout};
use test_support::{request_ok, select_workspace_and_create_class, spawn_sidecar, temp_dir};

fn mark(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    class_id: &str,
    student_id: &str,
    date: &str,
    status: &str,
) {
    let _ = request_ok(
        stdin,
        reader,
        id,
        "attendance.mark",
        json!({
            "classId": class_id,
            "studentId": student_id,
            "date": date,
            "status": status,
            "markedBy": "teacher-1"
        }),
    );
}

#[test]
fn snapshot_matches_the_two_day_roster_scenario() {
    let workspace = temp_dir("attendanced-analytics");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let class_id =
        select_workspace_and_create_class(&mut stdin, &mut reader, &workspace, "History");

    let mut student_ids = Vec::new();
    for (i, (name, no)) in [("Ada Li", "S1"), ("Ben Ortiz", "S2")].iter().enumerate() {
        let added = request_ok(
            &mut stdin,
            &mut reader,
            &format!("s{}", i),
            "students.add",
            json!({ "classId": class_id, "name": name, "studentNo": no }),
        );
        student_ids.push(
            added
                .get("studentId")
                .and_then(|v| v.as_str())
                .unwrap()
                .to_string(),
        );
    }
    // Meets Monday and Tuesday so both scenario dates are markable.
    for (i, day) in [1u8, 2u8].iter().enumerate() {
        let _ = request_ok(
            &mut stdin,
            &mut reader,
            &format!("sch{}", i),
            "schedules.create",
            json!({
                "classId": class_id,
                "dayOfWeek": day,
                "startTime": "09:00",
                "endTime": "10:00"
            }),
        );
    }

    let (ada, ben) = (&student_ids[0], &student_ids[1]);
    mark(&mut stdin, &mut reader, "m1", &class_id, ada, "2024-01-01", "present");
    mark(&mut stdin, &mut reader, "m2", &class_id, ben, "2024-01-01", "absent");
    mark(&mut stdin, &mut reader, "m3", &class_id, ada, "2024-01-02", "present");
    mark(&mut stdin, &mut reader, "m4", &class_id, ben, "2024-01-02", "present");

    let snap = request_ok(
        &mut stdin,
        &mut reader,
        "an",
        "analytics.class",
        json!({
            "classId": class_id,
            "startDate": "2024-01-01",
            "endDate": "2024-01-31"
        }),
    );

    assert_eq!(snap.get("totalSessions").and_then(|v| v.as_u64()), Some(2));
    assert_eq!(
        snap.get("averageAttendanceRate").and_then(|v| v.as_f64()),
        Some(75.0)
    );

    let trends = snap.get("attendanceTrends").and_then(|v| v.as_array()).unwrap();
    assert_eq!(trends.len(), 2);
    assert_eq!(trends[0].get("date").and_then(|v| v.as_str()), Some("2024-01-01"));
    assert_eq!(trends[0].get("present").and_then(|v| v.as_u64()), Some(1));
    assert_eq!(trends[0].get("absent").and_then(|v| v.as_u64()), Some(1));
    assert_eq!(trends[0].get("attendanceRate").and_then(|v| v.as_f64()), Some(50.0));
    assert_eq!(trends[1].get("date").and_then(|v| v.as_str()), Some("2024-01-02"));
    assert_eq!(trends[1].get("attendanceRate").and_then(|v| v.as_f64()), Some(100.0));

    let stats = snap.get("studentStats").and_then(|v| v.as_array()).unwrap();
    assert_eq!(stats.len(), 2);
    let ada_stat = stats
        .iter()
        .find(|s| s.get("studentId").and_then(|v| v.as_str()) == Some(ada.as_str()))
        .unwrap();
    assert_eq!(ada_stat.get("attendanceRate").and_then(|v| v.as_f64()), Some(100.0));

    // Ben sits below the 80% threshold; Ada has perfect attendance.
    let risk = snap.get("riskStudents").and_then(|v| v.as_array()).unwrap();
    assert_eq!(risk.len(), 1);
    assert_eq!(
        risk[0].get("studentId").and_then(|v| v.as_str()),
        Some(ben.as_str())
    );
    assert_eq!(
        snap.get("perfectAttendanceCount").and_then(|v| v.as_u64()),
        Some(1)
    );
}

#[test]
fn snapshot_is_zeroed_for_a_class_with_no_records() {
    let workspace = temp_dir("attendanced-analytics-empty");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let class_id =
        select_workspace_and_create_class(&mut stdin, &mut reader, &workspace, "History");
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "s1",
        "students.add",
        json!({ "classId": class_id, "name": "Ada Li", "studentNo": "S1" }),
    );

    let snap = request_ok(
        &mut stdin,
        &mut reader,
        "an",
        "analytics.class",
        json!({ "classId": class_id }),
    );
    assert_eq!(snap.get("totalSessions").and_then(|v| v.as_u64()), Some(0));
    assert_eq!(
        snap.get("averageAttendanceRate").and_then(|v| v.as_f64()),
        Some(0.0)
    );
    assert_eq!(
        snap.get("attendanceTrends").and_then(|v| v.as_array()).map(|a| a.len()),
        Some(0)
    );
    // Zero-session students stay off both the risk list and the perfect count.
    assert_eq!(
        snap.get("riskStudents").and_then(|v| v.as_array()).map(|a| a.len()),
        Some(0)
    );
    assert_eq!(
        snap.get("perfectAttendanceCount").and_then(|v| v.as_u64()),
        Some(0)
    );
    let stats = snap.get("studentStats").and_then(|v| v.as_array()).unwrap();
    assert_eq!(stats.len(), 1);
    assert_eq!(stats[0].get("totalSessions").and_then(|v| v.as_u64()), Some(0));
}
