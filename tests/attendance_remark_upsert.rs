mod test_support;

use serde_json::json;
use test_support::{
    request_err, request_ok, select_workspace_and_create_class, spawn_sidecar, temp_dir,
};

#[test]
fn instructor_remark_overwrites_the_same_triple_without_duplicating() {
    let workspace = temp_dir("attendanced-remark");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let class_id =
        select_workspace_and_create_class(&mut stdin, &mut reader, &workspace, "Biology");

    let added = request_ok(
        &mut stdin,
        &mut reader,
        "s1",
        "students.add",
        json!({ "classId": class_id, "name": "Ada Li", "studentNo": "S1" }),
    );
    let student_id = added
        .get("studentId")
        .and_then(|v| v.as_str())
        .unwrap()
        .to_string();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "sch",
        "schedules.create",
        json!({
            "classId": class_id,
            "dayOfWeek": 1,
            "startTime": "09:00",
            "endTime": "10:00"
        }),
    );

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "m1",
        "attendance.mark",
        json!({
            "classId": class_id,
            "studentId": student_id,
            "date": "2024-01-01",
            "status": "present",
            "markedBy": "teacher-1"
        }),
    );
    // Same (student, class, date): last write wins.
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "m2",
        "attendance.mark",
        json!({
            "classId": class_id,
            "studentId": student_id,
            "date": "2024-01-01",
            "status": "late",
            "markedBy": "teacher-1"
        }),
    );

    let listed = request_ok(
        &mut stdin,
        &mut reader,
        "list",
        "attendance.list",
        json!({ "classId": class_id, "date": "2024-01-01" }),
    );
    let records = listed.get("records").and_then(|v| v.as_array()).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(
        records[0].get("status").and_then(|v| v.as_str()),
        Some("late")
    );
}

#[test]
fn single_mark_is_gated_by_the_schedule_too() {
    let workspace = temp_dir("attendanced-single-gate");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let class_id =
        select_workspace_and_create_class(&mut stdin, &mut reader, &workspace, "Biology");

    let added = request_ok(
        &mut stdin,
        &mut reader,
        "s1",
        "students.add",
        json!({ "classId": class_id, "name": "Ada Li", "studentNo": "S1" }),
    );
    let student_id = added
        .get("studentId")
        .and_then(|v| v.as_str())
        .unwrap()
        .to_string();

    // No schedule entries at all: an unscheduled class never meets.
    let _ = request_err(
        &mut stdin,
        &mut reader,
        "m1",
        "attendance.mark",
        json!({
            "classId": class_id,
            "studentId": student_id,
            "date": "2024-01-01",
            "status": "present"
        }),
        "no_scheduled_session",
    );
}
