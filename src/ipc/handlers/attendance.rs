use crate::analytics::AttendanceStatus;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{
    get_optional_str, get_required_str, load_schedules, parse_date, require_class, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use crate::schedule;
use chrono::{NaiveDate, Utc};
use rusqlite::Connection;
use serde_json::json;
use uuid::Uuid;

fn parse_status(params: &serde_json::Value) -> Result<AttendanceStatus, HandlerErr> {
    let raw = get_required_str(params, "status")?;
    AttendanceStatus::parse(&raw)
        .ok_or_else(|| HandlerErr::bad_params("status must be present, absent or late"))
}

/// Hard gate shared by every instructor marking path: a class that has no
/// matching schedule entry for the date cannot have attendance taken.
fn require_session(conn: &Connection, class_id: &str, date: NaiveDate) -> Result<(), HandlerErr> {
    let entries = load_schedules(conn, class_id)?;
    if schedule::meets_on(&entries, date) {
        Ok(())
    } else {
        Err(
            HandlerErr::new("no_scheduled_session", "class does not meet on this date")
                .with_details(json!({ "classId": class_id, "date": date.to_string() })),
        )
    }
}

/// Last-write-wins on the (student, class, date) natural key; re-marking
/// replaces status and marked_at, never duplicates.
fn upsert_record(
    conn: &Connection,
    student_id: &str,
    class_id: &str,
    date: NaiveDate,
    status: AttendanceStatus,
    marked_by: Option<&str>,
) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT INTO attendance_records(id, student_id, class_id, date, status, marked_at, marked_by)
         VALUES(?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(student_id, class_id, date) DO UPDATE SET
           status = excluded.status,
           marked_at = excluded.marked_at,
           marked_by = excluded.marked_by",
        (
            Uuid::new_v4().to_string(),
            student_id,
            class_id,
            date.to_string(),
            status.as_str(),
            Utc::now().to_rfc3339(),
            marked_by,
        ),
    )?;
    Ok(())
}

fn attendance_list(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let class_id = get_required_str(params, "classId")?;
    require_class(conn, &class_id)?;
    let date = match get_optional_str(params, "date") {
        Some(s) => Some(parse_date(&s, "date")?),
        None => None,
    };

    // Join with roster display fields; a record whose student was removed
    // still comes back, with a null name.
    let mut stmt = conn
        .prepare(
            "SELECT a.id, a.student_id, a.date, a.status, a.marked_at, a.marked_by,
                    s.name, s.student_no
             FROM attendance_records a
             LEFT JOIN students s ON s.id = a.student_id
             WHERE a.class_id = ?1
               AND (?2 IS NULL OR a.date = ?2)
             ORDER BY a.marked_at DESC",
        )
        .map_err(|e| HandlerErr::db("db_query_failed", e))?;
    let records = stmt
        .query_map(
            (&class_id, date.map(|d| d.to_string())),
            |r| {
                Ok(json!({
                    "id": r.get::<_, String>(0)?,
                    "studentId": r.get::<_, String>(1)?,
                    "date": r.get::<_, String>(2)?,
                    "status": r.get::<_, String>(3)?,
                    "markedAt": r.get::<_, String>(4)?,
                    "markedBy": r.get::<_, Option<String>>(5)?,
                    "studentName": r.get::<_, Option<String>>(6)?,
                    "studentNo": r.get::<_, Option<String>>(7)?
                }))
            },
        )
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(|e| HandlerErr::db("db_query_failed", e))?;

    Ok(json!({ "records": records }))
}

fn attendance_mark(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let class_id = get_required_str(params, "classId")?;
    let student_id = get_required_str(params, "studentId")?;
    let date = parse_date(&get_required_str(params, "date")?, "date")?;
    let status = parse_status(params)?;
    let marked_by = get_optional_str(params, "markedBy");

    require_class(conn, &class_id)?;
    require_session(conn, &class_id, date)?;

    upsert_record(conn, &student_id, &class_id, date, status, marked_by.as_deref())
        .map_err(|e| HandlerErr::db("db_update_failed", e).with_details(json!({ "table": "attendance_records" })))?;

    Ok(json!({ "marked": 1 }))
}

fn attendance_bulk_mark(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let class_id = get_required_str(params, "classId")?;
    let date = parse_date(&get_required_str(params, "date")?, "date")?;
    let status = parse_status(params)?;
    let marked_by = get_optional_str(params, "markedBy");

    require_class(conn, &class_id)?;
    // Rejecting here means zero writes; the gate is all-or-nothing.
    require_session(conn, &class_id, date)?;

    let mut stmt = conn
        .prepare("SELECT id FROM students WHERE class_id = ? ORDER BY name")
        .map_err(|e| HandlerErr::db("db_query_failed", e))?;
    let roster: Vec<String> = stmt
        .query_map([&class_id], |r| r.get(0))
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(|e| HandlerErr::db("db_query_failed", e))?;

    // One upsert per roster member. Deliberately no surrounding transaction:
    // marks that applied stand even if a later row fails, and the caller is
    // told how many failed instead of the batch silently rolling back.
    let mut marked: u64 = 0;
    let mut failed: u64 = 0;
    for student_id in &roster {
        match upsert_record(conn, student_id, &class_id, date, status, marked_by.as_deref()) {
            Ok(()) => marked += 1,
            Err(_) => failed += 1,
        }
    }

    Ok(json!({ "marked": marked, "failed": failed }))
}

fn attendance_delete(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let record_id = get_required_str(params, "recordId")?;
    let deleted = conn
        .execute("DELETE FROM attendance_records WHERE id = ?", [&record_id])
        .map_err(|e| HandlerErr::db("db_delete_failed", e))?;
    if deleted == 0 {
        return Err(HandlerErr::new("not_found", "attendance record not found"));
    }
    Ok(json!({ "deleted": true }))
}

fn dispatch(
    state: &mut AppState,
    req: &Request,
    f: fn(&Connection, &serde_json::Value) -> Result<serde_json::Value, HandlerErr>,
) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match f(conn, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "attendance.list" => Some(dispatch(state, req, attendance_list)),
        "attendance.mark" => Some(dispatch(state, req, attendance_mark)),
        "attendance.bulkMark" => Some(dispatch(state, req, attendance_bulk_mark)),
        "attendance.delete" => Some(dispatch(state, req, attendance_delete)),
        _ => None,
    }
}
