use crate::analytics::AttendanceStatus;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{
    get_optional_str, get_required_str, load_schedules, parse_date, require_class, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use crate::schedule;
use chrono::{Local, NaiveDate, Utc};
use rusqlite::{Connection, OptionalExtension};
use serde_json::json;
use uuid::Uuid;

/// Student self check-in via the QR-delivered link.
///
/// Unlike the instructor path this never overwrites: a second submission for
/// the same (student, class, day) is rejected with `already_marked`. The two
/// paths intentionally have different idempotency policies.
fn checkin_submit(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let class_id = get_required_str(params, "classId")?;
    let student_no = get_required_str(params, "studentNo")?.trim().to_string();
    let name = get_required_str(params, "name")?.trim().to_string();
    if student_no.is_empty() || name.is_empty() {
        return Err(HandlerErr::bad_params("name and studentNo must not be empty"));
    }
    let email = get_optional_str(params, "email");
    // The kiosk flow always means "today"; tests may pin the date.
    let date: NaiveDate = match get_optional_str(params, "date") {
        Some(s) => parse_date(&s, "date")?,
        None => Local::now().date_naive(),
    };

    require_class(conn, &class_id)?;

    let entries = load_schedules(conn, &class_id)?;
    if !schedule::meets_on(&entries, date) {
        return Err(
            HandlerErr::new("no_scheduled_session", "class does not meet today")
                .with_details(json!({ "classId": class_id, "date": date.to_string() })),
        );
    }

    // First scan from an unknown student number enrolls them on the spot.
    let existing: Option<String> = conn
        .query_row(
            "SELECT id FROM students WHERE class_id = ? AND student_no = ?",
            (&class_id, &student_no),
            |r| r.get(0),
        )
        .optional()
        .map_err(|e| HandlerErr::db("db_query_failed", e))?;
    let student_id = match existing {
        Some(id) => id,
        None => {
            let id = Uuid::new_v4().to_string();
            conn.execute(
                "INSERT INTO students(id, class_id, name, student_no, email, created_at)
                 VALUES(?, ?, ?, ?, ?, ?)",
                (&id, &class_id, &name, &student_no, &email, Utc::now().to_rfc3339()),
            )
            .map_err(|e| HandlerErr::db("db_insert_failed", e).with_details(json!({ "table": "students" })))?;
            id
        }
    };

    let already: Option<String> = conn
        .query_row(
            "SELECT id FROM attendance_records WHERE student_id = ? AND class_id = ? AND date = ?",
            (&student_id, &class_id, date.to_string()),
            |r| r.get(0),
        )
        .optional()
        .map_err(|e| HandlerErr::db("db_query_failed", e))?;
    if already.is_some() {
        return Err(HandlerErr::new(
            "already_marked",
            "attendance already marked for today",
        ));
    }

    // Plain insert, not upsert; marked_by stays NULL because no instructor
    // identity is behind a self check-in.
    conn.execute(
        "INSERT INTO attendance_records(id, student_id, class_id, date, status, marked_at, marked_by)
         VALUES(?, ?, ?, ?, ?, ?, NULL)",
        (
            Uuid::new_v4().to_string(),
            &student_id,
            &class_id,
            date.to_string(),
            AttendanceStatus::Present.as_str(),
            Utc::now().to_rfc3339(),
        ),
    )
    .map_err(|e| HandlerErr::db("db_insert_failed", e).with_details(json!({ "table": "attendance_records" })))?;

    Ok(json!({ "studentId": student_id, "date": date.to_string(), "status": "present" }))
}

/// classId -> scannable path. The QR image itself is rendered by the shell;
/// this is just the pure mapping it encodes.
fn checkin_url(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let class_id = get_required_str(params, "classId")?;
    require_class(conn, &class_id)?;
    Ok(json!({ "path": format!("/attend/{}", class_id) }))
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
        "checkin.submit" => Some(dispatch(state, req, checkin_submit)),
        "checkin.url" => Some(dispatch(state, req, checkin_url)),
        _ => None,
    }
}
