use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{get_optional_str, get_required_str, require_class, HandlerErr};
use crate::ipc::types::{AppState, Request};
use chrono::Utc;
use rusqlite::Connection;
use serde_json::json;
use uuid::Uuid;

fn students_list(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let class_id = get_required_str(params, "classId")?;
    require_class(conn, &class_id)?;

    let mut stmt = conn
        .prepare(
            "SELECT id, name, student_no, email
             FROM students
             WHERE class_id = ?
             ORDER BY name",
        )
        .map_err(|e| HandlerErr::db("db_query_failed", e))?;
    let students = stmt
        .query_map([&class_id], |r| {
            Ok(json!({
                "id": r.get::<_, String>(0)?,
                "name": r.get::<_, String>(1)?,
                "studentNo": r.get::<_, String>(2)?,
                "email": r.get::<_, Option<String>>(3)?
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(|e| HandlerErr::db("db_query_failed", e))?;

    Ok(json!({ "students": students }))
}

fn students_add(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let class_id = get_required_str(params, "classId")?;
    let name = get_required_str(params, "name")?.trim().to_string();
    let student_no = get_required_str(params, "studentNo")?.trim().to_string();
    if name.is_empty() || student_no.is_empty() {
        return Err(HandlerErr::bad_params("name and studentNo must not be empty"));
    }
    let email = get_optional_str(params, "email");
    require_class(conn, &class_id)?;

    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO students(id, class_id, name, student_no, email, created_at)
         VALUES(?, ?, ?, ?, ?, ?)",
        (&id, &class_id, &name, &student_no, &email, Utc::now().to_rfc3339()),
    )
    .map_err(|e| {
        // (class_id, student_no) is unique; surface the collision as such.
        if matches!(
            e.sqlite_error_code(),
            Some(rusqlite::ErrorCode::ConstraintViolation)
        ) {
            HandlerErr::new("duplicate_student_no", "studentNo already exists in this class")
        } else {
            HandlerErr::db("db_insert_failed", e).with_details(json!({ "table": "students" }))
        }
    })?;

    Ok(json!({ "studentId": id }))
}

fn students_update(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    let name = get_required_str(params, "name")?.trim().to_string();
    if name.is_empty() {
        return Err(HandlerErr::bad_params("name must not be empty"));
    }
    let email = get_optional_str(params, "email");

    let updated = conn
        .execute(
            "UPDATE students SET name = ?, email = ? WHERE id = ?",
            (&name, &email, &student_id),
        )
        .map_err(|e| HandlerErr::db("db_update_failed", e))?;
    if updated == 0 {
        return Err(HandlerErr::new("not_found", "student not found"));
    }
    Ok(json!({ "studentId": student_id }))
}

fn students_remove(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;

    // Marks are kept: a removed student drops out of the roster (and so out
    // of per-student stats) but still counts in historic per-date trends.
    // Record deletion is its own explicit action, attendance.delete.
    let deleted = conn
        .execute("DELETE FROM students WHERE id = ?", [&student_id])
        .map_err(|e| HandlerErr::db("db_delete_failed", e))?;
    if deleted == 0 {
        return Err(HandlerErr::new("not_found", "student not found"));
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
        "students.list" => Some(dispatch(state, req, students_list)),
        "students.add" => Some(dispatch(state, req, students_add)),
        "students.update" => Some(dispatch(state, req, students_update)),
        "students.remove" => Some(dispatch(state, req, students_remove)),
        _ => None,
    }
}
