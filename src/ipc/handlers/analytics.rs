use crate::analytics::{self, DateRange, MarkRow, RosterStudent};
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{get_optional_str, get_required_str, parse_date, require_class, HandlerErr};
use crate::ipc::types::{AppState, Request};
use chrono::{Duration, Local};
use rusqlite::Connection;
use serde_json::json;

/// Dashboard snapshot for one class. The range defaults to the trailing 30
/// days ending today; recomputation is idempotent, so callers are free to
/// re-run it on every refresh.
fn analytics_class(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let class_id = get_required_str(params, "classId")?;
    require_class(conn, &class_id)?;

    let today = Local::now().date_naive();
    let start = match get_optional_str(params, "startDate") {
        Some(s) => parse_date(&s, "startDate")?,
        None => today - Duration::days(30),
    };
    let end = match get_optional_str(params, "endDate") {
        Some(s) => parse_date(&s, "endDate")?,
        None => today,
    };
    if start > end {
        return Err(HandlerErr::bad_params("startDate must not be after endDate"));
    }
    let range = DateRange { start, end };

    let mut stmt = conn
        .prepare(
            "SELECT student_id, date, status
             FROM attendance_records
             WHERE class_id = ? AND date >= ? AND date <= ?
             ORDER BY date",
        )
        .map_err(|e| HandlerErr::db("db_query_failed", e))?;
    let raw = stmt
        .query_map(
            (&class_id, start.to_string(), end.to_string()),
            |r| {
                Ok((
                    r.get::<_, String>(0)?,
                    r.get::<_, String>(1)?,
                    r.get::<_, String>(2)?,
                ))
            },
        )
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(|e| HandlerErr::db("db_query_failed", e))?;

    let mut records = Vec::with_capacity(raw.len());
    for (student_id, date, status) in raw {
        let date = parse_date(&date, "date")
            .map_err(|_| HandlerErr::new("db_corrupt", "unreadable record date"))?;
        let status = analytics::AttendanceStatus::parse(&status)
            .ok_or_else(|| HandlerErr::new("db_corrupt", "unreadable record status"))?;
        records.push(MarkRow {
            student_id,
            date,
            status,
        });
    }

    let mut stmt = conn
        .prepare("SELECT id, name FROM students WHERE class_id = ? ORDER BY name")
        .map_err(|e| HandlerErr::db("db_query_failed", e))?;
    let roster: Vec<RosterStudent> = stmt
        .query_map([&class_id], |r| {
            Ok(RosterStudent {
                id: r.get(0)?,
                name: r.get(1)?,
            })
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(|e| HandlerErr::db("db_query_failed", e))?;

    let snapshot = analytics::compute_analytics(&records, &roster, range);
    let mut result = serde_json::to_value(&snapshot)
        .map_err(|e| HandlerErr::new("internal", e.to_string()))?;
    result["startDate"] = json!(start.to_string());
    result["endDate"] = json!(end.to_string());
    Ok(result)
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
        "analytics.class" => Some(dispatch(state, req, analytics_class)),
        _ => None,
    }
}
