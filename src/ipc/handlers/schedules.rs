use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{
    get_optional_str, get_required_str, load_schedules, parse_date, parse_time, require_class,
    HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use crate::schedule;
use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime};
use rusqlite::Connection;
use serde_json::json;
use uuid::Uuid;

struct ScheduleParams {
    day_of_week: u8,
    start: NaiveTime,
    end: NaiveTime,
    valid_from: Option<NaiveDate>,
    valid_to: Option<NaiveDate>,
}

/// Validates the entry invariants at the boundary so the evaluator never
/// sees malformed data: day in 0..=6, start < end, valid_from <= valid_to.
fn parse_schedule_params(params: &serde_json::Value) -> Result<ScheduleParams, HandlerErr> {
    let day = params
        .get("dayOfWeek")
        .and_then(|v| v.as_u64())
        .ok_or_else(|| HandlerErr::bad_params("missing dayOfWeek"))?;
    if day > 6 {
        return Err(HandlerErr::bad_params(
            "dayOfWeek must be 0 (Sunday) through 6 (Saturday)",
        ));
    }
    let start = parse_time(&get_required_str(params, "startTime")?, "startTime")?;
    let end = parse_time(&get_required_str(params, "endTime")?, "endTime")?;
    if start >= end {
        return Err(HandlerErr::bad_params("startTime must be before endTime"));
    }
    let valid_from = match get_optional_str(params, "validFrom") {
        Some(s) => Some(parse_date(&s, "validFrom")?),
        None => None,
    };
    let valid_to = match get_optional_str(params, "validTo") {
        Some(s) => Some(parse_date(&s, "validTo")?),
        None => None,
    };
    if let (Some(from), Some(to)) = (valid_from, valid_to) {
        if from > to {
            return Err(HandlerErr::bad_params("validFrom must not be after validTo"));
        }
    }
    Ok(ScheduleParams {
        day_of_week: day as u8,
        start,
        end,
        valid_from,
        valid_to,
    })
}

fn entry_json(e: &schedule::ScheduleEntry) -> serde_json::Value {
    json!({
        "id": e.id,
        "classId": e.class_id,
        "dayOfWeek": e.day_of_week,
        "startTime": e.start.format("%H:%M").to_string(),
        "endTime": e.end.format("%H:%M").to_string(),
        "validFrom": e.valid_from.map(|d| d.to_string()),
        "validTo": e.valid_to.map(|d| d.to_string()),
    })
}

fn schedules_list(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let class_id = get_required_str(params, "classId")?;
    require_class(conn, &class_id)?;
    let entries = load_schedules(conn, &class_id)?;
    Ok(json!({
        "schedules": entries.iter().map(entry_json).collect::<Vec<_>>(),
        "summary": schedule::format_summary(&entries)
    }))
}

fn schedules_create(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let class_id = get_required_str(params, "classId")?;
    require_class(conn, &class_id)?;
    let p = parse_schedule_params(params)?;

    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO class_schedules(id, class_id, day_of_week, start_time, end_time, valid_from, valid_to, updated_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?)",
        (
            &id,
            &class_id,
            i64::from(p.day_of_week),
            p.start.format("%H:%M").to_string(),
            p.end.format("%H:%M").to_string(),
            p.valid_from.map(|d| d.to_string()),
            p.valid_to.map(|d| d.to_string()),
            Local::now().naive_local().to_string(),
        ),
    )
    .map_err(|e| HandlerErr::db("db_insert_failed", e).with_details(json!({ "table": "class_schedules" })))?;

    Ok(json!({ "scheduleId": id }))
}

fn schedules_update(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let schedule_id = get_required_str(params, "scheduleId")?;
    let p = parse_schedule_params(params)?;

    let updated = conn
        .execute(
            "UPDATE class_schedules
             SET day_of_week = ?, start_time = ?, end_time = ?, valid_from = ?, valid_to = ?, updated_at = ?
             WHERE id = ?",
            (
                i64::from(p.day_of_week),
                p.start.format("%H:%M").to_string(),
                p.end.format("%H:%M").to_string(),
                p.valid_from.map(|d| d.to_string()),
                p.valid_to.map(|d| d.to_string()),
                Local::now().naive_local().to_string(),
                &schedule_id,
            ),
        )
        .map_err(|e| HandlerErr::db("db_update_failed", e))?;
    if updated == 0 {
        return Err(HandlerErr::new("not_found", "schedule not found"));
    }
    Ok(json!({ "scheduleId": schedule_id }))
}

fn schedules_delete(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let schedule_id = get_required_str(params, "scheduleId")?;
    let deleted = conn
        .execute("DELETE FROM class_schedules WHERE id = ?", [&schedule_id])
        .map_err(|e| HandlerErr::db("db_delete_failed", e))?;
    if deleted == 0 {
        return Err(HandlerErr::new("not_found", "schedule not found"));
    }
    Ok(json!({ "deleted": true }))
}

fn schedules_summary(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let class_id = get_required_str(params, "classId")?;
    require_class(conn, &class_id)?;
    let entries = load_schedules(conn, &class_id)?;
    Ok(json!({ "summary": schedule::format_summary(&entries) }))
}

fn schedules_meets_on(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let class_id = get_required_str(params, "classId")?;
    require_class(conn, &class_id)?;
    let date = parse_date(&get_required_str(params, "date")?, "date")?;
    let entries = load_schedules(conn, &class_id)?;
    Ok(json!({ "meets": schedule::meets_on(&entries, date) }))
}

fn schedules_next_occurrence(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let class_id = get_required_str(params, "classId")?;
    require_class(conn, &class_id)?;
    // Callers that need determinism (tests, exports) may pin "now".
    let now: NaiveDateTime = match get_optional_str(params, "now") {
        Some(s) => NaiveDateTime::parse_from_str(&s, "%Y-%m-%dT%H:%M:%S")
            .map_err(|_| HandlerErr::bad_params("now must be YYYY-MM-DDTHH:MM:SS"))?,
        None => Local::now().naive_local(),
    };
    let entries = load_schedules(conn, &class_id)?;
    let next = schedule::next_occurrence(&entries, now);
    Ok(json!({
        "next": next.map(|dt| dt.format("%Y-%m-%dT%H:%M:%S").to_string())
    }))
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
        "schedules.list" => Some(dispatch(state, req, schedules_list)),
        "schedules.create" => Some(dispatch(state, req, schedules_create)),
        "schedules.update" => Some(dispatch(state, req, schedules_update)),
        "schedules.delete" => Some(dispatch(state, req, schedules_delete)),
        "schedules.summary" => Some(dispatch(state, req, schedules_summary)),
        "schedules.meetsOn" => Some(dispatch(state, req, schedules_meets_on)),
        "schedules.nextOccurrence" => Some(dispatch(state, req, schedules_next_occurrence)),
        _ => None,
    }
}
