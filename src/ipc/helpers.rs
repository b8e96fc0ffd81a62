use chrono::{NaiveDate, NaiveTime};
use rusqlite::{Connection, OptionalExtension};
use serde_json::json;

use crate::ipc::error::err;
use crate::schedule::ScheduleEntry;

/// Handler-internal error; converted to a wire response at the dispatch edge.
pub struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl HandlerErr {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        HandlerErr {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn bad_params(message: impl Into<String>) -> Self {
        HandlerErr::new("bad_params", message)
    }

    pub fn db(op: &'static str, e: rusqlite::Error) -> Self {
        HandlerErr::new(op, e.to_string())
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, self.details)
    }
}

pub fn get_required_str(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

pub fn get_optional_str(params: &serde_json::Value, key: &str) -> Option<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .filter(|s| !s.trim().is_empty())
}

pub fn parse_date(s: &str, key: &str) -> Result<NaiveDate, HandlerErr> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| HandlerErr::bad_params(format!("{} must be YYYY-MM-DD", key)))
}

pub fn parse_time(s: &str, key: &str) -> Result<NaiveTime, HandlerErr> {
    NaiveTime::parse_from_str(s, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
        .map_err(|_| HandlerErr::bad_params(format!("{} must be HH:MM", key)))
}

pub fn class_exists(conn: &Connection, class_id: &str) -> Result<bool, HandlerErr> {
    conn.query_row("SELECT 1 FROM classes WHERE id = ?", [class_id], |r| {
        r.get::<_, i64>(0)
    })
    .optional()
    .map(|v| v.is_some())
    .map_err(|e| HandlerErr::db("db_query_failed", e))
}

pub fn require_class(conn: &Connection, class_id: &str) -> Result<(), HandlerErr> {
    if class_exists(conn, class_id)? {
        Ok(())
    } else {
        Err(HandlerErr::new("not_found", "class not found")
            .with_details(json!({ "classId": class_id })))
    }
}

/// Loads the weekly schedule for one class, ordered the way the UI and the
/// summary string expect: by day-of-week, then start time.
pub fn load_schedules(conn: &Connection, class_id: &str) -> Result<Vec<ScheduleEntry>, HandlerErr> {
    let mut stmt = conn
        .prepare(
            "SELECT id, class_id, day_of_week, start_time, end_time, valid_from, valid_to
             FROM class_schedules
             WHERE class_id = ?
             ORDER BY day_of_week, start_time",
        )
        .map_err(|e| HandlerErr::db("db_query_failed", e))?;
    let raw = stmt
        .query_map([class_id], |r| {
            Ok((
                r.get::<_, String>(0)?,
                r.get::<_, String>(1)?,
                r.get::<_, i64>(2)?,
                r.get::<_, String>(3)?,
                r.get::<_, String>(4)?,
                r.get::<_, Option<String>>(5)?,
                r.get::<_, Option<String>>(6)?,
            ))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(|e| HandlerErr::db("db_query_failed", e))?;

    let mut out = Vec::with_capacity(raw.len());
    for (id, class_id, day, start, end, from, to) in raw {
        // Stored rows passed validation on the way in; a row that no longer
        // parses indicates a corrupt workspace, not a caller mistake.
        let entry = ScheduleEntry {
            id,
            class_id,
            day_of_week: day.clamp(0, 6) as u8,
            start: parse_time(&start, "start_time")
                .map_err(|_| HandlerErr::new("db_corrupt", "unreadable start_time"))?,
            end: parse_time(&end, "end_time")
                .map_err(|_| HandlerErr::new("db_corrupt", "unreadable end_time"))?,
            valid_from: match from {
                Some(s) => Some(
                    parse_date(&s, "valid_from")
                        .map_err(|_| HandlerErr::new("db_corrupt", "unreadable valid_from"))?,
                ),
                None => None,
            },
            valid_to: match to {
                Some(s) => Some(
                    parse_date(&s, "valid_to")
                        .map_err(|_| HandlerErr::new("db_corrupt", "unreadable valid_to"))?,
                ),
                None => None,
            },
        };
        out.push(entry);
    }
    Ok(out)
}
