use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttendanceStatus {
    Present,
    Absent,
    Late,
}

impl AttendanceStatus {
    pub fn parse(s: &str) -> Option<AttendanceStatus> {
        match s {
            "present" => Some(AttendanceStatus::Present),
            "absent" => Some(AttendanceStatus::Absent),
            "late" => Some(AttendanceStatus::Late),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AttendanceStatus::Present => "present",
            AttendanceStatus::Absent => "absent",
            AttendanceStatus::Late => "late",
        }
    }
}

/// One raw attendance fact, already flattened out of storage.
#[derive(Debug, Clone)]
pub struct MarkRow {
    pub student_id: String,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
}

#[derive(Debug, Clone)]
pub struct RosterStudent {
    pub id: String,
    pub name: String,
}

/// Inclusive on both ends.
#[derive(Debug, Clone, Copy)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TrendRow {
    pub date: NaiveDate,
    pub present: u32,
    pub absent: u32,
    pub late: u32,
    pub total: u32,
    pub attendance_rate: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StudentStat {
    pub student_id: String,
    pub student_name: String,
    pub total_sessions: u32,
    pub present_count: u32,
    pub absent_count: u32,
    pub late_count: u32,
    pub attendance_rate: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RiskStudent {
    pub student_id: String,
    pub student_name: String,
    pub attendance_rate: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsSnapshot {
    pub total_sessions: u32,
    pub average_attendance_rate: f64,
    pub attendance_trends: Vec<TrendRow>,
    pub student_stats: Vec<StudentStat>,
    pub risk_students: Vec<RiskStudent>,
    pub perfect_attendance_count: u32,
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

fn rate(present: u32, late: u32, total: u32) -> f64 {
    if total == 0 {
        return 0.0;
    }
    round2(f64::from(present + late) / f64::from(total) * 100.0)
}

/// Aggregates raw attendance records into the dashboard snapshot.
///
/// Trend rows are sparse: a date with no records yields no row, so a week the
/// class did not meet simply has no entry rather than a zero-rate one. The
/// overall average is the unweighted mean of per-date rates, NOT a weighted
/// mean over total marks; a sparsely-attended session counts the same as a
/// full one. Downstream dashboards and exports were built against that
/// behavior, so keep it.
///
/// Every roster member gets a stat row, including students with no records
/// in range (rate 0); only students with at least one recorded session are
/// eligible for the risk list and the perfect-attendance count.
pub fn compute_analytics(
    records: &[MarkRow],
    roster: &[RosterStudent],
    range: DateRange,
) -> AnalyticsSnapshot {
    let in_range: Vec<&MarkRow> = records
        .iter()
        .filter(|r| r.date >= range.start && r.date <= range.end)
        .collect();

    let mut by_date: BTreeMap<NaiveDate, Vec<&MarkRow>> = BTreeMap::new();
    for r in &in_range {
        by_date.entry(r.date).or_default().push(r);
    }

    let attendance_trends: Vec<TrendRow> = by_date
        .iter()
        .map(|(date, rows)| {
            let present = rows
                .iter()
                .filter(|r| r.status == AttendanceStatus::Present)
                .count() as u32;
            let absent = rows
                .iter()
                .filter(|r| r.status == AttendanceStatus::Absent)
                .count() as u32;
            let late = rows
                .iter()
                .filter(|r| r.status == AttendanceStatus::Late)
                .count() as u32;
            let total = rows.len() as u32;
            TrendRow {
                date: *date,
                present,
                absent,
                late,
                total,
                attendance_rate: rate(present, late, total),
            }
        })
        .collect();

    let student_stats: Vec<StudentStat> = roster
        .iter()
        .map(|student| {
            let mine: Vec<&&MarkRow> = in_range
                .iter()
                .filter(|r| r.student_id == student.id)
                .collect();
            let present_count = mine
                .iter()
                .filter(|r| r.status == AttendanceStatus::Present)
                .count() as u32;
            let absent_count = mine
                .iter()
                .filter(|r| r.status == AttendanceStatus::Absent)
                .count() as u32;
            let late_count = mine
                .iter()
                .filter(|r| r.status == AttendanceStatus::Late)
                .count() as u32;
            let total_sessions = mine.len() as u32;
            StudentStat {
                student_id: student.id.clone(),
                student_name: student.name.clone(),
                total_sessions,
                present_count,
                absent_count,
                late_count,
                attendance_rate: rate(present_count, late_count, total_sessions),
            }
        })
        .collect();

    let total_sessions = attendance_trends.len() as u32;
    let average_attendance_rate = if attendance_trends.is_empty() {
        0.0
    } else {
        round2(
            attendance_trends
                .iter()
                .map(|t| t.attendance_rate)
                .sum::<f64>()
                / attendance_trends.len() as f64,
        )
    };

    let mut risk_students: Vec<RiskStudent> = student_stats
        .iter()
        .filter(|s| s.attendance_rate < 80.0 && s.total_sessions > 0)
        .map(|s| RiskStudent {
            student_id: s.student_id.clone(),
            student_name: s.student_name.clone(),
            attendance_rate: s.attendance_rate,
        })
        .collect();
    risk_students.sort_by(|a, b| a.attendance_rate.total_cmp(&b.attendance_rate));

    let perfect_attendance_count = student_stats
        .iter()
        .filter(|s| s.attendance_rate == 100.0 && s.total_sessions > 0)
        .count() as u32;

    AnalyticsSnapshot {
        total_sessions,
        average_attendance_rate,
        attendance_trends,
        student_stats,
        risk_students,
        perfect_attendance_count,
    }
}
