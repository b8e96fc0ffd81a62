pub mod analytics;
pub mod attendance;
pub mod checkin;
pub mod classes;
pub mod core;
pub mod schedules;
pub mod students;
