pub mod attendance;
pub mod schedule;

pub use attendance::{AttendanceCalculator, AttendanceDeduction};
pub use schedule::FeeScheduleResolver;
