//! Weekend and weekday assignment
//!
//! - [`streak`] - Shared consecutive work-day tracking
//! - [`weekend`] - Rotation-driven weekend coverage with substitution
//! - [`weekday`] - Shift-typed weekday coverage with AM→PM redirection

pub mod streak;
pub mod weekday;
pub mod weekend;

pub use streak::StreakTracker;
pub use weekday::assign_weekday_shift;
pub use weekend::{assign_weekend_day, WeekendOutcome};
