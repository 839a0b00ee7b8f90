//! Utility Functions
//!
//! User-friendly error formatting and small display helpers.

pub mod errors;

pub use errors::format_user_error;

use std::time::Duration;

/// Render a duration the way an operator reads it: "850ms", "12.5s",
/// "3m 42s", "1h 05m".
pub fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs_f64();
    if total_secs < 1.0 {
        return format!("{}ms", duration.as_millis());
    }
    if total_secs < 60.0 {
        return format!("{total_secs:.1}s");
    }

    let total = duration.as_secs();
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;
    if hours > 0 {
        format!("{hours}h {minutes:02}m")
    } else {
        format!("{minutes}m {seconds:02}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(850)), "850ms");
        assert_eq!(format_duration(Duration::from_millis(12_500)), "12.5s");
        assert_eq!(format_duration(Duration::from_secs(222)), "3m 42s");
        assert_eq!(format_duration(Duration::from_secs(3900)), "1h 05m");
    }
}
