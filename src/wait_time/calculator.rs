//! Estimated wait calculation
//!
//! The ETA for a queued member is a forward-looking prediction derived from
//! their position and the queue's current wait-per-person figure.

/// Estimated wait in minutes for a 1-based position.
///
/// The head of the line (and anyone not in it) waits zero minutes.
pub fn estimated_wait_minutes(position: usize, avg_service_minutes: f64) -> f64 {
    if position <= 1 || !avg_service_minutes.is_finite() {
        return 0.0;
    }
    (position - 1) as f64 * avg_service_minutes
}

/// Human readable rendering of a wait in minutes
pub fn format_wait(minutes: f64) -> String {
    if !minutes.is_finite() || minutes <= 0.0 {
        return "soon".to_string();
    }
    if minutes < 60.0 {
        return format!("{} min", minutes.ceil() as u64);
    }
    let hours = (minutes / 60.0).floor() as u64;
    let rest = (minutes % 60.0).ceil() as u64;
    format!("{} h {} min", hours, rest)
}
