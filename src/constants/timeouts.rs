use std::time::Duration;

/// Deadlines closer than this at startup are unmuted inline instead of scheduled
pub const RECONCILE_FLOOR_SECONDS: f64 = 1.0;

/// Default HTTP timeout for the remote gateway
pub const DEFAULT_GATEWAY_TIMEOUT_SECONDS: u64 = 30;

/// Surfaces a keyword mute applies to
pub const DEFAULT_MUTE_SURFACES: &str = "notifications,home_timeline,tweet_replies";

pub const DEFAULT_API_BASE: &str = "https://x.com/i/api/1.1";

pub const DEFAULT_DATABASE_URL: &str = "sqlite://mute.db";

/// Unit lengths accepted for mute durations
pub const MINUTE: Duration = Duration::from_secs(60);
pub const HOUR: Duration = Duration::from_secs(60 * 60);
pub const DAY: Duration = Duration::from_secs(24 * 60 * 60);
pub const WEEK: Duration = Duration::from_secs(7 * 24 * 60 * 60);
pub const MONTH: Duration = Duration::from_secs(31 * 24 * 60 * 60); // 31 days
pub const YEAR: Duration = Duration::from_secs(12 * 31 * 24 * 60 * 60); // 12 months of 31 days

/// Quick-pick durations offered alongside free-form input
pub const PRESET_DURATIONS: &[Duration] = &[
    Duration::from_secs(60 * 60),      // 1 hour
    Duration::from_secs(2 * 60 * 60),  // 2 hours
    Duration::from_secs(6 * 60 * 60),  // 6 hours
    Duration::from_secs(12 * 60 * 60), // 12 hours
    Duration::from_secs(24 * 60 * 60), // 24 hours
];

/// Format duration for display
pub fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs();

    if total_secs < 60 {
        format!("{} second{}", total_secs, if total_secs == 1 { "" } else { "s" })
    } else if total_secs < 3600 {
        let mins = total_secs / 60;
        format!("{} minute{}", mins, if mins == 1 { "" } else { "s" })
    } else if total_secs < 86400 {
        let hours = total_secs / 3600;
        format!("{} hour{}", hours, if hours == 1 { "" } else { "s" })
    } else {
        let days = total_secs / 86400;
        format!("{} day{}", days, if days == 1 { "" } else { "s" })
    }
}
