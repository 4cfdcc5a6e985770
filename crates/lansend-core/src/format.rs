//! Human-readable sizes and rates for log lines and notifications.

const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];

/// Format a byte count with two decimals on a 1024 base, e.g. "1.50 KB".
pub fn format_size(bytes: u64) -> String {
    scaled(bytes as f64)
}

/// Format a transfer rate in bytes per second, e.g. "2.00 MB/s".
pub fn format_speed(bytes_per_sec: f64) -> String {
    format!("{}/s", scaled(bytes_per_sec.max(0.0)))
}

fn scaled(mut value: f64) -> String {
    for unit in UNITS {
        if value < 1024.0 {
            return format!("{value:.2} {unit}");
        }
        value /= 1024.0;
    }
    format!("{value:.2} TB")
}
