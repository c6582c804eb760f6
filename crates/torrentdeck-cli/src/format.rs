//! Display formatting helpers for torrent values.

const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];

pub fn bytes(n: i64) -> String {
    if n < 1024 {
        return format!("{} B", n.max(0));
    }
    let mut value = n as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}

pub fn rate(bytes_per_second: i64) -> String {
    format!("{}/s", bytes(bytes_per_second))
}

/// The daemon reports a negative eta when it cannot estimate one.
pub fn eta(seconds: i64) -> String {
    if seconds < 0 {
        return "-".into();
    }
    let (d, h, m, s) = (
        seconds / 86400,
        seconds % 86400 / 3600,
        seconds % 3600 / 60,
        seconds % 60,
    );
    if d > 0 {
        format!("{d}d {h}h")
    } else if h > 0 {
        format!("{h}h {m:02}m")
    } else if m > 0 {
        format!("{m}m {s:02}s")
    } else {
        format!("{s}s")
    }
}

pub fn percent(fraction: f64) -> String {
    format!("{:.1}%", (fraction * 100.0).clamp(0.0, 100.0))
}

/// Speed limit in KB/s, or "unlimited".
pub fn limit(kbps: Option<i64>) -> String {
    match kbps {
        Some(kbps) => format!("{kbps} KB/s"),
        None => "unlimited".into(),
    }
}

/// Format a UTC timestamp as a human-readable relative time string.
pub fn relative_time(dt: &chrono::DateTime<chrono::Utc>) -> String {
    let secs = (chrono::Utc::now() - *dt).num_seconds().max(0);

    if secs < 60 {
        "just now".into()
    } else if secs < 3600 {
        format!("{}m ago", secs / 60)
    } else if secs < 86400 {
        format!("{}h ago", secs / 3600)
    } else {
        format!("{}d ago", secs / 86400)
    }
}
