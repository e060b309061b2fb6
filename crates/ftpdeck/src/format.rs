//! Display helpers shared by the views and the CLI

use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};

pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;
    const TB: u64 = GB * 1024;

    if bytes >= TB {
        format!("{:.2} TB", bytes as f64 / TB as f64)
    } else if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// `1h 2m 3s`, `2m 3s` or `3s`; zero renders as `-`
pub fn format_duration(seconds: u64) -> String {
    if seconds == 0 {
        return "-".to_string();
    }
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, secs)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, secs)
    } else {
        format!("{}s", secs)
    }
}

/// Parse the timestamp shapes the backend emits
pub fn parse_time(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    None
}

/// Local `YYYY-MM-DD HH:MM`, `-` when missing, the raw text when unparseable
pub fn format_datetime(raw: Option<&str>) -> String {
    match raw {
        None | Some("") => "-".to_string(),
        Some(raw) => match parse_time(raw) {
            Some(dt) => dt.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string(),
            None => raw.to_string(),
        },
    }
}

/// "just now", "5 min ago", "3 h ago", "2 d ago", or the date beyond a week
pub fn format_relative(raw: Option<&str>, now: DateTime<Utc>) -> String {
    let Some(dt) = raw.and_then(parse_time) else {
        return String::new();
    };
    let elapsed = now.signed_duration_since(dt);

    if elapsed.num_seconds() < 60 {
        "just now".to_string()
    } else if elapsed.num_minutes() < 60 {
        format!("{} min ago", elapsed.num_minutes())
    } else if elapsed.num_hours() < 24 {
        format!("{} h ago", elapsed.num_hours())
    } else if elapsed.num_days() < 7 {
        format!("{} d ago", elapsed.num_days())
    } else {
        dt.format("%Y-%m-%d").to_string()
    }
}

/// Shorten a slash path to `max_len` characters, keeping its head and tail
pub fn smart_truncate_path(path: &str, max_len: usize) -> String {
    let len = path.chars().count();
    if len <= max_len {
        return path.to_string();
    }

    let tail = |n: usize| -> String { path.chars().skip(len.saturating_sub(n)).collect() };

    let parts: Vec<&str> = path.split('/').collect();
    if parts.len() <= 3 {
        return format!("...{}", tail(max_len.saturating_sub(3)));
    }

    let base = parts[..2].join("/");
    let end = parts[parts.len() - 2..].join("/");
    let base_and_end = format!("{}/.../{}", base, end);

    if base_and_end.chars().count() <= max_len {
        base_and_end
    } else {
        let half = (max_len / 2).saturating_sub(2);
        let head: String = path.chars().take(half).collect();
        format!("{}...{}", head, tail(half))
    }
}

/// Fixed-width text progress bar
pub fn progress_bar(percent: f64, width: usize) -> String {
    let filled = ((percent.clamp(0.0, 100.0) / 100.0) * width as f64).round() as usize;
    format!("{}{}", "█".repeat(filled), "░".repeat(width - filled.min(width)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(1023), "1023 B");
        assert_eq!(format_size(1536), "1.50 KB");
        assert_eq!(format_size(5 * 1024 * 1024 * 1024), "5.00 GB");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0), "-");
        assert_eq!(format_duration(42), "42s");
        assert_eq!(format_duration(125), "2m 5s");
        assert_eq!(format_duration(3725), "1h 2m 5s");
    }

    #[test]
    fn test_parse_time_shapes() {
        assert!(parse_time("2024-03-01T10:00:00Z").is_some());
        assert!(parse_time("2024-03-01T10:00:00.123456").is_some());
        assert!(parse_time("2024-03-01 10:00:00").is_some());
        assert!(parse_time("yesterday").is_none());
        assert_eq!(format_datetime(Some("yesterday")), "yesterday");
        assert_eq!(format_datetime(None), "-");
    }

    #[test]
    fn test_format_relative() {
        let now = parse_time("2024-03-10T12:00:00Z").unwrap();
        assert_eq!(format_relative(Some("2024-03-10T11:59:30Z"), now), "just now");
        assert_eq!(format_relative(Some("2024-03-10T11:15:00Z"), now), "45 min ago");
        assert_eq!(format_relative(Some("2024-03-10T07:00:00Z"), now), "5 h ago");
        assert_eq!(format_relative(Some("2024-03-08T12:00:00Z"), now), "2 d ago");
        assert_eq!(format_relative(Some("2024-01-01T00:00:00Z"), now), "2024-01-01");
        assert_eq!(format_relative(None, now), "");
    }

    #[test]
    fn test_smart_truncate_path() {
        assert_eq!(smart_truncate_path("/short", 20), "/short");
        assert_eq!(
            smart_truncate_path("/home/user/projects/deep/file.txt", 30),
            "/home/.../deep/file.txt"
        );
        let truncated = smart_truncate_path("/données/éléments/très/long/chemin/ici", 12);
        assert!(truncated.chars().count() <= 12);
    }

    #[test]
    fn test_progress_bar() {
        assert_eq!(progress_bar(50.0, 10).chars().count(), 10);
        assert_eq!(progress_bar(150.0, 4), "████");
        assert_eq!(progress_bar(0.0, 3), "░░░");
    }
}
