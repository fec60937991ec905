use chrono::{DateTime, Utc};
use human_repr::HumanDuration;
use std::time::Duration;

pub trait GetRelativeTimestamp {
    fn relative_timestamp(&self, now: DateTime<Utc>) -> String;
}

impl GetRelativeTimestamp for DateTime<Utc> {
    /// `3d ago`-style text. Future times read as `just now`.
    fn relative_timestamp(&self, now: DateTime<Utc>) -> String {
        let elapsed = (now - *self).to_std().unwrap_or_default();
        if elapsed < Duration::from_secs(60) {
            return "just now".to_owned();
        }
        format!("{} ago", humantime::format_duration(round_to_minutes(elapsed)))
    }
}

fn round_to_minutes(duration: Duration) -> Duration {
    Duration::from_secs(duration.as_secs() / 60 * 60)
}

/// Uptime rounded down to whole seconds.
pub fn uptime(duration: Duration) -> String {
    Duration::from_secs(duration.as_secs()).human_duration().to_string()
}

/// `1,234,567` for gold amounts.
pub fn thousands(amount: i64) -> String {
    let digits = amount.unsigned_abs().to_string();
    let grouped = digits
        .as_bytes()
        .rchunks(3)
        .rev()
        .map(|chunk| std::str::from_utf8(chunk).unwrap_or_default())
        .collect::<Vec<_>>()
        .join(",");
    if amount < 0 {
        format!("-{grouped}")
    } else {
        grouped
    }
}

/// Keeps a reply to a sane size for a chat bubble.
pub fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_owned();
    }
    let cut: String = text.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{}...", cut.trim_end())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn relative_timestamps() {
        let now = Utc::now();
        assert_eq!((now - chrono::Duration::seconds(5)).relative_timestamp(now), "just now");
        assert_eq!(
            (now - chrono::Duration::seconds(3 * 3600 + 125)).relative_timestamp(now),
            "3h 2m ago"
        );
        assert_eq!((now + chrono::Duration::hours(1)).relative_timestamp(now), "just now");
    }

    #[test]
    fn groups_thousands() {
        assert_eq!(thousands(0), "0");
        assert_eq!(thousands(999), "999");
        assert_eq!(thousands(1_234_567), "1,234,567");
        assert_eq!(thousands(-1500), "-1,500");
    }

    #[test]
    fn truncates_on_char_boundaries() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("ääääääääää", 6), "äää...");
    }
}
