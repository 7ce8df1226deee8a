//! Plain-text rendering of the subscription management table.

use commentwatch_core::SubscriptionRow;

/// Render the subscription table for display.
pub fn render(rows: &[SubscriptionRow], now: u64) -> String {
    if rows.is_empty() {
        return "You are currently not subscribed to any threads. \
                Subscribe with `commentwatch subscribe <thread-id>`.\n"
            .to_string();
    }

    let mut out = String::new();
    out.push_str(&format!(
        "{:<14} {:<12} {:<26} {}\n",
        "THREAD", "LAST VIEWED", "EXPIRES", "TITLE"
    ));

    for row in rows {
        let expires = format!(
            "{} ({})",
            format_relative(now, row.expires_at),
            format_timestamp(row.expires_at)
        );
        out.push_str(&format!(
            "{:<14} {:<12} {:<26} {}\n",
            truncate_with_ellipsis(&row.id, 14),
            format_relative(now, row.update_time),
            expires,
            truncate_with_ellipsis(&row.title, 60)
        ));
    }

    out
}

/// Format a unix-ms timestamp relative to `now` (e.g. "2h ago", "in 1d").
pub fn format_relative(now: u64, timestamp: u64) -> String {
    if timestamp > now {
        format!("in {}", format_span(timestamp - now))
    } else if now - timestamp < 60_000 {
        "just now".to_string()
    } else {
        format!("{} ago", format_span(now - timestamp))
    }
}

fn format_span(ms: u64) -> String {
    let secs = ms / 1000;
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m", secs / 60)
    } else if secs < 86400 {
        format!("{}h", secs / 3600)
    } else {
        format!("{}d", secs / 86400)
    }
}

/// Format a unix-ms timestamp as an absolute UTC instant.
pub fn format_timestamp(ms: u64) -> String {
    chrono::DateTime::from_timestamp_millis(ms as i64)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string())
}

/// Truncate a string to `max_len` chars, adding an ellipsis when truncated.
fn truncate_with_ellipsis(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        return s.to_string();
    }
    if max_len <= 3 {
        return ".".repeat(max_len);
    }
    let mut truncated: String = s.chars().take(max_len - 3).collect();
    truncated.push_str("...");
    truncated
}
