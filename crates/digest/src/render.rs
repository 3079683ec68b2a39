//! Digest text rendering.

use {chrono::DateTime, chrono_tz::Tz};

use recap_buffer::Event;

/// Longest content preview per event line, in characters.
pub const CONTENT_PREVIEW_MAX: usize = 100;

/// Shown in place of content that is empty after trimming (uploads, embeds,
/// sticker-only messages).
pub const EMPTY_CONTENT_PLACEHOLDER: &str = "[attachment or embed]";

const HOUR_MS: u64 = 60 * 60 * 1000;
const MINUTE_MS: u64 = 60 * 1000;

/// Rendering parameters. The timezone only affects the per-line time-of-day
/// display; selection and ordering stay on the stored epoch timestamps.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub window_ms: u64,
    pub timezone: Tz,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            window_ms: 24 * HOUR_MS,
            timezone: Tz::UTC,
        }
    }
}

/// Render a window of events into a digest: header naming the window, one
/// line per event oldest-first, and a count footer. Computed fresh on every
/// trigger; nothing is cached.
pub fn render_digest(events: &[Event], opts: &RenderOptions) -> String {
    let mut sorted = events.to_vec();
    sorted.sort_by_key(|e| e.received_at_ms);

    let mut out = String::new();
    out.push_str(&format!(
        "Message digest for the last {}\n",
        describe_window(opts.window_ms)
    ));
    for event in &sorted {
        out.push_str(&event_line(event, opts.timezone));
        out.push('\n');
    }
    out.push_str(&format!("Total: {}", describe_count(sorted.len())));
    out
}

/// The degenerate digest for an empty window, used when the trigger is
/// configured to announce quiet periods instead of skipping them.
pub fn render_empty_notice(opts: &RenderOptions) -> String {
    format!(
        "No activity in the last {}.",
        describe_window(opts.window_ms)
    )
}

fn event_line(event: &Event, tz: Tz) -> String {
    let time = DateTime::from_timestamp_millis(event.received_at_ms as i64)
        .unwrap_or_default()
        .with_timezone(&tz);
    format!(
        "[{}] {}: {}",
        time.format("%H:%M"),
        event.author_name,
        content_preview(&event.content)
    )
}

fn content_preview(content: &str) -> String {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return EMPTY_CONTENT_PLACEHOLDER.to_string();
    }
    // Keep each event on a single digest line.
    let flat = trimmed.replace('\n', " ");
    if flat.chars().count() <= CONTENT_PREVIEW_MAX {
        flat
    } else {
        let mut preview: String = flat.chars().take(CONTENT_PREVIEW_MAX).collect();
        preview.push_str("...");
        preview
    }
}

fn describe_window(window_ms: u64) -> String {
    if window_ms >= HOUR_MS && window_ms % HOUR_MS == 0 {
        let hours = window_ms / HOUR_MS;
        if hours == 1 {
            "1 hour".to_string()
        } else {
            format!("{hours} hours")
        }
    } else {
        let minutes = (window_ms / MINUTE_MS).max(1);
        if minutes == 1 {
            "1 minute".to_string()
        } else {
            format!("{minutes} minutes")
        }
    }
}

fn describe_count(count: usize) -> String {
    if count == 1 {
        "1 message".to_string()
    } else {
        format!("{count} messages")
    }
}
