//! iCalendar (RFC 5545) rendering of an employee's open tasks.
//!
//! Each task becomes an all-day `VEVENT` on its due date. Output uses CRLF
//! line endings and folds content lines longer than 75 octets.

use chrono::{DateTime, Duration, Utc};

use crate::models::CalendarEntry;

pub const CONTENT_TYPE: &str = "text/calendar; charset=utf-8";

const PRODID: &str = "-//Flowie//Task Calendar//EN";
const MAX_LINE_OCTETS: usize = 75;

/// Render a complete `VCALENDAR` document.
pub fn render_feed(calendar_name: &str, entries: &[CalendarEntry], generated_at: DateTime<Utc>) -> String {
    let mut out = String::new();
    push_line(&mut out, "BEGIN:VCALENDAR");
    push_line(&mut out, "VERSION:2.0");
    push_line(&mut out, &format!("PRODID:{}", PRODID));
    push_line(&mut out, "CALSCALE:GREGORIAN");
    push_line(&mut out, "METHOD:PUBLISH");
    push_line(
        &mut out,
        &format!("X-WR-CALNAME:{}", escape_text(&format!("Flowie - {}", calendar_name))),
    );

    let stamp = format_utc(generated_at);
    for entry in entries {
        let start = entry.due_date.date_naive();
        let end = start + Duration::days(1);

        push_line(&mut out, "BEGIN:VEVENT");
        push_line(&mut out, &format!("UID:task-{}@flowie", entry.task_id));
        push_line(&mut out, &format!("DTSTAMP:{}", stamp));
        push_line(&mut out, &format!("DTSTART;VALUE=DATE:{}", start.format("%Y%m%d")));
        push_line(&mut out, &format!("DTEND;VALUE=DATE:{}", end.format("%Y%m%d")));
        push_line(
            &mut out,
            &format!(
                "SUMMARY:{}",
                escape_text(&format!("[{}] {}", entry.project_title, entry.title))
            ),
        );
        if let Some(description) = entry.description.as_deref().filter(|d| !d.is_empty()) {
            push_line(&mut out, &format!("DESCRIPTION:{}", escape_text(description)));
        }
        push_line(&mut out, "STATUS:CONFIRMED");
        push_line(&mut out, "END:VEVENT");
    }

    push_line(&mut out, "END:VCALENDAR");
    out
}

fn format_utc(at: DateTime<Utc>) -> String {
    at.format("%Y%m%dT%H%M%SZ").to_string()
}

/// Escape a TEXT property value.
pub fn escape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => out.push_str("\\\\"),
            ';' => out.push_str("\\;"),
            ',' => out.push_str("\\,"),
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                out.push_str("\\n");
            }
            '\n' => out.push_str("\\n"),
            _ => out.push(c),
        }
    }
    out
}

/// Append one content line, folded so no physical line exceeds 75 octets.
/// Continuation lines start with a single space, and UTF-8 sequences are
/// never split.
fn push_line(out: &mut String, line: &str) {
    let mut budget = MAX_LINE_OCTETS;
    let mut used = 0;
    for c in line.chars() {
        let len = c.len_utf8();
        if used + len > budget {
            out.push_str("\r\n ");
            // the leading space counts towards the next line
            budget = MAX_LINE_OCTETS - 1;
            used = 0;
        }
        out.push(c);
        used += len;
    }
    out.push_str("\r\n");
}
