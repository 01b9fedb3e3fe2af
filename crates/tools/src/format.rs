//! Result Formatter: decoded calendar and mail data to flat text.
//!
//! Calendar items get one line naming their path, then indented field lines
//! in a fixed order (Summary, Start or Due, Status). Mail has no path, so
//! each message is a block of header lines closed by `---`. An empty result
//! is always a sentence, never an empty string.

use std::fmt::Write as _;

use {
    davgate_caldav::{Component, ComponentKind, ItemContent, QueryResultItem, extract_field},
    davgate_mail::MailMessage,
};

pub const NO_EVENTS: &str = "No events found.";
pub const NO_REMINDERS: &str = "No reminders found.";
pub const NO_EMAILS: &str = "No emails found";
pub const NO_NOTES: &str = "No notes found";

/// Render query results for `kind`. Items are rendered in the order given.
#[must_use]
pub fn format_calendar_items(items: &[QueryResultItem], kind: ComponentKind) -> String {
    if items.is_empty() {
        return match kind {
            ComponentKind::Event => NO_EVENTS,
            ComponentKind::ToDo => NO_REMINDERS,
        }
        .to_string();
    }

    let mut out = String::new();
    for item in items {
        let _ = writeln!(out, "- {}", item.href);
        match &item.content {
            ItemContent::Decoded(doc) => {
                match doc.components.iter().find(|c| c.kind() == kind) {
                    Some(component) => write_fields(&mut out, component),
                    None => out.push_str("  (object present, no matching component)\n"),
                }
            },
            ItemContent::Undecodable { reason } => {
                let _ = writeln!(out, "  (object present, fields unknown: {reason})");
            },
            ItemContent::Missing => out.push_str("  (object present, fields unknown)\n"),
        }
    }
    out.truncate(out.trim_end().len());
    out
}

fn write_fields(out: &mut String, component: &Component) {
    let timing = match component.kind() {
        ComponentKind::Event => [("Start", "DTSTART"), ("End", "DTEND")].as_slice(),
        ComponentKind::ToDo => [("Due", "DUE")].as_slice(),
    };

    let summary = extract_field(component, "SUMMARY").unwrap_or("(no summary)");
    let _ = writeln!(out, "  Summary: {summary}");
    for (label, name) in timing {
        if let Some(value) = extract_field(component, name) {
            let tzid = component
                .properties()
                .get(name)
                .and_then(|p| p.param("TZID"))
                .map(|tz| format!(" ({tz})"))
                .unwrap_or_default();
            let _ = writeln!(out, "  {label}: {}{tzid}", display_datetime(value));
        }
    }
    if component.kind() == ComponentKind::ToDo {
        let status = extract_field(component, "STATUS").unwrap_or("NEEDS-ACTION");
        let _ = writeln!(out, "  Status: {status}");
    }
}

/// `20240102T090000Z` → `2024-01-02T09:00:00Z`, `20240102` → `2024-01-02`.
/// Anything else is returned unchanged.
fn display_datetime(raw: &str) -> String {
    let (value, utc) = match raw.strip_suffix('Z') {
        Some(value) => (value, "Z"),
        None => (raw, ""),
    };
    let digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    match value.split_once('T') {
        None if value.len() == 8 && digits(value) => {
            format!("{}-{}-{}", &value[..4], &value[4..6], &value[6..8])
        },
        Some((date, time))
            if date.len() == 8 && time.len() == 6 && digits(date) && digits(time) =>
        {
            format!(
                "{}-{}-{}T{}:{}:{}{utc}",
                &date[..4],
                &date[4..6],
                &date[6..8],
                &time[..2],
                &time[2..4],
                &time[4..6]
            )
        },
        _ => raw.to_string(),
    }
}

/// Render fetched messages as `Subject/From/Date/---` blocks. With
/// `with_body`, the body text follows the headers.
#[must_use]
pub fn format_messages(messages: &[MailMessage], with_body: bool, empty: &str) -> String {
    if messages.is_empty() {
        return empty.to_string();
    }

    let mut out = String::new();
    for message in messages {
        let subject = message.subject.as_deref().unwrap_or("(no subject)");
        let from = if message.from.is_empty() {
            "(unknown sender)".to_string()
        } else {
            message.from.join(", ")
        };
        let date = message.date.as_deref().unwrap_or("(no date)");
        let _ = writeln!(out, "Subject: {subject}");
        let _ = writeln!(out, "From: {from}");
        let _ = writeln!(out, "Date: {date}");
        if with_body {
            let body = message.body.as_deref().unwrap_or_default();
            let _ = writeln!(out, "\n{body}");
        }
        out.push_str("---\n");
    }
    out
}
