use std::cmp::Reverse;
use std::fmt::Write as _;

use serde::Serialize;

use crate::dates::{format_utc, TimeWindow};
use crate::history::MessageRecord;

pub const WRAP_WIDTH: usize = 120;
const RULE_WIDTH: usize = 80;
const INDENT: &str = "  ";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub window: TimeWindow,
    pub groups_requested: usize,
    pub groups_found: usize,
    pub total: usize,
    pub messages: Vec<MessageRecord>,
}

impl Report {
    /// Orders records newest first; equal timestamps keep their input order.
    pub fn new(
        mut records: Vec<MessageRecord>,
        window: TimeWindow,
        groups_requested: usize,
        groups_found: usize,
    ) -> Self {
        records.sort_by_key(|record| Reverse(record.date));
        Self {
            window,
            groups_requested,
            groups_found,
            total: records.len(),
            messages: records,
        }
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        let rule = "=".repeat(RULE_WIDTH);

        let _ = writeln!(out, "{rule}");
        let _ = writeln!(out, "SUMMARY");
        let _ = writeln!(out, "{rule}");
        let _ = writeln!(out, "Total messages found: {}", self.total);
        let _ = writeln!(
            out,
            "Time range: {} ({} to {} UTC)",
            self.window.label,
            format_utc(self.window.since),
            format_utc(self.window.until)
        );
        let _ = writeln!(
            out,
            "Groups processed: {} (found: {})",
            self.groups_requested, self.groups_found
        );

        if self.messages.is_empty() {
            let _ = writeln!(out, "\nNo messages found in the specified time range.");
            return out;
        }

        let _ = writeln!(out, "\n{rule}");
        let _ = writeln!(out, "MESSAGES");
        let _ = writeln!(out, "{rule}");
        for record in &self.messages {
            out.push_str(&render_record(record));
            out.push('\n');
        }
        out
    }
}

pub fn render_record(record: &MessageRecord) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", "=".repeat(RULE_WIDTH));
    let _ = writeln!(out, "GROUP: {}", record.chat_name);
    let _ = writeln!(out, "MESSAGE ID: {}", record.id);
    let _ = writeln!(out, "DATE: {} UTC", format_utc(record.date));
    let _ = writeln!(out, "SENDER ID: {}", record.sender_id);
    if let Some(origin) = record.forward_from {
        let _ = writeln!(out, "FORWARDED FROM: {origin}");
    }
    if record.has_media {
        let _ = writeln!(out, "MEDIA: Yes");
    }
    let _ = writeln!(out, "MESSAGE:");
    if record.text.is_empty() {
        let _ = writeln!(out, "{INDENT}[No text content]");
    } else {
        for line in wrap_text(&record.text, WRAP_WIDTH) {
            let _ = writeln!(out, "{INDENT}{line}");
        }
    }
    out
}

/// Hard-wraps every embedded line at `width` characters. Empty lines are kept.
pub fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    for paragraph in text.split('\n') {
        let paragraph = paragraph.strip_suffix('\r').unwrap_or(paragraph);
        let chars: Vec<char> = paragraph.chars().collect();
        if chars.is_empty() {
            lines.push(String::new());
            continue;
        }
        lines.extend(chars.chunks(width.max(1)).map(|chunk| chunk.iter().collect::<String>()));
    }
    lines
}
