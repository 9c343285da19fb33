//! Server-rendered HTML status page.

use std::fmt::Write;

use chrono::{DateTime, Utc};
use station_models::{CycleSummary, SlotStatus, StatusSnapshot};

const PLACEHOLDER: &str = "--";
const NOT_AVAILABLE: &str = "N/A";

/// Escape text for an HTML body or attribute.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn clock(at: Option<DateTime<Utc>>) -> String {
    at.map(|t| t.format("%H:%M:%S").to_string())
        .unwrap_or_else(|| PLACEHOLDER.to_string())
}

fn text_or(value: Option<&str>, default: &str) -> String {
    escape_html(value.filter(|v| !v.is_empty()).unwrap_or(default))
}

fn render_slots(out: &mut String, slots: &[SlotStatus]) {
    out.push_str("<h2>Channels</h2>\n<table>\n<tr><th>Slot</th><th>Kind</th><th>State</th><th>Asset</th><th>Broadcast</th><th>Restarts</th><th>Rotates</th></tr>\n");
    for slot in slots {
        let _ = writeln!(
            out,
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
            escape_html(&slot.name),
            slot.kind,
            if slot.active { "active" } else { "idle" },
            text_or(slot.asset_title.as_deref(), PLACEHOLDER),
            text_or(slot.broadcast_id.as_deref(), PLACEHOLDER),
            slot.restarts,
            clock(slot.rotate_at),
        );
    }
    out.push_str("</table>\n");
}

fn render_history(out: &mut String, cycles: &[CycleSummary]) {
    out.push_str("<h2>Recent cycles</h2>\n<table>\n<tr><th>Started</th><th>Kind</th><th>Status</th><th>Title</th><th>Error</th></tr>\n");
    for cycle in cycles {
        let title = if cycle.fallback {
            format!("{} (fallback)", text_or(Some(&cycle.title), PLACEHOLDER))
        } else {
            text_or(Some(&cycle.title), PLACEHOLDER)
        };
        let _ = writeln!(
            out,
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
            cycle.created_at.format("%Y-%m-%d %H:%M"),
            cycle.kind,
            cycle.status.as_str(),
            title,
            text_or(cycle.error.as_deref(), ""),
        );
    }
    out.push_str("</table>\n");
}

/// Render the status page for one snapshot.
pub fn render_status_page(snapshot: &StatusSnapshot, uptime_minutes: u64) -> String {
    let mut out = String::with_capacity(2048);
    out.push_str("<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>Relax Station Bot</title></head>\n");
    out.push_str("<body style=\"font-family: monospace; background: #111; color: #eee; padding: 20px;\">\n");
    out.push_str("<h1>RELAX STATION BOT - STATUS</h1>\n");

    let _ = writeln!(out, "<p>Mode: <strong>{}</strong></p>", escape_html(&snapshot.mode));
    let _ = writeln!(out, "<p>Status: <strong>{}</strong></p>", escape_html(&snapshot.status_text));
    let _ = writeln!(out, "<p>Cycle started: {}</p>", clock(snapshot.cycle_started_at));
    let _ = writeln!(out, "<p>Next cycle: {}</p>", clock(snapshot.next_cycle_at));
    let _ = writeln!(out, "<p>Server uptime: {} min</p>", uptime_minutes);

    out.push_str("<hr>\n");
    let _ = writeln!(out, "<p>Concept: {}</p>", text_or(snapshot.concept.as_deref(), NOT_AVAILABLE));
    let _ = writeln!(out, "<p>Title: {}</p>", text_or(snapshot.title.as_deref(), NOT_AVAILABLE));
    if snapshot.fallback_active {
        out.push_str("<p>Fallback content active</p>\n");
    }
    if let Some(error) = snapshot.last_error.as_deref() {
        let _ = writeln!(out, "<p style=\"color: #f66;\">Last error: {}</p>", escape_html(error));
    }

    if !snapshot.slots.is_empty() {
        render_slots(&mut out, &snapshot.slots);
    }
    if !snapshot.recent_cycles.is_empty() {
        render_history(&mut out, &snapshot.recent_cycles);
    }

    out.push_str("</body>\n</html>\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use station_models::{ChannelKind, CycleKind, CycleRecord};

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("<b>\"rain\" & 'lofi'</b>"), "&lt;b&gt;&quot;rain&quot; &amp; &#39;lofi&#39;&lt;/b&gt;");
    }

    #[test]
    fn test_starting_page_uses_placeholders() {
        let page = render_status_page(&StatusSnapshot::starting("live"), 3);
        assert!(page.contains("Status: <strong>Starting</strong>"));
        assert!(page.contains("Cycle started: --"));
        assert!(page.contains("Server uptime: 3 min"));
        assert!(page.contains("Title: N/A"));
        assert!(!page.contains("Last error"));
        assert!(!page.contains("<table>"));
    }

    #[test]
    fn test_page_escapes_generated_text() {
        let mut snapshot = StatusSnapshot::starting("live");
        snapshot.title = Some("<script>alert(1)</script>".into());
        snapshot.last_error = Some("Publish: 500 <html>".into());
        let page = render_status_page(&snapshot, 0);
        assert!(!page.contains("<script>"));
        assert!(page.contains("&lt;script&gt;"));
        assert!(page.contains("Last error: Publish: 500 &lt;html&gt;"));
    }

    #[test]
    fn test_slot_table() {
        let mut snapshot = StatusSnapshot::starting("channels");
        snapshot.slots.push(SlotStatus {
            name: "Lofi-4".into(),
            kind: ChannelKind::LofiBackground,
            active: true,
            broadcast_id: Some("bc-4".into()),
            asset_title: None,
            restarts: 2,
            started_at: None,
            rotate_at: None,
        });
        let page = render_status_page(&snapshot, 0);
        assert!(page.contains("<td>Lofi-4</td><td>lofi-bg</td><td>active</td><td>--</td><td>bc-4</td><td>2</td>"));
    }

    #[test]
    fn test_recent_cycles_table() {
        let mut snapshot = StatusSnapshot::starting("live");
        let mut record = CycleRecord::new(CycleKind::LiveStream);
        record
            .set_content("Default fallback content", "desc", None, true)
            .unwrap();
        record.fail("RegistrationError: quota <exceeded>").unwrap();
        snapshot.apply_record(&record, "Error");

        let page = render_status_page(&snapshot, 0);
        assert!(page.contains("<h2>Recent cycles</h2>"));
        assert!(page.contains("<td>ERROR</td><td>Default fallback content (fallback)</td><td>RegistrationError: quota &lt;exceeded&gt;</td>"));
    }
}
