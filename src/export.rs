//! Chat channel HTML-export parsing.
//!
//! Turns an exported channel page into raw [`Message`] records. The text
//! body is kept as-is, markup included; normalization happens lazily on
//! the message, not here. Malformed message blocks are skipped with a
//! warning and never fail the file.

use std::path::Path;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use tracing::warn;

use crate::error::{Error, Result};
use crate::models::Message;

static MESSAGE: Lazy<Selector> =
    Lazy::new(|| Selector::parse("div.message").expect("valid selector"));
static DATE: Lazy<Selector> =
    Lazy::new(|| Selector::parse("div.pull_right.date.details").expect("valid selector"));
static TEXT: Lazy<Selector> = Lazy::new(|| Selector::parse("div.text").expect("valid selector"));
static BODY_DETAILS: Lazy<Selector> =
    Lazy::new(|| Selector::parse("div.body.details").expect("valid selector"));

/// Parse one exported page into messages attributed to `channel`.
pub fn parse_export(html: &str, channel: &str) -> Vec<Message> {
    let document = Html::parse_document(html);
    let mut messages = Vec::new();

    for element in document.select(&MESSAGE) {
        let classes: Vec<&str> = element.value().classes().collect();
        if !classes.contains(&"default") && !classes.contains(&"service") {
            continue;
        }

        let Some(message_id) = element.value().attr("id") else {
            warn!(channel, "skipping message block without an id");
            continue;
        };

        let timestamp = element
            .select(&DATE)
            .next()
            .and_then(|d| d.value().attr("title"))
            .and_then(parse_export_datetime);

        // The text div keeps its markup; service messages (date headers)
        // fall back to their plain body text.
        let content = match element.select(&TEXT).next() {
            Some(text_el) => text_el.html(),
            None => element
                .select(&BODY_DETAILS)
                .next()
                .map(|b| b.text().collect::<String>().trim().to_string())
                .unwrap_or_default(),
        };

        messages.push(Message::new(channel, message_id, timestamp, content));
    }

    messages
}

/// Parse the export's date format (`02.01.2025 18:43:24 UTC+03:00`) into
/// UTC. Returns `None` for anything that does not match.
pub fn parse_export_datetime(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_str(value.trim(), "%d.%m.%Y %H:%M:%S UTC%:z")
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Parse a set of export files. The channel name is the file stem up to the
/// first `"__"`. Unreadable files are skipped with a warning.
pub fn parse_export_files(paths: &[impl AsRef<Path>]) -> Result<Vec<Message>> {
    let mut messages = Vec::new();
    for path in paths {
        let path = path.as_ref();
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping unreadable export file");
                continue;
            }
        };
        let channel = path
            .file_stem()
            .and_then(|s| s.to_str())
            .map(|s| s.split("__").next().unwrap_or(s).to_string())
            .ok_or_else(|| {
                Error::MalformedMessage(format!("export file has no stem: {}", path.display()))
            })?;
        messages.extend(parse_export(&content, &channel));
    }
    Ok(messages)
}
