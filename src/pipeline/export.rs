// src/pipeline/export.rs

//! Snapshot serializers for query results.

use std::io::Write;

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;

use crate::error::Result;
use crate::models::{ContentStatus, HierarchyRow};

/// CSV column order.
pub const COLUMNS: [&str; 26] = [
    "topic_id",
    "topic_name",
    "topic_description",
    "topic_is_active",
    "topic_created_at",
    "topic_updated_at",
    "feed_id",
    "feed_name",
    "feed_url",
    "feed_is_active",
    "entry_id",
    "entry_title",
    "entry_link",
    "entry_description",
    "entry_content_markdown",
    "entry_content_html",
    "entry_published_at",
    "entry_created_at",
    "entry_is_active",
    "entry_content_status",
    "entry_content_timestamp",
    "entry_md_path",
    "entry_html_path",
    "entry_aggregated_md_path",
    "entry_metadata",
    "entry_metadata_extended",
];

/// Rows as JSON objects, one per row.
pub fn to_records(rows: &[HierarchyRow]) -> Result<Vec<Value>> {
    rows.iter()
        .map(|row| serde_json::to_value(row).map_err(Into::into))
        .collect()
}

/// Rows as a JSON array.
pub fn to_json(rows: &[HierarchyRow], pretty: bool) -> Result<String> {
    Ok(if pretty {
        serde_json::to_string_pretty(rows)?
    } else {
        serde_json::to_string(rows)?
    })
}

/// Write rows as RFC 4180 CSV with a header line.
pub fn write_csv<W: Write>(rows: &[HierarchyRow], mut writer: W) -> Result<()> {
    write_record(&mut writer, COLUMNS.iter().map(|c| c.to_string()))?;
    for row in rows {
        write_record(&mut writer, csv_values(row)?)?;
    }
    writer.flush()?;
    Ok(())
}

fn write_record<W: Write>(writer: &mut W, fields: impl IntoIterator<Item = String>) -> Result<()> {
    let line = fields
        .into_iter()
        .map(|f| quote(&f))
        .collect::<Vec<_>>()
        .join(",");
    writer.write_all(line.as_bytes())?;
    writer.write_all(b"\r\n")?;
    Ok(())
}

fn csv_values(row: &HierarchyRow) -> Result<Vec<String>> {
    let text = |v: &Option<String>| v.clone().unwrap_or_default();
    let flag = |v: Option<bool>| v.map(|b| b.to_string()).unwrap_or_default();
    let time = |v: Option<DateTime<Utc>>| {
        v.map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
            .unwrap_or_default()
    };
    let (metadata, extended) = match &row.entry_metadata {
        Some(meta) => (
            serde_json::to_string(meta)?,
            if meta.extended.is_empty() {
                String::new()
            } else {
                serde_json::to_string(&meta.extended)?
            },
        ),
        None => (String::new(), String::new()),
    };

    Ok(vec![
        row.topic_id.clone(),
        row.topic_name.clone(),
        text(&row.topic_description),
        row.topic_is_active.to_string(),
        time(row.topic_created_at),
        time(row.topic_updated_at),
        text(&row.feed_id),
        text(&row.feed_name),
        text(&row.feed_url),
        flag(row.feed_is_active),
        text(&row.entry_id),
        text(&row.entry_title),
        text(&row.entry_link),
        text(&row.entry_description),
        text(&row.entry_content_markdown),
        text(&row.entry_content_html),
        time(row.entry_published_at),
        time(row.entry_created_at),
        flag(row.entry_is_active),
        row.entry_content_status
            .map(status_name)
            .unwrap_or_default()
            .to_string(),
        time(row.entry_content_timestamp),
        text(&row.entry_md_path),
        text(&row.entry_html_path),
        text(&row.entry_aggregated_md_path),
        metadata,
        extended,
    ])
}

fn status_name(status: ContentStatus) -> &'static str {
    match status {
        ContentStatus::Pending => "pending",
        ContentStatus::Processing => "processing",
        ContentStatus::Completed => "completed",
        ContentStatus::Failed => "failed",
        ContentStatus::Other => "other",
    }
}

/// Quote a field if it contains a delimiter, quote or line break.
fn quote(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
