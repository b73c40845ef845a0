use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Local, Utc};

use crate::config::APP_NAME;
use crate::models::Message;

/// `HH:MM` for messages from today, `Mon DD HH:MM` otherwise.
pub fn format_time(at: DateTime<Utc>, now: DateTime<Local>) -> String {
    let local = at.with_timezone(&Local);
    if local.date_naive() == now.date_naive() {
        local.format("%H:%M").to_string()
    } else {
        local.format("%b %-d %H:%M").to_string()
    }
}

pub fn export_to_text(messages: &[Message], now: DateTime<Local>) -> String {
    let mut output = format!(
        "=== {} chat export ===\nTime: {}\n\n",
        APP_NAME,
        now.format("%Y-%m-%d %H:%M:%S")
    );

    for msg in messages {
        output.push_str(&format!(
            "[{}] {}:\n{}\n\n",
            format_time(msg.created_at, now),
            msg.role.display_name(),
            msg.content
        ));
    }

    output
}

pub fn default_export_path(now: DateTime<Local>) -> PathBuf {
    PathBuf::from(format!("chat-{}.txt", now.timestamp_millis()))
}

pub fn write_export(messages: &[Message], path: &Path) -> Result<()> {
    let text = export_to_text(messages, Local::now());
    std::fs::write(path, text)
        .with_context(|| format!("Failed to write export to {}", path.display()))?;
    tracing::info!("Exported {} message(s) to {}", messages.len(), path.display());
    Ok(())
}
