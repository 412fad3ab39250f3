//! Terminal rendering shared by the commands

use chrono::{Local, TimeZone};
use colored::{ColoredString, Colorize};
use comfy_table::{presets::UTF8_FULL_CONDENSED, ContentArrangement, Table};

use hearth_core::services::LogLevel;

pub fn success(msg: &str) {
    println!("{}", msg.green());
}

/// Errors go to stderr so `--json` output on stdout stays parseable
pub fn error(msg: &str) {
    eprintln!("{}", msg.red());
}

pub fn warning(msg: &str) {
    eprintln!("{} {}", "!".yellow().bold(), msg.yellow());
}

pub fn info(msg: &str) {
    println!("{}", msg.dimmed());
}

/// Condensed table that wraps to the terminal width
pub fn table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

/// Unix milliseconds in local time
pub fn local_time(timestamp_ms: i64) -> String {
    match Local.timestamp_millis_opt(timestamp_ms).single() {
        Some(at) => at.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => timestamp_ms.to_string(),
    }
}

pub fn level_label(level: LogLevel) -> ColoredString {
    match level {
        LogLevel::Debug => "debug".dimmed(),
        LogLevel::Note => "note".normal(),
        LogLevel::Warn => "warn".yellow().bold(),
    }
}

pub fn file_size(bytes: u64) -> String {
    let mut size = bytes as f64;
    for unit in ["B", "KiB", "MiB"] {
        if size < 1024.0 {
            return if unit == "B" {
                format!("{} {}", bytes, unit)
            } else {
                format!("{:.1} {}", size, unit)
            };
        }
        size /= 1024.0;
    }
    format!("{:.1} GiB", size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_size_units() {
        assert_eq!(file_size(512), "512 B");
        assert_eq!(file_size(1536), "1.5 KiB");
        assert_eq!(file_size(3 * 1024 * 1024), "3.0 MiB");
        assert_eq!(file_size(2 * 1024 * 1024 * 1024), "2.0 GiB");
    }
}
