//! Logging - structured event log in DuckDB plus the shell's in-memory log pane
//!
//! `LoggingService` stores privacy-safe events in logs.duckdb. Events name an
//! operation, a plugin, or an account address; passwords, hints and key
//! material are never recorded.
//!
//! `ShellLog` holds the lines the shell and its plugins emit through
//! note/debug/warn, and mirrors warnings into the `LoggingService` when one is
//! attached.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use duckdb::types::Value;
use duckdb::{params_from_iter, Connection};
use serde::{Deserialize, Serialize};

use crate::log_migrations::{self, Migration};

/// Event name under which `ShellLog` warnings are stored
pub const SHELL_WARNING_EVENT: &str = "shell_warning";

/// Which binary wrote an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryPoint {
    Cli,
    Shell,
}

impl EntryPoint {
    fn as_str(&self) -> &'static str {
        match self {
            EntryPoint::Cli => "cli",
            EntryPoint::Shell => "shell",
        }
    }
}

/// A log event to be recorded
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEvent {
    pub event: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plugin: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_details: Option<String>,
}

impl LogEvent {
    pub fn new(event: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            plugin: None,
            account: None,
            operation: None,
            error_message: None,
            error_details: None,
        }
    }

    pub fn with_plugin(mut self, plugin: impl Into<String>) -> Self {
        self.plugin = Some(plugin.into());
        self
    }

    /// Address only; names and hints stay out of the log
    pub fn with_account(mut self, account: impl Into<String>) -> Self {
        self.account = Some(account.into());
        self
    }

    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = Some(operation.into());
        self
    }

    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }

    pub fn with_error_details(mut self, details: impl Into<String>) -> Self {
        self.error_details = Some(details.into());
        self
    }
}

/// A stored event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: i64,
    /// Unix milliseconds
    pub timestamp: i64,
    pub entry_point: String,
    pub app_version: String,
    pub platform: String,
    pub event: String,
    pub plugin: Option<String>,
    pub account: Option<String>,
    pub operation: Option<String>,
    pub error_message: Option<String>,
    pub error_details: Option<String>,
}

impl LogEntry {
    pub fn is_error(&self) -> bool {
        self.error_message.is_some()
    }

    pub fn is_shell_warning(&self) -> bool {
        self.event == SHELL_WARNING_EVENT
    }
}

/// Which entries `LoggingService::query` returns, newest first
///
/// Every set field narrows the result. `account` matches an address prefix,
/// case-insensitively, so a short `0xab` finds `0xAB12...`.
#[derive(Debug, Clone, Default)]
pub struct LogFilter {
    pub plugin: Option<String>,
    pub account: Option<String>,
    pub operation: Option<String>,
    pub errors_only: bool,
    pub warnings_only: bool,
    pub since: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

impl LogFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn plugin(mut self, plugin: impl Into<String>) -> Self {
        self.plugin = Some(plugin.into());
        self
    }

    pub fn account(mut self, account: impl Into<String>) -> Self {
        self.account = Some(account.into());
        self
    }

    pub fn operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = Some(operation.into());
        self
    }

    pub fn errors_only(mut self) -> Self {
        self.errors_only = true;
        self
    }

    pub fn warnings_only(mut self) -> Self {
        self.warnings_only = true;
        self
    }

    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    fn where_clause(&self) -> (String, Vec<Value>) {
        let mut conditions = Vec::new();
        let mut values = Vec::new();

        if let Some(plugin) = &self.plugin {
            conditions.push("plugin = ?");
            values.push(Value::Text(plugin.clone()));
        }
        if let Some(account) = &self.account {
            conditions.push("lower(account) LIKE ?");
            values.push(Value::Text(format!("{}%", account.to_lowercase())));
        }
        if let Some(operation) = &self.operation {
            conditions.push("operation = ?");
            values.push(Value::Text(operation.clone()));
        }
        if self.errors_only {
            conditions.push("error_message IS NOT NULL");
        }
        if self.warnings_only {
            conditions.push("event = ?");
            values.push(Value::Text(SHELL_WARNING_EVENT.to_string()));
        }
        if let Some(since) = self.since {
            conditions.push("timestamp >= ?");
            values.push(Value::BigInt(since.timestamp_millis()));
        }

        if conditions.is_empty() {
            (String::new(), values)
        } else {
            (format!(" WHERE {}", conditions.join(" AND ")), values)
        }
    }
}

/// Totals over the whole log
#[derive(Debug, Clone, Default, Serialize)]
pub struct LogStats {
    pub total: u64,
    pub errors: u64,
    pub shell_warnings: u64,
    pub oldest: Option<i64>,
    pub newest: Option<i64>,
    /// Entries per plugin, busiest first
    pub by_plugin: Vec<(String, u64)>,
}

const ENTRY_COLUMNS: &str = "id, timestamp, entry_point, app_version, platform, \
     event, plugin, account, operation, error_message, error_details";

fn entry_from_row(row: &duckdb::Row<'_>) -> duckdb::Result<LogEntry> {
    Ok(LogEntry {
        id: row.get(0)?,
        timestamp: row.get(1)?,
        entry_point: row.get(2)?,
        app_version: row.get(3)?,
        platform: row.get(4)?,
        event: row.get(5)?,
        plugin: row.get(6)?,
        account: row.get(7)?,
        operation: row.get(8)?,
        error_message: row.get(9)?,
        error_details: row.get(10)?,
    })
}

/// Event log backed by `<hearth dir>/logs.duckdb`
pub struct LoggingService {
    conn: Mutex<Connection>,
    db_path: PathBuf,
    entry_point: EntryPoint,
    app_version: String,
}

impl LoggingService {
    /// Open or create logs.duckdb in `data_dir` and bring its schema up to date
    pub fn new(
        data_dir: &Path,
        entry_point: EntryPoint,
        app_version: impl Into<String>,
    ) -> Result<Self> {
        let db_path = data_dir.join("logs.duckdb");
        let conn = Connection::open(&db_path)?;

        let service = Self {
            conn: Mutex::new(conn),
            db_path,
            entry_point,
            app_version: app_version.into(),
        };
        service.migrate()?;
        Ok(service)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| anyhow!("log connection poisoned: {}", e))
    }

    fn migrate(&self) -> Result<()> {
        let mut conn = self.conn()?;
        conn.execute_batch(log_migrations::BOOKKEEPING.sql)?;

        let applied: Vec<String> = {
            let mut stmt = conn.prepare("SELECT migration_name FROM sys_migrations")?;
            let names = stmt
                .query_map([], |row| row.get(0))?
                .collect::<duckdb::Result<Vec<String>>>()?;
            names
        };

        for Migration { name, sql } in log_migrations::pending(&applied) {
            let tx = conn.transaction()?;
            tx.execute_batch(sql)?;
            tx.execute("INSERT INTO sys_migrations (migration_name) VALUES (?)", [name])?;
            tx.commit()?;
        }
        Ok(())
    }

    /// Store one event, stamped with time, entry point, version and OS
    pub fn log(&self, event: LogEvent) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO sys_logs (timestamp, entry_point, app_version, platform, \
             event, plugin, account, operation, error_message, error_details) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            duckdb::params![
                Utc::now().timestamp_millis(),
                self.entry_point.as_str(),
                &self.app_version,
                std::env::consts::OS,
                &event.event,
                &event.plugin,
                &event.account,
                &event.operation,
                &event.error_message,
                &event.error_details,
            ],
        )?;
        Ok(())
    }

    pub fn query(&self, filter: &LogFilter) -> Result<Vec<LogEntry>> {
        let (clause, mut values) = filter.where_clause();
        let mut sql = format!("SELECT {} FROM sys_logs{} ORDER BY id DESC", ENTRY_COLUMNS, clause);
        if let Some(limit) = filter.limit {
            sql.push_str(" LIMIT ?");
            values.push(Value::BigInt(limit as i64));
        }

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let entries = stmt
            .query_map(params_from_iter(values.iter()), entry_from_row)?
            .collect::<duckdb::Result<Vec<_>>>()?;
        Ok(entries)
    }

    pub fn stats(&self) -> Result<LogStats> {
        let conn = self.conn()?;
        let mut stats = conn.query_row(
            "SELECT COUNT(*), COUNT(error_message), COUNT(*) FILTER (WHERE event = ?), \
             MIN(timestamp), MAX(timestamp) FROM sys_logs",
            [SHELL_WARNING_EVENT],
            |row| {
                Ok(LogStats {
                    total: row.get(0)?,
                    errors: row.get(1)?,
                    shell_warnings: row.get(2)?,
                    oldest: row.get(3)?,
                    newest: row.get(4)?,
                    by_plugin: Vec::new(),
                })
            },
        )?;

        let mut stmt = conn.prepare(
            "SELECT plugin, COUNT(*) AS n FROM sys_logs WHERE plugin IS NOT NULL \
             GROUP BY plugin ORDER BY n DESC, plugin",
        )?;
        stats.by_plugin = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<duckdb::Result<Vec<_>>>()?;
        Ok(stats)
    }

    /// Remove entries written before `cutoff`; returns how many went
    pub fn prune(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let conn = self.conn()?;
        let removed = conn.execute(
            "DELETE FROM sys_logs WHERE timestamp < ?",
            [cutoff.timestamp_millis()],
        )?;
        Ok(removed as u64)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }
}

/// Severity of a shell log line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Note,
    Warn,
}

/// One line in the shell log pane
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogLine {
    pub level: LogLevel,
    /// "shell" or the emitting plugin's name
    pub source: String,
    pub message: String,
    pub at: DateTime<Utc>,
}

/// Default number of lines the shell log keeps
pub const SHELL_LOG_CAPACITY: usize = 1000;

/// Bounded in-memory log shared by the shell and its plugins
pub struct ShellLog {
    lines: Mutex<VecDeque<LogLine>>,
    capacity: usize,
    sink: Option<Arc<LoggingService>>,
}

impl Default for ShellLog {
    fn default() -> Self {
        Self::new(SHELL_LOG_CAPACITY)
    }
}

impl ShellLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            lines: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
            sink: None,
        }
    }

    /// Mirror warnings into the event log
    pub fn with_sink(mut self, sink: Arc<LoggingService>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn sink(&self) -> Option<&Arc<LoggingService>> {
        self.sink.as_ref()
    }

    pub fn push(&self, level: LogLevel, source: &str, message: impl Into<String>) {
        let message = message.into();

        if level == LogLevel::Warn {
            if let Some(sink) = &self.sink {
                // Logging must never break the caller
                let _ = sink.log(
                    LogEvent::new(SHELL_WARNING_EVENT)
                        .with_plugin(source)
                        .with_error(message.clone()),
                );
            }
        }

        if let Ok(mut lines) = self.lines.lock() {
            if lines.len() == self.capacity {
                lines.pop_front();
            }
            lines.push_back(LogLine {
                level,
                source: source.to_string(),
                message,
                at: Utc::now(),
            });
        }
    }

    pub fn note(&self, source: &str, message: impl Into<String>) {
        self.push(LogLevel::Note, source, message)
    }

    pub fn debug(&self, source: &str, message: impl Into<String>) {
        self.push(LogLevel::Debug, source, message)
    }

    pub fn warn(&self, source: &str, message: impl Into<String>) {
        self.push(LogLevel::Warn, source, message)
    }

    /// Lines oldest first
    pub fn lines(&self) -> Vec<LogLine> {
        self.lines
            .lock()
            .map(|l| l.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Record a structured event if a sink is attached; failures are ignored
    pub fn event(&self, event: LogEvent) {
        if let Some(sink) = &self.sink {
            let _ = sink.log(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tempfile::tempdir;

    fn open_log(dir: &Path) -> LoggingService {
        LoggingService::new(dir, EntryPoint::Cli, "1.0.0").unwrap()
    }

    #[test]
    fn test_log_stamps_entry() {
        let dir = tempdir().unwrap();
        let service = open_log(dir.path());
        assert!(service.db_path().exists());

        service.log(LogEvent::new("command_started")).unwrap();

        let entries = service.query(&LogFilter::new()).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].event, "command_started");
        assert_eq!(entries[0].entry_point, "cli");
        assert_eq!(entries[0].app_version, "1.0.0");
        assert_eq!(entries[0].platform, std::env::consts::OS);
        assert!(!entries[0].is_error());
    }

    #[test]
    fn test_query_newest_first_with_limit() {
        let dir = tempdir().unwrap();
        let service = open_log(dir.path());
        for name in ["first", "second", "third"] {
            service.log(LogEvent::new(name)).unwrap();
        }

        let entries = service.query(&LogFilter::new().limit(2)).unwrap();
        let events: Vec<&str> = entries.iter().map(|e| e.event.as_str()).collect();
        assert_eq!(events, vec!["third", "second"]);
    }

    #[test]
    fn test_query_by_plugin_account_and_operation() {
        let dir = tempdir().unwrap();
        let service = open_log(dir.path());
        service
            .log(LogEvent::new("plugin_loaded").with_plugin("node-status").with_operation("load"))
            .unwrap();
        service
            .log(
                LogEvent::new("keys")
                    .with_account("0xAB12000000000000000000000000000000000000")
                    .with_operation("reencrypt"),
            )
            .unwrap();
        service
            .log(
                LogEvent::new("keys")
                    .with_account("0xcd34000000000000000000000000000000000000")
                    .with_operation("export"),
            )
            .unwrap();

        let by_plugin = service.query(&LogFilter::new().plugin("node-status")).unwrap();
        assert_eq!(by_plugin.len(), 1);
        assert_eq!(by_plugin[0].operation.as_deref(), Some("load"));

        let by_account = service.query(&LogFilter::new().account("0xab")).unwrap();
        assert_eq!(by_account.len(), 1);
        assert_eq!(by_account[0].operation.as_deref(), Some("reencrypt"));

        let combined = service
            .query(&LogFilter::new().account("0x").operation("export"))
            .unwrap();
        assert_eq!(combined.len(), 1);
        assert!(combined[0].account.as_deref().unwrap_or("").starts_with("0xcd34"));

        assert!(service.query(&LogFilter::new().plugin("missing")).unwrap().is_empty());
    }

    #[test]
    fn test_errors_and_warnings_filters() {
        let dir = tempdir().unwrap();
        let service = Arc::new(open_log(dir.path()));
        let log = ShellLog::new(10).with_sink(Arc::clone(&service));

        service
            .log(
                LogEvent::new("keys")
                    .with_operation("unlock")
                    .with_error("wrong password")
                    .with_error_details("WrongPassword"),
            )
            .unwrap();
        log.note("shell", "not mirrored");
        log.warn("miner", "mirrored");

        let errors = service.query(&LogFilter::new().errors_only()).unwrap();
        assert_eq!(errors.len(), 2);

        let warnings = service.query(&LogFilter::new().warnings_only()).unwrap();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].is_shell_warning());
        assert_eq!(warnings[0].plugin.as_deref(), Some("miner"));
        assert_eq!(warnings[0].error_message.as_deref(), Some("mirrored"));
    }

    #[test]
    fn test_since_excludes_older_entries() {
        let dir = tempdir().unwrap();
        let service = open_log(dir.path());
        service.log(LogEvent::new("event")).unwrap();

        let recent = LogFilter::new().since(Utc::now() - Duration::hours(1));
        assert_eq!(service.query(&recent).unwrap().len(), 1);

        let future = LogFilter::new().since(Utc::now() + Duration::hours(1));
        assert!(service.query(&future).unwrap().is_empty());
    }

    #[test]
    fn test_stats() {
        let dir = tempdir().unwrap();
        let service = open_log(dir.path());
        assert_eq!(service.stats().unwrap().total, 0);
        assert!(service.stats().unwrap().newest.is_none());

        service.log(LogEvent::new("plugin_loaded").with_plugin("log-panel")).unwrap();
        service.log(LogEvent::new("plugin_loaded").with_plugin("node-status")).unwrap();
        service
            .log(LogEvent::new(SHELL_WARNING_EVENT).with_plugin("node-status").with_error("stalled"))
            .unwrap();

        let stats = service.stats().unwrap();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.errors, 1);
        assert_eq!(stats.shell_warnings, 1);
        assert!(stats.oldest <= stats.newest);
        assert_eq!(
            stats.by_plugin,
            vec![("node-status".to_string(), 2), ("log-panel".to_string(), 1)]
        );
    }

    #[test]
    fn test_prune_removes_only_older_entries() {
        let dir = tempdir().unwrap();
        let service = open_log(dir.path());
        service.log(LogEvent::new("one")).unwrap();
        service.log(LogEvent::new("two")).unwrap();

        assert_eq!(service.prune(Utc::now() - Duration::days(1)).unwrap(), 0);
        assert_eq!(service.prune(Utc::now() + Duration::seconds(1)).unwrap(), 2);
        assert_eq!(service.stats().unwrap().total, 0);
    }

    #[test]
    fn test_reopen_keeps_entries_and_migrates_once() {
        let dir = tempdir().unwrap();
        {
            let service = open_log(dir.path());
            service.log(LogEvent::new("first")).unwrap();
        }
        let service = open_log(dir.path());
        service.log(LogEvent::new("second")).unwrap();
        assert_eq!(service.stats().unwrap().total, 2);

        let conn = service.conn().unwrap();
        let applied: u64 = conn
            .query_row("SELECT COUNT(*) FROM sys_migrations", [], |row| row.get(0))
            .unwrap();
        assert_eq!(applied as usize, log_migrations::LOG_MIGRATIONS.len());
    }

    #[test]
    fn test_shell_log_is_bounded() {
        let log = ShellLog::new(2);
        log.note("shell", "one");
        log.debug("shell", "two");
        log.warn("plugin-a", "three");

        let lines = log.lines();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].message, "two");
        assert_eq!(lines[1].level, LogLevel::Warn);
        assert_eq!(lines[1].source, "plugin-a");
    }

    #[test]
    fn test_shell_log_events_need_a_sink() {
        let log = ShellLog::new(4);
        log.event(LogEvent::new("dropped"));
        log.warn("shell", "kept in memory only");
        assert!(log.sink().is_none());
        assert_eq!(log.lines().len(), 1);
    }
}
