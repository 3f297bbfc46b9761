/// Logger that keeps recent entries in memory, appends them to
/// ~/.config/taskboard/logs/backend.log and echoes them to stderr.

use env_logger::{Logger, Target};
use log::{Log, Metadata, Record, SetLoggerError};
use serde::Serialize;
use std::collections::VecDeque;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{LazyLock, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

const MAX_LOG_ENTRIES: usize = 2000;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub timestamp_ms: u64,
    pub level: String,
    pub target: String,
    pub message: String,
}

impl LogEntry {
    fn now(level: &str, target: &str, message: String) -> Self {
        Self {
            timestamp_ms: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_millis() as u64,
            level: level.to_string(),
            target: target.to_string(),
            message,
        }
    }
}

/// Ring buffer of the most recent entries.
struct LogRing {
    entries: Mutex<VecDeque<LogEntry>>,
    capacity: usize,
}

impl LogRing {
    fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    fn push(&self, entry: LogEntry) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push_back(entry);
            while entries.len() > self.capacity {
                entries.pop_front();
            }
        }
    }

    fn recent(&self) -> Vec<LogEntry> {
        self.entries
            .lock()
            .map(|entries| entries.iter().cloned().collect())
            .unwrap_or_default()
    }
}

static LOG_RING: LazyLock<LogRing> = LazyLock::new(|| LogRing::new(MAX_LOG_ENTRIES));

struct LogFile {
    path: PathBuf,
    file: Mutex<Option<File>>,
}

impl LogFile {
    fn new() -> Self {
        let path = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("taskboard")
            .join("logs")
            .join("backend.log");
        let file = Self::open(&path).ok();
        Self {
            path,
            file: Mutex::new(file),
        }
    }

    fn open(path: &Path) -> io::Result<File> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        OpenOptions::new().create(true).append(true).open(path)
    }

    fn append(&self, line: &str) {
        let Ok(mut guard) = self.file.lock() else {
            return;
        };
        if guard.is_none() {
            match Self::open(&self.path) {
                Ok(file) => *guard = Some(file),
                Err(_) => return,
            }
        }
        if let Some(file) = guard.as_mut() {
            let _ = writeln!(file, "{}", line);
            let _ = file.flush();
        }
    }
}

static LOG_FILE: LazyLock<LogFile> = LazyLock::new(LogFile::new);

fn format_log_line(entry: &LogEntry) -> String {
    format!(
        "{} [{}] [{}] {}",
        entry.timestamp_ms,
        entry.level.to_uppercase(),
        entry.target,
        entry.message.replace('\n', "\\n")
    )
}

fn emit(entry: LogEntry) {
    let line = format_log_line(&entry);
    LOG_FILE.append(&line);
    eprintln!("{}", line);
    LOG_RING.push(entry);
}

/// Uses env_logger for filtering only; output goes through `emit`.
struct BridgeLogger {
    inner: Logger,
}

impl Log for BridgeLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        self.inner.enabled(metadata)
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        emit(LogEntry::now(
            &record.level().to_string().to_lowercase(),
            record.target(),
            record.args().to_string(),
        ));
    }

    fn flush(&self) {
        self.inner.flush();
    }
}

/// Install the logger. `RUST_LOG` overrides the default `info` filter.
pub fn init() -> Result<(), SetLoggerError> {
    let _ = &*LOG_FILE;
    let mut builder = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    builder.target(Target::Pipe(Box::new(io::sink())));
    let logger = Box::leak(Box::new(BridgeLogger {
        inner: builder.build(),
    }));
    log::set_logger(logger)?;
    log::set_max_level(log::LevelFilter::Trace);
    Ok(())
}

pub fn recent_entries() -> Vec<LogEntry> {
    LOG_RING.recent()
}

pub fn log_file_path() -> String {
    LOG_FILE.path.display().to_string()
}

/// Record a line when the logger itself could not be installed.
pub fn write_fallback_line(message: &str) {
    emit(LogEntry::now("error", "taskboard.log_bridge", message.to_string()));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ring_keeps_latest() {
        let ring = LogRing::new(2);
        for i in 0..3 {
            ring.push(LogEntry::now("info", "t", format!("m{}", i)));
        }
        let messages: Vec<String> = ring.recent().into_iter().map(|e| e.message).collect();
        assert_eq!(messages, vec!["m1", "m2"]);
    }

    #[test]
    fn test_format_log_line() {
        let entry = LogEntry {
            timestamp_ms: 42,
            level: "warn".into(),
            target: "taskboard.api".into(),
            message: "two\nlines".into(),
        };
        assert_eq!(format_log_line(&entry), "42 [WARN] [taskboard.api] two\\nlines");
    }
}
