//! Bounded in-memory log sink.
//!
//! For hosts without a console: keeps the most recent records and
//! overwrites the oldest once full.
//!
//! ```ignore
//! static LOGGER: RingLogger = RingLogger::new(64);
//! LOGGER.install(log::LevelFilter::Info)?;
//! ```

use alloc::collections::VecDeque;
use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicUsize, Ordering};

use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError};
use spin::Mutex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub level: Level,
    pub target: String,
    pub message: String,
}

pub struct RingLogger {
    entries: Mutex<VecDeque<LogEntry>>,
    capacity: usize,
    /// Records seen since creation, including overwritten ones.
    total: AtomicUsize,
}

impl RingLogger {
    pub const fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            capacity,
            total: AtomicUsize::new(0),
        }
    }

    /// Register as the global `log` sink.
    pub fn install(&'static self, level: LevelFilter) -> Result<(), SetLoggerError> {
        log::set_logger(self)?;
        log::set_max_level(level);
        Ok(())
    }

    pub fn push(&self, level: Level, target: &str, message: String) {
        self.total.fetch_add(1, Ordering::Relaxed);
        if self.capacity == 0 {
            return;
        }
        let mut entries = self.entries.lock();
        while entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(LogEntry {
            level,
            target: String::from(target),
            message,
        });
    }

    /// Retained entries, oldest first.
    pub fn recent(&self) -> Vec<LogEntry> {
        self.entries.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn total(&self) -> usize {
        self.total.load(Ordering::Relaxed)
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

impl Log for RingLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record<'_>) {
        if self.enabled(record.metadata()) {
            self.push(record.level(), record.target(), format!("{}", record.args()));
        }
    }

    fn flush(&self) {}
}
