//! Audit log of finished fetch tasks.
//!
//! One line per task:
//!
//! ```text
//! <content decimal> from <remote> to <local> start <secs> end <secs>
//! ```

use log::info;
use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use rust_ccdn_common::{ContentId, HostId, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskRecord {
    pub content: ContentId,
    pub remote: HostId,
    pub local: HostId,
    pub start: Duration,
    pub end: Duration,
}

impl fmt::Display for TaskRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} from {} to {} start {} end {}",
            self.content.value(),
            self.remote,
            self.local,
            self.start.as_secs_f64(),
            self.end.as_secs_f64()
        )
    }
}

/// Sink for [`TaskRecord`]s. Records are also kept in memory.
#[derive(Debug, Default)]
pub struct AuditLog {
    path: Option<PathBuf>,
    writer: Option<BufWriter<File>>,
    records: Vec<TaskRecord>,
}

impl AuditLog {
    /// Truncate (or create) the file at `path` and log to it.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path)?;
        info!("writing task log to {}", path.display());
        Ok(Self {
            path: Some(path),
            writer: Some(BufWriter::new(file)),
            records: Vec::new(),
        })
    }

    /// Keep records in memory only.
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn records(&self) -> &[TaskRecord] {
        &self.records
    }

    /// Append one record; file output is flushed immediately.
    pub fn append(&mut self, record: TaskRecord) -> Result<()> {
        if let Some(writer) = self.writer.as_mut() {
            writeln!(writer, "{}", record)?;
            writer.flush()?;
        }
        self.records.push(record);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(content: u64, end_ms: u64) -> TaskRecord {
        TaskRecord {
            content: ContentId(content),
            remote: HostId(3),
            local: HostId(7),
            start: Duration::from_secs(1),
            end: Duration::from_millis(end_ms),
        }
    }

    #[test]
    fn test_line_format() {
        assert_eq!(record(255, 1500).to_string(), "255 from 3 to 7 start 1 end 1.5");
    }

    #[test]
    fn test_file_is_truncated_and_flushed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tasks.log");
        std::fs::write(&path, "stale\n").unwrap();

        let mut log = AuditLog::create(&path).unwrap();
        log.append(record(1, 1100)).unwrap();
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "1 from 3 to 7 start 1 end 1.1\n"
        );

        log.append(record(2, 1200)).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 2);
        assert_eq!(log.records().len(), 2);
    }

    #[test]
    fn test_in_memory() {
        let mut log = AuditLog::in_memory();
        log.append(record(1, 1100)).unwrap();
        assert_eq!(log.records()[0].content, ContentId(1));
        assert!(log.path().is_none());
    }
}
