//! Append-only transaction log
//!
//! One record per terminal allocation attempt (and per cancellation). The
//! column set is stable; downstream reporting parses this file, so columns
//! are only ever added, never renamed or reordered.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use event_tix_core::PriorityClass;
use parking_lot::Mutex;
use uuid::Uuid;

/// One terminal allocation outcome
#[derive(Clone, Debug)]
pub struct AuditRecord {
    /// Instant the outcome was recorded
    pub timestamp: DateTime<Utc>,
    /// Request id (queue path) or order id (checkout path)
    pub reference: Uuid,
    /// Priority class of the attempt
    pub ticket_type: PriorityClass,
    /// `confirmed`, `failed` or `cancelled`
    pub outcome: &'static str,
    /// Unit price in cents at the time of the attempt
    pub price_cents: u32,
    /// Discount in cents, zero when no promo applied
    pub discount_cents: u32,
    /// Failure or cancellation reason, empty on success
    pub reason: String,
}

impl AuditRecord {
    fn to_csv_line(&self) -> String {
        // all fields are token-like (no commas, no quotes), so plain joins
        // keep the file parseable by anything
        format!(
            "{},{},{},{},{},{},{}\n",
            self.timestamp.to_rfc3339(),
            self.reference,
            self.ticket_type,
            self.outcome,
            self.price_cents,
            self.discount_cents,
            self.reason,
        )
    }
}

const CSV_HEADER: &str = "timestamp,reference,ticket_type,outcome,price_cents,discount_cents,reason\n";

/// Destination for audit records
///
/// Appending must never fail the allocation that produced the record; sinks
/// swallow their own errors and report them through the log.
pub trait AuditSink: Send + Sync {
    /// Append one record
    fn append(&self, record: &AuditRecord);
}

/// CSV file sink, the production default
pub struct CsvAuditSink {
    path: PathBuf,
    // serializes writers so concurrent checkout threads cannot interleave lines
    write_lock: Mutex<()>,
}

impl CsvAuditSink {
    /// Create a sink appending to `path`; the header is written lazily when
    /// the file does not exist yet
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            write_lock: Mutex::new(()),
        }
    }

    fn try_write(&self, line: &str) -> std::io::Result<()> {
        let fresh = !self.path.exists();
        if fresh {
            if let Some(parent) = self.path.parent() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        if fresh {
            file.write_all(CSV_HEADER.as_bytes())?;
        }
        file.write_all(line.as_bytes())
    }
}

impl AuditSink for CsvAuditSink {
    fn append(&self, record: &AuditRecord) {
        let line = record.to_csv_line();
        let _guard = self.write_lock.lock();
        // retry once before giving up; the allocation itself never fails on a
        // sink error
        for attempt in 0..2 {
            match self.try_write(&line) {
                Ok(()) => return,
                Err(err) if attempt == 0 => {
                    tracing::warn!(%err, path = %self.path.display(), "audit write failed, retrying");
                }
                Err(err) => {
                    tracing::error!(%err, path = %self.path.display(), "audit write failed, record dropped");
                }
            }
        }
    }
}

/// In-memory sink for tests and audit-less deployments
#[derive(Default)]
pub struct MemoryAuditSink {
    records: Mutex<Vec<AuditRecord>>,
}

impl MemoryAuditSink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything appended so far
    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().clone()
    }
}

impl AuditSink for MemoryAuditSink {
    fn append(&self, record: &AuditRecord) {
        self.records.lock().push(record.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(outcome: &'static str) -> AuditRecord {
        AuditRecord {
            timestamp: Utc::now(),
            reference: Uuid::new_v4(),
            ticket_type: PriorityClass::Vip,
            outcome,
            price_cents: 5000,
            discount_cents: 500,
            reason: String::new(),
        }
    }

    #[test]
    fn csv_sink_writes_header_once_and_appends() {
        let path = std::env::temp_dir().join(format!("audit-{}.csv", Uuid::new_v4()));
        let sink = CsvAuditSink::new(path.clone());
        sink.append(&record("confirmed"));
        sink.append(&record("failed"));

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], CSV_HEADER.trim_end());
        assert!(lines[1].contains(",confirmed,"));
        assert!(lines[2].contains(",failed,"));
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn csv_line_has_the_stable_column_count() {
        let line = record("confirmed").to_csv_line();
        assert_eq!(line.trim_end().split(',').count(), CSV_HEADER.trim_end().split(',').count());
    }
}
