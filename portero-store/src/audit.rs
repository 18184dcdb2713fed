// portero-store/src/audit.rs
// ============================================================================
// Module: Portero Audit Stream
// Description: Append-only JSON-lines audit stream in the state directory.
// Purpose: Persist audit records and serve the recent-audit admin command.
// Dependencies: portero-core, serde_json
// ============================================================================

//! ## Overview
//! The audit stream appends one JSON line per record to `audit.jsonl` inside
//! the state directory. Appends never fail the calling pipeline; read-back
//! exists only for the admin channel's recent-audit command and skips lines
//! that no longer parse.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::File;
use std::fs::OpenOptions;
use std::io::BufRead;
use std::io::BufReader;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Mutex;

use portero_core::AuditRecord;
use portero_core::AuditSink;
use portero_core::StoreError;

// ============================================================================
// SECTION: File Audit Stream
// ============================================================================

/// Append-only audit stream backed by a JSON-lines file.
pub struct FileAuditStream {
    /// Stream file path, used for read-back.
    path: PathBuf,
    /// File handle used for append-only logging.
    file: Mutex<File>,
}

impl FileAuditStream {
    /// Opens the audit stream in append mode, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] when the file cannot be opened.
    pub fn open(state_dir: &Path) -> Result<Self, StoreError> {
        let path = state_dir.join("audit.jsonl");
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|err| StoreError::Unavailable(format!("audit open failed: {err}")))?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    /// Returns up to `limit` most recent records, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] when the stream cannot be read.
    pub fn read_recent(&self, limit: usize) -> Result<Vec<AuditRecord>, StoreError> {
        let _guard = self
            .file
            .lock()
            .map_err(|_| StoreError::Unavailable("audit lock poisoned".to_string()))?;
        let file = File::open(&self.path)
            .map_err(|err| StoreError::Unavailable(format!("audit read failed: {err}")))?;
        let reader = BufReader::new(file);
        let mut records: Vec<AuditRecord> = Vec::new();
        for line in reader.lines() {
            let line =
                line.map_err(|err| StoreError::Unavailable(format!("audit read failed: {err}")))?;
            if let Ok(record) = serde_json::from_str::<AuditRecord>(&line) {
                records.push(record);
            }
        }
        let skip = records.len().saturating_sub(limit);
        Ok(records.split_off(skip))
    }
}

impl AuditSink for FileAuditStream {
    fn record(&self, record: &AuditRecord) {
        if let Ok(payload) = serde_json::to_string(record)
            && let Ok(mut file) = self.file.lock()
        {
            let _ = writeln!(file, "{payload}");
            let _ = file.flush();
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
