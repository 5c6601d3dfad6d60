//! SD-card CSV logging session.
//!
//! One append-only file at a time, named after a persisted sequence number
//! (`/log_00042.csv`).  The sequence number is bumped and written to flash
//! the moment a file is created, so a reset mid-session never reuses a
//! name.  Rows are rate-limited to [`LOG_INTERVAL_MS`] and flushed at most
//! every [`LOG_FLUSH_MS`].

use core::fmt::{self, Write as _};

use log::{info, warn};

use crate::app::ports::{LogFile, PrefsPort, StoragePort};
use crate::config::{DashSettings, LOG_FLUSH_MS, LOG_INTERVAL_MS};
use crate::ecu::TelemetrySnapshot;

/// First line of every log file.
pub const CSV_HEADER: &str = "ms,rpm,iatC,cltC,vbat,afr,tps,advance,warmup,launch";

/// Buffer for a log path such as `/log_00001.csv`.
pub type LogPath = heapless::String<32>;

/// One CSV row; the widest possible row is well under this.
type RowBuf = heapless::String<96>;

/// Why a recording could not start.  `Display` is the operator-facing text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogStartError {
    Disabled,
    NoStorage,
    AlreadyRecording,
    StorageBusy,
    OpenFailed,
}

impl fmt::Display for LogStartError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Disabled => "Logging disabled",
            Self::NoStorage => "SD card not detected",
            Self::AlreadyRecording => "Already recording",
            Self::StorageBusy => "Storage busy",
            Self::OpenFailed => "Failed to open log file",
        })
    }
}

/// `/log_NNNNN.csv` for `index`.
pub fn log_filename(index: u32) -> LogPath {
    let mut path = LogPath::new();
    // 32 bytes fit any u32 index.
    let _ = write!(path, "/log_{:05}.csv", index);
    path
}

/// Format one CSV row (newline-terminated).
pub fn format_row(snap: &TelemetrySnapshot, now_ms: u64) -> RowBuf {
    let mut row = RowBuf::new();
    let _ = writeln!(
        row,
        "{},{},{},{},{:.2},{:.2},{},{},{},{}",
        now_ms,
        snap.rpm,
        snap.iat_c,
        snap.clt_c,
        snap.vbat,
        snap.afr,
        snap.tps,
        snap.advance,
        u8::from(snap.warmup),
        u8::from(snap.launch),
    );
    row
}

/// The single, optional recording.
#[derive(Default)]
pub struct LoggingSession {
    file: Option<Box<dyn LogFile>>,
    path: LogPath,
    last_row_ms: Option<u64>,
    last_flush_ms: u64,
    rows: u32,
}

impl LoggingSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open the next log file.
    ///
    /// `busy` is set while the portal holds the card.  On success the
    /// sequence number in `settings` is advanced and persisted, and the
    /// index that was used is returned.
    pub fn start(
        &mut self,
        settings: &mut DashSettings,
        storage: &mut dyn StoragePort,
        prefs: &mut dyn PrefsPort,
        busy: bool,
        now_ms: u64,
    ) -> Result<u32, LogStartError> {
        if !settings.logging_enabled {
            return Err(LogStartError::Disabled);
        }
        if !storage.is_present() {
            return Err(LogStartError::NoStorage);
        }
        if self.is_recording() {
            return Err(LogStartError::AlreadyRecording);
        }
        if busy {
            return Err(LogStartError::StorageBusy);
        }

        let index = settings.log_index;
        let path = log_filename(index);
        let mut file = storage.open_append(&path).map_err(|e| {
            warn!("LOG: open {} failed: {}", path, e);
            LogStartError::OpenFailed
        })?;
        let mut header = heapless::String::<64>::new();
        let _ = writeln!(header, "{}", CSV_HEADER);
        if let Err(e) = file.append(header.as_bytes()) {
            warn!("LOG: header write to {} failed: {}", path, e);
            let _ = file.close();
            return Err(LogStartError::OpenFailed);
        }

        settings.log_index = index.wrapping_add(1).max(1);
        if let Err(e) = settings.save_log_index(prefs) {
            warn!("LOG: could not persist log index: {}", e);
        }

        info!("LOG: recording to {}", path);
        self.file = Some(file);
        self.path = path;
        self.last_row_ms = None;
        self.last_flush_ms = now_ms;
        self.rows = 0;
        Ok(index)
    }

    /// Write one row if a session is open, the card is present, the mode
    /// gate allows it and [`LOG_INTERVAL_MS`] has passed.  Returns `true`
    /// when a row was written.
    pub fn append(&mut self, snap: &TelemetrySnapshot, now_ms: u64, storage_present: bool, allowed: bool) -> bool {
        if !storage_present || !allowed {
            return false;
        }
        let Some(file) = self.file.as_mut() else {
            return false;
        };
        if let Some(last) = self.last_row_ms {
            if now_ms.saturating_sub(last) < LOG_INTERVAL_MS {
                return false;
            }
        }
        self.last_row_ms = Some(now_ms);

        let row = format_row(snap, now_ms);
        if let Err(e) = file.append(row.as_bytes()) {
            warn!("LOG: row write failed: {}", e);
            return false;
        }
        self.rows = self.rows.wrapping_add(1);

        if now_ms.saturating_sub(self.last_flush_ms) > LOG_FLUSH_MS {
            if let Err(e) = file.flush() {
                warn!("LOG: flush failed: {}", e);
            }
            self.last_flush_ms = now_ms;
        }
        true
    }

    /// Flush and close.  Idempotent.  With the card gone the handle is
    /// dropped without touching storage.  Returns `true` if a session was
    /// open.
    pub fn stop(&mut self, storage_present: bool) -> bool {
        let Some(mut file) = self.file.take() else {
            return false;
        };
        if storage_present {
            if let Err(e) = file.flush() {
                warn!("LOG: final flush failed: {}", e);
            }
            if let Err(e) = file.close() {
                warn!("LOG: close failed: {}", e);
            }
        } else {
            warn!("LOG: card absent, dropping {} without flush", self.path);
        }
        info!("LOG: stopped {} ({} rows)", self.path, self.rows);
        true
    }

    pub fn is_recording(&self) -> bool {
        self.file.is_some()
    }

    /// Path of the open (or most recent) file.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }
}
