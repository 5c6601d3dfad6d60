//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ DashboardController (domain)
//! ```
//!
//! Driven adapters (UART, SD card, NVS preferences, display, soft-AP) implement
//! these traits.  The [`DashboardController`](super::service::DashboardController)
//! receives them bundled in [`Ports`] on every call, so the domain core never
//! touches hardware directly and every collaborator can be mocked on the host.
//!
//! All port errors are typed and `Copy`; none of them is allowed to terminate
//! the tick loop.

use core::fmt;

use serde::Serialize;

use crate::config::ViewMode;
use crate::metrics::DashMetrics;
use crate::portal::PortalInfo;
use crate::settings::SettingsView;

// ───────────────────────────────────────────────────────────────
// Serial port (driven adapter: ECU UART ↔ domain)
// ───────────────────────────────────────────────────────────────

/// Byte-level access to the ECU serial link.
pub trait SerialPort {
    /// Open (or re-open) the link at `baud`.
    fn open(&mut self, baud: u32) -> Result<(), SerialError>;

    /// Release the link.  Bytes still in flight are discarded.
    fn close(&mut self);

    /// Bytes buffered and ready to read without blocking.
    fn available(&self) -> usize;

    /// Pop one buffered byte, `None` when the receive buffer is empty.
    fn read_byte(&mut self) -> Option<u8>;

    /// Queue one byte for transmission.
    fn write_byte(&mut self, byte: u8) -> Result<(), SerialError>;
}

// ───────────────────────────────────────────────────────────────
// Storage port (driven adapter: SD card filesystem)
// ───────────────────────────────────────────────────────────────

/// Handle to one open, append-only log file.
pub trait LogFile {
    /// Append raw bytes at the end of the file.
    fn append(&mut self, data: &[u8]) -> Result<(), StorageError>;

    /// Push buffered bytes to the card.
    fn flush(&mut self) -> Result<(), StorageError>;

    /// Flush and release the handle.
    fn close(self: Box<Self>) -> Result<(), StorageError>;
}

/// One regular file in the card root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredFile {
    pub name: String,
    pub size: u64,
}

/// Removable log storage.
pub trait StoragePort {
    /// Coarse presence check (card mounted and reporting capacity).
    fn is_present(&self) -> bool;

    /// Whether `path` exists on the card.
    fn exists(&self, path: &str) -> bool;

    /// Open `path` for appending, creating it when missing.
    fn open_append(&mut self, path: &str) -> Result<Box<dyn LogFile>, StorageError>;

    /// Read a whole file (portal downloads).
    fn read(&self, path: &str) -> Result<Vec<u8>, StorageError>;

    /// Regular files in the card root, in directory order.
    fn list(&self) -> Result<Vec<StoredFile>, StorageError>;
}

// ───────────────────────────────────────────────────────────────
// Preferences port (driven adapter: persistent key-value store)
// ───────────────────────────────────────────────────────────────

/// Namespaced key-value store with typed getters that fall back to a default.
///
/// Callers bracket every batch of accesses with [`begin`](Self::begin) and
/// [`end`](Self::end).  Getters never fail: a missing or unreadable key yields
/// `default`.
pub trait PrefsPort {
    fn begin(&mut self, namespace: &str, read_only: bool) -> Result<(), ConfigError>;
    fn end(&mut self);

    fn get_bool(&self, key: &str, default: bool) -> bool;
    fn get_u8(&self, key: &str, default: u8) -> u8;
    fn get_i32(&self, key: &str, default: i32) -> i32;
    fn get_u32(&self, key: &str, default: u32) -> u32;
    fn get_f32(&self, key: &str, default: f32) -> f32;

    fn put_bool(&mut self, key: &str, value: bool) -> Result<(), ConfigError>;
    fn put_u8(&mut self, key: &str, value: u8) -> Result<(), ConfigError>;
    fn put_i32(&mut self, key: &str, value: i32) -> Result<(), ConfigError>;
    fn put_u32(&mut self, key: &str, value: u32) -> Result<(), ConfigError>;
    fn put_f32(&mut self, key: &str, value: f32) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Render port (driven adapter: domain → display)
// ───────────────────────────────────────────────────────────────

/// Screens the render adapter can show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenId {
    Dashboard,
    Settings,
    Shift,
}

/// Everything the display needs.  Widget construction and styling live
/// entirely behind this trait.
pub trait RenderPort {
    /// Push the latest evaluated metrics to the dashboard widgets.
    fn render_metrics(&mut self, metrics: &DashMetrics);

    /// Load a screen.
    fn set_screen(&mut self, screen: ScreenId);

    /// Mark every widget dirty so the next frame is a full redraw.
    fn invalidate(&mut self);

    /// Suspend (`false`) or resume (`true`) the render pipeline.  The panel
    /// itself stays powered.
    fn set_rendering(&mut self, enabled: bool);

    /// Shift screen blink phase.
    fn set_shift_blink(&mut self, on: bool);

    /// Draw the static portal information screen directly, bypassing the
    /// render pipeline.
    fn draw_portal_screen(&mut self, info: &PortalInfo);

    /// Update the status strip.
    fn set_status(&mut self, status: &StatusLine);

    /// Switch the dashboard layout.
    fn set_view(&mut self, view: ViewMode);

    /// Redraw the settings list.
    fn show_settings(&mut self, view: &SettingsView);

    /// Short-lived popup (recording refusals).
    fn show_toast(&mut self, title: &str, message: &str);

    /// Transient settings flash ("SAVED", "DEFAULT"); `None` hides it.
    fn flash_message(&mut self, message: Option<&str>);

    /// REC button highlight.
    fn set_recording(&mut self, active: bool);
}

/// Contents of the status strip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusLine {
    pub link_ok: bool,
    pub rx_bytes: u32,
    pub age_ms: u64,
    pub storage_ok: bool,
    pub recording: bool,
}

impl fmt::Display for StatusLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "LINK: {} RX:{} Age:{}ms SD:{} {}",
            if self.link_ok { "OK" } else { "STALE" },
            self.rx_bytes,
            self.age_ms,
            if self.storage_ok { "OK" } else { "NO" },
            if self.recording { "REC" } else { "   " },
        )
    }
}

// ───────────────────────────────────────────────────────────────
// Client monitor (driven adapter: soft-AP station table)
// ───────────────────────────────────────────────────────────────

/// Non-blocking view of the configuration network.
pub trait ClientMonitor {
    /// Stations currently associated with the access point.
    fn connected_clients(&mut self) -> u8;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Port bundle
// ───────────────────────────────────────────────────────────────

/// Every driven adapter, borrowed for the duration of one controller call.
pub struct Ports<'a> {
    pub serial: &'a mut dyn SerialPort,
    pub storage: &'a mut dyn StoragePort,
    pub prefs: &'a mut dyn PrefsPort,
    pub render: &'a mut dyn RenderPort,
    pub clients: &'a mut dyn ClientMonitor,
    pub sink: &'a mut dyn EventSink,
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`SerialPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerialError {
    /// The UART driver could not be installed or configured.
    OpenFailed,
    /// Operation on a closed link.
    NotOpen,
    /// The transmit FIFO rejected the byte.
    WriteFailed,
}

/// Errors from [`StoragePort`] and [`LogFile`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// No card mounted.
    NotPresent,
    /// Requested file does not exist.
    NotFound,
    /// The file could not be opened or created.
    OpenFailed,
    /// A write or flush failed.
    WriteFailed,
    /// A read failed part-way.
    ReadFailed,
}

/// Errors from [`PrefsPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// The namespace could not be opened.
    OpenFailed,
    /// A put was attempted without a writable namespace.
    NotWritable,
    /// The backing store rejected the write.
    WriteFailed,
}

impl fmt::Display for SerialError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OpenFailed => write!(f, "open failed"),
            Self::NotOpen => write!(f, "link not open"),
            Self::WriteFailed => write!(f, "write failed"),
        }
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotPresent => write!(f, "card not present"),
            Self::NotFound => write!(f, "file not found"),
            Self::OpenFailed => write!(f, "open failed"),
            Self::WriteFailed => write!(f, "write failed"),
            Self::ReadFailed => write!(f, "read failed"),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OpenFailed => write!(f, "namespace open failed"),
            Self::NotWritable => write!(f, "namespace opened read-only"),
            Self::WriteFailed => write!(f, "write failed"),
        }
    }
}
