//! Outbound application events.
//!
//! The [`DashboardController`](super::service::DashboardController) emits
//! these through the [`EventSink`](super::ports::EventSink) port.  The
//! default adapter logs them; anything else (a toast queue, a test
//! recorder) implements the same trait.

use crate::app::ports::ConfigError;
use crate::datalog::{LogPath, LogStartError};
use crate::fsm::ModeId;

/// Structured events emitted by the application core.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// Boot finished (carries the initial mode).
    Started(ModeId),

    /// Normal ⇄ Portal.
    ModeChanged { from: ModeId, to: ModeId },

    /// Telemetry link came up (`true`) or went stale (`false`).
    LinkChanged(bool),

    /// Bit `i` set when channel `i` is in warning.
    WarningsChanged(u8),

    /// Shift indicator entered (`true`) or left (`false`).
    ShiftChanged(bool),

    RecordingStarted { index: u32, path: LogPath },
    RecordingStopped,
    RecordingRefused(LogStartError),

    SettingsSaved,
    SettingsSaveFailed(ConfigError),
    DefaultsRestored,
}
