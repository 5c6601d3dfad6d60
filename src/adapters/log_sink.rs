//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing every application event as one
//! structured line to the ESP-IDF logger (UART0 console in production).

use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] to the console.
#[derive(Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Started(mode) => {
                info!("START | mode={:?}", mode);
            }
            AppEvent::ModeChanged { from, to } => {
                info!("MODE | {:?} -> {:?}", from, to);
            }
            AppEvent::LinkChanged(up) => {
                info!("LINK | {}", if *up { "up" } else { "stale" });
            }
            AppEvent::WarningsChanged(mask) => {
                info!("WARN | channels=0b{:06b}", mask);
            }
            AppEvent::ShiftChanged(active) => {
                info!("SHIFT | {}", if *active { "active" } else { "idle" });
            }
            AppEvent::RecordingStarted { index, path } => {
                info!("REC | started #{} -> {}", index, path);
            }
            AppEvent::RecordingStopped => {
                info!("REC | stopped");
            }
            AppEvent::RecordingRefused(reason) => {
                warn!("REC | refused: {}", reason);
            }
            AppEvent::SettingsSaved => {
                info!("CFG | saved");
            }
            AppEvent::SettingsSaveFailed(e) => {
                warn!("CFG | save failed: {}", e);
            }
            AppEvent::DefaultsRestored => {
                info!("CFG | thresholds restored to defaults");
            }
        }
    }
}
