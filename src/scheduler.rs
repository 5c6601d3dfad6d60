//! Tick-loop timers and the ECU poll scheduler.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    DashboardController.tick()                │
//! │                                                              │
//! │  ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │
//! │  │ Clients   │  │ ECU poll  │  │ UI frame  │  │ Status    │  │
//! │  │ 250 ms    │  │ 100 ms    │  │ 60 ms     │  │ 250 ms    │  │
//! │  └─────┬─────┘  └─────┬─────┘  └─────┬─────┘  └─────┬─────┘  │
//! │        └──────────────┴──── Cadence ─┴──────────────┘        │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every periodic activity in the loop is a [`Cadence`] checked against the
//! monotonic clock passed in by the caller.  Nothing here sleeps.

use log::{debug, warn};

use crate::app::ports::SerialPort;
use crate::config::POLL_MS;
use crate::ecu::codec::FRAME_MARKER;

// ═══════════════════════════════════════════════════════════════
//  Cadence
// ═══════════════════════════════════════════════════════════════

/// A fixed-period timer.  Fires on the first check, then whenever at
/// least `period_ms` has passed since it last fired.
#[derive(Debug, Clone, Copy)]
pub struct Cadence {
    period_ms: u64,
    last_ms: Option<u64>,
}

impl Cadence {
    pub const fn new(period_ms: u64) -> Self {
        Self {
            period_ms,
            last_ms: None,
        }
    }

    /// Returns `true` (and re-arms) when the period has elapsed.
    pub fn due(&mut self, now_ms: u64) -> bool {
        match self.last_ms {
            Some(last) if now_ms.saturating_sub(last) < self.period_ms => false,
            _ => {
                self.last_ms = Some(now_ms);
                true
            }
        }
    }

    /// Forget the last fire so the next check fires immediately.
    pub fn reset(&mut self) {
        self.last_ms = None;
    }

    pub fn period_ms(&self) -> u64 {
        self.period_ms
    }
}

// ═══════════════════════════════════════════════════════════════
//  ECU poll scheduler
// ═══════════════════════════════════════════════════════════════

/// Sends the one-byte realtime request at [`POLL_MS`].
///
/// There is no outstanding-request bookkeeping: a request is only ever sent
/// while the decoder sits between frames, and link staleness is the only
/// timeout.
pub struct PollScheduler {
    cadence: Cadence,
    sent: u32,
}

impl Default for PollScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl PollScheduler {
    pub fn new() -> Self {
        Self {
            cadence: Cadence::new(POLL_MS),
            sent: 0,
        }
    }

    /// Poll if due.  `allowed` is the mode gate; `decoder_idle` blocks a
    /// request while a frame is mid-flight.  Returns `true` when a byte went
    /// out.
    pub fn tick(&mut self, now_ms: u64, allowed: bool, decoder_idle: bool, serial: &mut dyn SerialPort) -> bool {
        if !allowed || !self.cadence.due(now_ms) {
            return false;
        }
        if !decoder_idle {
            debug!("POLL: skipped, frame in progress");
            return false;
        }
        match serial.write_byte(FRAME_MARKER) {
            Ok(()) => {
                self.sent = self.sent.wrapping_add(1);
                true
            }
            Err(e) => {
                warn!("POLL: request not sent: {}", e);
                false
            }
        }
    }

    /// Requests sent since boot.
    pub fn sent(&self) -> u32 {
        self.sent
    }
}
