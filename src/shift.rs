//! Shift-point indicator.
//!
//! ```text
//!   IDLE ──[enabled ∧ link ∧ rpm ≥ shift]──▶ ACTIVE (blink every SHIFT_FLASH_MS)
//!    ▲                                          │
//!    └───────────[any condition false]──────────┘
//! ```
//!
//! `update()` runs every tick with the loop's monotonic clock, so the blink
//! keeps its cadence whether or not frames arrive.  Entry has no debounce.

use log::info;

use crate::config::{SHIFT_FLASH_MS, ShiftConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShiftState {
    Idle,
    Active,
}

/// What changed on this update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShiftEvent {
    Unchanged,
    /// Went active; blink phase starts on.
    Entered,
    Exited,
    /// Blink phase toggled to the carried value.
    Blink(bool),
}

#[derive(Debug, Clone)]
pub struct ShiftIndicator {
    state: ShiftState,
    blink_on: bool,
    last_toggle_ms: u64,
}

impl Default for ShiftIndicator {
    fn default() -> Self {
        Self::new()
    }
}

impl ShiftIndicator {
    pub fn new() -> Self {
        Self {
            state: ShiftState::Idle,
            blink_on: false,
            last_toggle_ms: 0,
        }
    }

    pub fn update(&mut self, cfg: &ShiftConfig, link_valid: bool, rpm: u16, now_ms: u64) -> ShiftEvent {
        let armed = cfg.enabled && link_valid && rpm >= cfg.rpm();

        match (self.state, armed) {
            (ShiftState::Idle, true) => {
                self.state = ShiftState::Active;
                self.blink_on = true;
                self.last_toggle_ms = now_ms;
                info!("SHIFT: active at {} rpm (shift point {})", rpm, cfg.rpm());
                ShiftEvent::Entered
            }
            (ShiftState::Active, false) => {
                self.state = ShiftState::Idle;
                self.blink_on = false;
                info!("SHIFT: cleared");
                ShiftEvent::Exited
            }
            (ShiftState::Active, true) => {
                if now_ms.saturating_sub(self.last_toggle_ms) >= SHIFT_FLASH_MS {
                    self.last_toggle_ms = now_ms;
                    self.blink_on = !self.blink_on;
                    ShiftEvent::Blink(self.blink_on)
                } else {
                    ShiftEvent::Unchanged
                }
            }
            (ShiftState::Idle, false) => ShiftEvent::Unchanged,
        }
    }

    pub fn state(&self) -> ShiftState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == ShiftState::Active
    }

    pub fn blink_on(&self) -> bool {
        self.blink_on
    }
}
