//! On-device settings editor.
//!
//! A cursor over nine rows (six warning windows, SHIFT, VIEW, LOGGING), a
//! MIN/MAX toggle for the window being edited, ± stepping, per-row switches
//! and the transient "SAVED"/"DEFAULT" flash.  The editor mutates
//! [`DashSettings`] in memory only; persistence is the controller's job.

use core::fmt::Write as _;

use log::debug;

use crate::config::{Bound, Channel, DashSettings, SAVED_FLASH_MS, ViewMode};

/// Rpm change per ± press on the SHIFT row.
pub const SHIFT_STEP_RPM: i32 = 100;

/// One settings row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Row {
    Threshold(Channel),
    Shift,
    View,
    Logging,
}

impl Row {
    pub const COUNT: usize = Channel::COUNT + 3;

    pub fn from_index(idx: usize) -> Option<Self> {
        match idx {
            i if i < Channel::COUNT => Channel::from_index(i).map(Self::Threshold),
            6 => Some(Self::Shift),
            7 => Some(Self::View),
            8 => Some(Self::Logging),
            _ => None,
        }
    }

    pub fn index(self) -> usize {
        match self {
            Self::Threshold(ch) => ch.index(),
            Self::Shift => Channel::COUNT,
            Self::View => Channel::COUNT + 1,
            Self::Logging => Channel::COUNT + 2,
        }
    }
}

pub type RowText = heapless::String<32>;

/// Render-ready row.
#[derive(Debug, Clone, PartialEq)]
pub struct SettingsRowView {
    pub title: RowText,
    pub value: RowText,
    pub switch_on: bool,
    pub selected: bool,
}

/// Render-ready settings screen.
#[derive(Debug, Clone, PartialEq)]
pub struct SettingsView {
    pub rows: [SettingsRowView; Row::COUNT],
    pub bound: Bound,
}

/// Result of an edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOutcome {
    Unchanged,
    Changed,
    /// Layout changed; the dashboard must be re-laid out.
    ViewChanged,
}

pub struct SettingsEditor {
    row: usize,
    bound: Bound,
    flash: Option<(&'static str, u64)>,
    confirm_pending: bool,
}

impl Default for SettingsEditor {
    fn default() -> Self {
        Self::new()
    }
}

impl SettingsEditor {
    pub fn new() -> Self {
        Self {
            row: 0,
            bound: Bound::Min,
            flash: None,
            confirm_pending: false,
        }
    }

    pub fn selected(&self) -> Row {
        Row::from_index(self.row).unwrap_or(Row::Logging)
    }

    pub fn bound(&self) -> Bound {
        self.bound
    }

    pub fn select_row(&mut self, idx: usize) {
        self.row = idx.min(Row::COUNT - 1);
    }

    pub fn toggle_bound(&mut self) -> Bound {
        self.bound = self.bound.toggled();
        self.bound
    }

    /// One ± press on the selected row.
    pub fn step(&self, settings: &mut DashSettings, up: bool) -> EditOutcome {
        let dir = if up { 1.0 } else { -1.0 };
        match self.selected() {
            Row::Threshold(ch) => {
                settings
                    .thresholds
                    .entry_mut(ch)
                    .nudge(self.bound, dir * ch.edit_step());
                EditOutcome::Changed
            }
            Row::Shift => {
                settings.shift.nudge(if up { SHIFT_STEP_RPM } else { -SHIFT_STEP_RPM });
                EditOutcome::Changed
            }
            Row::View => {
                settings.view = settings.view.toggled();
                EditOutcome::ViewChanged
            }
            Row::Logging => EditOutcome::Unchanged,
        }
    }

    /// Flip a row's switch.  Also moves the cursor to that row.
    pub fn set_enabled(&mut self, settings: &mut DashSettings, idx: usize, on: bool) -> EditOutcome {
        self.select_row(idx);
        match self.selected() {
            Row::Threshold(ch) => {
                settings.thresholds.entry_mut(ch).set_enabled(on);
                EditOutcome::Changed
            }
            Row::Shift => {
                settings.shift.enabled = on;
                EditOutcome::Changed
            }
            Row::View => {
                settings.view = if on { ViewMode::Bar } else { ViewMode::Ring };
                EditOutcome::ViewChanged
            }
            Row::Logging => {
                settings.logging_enabled = on;
                EditOutcome::Changed
            }
        }
    }

    /// Ask for confirmation before restoring defaults.  Returns `false` when a
    /// request is already open.
    pub fn request_defaults(&mut self) -> bool {
        if self.confirm_pending {
            return false;
        }
        self.confirm_pending = true;
        true
    }

    /// Close the confirmation.  Returns `true` when defaults should be applied.
    pub fn confirm_defaults(&mut self, apply: bool) -> bool {
        let pending = core::mem::take(&mut self.confirm_pending);
        pending && apply
    }

    pub fn confirm_pending(&self) -> bool {
        self.confirm_pending
    }

    /// Show `message` for [`SAVED_FLASH_MS`].
    pub fn flash(&mut self, message: &'static str, now_ms: u64) {
        self.flash = Some((message, now_ms + SAVED_FLASH_MS));
    }

    pub fn flash_message(&self) -> Option<&'static str> {
        self.flash.map(|(msg, _)| msg)
    }

    /// Clear an expired flash.  Returns `true` on the expiry edge.
    pub fn expire_flash(&mut self, now_ms: u64) -> bool {
        match self.flash {
            Some((msg, until)) if now_ms >= until => {
                debug!("SETTINGS: flash '{}' expired", msg);
                self.flash = None;
                true
            }
            _ => false,
        }
    }

    /// Build the render view.
    pub fn view(&self, settings: &DashSettings) -> SettingsView {
        SettingsView {
            rows: core::array::from_fn(|i| {
                let row = Row::from_index(i).unwrap_or(Row::Logging);
                SettingsRowView {
                    title: row_title(row),
                    value: row_value(settings, row, self.bound),
                    switch_on: row_switch(settings, row),
                    selected: i == self.row,
                }
            }),
            bound: self.bound,
        }
    }
}

fn row_title(row: Row) -> RowText {
    let mut t = RowText::new();
    let _ = match row {
        Row::Threshold(ch) => write!(t, "{} WARN", ch.name()),
        Row::Shift => t.write_str("SHIFT"),
        Row::View => t.write_str("VIEW"),
        Row::Logging => t.write_str("LOGGING"),
    };
    t
}

/// Value column text, e.g. `MIN 10.0..16.5` or `6500 rpm`.
pub fn row_value(settings: &DashSettings, row: Row, bound: Bound) -> RowText {
    let mut v = RowText::new();
    let _ = match row {
        Row::Threshold(ch) => {
            let e = settings.thresholds.entry(ch);
            let p = ch.range_decimals();
            write!(v, "{} {:.*}..{:.*}", bound.label(), p, e.min(), p, e.max())
        }
        Row::Shift => write!(v, "{} rpm", settings.shift.rpm()),
        Row::View => write!(v, "{}", settings.view.label()),
        Row::Logging => write!(v, "SD log"),
    };
    v
}

fn row_switch(settings: &DashSettings, row: Row) -> bool {
    match row {
        Row::Threshold(ch) => settings.thresholds.entry(ch).enabled(),
        Row::Shift => settings.shift.enabled,
        Row::View => settings.view == ViewMode::Bar,
        Row::Logging => settings.logging_enabled,
    }
}
