//! Dashboard configuration.
//!
//! Compile-time timing constants plus the user-tunable [`DashSettings`]
//! (warning thresholds, shift light, AFR wire format, layout, logging).
//! Settings persist in the `espdash` preferences namespace through a
//! [`PrefsPort`]; anything read back from flash is sanitised before use.

use core::fmt::Write as _;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::app::ports::{ConfigError, PrefsPort};

// ═══════════════════════════════════════════════════════════════
//  Timing and link constants
// ═══════════════════════════════════════════════════════════════

/// ECU serial baud rate.
pub const ECU_BAUD: u32 = 115_200;
/// Request cadence while polling is allowed.
pub const POLL_MS: u64 = 100;
/// A link with no decoded frame for this long is stale.
pub const LINK_STALE_MS: u64 = 700;
/// Dashboard widget refresh period.
pub const UI_UPDATE_MS: u64 = 60;
/// Status strip refresh period.
pub const STATUS_UPDATE_MS: u64 = 250;
/// Minimum spacing between CSV rows.
pub const LOG_INTERVAL_MS: u64 = 100;
/// Minimum spacing between log flushes.
pub const LOG_FLUSH_MS: u64 = 1000;
/// Shift screen blink half-period.
pub const SHIFT_FLASH_MS: u64 = 180;
/// Connected-client sampling period.
pub const CLIENT_CHECK_MS: u64 = 250;
/// Per-tick yield while the portal is serving.
pub const PORTAL_YIELD_MS: u64 = 2;
/// How long "SAVED" / "DEFAULT" stays on the settings screen.
pub const SAVED_FLASH_MS: u64 = 2000;
/// Upper end of the tachometer and shift-point range.
pub const RPM_MAX: u16 = 8000;
/// Bound on bytes drained from the UART in a single tick.
pub const MAX_SERIAL_BYTES_PER_TICK: usize = 512;

/// Preferences namespace.
pub const PREFS_NAMESPACE: &str = "espdash";
/// Firmware version shown on the portal screen.
pub const FW_VERSION: &str = env!("CARGO_PKG_VERSION");

// ═══════════════════════════════════════════════════════════════
//  Warning channels
// ═══════════════════════════════════════════════════════════════

/// Analog channels that carry a configurable warning window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Channel {
    Afr = 0,
    Vbat = 1,
    Iat = 2,
    Clt = 3,
    Tps = 4,
    Advance = 5,
}

impl Channel {
    pub const COUNT: usize = 6;

    /// Channels in preference-key order (`w0*` .. `w5*`).
    pub const ALL: [Self; Self::COUNT] = [
        Self::Afr,
        Self::Vbat,
        Self::Iat,
        Self::Clt,
        Self::Tps,
        Self::Advance,
    ];

    pub fn from_index(idx: usize) -> Option<Self> {
        Self::ALL.get(idx).copied()
    }

    pub const fn index(self) -> usize {
        self as usize
    }

    /// Short label used on tiles and settings rows.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Afr => "AFR",
            Self::Vbat => "VBAT",
            Self::Iat => "IAT",
            Self::Clt => "CLT",
            Self::Tps => "TPS",
            Self::Advance => "ADV",
        }
    }

    /// Increment applied by one ± press in the settings editor.
    pub const fn edit_step(self) -> f32 {
        match self {
            Self::Afr | Self::Vbat => 0.1,
            _ => 1.0,
        }
    }

    /// Value range mapped onto a tile's bar (values outside are clamped).
    pub const fn bar_range(self) -> (f32, f32) {
        match self {
            Self::Afr => (9.0, 20.0),
            Self::Vbat => (10.0, 15.5),
            Self::Iat => (-20.0, 80.0),
            Self::Clt => (0.0, 120.0),
            Self::Tps => (0.0, 100.0),
            Self::Advance => (-10.0, 50.0),
        }
    }

    /// Decimal places of the live readout.
    pub const fn display_decimals(self) -> usize {
        match self {
            Self::Afr => 2,
            Self::Vbat => 1,
            _ => 0,
        }
    }

    /// Decimal places of the threshold window in the settings list.
    pub const fn range_decimals(self) -> usize {
        match self {
            Self::Afr | Self::Vbat => 1,
            _ => 0,
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Threshold table
// ═══════════════════════════════════════════════════════════════

/// Which end of a warning window an edit targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound {
    Min,
    Max,
}

impl Bound {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Min => "MIN",
            Self::Max => "MAX",
        }
    }

    pub const fn toggled(self) -> Self {
        match self {
            Self::Min => Self::Max,
            Self::Max => Self::Min,
        }
    }
}

/// One channel's warning window.  `min <= max` holds after every mutation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdEntry {
    enabled: bool,
    min: f32,
    max: f32,
}

impl ThresholdEntry {
    pub fn new(enabled: bool, min: f32, max: f32) -> Self {
        let mut entry = Self {
            enabled,
            min: 0.0,
            max: 0.0,
        };
        entry.set_bounds(min, max);
        entry
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn min(&self) -> f32 {
        self.min
    }

    pub fn max(&self) -> f32 {
        self.max
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Replace both bounds.  An inverted pair collapses to its midpoint;
    /// a non-finite bound leaves the window as it was.
    pub fn set_bounds(&mut self, min: f32, max: f32) {
        if !(min.is_finite() && max.is_finite()) {
            return;
        }
        if min > max {
            let mid = 0.5 * (min + max);
            self.min = mid;
            self.max = mid;
        } else {
            self.min = min;
            self.max = max;
        }
    }

    /// Move one bound by `delta`, repairing inversion the same way.
    pub fn nudge(&mut self, bound: Bound, delta: f32) {
        let (min, max) = match bound {
            Bound::Min => (round_tenths(self.min + delta), self.max),
            Bound::Max => (self.min, round_tenths(self.max + delta)),
        };
        self.set_bounds(min, max);
    }

    /// `true` when the window is armed and `value` lies outside it.
    pub fn is_violated(&self, value: f32) -> bool {
        self.enabled && (value < self.min || value > self.max)
    }

    /// Restore `min <= max` on a value that bypassed the setters (e.g. serde).
    fn repair(&mut self) {
        let (min, max) = (self.min, self.max);
        self.set_bounds(min, max);
    }
}

/// Keeps repeated 0.1 steps from accumulating float drift.
fn round_tenths(v: f32) -> f32 {
    (v * 10.0).round() / 10.0
}

/// Warning windows for all six analog channels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdTable {
    entries: [ThresholdEntry; Channel::COUNT],
}

impl Default for ThresholdTable {
    fn default() -> Self {
        Self::defaults()
    }
}

impl ThresholdTable {
    /// Factory windows.
    pub fn defaults() -> Self {
        Self {
            entries: [
                ThresholdEntry::new(true, 10.0, 16.5),   // AFR
                ThresholdEntry::new(true, 11.5, 15.2),   // VBAT
                ThresholdEntry::new(true, -10.0, 60.0),  // IAT
                ThresholdEntry::new(true, 0.0, 105.0),   // CLT
                ThresholdEntry::new(false, 0.0, 100.0),  // TPS
                ThresholdEntry::new(false, -10.0, 50.0), // ADV
            ],
        }
    }

    pub fn entry(&self, channel: Channel) -> &ThresholdEntry {
        &self.entries[channel.index()]
    }

    pub fn entry_mut(&mut self, channel: Channel) -> &mut ThresholdEntry {
        &mut self.entries[channel.index()]
    }

    pub fn is_warning(&self, channel: Channel, value: f32) -> bool {
        self.entry(channel).is_violated(value)
    }

    fn repair(&mut self) {
        let defaults = Self::defaults();
        for (entry, factory) in self.entries.iter_mut().zip(defaults.entries) {
            if !(entry.min.is_finite() && entry.max.is_finite()) {
                entry.min = factory.min;
                entry.max = factory.max;
            }
            entry.repair();
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Shift light, AFR format, layout
// ═══════════════════════════════════════════════════════════════

/// Shift-point indicator configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShiftConfig {
    pub enabled: bool,
    rpm: u16,
}

impl Default for ShiftConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            rpm: 6500,
        }
    }
}

impl ShiftConfig {
    pub fn new(enabled: bool, rpm: i32) -> Self {
        let mut cfg = Self { enabled, rpm: 0 };
        cfg.set_rpm(rpm);
        cfg
    }

    pub fn rpm(&self) -> u16 {
        self.rpm
    }

    /// Set the shift point, clamped to `0..=RPM_MAX`.
    pub fn set_rpm(&mut self, rpm: i32) {
        self.rpm = rpm.clamp(0, i32::from(RPM_MAX)) as u16;
    }

    pub fn nudge(&mut self, delta: i32) {
        self.set_rpm(i32::from(self.rpm) + delta);
    }
}

/// How the ECU encodes AFR at payload offset 10.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum AfrFormat {
    /// u16 little-endian, hundredths.
    U16Hundredths = 0,
    /// u16 little-endian, tenths.
    U16Tenths = 1,
    /// Single byte, tenths.
    #[default]
    U8Div10 = 2,
}

impl AfrFormat {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::U16Hundredths),
            1 => Some(Self::U16Tenths),
            2 => Some(Self::U8Div10),
            _ => None,
        }
    }
}

/// Dashboard layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum ViewMode {
    #[default]
    Ring = 0,
    Bar = 1,
}

impl ViewMode {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Ring),
            1 => Some(Self::Bar),
            _ => None,
        }
    }

    pub const fn toggled(self) -> Self {
        match self {
            Self::Ring => Self::Bar,
            Self::Bar => Self::Ring,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Ring => "RING",
            Self::Bar => "BAR",
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  DashSettings
// ═══════════════════════════════════════════════════════════════

const KEY_LOG_ENABLED: &str = "logEn";
const KEY_AFR_FORMAT: &str = "afrFmt";
const KEY_LOG_INDEX: &str = "logIdx";
const KEY_SHIFT_ENABLED: &str = "shEn";
const KEY_SHIFT_RPM: &str = "shRpm";
const KEY_VIEW: &str = "view";

/// Per-channel preference key, e.g. `w3n` for the CLT minimum.
fn threshold_key(channel: Channel, suffix: char) -> heapless::String<8> {
    let mut key = heapless::String::new();
    // Four bytes at most; cannot overflow.
    let _ = write!(key, "w{}{}", channel.index(), suffix);
    key
}

/// Every user-tunable setting.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DashSettings {
    pub thresholds: ThresholdTable,
    pub shift: ShiftConfig,
    pub afr_format: AfrFormat,
    pub view: ViewMode,
    pub logging_enabled: bool,
    /// Index of the next log file to create.  Never 0.
    pub log_index: u32,
}

impl Default for DashSettings {
    fn default() -> Self {
        Self {
            thresholds: ThresholdTable::defaults(),
            shift: ShiftConfig::default(),
            afr_format: AfrFormat::default(),
            view: ViewMode::default(),
            logging_enabled: true,
            log_index: 1,
        }
    }
}

impl DashSettings {
    /// Read every key, falling back to the default per key.
    pub fn load(prefs: &mut dyn PrefsPort) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        prefs.begin(PREFS_NAMESPACE, true)?;

        let afr_code = prefs.get_u8(KEY_AFR_FORMAT, defaults.afr_format as u8);
        let afr_format = AfrFormat::from_code(afr_code).unwrap_or_else(|| {
            warn!("CFG: unknown afrFmt {}, using default", afr_code);
            defaults.afr_format
        });
        let view_code = prefs.get_u8(KEY_VIEW, defaults.view as u8);
        let view = ViewMode::from_code(view_code).unwrap_or_else(|| {
            warn!("CFG: unknown view {}, using default", view_code);
            defaults.view
        });

        let mut thresholds = defaults.thresholds;
        for channel in Channel::ALL {
            let d = *defaults.thresholds.entry(channel);
            let enabled = prefs.get_bool(&threshold_key(channel, 'e'), d.enabled());
            let min = prefs.get_f32(&threshold_key(channel, 'n'), d.min());
            let max = prefs.get_f32(&threshold_key(channel, 'x'), d.max());
            let entry = thresholds.entry_mut(channel);
            entry.set_enabled(enabled);
            entry.set_bounds(min, max);
        }

        let mut settings = Self {
            thresholds,
            shift: ShiftConfig::new(
                prefs.get_bool(KEY_SHIFT_ENABLED, defaults.shift.enabled),
                prefs.get_i32(KEY_SHIFT_RPM, i32::from(defaults.shift.rpm())),
            ),
            afr_format,
            view,
            logging_enabled: prefs.get_bool(KEY_LOG_ENABLED, defaults.logging_enabled),
            log_index: prefs.get_u32(KEY_LOG_INDEX, defaults.log_index),
        };
        prefs.end();

        settings.sanitize();
        info!(
            "CFG: loaded (log #{}, shift {} @ {} rpm, view {:?})",
            settings.log_index,
            if settings.shift.enabled { "on" } else { "off" },
            settings.shift.rpm(),
            settings.view
        );
        Ok(settings)
    }

    /// Persist every key.
    pub fn save(&self, prefs: &mut dyn PrefsPort) -> Result<(), ConfigError> {
        prefs.begin(PREFS_NAMESPACE, false)?;
        let result = self.write_all(prefs);
        prefs.end();
        result
    }

    /// Persist only the threshold keys.
    pub fn save_thresholds(&self, prefs: &mut dyn PrefsPort) -> Result<(), ConfigError> {
        prefs.begin(PREFS_NAMESPACE, false)?;
        let result = self.write_thresholds(prefs);
        prefs.end();
        result
    }

    /// Persist only `logIdx`.
    pub fn save_log_index(&self, prefs: &mut dyn PrefsPort) -> Result<(), ConfigError> {
        prefs.begin(PREFS_NAMESPACE, false)?;
        let result = prefs.put_u32(KEY_LOG_INDEX, self.log_index);
        prefs.end();
        result
    }

    /// Repair anything that bypassed the setters.
    pub fn sanitize(&mut self) {
        self.thresholds.repair();
        let rpm = i32::from(self.shift.rpm());
        self.shift.set_rpm(rpm);
        if self.log_index == 0 {
            self.log_index = 1;
        }
    }

    fn write_all(&self, prefs: &mut dyn PrefsPort) -> Result<(), ConfigError> {
        prefs.put_bool(KEY_LOG_ENABLED, self.logging_enabled)?;
        prefs.put_u8(KEY_AFR_FORMAT, self.afr_format as u8)?;
        prefs.put_u32(KEY_LOG_INDEX, self.log_index)?;
        prefs.put_bool(KEY_SHIFT_ENABLED, self.shift.enabled)?;
        prefs.put_i32(KEY_SHIFT_RPM, i32::from(self.shift.rpm()))?;
        prefs.put_u8(KEY_VIEW, self.view as u8)?;
        self.write_thresholds(prefs)
    }

    fn write_thresholds(&self, prefs: &mut dyn PrefsPort) -> Result<(), ConfigError> {
        for channel in Channel::ALL {
            let entry = self.thresholds.entry(channel);
            prefs.put_bool(&threshold_key(channel, 'e'), entry.enabled())?;
            prefs.put_f32(&threshold_key(channel, 'n'), entry.min())?;
            prefs.put_f32(&threshold_key(channel, 'x'), entry.max())?;
        }
        Ok(())
    }
}
