//! Derived metrics and warning evaluation.
//!
//! Runs on every UI refresh against the newest snapshot only.  The
//! evaluator is a pure function of `(snapshot, thresholds)`: it owns no
//! state, touches no port and is safe to call any number of times.
//!
//! A missing snapshot (link stale) blanks every channel and pins RPM to 0.
//! Warnings are folded into a bitmask, one bit per [`Channel`], so the
//! controller can report edges.

use core::fmt::Write as _;

use crate::config::{Channel, RPM_MAX, ThresholdTable};
use crate::ecu::TelemetrySnapshot;

/// Text buffer for one tile readout ("-10", "14.70", "13.8").
pub type ReadoutText = heapless::String<12>;

/// One analog tile.
#[derive(Debug, Clone, PartialEq)]
pub enum Readout {
    /// Link down: the tile is blanked.
    NoData,
    Value {
        value: f32,
        text: ReadoutText,
        /// Bar position, clamped to `0.0..=1.0`.
        bar: f32,
        warning: bool,
    },
}

impl Readout {
    pub fn is_warning(&self) -> bool {
        matches!(self, Self::Value { warning: true, .. })
    }

    pub fn text(&self) -> &str {
        match self {
            Self::NoData => "",
            Self::Value { text, .. } => text.as_str(),
        }
    }
}

/// On/off tiles (warm-up, launch).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagReadout {
    NoData,
    Active,
    Inactive,
}

impl FlagReadout {
    fn from_flag(on: bool) -> Self {
        if on { Self::Active } else { Self::Inactive }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::NoData => "",
            Self::Active => "ACTIVE",
            Self::Inactive => "----",
        }
    }
}

/// Everything the dashboard screen draws for one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct DashMetrics {
    pub link_valid: bool,
    pub rpm: u16,
    /// Tachometer position, `0.0..=1.0` of [`RPM_MAX`].
    pub rpm_fraction: f32,
    pub channels: [Readout; Channel::COUNT],
    pub warmup: FlagReadout,
    pub launch: FlagReadout,
}

impl DashMetrics {
    pub fn channel(&self, channel: Channel) -> &Readout {
        &self.channels[channel.index()]
    }

    /// One bit per channel in warning, bit index = [`Channel::index`].
    pub fn warning_mask(&self) -> u8 {
        self.channels
            .iter()
            .enumerate()
            .filter(|(_, r)| r.is_warning())
            .fold(0u8, |mask, (i, _)| mask | (1 << i))
    }
}

/// Linear position of `value` inside `[lo, hi]`, clamped.
pub fn normalize(value: f32, lo: f32, hi: f32) -> f32 {
    if hi <= lo {
        return 0.0;
    }
    ((value - lo) / (hi - lo)).clamp(0.0, 1.0)
}

fn channel_value(snap: &TelemetrySnapshot, channel: Channel) -> f32 {
    match channel {
        Channel::Afr => snap.afr,
        Channel::Vbat => snap.vbat,
        Channel::Iat => f32::from(snap.iat_c),
        Channel::Clt => f32::from(snap.clt_c),
        Channel::Tps => f32::from(snap.tps),
        Channel::Advance => f32::from(snap.advance),
    }
}

fn readout(snap: &TelemetrySnapshot, channel: Channel, table: &ThresholdTable) -> Readout {
    let value = channel_value(snap, channel);
    let mut text = ReadoutText::new();
    // 12 bytes hold any value these channels can carry.
    let _ = write!(text, "{:.*}", channel.display_decimals(), value);
    let (lo, hi) = channel.bar_range();
    Readout::Value {
        value,
        text,
        bar: normalize(value, lo, hi),
        warning: table.is_warning(channel, value),
    }
}

/// Evaluate a snapshot against the threshold table.
///
/// `None` means the link is down.
pub fn evaluate(snapshot: Option<&TelemetrySnapshot>, table: &ThresholdTable) -> DashMetrics {
    match snapshot {
        None => DashMetrics {
            link_valid: false,
            rpm: 0,
            rpm_fraction: 0.0,
            channels: core::array::from_fn(|_| Readout::NoData),
            warmup: FlagReadout::NoData,
            launch: FlagReadout::NoData,
        },
        Some(snap) => DashMetrics {
            link_valid: true,
            rpm: snap.rpm,
            rpm_fraction: normalize(f32::from(snap.rpm), 0.0, f32::from(RPM_MAX)),
            channels: core::array::from_fn(|i| readout(snap, Channel::ALL[i], table)),
            warmup: FlagReadout::from_flag(snap.warmup),
            launch: FlagReadout::from_flag(snap.launch),
        },
    }
}
