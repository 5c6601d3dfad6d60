//! Engineering values decoded from one ECU realtime payload.

use crate::config::AfrFormat;

/// Payloads shorter than this are discarded without decoding.
pub const MIN_DECODE_LEN: usize = 40;

// Fixed payload offsets.
const IDX_STATUS: usize = 2;
const IDX_IAT: usize = 6;
const IDX_CLT: usize = 7;
const IDX_VBAT: usize = 9;
const IDX_AFR: usize = 10;
const IDX_RPM: usize = 14;
const IDX_ADVANCE: usize = 23;
const IDX_TPS: usize = 24;
const IDX_SPARK: usize = 31;

/// Temperatures are sent offset by +40 °C.
const TEMP_OFFSET: i16 = 40;
const STATUS_WARMUP_BIT: u8 = 1 << 3;
const SPARK_LAUNCH_MASK: u8 = 0b0000_0011;

/// A point-in-time copy of every value the dash shows or logs.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TelemetrySnapshot {
    pub rpm: u16,
    /// Intake air temperature, °C.
    pub iat_c: i16,
    /// Coolant temperature, °C.
    pub clt_c: i16,
    /// Battery voltage, V.
    pub vbat: f32,
    pub afr: f32,
    /// Throttle position, 0..=100 %.
    pub tps: u8,
    /// Ignition advance, degrees.
    pub advance: i8,
    pub warmup: bool,
    pub launch: bool,
    /// Monotonic time the frame completed, ms.
    pub received_at_ms: u64,
}

fn u16le(p: &[u8], idx: usize) -> Option<u16> {
    Some(u16::from_le_bytes([*p.get(idx)?, *p.get(idx + 1)?]))
}

fn decode_afr(p: &[u8], format: AfrFormat) -> f32 {
    match format {
        AfrFormat::U16Hundredths => u16le(p, IDX_AFR).map_or(0.0, |v| f32::from(v) / 100.0),
        AfrFormat::U16Tenths => u16le(p, IDX_AFR).map_or(0.0, |v| f32::from(v) / 10.0),
        AfrFormat::U8Div10 => p.get(IDX_AFR).map_or(0.0, |&v| f32::from(v) / 10.0),
    }
}

/// Decode a realtime payload.  Returns `None` for short payloads.
pub fn decode_payload(p: &[u8], afr_format: AfrFormat, now_ms: u64) -> Option<TelemetrySnapshot> {
    if p.len() < MIN_DECODE_LEN {
        return None;
    }
    let rpm = u16le(p, IDX_RPM)?;
    let tps = ((u16::from(p[IDX_TPS]) + 1) / 2).min(100) as u8;

    Some(TelemetrySnapshot {
        rpm,
        iat_c: i16::from(p[IDX_IAT]) - TEMP_OFFSET,
        clt_c: i16::from(p[IDX_CLT]) - TEMP_OFFSET,
        vbat: f32::from(p[IDX_VBAT]) / 10.0,
        afr: decode_afr(p, afr_format),
        tps,
        advance: p[IDX_ADVANCE] as i8,
        warmup: p[IDX_STATUS] & STATUS_WARMUP_BIT != 0,
        launch: p[IDX_SPARK] & SPARK_LAUNCH_MASK != 0,
        received_at_ms: now_ms,
    })
}

/// Build a payload that decodes to `snap` (rounded to wire resolution).
///
/// Used by the host simulator, tests and the fuzz corpus.
pub fn encode_payload(snap: &TelemetrySnapshot, afr_format: AfrFormat, len: usize) -> Vec<u8> {
    let mut p = vec![0u8; len.max(MIN_DECODE_LEN)];
    if snap.warmup {
        p[IDX_STATUS] |= STATUS_WARMUP_BIT;
    }
    p[IDX_IAT] = (snap.iat_c + TEMP_OFFSET).clamp(0, 255) as u8;
    p[IDX_CLT] = (snap.clt_c + TEMP_OFFSET).clamp(0, 255) as u8;
    p[IDX_VBAT] = (snap.vbat * 10.0).round().clamp(0.0, 255.0) as u8;
    match afr_format {
        AfrFormat::U16Hundredths => {
            let v = (snap.afr * 100.0).round().clamp(0.0, 65535.0) as u16;
            p[IDX_AFR..IDX_AFR + 2].copy_from_slice(&v.to_le_bytes());
        }
        AfrFormat::U16Tenths => {
            let v = (snap.afr * 10.0).round().clamp(0.0, 65535.0) as u16;
            p[IDX_AFR..IDX_AFR + 2].copy_from_slice(&v.to_le_bytes());
        }
        AfrFormat::U8Div10 => {
            p[IDX_AFR] = (snap.afr * 10.0).round().clamp(0.0, 255.0) as u8;
        }
    }
    p[IDX_RPM..IDX_RPM + 2].copy_from_slice(&snap.rpm.to_le_bytes());
    p[IDX_ADVANCE] = snap.advance as u8;
    p[IDX_TPS] = (u16::from(snap.tps.min(100)) * 2).min(255) as u8;
    if snap.launch {
        p[IDX_SPARK] |= 0b01;
    }
    p
}
