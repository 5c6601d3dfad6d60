//! ECU link: decoder, latest snapshot and staleness tracking.

use log::{debug, info};

use super::codec::FrameDecoder;
use super::snapshot::{TelemetrySnapshot, decode_payload};
use crate::app::ports::SerialPort;
use crate::config::{AfrFormat, LINK_STALE_MS, MAX_SERIAL_BYTES_PER_TICK};

/// Owns the byte decoder and the most recent decoded frame.
pub struct EcuLink {
    decoder: FrameDecoder,
    snapshot: TelemetrySnapshot,
    link_valid: bool,
    /// Time of the last byte seen on the wire.
    last_rx_ms: u64,
    /// Time of the last frame that decoded.
    last_frame_ms: u64,
    rx_bytes: u32,
    frames: u32,
}

impl Default for EcuLink {
    fn default() -> Self {
        Self::new()
    }
}

impl EcuLink {
    pub fn new() -> Self {
        Self {
            decoder: FrameDecoder::new(),
            snapshot: TelemetrySnapshot::default(),
            link_valid: false,
            last_rx_ms: 0,
            last_frame_ms: 0,
            rx_bytes: 0,
            frames: 0,
        }
    }

    /// Feed one received byte.  Returns `true` when it completed a frame
    /// that decoded.
    pub fn on_byte(&mut self, byte: u8, afr_format: AfrFormat, now_ms: u64) -> bool {
        self.rx_bytes = self.rx_bytes.wrapping_add(1);
        self.last_rx_ms = now_ms;

        let Some(payload) = self.decoder.push(byte) else {
            return false;
        };
        match decode_payload(payload, afr_format, now_ms) {
            Some(snap) => {
                self.snapshot = snap;
                self.last_frame_ms = now_ms;
                self.frames = self.frames.wrapping_add(1);
                if !self.link_valid {
                    info!("ECU: link up (rpm={})", snap.rpm);
                }
                self.link_valid = true;
                true
            }
            None => {
                debug!("ECU: short payload ({} B) dropped", payload.len());
                false
            }
        }
    }

    /// Drain at most [`MAX_SERIAL_BYTES_PER_TICK`] buffered bytes into the
    /// decoder.  Returns the number of bytes consumed.
    pub fn drain(&mut self, serial: &mut dyn SerialPort, afr_format: AfrFormat, now_ms: u64) -> usize {
        let mut n = 0;
        while n < MAX_SERIAL_BYTES_PER_TICK {
            let Some(byte) = serial.read_byte() else {
                break;
            };
            self.on_byte(byte, afr_format, now_ms);
            n += 1;
        }
        n
    }

    /// Invalidate the link once no frame has decoded for [`LINK_STALE_MS`].
    /// Returns `true` on the valid → stale edge.
    pub fn refresh(&mut self, now_ms: u64) -> bool {
        if self.link_valid && now_ms.saturating_sub(self.last_frame_ms) > LINK_STALE_MS {
            self.link_valid = false;
            info!("ECU: link stale ({} ms since last frame)", now_ms - self.last_frame_ms);
            return true;
        }
        false
    }

    /// Forget any partial frame and restart the staleness clock at `now_ms`.
    pub fn reset(&mut self, now_ms: u64) {
        self.decoder.reset();
        self.link_valid = false;
        self.last_rx_ms = now_ms;
        self.last_frame_ms = now_ms;
    }

    /// The latest snapshot while the link is valid.
    pub fn live(&self) -> Option<&TelemetrySnapshot> {
        self.link_valid.then_some(&self.snapshot)
    }

    pub fn is_valid(&self) -> bool {
        self.link_valid
    }

    /// Milliseconds since the last byte arrived.
    pub fn age_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.last_rx_ms)
    }

    pub fn rx_bytes(&self) -> u32 {
        self.rx_bytes
    }

    pub fn frames(&self) -> u32 {
        self.frames
    }

    pub fn decoder_idle(&self) -> bool {
        self.decoder.is_idle()
    }
}
