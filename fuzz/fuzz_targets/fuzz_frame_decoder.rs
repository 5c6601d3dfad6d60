//! Fuzz target: `FrameDecoder` + `EcuLink`
//!
//! Drives arbitrary byte sequences through the streaming decoder and the
//! link that decodes its payloads, asserting that neither panics, payloads
//! stay inside the fixed buffer and a reset always returns the decoder to
//! its idle state.
//!
//! cargo fuzz run fuzz_frame_decoder

#![no_main]

use libfuzzer_sys::fuzz_target;
use espdash::config::AfrFormat;
use espdash::ecu::EcuLink;
use espdash::ecu::codec::{FrameDecoder, MAX_PAYLOAD};

fuzz_target!(|data: &[u8]| {
    let mut decoder = FrameDecoder::new();
    for &b in data {
        if let Some(payload) = decoder.push(b) {
            assert!(payload.len() <= MAX_PAYLOAD, "payload exceeds MAX_PAYLOAD");
            assert!(!payload.is_empty(), "decoder must not yield empty payload");
        }
    }

    decoder.reset();
    assert!(decoder.is_idle());

    // Same bytes through the link, one millisecond apart.
    let mut link = EcuLink::new();
    for (i, &b) in data.iter().enumerate() {
        link.on_byte(b, AfrFormat::default(), i as u64);
        if let Some(snap) = link.live() {
            assert!(snap.tps <= 100);
        }
    }
    assert_eq!(link.rx_bytes() as usize, data.len());
});
