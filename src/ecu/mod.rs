//! ECU serial protocol: byte framing, payload decoding and link health.
//!
//! ```text
//!  UART bytes ──▶ FrameDecoder ──▶ decode_payload ──▶ TelemetrySnapshot
//!                       ▲                                   │
//!                       └──────── EcuLink (staleness) ◀─────┘
//! ```

pub mod codec;
pub mod link;
pub mod snapshot;

pub use link::EcuLink;
pub use snapshot::TelemetrySnapshot;
