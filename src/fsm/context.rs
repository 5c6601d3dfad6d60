//! Context threaded through every mode handler.
//!
//! `ModeContext` is rebuilt by the controller at the top of each tick from
//! the port bundle and the engine state the mode handlers are allowed to
//! touch.  Handlers never keep it beyond the call.

use crate::app::events::AppEvent;
use crate::app::ports::{EventSink, RenderPort, ScreenId, SerialPort, StoragePort};
use crate::config::ViewMode;
use crate::datalog::LoggingSession;
use crate::ecu::EcuLink;
use crate::portal::PortalInfo;

pub struct ModeContext<'a> {
    // -- Timing --
    /// Monotonic time of this tick (ms).
    pub now_ms: u64,

    // -- Input --
    /// Latest sampled station count on the configuration AP.
    pub clients: u8,

    // -- Ports --
    pub serial: &'a mut dyn SerialPort,
    pub storage: &'a mut dyn StoragePort,
    pub render: &'a mut dyn RenderPort,
    pub sink: &'a mut dyn EventSink,

    // -- Engine state --
    pub link: &'a mut EcuLink,
    pub session: &'a mut LoggingSession,
    /// Screen the controller believes is loaded.
    pub screen: &'a mut ScreenId,
    pub portal: &'a PortalInfo,
    /// Layout to load when the dashboard comes back.
    pub view: ViewMode,
}

impl ModeContext<'_> {
    pub fn has_clients(&self) -> bool {
        self.clients > 0
    }

    pub fn emit(&mut self, event: AppEvent) {
        self.sink.emit(&event);
    }
}
