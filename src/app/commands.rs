//! Inbound UI events.
//!
//! Touch callbacks on the display are translated by the render adapter into
//! [`DashEvent`]s and dispatched through
//! [`DashboardController::handle_event`](super::service::DashboardController::handle_event)
//! on the main loop.

/// Something the operator did on the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DashEvent {
    /// Start or stop a recording from the dashboard.
    ToggleRecording,

    OpenSettings,
    CloseSettings,

    /// Move the settings cursor to a row.
    SelectRow(usize),
    /// Switch the edited bound between MIN and MAX.
    ToggleBound,
    /// One ± press on the selected row.
    Increment,
    Decrement,
    /// A row's switch was flipped.
    SetEnabled { row: usize, on: bool },

    /// Persist everything.
    Save,
    /// Open the restore-defaults confirmation.
    RequestDefaults,
    /// Answer the confirmation.
    ConfirmDefaults(bool),
}
