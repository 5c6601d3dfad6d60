//! Normal ⇄ Portal transitions against the mock adapters.
//!
//! Verifies entry/exit ordering across serial, storage and render, the
//! coarse client sampling and the per-mode gates.

use super::mock_hw::{Call, Rig, snapshot};

use espdash::app::commands::DashEvent;
use espdash::app::events::AppEvent;
use espdash::app::ports::ScreenId;
use espdash::config::{ECU_BAUD, ViewMode};
use espdash::fsm::ModeId;
use espdash::portal::{Method, route};

fn position(calls: &[Call], wanted: &Call) -> usize {
    calls
        .iter()
        .position(|c| c == wanted)
        .unwrap_or_else(|| panic!("{:?} not in {:?}", wanted, calls))
}

/// Booted rig with a live link and an open recording.
fn recording_rig() -> Rig {
    let mut rig = Rig::booted();
    rig.feed(&snapshot(3000));
    rig.run_for(50, 10);
    rig.event(DashEvent::ToggleRecording);
    assert!(rig.controller.is_recording());
    rig.run_for(300, 10);
    rig
}

// ── Boot ──────────────────────────────────────────────────────

#[test]
fn boot_opens_serial_and_enters_normal() {
    let rig = Rig::booted();
    assert_eq!(rig.controller.mode(), ModeId::Normal);
    assert!(rig.serial.open);

    let calls = rig.calls();
    assert!(calls.contains(&Call::SerialOpen(ECU_BAUD)));
    assert!(calls.contains(&Call::SetRendering(true)));
    assert!(calls.contains(&Call::SetScreen(ScreenId::Dashboard)));
    assert_eq!(rig.sink.events.last(), Some(&AppEvent::Started(ModeId::Normal)));
}

#[test]
fn boot_discards_bytes_already_buffered() {
    let mut rig = Rig::new();
    rig.serial.inject(&[0xAA; 40]);
    rig.serial.open = true;
    rig.boot();
    assert_eq!(rig.serial.pending(), 0);
    assert_eq!(rig.controller.link().rx_bytes(), 0);
}

// ── Portal entry ──────────────────────────────────────────────

#[test]
fn client_connect_enters_portal_in_order() {
    let mut rig = recording_rig();
    rig.clear_calls();

    rig.set_clients(1);

    assert_eq!(rig.controller.mode(), ModeId::Portal);
    assert!(!rig.controller.is_recording());
    assert!(!rig.serial.open);

    let calls = rig.calls();
    let serial_closed = position(&calls, &Call::SerialClose);
    let file_closed = position(&calls, &Call::FileClose("/log_00001.csv".into()));
    let suspended = position(&calls, &Call::SetRendering(false));
    let info_screen = position(&calls, &Call::PortalScreen);
    assert!(serial_closed < file_closed);
    assert!(file_closed < suspended);
    assert!(suspended < info_screen);

    assert!(
        rig.sink
            .events
            .contains(&AppEvent::ModeChanged { from: ModeId::Normal, to: ModeId::Portal })
    );
    assert!(rig.sink.events.contains(&AppEvent::RecordingStopped));
}

#[test]
fn nothing_polls_logs_or_renders_after_portal_entry() {
    let mut rig = recording_rig();
    let rows_before = rig.controller.session().rows();
    rig.set_clients(1);
    rig.clear_calls();

    rig.run_for(2_000, 10);

    let calls = rig.calls();
    assert!(!calls.iter().any(|c| matches!(c, Call::SerialWrite(_))));
    assert!(!calls.iter().any(|c| matches!(c, Call::RenderMetrics | Call::Status(_))));
    assert_eq!(rig.controller.session().rows(), rows_before);

    let gates = rig.controller.gates();
    assert!(!gates.serial_poll_allowed);
    assert!(!gates.render_allowed);
    assert!(!gates.logging_allowed);
}

#[test]
fn portal_screen_is_drawn_once_and_display_never_blanks() {
    let mut rig = Rig::booted();
    rig.set_clients(2);
    rig.run_for(1_000, 10);
    assert_eq!(rig.count(&Call::PortalScreen), 1);
    // Rendering is suspended, never the panel itself.
    assert_eq!(rig.count(&Call::SetRendering(false)), 1);
}

// ── Portal exit ───────────────────────────────────────────────

#[test]
fn last_client_leaving_restores_normal() {
    let mut rig = Rig::booted();
    rig.feed(&snapshot(2500));
    rig.run_for(50, 10);
    assert!(rig.controller.link().is_valid());

    rig.set_clients(1);
    // Bytes that piled up while the port was closed.
    rig.serial.inject(&[0x6E, 0x32, 0x4B, 0x01, 0x02]);
    rig.clear_calls();

    rig.set_clients(0);

    assert_eq!(rig.controller.mode(), ModeId::Normal);
    assert!(rig.serial.open);
    assert_eq!(rig.count(&Call::SerialOpen(ECU_BAUD)), 1);
    assert_eq!(rig.count(&Call::Invalidate), 1);
    assert!(!rig.controller.link().is_valid());
    assert!(rig.controller.link().decoder_idle());

    let calls = rig.calls();
    let reopened = position(&calls, &Call::SerialOpen(ECU_BAUD));
    let resumed = position(&calls, &Call::SetRendering(true));
    assert!(reopened < resumed);
}

#[test]
fn staleness_clock_restarts_on_portal_exit() {
    let mut rig = Rig::booted();
    rig.set_clients(1);
    rig.run_for(5_000, 50);
    rig.clients.count = 0;
    while rig.controller.mode() == ModeId::Portal {
        rig.now += 10;
        rig.tick();
    }
    let now = rig.now;
    assert!(rig.controller.link().age_ms(now) < 20);
    assert!(!rig.controller.link().is_valid());
}

#[test]
fn logging_is_gated_on_the_transition_tick_only() {
    let mut rig = Rig::booted();
    rig.set_clients(1);
    rig.clients.count = 0;
    while rig.controller.mode() == ModeId::Portal {
        rig.now += 10;
        rig.tick();
    }
    let gates = rig.controller.gates();
    assert!(gates.serial_poll_allowed);
    assert!(gates.render_allowed);
    assert!(!gates.logging_allowed);

    rig.now += 10;
    rig.tick();
    assert!(rig.controller.gates().logging_allowed);
}

#[test]
fn serial_reopen_failure_leaves_link_stale() {
    let mut rig = Rig::booted();
    rig.set_clients(1);
    rig.serial.fail_open = true;
    rig.set_clients(0);

    assert_eq!(rig.controller.mode(), ModeId::Normal);
    rig.run_for(1_000, 10);
    assert!(!rig.controller.link().is_valid());
    assert_eq!(rig.controller.polls_sent(), 0);
}

// ── Sampling ──────────────────────────────────────────────────

#[test]
fn flicker_between_samples_is_ignored() {
    let mut rig = Rig::booted();
    rig.run_for(10, 10); // first sample at t=10 sees 0

    rig.clients.count = 1;
    rig.run_for(100, 10);
    rig.clients.count = 0;
    rig.run_for(1_000, 10);

    assert_eq!(rig.controller.mode(), ModeId::Normal);
    assert!(!rig.sink.events.iter().any(|e| matches!(e, AppEvent::ModeChanged { .. })));
}

#[test]
fn any_client_count_above_zero_holds_portal() {
    let mut rig = Rig::booted();
    rig.set_clients(1);
    rig.set_clients(2);
    rig.set_clients(1);
    assert_eq!(rig.controller.mode(), ModeId::Portal);
    let changes = rig
        .sink
        .events
        .iter()
        .filter(|e| matches!(e, AppEvent::ModeChanged { .. }))
        .count();
    assert_eq!(changes, 1);
}

// ── UI events in portal ───────────────────────────────────────

#[test]
fn ui_events_are_ignored_in_portal() {
    let mut rig = Rig::booted();
    rig.set_clients(1);
    rig.clear_calls();

    rig.event(DashEvent::OpenSettings);
    rig.event(DashEvent::ToggleRecording);

    assert_eq!(rig.controller.screen(), ScreenId::Dashboard);
    assert!(rig.calls().is_empty());
    assert!(!rig.controller.is_recording());
}

#[test]
fn shift_screen_does_not_survive_portal_round_trip() {
    let mut rig = Rig::booted();
    rig.feed(&snapshot(7000));
    rig.run_for(50, 10);
    assert_eq!(rig.controller.screen(), ScreenId::Shift);

    rig.set_clients(1);
    rig.set_clients(0);

    assert_eq!(rig.controller.screen(), ScreenId::Dashboard);
    assert!(!rig.controller.shift().is_active());
}

#[test]
fn portal_save_leaves_the_display_alone() {
    let mut rig = Rig::booted();
    rig.set_clients(1);
    assert!(!rig.controller.gates().render_allowed);
    rig.clear_calls();

    let req = route(Method::Post, "/save", b"view=1&logEn=1&shiftEn=1&shiftRpm=6500").unwrap();
    assert_eq!(rig.serve(req).status, 303);
    assert_eq!(rig.controller.settings().view, ViewMode::Bar);
    assert!(rig.calls().is_empty(), "{:?}", rig.calls());
    assert_eq!(rig.controller.editor().flash_message(), None);

    // The saved layout is loaded before the forced redraw.
    rig.set_clients(0);
    let calls = rig.calls();
    assert!(position(&calls, &Call::SetView(ViewMode::Bar)) < position(&calls, &Call::Invalidate));
}
