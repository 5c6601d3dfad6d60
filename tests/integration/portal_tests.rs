//! Configuration portal requests executed by the controller, including the
//! full httpd-thread → queue → main-loop round trip.

use std::thread;

use super::mock_hw::{Rig, snapshot};

use espdash::adapters::http_portal::portal_channel;
use espdash::app::commands::DashEvent;
use espdash::app::events::AppEvent;
use espdash::config::{Channel, DashSettings, ViewMode};
use espdash::datalog::LogStartError;
use espdash::fsm::ModeId;
use espdash::portal::{LogRequest, Method, PortalRequest, route};

fn save_request(body: &str) -> PortalRequest {
    route(Method::Post, "/save", body.as_bytes()).unwrap()
}

/// Rig with one finished recording on the card.
fn rig_with_log() -> Rig {
    let mut rig = Rig::booted();
    rig.feed(&snapshot(3000));
    rig.event(DashEvent::ToggleRecording);
    rig.run_for(250, 10);
    rig.event(DashEvent::ToggleRecording);
    rig
}

// ── Settings ──────────────────────────────────────────────────

#[test]
fn settings_are_served_as_json() {
    let mut rig = Rig::booted();
    let r = rig.serve(PortalRequest::Settings);
    assert_eq!(r.status, 200);
    assert_eq!(r.content_type, "application/json");
    let parsed: DashSettings = serde_json::from_slice(&r.body).unwrap();
    assert_eq!(&parsed, rig.controller.settings());
}

#[test]
fn form_update_is_applied_and_persisted() {
    let mut rig = Rig::booted();
    let r = rig.serve(save_request(
        "view=1&logEn=0&shiftEn=1&shiftRpm=7200&w0e=1&w0min=11.5&w0max=15.5&w4e=1&w4min=0&w4max=90",
    ));
    assert_eq!(r.status, 303);
    assert_eq!(r.location, Some("/?saved=1"));

    let s = rig.controller.settings();
    assert_eq!(s.view, ViewMode::Bar);
    assert!(!s.logging_enabled);
    assert_eq!(s.shift.rpm(), 7200);
    assert_eq!(s.thresholds.entry(Channel::Afr).min(), 11.5);
    assert!(s.thresholds.entry(Channel::Tps).enabled());
    // Untouched window keeps its value.
    assert_eq!(s.thresholds.entry(Channel::Vbat).max(), 15.2);

    let stored = DashSettings::load(&mut rig.prefs).unwrap();
    assert_eq!(&stored, rig.controller.settings());
    assert!(rig.sink.events.contains(&AppEvent::SettingsSaved));
}

#[test]
fn json_update_is_accepted() {
    let mut rig = Rig::booted();
    let body = r#"{"view":"Ring","logEn":true,"shiftEn":false,"shiftRpm":99999}"#;
    let r = rig.serve(save_request(body));
    assert_eq!(r.status, 303);
    assert!(!rig.controller.settings().shift.enabled);
    assert_eq!(rig.controller.settings().shift.rpm(), 8000);
}

#[test]
fn incomplete_form_is_rejected_at_routing() {
    let req = save_request("view=1&logEn=1");
    assert!(matches!(req, PortalRequest::Invalid(400, _)));
}

#[test]
fn nan_bound_never_reaches_the_settings() {
    let mut rig = Rig::booted();
    let req = save_request("view=0&logEn=1&shiftEn=1&shiftRpm=6500&w0e=1&w0min=NaN&w0max=16.5");
    assert!(matches!(req, PortalRequest::Invalid(400, _)));
    let r = rig.serve(req);
    assert_eq!(r.status, 400);

    let afr = rig.controller.settings().thresholds.entry(Channel::Afr);
    assert!(afr.min() <= afr.max());
    let r = rig.serve(PortalRequest::Settings);
    let parsed: DashSettings = serde_json::from_slice(&r.body).unwrap();
    assert_eq!(&parsed, rig.controller.settings());
}

// ── Recording ─────────────────────────────────────────────────

#[test]
fn rec_without_card_is_500() {
    let mut rig = Rig::booted();
    rig.storage.present = false;
    let r = rig.serve(PortalRequest::ToggleRecording);
    assert_eq!(r.status, 500);
    assert_eq!(r.body, b"SD not ready");
}

#[test]
fn rec_cannot_start_while_portal_holds_the_card() {
    let mut rig = Rig::booted();
    rig.set_clients(1);
    assert_eq!(rig.controller.mode(), ModeId::Portal);

    let r = rig.serve(PortalRequest::ToggleRecording);
    assert_eq!(r.status, 303);
    assert_eq!(r.location, Some("/"));
    assert!(!rig.controller.is_recording());
    assert!(
        rig.sink
            .events
            .contains(&AppEvent::RecordingRefused(LogStartError::StorageBusy))
    );
}

#[test]
fn rec_stops_an_open_recording() {
    let mut rig = Rig::booted();
    rig.event(DashEvent::ToggleRecording);
    let r = rig.serve(PortalRequest::ToggleRecording);
    assert_eq!(r.status, 303);
    assert!(!rig.controller.is_recording());
}

// ── Downloads ─────────────────────────────────────────────────

#[test]
fn download_by_index() {
    let mut rig = rig_with_log();
    let r = rig.serve(PortalRequest::Download(LogRequest::Index(1)));
    assert_eq!(r.status, 200);
    assert_eq!(r.content_type, "text/csv");
    assert_eq!(r.attachment.as_deref(), Some("log_00001.csv"));
    assert!(r.body.starts_with(b"ms,rpm,"));
}

#[test]
fn download_by_name() {
    let mut rig = rig_with_log();
    let r = rig.serve(PortalRequest::Download(LogRequest::Name("log_00001.csv".into())));
    assert_eq!(r.status, 200);
}

#[test]
fn download_refused_while_recording() {
    let mut rig = rig_with_log();
    rig.event(DashEvent::ToggleRecording);
    let r = rig.serve(PortalRequest::Download(LogRequest::Index(1)));
    assert_eq!(r.status, 409);
    assert_eq!(r.body, b"Stop REC before download");
}

#[test]
fn download_rejects_traversal_and_missing() {
    let mut rig = rig_with_log();
    let r = rig.serve(PortalRequest::Download(LogRequest::Name("../secret".into())));
    assert_eq!(r.status, 400);
    let r = rig.serve(PortalRequest::Download(LogRequest::Index(42)));
    assert_eq!(r.status, 404);
    let r = rig.serve(PortalRequest::Download(LogRequest::Index(0)));
    assert_eq!(r.status, 400);
}

#[test]
fn latest_download_follows_the_index() {
    let mut rig = Rig::booted();
    let r = rig.serve(PortalRequest::DownloadLatest);
    assert_eq!(r.status, 404);
    assert_eq!(r.body, b"No logs yet");

    let mut rig = rig_with_log();
    rig.event(DashEvent::ToggleRecording);
    rig.run_for(100, 10);
    rig.event(DashEvent::ToggleRecording);
    let r = rig.serve(PortalRequest::DownloadLatest);
    assert_eq!(r.status, 200);
    assert_eq!(r.attachment.as_deref(), Some("log_00002.csv"));
}

// ── Log listing ───────────────────────────────────────────────

#[test]
fn log_listing_shows_csv_files_by_name() {
    let mut rig = rig_with_log();
    rig.storage.put("/notes.txt", b"hi");
    rig.storage.put("/log_00000.csv", b"ms\n");

    let r = rig.serve(route(Method::Get, "/logs", b"").unwrap());
    assert_eq!(r.status, 200);
    assert_eq!(r.content_type, "application/json");
    let listed: Vec<serde_json::Value> = serde_json::from_slice(&r.body).unwrap();
    let names: Vec<&str> = listed.iter().filter_map(|f| f["name"].as_str()).collect();
    assert_eq!(names, ["log_00000.csv", "log_00001.csv"]);
    let size = rig.storage.contents("/log_00001.csv").unwrap().len() as u64;
    assert_eq!(listed[1]["size"].as_u64(), Some(size));
}

#[test]
fn log_listing_refused_while_recording_or_without_card() {
    let mut rig = rig_with_log();
    rig.event(DashEvent::ToggleRecording);
    let r = rig.serve(PortalRequest::ListLogs);
    assert_eq!(r.status, 409);
    rig.event(DashEvent::ToggleRecording);

    rig.storage.present = false;
    let r = rig.serve(PortalRequest::ListLogs);
    assert_eq!(r.status, 500);
    assert_eq!(r.body, b"SD not ready");
}

// ── Queue round trip ──────────────────────────────────────────

#[test]
fn http_thread_is_answered_by_the_main_loop() {
    let mut rig = rig_with_log();
    rig.set_clients(1);

    let (client, queue) = portal_channel();
    let handler = thread::spawn(move || {
        let settings = client.call(Method::Get, "/settings", b"");
        let download = client.call(Method::Get, "/download?i=1", b"");
        let missing = client.call(Method::Get, "/nope", b"");
        (settings, download, missing)
    });

    let mut served = 0;
    while served < 2 {
        rig.now += 2;
        rig.tick();
        let now = rig.now;
        let (controller, mut ports) = rig.split();
        served += queue.serve(|req| controller.serve_portal(req, now, &mut ports));
        thread::yield_now();
    }

    let (settings, download, missing) = handler.join().unwrap();
    assert_eq!(settings.status, 200);
    assert_eq!(download.status, 200);
    assert_eq!(missing.status, 404);
    assert_eq!(rig.controller.mode(), ModeId::Portal);
}
