//! On-device settings editor driven through `DashEvent`s.

use super::mock_hw::{Call, Rig};

use espdash::app::commands::DashEvent;
use espdash::app::events::AppEvent;
use espdash::app::ports::ScreenId;
use espdash::app::service::DashboardController;
use espdash::config::{Channel, DashSettings, RPM_MAX, SAVED_FLASH_MS, ThresholdTable, ViewMode};
use espdash::portal::PortalInfo;

fn afr_min(rig: &Rig) -> f32 {
    rig.controller.settings().thresholds.entry(Channel::Afr).min()
}

#[test]
fn open_and_close_settings() {
    let mut rig = Rig::booted();
    rig.event(DashEvent::OpenSettings);
    assert_eq!(rig.controller.screen(), ScreenId::Settings);
    assert!(rig.calls().contains(&Call::ShowSettings));

    rig.clear_calls();
    rig.event(DashEvent::CloseSettings);
    assert_eq!(rig.controller.screen(), ScreenId::Dashboard);
    assert!(rig.calls().contains(&Call::Invalidate));
}

#[test]
fn no_ui_frames_while_in_settings() {
    let mut rig = Rig::booted();
    rig.event(DashEvent::OpenSettings);
    rig.clear_calls();
    rig.run_for(500, 10);
    assert_eq!(rig.count(&Call::RenderMetrics), 0);
}

#[test]
fn step_nudges_selected_bound() {
    let mut rig = Rig::booted();
    rig.event(DashEvent::OpenSettings);
    rig.event(DashEvent::SelectRow(0));
    rig.event(DashEvent::Increment);
    assert!((afr_min(&rig) - 10.1).abs() < 1e-4);

    rig.event(DashEvent::ToggleBound);
    rig.event(DashEvent::Decrement);
    let max = rig.controller.settings().thresholds.entry(Channel::Afr).max();
    assert!((max - 16.4).abs() < 1e-4);

    let view = rig.render.last_settings.clone().unwrap();
    assert_eq!(view.rows[0].value.as_str(), "MAX 10.1..16.4");
    assert!(view.rows[0].selected);
}

#[test]
fn repeated_steps_do_not_drift() {
    let mut rig = Rig::booted();
    rig.event(DashEvent::SelectRow(0));
    for _ in 0..30 {
        rig.event(DashEvent::Increment);
    }
    assert_eq!(afr_min(&rig), 13.0);
}

#[test]
fn min_cannot_pass_max() {
    let mut rig = Rig::booted();
    rig.event(DashEvent::SelectRow(Channel::Clt.index()));
    for _ in 0..200 {
        rig.event(DashEvent::Increment);
    }
    let e = rig.controller.settings().thresholds.entry(Channel::Clt);
    assert!(e.min() <= e.max());
}

#[test]
fn shift_rpm_is_clamped() {
    let mut rig = Rig::booted();
    rig.event(DashEvent::SelectRow(6));
    for _ in 0..30 {
        rig.event(DashEvent::Increment);
    }
    assert_eq!(rig.controller.settings().shift.rpm(), RPM_MAX);
}

#[test]
fn view_row_switches_layout() {
    let mut rig = Rig::booted();
    rig.event(DashEvent::SelectRow(7));
    rig.event(DashEvent::Increment);
    assert_eq!(rig.controller.settings().view, ViewMode::Bar);
    assert!(rig.calls().contains(&Call::SetView(ViewMode::Bar)));
}

#[test]
fn save_persists_and_flashes() {
    let mut rig = Rig::booted();
    rig.event(DashEvent::SelectRow(0));
    rig.event(DashEvent::Increment);
    rig.event(DashEvent::SetEnabled { row: Channel::Tps.index(), on: true });
    rig.event(DashEvent::Save);

    assert!(rig.sink.events.contains(&AppEvent::SettingsSaved));
    assert!(rig.calls().contains(&Call::Flash(Some("SAVED".into()))));
    assert_eq!(rig.controller.editor().flash_message(), Some("SAVED"));

    let stored = DashSettings::load(&mut rig.prefs).unwrap();
    assert_eq!(&stored, rig.controller.settings());
    assert!(stored.thresholds.entry(Channel::Tps).enabled());

    rig.clear_calls();
    rig.run_for(SAVED_FLASH_MS + 20, 10);
    assert!(rig.calls().contains(&Call::Flash(None)));
    assert_eq!(rig.controller.editor().flash_message(), None);
}

#[test]
fn unsaved_edits_are_lost_on_reboot() {
    let mut rig = Rig::booted();
    rig.event(DashEvent::SelectRow(0));
    rig.event(DashEvent::Increment);

    rig.controller = DashboardController::new(PortalInfo::default());
    rig.boot();
    assert_eq!(afr_min(&rig), 10.0);
}

#[test]
fn saved_settings_survive_reboot() {
    let mut rig = Rig::booted();
    rig.event(DashEvent::SelectRow(7));
    rig.event(DashEvent::Increment);
    rig.event(DashEvent::Save);

    rig.controller = DashboardController::new(PortalInfo::default());
    rig.clear_calls();
    rig.boot();
    assert_eq!(rig.controller.settings().view, ViewMode::Bar);
    assert!(rig.calls().contains(&Call::SetView(ViewMode::Bar)));
}

#[test]
fn restore_defaults_needs_confirmation() {
    let mut rig = Rig::booted();
    rig.event(DashEvent::SelectRow(0));
    rig.event(DashEvent::Increment);

    rig.event(DashEvent::RequestDefaults);
    assert!(rig.controller.editor().confirm_pending());
    assert!(rig.calls().iter().any(|c| matches!(c, Call::Toast(_))));

    rig.event(DashEvent::ConfirmDefaults(false));
    assert!((afr_min(&rig) - 10.1).abs() < 1e-4);

    // A stray confirmation without a request does nothing.
    rig.event(DashEvent::ConfirmDefaults(true));
    assert!((afr_min(&rig) - 10.1).abs() < 1e-4);

    rig.event(DashEvent::RequestDefaults);
    rig.event(DashEvent::ConfirmDefaults(true));
    assert_eq!(rig.controller.settings().thresholds, ThresholdTable::defaults());
    assert!(rig.calls().contains(&Call::Flash(Some("DEFAULT".into()))));
    assert!(rig.sink.events.contains(&AppEvent::DefaultsRestored));

    let stored = DashSettings::load(&mut rig.prefs).unwrap();
    assert_eq!(stored.thresholds, ThresholdTable::defaults());
}

#[test]
fn warnings_follow_edited_windows() {
    use super::mock_hw::snapshot;

    let mut rig = Rig::booted();
    // IAT window -10..60; 30 °C is fine until max drops below it.
    rig.event(DashEvent::SelectRow(Channel::Iat.index()));
    rig.event(DashEvent::ToggleBound);
    for _ in 0..35 {
        rig.event(DashEvent::Decrement);
    }
    rig.feed(&snapshot(3000));
    rig.run_for(70, 10);
    let m = rig.render.last_metrics.clone().unwrap();
    assert!(m.channel(Channel::Iat).is_warning());
}
