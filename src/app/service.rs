//! Dashboard controller: the hexagonal core.
//!
//! [`DashboardController`] owns every piece of engine state: settings, the
//! mode FSM, the ECU link, the shift indicator, the logging session and the
//! settings editor.  It is driven from one cooperative loop; every call
//! borrows the adapters through [`Ports`], so the whole controller runs
//! against mocks on the host.
//!
//! ```text
//!  SerialPort ──▶ ┌──────────────────────────────┐ ──▶ RenderPort
//! ClientMonitor ─▶│     DashboardController      │ ──▶ StoragePort
//!   DashEvent ──▶ │ Mode FSM · ECU link · Shift  │ ──▶ PrefsPort
//! PortalRequest ─▶│ Logging · Settings editor    │ ──▶ EventSink
//!                 └──────────────────────────────┘
//! ```

use log::{debug, info, warn};

use crate::config::{
    CLIENT_CHECK_MS, DashSettings, ECU_BAUD, MAX_SERIAL_BYTES_PER_TICK, STATUS_UPDATE_MS, ThresholdTable,
    UI_UPDATE_MS,
};
use crate::datalog::{LogStartError, LoggingSession};
use crate::ecu::EcuLink;
use crate::fsm::states::build_mode_table;
use crate::fsm::{Fsm, Gates, ModeContext, ModeId};
use crate::metrics::{DashMetrics, evaluate};
use crate::portal::{
    DownloadError, LogRequest, PortalInfo, PortalRequest, PortalResponse, is_csv_name, latest_log_path,
    resolve_log_path,
};
use crate::scheduler::{Cadence, PollScheduler};
use crate::settings::{EditOutcome, SettingsEditor};
use crate::shift::{ShiftEvent, ShiftIndicator};

use super::commands::DashEvent;
use super::events::AppEvent;
use super::ports::{ConfigError, Ports, ScreenId, StatusLine};

// ───────────────────────────────────────────────────────────────
// DashboardController
// ───────────────────────────────────────────────────────────────

pub struct DashboardController {
    settings: DashSettings,
    fsm: Fsm,
    link: EcuLink,
    poll: PollScheduler,
    shift: ShiftIndicator,
    session: LoggingSession,
    editor: SettingsEditor,
    portal: PortalInfo,

    /// Screen currently loaded on the display.
    screen: ScreenId,
    /// Where the display goes when the shift screen lets go of it.
    screen_before_shift: Option<ScreenId>,

    clients: u8,
    client_check: Cadence,
    ui_update: Cadence,
    status_update: Cadence,
    gates: Gates,
    warning_mask: u8,
    /// Set while a portal request is being served.
    storage_busy: bool,
    tick_count: u64,
}

impl DashboardController {
    /// Does not touch any port; call [`boot`](Self::boot) next.
    pub fn new(portal: PortalInfo) -> Self {
        Self {
            settings: DashSettings::default(),
            fsm: Fsm::new(build_mode_table(), ModeId::Normal),
            link: EcuLink::new(),
            poll: PollScheduler::new(),
            shift: ShiftIndicator::new(),
            session: LoggingSession::new(),
            editor: SettingsEditor::new(),
            portal,
            screen: ScreenId::Dashboard,
            screen_before_shift: None,
            clients: 0,
            client_check: Cadence::new(CLIENT_CHECK_MS),
            ui_update: Cadence::new(UI_UPDATE_MS),
            status_update: Cadence::new(STATUS_UPDATE_MS),
            gates: Gates::for_mode(ModeId::Normal, false),
            warning_mask: 0,
            storage_busy: false,
            tick_count: 0,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Load settings, open the ECU link, flush anything already buffered
    /// and enter Normal mode.
    pub fn boot(&mut self, now_ms: u64, ports: &mut Ports<'_>) {
        self.settings = DashSettings::load(ports.prefs).unwrap_or_else(|e| {
            warn!("BOOT: settings unavailable ({}), using defaults", e);
            DashSettings::default()
        });

        if let Err(e) = ports.serial.open(ECU_BAUD) {
            warn!("BOOT: serial open failed ({}), link stays stale", e);
        }
        let mut flushed = 0;
        while flushed < MAX_SERIAL_BYTES_PER_TICK && ports.serial.read_byte().is_some() {
            flushed += 1;
        }
        self.link.reset(now_ms);

        ports.render.set_recording(false);

        let Self {
            settings,
            fsm,
            link,
            session,
            screen,
            portal,
            clients,
            ..
        } = self;
        let mut ctx = ModeContext {
            now_ms,
            clients: *clients,
            serial: &mut *ports.serial,
            storage: &mut *ports.storage,
            render: &mut *ports.render,
            sink: &mut *ports.sink,
            link,
            session,
            screen,
            portal,
            view: settings.view,
        };
        fsm.start(&mut ctx);

        ports.sink.emit(&AppEvent::Started(self.fsm.current_mode()));
        info!(
            "BOOT: fw {} ready ({} stale bytes flushed)",
            self.portal.version, flushed
        );
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// Run one loop iteration and return the gates it ran under.
    ///
    /// Order: client sampling, mode arbitration, gates, serial drain, poll,
    /// staleness, shift indicator, UI frame, status strip, flash expiry,
    /// log append.  In Portal mode everything after the gates is skipped.
    pub fn tick(&mut self, now_ms: u64, ports: &mut Ports<'_>) -> Gates {
        self.tick_count += 1;

        // 1. Client sampling (never blocks)
        if self.client_check.due(now_ms) {
            self.clients = ports.clients.connected_clients();
        }

        // 2. Mode arbitration
        let prev = self.fsm.current_mode();
        let transitioned = {
            let Self {
                settings,
                fsm,
                link,
                session,
                screen,
                portal,
                clients,
                ..
            } = self;
            let mut ctx = ModeContext {
                now_ms,
                clients: *clients,
                serial: &mut *ports.serial,
                storage: &mut *ports.storage,
                render: &mut *ports.render,
                sink: &mut *ports.sink,
                link,
                session,
                screen,
                portal,
                view: settings.view,
            };
            fsm.tick(&mut ctx)
        };
        let mode = self.fsm.current_mode();
        if transitioned {
            ports.sink.emit(&AppEvent::ModeChanged { from: prev, to: mode });
            self.on_mode_changed(mode);
        }

        // 3. Gates
        let gates = Gates::for_mode(mode, transitioned);
        self.gates = gates;
        if mode == ModeId::Portal {
            return gates;
        }

        // 4. Serial drain
        let was_valid = self.link.is_valid();
        self.link.drain(ports.serial, self.settings.afr_format, now_ms);

        // 5. Poll
        self.poll.tick(
            now_ms,
            gates.serial_poll_allowed,
            self.link.decoder_idle(),
            ports.serial,
        );

        // 6. Staleness
        self.link.refresh(now_ms);
        if self.link.is_valid() != was_valid {
            ports.sink.emit(&AppEvent::LinkChanged(self.link.is_valid()));
        }

        // 7. Shift indicator
        if gates.render_allowed {
            self.update_shift(now_ms, ports);
        }

        // 8. UI frame, latest snapshot only
        if gates.render_allowed
            && matches!(self.screen, ScreenId::Dashboard | ScreenId::Shift)
            && self.ui_update.due(now_ms)
        {
            let metrics = self.metrics();
            ports.render.render_metrics(&metrics);
            let mask = metrics.warning_mask();
            if mask != self.warning_mask {
                self.warning_mask = mask;
                ports.sink.emit(&AppEvent::WarningsChanged(mask));
            }
        }

        // 9. Status strip
        if gates.render_allowed && self.status_update.due(now_ms) {
            let status = self.status_line(now_ms, ports.storage.is_present());
            ports.render.set_status(&status);
        }

        // 10. Flash expiry
        if self.editor.expire_flash(now_ms) {
            ports.render.flash_message(None);
        }

        // 11. Logging.  Rows keep coming while the link is down, zeroed.
        if self.session.is_recording() {
            let snap = self.link.live().copied().unwrap_or_default();
            let present = ports.storage.is_present();
            self.session.append(&snap, now_ms, present, gates.logging_allowed);
        }

        gates
    }

    // ── UI events ─────────────────────────────────────────────

    /// Dispatch one operator action.  Ignored while in Portal mode.
    pub fn handle_event(&mut self, event: DashEvent, now_ms: u64, ports: &mut Ports<'_>) {
        if self.fsm.current_mode() == ModeId::Portal {
            debug!("UI: {:?} ignored in portal mode", event);
            return;
        }

        match event {
            DashEvent::ToggleRecording => {
                if let Err(reason) = self.toggle_recording(now_ms, ports) {
                    ports.render.show_toast("Recording", &reason.to_string());
                }
            }
            DashEvent::OpenSettings => {
                self.show_screen(ScreenId::Settings, ports);
                self.refresh_settings(ports);
            }
            DashEvent::CloseSettings => {
                self.show_screen(ScreenId::Dashboard, ports);
                ports.render.invalidate();
            }
            DashEvent::SelectRow(idx) => {
                self.editor.select_row(idx);
                self.refresh_settings(ports);
            }
            DashEvent::ToggleBound => {
                self.editor.toggle_bound();
                self.refresh_settings(ports);
            }
            DashEvent::Increment | DashEvent::Decrement => {
                let up = event == DashEvent::Increment;
                let outcome = self.editor.step(&mut self.settings, up);
                self.after_edit(outcome, ports);
            }
            DashEvent::SetEnabled { row, on } => {
                let outcome = self.editor.set_enabled(&mut self.settings, row, on);
                self.after_edit(outcome, ports);
            }
            DashEvent::Save => {
                if self.commit_settings(now_ms, ports).is_ok() {
                    self.refresh_settings(ports);
                }
            }
            DashEvent::RequestDefaults => {
                if self.editor.request_defaults() {
                    ports
                        .render
                        .show_toast("Restore defaults", "Reset all warning windows?");
                }
            }
            DashEvent::ConfirmDefaults(apply) => {
                if self.editor.confirm_defaults(apply) {
                    self.restore_defaults(now_ms, ports);
                }
            }
        }
    }

    /// Start a recording, or stop the open one.  Returns the index of the
    /// new file, `None` after a stop.
    pub fn toggle_recording(&mut self, now_ms: u64, ports: &mut Ports<'_>) -> Result<Option<u32>, LogStartError> {
        if self.session.is_recording() {
            let present = ports.storage.is_present();
            self.session.stop(present);
            ports.render.set_recording(false);
            ports.sink.emit(&AppEvent::RecordingStopped);
            return Ok(None);
        }

        let busy = self.storage_busy || self.fsm.current_mode() == ModeId::Portal;
        match self
            .session
            .start(&mut self.settings, ports.storage, ports.prefs, busy, now_ms)
        {
            Ok(index) => {
                ports.render.set_recording(true);
                let mut path = crate::datalog::LogPath::new();
                let _ = path.push_str(self.session.path());
                ports.sink.emit(&AppEvent::RecordingStarted { index, path });
                Ok(Some(index))
            }
            Err(reason) => {
                info!("LOG: start refused: {}", reason);
                ports.sink.emit(&AppEvent::RecordingRefused(reason));
                Err(reason)
            }
        }
    }

    /// Persist every setting.  On success the "SAVED" flash is shown
    /// while the render gate is open.
    pub fn commit_settings(&mut self, now_ms: u64, ports: &mut Ports<'_>) -> Result<(), ConfigError> {
        match self.settings.save(ports.prefs) {
            Ok(()) => {
                if self.gates.render_allowed {
                    self.editor.flash("SAVED", now_ms);
                    ports.render.flash_message(Some("SAVED"));
                }
                ports.sink.emit(&AppEvent::SettingsSaved);
                Ok(())
            }
            Err(e) => {
                warn!("CFG: save failed: {}", e);
                ports.sink.emit(&AppEvent::SettingsSaveFailed(e));
                Err(e)
            }
        }
    }

    // ── Portal requests ───────────────────────────────────────

    /// Execute one request from the configuration network.  The storage is
    /// marked busy for the duration of the call.
    pub fn serve_portal(&mut self, request: PortalRequest, now_ms: u64, ports: &mut Ports<'_>) -> PortalResponse {
        self.storage_busy = true;
        let response = self.serve_portal_inner(request, now_ms, ports);
        self.storage_busy = false;
        debug!("PORTAL: -> {}", response.status);
        response
    }

    fn serve_portal_inner(&mut self, request: PortalRequest, now_ms: u64, ports: &mut Ports<'_>) -> PortalResponse {
        match request {
            PortalRequest::Settings => match serde_json::to_vec(&self.settings) {
                Ok(body) => PortalResponse::json(body),
                Err(e) => {
                    warn!("PORTAL: settings encode failed: {}", e);
                    PortalResponse::text(500, "Encode failed")
                }
            },
            PortalRequest::Apply(update) => {
                update.apply_to(&mut self.settings);
                // Otherwise the view is loaded when Normal mode resumes.
                if self.gates.render_allowed {
                    ports.render.set_view(self.settings.view);
                }
                match self.commit_settings(now_ms, ports) {
                    Ok(()) => PortalResponse::redirect("/?saved=1"),
                    Err(_) => PortalResponse::text(500, "Save failed"),
                }
            }
            PortalRequest::ToggleRecording => {
                if !ports.storage.is_present() {
                    return PortalResponse::refused(DownloadError::NotReady);
                }
                // A refusal is already reported through the event sink.
                let _ = self.toggle_recording(now_ms, ports);
                PortalResponse::redirect("/")
            }
            PortalRequest::Download(req) => self.download(Some(req), ports),
            PortalRequest::DownloadLatest => self.download(None, ports),
            PortalRequest::ListLogs => self.list_logs(ports),
            PortalRequest::Invalid(status, message) => PortalResponse::text(status, &message),
        }
    }

    /// `None` asks for the newest completed log.
    fn download(&mut self, req: Option<LogRequest>, ports: &mut Ports<'_>) -> PortalResponse {
        if !ports.storage.is_present() {
            return PortalResponse::refused(DownloadError::NotReady);
        }
        if self.session.is_recording() {
            return PortalResponse::refused(DownloadError::Recording);
        }
        let path = match req {
            Some(req) => resolve_log_path(&req),
            None => latest_log_path(self.settings.log_index),
        };
        let path = match path {
            Ok(p) => p,
            Err(e) => return PortalResponse::refused(e),
        };
        if !ports.storage.exists(&path) {
            return PortalResponse::refused(DownloadError::NotFound);
        }
        match ports.storage.read(&path) {
            Ok(body) => {
                info!("PORTAL: sending {} ({} B)", path, body.len());
                PortalResponse::csv(&path, body)
            }
            Err(e) => {
                warn!("PORTAL: read {} failed: {}", path, e);
                PortalResponse::refused(DownloadError::NotFound)
            }
        }
    }

    /// Log files on the card, sorted by name, as `[{name, size}]`.
    fn list_logs(&self, ports: &Ports<'_>) -> PortalResponse {
        if !ports.storage.is_present() {
            return PortalResponse::refused(DownloadError::NotReady);
        }
        if self.session.is_recording() {
            return PortalResponse::refused(DownloadError::Recording);
        }
        let mut files = match ports.storage.list() {
            Ok(files) => files,
            Err(e) => {
                warn!("PORTAL: listing failed: {}", e);
                return PortalResponse::text(500, "Unable to open SD root");
            }
        };
        files.retain(|f| is_csv_name(&f.name));
        files.sort_by(|a, b| a.name.cmp(&b.name));
        match serde_json::to_vec(&files) {
            Ok(body) => PortalResponse::json(body),
            Err(e) => {
                warn!("PORTAL: listing encode failed: {}", e);
                PortalResponse::text(500, "Encode failed")
            }
        }
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn mode(&self) -> ModeId {
        self.fsm.current_mode()
    }

    /// Gates from the most recent tick.
    pub fn gates(&self) -> Gates {
        self.gates
    }

    pub fn settings(&self) -> &DashSettings {
        &self.settings
    }

    pub fn link(&self) -> &EcuLink {
        &self.link
    }

    pub fn screen(&self) -> ScreenId {
        self.screen
    }

    pub fn shift(&self) -> &ShiftIndicator {
        &self.shift
    }

    pub fn editor(&self) -> &SettingsEditor {
        &self.editor
    }

    pub fn is_recording(&self) -> bool {
        self.session.is_recording()
    }

    pub fn session(&self) -> &LoggingSession {
        &self.session
    }

    pub fn clients(&self) -> u8 {
        self.clients
    }

    /// Poll requests sent since boot.
    pub fn polls_sent(&self) -> u32 {
        self.poll.sent()
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Evaluate the latest snapshot against the current thresholds.
    pub fn metrics(&self) -> DashMetrics {
        evaluate(self.link.live(), &self.settings.thresholds)
    }

    pub fn status_line(&self, now_ms: u64, storage_ok: bool) -> StatusLine {
        StatusLine {
            link_ok: self.link.is_valid(),
            rx_bytes: self.link.rx_bytes(),
            age_ms: self.link.age_ms(now_ms),
            storage_ok,
            recording: self.session.is_recording(),
        }
    }

    // ── Internal ──────────────────────────────────────────────

    fn on_mode_changed(&mut self, mode: ModeId) {
        // Shift and screen state do not survive a trip through the portal.
        self.shift = ShiftIndicator::new();
        self.screen_before_shift = None;
        self.warning_mask = 0;
        if mode == ModeId::Normal {
            self.ui_update.reset();
            self.status_update.reset();
        }
    }

    fn update_shift(&mut self, now_ms: u64, ports: &mut Ports<'_>) {
        let rpm = self.link.live().map_or(0, |s| s.rpm);
        match self
            .shift
            .update(&self.settings.shift, self.link.is_valid(), rpm, now_ms)
        {
            ShiftEvent::Entered => {
                self.screen_before_shift = Some(self.screen);
                self.screen = ScreenId::Shift;
                ports.render.set_screen(ScreenId::Shift);
                ports.render.set_shift_blink(true);
                ports.sink.emit(&AppEvent::ShiftChanged(true));
            }
            ShiftEvent::Exited => {
                let back = self.screen_before_shift.take().unwrap_or(ScreenId::Dashboard);
                self.screen = back;
                ports.render.set_shift_blink(false);
                ports.render.set_screen(back);
                ports.render.invalidate();
                ports.sink.emit(&AppEvent::ShiftChanged(false));
            }
            ShiftEvent::Blink(on) => ports.render.set_shift_blink(on),
            ShiftEvent::Unchanged => {}
        }
    }

    /// Load `screen`, or make it the restore target while the shift
    /// screen owns the display.
    fn show_screen(&mut self, screen: ScreenId, ports: &mut Ports<'_>) {
        if self.shift.is_active() {
            self.screen_before_shift = Some(screen);
            return;
        }
        self.screen = screen;
        ports.render.set_screen(screen);
    }

    fn refresh_settings(&self, ports: &mut Ports<'_>) {
        ports.render.show_settings(&self.editor.view(&self.settings));
    }

    fn after_edit(&mut self, outcome: EditOutcome, ports: &mut Ports<'_>) {
        match outcome {
            EditOutcome::Unchanged => return,
            EditOutcome::ViewChanged => ports.render.set_view(self.settings.view),
            EditOutcome::Changed => {}
        }
        self.refresh_settings(ports);
    }

    fn restore_defaults(&mut self, now_ms: u64, ports: &mut Ports<'_>) {
        self.settings.thresholds = ThresholdTable::defaults();
        if let Err(e) = self.settings.save_thresholds(ports.prefs) {
            warn!("CFG: defaults not persisted: {}", e);
            ports.sink.emit(&AppEvent::SettingsSaveFailed(e));
        }
        self.editor.flash("DEFAULT", now_ms);
        ports.render.flash_message(Some("DEFAULT"));
        ports.sink.emit(&AppEvent::DefaultsRestored);
        self.refresh_settings(ports);
    }
}
