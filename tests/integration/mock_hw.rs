//! Mock adapters for integration tests.
//!
//! Every port call is appended to one shared [`Journal`], so tests can
//! assert on cross-adapter ordering (serial closed before the log file,
//! log file before the render pipeline) as well as on per-adapter state.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use espdash::adapters::nvs::NvsPrefs;
use espdash::app::events::AppEvent;
use espdash::app::ports::{
    ClientMonitor, EventSink, LogFile, Ports, RenderPort, ScreenId, SerialError, SerialPort, StatusLine,
    StorageError, StoragePort, StoredFile,
};
use espdash::app::service::DashboardController;
use espdash::config::{AfrFormat, ViewMode};
use espdash::ecu::TelemetrySnapshot;
use espdash::ecu::codec::encode_frame;
use espdash::ecu::snapshot::encode_payload;
use espdash::metrics::DashMetrics;
use espdash::portal::PortalInfo;
use espdash::settings::SettingsView;

// ── Call journal ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    SerialOpen(u32),
    SerialClose,
    SerialWrite(u8),
    FileOpen(String),
    FileFlush(String),
    FileClose(String),
    RenderMetrics,
    SetScreen(ScreenId),
    Invalidate,
    SetRendering(bool),
    ShiftBlink(bool),
    PortalScreen,
    Status(StatusLine),
    SetView(ViewMode),
    ShowSettings,
    Toast(String),
    Flash(Option<String>),
    RecIndicator(bool),
}

pub type Journal = Rc<RefCell<Vec<Call>>>;

fn record(journal: &Journal, call: Call) {
    journal.borrow_mut().push(call);
}

// ── MockSerial ────────────────────────────────────────────────

pub struct MockSerial {
    journal: Journal,
    pub open: bool,
    pub fail_open: bool,
    rx: VecDeque<u8>,
    pub written: Vec<u8>,
}

#[allow(dead_code)]
impl MockSerial {
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            open: false,
            fail_open: false,
            rx: VecDeque::new(),
            written: Vec::new(),
        }
    }

    /// Queue bytes as if the ECU had sent them.
    pub fn inject(&mut self, bytes: &[u8]) {
        self.rx.extend(bytes.iter().copied());
    }

    pub fn pending(&self) -> usize {
        self.rx.len()
    }
}

impl SerialPort for MockSerial {
    fn open(&mut self, baud: u32) -> Result<(), SerialError> {
        record(&self.journal, Call::SerialOpen(baud));
        if self.fail_open {
            return Err(SerialError::OpenFailed);
        }
        self.open = true;
        Ok(())
    }

    fn close(&mut self) {
        record(&self.journal, Call::SerialClose);
        self.open = false;
        self.rx.clear();
    }

    fn available(&self) -> usize {
        if self.open { self.rx.len() } else { 0 }
    }

    fn read_byte(&mut self) -> Option<u8> {
        if !self.open {
            return None;
        }
        self.rx.pop_front()
    }

    fn write_byte(&mut self, byte: u8) -> Result<(), SerialError> {
        if !self.open {
            return Err(SerialError::NotOpen);
        }
        record(&self.journal, Call::SerialWrite(byte));
        self.written.push(byte);
        Ok(())
    }
}

// ── MockStorage ───────────────────────────────────────────────

type Files = Rc<RefCell<HashMap<String, Vec<u8>>>>;

pub struct MockStorage {
    journal: Journal,
    pub present: bool,
    pub fail_open: bool,
    files: Files,
}

struct MockLogFile {
    journal: Journal,
    path: String,
    files: Files,
}

#[allow(dead_code)]
impl MockStorage {
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            present: true,
            fail_open: false,
            files: Rc::new(RefCell::new(HashMap::new())),
        }
    }

    pub fn contents(&self, path: &str) -> Option<String> {
        self.files
            .borrow()
            .get(path)
            .map(|b| String::from_utf8_lossy(b).into_owned())
    }

    pub fn put(&mut self, path: &str, data: &[u8]) {
        self.files.borrow_mut().insert(path.to_string(), data.to_vec());
    }

    pub fn file_count(&self) -> usize {
        self.files.borrow().len()
    }
}

impl StoragePort for MockStorage {
    fn is_present(&self) -> bool {
        self.present
    }

    fn exists(&self, path: &str) -> bool {
        self.present && self.files.borrow().contains_key(path)
    }

    fn open_append(&mut self, path: &str) -> Result<Box<dyn LogFile>, StorageError> {
        if !self.present {
            return Err(StorageError::NotPresent);
        }
        if self.fail_open {
            return Err(StorageError::OpenFailed);
        }
        record(&self.journal, Call::FileOpen(path.to_string()));
        self.files.borrow_mut().entry(path.to_string()).or_default();
        Ok(Box::new(MockLogFile {
            journal: self.journal.clone(),
            path: path.to_string(),
            files: self.files.clone(),
        }))
    }

    fn read(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        self.files.borrow().get(path).cloned().ok_or(StorageError::NotFound)
    }

    fn list(&self) -> Result<Vec<StoredFile>, StorageError> {
        if !self.present {
            return Err(StorageError::NotPresent);
        }
        Ok(self
            .files
            .borrow()
            .iter()
            .map(|(path, data)| StoredFile {
                name: path.trim_start_matches('/').to_string(),
                size: data.len() as u64,
            })
            .collect())
    }
}

impl LogFile for MockLogFile {
    fn append(&mut self, data: &[u8]) -> Result<(), StorageError> {
        self.files
            .borrow_mut()
            .entry(self.path.clone())
            .or_default()
            .extend_from_slice(data);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), StorageError> {
        record(&self.journal, Call::FileFlush(self.path.clone()));
        Ok(())
    }

    fn close(self: Box<Self>) -> Result<(), StorageError> {
        record(&self.journal, Call::FileClose(self.path.clone()));
        Ok(())
    }
}

// ── MockRender ────────────────────────────────────────────────

pub struct MockRender {
    journal: Journal,
    pub last_metrics: Option<DashMetrics>,
    pub last_settings: Option<SettingsView>,
}

impl MockRender {
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            last_metrics: None,
            last_settings: None,
        }
    }
}

impl RenderPort for MockRender {
    fn render_metrics(&mut self, metrics: &DashMetrics) {
        record(&self.journal, Call::RenderMetrics);
        self.last_metrics = Some(metrics.clone());
    }

    fn set_screen(&mut self, screen: ScreenId) {
        record(&self.journal, Call::SetScreen(screen));
    }

    fn invalidate(&mut self) {
        record(&self.journal, Call::Invalidate);
    }

    fn set_rendering(&mut self, enabled: bool) {
        record(&self.journal, Call::SetRendering(enabled));
    }

    fn set_shift_blink(&mut self, on: bool) {
        record(&self.journal, Call::ShiftBlink(on));
    }

    fn draw_portal_screen(&mut self, _info: &PortalInfo) {
        record(&self.journal, Call::PortalScreen);
    }

    fn set_status(&mut self, status: &StatusLine) {
        record(&self.journal, Call::Status(*status));
    }

    fn set_view(&mut self, view: ViewMode) {
        record(&self.journal, Call::SetView(view));
    }

    fn show_settings(&mut self, view: &SettingsView) {
        record(&self.journal, Call::ShowSettings);
        self.last_settings = Some(view.clone());
    }

    fn show_toast(&mut self, _title: &str, message: &str) {
        record(&self.journal, Call::Toast(message.to_string()));
    }

    fn flash_message(&mut self, message: Option<&str>) {
        record(&self.journal, Call::Flash(message.map(str::to_string)));
    }

    fn set_recording(&mut self, active: bool) {
        record(&self.journal, Call::RecIndicator(active));
    }
}

// ── MockClients / RecordingSink ──────────────────────────────

#[derive(Default)]
pub struct MockClients {
    pub count: u8,
}

impl ClientMonitor for MockClients {
    fn connected_clients(&mut self) -> u8 {
        self.count
    }
}

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}

// ── Rig ───────────────────────────────────────────────────────

/// A controller plus one of every mock, with a simulated clock.
pub struct Rig {
    pub journal: Journal,
    pub serial: MockSerial,
    pub storage: MockStorage,
    pub prefs: NvsPrefs,
    pub render: MockRender,
    pub clients: MockClients,
    pub sink: RecordingSink,
    pub controller: DashboardController,
    pub now: u64,
}

#[allow(dead_code)]
impl Rig {
    pub fn new() -> Self {
        let journal: Journal = Rc::new(RefCell::new(Vec::new()));
        Self {
            serial: MockSerial::new(journal.clone()),
            storage: MockStorage::new(journal.clone()),
            prefs: NvsPrefs::new().unwrap(),
            render: MockRender::new(journal.clone()),
            clients: MockClients::default(),
            sink: RecordingSink::default(),
            controller: DashboardController::new(PortalInfo::default()),
            journal,
            now: 0,
        }
    }

    /// A rig that has already booted into Normal mode.
    pub fn booted() -> Self {
        let mut rig = Self::new();
        rig.boot();
        rig
    }

    pub fn boot(&mut self) {
        let now = self.now;
        let (controller, mut ports) = self.split();
        controller.boot(now, &mut ports);
    }

    pub fn split(&mut self) -> (&mut DashboardController, Ports<'_>) {
        (
            &mut self.controller,
            Ports {
                serial: &mut self.serial,
                storage: &mut self.storage,
                prefs: &mut self.prefs,
                render: &mut self.render,
                clients: &mut self.clients,
                sink: &mut self.sink,
            },
        )
    }

    pub fn tick(&mut self) {
        let now = self.now;
        let (controller, mut ports) = self.split();
        controller.tick(now, &mut ports);
    }

    /// Advance the clock in `step_ms` increments, ticking each time.
    pub fn run_for(&mut self, ms: u64, step_ms: u64) {
        let end = self.now + ms;
        while self.now < end {
            self.now += step_ms;
            self.tick();
        }
    }

    pub fn event(&mut self, event: espdash::app::commands::DashEvent) {
        let now = self.now;
        let (controller, mut ports) = self.split();
        controller.handle_event(event, now, &mut ports);
    }

    pub fn serve(&mut self, request: espdash::portal::PortalRequest) -> espdash::portal::PortalResponse {
        let now = self.now;
        let (controller, mut ports) = self.split();
        controller.serve_portal(request, now, &mut ports)
    }

    /// Inject one realtime frame carrying `snap`.
    pub fn feed(&mut self, snap: &TelemetrySnapshot) {
        let frame = ecu_frame(snap);
        self.serial.inject(&frame);
    }

    /// Flip the station count and tick past the next client sample.
    pub fn set_clients(&mut self, n: u8) {
        self.clients.count = n;
        self.run_for(espdash::config::CLIENT_CHECK_MS, 10);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.journal.borrow().clone()
    }

    pub fn clear_calls(&mut self) {
        self.journal.borrow_mut().clear();
    }

    pub fn count(&self, call: &Call) -> usize {
        self.journal.borrow().iter().filter(|c| *c == call).count()
    }
}

/// Realtime frame (`'n'`, type, length, payload) for `snap`.
pub fn ecu_frame(snap: &TelemetrySnapshot) -> Vec<u8> {
    let payload = encode_payload(snap, AfrFormat::default(), 75);
    let mut buf = vec![0u8; 3 + payload.len()];
    let n = encode_frame(0x32, &payload, &mut buf).unwrap();
    buf.truncate(n);
    buf
}

pub fn snapshot(rpm: u16) -> TelemetrySnapshot {
    TelemetrySnapshot {
        rpm,
        iat_c: 30,
        clt_c: 85,
        vbat: 13.8,
        afr: 14.7,
        tps: 20,
        advance: 15,
        warmup: false,
        launch: false,
        received_at_ms: 0,
    }
}
