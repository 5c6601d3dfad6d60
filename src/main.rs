//! espdash firmware entry point.
//!
//! Hexagonal architecture with a single cooperative tick loop.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  UartSerial     SdStorage      NvsPrefs      ConsoleRenderer   │
//! │  (SerialPort)   (StoragePort)  (PrefsPort)   (RenderPort)      │
//! │  SoftAp         LogEventSink   HttpPortal ─[Channel]┐          │
//! │  (ClientMonitor)(EventSink)    (httpd task)         │          │
//! │                                                     │          │
//! │  ──────────────── Port Trait Boundary ──────────────┼───────   │
//! │                                                     ▼          │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │          DashboardController (pure logic)              │    │
//! │  │  Mode FSM · ECU link · Warnings · Shift · Logging      │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use anyhow::Result;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::delay::FreeRtos;
use esp_idf_svc::hal::peripherals::Peripherals;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use log::{info, warn};

use espdash::adapters::console_render::ConsoleRenderer;
use espdash::adapters::fs_storage::{SD_MOUNT_POINT, SdStorage};
use espdash::adapters::http_portal::{HttpPortal, portal_channel};
use espdash::adapters::log_sink::LogEventSink;
use espdash::adapters::nvs::NvsPrefs;
use espdash::adapters::time::MonotonicClock;
use espdash::adapters::uart::UartSerial;
use espdash::adapters::wifi::SoftAp;
use espdash::app::ports::Ports;
use espdash::app::service::DashboardController;
use espdash::config::{FW_VERSION, PORTAL_YIELD_MS};
use espdash::error::Error;
use espdash::fsm::ModeId;
use espdash::portal::PortalInfo;

/// Loop pacing in Normal mode.  Keeps the idle task fed without
/// starving the 100 ms poll cadence.
const NORMAL_YIELD_MS: u32 = 1;

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  espdash v{}                        ║", FW_VERSION);
    info!("╚══════════════════════════════════════╝");

    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;
    let nvs_partition = EspDefaultNvsPartition::take()?;

    // ── 2. Adapters ───────────────────────────────────────────
    let mut prefs = NvsPrefs::new().map_err(Error::from)?;
    let mut serial = UartSerial::new();
    let mut storage = SdStorage::new(SD_MOUNT_POINT);
    let mut render = ConsoleRenderer::new();
    let mut sink = LogEventSink::new();
    let clock = MonotonicClock::new();

    // ── 3. Soft-AP + portal ───────────────────────────────────
    let mut portal = PortalInfo::default();
    let mut ap = SoftAp::start(peripherals.modem, sysloop, nvs_partition, &portal)?;
    match ap.address() {
        Some(addr) => portal.address = addr,
        None => warn!("AP address unknown, showing {}", portal.address),
    }

    let (client, queue) = portal_channel();
    let _http = HttpPortal::start(client)?;

    // ── 4. Controller ─────────────────────────────────────────
    let mut controller = DashboardController::new(portal);
    let mut ports = Ports {
        serial: &mut serial,
        storage: &mut storage,
        prefs: &mut prefs,
        render: &mut render,
        clients: &mut ap,
        sink: &mut sink,
    };
    controller.boot(clock.now_ms(), &mut ports);

    info!("Entering main loop");

    // ── 5. Main loop ──────────────────────────────────────────
    loop {
        let now = clock.now_ms();
        controller.tick(now, &mut ports);
        queue.serve(|request| controller.serve_portal(request, now, &mut ports));

        let delay = if controller.mode() == ModeId::Portal {
            PORTAL_YIELD_MS as u32
        } else {
            NORMAL_YIELD_MS
        };
        FreeRtos::delay_ms(delay);
    }
}
