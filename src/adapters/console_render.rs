//! Headless render adapter.
//!
//! Implements [`RenderPort`] by writing frames to the log instead of a
//! panel.  Used by the host simulator and by boards built without a
//! display driver; the widget toolkit adapter implements the same trait.
//!
//! While rendering is suspended only [`draw_portal_screen`] reaches the
//! output, mirroring a panel whose render task has been paused.
//!
//! [`draw_portal_screen`]: RenderPort::draw_portal_screen

use core::fmt::Write as _;

use log::{debug, info};

use crate::app::ports::{RenderPort, ScreenId, StatusLine};
use crate::config::{Channel, ViewMode};
use crate::metrics::DashMetrics;
use crate::portal::PortalInfo;
use crate::settings::SettingsView;

pub struct ConsoleRenderer {
    rendering: bool,
    screen: ScreenId,
    view: ViewMode,
    frames: u32,
    full_redraw: bool,
}

impl Default for ConsoleRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsoleRenderer {
    pub fn new() -> Self {
        Self {
            rendering: true,
            screen: ScreenId::Dashboard,
            view: ViewMode::Ring,
            frames: 0,
            full_redraw: true,
        }
    }

    /// Frames drawn since start.
    pub fn frames(&self) -> u32 {
        self.frames
    }
}

/// `RPM 3500 | AFR 14.70 | VBAT 13.8 | ...`, `!` marking warnings.
fn frame_line(m: &DashMetrics) -> heapless::String<160> {
    let mut line = heapless::String::new();
    let _ = write!(line, "RPM {}", m.rpm);
    for ch in Channel::ALL {
        let r = m.channel(ch);
        let text = if r.text().is_empty() { "--" } else { r.text() };
        let flag = if r.is_warning() { "!" } else { "" };
        let _ = write!(line, " | {} {}{}", ch.name(), text, flag);
    }
    let _ = write!(line, " | WU {} | LC {}", m.warmup.label(), m.launch.label());
    line
}

impl RenderPort for ConsoleRenderer {
    fn render_metrics(&mut self, metrics: &DashMetrics) {
        if !self.rendering {
            return;
        }
        self.frames = self.frames.wrapping_add(1);
        if self.full_redraw {
            self.full_redraw = false;
            info!("UI[{:?}/{}] {}", self.screen, self.view.label(), frame_line(metrics));
        } else {
            debug!("UI {}", frame_line(metrics));
        }
    }

    fn set_screen(&mut self, screen: ScreenId) {
        if screen != self.screen {
            self.screen = screen;
            self.full_redraw = true;
        }
    }

    fn invalidate(&mut self) {
        self.full_redraw = true;
    }

    fn set_rendering(&mut self, enabled: bool) {
        self.rendering = enabled;
    }

    fn set_shift_blink(&mut self, on: bool) {
        if self.rendering {
            debug!("UI shift {}", if on { "ON" } else { "off" });
        }
    }

    fn draw_portal_screen(&mut self, info: &PortalInfo) {
        info!("WEB CONFIGURATION MODE");
        info!("Connect to WiFi AP: {}", info.ssid);
        info!("Password: {}", info.password);
        info!("Open in browser: http://{}", info.address);
        for hint in info.hints {
            info!("{}", hint);
        }
        info!("FW: {}", info.version);
    }

    fn set_status(&mut self, status: &StatusLine) {
        if self.rendering {
            debug!("UI {}", status);
        }
    }

    fn set_view(&mut self, view: ViewMode) {
        self.view = view;
        self.full_redraw = true;
    }

    fn show_settings(&mut self, view: &SettingsView) {
        if !self.rendering {
            return;
        }
        for row in &view.rows {
            debug!(
                "{} {:<10} {:<18} [{}]",
                if row.selected { ">" } else { " " },
                row.title,
                row.value,
                if row.switch_on { "x" } else { " " }
            );
        }
    }

    fn show_toast(&mut self, title: &str, message: &str) {
        info!("TOAST {}: {}", title, message);
    }

    fn flash_message(&mut self, message: Option<&str>) {
        if let Some(msg) = message {
            info!("UI flash: {}", msg);
        }
    }

    fn set_recording(&mut self, active: bool) {
        debug!("UI REC {}", if active { "on" } else { "off" });
    }
}
