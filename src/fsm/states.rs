//! Mode handlers and table builder.
//!
//! ```text
//!  NORMAL ──[clients ≥ 1]──▶ PORTAL
//!    ▲                          │
//!    └───────[clients = 0]──────┘
//! ```
//!
//! Portal entry releases every shared resource the network service needs:
//! serial closed first so no half-read frame survives, then the log file,
//! then the render pipeline.  Exit reverses it and forces one full redraw.

use log::{info, warn};

use super::context::ModeContext;
use super::{ModeDescriptor, ModeId};
use crate::app::events::AppEvent;
use crate::app::ports::ScreenId;
use crate::config::{ECU_BAUD, MAX_SERIAL_BYTES_PER_TICK};

// ═══════════════════════════════════════════════════════════════════════════
//  Table builder
// ═══════════════════════════════════════════════════════════════════════════

pub fn build_mode_table() -> [ModeDescriptor; ModeId::COUNT] {
    [
        ModeDescriptor {
            id: ModeId::Normal,
            name: "Normal",
            on_enter: Some(normal_enter),
            on_exit: None,
            on_update: normal_update,
        },
        ModeDescriptor {
            id: ModeId::Portal,
            name: "Portal",
            on_enter: Some(portal_enter),
            on_exit: Some(portal_exit),
            on_update: portal_update,
        },
    ]
}

// ═══════════════════════════════════════════════════════════════════════════
//  NORMAL
// ═══════════════════════════════════════════════════════════════════════════

fn normal_enter(ctx: &mut ModeContext<'_>) {
    ctx.render.set_rendering(true);
    // Settings saved from the portal land here.
    ctx.render.set_view(ctx.view);
    *ctx.screen = ScreenId::Dashboard;
    ctx.render.set_screen(ScreenId::Dashboard);
    ctx.render.invalidate();
    info!("NORMAL: dashboard live");
}

fn normal_update(ctx: &mut ModeContext<'_>) -> Option<ModeId> {
    if ctx.has_clients() {
        info!("NORMAL: {} client(s) on AP, entering portal", ctx.clients);
        return Some(ModeId::Portal);
    }
    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  PORTAL
// ═══════════════════════════════════════════════════════════════════════════

fn portal_enter(ctx: &mut ModeContext<'_>) {
    ctx.serial.close();

    let present = ctx.storage.is_present();
    if ctx.session.stop(present) {
        ctx.render.set_recording(false);
        ctx.emit(AppEvent::RecordingStopped);
    }

    ctx.render.set_rendering(false);
    ctx.render.draw_portal_screen(ctx.portal);
    info!("PORTAL: dashboard suspended, serving http://{}", ctx.portal.address);
}

fn portal_exit(ctx: &mut ModeContext<'_>) {
    if let Err(e) = ctx.serial.open(ECU_BAUD) {
        warn!("PORTAL: serial reopen failed ({}), link stays stale", e);
    }
    // Whatever queued while the port was closed belongs to no request.
    let mut dropped = 0;
    while dropped < MAX_SERIAL_BYTES_PER_TICK && ctx.serial.read_byte().is_some() {
        dropped += 1;
    }
    ctx.link.reset(ctx.now_ms);
    info!("PORTAL: serial restored ({} stale bytes dropped)", dropped);
}

fn portal_update(ctx: &mut ModeContext<'_>) -> Option<ModeId> {
    if !ctx.has_clients() {
        return Some(ModeId::Normal);
    }
    None
}
