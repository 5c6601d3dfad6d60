//! Function-pointer finite state machine for the operating mode.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │  ModeTable                                               │
//! │  ┌────────┬───────────┬──────────┬───────────────────┐   │
//! │  │ ModeId │ on_enter  │ on_exit  │ on_update         │   │
//! │  ├────────┼───────────┼──────────┼───────────────────┤   │
//! │  │ Normal │ fn(ctx)   │ None     │ fn(ctx)->Option<> │   │
//! │  │ Portal │ fn(ctx)   │ fn(ctx)  │ fn(ctx)->Option<> │   │
//! │  └────────┴───────────┴──────────┴───────────────────┘   │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Each tick the engine calls `on_update` for the current mode.  If it
//! returns `Some(next_id)` the engine runs `on_exit` for the current mode,
//! then `on_enter` for the next, all inside the same call, so a transition
//! can never be observed half-done.  Handlers receive a [`ModeContext`]
//! borrowing the ports and engine state they act on.

pub mod context;
pub mod states;

pub use context::ModeContext;

use log::info;

// ---------------------------------------------------------------------------
// Mode identity
// ---------------------------------------------------------------------------

/// Operating mode.  Must stay in sync with [`states::build_mode_table`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ModeId {
    /// Dashboard live: polling, rendering, logging.
    Normal = 0,
    /// A station is on the configuration AP; dashboard suspended.
    Portal = 1,
}

impl ModeId {
    pub const COUNT: usize = 2;

    /// Convert a table index back to `ModeId`.  Out-of-range falls back
    /// to `Normal`.
    pub fn from_index(idx: usize) -> Self {
        match idx {
            1 => Self::Portal,
            _ => {
                debug_assert!(idx == 0, "invalid mode index: {idx}");
                Self::Normal
            }
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Normal => "Normal",
            Self::Portal => "Portal",
        }
    }
}

// ---------------------------------------------------------------------------
// Gates
// ---------------------------------------------------------------------------

/// Per-tick permissions derived from the mode, computed once after
/// arbitration and consulted by every other component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Gates {
    pub serial_poll_allowed: bool,
    pub render_allowed: bool,
    pub logging_allowed: bool,
}

impl Gates {
    /// `transitioning` is true on the tick a transition ran; logging stays
    /// closed for that tick.
    pub fn for_mode(mode: ModeId, transitioning: bool) -> Self {
        let normal = mode == ModeId::Normal;
        Self {
            serial_poll_allowed: normal,
            render_allowed: normal,
            logging_allowed: normal && !transitioning,
        }
    }
}

// ---------------------------------------------------------------------------
// Function-pointer type aliases
// ---------------------------------------------------------------------------

/// `on_enter` / `on_exit`: run exactly once per transition.
pub type ModeActionFn = fn(&mut ModeContext<'_>);

/// Per-tick handler.  Returns `Some(next)` to transition.
pub type ModeUpdateFn = fn(&mut ModeContext<'_>) -> Option<ModeId>;

/// One row in the mode table.
pub struct ModeDescriptor {
    pub id: ModeId,
    pub name: &'static str,
    pub on_enter: Option<ModeActionFn>,
    pub on_exit: Option<ModeActionFn>,
    pub on_update: ModeUpdateFn,
}

// ---------------------------------------------------------------------------
// FSM engine
// ---------------------------------------------------------------------------

pub struct Fsm {
    /// Fixed-size table indexed by `ModeId as usize`.
    table: [ModeDescriptor; ModeId::COUNT],
    current: usize,
}

impl Fsm {
    pub fn new(table: [ModeDescriptor; ModeId::COUNT], initial: ModeId) -> Self {
        debug_assert!(
            table.iter().enumerate().all(|(i, row)| row.id as usize == i),
            "mode table out of order"
        );
        Self {
            table,
            current: initial as usize,
        }
    }

    /// Run the initial `on_enter`.  Call once before the first `tick()`.
    pub fn start(&mut self, ctx: &mut ModeContext<'_>) {
        info!("FSM starting in mode: {}", self.table[self.current].name);
        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }

    /// Advance by one tick.  Returns `true` if a transition ran.
    pub fn tick(&mut self, ctx: &mut ModeContext<'_>) -> bool {
        match (self.table[self.current].on_update)(ctx) {
            Some(next_id) if next_id as usize != self.current => {
                self.transition(next_id, ctx);
                true
            }
            _ => false,
        }
    }

    pub fn current_mode(&self) -> ModeId {
        ModeId::from_index(self.current)
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    fn transition(&mut self, next_id: ModeId, ctx: &mut ModeContext<'_>) {
        let next_idx = next_id as usize;

        info!(
            "FSM transition: {} -> {}",
            self.table[self.current].name, self.table[next_idx].name
        );

        if let Some(exit) = self.table[self.current].on_exit {
            exit(ctx);
        }

        self.current = next_idx;

        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }
}
