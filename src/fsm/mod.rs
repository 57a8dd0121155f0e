//! Function-pointer finite state machine engine for the node lifecycle.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │  StateTable                                              │
//! │  ┌───────────────────────┬──────────┬──────────────────┐ │
//! │  │ StateId               │ on_enter │ on_update        │ │
//! │  ├───────────────────────┼──────────┼──────────────────┤ │
//! │  │ Booting               │ -        │ fn(ctx)->Option  │ │
//! │  │ AwaitingConfiguration │ fn(ctx)  │ fn(ctx)->Option  │ │
//! │  │ Active                │ fn(ctx)  │ fn(ctx)->Option  │ │
//! │  │ Sleeping              │ fn(ctx)  │ fn(ctx)->Option  │ │
//! │  │ Restarting            │ fn(ctx)  │ fn(ctx)->Option  │ │
//! │  └───────────────────────┴──────────┴──────────────────┘ │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Each tick the engine calls `on_update` for the **current** state.  If it
//! returns `Some(next_id)`, the engine runs `on_enter` for the next state
//! and updates the current pointer.  Handlers never perform I/O; they write
//! [`Actions`](context::Actions) that the controller executes after the
//! tick.

pub mod context;
pub mod states;

use context::LifecycleContext;
use log::info;

// ---------------------------------------------------------------------------
// State identity
// ---------------------------------------------------------------------------

/// Enumeration of all lifecycle states.
/// Must stay in sync with the state table built in [`states::build_state_table`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum StateId {
    Booting = 0,
    AwaitingConfiguration = 1,
    Active = 2,
    Sleeping = 3,
    Restarting = 4,
}

impl StateId {
    /// Total number of states; sizes the table array.
    pub const COUNT: usize = 5;

    /// Convert an index back to `StateId`.  Panics on out-of-range in debug
    /// builds; returns `Restarting` in release.
    pub fn from_index(idx: usize) -> Self {
        match idx {
            0 => Self::Booting,
            1 => Self::AwaitingConfiguration,
            2 => Self::Active,
            3 => Self::Sleeping,
            4 => Self::Restarting,
            _ => {
                debug_assert!(false, "invalid state index: {idx}");
                Self::Restarting
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Function-pointer type aliases
// ---------------------------------------------------------------------------

/// Signature for `on_enter` actions.
pub type StateActionFn = fn(&mut LifecycleContext);

/// Signature for the per-tick update handler.
/// Returns `Some(next)` to trigger a transition, or `None` to stay.
pub type StateUpdateFn = fn(&mut LifecycleContext) -> Option<StateId>;

// ---------------------------------------------------------------------------
// State descriptor (one row in the table)
// ---------------------------------------------------------------------------

/// Static descriptor for a single FSM state.
pub struct StateDescriptor {
    pub id: StateId,
    pub name: &'static str,
    pub on_enter: Option<StateActionFn>,
    pub on_update: StateUpdateFn,
}

// ---------------------------------------------------------------------------
// FSM engine
// ---------------------------------------------------------------------------

/// The finite state machine engine.
pub struct Fsm {
    /// Fixed-size table indexed by `StateId as usize`.
    table: [StateDescriptor; StateId::COUNT],
    /// Index of the currently active state.
    current: usize,
}

impl Fsm {
    /// Construct a new FSM with the given state table, starting in `initial`.
    pub fn new(table: [StateDescriptor; StateId::COUNT], initial: StateId) -> Self {
        debug_assert!(
            table.iter().enumerate().all(|(i, d)| d.id as usize == i),
            "state table rows out of order"
        );
        Self {
            table,
            current: initial as usize,
        }
    }

    /// Run the initial `on_enter` for the starting state.
    /// Call once after construction, before the first `tick()`.
    pub fn start(&mut self, ctx: &mut LifecycleContext) {
        info!("FSM starting in state: {}", self.table[self.current].name);
        ctx.state_entered_ms = ctx.now_ms;
        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }

    /// Advance the FSM by one tick.  `ctx.now_ms` must be set by the caller.
    pub fn tick(&mut self, ctx: &mut LifecycleContext) {
        let next = (self.table[self.current].on_update)(ctx);

        if let Some(next_id) = next {
            self.transition(next_id, ctx);
        }
    }

    /// The current state's identity.
    pub fn current_state(&self) -> StateId {
        StateId::from_index(self.current)
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    fn transition(&mut self, next_id: StateId, ctx: &mut LifecycleContext) {
        let next_idx = next_id as usize;

        info!(
            "FSM transition: {} -> {}",
            self.table[self.current].name, self.table[next_idx].name
        );

        self.current = next_idx;
        ctx.state_entered_ms = ctx.now_ms;

        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }
}
