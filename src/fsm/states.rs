//! Concrete state handler functions and table builder.
//!
//! Each state is defined by plain `fn` pointers: no closures, no dynamic
//! dispatch, no heap.
//!
//! ```text
//!  BOOTING ──[valid]──────────▶ ACTIVE ──[reported, may sleep]──▶ SLEEPING
//!     │                           │                                  │
//!     ├──[incomplete]──▶ AWAITING_CONFIGURATION                  (wake = cold boot)
//!     │                           │
//!     └──[never written]──┐       │ [pending restart]
//!                         ▼       ▼
//!                       RESTARTING ◀──[pending restart]── ACTIVE
//! ```

use super::context::LifecycleContext;
use super::{StateDescriptor, StateId};
use crate::settings::layout::RecordStatus;
use log::{debug, info};

// ═══════════════════════════════════════════════════════════════════════════
//  Table builder
// ═══════════════════════════════════════════════════════════════════════════

/// Build the static state table.  Called once at startup.
pub fn build_state_table() -> [StateDescriptor; StateId::COUNT] {
    [
        // Index 0: Booting
        StateDescriptor {
            id: StateId::Booting,
            name: "Booting",
            on_enter: None,
            on_update: booting_update,
        },
        // Index 1: AwaitingConfiguration
        StateDescriptor {
            id: StateId::AwaitingConfiguration,
            name: "AwaitingConfiguration",
            on_enter: Some(awaiting_enter),
            on_update: awaiting_update,
        },
        // Index 2: Active
        StateDescriptor {
            id: StateId::Active,
            name: "Active",
            on_enter: Some(active_enter),
            on_update: active_update,
        },
        // Index 3: Sleeping
        StateDescriptor {
            id: StateId::Sleeping,
            name: "Sleeping",
            on_enter: Some(sleeping_enter),
            on_update: sleeping_update,
        },
        // Index 4: Restarting
        StateDescriptor {
            id: StateId::Restarting,
            name: "Restarting",
            on_enter: Some(restarting_enter),
            on_update: restarting_update,
        },
    ]
}

// ═══════════════════════════════════════════════════════════════════════════
//  BOOTING
// ═══════════════════════════════════════════════════════════════════════════

fn booting_update(ctx: &mut LifecycleContext) -> Option<StateId> {
    if ctx.record_status == RecordStatus::Blank || ctx.runtime.pending_restart {
        return Some(StateId::Restarting);
    }
    if ctx.settings_valid {
        Some(StateId::Active)
    } else {
        Some(StateId::AwaitingConfiguration)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  AWAITING_CONFIGURATION: never sleeps, serves commands until a restart
// ═══════════════════════════════════════════════════════════════════════════

fn awaiting_enter(_ctx: &mut LifecycleContext) {
    info!("AWAITING_CONFIGURATION: settings incomplete, staying awake for commands");
}

fn awaiting_update(ctx: &mut LifecycleContext) -> Option<StateId> {
    ctx.runtime.pending_restart.then_some(StateId::Restarting)
}

// ═══════════════════════════════════════════════════════════════════════════
//  ACTIVE: measure, report, then sleep unless held awake
// ═══════════════════════════════════════════════════════════════════════════

fn active_enter(ctx: &mut LifecycleContext) {
    // First report is due immediately.
    ctx.runtime.next_report_ms = ctx.now_ms;
    info!(
        "ACTIVE: reporting every {}s{}",
        ctx.sleep_secs,
        if ctx.runtime.stay_awake { " (staying awake)" } else { "" }
    );
}

fn active_update(ctx: &mut LifecycleContext) -> Option<StateId> {
    if ctx.runtime.pending_restart {
        return Some(StateId::Restarting);
    }

    // One report attempt per wake when sleeping, however long it took.
    if ctx.sleep_enabled() && ctx.runtime.last_send_ms.is_some() {
        return ctx.may_sleep().then_some(StateId::Sleeping);
    }

    if ctx.now_ms >= ctx.runtime.next_report_ms {
        ctx.actions.report = true;
        ctx.runtime.next_report_ms = ctx.now_ms + ctx.report_period_ms();
        debug!("ACTIVE: report due, next at {} ms", ctx.runtime.next_report_ms);
    }
    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  SLEEPING: terminal for this wake; the platform cold-boots on wake
// ═══════════════════════════════════════════════════════════════════════════

fn sleeping_enter(ctx: &mut LifecycleContext) {
    ctx.actions.sleep = Some(ctx.sleep_secs);
    info!("SLEEPING: {}s", ctx.sleep_secs);
}

fn sleeping_update(_ctx: &mut LifecycleContext) -> Option<StateId> {
    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  RESTARTING: grace period for outbound acknowledgments, then restart
// ═══════════════════════════════════════════════════════════════════════════

fn restarting_enter(ctx: &mut LifecycleContext) {
    ctx.restart_issued = false;
    info!(
        "RESTARTING: in {} ms",
        ctx.config.restart_grace_ms
    );
}

fn restarting_update(ctx: &mut LifecycleContext) -> Option<StateId> {
    if !ctx.restart_issued && ctx.ms_in_state() >= u64::from(ctx.config.restart_grace_ms) {
        ctx.actions.restart = true;
        ctx.restart_issued = true;
    }
    None
}
