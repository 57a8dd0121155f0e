//! Shared mutable context threaded through every FSM handler.
//!
//! `LifecycleContext` is the blackboard state handlers read from and write
//! to: the clock, what boot found in storage, the non-persisted
//! [`RuntimeState`], and the action requests the controller executes after
//! each tick.

use crate::config::FirmwareConfig;
use crate::settings::layout::RecordStatus;

// ---------------------------------------------------------------------------
// Runtime state (not persisted; discarded on sleep or restart)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default)]
pub struct RuntimeState {
    /// Suppresses deep sleep until the next restart.
    pub stay_awake: bool,
    /// Latest raw battery sample.
    pub last_measurement: Option<u16>,
    /// Uptime at which the next report is due.
    pub next_report_ms: u64,
    /// A command asked for a restart.
    pub pending_restart: bool,
    /// Uptime of the last report or reply attempt.
    pub last_send_ms: Option<u64>,
}

// ---------------------------------------------------------------------------
// Action requests (written by handlers; executed by the controller)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Actions {
    /// Take and publish one reading this tick.
    pub report: bool,
    /// Enter deep sleep for this many seconds.
    pub sleep: Option<u32>,
    /// Restart the platform now.
    pub restart: bool,
}

// ---------------------------------------------------------------------------
// LifecycleContext
// ---------------------------------------------------------------------------

/// The shared context passed to every state handler function.
pub struct LifecycleContext {
    // -- Timing --
    /// Uptime at the current tick (ms).
    pub now_ms: u64,
    /// Uptime at which the current state was entered (ms).
    pub state_entered_ms: u64,

    // -- Settings --
    /// What boot found in storage.
    pub record_status: RecordStatus,
    /// Current record passes the completeness predicate.
    pub settings_valid: bool,
    /// Configured sleep interval; 0 means never sleep.
    pub sleep_secs: u32,

    // -- Runtime --
    pub runtime: RuntimeState,
    /// An update window is open; sleep is held off.
    pub update_window: bool,
    /// The restart action has been handed to the controller.
    pub restart_issued: bool,

    // -- Outputs --
    pub actions: Actions,

    // -- Configuration --
    pub config: FirmwareConfig,
}

impl LifecycleContext {
    pub fn new(config: FirmwareConfig) -> Self {
        Self {
            now_ms: 0,
            state_entered_ms: 0,
            record_status: RecordStatus::Blank,
            settings_valid: false,
            sleep_secs: 0,
            runtime: RuntimeState::default(),
            update_window: false,
            restart_issued: false,
            actions: Actions::default(),
            config,
        }
    }

    /// Milliseconds since the current state was entered.
    pub fn ms_in_state(&self) -> u64 {
        self.now_ms.saturating_sub(self.state_entered_ms)
    }

    /// Nothing holds the node awake and the interval is non-zero.
    pub fn sleep_enabled(&self) -> bool {
        !(self.runtime.stay_awake || self.update_window || self.sleep_secs == 0)
    }

    /// Deep sleep is allowed now: enabled, and this wake's report has had
    /// time to leave the radio.
    pub fn may_sleep(&self) -> bool {
        self.sleep_enabled()
            && self
                .runtime
                .last_send_ms
                .is_some_and(|t| self.now_ms.saturating_sub(t) >= u64::from(self.config.publish_settle_ms))
    }

    /// Spacing between two reports while awake.
    pub fn report_period_ms(&self) -> u64 {
        (u64::from(self.sleep_secs) * 1000).max(u64::from(self.config.min_report_spacing_ms))
    }

    /// Take and clear this tick's actions.
    pub fn take_actions(&mut self) -> Actions {
        core::mem::take(&mut self.actions)
    }
}
