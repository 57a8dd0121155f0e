//! Device lifecycle controller: the hexagonal core.
//!
//! [`LifecycleController`] owns the settings store, the lifecycle FSM and
//! its context.  All I/O flows through port traits injected at call sites,
//! making the whole boot → report → sleep cycle testable with mock adapters.
//!
//! ```text
//!  NetworkPort ─┐                          ┌──▶ EventSink
//! MessagingPort ┤  ┌────────────────────┐  │
//!  BatteryPort ─┼─▶│ LifecycleController │──┘
//! PlatformPort ─┤  │ FSM · Store · Cmds  │
//!  ConsolePort ─┘  └────────────────────┘
//! ```
//!
//! Every tick services both command transports, advances the FSM, then
//! executes whatever actions the FSM requested (report, deep sleep,
//! restart).

use log::{LevelFilter, debug, info, warn};

use crate::config::FirmwareConfig;
use crate::error::{CommsError, Result};
use crate::fsm::context::{LifecycleContext, RuntimeState};
use crate::fsm::states::build_state_table;
use crate::fsm::{Fsm, StateId};
use crate::settings::layout::RecordStatus;
use crate::settings::store::SettingsStore;
use crate::settings::{SettingsRecord, StaticAddressing};

use super::commands::Command;
use super::events::{AppEvent, SettingsReport};
use super::interpreter::{Outcome, interpret};
use super::messaging::{
    self, COMMAND_SUFFIX, REPLY_ERROR, REPLY_REBOOT, REPLY_STATUS, Request, payload_text,
    topic_for,
};
use super::ports::{
    BrokerParams, EventSink, JoinParams, NodePorts, RecordStoragePort, StorageError,
};
use super::retry::{RetryControl, RetryError};
use super::telemetry::{Reading, TelemetryReporter};

// ───────────────────────────────────────────────────────────────
// LifecycleController
// ───────────────────────────────────────────────────────────────

pub struct LifecycleController<S> {
    fsm: Fsm,
    ctx: LifecycleContext,
    store: SettingsStore<S>,
    reporter: TelemetryReporter,
}

impl<S: RecordStoragePort> LifecycleController<S> {
    /// Construct the controller over `storage`.
    ///
    /// Does **not** load anything; call [`boot`](Self::boot) next.
    pub fn new(storage: S, config: FirmwareConfig) -> Self {
        let reporter = TelemetryReporter::new(&config);
        Self {
            fsm: Fsm::new(build_state_table(), StateId::Booting),
            ctx: LifecycleContext::new(config),
            store: SettingsStore::new(storage),
            reporter,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Load settings, apply first-boot initialisation, and start the FSM.
    pub fn boot(&mut self, hw: &mut impl NodePorts, sink: &mut impl EventSink) -> RecordStatus {
        self.ctx.now_ms = hw.uptime_ms();

        let mut status = self.store.load();
        apply_log_level(self.store.current().debug);
        sink.emit(&AppEvent::Booted(status));

        match status {
            RecordStatus::Blank => {
                warn!("No stored settings, writing factory defaults");
                let defaults = self.store.reset_to_defaults(hw);
                match self.store.save(defaults, hw) {
                    Ok(report) => {
                        sink.emit(&AppEvent::SettingsSaved {
                            complete: report.complete,
                            restart: true,
                        });
                        self.ctx.runtime.pending_restart = true;
                    }
                    Err(e) => {
                        // Restarting would only find blank storage again.
                        sink.emit(&AppEvent::StorageFault(e));
                        status = RecordStatus::Incomplete;
                        self.report_settings(hw, sink);
                    }
                }
            }
            RecordStatus::Incomplete => self.report_settings(hw, sink),
            RecordStatus::Valid => {}
        }

        self.ctx.record_status = status;
        self.sync_settings();
        self.fsm.start(&mut self.ctx);
        self.step_fsm(hw, sink);
        status
    }

    /// Run one cycle: serve commands, advance the FSM, execute its actions.
    pub fn tick(&mut self, hw: &mut impl NodePorts, sink: &mut impl EventSink) {
        self.ctx.now_ms = hw.uptime_ms();

        if !matches!(
            self.fsm.current_state(),
            StateId::Sleeping | StateId::Restarting
        ) {
            self.service_messaging(hw, sink);
            self.service_console(hw, sink);
        }

        self.step_fsm(hw, sink);
    }

    /// Hold the node awake while a firmware image is being received.
    pub fn begin_update_window(&mut self, sink: &mut impl EventSink) {
        self.ctx.update_window = true;
        sink.emit(&AppEvent::UpdateWindow { open: true });
    }

    /// Release the update hold; a successful update restarts into the new
    /// image.
    pub fn end_update_window(&mut self, succeeded: bool, sink: &mut impl EventSink) {
        self.ctx.update_window = false;
        sink.emit(&AppEvent::UpdateWindow { open: false });
        if succeeded {
            self.ctx.runtime.pending_restart = true;
        }
    }

    // ── Command transports ────────────────────────────────────

    /// Apply one command line from either transport.
    pub fn apply_command(
        &mut self,
        line: &str,
        hw: &mut impl NodePorts,
        sink: &mut impl EventSink,
    ) -> core::result::Result<Outcome, StorageError> {
        let cmd = Command::parse(line);
        let result = interpret(&mut self.store, &cmd, hw);

        match result {
            Ok(Outcome::StayAwake) => {
                self.ctx.runtime.stay_awake = true;
                sink.emit(&AppEvent::StayingAwake);
            }
            Ok(Outcome::Saved { restart, complete }) => {
                sink.emit(&AppEvent::SettingsSaved { complete, restart });
                apply_log_level(self.store.current().debug);
                self.ctx.runtime.pending_restart |= restart;
            }
            Ok(Outcome::Restart) => self.ctx.runtime.pending_restart = true,
            Ok(Outcome::Rejected(r)) => sink.emit(&AppEvent::CommandRejected(r)),
            Ok(Outcome::Unrecognized) => self.report_settings(hw, sink),
            Err(e) => sink.emit(&AppEvent::StorageFault(e)),
        }
        self.sync_settings();
        result
    }

    /// Answer one payload received on the command topic.
    pub fn handle_message(
        &mut self,
        payload: &[u8],
        hw: &mut impl NodePorts,
        sink: &mut impl EventSink,
    ) {
        let text = payload_text(payload);
        debug!("Command topic payload \"{}\"", text);

        // Reply on the root the request arrived under.
        let reply_topic = topic_for(&self.store.current().topic_root, text);

        let json;
        let reply: &str = match Request::parse(text) {
            Request::Settings => {
                json = messaging::settings_json(self.store.current(), hw.local_ip());
                match &json {
                    Ok(s) => s.as_str(),
                    Err(_) => REPLY_ERROR,
                }
            }
            Request::Status => {
                if let Err(e) = self.reporter.report(hw, &self.store.current().topic_root, sink) {
                    sink.emit(&AppEvent::SensorFault(e));
                }
                REPLY_STATUS
            }
            Request::Reboot => {
                self.ctx.runtime.pending_restart = true;
                REPLY_REBOOT
            }
            Request::Command(line) => messaging::command_reply(&self.apply_command(line, hw, sink)),
        };

        let published = reply_topic.and_then(|topic| hw.publish(&topic, reply.as_bytes(), false));
        if let Err(e) = published {
            sink.emit(&AppEvent::PublishFailed(e));
        }
        self.ctx.runtime.last_send_ms = Some(hw.uptime_ms());
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn state(&self) -> StateId {
        self.fsm.current_state()
    }

    pub fn settings(&self) -> &SettingsRecord {
        self.store.current()
    }

    pub fn runtime(&self) -> &RuntimeState {
        &self.ctx.runtime
    }

    pub fn store(&self) -> &SettingsStore<S> {
        &self.store
    }

    pub fn config(&self) -> &FirmwareConfig {
        &self.ctx.config
    }

    pub fn storage_mut(&mut self) -> &mut S {
        self.store.storage_mut()
    }

    /// Give back the storage adapter, e.g. to boot a fresh controller on it.
    pub fn into_storage(self) -> S {
        self.store.into_storage()
    }

    // ── Internal ──────────────────────────────────────────────

    fn step_fsm(&mut self, hw: &mut impl NodePorts, sink: &mut impl EventSink) {
        let from = self.fsm.current_state();
        self.fsm.tick(&mut self.ctx);
        let to = self.fsm.current_state();
        if from != to {
            sink.emit(&AppEvent::StateChanged { from, to });
        }

        let actions = self.ctx.take_actions();
        if actions.report {
            if let Err(e) = self.send(hw, sink) {
                warn!("Report skipped: {}", e);
            }
        }
        if let Some(seconds) = actions.sleep {
            sink.emit(&AppEvent::Sleeping { seconds });
            hw.leave();
            hw.deep_sleep(seconds);
        }
        if actions.restart {
            sink.emit(&AppEvent::Restarting);
            hw.restart();
        }
    }

    /// Bring the links up and publish one reading.
    fn send(&mut self, hw: &mut impl NodePorts, sink: &mut impl EventSink) -> Result<Reading> {
        let result = self.connect(hw, sink).and_then(|()| {
            let reading = self
                .reporter
                .report(hw, &self.store.current().topic_root, sink)
                .inspect_err(|e| sink.emit(&AppEvent::SensorFault(*e)))?;
            Ok(reading)
        });
        if let Ok(reading) = &result {
            self.ctx.runtime.last_measurement = Some(reading.raw);
        }
        self.ctx.runtime.last_send_ms = Some(hw.uptime_ms());
        result
    }

    fn connect(&mut self, hw: &mut impl NodePorts, sink: &mut impl EventSink) -> Result<()> {
        self.ensure_network(hw, sink)?;
        self.ensure_broker(hw, sink)?;
        Ok(())
    }

    fn ensure_network(&mut self, hw: &mut impl NodePorts, sink: &mut impl EventSink) -> Result<()> {
        if hw.is_joined() {
            debug!("Actual network address is {:?}", hw.local_ip());
            return Ok(());
        }

        let params = self.join_params(sink);
        info!("Joining \"{}\"", params.ssid);
        if let Err(e) = hw.begin_join(&params) {
            sink.emit(&AppEvent::NetworkJoinFailed);
            return Err(e.into());
        }

        let budget = self.ctx.config.network_retry;
        let joined = budget.run(
            hw,
            |hw, _| {
                if hw.is_joined() {
                    Ok(())
                } else {
                    Err(CommsError::NotJoined)
                }
            },
            |hw| self.poll_console_between_attempts(hw, sink),
        );

        match joined {
            Ok(()) => {
                sink.emit(&AppEvent::NetworkJoined(hw.local_ip()));
                Ok(())
            }
            Err(e) => {
                sink.emit(&AppEvent::NetworkJoinFailed);
                Err(retry_failure(e).into())
            }
        }
    }

    fn ensure_broker(&mut self, hw: &mut impl NodePorts, sink: &mut impl EventSink) -> Result<()> {
        if hw.is_connected() {
            return Ok(());
        }

        let params = self.broker_params();
        info!("Connecting to broker {}:{}", params.host, params.port);

        let budget = self.ctx.config.broker_retry;
        let connected = budget.run(
            hw,
            |hw, attempt| {
                debug!("Broker attempt {}", attempt);
                hw.connect(&params)?;
                if hw.is_connected() {
                    Ok(())
                } else {
                    Err(CommsError::NotConnected)
                }
            },
            |hw| self.poll_console_between_attempts(hw, sink),
        );

        if let Err(e) = connected {
            sink.emit(&AppEvent::BrokerConnectFailed);
            return Err(retry_failure(e).into());
        }
        sink.emit(&AppEvent::BrokerConnected);

        let topic = topic_for(&self.store.current().topic_root, COMMAND_SUFFIX)?;
        if let Err(e) = hw.subscribe(&topic) {
            // Reporting still works without the command topic.
            warn!("Subscribe to {} failed: {}", topic, e);
        }
        Ok(())
    }

    fn poll_console_between_attempts(
        &mut self,
        hw: &mut impl NodePorts,
        sink: &mut impl EventSink,
    ) -> RetryControl {
        self.service_console(hw, sink);
        if self.ctx.runtime.pending_restart {
            RetryControl::Cancel
        } else {
            RetryControl::Continue
        }
    }

    fn service_messaging(&mut self, hw: &mut impl NodePorts, sink: &mut impl EventSink) {
        while let Some(msg) = hw.poll_message() {
            self.handle_message(&msg.payload, hw, sink);
            if self.ctx.runtime.pending_restart {
                break;
            }
        }
    }

    fn service_console(&mut self, hw: &mut impl NodePorts, sink: &mut impl EventSink) {
        if let Some(line) = hw.read_line() {
            let _ = self.apply_command(&line, hw, sink);
        }
    }

    fn report_settings(&self, hw: &mut impl NodePorts, sink: &mut impl EventSink) {
        let record = self.store.current().clone();
        let complete = record.valid;
        sink.emit(&AppEvent::SettingsReport(Box::new(SettingsReport {
            record,
            complete,
            local_ip: hw.local_ip(),
        })));
    }

    fn join_params(&self, sink: &mut impl EventSink) -> JoinParams {
        let r = self.store.current();
        let static_ip = match r.static_ipv4() {
            StaticAddressing::Fixed { address, netmask } => Some((address, netmask)),
            StaticAddressing::BadNetmask { .. } => {
                sink.emit(&AppEvent::StaticAddressIgnored);
                None
            }
            StaticAddressing::Dynamic => {
                if !r.static_address.is_empty() {
                    sink.emit(&AppEvent::StaticAddressIgnored);
                }
                None
            }
        };
        JoinParams {
            ssid: r.ssid.clone(),
            password: r.wifi_password.clone(),
            static_ip,
        }
    }

    fn broker_params(&self) -> BrokerParams {
        let r = self.store.current();
        BrokerParams {
            host: r.broker_address.clone(),
            port: r.broker_port,
            client_id: r.client_id.clone(),
            username: r.broker_username.clone(),
            password: r.broker_password.clone(),
        }
    }

    fn sync_settings(&mut self) {
        let r = self.store.current();
        self.ctx.settings_valid = r.valid;
        self.ctx.sleep_secs = r.sleep_seconds;
    }
}

fn retry_failure(e: RetryError<CommsError>) -> CommsError {
    match e {
        RetryError::Exhausted(last) => last,
        RetryError::Cancelled { attempts } => {
            info!("Connection abandoned after {} attempts, restart pending", attempts);
            CommsError::NotConnected
        }
    }
}

/// Map the persisted debug flag onto the log level.
pub fn apply_log_level(debug: bool) {
    log::set_max_level(if debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    });
}
