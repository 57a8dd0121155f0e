//! Command interpreter: the only runtime mutator of the settings.
//!
//! [`evaluate`] is pure: `(current settings, command) -> (next settings,
//! effect)`.  [`interpret`] applies an evaluation through the
//! [`SettingsStore`], so the restart decision always reflects whether the
//! save actually reached storage.

use log::{debug, info, warn};

use super::commands::Command;
use super::ports::{EntropyPort, RecordStoragePort, StorageError};
use crate::settings::store::SettingsStore;
use crate::settings::{Rejection, SettingsRecord, TOPIC_SEPARATOR, TextField, generate_client_id};

/// What a command asks of the lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Set the stay-awake override; nothing is persisted.
    StayAwake,
    /// Persist the next record, then restart if asked.
    Persist { restart: bool },
    /// Restart without touching the record.
    Restart,
    /// The value was refused; nothing changes.
    Rejected(Rejection),
    /// Unknown or malformed; the operator gets a settings dump.
    Unrecognized,
}

/// Result of the pure evaluation step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    /// Record to persist, present iff the effect is [`Effect::Persist`].
    pub next: Option<SettingsRecord>,
    pub effect: Effect,
}

impl Evaluation {
    fn effect(effect: Effect) -> Self {
        Self { next: None, effect }
    }

    fn persist(next: SettingsRecord, restart: bool) -> Self {
        Self {
            next: Some(next),
            effect: Effect::Persist { restart },
        }
    }
}

/// Decide what `cmd` does to `current`.
pub fn evaluate(
    current: &SettingsRecord,
    cmd: &Command<'_>,
    entropy: &mut impl EntropyPort,
) -> Evaluation {
    match *cmd {
        Command::StayAwake => Evaluation::effect(Effect::StayAwake),
        Command::SetText(field, value) => {
            if field == TextField::TopicRoot
                && !value.is_empty()
                && !value.ends_with(TOPIC_SEPARATOR)
            {
                return Evaluation::effect(Effect::Rejected(Rejection::TopicMissingSeparator));
            }
            let mut next = current.clone();
            match next.set_text(field, value) {
                Ok(()) => Evaluation::persist(next, true),
                Err(rejection) => Evaluation::effect(Effect::Rejected(rejection)),
            }
        }
        Command::SetPort(port) => {
            let mut next = current.clone();
            next.broker_port = port;
            Evaluation::persist(next, true)
        }
        Command::SetSleep(seconds) => {
            let mut next = current.clone();
            next.sleep_seconds = seconds;
            Evaluation::persist(next, false)
        }
        Command::SetDebug(on) => {
            let mut next = current.clone();
            next.debug = on;
            Evaluation::persist(next, false)
        }
        Command::RegenerateClientId => {
            let mut next = current.clone();
            next.client_id = generate_client_id(entropy);
            Evaluation::persist(next, true)
        }
        Command::FactoryDefaults => {
            info!("Resetting stored settings to factory defaults");
            Evaluation::persist(
                SettingsRecord::factory_defaults(generate_client_id(entropy)),
                true,
            )
        }
        Command::Reset => Evaluation::effect(Effect::Restart),
        Command::Unrecognized => Evaluation::effect(Effect::Unrecognized),
    }
}

/// Outcome of an applied command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    StayAwake,
    Saved { restart: bool, complete: bool },
    Restart,
    Rejected(Rejection),
    Unrecognized,
}

impl Outcome {
    /// The command was understood and carried out.
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::StayAwake | Self::Saved { .. } | Self::Restart)
    }

    pub fn requests_restart(&self) -> bool {
        matches!(self, Self::Saved { restart: true, .. } | Self::Restart)
    }
}

/// Evaluate `cmd` and persist the result.
///
/// A storage failure is returned as the error and suppresses any restart:
/// the in-memory record keeps the new values, but restarting would
/// silently revert them.
pub fn interpret<S: RecordStoragePort>(
    store: &mut SettingsStore<S>,
    cmd: &Command<'_>,
    entropy: &mut impl EntropyPort,
) -> Result<Outcome, StorageError> {
    debug!("Processing command {:?}", cmd);
    let eval = evaluate(store.current(), cmd, entropy);

    let outcome = match (eval.effect, eval.next) {
        (Effect::Persist { restart }, Some(next)) => {
            let report = store.save(next, entropy)?;
            Outcome::Saved {
                restart,
                complete: report.complete,
            }
        }
        (Effect::Persist { .. }, None) => Outcome::Unrecognized,
        (Effect::StayAwake, _) => Outcome::StayAwake,
        (Effect::Restart, _) => Outcome::Restart,
        (Effect::Rejected(r), _) => {
            warn!("Command rejected: {}", r);
            Outcome::Rejected(r)
        }
        (Effect::Unrecognized, _) => Outcome::Unrecognized,
    };
    Ok(outcome)
}
