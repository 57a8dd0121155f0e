//! Textual `name=value` commands.
//!
//! Both transports (serial console and the messaging command topic) hand
//! one line of text to [`IncomingCommand::parse`]; [`Command::from_incoming`]
//! maps it onto the dispatch table.  Parsing never fails: anything that is
//! not a known command becomes [`Command::Unrecognized`].

use crate::settings::TextField;

/// Literal value that clears a field.
pub const CLEAR_VALUE: &str = "NULL";

/// Value required by the destructive commands.
pub const CONFIRM_VALUE: &str = "yes";

/// One parsed input line, borrowed from the transport's buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IncomingCommand<'a> {
    pub name: &'a str,
    pub value: Option<&'a str>,
}

impl<'a> IncomingCommand<'a> {
    /// Split on the first `=` and strip up to two trailing CR/LF bytes from
    /// each side.
    pub fn parse(line: &'a str) -> Self {
        match line.split_once('=') {
            Some((name, value)) => Self {
                name: trim_line_end(name),
                value: Some(trim_line_end(value)),
            },
            None => Self {
                name: trim_line_end(line),
                value: None,
            },
        }
    }

    /// The value as the dispatch table sees it: absent is empty and
    /// [`CLEAR_VALUE`] is empty.
    pub fn effective_value(&self) -> &'a str {
        match self.value {
            None | Some(CLEAR_VALUE) => "",
            Some(v) => v,
        }
    }
}

fn trim_line_end(mut s: &str) -> &str {
    for _ in 0..2 {
        match s.as_bytes().last() {
            Some(b'\r' | b'\n') => s = &s[..s.len() - 1],
            _ => break,
        }
    }
    s
}

/// A dispatchable command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command<'a> {
    /// `w`: suppress deep sleep until the next restart.
    StayAwake,
    SetText(TextField, &'a str),
    SetPort(u16),
    SetSleep(u32),
    SetDebug(bool),
    /// `resetmqttid=yes`
    RegenerateClientId,
    /// `factorydefaults=yes`
    FactoryDefaults,
    /// `reset=yes`
    Reset,
    Unrecognized,
}

impl<'a> Command<'a> {
    pub fn from_incoming(cmd: &IncomingCommand<'a>) -> Self {
        if cmd.name.is_empty() {
            return Self::Unrecognized;
        }
        let value = cmd.effective_value();
        match cmd.name {
            "w" => Self::StayAwake,
            "broker" => Self::SetText(TextField::BrokerAddress, value),
            "mqttTopic" => Self::SetText(TextField::TopicRoot, value),
            "user" => Self::SetText(TextField::BrokerUsername, value),
            "pass" => Self::SetText(TextField::BrokerPassword, value),
            "ssid" => Self::SetText(TextField::Ssid, value),
            "wifipass" => Self::SetText(TextField::WifiPassword, value),
            "address" => Self::SetText(TextField::StaticAddress, value),
            "netmask" => Self::SetText(TextField::StaticNetmask, value),
            "port" => Self::SetPort(lenient_uint(value).unwrap_or(0)),
            "sleepTime" => Self::SetSleep(lenient_uint(value).unwrap_or(0)),
            "debug" => Self::SetDebug(lenient_uint::<u32>(value) == Some(1)),
            "resetmqttid" if value == CONFIRM_VALUE => Self::RegenerateClientId,
            "factorydefaults" if value == CONFIRM_VALUE => Self::FactoryDefaults,
            "reset" if value == CONFIRM_VALUE => Self::Reset,
            _ => Self::Unrecognized,
        }
    }

    /// Parse one transport line straight into a command.
    pub fn parse(line: &'a str) -> Self {
        Self::from_incoming(&IncomingCommand::parse(line))
    }
}

/// Leading-digits integer parse: optional whitespace and `+`, then digits up
/// to the first non-digit.  `None` when there are no digits, the value is
/// negative, or it overflows `T`.
pub fn lenient_uint<T: TryFrom<u64>>(s: &str) -> Option<T> {
    let s = s.trim_start();
    let s = s.strip_prefix('+').unwrap_or(s);
    let end = s.bytes().position(|b| !b.is_ascii_digit()).unwrap_or(s.len());
    if end == 0 {
        return None;
    }
    let n: u64 = s[..end].parse().ok()?;
    T::try_from(n).ok()
}
