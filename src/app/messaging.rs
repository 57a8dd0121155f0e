//! Messaging command transport.
//!
//! A payload on `<root>command` is either a built-in bare word
//! (`settings`, `status`, `reboot`) or a `name=value` command for the
//! interpreter.  Every request is answered, unretained, on
//! `<root><request text>`.

use core::fmt::Write;
use core::net::Ipv4Addr;

use serde::Serialize;

use super::interpreter::Outcome;
use super::ports::{MAX_LINE, StorageError};
use crate::error::CommsError;
use crate::settings::{SettingsRecord, TOPIC_SLOT};

/// Suffix of the subscribed command topic.
pub const COMMAND_SUFFIX: &str = "command";

pub const REPLY_STATUS: &str = "Status report complete";
pub const REPLY_REBOOT: &str = "REBOOTING";
pub const REPLY_OK: &str = "OK";
pub const REPLY_UNRECOGNIZED: &str = "(empty)";
pub const REPLY_REJECTED: &str = "REJECTED";
pub const REPLY_ERROR: &str = "ERROR";

/// Capacity for any topic: root plus the longest request text.
pub const TOPIC_BUF: usize = TOPIC_SLOT + MAX_LINE;
pub type TopicBuf = heapless::String<TOPIC_BUF>;

/// `root` followed by `suffix`.
pub fn topic_for(root: &str, suffix: &str) -> Result<TopicBuf, CommsError> {
    let mut topic = TopicBuf::new();
    topic
        .push_str(root)
        .and_then(|()| topic.push_str(suffix))
        .map_err(|()| CommsError::PublishFailed)?;
    Ok(topic)
}

/// One decoded request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request<'a> {
    /// Reply with the settings JSON.
    Settings,
    /// Report now, then acknowledge.
    Status,
    /// Acknowledge, then restart.
    Reboot,
    /// Hand the text to the interpreter.
    Command(&'a str),
}

impl<'a> Request<'a> {
    pub fn parse(text: &'a str) -> Self {
        match text {
            "settings" => Self::Settings,
            "status" => Self::Status,
            "reboot" => Self::Reboot,
            other => Self::Command(other),
        }
    }
}

/// Payload bytes as request text: trailing NULs dropped, invalid UTF-8 is
/// empty.
pub fn payload_text(payload: &[u8]) -> &str {
    let end = payload
        .iter()
        .rposition(|&b| b != 0)
        .map_or(0, |last| last + 1);
    core::str::from_utf8(&payload[..end]).unwrap_or("")
}

/// Reply text for an interpreted command.
pub fn command_reply(result: &Result<Outcome, StorageError>) -> &'static str {
    match result {
        Ok(Outcome::Rejected(_)) => REPLY_REJECTED,
        Ok(Outcome::Unrecognized) => REPLY_UNRECOGNIZED,
        Ok(_) => REPLY_OK,
        Err(_) => REPLY_ERROR,
    }
}

#[derive(Serialize)]
struct SettingsJson<'a> {
    broker: &'a str,
    port: u16,
    #[serde(rename = "mqttTopic")]
    mqtt_topic: &'a str,
    user: &'a str,
    pass: &'a str,
    ssid: &'a str,
    wifipass: &'a str,
    /// Carried as a string on the wire.
    #[serde(rename = "sleepTime")]
    sleep_time: heapless::String<10>,
    #[serde(rename = "mqttClientId")]
    mqtt_client_id: &'a str,
    address: &'a str,
    netmask: &'a str,
    #[serde(rename = "IP Address")]
    ip_address: heapless::String<15>,
}

/// JSON object with every setting plus the live address.
pub fn settings_json(
    record: &SettingsRecord,
    local_ip: Option<Ipv4Addr>,
) -> Result<String, serde_json::Error> {
    let mut sleep_time = heapless::String::new();
    let _ = write!(sleep_time, "{}", record.sleep_seconds);
    let mut ip_address = heapless::String::new();
    let _ = write!(ip_address, "{}", local_ip.unwrap_or(Ipv4Addr::UNSPECIFIED));

    serde_json::to_string(&SettingsJson {
        broker: &record.broker_address,
        port: record.broker_port,
        mqtt_topic: &record.topic_root,
        user: &record.broker_username,
        pass: &record.broker_password,
        ssid: &record.ssid,
        wifipass: &record.wifi_password,
        sleep_time,
        mqtt_client_id: &record.client_id,
        address: &record.static_address,
        netmask: &record.static_netmask,
        ip_address,
    })
}
