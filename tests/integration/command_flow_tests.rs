//! Operator commands over both transports: serial console and the broker's
//! command topic.

use battmon::adapters::nvs::NvsRecordStorage;
use battmon::app::events::AppEvent;
use battmon::app::interpreter::Outcome;
use battmon::app::lifecycle::LifecycleController;
use battmon::fsm::StateId;
use battmon::settings::layout::{MAGIC, RecordStatus};
use battmon::settings::{CLIENT_ID_MAX, Rejection, SSID_MAX, TextField};

use crate::mock_node::{MockNode, RecordingSink, boot, provisioned_storage, provisioned_with};

/// Storage holding factory defaults, as after the first-boot restart.
fn defaults_storage() -> NvsRecordStorage {
    let mut node = MockNode::new();
    let mut sink = RecordingSink::new();
    let ctl = boot(NvsRecordStorage::erased(), &mut node, &mut sink);
    let mut storage = ctl.into_storage();
    storage.power_cycle();
    storage
}

fn awaiting() -> (LifecycleController<NvsRecordStorage>, MockNode, RecordingSink) {
    let mut node = MockNode::new();
    let mut sink = RecordingSink::new();
    let ctl = boot(defaults_storage(), &mut node, &mut sink);
    assert_eq!(ctl.state(), StateId::AwaitingConfiguration);
    (ctl, node, sink)
}

/// A node that has reported once and is listening on `sensor/command`.
fn reporting(storage: NvsRecordStorage) -> (LifecycleController<NvsRecordStorage>, MockNode, RecordingSink) {
    let mut node = MockNode::new();
    let mut sink = RecordingSink::new();
    let mut ctl = boot(storage, &mut node, &mut sink);
    ctl.tick(&mut node, &mut sink);
    assert!(node.connected);
    node.published.clear();
    (ctl, node, sink)
}

/// Deliver one message and give the controller a tick to answer it.
fn ask(
    ctl: &mut LifecycleController<NvsRecordStorage>,
    node: &mut MockNode,
    sink: &mut RecordingSink,
    payload: &str,
) {
    node.deliver(payload);
    node.advance(50);
    ctl.tick(node, sink);
}

// ── Serial console ────────────────────────────────────────────

#[test]
fn four_commands_complete_the_configuration() {
    let (mut ctl, mut node, mut sink) = awaiting();

    let lines = ["ssid=HomeNet\r\n", "wifipass=hunter22\n", "broker=10.0.0.2\n"];
    for line in lines {
        let outcome = ctl.apply_command(line, &mut node, &mut sink).unwrap();
        assert_eq!(outcome, Outcome::Saved { restart: true, complete: false });
    }
    let outcome = ctl
        .apply_command("mqttTopic=sensor/\n", &mut node, &mut sink)
        .unwrap();
    assert_eq!(outcome, Outcome::Saved { restart: true, complete: true });
    assert_eq!(&ctl.store().storage().durable()[..2], &MAGIC.to_le_bytes());

    let mut storage = ctl.into_storage();
    storage.power_cycle();
    let mut node = MockNode::new();
    let mut sink = RecordingSink::new();
    let ctl = boot(storage, &mut node, &mut sink);
    assert_eq!(ctl.store().status(), RecordStatus::Valid);
    assert_eq!(ctl.state(), StateId::Active);
    assert_eq!(ctl.settings().ssid.as_str(), "HomeNet");
}

#[test]
fn console_setting_change_restarts() {
    let (mut ctl, mut node, mut sink) = awaiting();

    node.type_line("ssid=HomeNet\r\n");
    ctl.tick(&mut node, &mut sink);

    assert_eq!(ctl.settings().ssid.as_str(), "HomeNet");
    assert_eq!(ctl.state(), StateId::Restarting);

    node.advance(2000);
    ctl.tick(&mut node, &mut sink);
    assert_eq!(node.restarts, 1);
}

#[test]
fn sleep_and_debug_apply_without_restart() {
    let (mut ctl, mut node, mut sink) = awaiting();

    node.type_line("sleepTime=30\n");
    ctl.tick(&mut node, &mut sink);
    node.type_line("debug=1\n");
    ctl.tick(&mut node, &mut sink);

    assert_eq!(ctl.settings().sleep_seconds, 30);
    assert!(ctl.settings().debug);
    assert_eq!(ctl.state(), StateId::AwaitingConfiguration);
    assert!(!ctl.runtime().pending_restart);

    node.type_line("debug=yes\n");
    ctl.tick(&mut node, &mut sink);
    assert!(!ctl.settings().debug);
    battmon::app::lifecycle::apply_log_level(false);
}

#[test]
fn over_length_value_is_rejected_without_mutation() {
    let (mut ctl, mut node, mut sink) = awaiting();
    ctl.apply_command("ssid=Before\n", &mut node, &mut sink).unwrap();

    let line = format!("ssid={}\n", "x".repeat(SSID_MAX + 1));
    let outcome = ctl.apply_command(&line, &mut node, &mut sink).unwrap();

    assert_eq!(
        outcome,
        Outcome::Rejected(Rejection::FieldTooLong { field: TextField::Ssid, max: SSID_MAX })
    );
    assert_eq!(ctl.settings().ssid.as_str(), "Before");
    assert!(sink.any(|e| matches!(e, AppEvent::CommandRejected(_))));
}

#[test]
fn max_length_value_is_kept_whole() {
    let (mut ctl, mut node, mut sink) = awaiting();
    let ssid = "s".repeat(SSID_MAX);
    ctl.apply_command(&format!("ssid={ssid}\n"), &mut node, &mut sink)
        .unwrap();
    assert_eq!(ctl.settings().ssid.as_str(), ssid);
}

#[test]
fn null_clears_a_field() {
    let (mut ctl, mut node, mut sink) = awaiting();
    ctl.apply_command("user=someone\n", &mut node, &mut sink).unwrap();
    ctl.apply_command("user=NULL\n", &mut node, &mut sink).unwrap();
    assert!(ctl.settings().broker_username.is_empty());
}

#[test]
fn topic_without_separator_is_rejected() {
    let (mut ctl, mut node, mut sink) = awaiting();
    let outcome = ctl.apply_command("mqttTopic=sensor\n", &mut node, &mut sink).unwrap();
    assert_eq!(outcome, Outcome::Rejected(Rejection::TopicMissingSeparator));
    assert!(ctl.settings().topic_root.is_empty());
}

#[test]
fn unrecognized_command_reports_settings() {
    let (mut ctl, mut node, mut sink) = awaiting();
    sink.events.clear();
    let outcome = ctl.apply_command("help\n", &mut node, &mut sink).unwrap();
    assert_eq!(outcome, Outcome::Unrecognized);
    assert!(sink.any(|e| matches!(e, AppEvent::SettingsReport(_))));
}

#[test]
fn destructive_commands_need_confirmation() {
    let (mut ctl, mut node, mut sink) = awaiting();
    let id = ctl.settings().client_id.clone();

    for line in ["factorydefaults=no\n", "reset\n", "resetmqttid=YES\n"] {
        assert_eq!(
            ctl.apply_command(line, &mut node, &mut sink).unwrap(),
            Outcome::Unrecognized
        );
    }
    assert_eq!(ctl.settings().client_id, id);
    assert!(!ctl.runtime().pending_restart);
}

#[test]
fn resetmqttid_regenerates_the_client_id() {
    let (mut ctl, mut node, mut sink) = awaiting();
    node.entropy = 0x0123;
    let outcome = ctl.apply_command("resetmqttid=yes\n", &mut node, &mut sink).unwrap();
    assert!(outcome.requests_restart());
    assert_eq!(ctl.settings().client_id.as_str(), "BatteryTest123");
}

#[test]
fn factory_defaults_wipe_everything_but_a_fresh_id() {
    let (mut ctl, mut node, mut sink) = reporting(provisioned_with(30, |r| r.debug = true));
    node.entropy = 0x00AB;
    ctl.apply_command("factorydefaults=yes\n", &mut node, &mut sink).unwrap();

    let s = ctl.settings();
    assert!(s.ssid.is_empty());
    assert!(s.topic_root.is_empty());
    assert!(!s.debug);
    assert!(!s.valid);
    assert_eq!(s.sleep_seconds, 10);
    assert_eq!(s.broker_port, 1883);
    assert_eq!(s.client_id.as_str(), "BatteryTestab");
    assert!(ctl.runtime().pending_restart);
    battmon::app::lifecycle::apply_log_level(false);
}

#[test]
fn commit_failure_keeps_running_without_restart() {
    let (mut ctl, mut node, mut sink) = awaiting();
    ctl.storage_mut().set_commit_failure(true);

    let result = ctl.apply_command("ssid=HomeNet\n", &mut node, &mut sink);
    assert!(result.is_err());
    assert!(!ctl.runtime().pending_restart);
    assert!(sink.any(|e| matches!(e, AppEvent::StorageFault(_))));
}

// ── Command topic ─────────────────────────────────────────────

#[test]
fn settings_request_returns_json() {
    let storage = provisioned_with(10, |r| {
        r.set_text(TextField::Ssid, &"n".repeat(SSID_MAX)).unwrap();
    });
    let (mut ctl, mut node, mut sink) = reporting(storage);

    ask(&mut ctl, &mut node, &mut sink, "settings");

    let reply = node.last_publish().unwrap();
    assert_eq!(reply.topic, "sensor/settings");
    assert!(!reply.retain);

    let json: serde_json::Value = serde_json::from_str(&reply.payload).unwrap();
    assert_eq!(json["ssid"].as_str().unwrap().len(), SSID_MAX);
    assert_eq!(json["broker"], "10.0.0.2");
    assert_eq!(json["port"], 1883);
    assert_eq!(json["mqttTopic"], "sensor/");
    assert_eq!(json["sleepTime"], "10");
    assert_eq!(json["mqttClientId"], "BatteryTestbeef");
    assert_eq!(json["IP Address"], "192.168.1.77");
}

/// `len` characters cycling through ones JSON has to escape.
fn escapable(len: usize, last: char) -> String {
    let mut s: String = "q\"\\".chars().cycle().take(len - 1).collect();
    s.push(last);
    s
}

#[test]
fn settings_reply_keeps_every_field_whole() {
    let fields = [
        (TextField::BrokerAddress, "broker"),
        (TextField::TopicRoot, "mqttTopic"),
        (TextField::BrokerUsername, "user"),
        (TextField::BrokerPassword, "pass"),
        (TextField::Ssid, "ssid"),
        (TextField::WifiPassword, "wifipass"),
        (TextField::StaticAddress, "address"),
        (TextField::StaticNetmask, "netmask"),
    ];
    let client_id = escapable(CLIENT_ID_MAX, 'z');
    let storage = provisioned_with(10, |r| {
        for (field, _) in fields {
            r.set_text(field, &escapable(field.max_len(), '/')).unwrap();
        }
        r.client_id = heapless::String::try_from(client_id.as_str()).unwrap();
    });
    let (mut ctl, mut node, mut sink) = reporting(storage);
    let root = ctl.settings().topic_root.clone();

    ask(&mut ctl, &mut node, &mut sink, "settings");

    let reply = node.last_publish().unwrap();
    assert_eq!(reply.topic, format!("{root}settings"));
    let json: serde_json::Value = serde_json::from_str(&reply.payload).unwrap();
    for (field, key) in fields {
        assert_eq!(json[key], escapable(field.max_len(), '/'), "{key} altered");
    }
    assert_eq!(json["mqttClientId"], client_id);
}

#[test]
fn status_request_reports_and_acknowledges() {
    let (mut ctl, mut node, mut sink) = reporting(provisioned_storage(0));

    ask(&mut ctl, &mut node, &mut sink, "status");

    assert_eq!(node.published_to("sensor/analog").len(), 1);
    assert_eq!(node.published_to("sensor/battery").len(), 1);
    let reply = node.last_publish().unwrap();
    assert_eq!(reply.topic, "sensor/status");
    assert_eq!(reply.payload, "Status report complete");
}

#[test]
fn reboot_request_acknowledges_then_restarts() {
    let (mut ctl, mut node, mut sink) = reporting(provisioned_storage(0));

    ask(&mut ctl, &mut node, &mut sink, "reboot");

    let reply = node.last_publish().unwrap();
    assert_eq!(reply.topic, "sensor/reboot");
    assert_eq!(reply.payload, "REBOOTING");
    assert_eq!(ctl.state(), StateId::Restarting);

    node.advance(2000);
    ctl.tick(&mut node, &mut sink);
    assert_eq!(node.restarts, 1);
}

#[test]
fn command_payload_is_interpreted_and_acknowledged() {
    let (mut ctl, mut node, mut sink) = reporting(provisioned_storage(0));

    ask(&mut ctl, &mut node, &mut sink, "sleepTime=60");

    let reply = node.last_publish().unwrap();
    assert_eq!(reply.topic, "sensor/sleepTime=60");
    assert_eq!(reply.payload, "OK");
    assert_eq!(ctl.settings().sleep_seconds, 60);
}

#[test]
fn reply_uses_the_root_the_request_arrived_under() {
    let (mut ctl, mut node, mut sink) = reporting(provisioned_storage(0));

    ask(&mut ctl, &mut node, &mut sink, "mqttTopic=other/");

    let reply = node.last_publish().unwrap();
    assert_eq!(reply.topic, "sensor/mqttTopic=other/");
    assert_eq!(reply.payload, "OK");
    assert_eq!(ctl.settings().topic_root.as_str(), "other/");
}

#[test]
fn unknown_payload_gets_empty_marker() {
    let (mut ctl, mut node, mut sink) = reporting(provisioned_storage(0));
    ask(&mut ctl, &mut node, &mut sink, "bogus");
    assert_eq!(node.last_publish().unwrap().payload, "(empty)");
}

#[test]
fn rejected_and_failed_commands_are_distinguished() {
    let (mut ctl, mut node, mut sink) = reporting(provisioned_storage(0));

    ask(&mut ctl, &mut node, &mut sink, "mqttTopic=nosep");
    assert_eq!(node.last_publish().unwrap().payload, "REJECTED");

    ctl.storage_mut().set_commit_failure(true);
    ask(&mut ctl, &mut node, &mut sink, "sleepTime=5");
    assert_eq!(node.last_publish().unwrap().payload, "ERROR");
}

#[test]
fn trailing_nuls_are_ignored() {
    let (mut ctl, mut node, mut sink) = reporting(provisioned_storage(0));
    ask(&mut ctl, &mut node, &mut sink, "status\0\0");
    assert_eq!(node.last_publish().unwrap().topic, "sensor/status");
}

#[test]
fn queued_messages_stop_at_a_restart() {
    let (mut ctl, mut node, mut sink) = reporting(provisioned_storage(0));

    node.deliver("reboot");
    node.deliver("sleepTime=99");
    node.advance(50);
    ctl.tick(&mut node, &mut sink);

    assert_eq!(node.last_publish().unwrap().payload, "REBOOTING");
    assert_ne!(ctl.settings().sleep_seconds, 99);
}
