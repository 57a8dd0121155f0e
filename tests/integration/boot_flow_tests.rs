//! Boot → report → sleep flows against the mock node.

use std::net::Ipv4Addr;

use battmon::adapters::nvs::NvsRecordStorage;
use battmon::app::events::AppEvent;
use battmon::fsm::StateId;
use battmon::settings::TextField;
use battmon::settings::layout::RecordStatus;

use crate::mock_node::{
    MockNode, RecordingSink, boot, provisioned_storage, provisioned_with, run_for,
};

// ── First boot ────────────────────────────────────────────────

#[test]
fn fresh_storage_writes_defaults_then_restarts_once() {
    let mut node = MockNode::new();
    let mut sink = RecordingSink::new();
    let mut ctl = boot(NvsRecordStorage::erased(), &mut node, &mut sink);

    assert_eq!(ctl.store().status(), RecordStatus::Blank);
    assert_eq!(ctl.state(), StateId::Restarting);
    // Written with the incomplete sentinel.
    assert_eq!(&ctl.store().storage().durable()[..2], &[0x00, 0x00]);

    run_for(&mut ctl, &mut node, &mut sink, 1950, 50);
    assert_eq!(node.restarts, 0);

    run_for(&mut ctl, &mut node, &mut sink, 5000, 50);
    assert_eq!(node.restarts, 1);
    assert!(sink.any(|e| matches!(e, AppEvent::Restarting)));
}

#[test]
fn after_defaults_the_node_awaits_configuration() {
    let mut node = MockNode::new();
    let mut sink = RecordingSink::new();
    let mut ctl = boot(NvsRecordStorage::erased(), &mut node, &mut sink);
    run_for(&mut ctl, &mut node, &mut sink, 2500, 50);

    let mut storage = ctl.into_storage();
    storage.power_cycle();

    let mut node = MockNode::new();
    let mut sink = RecordingSink::new();
    let mut ctl = boot(storage, &mut node, &mut sink);

    assert_eq!(ctl.store().status(), RecordStatus::Incomplete);
    assert_eq!(ctl.state(), StateId::AwaitingConfiguration);
    assert_eq!(ctl.settings().client_id.as_str(), "BatteryTestbeef");
    assert_eq!(ctl.settings().broker_port, 1883);
    assert_eq!(ctl.settings().sleep_seconds, 10);
    assert!(sink.any(|e| matches!(e, AppEvent::SettingsReport(r) if !r.complete)));

    run_for(&mut ctl, &mut node, &mut sink, 60_000, 500);
    assert!(node.sleeps.is_empty());
    assert!(node.published.is_empty());
    assert!(node.join_requests.is_empty());
    assert_eq!(node.restarts, 0);
}

#[test]
fn failed_defaults_commit_does_not_loop_restarting() {
    let mut storage = NvsRecordStorage::erased();
    storage.set_commit_failure(true);

    let mut node = MockNode::new();
    let mut sink = RecordingSink::new();
    let mut ctl = boot(storage, &mut node, &mut sink);

    assert_eq!(ctl.state(), StateId::AwaitingConfiguration);
    assert!(sink.any(|e| matches!(e, AppEvent::StorageFault(_))));

    run_for(&mut ctl, &mut node, &mut sink, 10_000, 100);
    assert_eq!(node.restarts, 0);
}

#[test]
fn unreadable_storage_is_left_untouched() {
    let mut storage = NvsRecordStorage::erased();
    storage.set_read_failure(true);

    let mut node = MockNode::new();
    let mut sink = RecordingSink::new();
    let ctl = boot(storage, &mut node, &mut sink);

    assert_eq!(ctl.state(), StateId::AwaitingConfiguration);
    assert_eq!(&ctl.store().storage().durable()[..2], &[0xFF, 0xFF]);
}

// ── Reporting wake ────────────────────────────────────────────

#[test]
fn valid_settings_report_then_sleep() {
    let mut node = MockNode::new();
    let mut sink = RecordingSink::new();
    let mut ctl = boot(provisioned_storage(10), &mut node, &mut sink);
    assert_eq!(ctl.state(), StateId::Active);

    ctl.tick(&mut node, &mut sink);

    let analog = node.published_to("sensor/analog");
    assert_eq!(analog.len(), 1);
    assert_eq!(analog[0].payload, "1589");
    assert!(analog[0].retain);
    let battery = node.published_to("sensor/battery");
    assert_eq!(battery[0].payload, "1.59");
    assert!(battery[0].retain);
    assert_eq!(node.subscriptions, vec!["sensor/command".to_string()]);
    assert_eq!(ctl.runtime().last_measurement, Some(1589));

    node.advance(399);
    ctl.tick(&mut node, &mut sink);
    assert!(node.sleeps.is_empty());

    node.advance(1);
    ctl.tick(&mut node, &mut sink);
    assert_eq!(ctl.state(), StateId::Sleeping);
    assert_eq!(node.sleeps, vec![10]);
    assert_eq!(node.left_network, 1);
}

#[test]
fn broker_params_come_from_settings() {
    let storage = provisioned_with(10, |r| {
        r.set_text(TextField::BrokerUsername, "node").unwrap();
        r.set_text(TextField::BrokerPassword, "pw").unwrap();
        r.broker_port = 8883;
    });
    let mut node = MockNode::new();
    let mut sink = RecordingSink::new();
    let mut ctl = boot(storage, &mut node, &mut sink);
    ctl.tick(&mut node, &mut sink);

    let broker = node.last_broker.clone().unwrap();
    assert_eq!(broker.host.as_str(), "10.0.0.2");
    assert_eq!(broker.port, 8883);
    assert_eq!(broker.username.as_str(), "node");
    assert_eq!(broker.password.as_str(), "pw");
    assert_eq!(broker.client_id.as_str(), "BatteryTestbeef");
}

#[test]
fn zero_sleep_never_sleeps() {
    let mut node = MockNode::new();
    let mut sink = RecordingSink::new();
    let mut ctl = boot(provisioned_storage(0), &mut node, &mut sink);

    run_for(&mut ctl, &mut node, &mut sink, 5000, 50);

    assert!(node.sleeps.is_empty());
    assert_eq!(ctl.state(), StateId::Active);
    // One report per second at the spacing floor.
    assert_eq!(node.published_to("analog").len(), 5);
}

#[test]
fn stay_awake_command_holds_off_sleep() {
    let mut node = MockNode::new();
    let mut sink = RecordingSink::new();
    let mut ctl = boot(provisioned_storage(10), &mut node, &mut sink);

    node.type_line("w\n");
    run_for(&mut ctl, &mut node, &mut sink, 5000, 50);

    assert!(ctl.runtime().stay_awake);
    assert!(sink.any(|e| matches!(e, AppEvent::StayingAwake)));
    assert!(node.sleeps.is_empty());
    assert_eq!(node.published_to("analog").len(), 1);
}

#[test]
fn debug_flag_does_not_block_sleep() {
    let storage = provisioned_with(10, |r| r.debug = true);
    let mut node = MockNode::new();
    let mut sink = RecordingSink::new();
    let mut ctl = boot(storage, &mut node, &mut sink);

    run_for(&mut ctl, &mut node, &mut sink, 1000, 50);
    assert_eq!(node.sleeps, vec![10]);
    battmon::app::lifecycle::apply_log_level(false);
}

// ── Link failures ─────────────────────────────────────────────

#[test]
fn unreachable_network_uses_full_budget_then_sleeps() {
    let mut node = MockNode::offline();
    let mut sink = RecordingSink::new();
    let mut ctl = boot(provisioned_storage(10), &mut node, &mut sink);

    ctl.tick(&mut node, &mut sink);

    // 25 polls, 24 gaps of 500 ms.
    assert_eq!(node.slept_ms, 24 * 500);
    assert!(sink.any(|e| matches!(e, AppEvent::NetworkJoinFailed)));
    assert!(node.published.is_empty());
    assert_eq!(node.connect_attempts, 0);

    run_for(&mut ctl, &mut node, &mut sink, 1000, 50);
    assert_eq!(node.sleeps, vec![10]);
    assert_eq!(node.join_requests.len(), 1);
}

#[test]
fn unreachable_broker_uses_its_budget() {
    let mut node = MockNode::new();
    node.broker_up = false;
    let mut sink = RecordingSink::new();
    let mut ctl = boot(provisioned_storage(10), &mut node, &mut sink);

    ctl.tick(&mut node, &mut sink);

    assert_eq!(node.connect_attempts, 3);
    assert_eq!(node.slept_ms, 2 * 1000);
    assert!(sink.any(|e| matches!(e, AppEvent::BrokerConnectFailed)));
    assert!(node.published.is_empty());
}

#[test]
fn console_reset_cancels_a_stalled_join() {
    let mut node = MockNode::offline();
    let mut sink = RecordingSink::new();
    let mut ctl = boot(provisioned_storage(10), &mut node, &mut sink);

    // One line per tick: the first is taken before the report, the second
    // between join polls.
    node.type_line("w\n");
    node.type_line("reset=yes\n");
    ctl.tick(&mut node, &mut sink);

    // Cancelled after the first poll, before any delay.
    assert_eq!(node.join_requests.len(), 1);
    assert_eq!(node.slept_ms, 0);
    assert!(ctl.runtime().pending_restart);

    run_for(&mut ctl, &mut node, &mut sink, 3000, 50);
    assert_eq!(ctl.state(), StateId::Restarting);
    assert_eq!(node.restarts, 1);
    assert!(node.sleeps.is_empty());
}

#[test]
fn already_joined_network_is_reused() {
    let mut node = MockNode::new();
    node.pre_join();
    let mut sink = RecordingSink::new();
    let mut ctl = boot(provisioned_storage(10), &mut node, &mut sink);

    ctl.tick(&mut node, &mut sink);
    assert!(node.join_requests.is_empty());
    assert_eq!(node.published_to("analog").len(), 1);
}

#[test]
fn sensor_failure_still_sleeps() {
    let mut node = MockNode::new();
    node.battery = None;
    let mut sink = RecordingSink::new();
    let mut ctl = boot(provisioned_storage(10), &mut node, &mut sink);

    run_for(&mut ctl, &mut node, &mut sink, 1000, 50);
    assert!(sink.any(|e| matches!(e, AppEvent::SensorFault(_))));
    assert!(node.published_to("analog").is_empty());
    assert_eq!(node.sleeps, vec![10]);
}

// ── Addressing ────────────────────────────────────────────────

#[test]
fn static_address_is_requested() {
    let storage = provisioned_with(10, |r| {
        r.set_text(TextField::StaticAddress, "10.0.0.9").unwrap();
    });
    let mut node = MockNode::new();
    let mut sink = RecordingSink::new();
    let mut ctl = boot(storage, &mut node, &mut sink);
    ctl.tick(&mut node, &mut sink);

    assert_eq!(
        node.join_requests[0].static_ip,
        Some((Ipv4Addr::new(10, 0, 0, 9), Ipv4Addr::new(255, 255, 255, 0)))
    );
    assert!(sink.any(|e| matches!(e, AppEvent::NetworkJoined(Some(ip)) if *ip == Ipv4Addr::new(10, 0, 0, 9))));
}

#[test]
fn bad_netmask_falls_back_to_dynamic() {
    let storage = provisioned_with(10, |r| {
        r.set_text(TextField::StaticAddress, "10.0.0.9").unwrap();
        r.set_text(TextField::StaticNetmask, "255.255.0").unwrap();
    });
    let mut node = MockNode::new();
    let mut sink = RecordingSink::new();
    let mut ctl = boot(storage, &mut node, &mut sink);
    ctl.tick(&mut node, &mut sink);

    assert_eq!(node.join_requests[0].static_ip, None);
    assert!(sink.any(|e| matches!(e, AppEvent::StaticAddressIgnored)));
}

// ── Update window ─────────────────────────────────────────────

#[test]
fn update_window_holds_sleep_and_success_restarts() {
    let mut node = MockNode::new();
    let mut sink = RecordingSink::new();
    let mut ctl = boot(provisioned_storage(10), &mut node, &mut sink);

    ctl.begin_update_window(&mut sink);
    run_for(&mut ctl, &mut node, &mut sink, 5000, 50);
    assert!(node.sleeps.is_empty());

    ctl.end_update_window(true, &mut sink);
    run_for(&mut ctl, &mut node, &mut sink, 3000, 50);
    assert!(node.sleeps.is_empty());
    assert_eq!(node.restarts, 1);
}

#[test]
fn failed_update_resumes_sleeping() {
    let mut node = MockNode::new();
    let mut sink = RecordingSink::new();
    let mut ctl = boot(provisioned_storage(10), &mut node, &mut sink);

    ctl.begin_update_window(&mut sink);
    run_for(&mut ctl, &mut node, &mut sink, 1000, 50);
    ctl.end_update_window(false, &mut sink);
    run_for(&mut ctl, &mut node, &mut sink, 100, 50);

    assert_eq!(node.sleeps, vec![10]);
    assert_eq!(node.restarts, 0);
}
