//! Fuzz target: console line assembly and command evaluation
//!
//! Feeds arbitrary bytes through the serial line assembler, then parses and
//! evaluates every completed line (and the raw bytes as a command-topic
//! payload) against a factory record.
//!
//! Invariants checked:
//! - No panics under any byte sequence
//! - No assembled line exceeds `MAX_LINE`
//! - An evaluated record never holds a field longer than its limit
//! - A rejected command never produces a record to persist
//!
//! cargo fuzz run fuzz_command_parser

#![no_main]

use battmon::adapters::serial_console::LineAssembler;
use battmon::app::commands::Command;
use battmon::app::interpreter::{Effect, evaluate};
use battmon::app::messaging::{Request, payload_text};
use battmon::app::ports::{EntropyPort, MAX_LINE};
use battmon::settings::{SettingsRecord, TextField, generate_client_id};
use libfuzzer_sys::fuzz_target;

struct Fixed;

impl EntropyPort for Fixed {
    fn random_u16(&mut self) -> u16 {
        0x1234
    }
}

const FIELDS: [TextField; 8] = [
    TextField::BrokerAddress,
    TextField::TopicRoot,
    TextField::BrokerUsername,
    TextField::BrokerPassword,
    TextField::Ssid,
    TextField::WifiPassword,
    TextField::StaticAddress,
    TextField::StaticNetmask,
];

fn check(line: &str, current: &SettingsRecord) {
    let cmd = Command::parse(line);
    let eval = evaluate(current, &cmd, &mut Fixed);
    match (&eval.effect, &eval.next) {
        (Effect::Rejected(_), next) => assert!(next.is_none(), "rejection must not persist"),
        (_, Some(next)) => {
            for field in FIELDS {
                assert!(next.text(field).len() <= field.max_len());
            }
        }
        _ => {}
    }
}

fuzz_target!(|data: &[u8]| {
    let current = SettingsRecord::factory_defaults(generate_client_id(&mut Fixed));

    let mut assembler = LineAssembler::new();
    for &byte in data {
        if let Some(line) = assembler.push(byte) {
            assert!(line.len() <= MAX_LINE, "assembled line exceeds MAX_LINE");
            check(&line, &current);
        }
    }

    if let Request::Command(text) = Request::parse(payload_text(data)) {
        check(text, &current);
    }
});
