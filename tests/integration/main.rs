//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that drives the lifecycle controller
//! against the mock node.  All tests run on the host with no real hardware
//! required.

mod boot_flow_tests;
mod command_flow_tests;
mod mock_node;
