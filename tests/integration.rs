//! Integration test entry point.
//!
//! Individual test modules are in tests/integration/.
//!
//! Run all integration tests:
//!   cargo test --test integration
//!
//! Run one module:
//!   cargo test --test integration scenario

#[path = "integration/common.rs"]
mod common;

#[path = "integration/scenario_tests.rs"]
mod scenario_tests;

#[path = "integration/marker_tests.rs"]
mod marker_tests;

#[path = "integration/descriptor_tests.rs"]
mod descriptor_tests;

#[path = "integration/cli_tests.rs"]
mod cli_tests;
