//! Integration tests for fixcap
//!
//! These tests drive instrumented units end to end and read back the
//! fixture files they leave behind.

#[path = "../common/mod.rs"]
pub mod common;

pub mod capture_flow;
pub mod cli;
pub mod rotation;
