//! Deterministic, pure logic shared by the launcher.
//!
//! Core modules must be free of I/O side effects. They operate on values
//! captured once at startup (environment snapshot, host observations) and
//! return deterministic outputs suitable for tests.

pub mod config;
pub mod mask;
pub mod platform;
pub mod probe;
pub mod strategy;
pub mod types;
