//! I/O adapters for launcher commands.

pub mod config;
pub mod engine;
pub mod git;
pub mod install;
pub mod probe;
pub mod process;
