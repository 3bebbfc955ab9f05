//! Stable exit codes for launcher commands.
//!
//! Once supervision has started the launcher exits with the child's own code
//! instead of one of these.

/// Hand-off to supervision succeeded, or shutdown was clean.
pub const OK: i32 = 0;
/// Any fatal condition: missing configuration, failed acquisition,
/// misconfigured strategy, missing credential, missing entry point, or a
/// child that could not be spawned.
pub const FATAL: i32 = 1;
