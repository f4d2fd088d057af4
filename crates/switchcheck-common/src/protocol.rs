//! Frame helper protocol shared by `frame-probe` and the orchestrator.
//!
//! | exit | `send`        | `expect`                    |
//! |------|---------------|-----------------------------|
//! | 0    | transmitted   | exact frame observed        |
//! | 1    | -             | timeout without exact match |
//! | 2    | helper error  | helper error                |
//!
//! Any other exit code, or death by signal, is treated as a helper error too.

/// First line printed by `expect` once its socket is bound.
pub const READY_LINE: &str = "READY";
/// Printed by `expect` on an exact match.
pub const MATCH_LINE: &str = "MATCH";
/// Printed by `expect` when the window closes with nothing captured.
pub const NO_PACKETS_LINE: &str = "No packets received";

pub const EXIT_OK: u8 = 0;
pub const EXIT_NO_MATCH: u8 = 1;
pub const EXIT_ERROR: u8 = 2;
