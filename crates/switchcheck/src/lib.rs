//! Frame-level conformance harness for a learning switch.
//!
//! The switch under test runs as a child process configured over its stdin
//! shell. Each verification step arms one listener per expectation inside
//! the hosts' execution contexts, injects a single stimulus frame, and then
//! resolves every listener in arming order against its pass policy. The
//! first violated expectation stops the run.

pub mod driver;
pub mod error;
pub mod evaluate;
pub mod expect;
pub mod host;
pub mod inject;
pub mod suite;
pub mod switch;

pub use switchcheck_common as common;
