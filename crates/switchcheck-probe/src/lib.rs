//! Raw frame I/O for the `frame-probe` helper.
//!
//! The helper is the only piece of the harness that touches packet sockets.
//! It runs inside a host's execution context and speaks the exit-code
//! protocol in [`switchcheck_common::protocol`].

pub mod capture;
pub mod link;

#[cfg(test)]
pub(crate) mod test_util;

pub use switchcheck_common::protocol::{
    EXIT_ERROR, EXIT_NO_MATCH, EXIT_OK, MATCH_LINE, NO_PACKETS_LINE, READY_LINE,
};
