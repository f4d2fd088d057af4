//! Exact-match capture window used by `frame-probe expect`.

use std::time::{Duration, Instant};

use switchcheck_common::frame::encode_hex;

use crate::link::RawLink;
use crate::NO_PACKETS_LINE;

/// Cap on frames retained for diagnostics.
pub const MAX_RETAINED: usize = 64;

#[derive(Debug, PartialEq, Eq)]
pub enum CaptureOutcome {
    Matched,
    /// Window elapsed; carries the non-matching frames seen meanwhile.
    Missed { frames: Vec<Vec<u8>>, total: usize },
}

impl CaptureOutcome {
    /// Diagnostic lines for a missed capture: one hex line per retained frame.
    pub fn diagnostics(&self) -> Vec<String> {
        match self {
            CaptureOutcome::Matched => Vec::new(),
            CaptureOutcome::Missed { frames, .. } if frames.is_empty() => {
                vec![NO_PACKETS_LINE.to_string()]
            }
            CaptureOutcome::Missed { frames, total } => {
                let mut lines: Vec<String> = frames.iter().map(|f| encode_hex(f)).collect();
                if *total > frames.len() {
                    lines.push(format!("... {} more frames", total - frames.len()));
                }
                lines
            }
        }
    }
}

/// Accumulates captured frames until one equals the expected bytes.
pub struct Capture<'a> {
    expected: &'a [u8],
    frames: Vec<Vec<u8>>,
    total: usize,
}

impl<'a> Capture<'a> {
    pub fn new(expected: &'a [u8]) -> Self {
        Self {
            expected,
            frames: Vec::new(),
            total: 0,
        }
    }

    /// Record a captured frame. Returns `true` on an exact match.
    pub fn offer(&mut self, frame: &[u8]) -> bool {
        if frame == self.expected {
            return true;
        }
        self.total += 1;
        if self.frames.len() < MAX_RETAINED {
            self.frames.push(frame.to_vec());
        }
        false
    }

    pub fn missed(self) -> CaptureOutcome {
        CaptureOutcome::Missed {
            frames: self.frames,
            total: self.total,
        }
    }
}

/// Read from `link` until `expected` arrives or `timeout` elapses.
pub fn expect_frame(
    link: &RawLink,
    expected: &[u8],
    timeout: Duration,
) -> std::io::Result<CaptureOutcome> {
    let deadline = Instant::now() + timeout;
    let mut capture = Capture::new(expected);
    while let Some(frame) = link.recv_incoming(deadline)? {
        if capture.offer(&frame) {
            return Ok(CaptureOutcome::Matched);
        }
    }
    Ok(capture.missed())
}
