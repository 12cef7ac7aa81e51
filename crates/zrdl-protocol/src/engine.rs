//! The native engine boundary (spec §5 "the native engine is owned
//! exclusively by the worker; the main side never calls it").
//!
//! `Engine` is the seam an idiomatic Rust port adds: the spec's source
//! language calls directly into a native addon, which in this port is
//! anything implementing this trait. Production code would back it with a
//! PTY-driving terminal engine; tests use [`FakeEngine`].

use crate::caps::TerminalCaps;
use crate::messages::{DebugCommand, DebugReply, FatalError};

pub trait Engine: Send {
    /// Submit a drawlist for rendering. Returns `0` on success, a negative
    /// error code otherwise (spec §4.6 `completed_result`).
    fn submit(&mut self, bytes: &[u8]) -> i32;

    /// Flush the last submitted drawlist to the PTY. Only called after a
    /// tick that actually submitted something.
    fn present(&mut self);

    /// Non-blocking poll for one input event's encoded body, or `None`.
    fn poll_event(&mut self) -> Option<Vec<u8>>;

    fn caps(&self) -> TerminalCaps;

    /// Host viewport size, used for the synthetic initial RESIZE batch.
    fn viewport(&self) -> (u32, u32);

    fn debug(&mut self, cmd: DebugCommand) -> Result<DebugReply, FatalError>;
}

/// A deterministic, in-memory [`Engine`] for tests: submission always
/// succeeds unless primed to fail, and events are served from a queue.
#[derive(Debug, Default)]
pub struct FakeEngine {
    pub caps: TerminalCaps,
    pub viewport: (u32, u32),
    pub queued_events: std::collections::VecDeque<Vec<u8>>,
    pub submit_result: i32,
    pub submitted: Vec<Vec<u8>>,
    pub presents: u32,
}

impl FakeEngine {
    pub fn new(viewport: (u32, u32)) -> Self {
        Self {
            viewport,
            submit_result: 0,
            ..Default::default()
        }
    }
}

impl Engine for FakeEngine {
    fn submit(&mut self, bytes: &[u8]) -> i32 {
        self.submitted.push(bytes.to_vec());
        self.submit_result
    }

    fn present(&mut self) {
        self.presents += 1;
    }

    fn poll_event(&mut self) -> Option<Vec<u8>> {
        self.queued_events.pop_front()
    }

    fn caps(&self) -> TerminalCaps {
        self.caps
    }

    fn viewport(&self) -> (u32, u32) {
        self.viewport
    }

    fn debug(&mut self, cmd: DebugCommand) -> Result<DebugReply, FatalError> {
        match cmd {
            DebugCommand::Enable | DebugCommand::Disable | DebugCommand::Reset => Ok(DebugReply::Ack),
            DebugCommand::Query | DebugCommand::GetStats => Ok(DebugReply::Stats {
                summary: "fake engine".into(),
            }),
            DebugCommand::GetPayload { .. } => Ok(DebugReply::Payload { records: Vec::new() }),
            DebugCommand::Export => Ok(DebugReply::Exported { bytes: Vec::new() }),
        }
    }
}
