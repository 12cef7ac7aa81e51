//! Main<->worker message types (spec §4.6 "Main -> worker messages" /
//! "Worker -> main messages").

use zrdl_config::WorkerInitConfig;

use crate::caps::TerminalCaps;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DebugCommand {
    Enable,
    Disable,
    Query,
    GetPayload { handle: u32 },
    GetStats,
    Export,
    Reset,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DebugReply {
    Ack,
    Payload { records: Vec<u8> },
    Stats { summary: String },
    Exported { bytes: Vec<u8> },
}

/// Advisory timing stats over a rolling window (spec §9 Open Question (b):
/// the exact percentile set is not a contract — see DESIGN.md).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerfSnapshot {
    pub min_tick_us: f64,
    pub mean_tick_us: f64,
    pub max_tick_us: f64,
    pub window_len: usize,
}

/// Messages the main (application host) side sends to the worker.
#[derive(Debug, Clone, PartialEq)]
pub enum MainMessage {
    Init { config: WorkerInitConfig },
    Frame { frame_seq: u64, transport: FrameTransport },
    FrameKick,
    SetConfig { config: WorkerInitConfig },
    PostUserEvent { tag: String, payload: Vec<u8> },
    EventsAck { buffer: Vec<u8> },
    GetCaps,
    Shutdown,
    Debug(DebugCommand),
    PerfSnapshotRequest,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FrameTransport {
    /// Ownership of an owned byte buffer moves to the worker.
    Transfer { bytes: Vec<u8> },
    /// No payload; the worker pulls the latest frame from the SAB mailbox.
    SabV1,
}

/// Messages the worker (engine owner) side sends to main.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerMessage {
    Ready { engine_id: String },
    Events { batch: Vec<u8>, dropped_since_last: u32 },
    FrameStatus {
        accepted_seq: Option<u64>,
        completed_seq: Option<u64>,
        completed_result: Option<i32>,
        recycled_drawlists: Vec<Vec<u8>>,
    },
    Caps(TerminalCaps),
    Fatal(FatalError),
    ShutdownComplete,
    Debug(DebugReply),
    PerfSnapshot(PerfSnapshot),
}

/// An unrecoverable worker-side error (spec §7 "Worker: fatal{where, code,
/// detail}. Not recovered; leads to shutdown").
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("fatal in {where_}: code {code}, {detail}")]
pub struct FatalError {
    pub where_: String,
    pub code: i32,
    pub detail: String,
}

impl FatalError {
    pub fn new(where_: impl Into<String>, code: i32, detail: impl Into<String>) -> Self {
        Self {
            where_: where_.into(),
            code,
            detail: detail.into(),
        }
    }
}
