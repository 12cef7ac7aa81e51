//! Engine worker protocol (spec §4.6): the typed main<->worker message
//! contract, the frame-transport choice between `Transfer` and the SAB
//! mailbox, and the worker's tick loop.

mod caps;
mod debug;
mod engine;
mod events;
mod messages;
mod worker;

pub use caps::{ColorMode, TerminalCaps};
pub use debug::{clamp_debug_capacity, DEBUG_RECORD_SIZE, DEBUG_RESPONSE_CAP_MAX, DEBUG_RESPONSE_CAP_MIN};
pub use engine::{Engine, FakeEngine};
pub use events::{
    events, parse_batch_header, EventBatchBuilder, EventBatchError, EventRecord, EVENT_BATCH_HEADER_SIZE,
    EVENT_BATCH_MAGIC, EVENT_BATCH_VERSION, EVENT_HEADER_SIZE, EVENT_KIND_RESIZE, RESIZE_RECORD_SIZE,
};
pub use messages::{DebugCommand, DebugReply, FatalError, FrameTransport, MainMessage, PerfSnapshot, WorkerMessage};
pub use worker::{tick_interval, WorkerLoop, EVENT_POOL_SIZE};
