//! Runtime smoke-test entrypoint (spec §10.4): wires a builder, a mailbox
//! and an in-process fake worker loop together so the pipeline can be
//! exercised manually. Not a general-purpose CLI — there is no real PTY
//! or native engine behind it (out of scope per §1).

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;

use zrdl_builder::{DrawlistBuilder, Version};
use zrdl_mailbox::Mailbox;
use zrdl_protocol::{FakeEngine, FrameTransport, MainMessage, WorkerLoop};
use zrdl_reader::{commands, parse_header};

#[derive(Parser, Debug)]
#[command(name = "zrdl-smoke", version, about = "ZRDL runtime smoke test")]
struct Args {
    /// Optional configuration file path (overrides discovery of `zrdl.toml`).
    #[arg(long = "config")]
    config: Option<std::path::PathBuf>,
}

fn configure_logging() -> Result<Option<WorkerGuard>> {
    let log_dir = Path::new(".");
    let log_path = log_dir.join("zrdl-smoke.log");
    if log_path.exists() {
        let _ = std::fs::remove_file(&log_path);
    }

    let file_appender = tracing_appender::rolling::never(log_dir, "zrdl-smoke.log");
    let (nb_writer, guard) = tracing_appender::non_blocking(file_appender);
    match tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(nb_writer)
        .try_init()
    {
        Ok(_) => Ok(Some(guard)),
        Err(_) => Ok(None),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let _args = Args::parse();
    let _log_guard = configure_logging()?;

    info!(target: "runtime", "startup");

    let runtime = zrdl_config::load_from(_args.config)?;
    let mailbox = Arc::new(Mailbox::new(
        runtime.worker().frame_transport.slot_count as usize,
        runtime.worker().frame_transport.slot_bytes as usize,
    ));

    let mut builder = DrawlistBuilder::new(Version::V3, runtime.build_caps());
    builder.clear().unwrap();
    builder.draw_text(0, 0, "zrdl smoke test", None).unwrap();
    let bytes = builder.build().unwrap();

    // Verify the drawlist we're about to hand off is well-formed before
    // publishing it, the same shape a consumer would decode it back into.
    let header = parse_header(&bytes)?;
    let mut cmd_count = 0usize;
    for cmd in commands(&bytes, &header) {
        cmd?;
        cmd_count += 1;
    }
    info!(target: "runtime", total_size = header.total_size, cmd_count, "drawlist verified");

    mailbox.publish(&bytes)?;

    let engine = FakeEngine::new((80, 24));
    let mut worker = WorkerLoop::new(engine, runtime.worker(), Some(mailbox.clone()));

    for msg in worker.handle_main_message(MainMessage::Init {
        config: runtime.worker(),
    }) {
        info!(target: "runtime", ?msg, "worker_message");
    }

    worker.handle_main_message(MainMessage::Frame {
        frame_seq: mailbox.published_seq() as u64,
        transport: FrameTransport::SabV1,
    });

    for msg in worker.tick() {
        info!(target: "runtime", ?msg, "worker_message");
    }

    if let Some(fatal) = worker.fatal() {
        warn!(target: "runtime", %fatal, "worker reported fatal error");
    }

    info!(target: "runtime", "shutdown");
    Ok(())
}
