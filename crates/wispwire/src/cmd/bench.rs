use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::info;
use wispwire_conn::{ConnError, Connection, ConnectionListener, OverflowPolicy, StopMode};

use crate::cmd::listen::{install_ctrlc_handler, INTERRUPT_POLL};
use crate::cmd::{BenchArgs, Context};
use crate::exit::{conn_error, CliResult, SUCCESS};
use crate::output::print_counters;

pub fn run(args: BenchArgs, ctx: &Context) -> CliResult<i32> {
    // An echo must not lose frames, so the inbound side backpressures.
    let base = &ctx.file.connection;
    let config = base
        .clone()
        .with_wire(args.wire.resolve(base.wire))
        .with_inbound(base.inbound_capacity, OverflowPolicy::Block);

    let listener = ConnectionListener::bind(&args.bind)
        .and_then(|listener| listener.with_config(config))
        .map_err(|err| conn_error("bind failed", err))?;
    info!(addr = %listener.local_addr(), "bench listening");

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let mut echoed = 0usize;

    while running.load(Ordering::SeqCst) {
        let mut conn = listener
            .accept()
            .map_err(|err| conn_error("accept failed", err))?;

        let done = echo(&conn, &running, &mut echoed, args.count)?;

        let stats = conn
            .stop(StopMode::Graceful)
            .map_err(|err| conn_error("stop failed", err))?;
        info!(
            seq = listener.accepted(),
            frames = stats.frames_received,
            corrupted = stats.corrupted(),
            "front-end session ended"
        );
        print_counters("session", &stats, ctx.format);

        if done || args.once {
            break;
        }
    }

    Ok(SUCCESS)
}

/// Echo frames until the front-end leaves, Ctrl-C, or `limit` frames in
/// total. Returns whether the limit was reached.
fn echo(
    conn: &Connection,
    running: &AtomicBool,
    echoed: &mut usize,
    limit: Option<usize>,
) -> CliResult<bool> {
    while running.load(Ordering::SeqCst) {
        let frame = match conn.receive_timeout(INTERRUPT_POLL) {
            Ok(frame) => frame,
            Err(ConnError::Timeout(_)) => continue,
            Err(ConnError::ConnectionLost(reason)) => {
                info!(%reason, "front-end disconnected");
                return Ok(false);
            }
            Err(err) => return Err(conn_error("receive failed", err)),
        };

        match conn.send_frame(frame) {
            Ok(_) => {}
            Err(ConnError::ConnectionLost(reason)) => {
                info!(%reason, "front-end disconnected before the echo");
                return Ok(false);
            }
            Err(err) => return Err(conn_error("echo failed", err)),
        }
        *echoed = echoed.saturating_add(1);

        if limit.is_some_and(|limit| *echoed >= limit) {
            return Ok(true);
        }
    }
    Ok(false)
}
