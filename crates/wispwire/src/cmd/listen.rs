use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};
use wispwire_conn::{ConnError, Connection, StopMode};

use crate::cmd::{Context, ListenArgs};
use crate::exit::{conn_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{print_counters, print_frame};

/// How long a receive waits before re-checking for Ctrl-C.
pub const INTERRUPT_POLL: Duration = Duration::from_millis(100);

pub fn run(args: ListenArgs, ctx: &Context) -> CliResult<i32> {
    let spec = args.link.resolve(ctx.file.link.as_ref())?;
    let config = ctx
        .file
        .connection
        .clone()
        .with_wire(args.wire.resolve(ctx.file.connection.wire));

    let mut conn =
        Connection::connect(&spec, config).map_err(|err| conn_error("connect failed", err))?;
    info!(peer = conn.peer(), "listening");

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let mut printed = 0usize;
    let mut lost = None;

    while running.load(Ordering::SeqCst) {
        let frame = match conn.receive_timeout(INTERRUPT_POLL) {
            Ok(frame) => frame,
            Err(ConnError::Timeout(_)) => continue,
            Err(err) => {
                lost = Some(err);
                break;
            }
        };

        if let Some(ids) = &args.ids {
            if !ids.contains(&frame.id) {
                continue;
            }
        }

        print_frame(&frame, conn.peer(), ctx.format);
        printed = printed.saturating_add(1);

        if let Some(count) = args.count {
            if printed >= count {
                break;
            }
        }
    }

    let stats = conn
        .stop(StopMode::Graceful)
        .map_err(|err| conn_error("stop failed", err))?;
    if args.stats {
        print_counters("link", &stats, ctx.format);
    }

    match lost {
        Some(err) => {
            warn!(printed, "link went away");
            Err(conn_error("receive failed", err))
        }
        None => Ok(SUCCESS),
    }
}

/// First Ctrl-C asks the loop to finish; a second one exits immediately,
/// for when the process is stuck in a blocking accept or connect.
pub fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        if !running.swap(false, Ordering::SeqCst) {
            std::process::exit(crate::exit::FAILURE);
        }
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
