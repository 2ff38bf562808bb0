use std::time::{Duration, Instant};

use tracing::{debug, info};
use wispwire_conn::{ConnError, Connection, PushOutcome, StopMode};
use wispwire_frame::Frame;

use crate::cmd::{Context, SendArgs};
use crate::exit::{conn_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::print_frame;

pub fn run(args: SendArgs, ctx: &Context) -> CliResult<i32> {
    let wait_timeout = parse_duration(&args.wait_timeout)?;
    let spec = args.link.resolve(ctx.file.link.as_ref())?;
    let config = ctx
        .file
        .connection
        .clone()
        .with_wire(args.wire.resolve(ctx.file.connection.wire));
    let payload = args.payload.resolve()?;

    let mut conn =
        Connection::connect(&spec, config).map_err(|err| conn_error("connect failed", err))?;

    let outcome = conn
        .submit(args.id, &payload)
        .map_err(|err| conn_error("send failed", err))?;
    if outcome != PushOutcome::Queued {
        debug!(?outcome, "outbound queue was full");
    }

    if args.wait {
        let frame = wait_for_reply(&mut conn, args.reply_id, wait_timeout)
            .map_err(|err| conn_error("receive failed", err))?;
        print_frame(&frame, conn.peer(), ctx.format);
    }

    let stats = conn
        .stop(StopMode::Graceful)
        .map_err(|err| conn_error("send failed", err))?;
    info!(
        frames_sent = stats.frames_sent,
        bytes_sent = stats.bytes_sent,
        "send complete"
    );

    Ok(SUCCESS)
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}

trait ReplySource {
    fn next_frame(&mut self, timeout: Duration) -> Result<Frame, ConnError>;
}

impl ReplySource for Connection {
    fn next_frame(&mut self, timeout: Duration) -> Result<Frame, ConnError> {
        self.receive_timeout(timeout)
    }
}

/// Wait for the first frame, or the first with `want` as id. Other frames
/// are skipped; the deadline covers the whole wait.
fn wait_for_reply<R: ReplySource>(
    source: &mut R,
    want: Option<u8>,
    timeout: Duration,
) -> Result<Frame, ConnError> {
    let deadline = Instant::now() + timeout;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(ConnError::Timeout(timeout));
        }
        let frame = match source.next_frame(remaining) {
            Ok(frame) => frame,
            Err(ConnError::Timeout(_)) => return Err(ConnError::Timeout(timeout)),
            Err(err) => return Err(err),
        };
        match want {
            Some(id) if frame.id != id => debug!(id = frame.id, "skipping unrelated frame"),
            _ => return Ok(frame),
        }
    }
}
