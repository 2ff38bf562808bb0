use bytes::BytesMut;
use tracing::debug;

use crate::cmd::{Context, EncodeArgs};
use crate::exit::{frame_error, CliResult, SUCCESS};
use crate::output::print_encoded;

pub fn run(args: EncodeArgs, ctx: &Context) -> CliResult<i32> {
    let wire = args.wire.resolve(ctx.file.connection.wire);
    let payload = args.payload.resolve()?;

    let mut buf = BytesMut::new();
    wire.encode(args.id, &payload, &mut buf)
        .map_err(|err| frame_error("encode failed", err))?;
    debug!(
        id = args.id,
        payload = payload.len(),
        wire_size = buf.len(),
        format = ?wire,
        "encoded frame"
    );

    print_encoded(args.id, payload.len(), &buf, ctx.format);
    Ok(SUCCESS)
}
