use serde::Serialize;
use tracing::{debug, warn};
use wispwire_frame::{DecodeEvent, DecoderStats, Frame, FrameDecoder};

use crate::cmd::{parse_hex, read_file, read_stdin, Context, DecodeArgs};
use crate::exit::{frame_error, CliResult, DATA_INVALID, SUCCESS};
use crate::output::{print_counters, print_frame};

const CAPTURE_PEER: &str = "capture";

#[derive(Debug, Serialize, PartialEq, Eq)]
struct DecodeSummary {
    bytes: usize,
    frames: u64,
    crc_errors: u64,
    resyncs: u64,
    desyncs: u64,
    reserved_dropped: u64,
    partial_discarded: u64,
    /// A frame was still being assembled when the capture ended.
    truncated: bool,
}

impl DecodeSummary {
    fn new(bytes: usize, stats: DecoderStats, truncated: bool) -> Self {
        Self {
            bytes,
            frames: stats.frames,
            crc_errors: stats.crc_errors,
            resyncs: stats.resyncs,
            desyncs: stats.desyncs,
            reserved_dropped: stats.reserved,
            partial_discarded: stats.discarded,
            truncated,
        }
    }

    fn corrupted(&self) -> bool {
        self.crc_errors > 0 || self.partial_discarded > 0 || self.truncated
    }
}

pub fn run(args: DecodeArgs, ctx: &Context) -> CliResult<i32> {
    let capture = match (&args.hex, &args.file) {
        (Some(text), _) => parse_hex(text)?,
        (None, Some(path)) => read_file(path)?,
        (None, None) => read_stdin()?,
    };
    let mut decoder = args
        .wire
        .resolve(ctx.file.connection.wire)
        .decoder()
        .map_err(|err| frame_error("invalid wire format", err))?;

    let frames = decode_capture(&mut decoder, &capture);
    for frame in &frames {
        print_frame(frame, CAPTURE_PEER, ctx.format);
    }

    let summary = DecodeSummary::new(capture.len(), decoder.stats(), decoder.in_frame());
    print_counters("decoder", &summary, ctx.format);

    if args.strict && summary.corrupted() {
        warn!(
            crc_errors = summary.crc_errors,
            discarded = summary.partial_discarded,
            truncated = summary.truncated,
            "capture holds corrupt frames"
        );
        return Ok(DATA_INVALID);
    }
    Ok(SUCCESS)
}

fn decode_capture(decoder: &mut FrameDecoder, capture: &[u8]) -> Vec<Frame> {
    let mut frames = Vec::new();
    for (offset, &byte) in capture.iter().enumerate() {
        match decoder.push(byte) {
            Some(DecodeEvent::Frame(frame)) => frames.push(frame),
            Some(event) => debug!(offset, ?event, "decoder event"),
            None => {}
        }
    }
    frames
}
