//! Decode a noisy byte stream with the tokio codec adapter.
//!
//! Run with:
//!   cargo run --example async-capture --features async

use futures_util::{SinkExt, StreamExt};
use tokio::io::AsyncWriteExt;
use tokio_util::codec::{FramedRead, FramedWrite};
use wispwire::frame::{Frame, StuffedCodec};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (mut bench, front_end) = tokio::io::duplex(4096);

    {
        let mut sink = FramedWrite::new(&mut bench, StuffedCodec::new());
        sink.send(Frame::new(1, &b"first"[..])).await?;
        // Marker runs in the payload are stuffed on the wire.
        sink.send(Frame::new(2, &[0xAA, 0xAA, 0xAA][..])).await?;
    }

    // Line noise and a half-sent frame, then one more good frame.
    bench
        .write_all(&[0x00, 0xAA, 0x13, 0xAA, 0xAA, 0xAA, 0x05, 0x09, 0x01])
        .await?;
    bench
        .write_all(&Frame::new(3, &b"after noise"[..]).encode()?)
        .await?;
    drop(bench);

    let mut frames = FramedRead::new(front_end, StuffedCodec::new());
    while let Some(frame) = frames.next().await {
        let frame = frame?;
        println!("id={} payload={:02X?}", frame.id, frame.payload.as_ref());
    }
    println!("decoder: {:?}", frames.decoder().stats());
    Ok(())
}
