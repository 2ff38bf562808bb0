//! Minimal test bench: accepts one front-end and answers every frame with
//! its payload reversed.
//!
//! Run with:
//!   cargo run --example bench-server
//!
//! In another terminal:
//!   cargo run --features cli -- send --tcp 127.0.0.1:5055 \
//!     --id 3 --data "hello bench" --wait --wait-timeout 3s

use wispwire::conn::{ConnError, ConnectionListener, StopMode};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let listener = ConnectionListener::bind("127.0.0.1:5055")?;
    eprintln!("Bench listening on {}", listener.local_addr());

    let mut conn = listener.accept()?;
    eprintln!("Front-end connected: {}", conn.peer());

    loop {
        match conn.receive() {
            Ok(frame) => {
                eprintln!("Received {} bytes with id {}", frame.payload.len(), frame.id);
                let reversed: Vec<u8> = frame.payload.iter().rev().copied().collect();
                conn.submit(u32::from(frame.id), &reversed)?;
            }
            Err(ConnError::ConnectionLost(reason)) => {
                eprintln!("Front-end disconnected: {reason}");
                break;
            }
            Err(e) => return Err(e.into()),
        }
    }

    let stats = conn.stop(StopMode::Graceful)?;
    eprintln!(
        "Session done: {} in, {} out, {} corrupted",
        stats.frames_received,
        stats.frames_sent,
        stats.corrupted()
    );
    Ok(())
}
