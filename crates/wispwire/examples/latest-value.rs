//! Latest-value telemetry: a bench streams readings faster than the
//! front-end consumes them, and an inbound queue of capacity 1 with
//! `DropOldest` keeps only the newest one.
//!
//! Run with:
//!   cargo run --example latest-value

use std::thread;
use std::time::Duration;

use wispwire::conn::{
    Connection, ConnectionConfig, ConnectionListener, OverflowPolicy, StopMode,
};
use wispwire::transport::LinkSpec;

const TEMPERATURE: u32 = 7;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let listener = ConnectionListener::bind("127.0.0.1:0")?;
    let spec = LinkSpec::Tcp {
        addr: listener.local_addr().to_string(),
    };

    let bench = thread::spawn(move || -> Result<(), wispwire::conn::ConnError> {
        let mut conn = listener.accept()?;
        for reading in 0u16..500 {
            conn.submit(TEMPERATURE, &reading.to_be_bytes())?;
            thread::sleep(Duration::from_millis(1));
        }
        conn.stop(StopMode::Graceful)?;
        Ok(())
    });

    let config = ConnectionConfig::default().with_inbound(1, OverflowPolicy::DropOldest);
    let mut front_end = Connection::connect(&spec, config)?;

    for _ in 0..5 {
        // A slow consumer: most readings are overwritten while we sleep.
        thread::sleep(Duration::from_millis(100));
        match front_end.try_receive()? {
            Some(frame) => {
                let reading = u16::from_be_bytes([frame.payload[0], frame.payload[1]]);
                println!("latest reading: {reading}");
            }
            None => println!("no new reading"),
        }
    }

    bench
        .join()
        .map_err(|_| "bench thread panicked")??;
    let stats = front_end.stop(StopMode::Hard)?;
    println!(
        "received {} frames, kept {}, dropped {}",
        stats.frames_received,
        stats.frames_received - stats.inbound_dropped,
        stats.inbound_dropped
    );
    Ok(())
}
