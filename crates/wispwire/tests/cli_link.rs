#![cfg(all(unix, feature = "cli"))]

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::process::{Child, Command, Output, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use bytes::BytesMut;
use wispwire_frame::{encode_frame, Decoder, Frame};

fn free_port() -> u16 {
    let probe = TcpListener::bind("127.0.0.1:0").expect("probe should bind");
    probe.local_addr().expect("probe has an address").port()
}

fn spawn_bench(addr: &str, extra: &[&str]) -> Child {
    Command::new(env!("CARGO_BIN_EXE_wispwire"))
        .args(["--log-level", "error", "--format", "json", "bench", "--bind", addr])
        .args(extra)
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("bench should start")
}

fn wait_for_bench(addr: &str, timeout: Duration) {
    let start = Instant::now();
    loop {
        if TcpStream::connect(addr).is_ok() {
            return;
        }
        if start.elapsed() >= timeout {
            panic!("bench did not come up on {addr}");
        }
        thread::sleep(Duration::from_millis(25));
    }
}

fn wait_with_deadline(mut child: Child, timeout: Duration) -> Output {
    let start = Instant::now();
    while child.try_wait().expect("child status").is_none() {
        if start.elapsed() >= timeout {
            let _ = child.kill();
            panic!("child did not exit in time");
        }
        thread::sleep(Duration::from_millis(25));
    }
    child.wait_with_output().expect("child output")
}

fn stuffed(frames: &[(u32, &[u8])]) -> Vec<u8> {
    let mut wire = BytesMut::new();
    for (id, payload) in frames {
        encode_frame(*id, payload, &mut wire).expect("frame should encode");
    }
    wire.to_vec()
}

#[test]
fn send_and_wait_against_cli_bench() {
    let addr = format!("127.0.0.1:{}", free_port());
    let bench = spawn_bench(&addr, &["--count", "1"]);
    wait_for_bench(&addr, Duration::from_secs(5));

    let output = Command::new(env!("CARGO_BIN_EXE_wispwire"))
        .args(["--log-level", "error", "--format", "json", "send"])
        .args(["--tcp", &addr, "--id", "9", "--data", "hello bench"])
        .args(["--wait", "--wait-timeout", "5s"])
        .output()
        .expect("send should run");

    assert!(output.status.success(), "{output:?}");
    let reply: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("reply should be json");
    assert_eq!(reply["kind"], "frame");
    assert_eq!(reply["id"], 9);
    assert_eq!(reply["payload_text"], "hello bench");

    let bench = wait_with_deadline(bench, Duration::from_secs(5));
    assert!(bench.status.success());
    let stdout = String::from_utf8_lossy(&bench.stdout);
    assert!(stdout.contains("\"kind\":\"session\""));
}

#[test]
fn send_wait_times_out_with_124() {
    let bench = TcpListener::bind("127.0.0.1:0").expect("bench should bind");
    let addr = bench.local_addr().expect("bench address").to_string();
    let silent = thread::spawn(move || {
        let (mut stream, _) = bench.accept().expect("front-end should connect");
        let mut sink = Vec::new();
        let _ = stream.read_to_end(&mut sink);
        sink
    });

    let output = Command::new(env!("CARGO_BIN_EXE_wispwire"))
        .args(["--log-level", "error", "send", "--tcp", &addr])
        .args(["--id", "2", "--hex", "AA AA 01", "--wait", "--wait-timeout", "300ms"])
        .output()
        .expect("send should run");

    assert_eq!(output.status.code(), Some(124));

    // The frame still reached the bench before the wait gave up.
    let received = silent.join().expect("bench thread");
    assert_eq!(
        Decoder::new().decode(&received),
        vec![Frame::new(2, &[0xAA, 0xAA, 0x01][..])]
    );
}

#[test]
fn send_to_closed_port_is_a_transport_error() {
    let addr = format!("127.0.0.1:{}", free_port());

    let output = Command::new(env!("CARGO_BIN_EXE_wispwire"))
        .args(["--log-level", "error", "send", "--tcp", &addr, "--data", "x"])
        .output()
        .expect("send should run");

    assert_eq!(output.status.code(), Some(3));
}

#[test]
fn listen_filters_ids_and_stops_at_count() {
    let bench = TcpListener::bind("127.0.0.1:0").expect("bench should bind");
    let addr = bench.local_addr().expect("bench address").to_string();
    let talker = thread::spawn(move || {
        let (mut stream, _) = bench.accept().expect("front-end should connect");
        let wire = stuffed(&[
            (1, b"one"),
            (2, b"skipped"),
            (1, &[0xAA, 0xAA]),
            (1, b"never read"),
        ]);
        stream.write_all(&wire).expect("frames should be written");
        // Hold the link open until the listener hangs up.
        let mut sink = Vec::new();
        let _ = stream.read_to_end(&mut sink);
    });

    let child = Command::new(env!("CARGO_BIN_EXE_wispwire"))
        .args(["--log-level", "error", "--format", "json", "listen", "--tcp", &addr])
        .args(["--ids", "1", "--count", "2", "--stats"])
        .stdout(Stdio::piped())
        .spawn()
        .expect("listen should start");
    let output = wait_with_deadline(child, Duration::from_secs(5));
    talker.join().expect("bench thread");

    assert!(output.status.success());
    let lines: Vec<serde_json::Value> = String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(|line| serde_json::from_str(line).expect("json line"))
        .collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0]["payload_text"], "one");
    assert_eq!(lines[1]["payload_hex"], "AAAA");
    assert_eq!(lines[2]["kind"], "link");
    // The fourth frame may or may not be decoded before the listener stops.
    let received = lines[2]["frames_received"].as_u64().expect("counter");
    assert!((3..=4).contains(&received), "{received}");
}

#[test]
fn listen_reports_bench_disconnect() {
    let bench = TcpListener::bind("127.0.0.1:0").expect("bench should bind");
    let addr = bench.local_addr().expect("bench address").to_string();
    let talker = thread::spawn(move || {
        let (mut stream, _) = bench.accept().expect("front-end should connect");
        stream
            .write_all(&stuffed(&[(4, b"last words")]))
            .expect("frame should be written");
    });

    let child = Command::new(env!("CARGO_BIN_EXE_wispwire"))
        .args(["--log-level", "error", "--format", "json", "listen", "--tcp", &addr])
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("listen should start");
    talker.join().expect("bench thread");
    let output = wait_with_deadline(child, Duration::from_secs(5));

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stdout).contains("last words"));
    assert!(String::from_utf8_lossy(&output.stderr).contains("connection lost"));
}
