use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use wispwire_frame::Frame;

#[derive(Clone, Debug, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct FrameOutput<'a> {
    kind: &'static str,
    id: u8,
    payload_size: usize,
    payload_hex: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    payload_text: Option<&'a str>,
    peer: &'a str,
    timestamp: String,
}

pub fn print_frame(frame: &Frame, peer: &str, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = FrameOutput {
                kind: "frame",
                id: frame.id,
                payload_size: frame.payload.len(),
                payload_hex: hex::encode_upper(&frame.payload),
                payload_text: printable(&frame.payload),
                peer,
                timestamp: now_unix_seconds(),
            };
            print_json(&out);
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["ID", "SIZE", "PEER", "PAYLOAD"])
                .add_row(vec![
                    frame.id.to_string(),
                    frame.payload.len().to_string(),
                    peer.to_string(),
                    payload_preview(&frame.payload),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "id={} size={} peer={} payload={}",
                frame.id,
                frame.payload.len(),
                peer,
                payload_preview(&frame.payload)
            );
        }
        OutputFormat::Raw => print_raw(&frame.payload),
    }
}

#[derive(Serialize)]
struct EncodedOutput {
    kind: &'static str,
    id: u32,
    payload_size: usize,
    wire_size: usize,
    hex: String,
}

/// Print the wire bytes produced for one frame.
pub fn print_encoded(id: u32, payload_size: usize, wire: &[u8], format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&EncodedOutput {
            kind: "encoded",
            id,
            payload_size,
            wire_size: wire.len(),
            hex: hex::encode_upper(wire),
        }),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["ID", "PAYLOAD", "WIRE", "BYTES"])
                .add_row(vec![
                    id.to_string(),
                    payload_size.to_string(),
                    wire.len().to_string(),
                    spaced_hex(wire),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => println!("{}", spaced_hex(wire)),
        OutputFormat::Raw => print_raw(wire),
    }
}

#[derive(Serialize)]
struct CountersOutput<'a, T: Serialize> {
    kind: &'a str,
    #[serde(flatten)]
    counters: &'a T,
}

/// Print a flat struct of counters. Raw output carries payload bytes only, so
/// counters are skipped there.
pub fn print_counters<T: Serialize>(kind: &str, counters: &T, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&CountersOutput { kind, counters }),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["COUNTER", "VALUE"]);
            for (name, value) in counter_rows(counters) {
                table.add_row(vec![name, value]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            let fields: Vec<String> = counter_rows(counters)
                .into_iter()
                .map(|(name, value)| format!("{name}={value}"))
                .collect();
            println!("{kind}: {}", fields.join(" "));
        }
        OutputFormat::Raw => {}
    }
}

fn counter_rows<T: Serialize>(counters: &T) -> Vec<(String, String)> {
    match serde_json::to_value(counters) {
        Ok(serde_json::Value::Object(map)) => map
            .into_iter()
            .map(|(name, value)| (name, value.to_string()))
            .collect(),
        _ => Vec::new(),
    }
}

fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

/// `AA AA 05` style hex, the way bench logs show bytes.
pub fn spaced_hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(" ")
}

fn printable(payload: &[u8]) -> Option<&str> {
    std::str::from_utf8(payload)
        .ok()
        .filter(|text| !text.chars().any(|c| c.is_control() && c != '\n' && c != '\t'))
}

fn payload_preview(payload: &[u8]) -> String {
    match printable(payload) {
        Some(text) => format!("{text:?}"),
        None => spaced_hex(payload),
    }
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
