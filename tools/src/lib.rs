//! Inspection tools for mpnet captures.
//!
//! A capture is the raw outbound byte stream of one peer: back-to-back
//! length-prefixed frames, exactly as written to the socket. These helpers
//! split a capture into frames and decode every message so traffic can be
//! read as JSON or as a short text listing.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use protocol::{decode_message, Message};
use serde::Serialize;
use wire::{FrameDecoder, Limits, FRAME_PREFIX_SIZE};

/// One frame of a capture.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameReport {
    pub index: usize,
    /// Byte offset of the length prefix within the capture.
    pub offset: usize,
    /// Payload size, excluding the prefix.
    pub size: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Everything decoded from a capture.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaptureReport {
    pub total_bytes: usize,
    pub frames: Vec<FrameReport>,
    /// Message count per tag name.
    pub counts: BTreeMap<String, usize>,
    /// Bytes after the last complete frame.
    pub trailing_bytes: usize,
    /// Set when framing itself failed; frames after it are unreadable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub framing_error: Option<String>,
}

/// Splits `bytes` into frames and decodes each one.
///
/// Undecodable messages are reported per frame and do not stop the scan. A
/// framing error (oversized length) does.
#[must_use]
pub fn decode_capture(bytes: &[u8], limits: &Limits) -> CaptureReport {
    let mut decoder = FrameDecoder::new(*limits);
    decoder.push(bytes);

    let mut frames = Vec::new();
    let mut counts = BTreeMap::new();
    let mut offset = 0;
    let mut framing_error = None;
    loop {
        match decoder.next_frame() {
            Ok(Some(payload)) => {
                let (message, error) = match decode_message(&payload, limits) {
                    Ok(message) => {
                        *counts.entry(format!("{:?}", message.tag())).or_insert(0) += 1;
                        (Some(message), None)
                    }
                    Err(err) => (None, Some(err.to_string())),
                };
                frames.push(FrameReport {
                    index: frames.len(),
                    offset,
                    size: payload.len(),
                    message,
                    error,
                });
                offset += FRAME_PREFIX_SIZE + payload.len();
            }
            Ok(None) => break,
            Err(err) => {
                framing_error = Some(format!("at offset {offset}: {err}"));
                break;
            }
        }
    }

    CaptureReport {
        total_bytes: bytes.len(),
        frames,
        counts,
        trailing_bytes: bytes.len() - offset,
        framing_error,
    }
}

/// Renders a report as one line per frame plus a summary.
#[must_use]
pub fn format_pretty(report: &CaptureReport) -> String {
    let mut out = String::new();
    for frame in &report.frames {
        let _ = write!(out, "#{:<5} @{:<8} {:>5}B  ", frame.index, frame.offset, frame.size);
        match (&frame.message, &frame.error) {
            (Some(message), _) => {
                let _ = writeln!(out, "{}", describe(message));
            }
            (None, Some(error)) => {
                let _ = writeln!(out, "error: {error}");
            }
            (None, None) => {
                let _ = writeln!(out, "?");
            }
        }
    }
    let _ = writeln!(
        out,
        "{} frames, {} bytes",
        report.frames.len(),
        report.total_bytes
    );
    for (tag, count) in &report.counts {
        let _ = writeln!(out, "  {tag}: {count}");
    }
    if report.trailing_bytes > 0 {
        let _ = writeln!(out, "trailing: {} bytes", report.trailing_bytes);
    }
    if let Some(error) = &report.framing_error {
        let _ = writeln!(out, "framing error {error}");
    }
    out
}

fn describe(message: &Message) -> String {
    match message {
        Message::Hello {
            version,
            protocol_hash,
        } => format!("Hello v{version} hash 0x{protocol_hash:016x}"),
        Message::Welcome => "Welcome".to_owned(),
        Message::Reject { reason } => format!("Reject \"{reason}\""),
        Message::Spawn(snapshot) => {
            let owner = snapshot
                .owner
                .map(|owner| format!(" owner {owner}"))
                .unwrap_or_default();
            format!(
                "Spawn {} {} at ({}, {}) vel ({}, {}){owner}",
                snapshot.id,
                snapshot.kind,
                snapshot.state.position.x,
                snapshot.state.position.y,
                snapshot.state.velocity.x,
                snapshot.state.velocity.y,
            )
        }
        Message::Delta(delta) => {
            let fields: Vec<String> = delta
                .changes()
                .map(|(field, value)| format!("{field:?}={value}"))
                .collect();
            format!("Delta {} {}", delta.id, fields.join(" "))
        }
        Message::Despawn { id } => format!("Despawn {id}"),
        Message::Input(event) => format!("Input {} {:?}", event.action, event.edge),
        Message::Goodbye => "Goodbye".to_owned(),
    }
}
