//! SysEx framing for the plugin <-> surface channel
//!
//! Frames look like `F0 00 21 69 <command> <payload...> F7`. The framer is fed
//! one byte at a time and resynchronises on garbage: anything that does not
//! continue the header drops back to header matching, realtime bytes are
//! transparent in every state.

use std::fmt;

use tracing::{debug, trace};

use crate::midi::{MidiMessage, REALTIME_MIN};

/// Start byte followed by the manufacturer ID
pub const HEADER: [u8; 4] = [0xF0, 0x00, 0x21, 0x69];

/// Manufacturer ID part of the header (what follows 0xF0)
pub const MANUFACTURER_ID: [u8; 3] = [0x00, 0x21, 0x69];

pub const START: u8 = 0xF0;
pub const END: u8 = 0xF7;

/// Payload bytes kept per frame; a frame reaching this size is closed
pub const PAYLOAD_CAPACITY: usize = 64;

/// Command byte following the header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// Plugin -> surface: loudness and peak readings
    MeterData,
    /// Surface -> plugin: resend every button state
    SyncButtons,
    Unknown(u8),
}

impl Command {
    pub const METER_DATA: u8 = 0x01;
    pub const SYNC_BUTTONS: u8 = 0x02;

    pub fn from_byte(byte: u8) -> Self {
        match byte {
            Self::METER_DATA => Command::MeterData,
            Self::SYNC_BUTTONS => Command::SyncButtons,
            other => Command::Unknown(other),
        }
    }

    pub fn to_byte(self) -> u8 {
        match self {
            Command::MeterData => Self::METER_DATA,
            Command::SyncButtons => Self::SYNC_BUTTONS,
            Command::Unknown(byte) => byte,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::MeterData => f.write_str("meter-data"),
            Command::SyncButtons => f.write_str("sync-buttons"),
            Command::Unknown(byte) => write!(f, "unknown({:02X})", byte),
        }
    }
}

/// A complete, recognised frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SysExFrame {
    pub command: Command,
    pub payload: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum State {
    /// Number of header bytes matched so far
    Matching(usize),
    AwaitCommand,
    Payload(Command),
}

/// Byte-at-a-time SysEx receiver
#[derive(Debug, Clone)]
pub struct SysExFramer {
    state: State,
    payload: Vec<u8>,
}

impl SysExFramer {
    pub fn new() -> Self {
        Self {
            state: State::Matching(0),
            payload: Vec::with_capacity(PAYLOAD_CAPACITY),
        }
    }

    /// True once a full header has been seen and the frame is still open
    pub fn is_active(&self) -> bool {
        !matches!(self.state, State::Matching(_))
    }

    /// True while part of the header has been matched
    pub fn is_matching_header(&self) -> bool {
        matches!(self.state, State::Matching(n) if n > 0)
    }

    /// Feed one byte; returns a frame when one closes with a known command
    pub fn push(&mut self, byte: u8) -> Option<SysExFrame> {
        if byte >= REALTIME_MIN {
            return None;
        }

        match self.state {
            State::Matching(matched) => {
                if byte == HEADER[matched] {
                    let matched = matched + 1;
                    self.state = if matched == HEADER.len() {
                        State::AwaitCommand
                    } else {
                        State::Matching(matched)
                    };
                } else {
                    if matched > 0 {
                        trace!(byte, matched, "SysEx header mismatch");
                    }
                    // A fresh start byte begins a new header attempt
                    self.state = State::Matching(if byte == START { 1 } else { 0 });
                }
                None
            }
            State::AwaitCommand => {
                if byte == END {
                    trace!("SysEx frame closed before its command byte");
                    self.reset();
                } else {
                    self.state = State::Payload(Command::from_byte(byte));
                }
                None
            }
            State::Payload(command) => {
                if byte == END {
                    return self.close(command);
                }
                self.payload.push(byte);
                if self.payload.len() == PAYLOAD_CAPACITY {
                    debug!(%command, "SysEx payload full, closing frame");
                    return self.close(command);
                }
                None
            }
        }
    }

    /// Feed a run of bytes, collecting every frame that closes
    pub fn push_all(&mut self, bytes: &[u8]) -> Vec<SysExFrame> {
        bytes.iter().filter_map(|&byte| self.push(byte)).collect()
    }

    pub fn reset(&mut self) {
        self.state = State::Matching(0);
        self.payload.clear();
    }

    fn close(&mut self, command: Command) -> Option<SysExFrame> {
        let payload = std::mem::take(&mut self.payload);
        self.reset();
        if let Command::Unknown(byte) = command {
            debug!("ignoring SysEx command {:02X} ({} bytes)", byte, payload.len());
            return None;
        }
        trace!(%command, len = payload.len(), "SysEx frame complete");
        Some(SysExFrame { command, payload })
    }
}

impl Default for SysExFramer {
    fn default() -> Self {
        Self::new()
    }
}

/// Full outbound frame: header, command, payload, end byte
pub fn build_frame(command: Command, payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(HEADER.len() + payload.len() + 2);
    frame.extend_from_slice(&HEADER);
    frame.push(command.to_byte());
    frame.extend(payload.iter().map(|b| b & 0x7F));
    frame.push(END);
    frame
}

/// Outbound frame as a `MidiMessage`
pub fn message(command: Command, payload: &[u8]) -> MidiMessage {
    let mut data = Vec::with_capacity(MANUFACTURER_ID.len() + payload.len() + 1);
    data.extend_from_slice(&MANUFACTURER_ID);
    data.push(command.to_byte());
    data.extend(payload.iter().map(|b| b & 0x7F));
    MidiMessage::SysEx { data }
}
