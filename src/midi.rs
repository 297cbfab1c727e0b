//! MIDI message types and logical port addressing
//!
//! Provides parsing and encoding for the handful of MIDI messages the surface
//! speaks, plus the `Port`/`PortMask` pair used to address the host-side
//! destinations.

use serde::{Deserialize, Serialize};
use std::fmt;

/// First status byte of the realtime category (clock, start, stop, ...)
pub const REALTIME_MIN: u8 = 0xF8;

/// MIDI message types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MidiMessage {
    /// Note Off: channel (0-15), note (0-127), velocity (0-127)
    NoteOff { channel: u8, note: u8, velocity: u8 },

    /// Note On: channel (0-15), note (0-127), velocity (0-127)
    ///
    /// Velocity 0 is kept as a Note On: the surface uses it as the "off" state.
    NoteOn { channel: u8, note: u8, velocity: u8 },

    /// Control Change: channel (0-15), cc (0-127), value (0-127)
    ControlChange { channel: u8, cc: u8, value: u8 },

    /// System Exclusive body, without the 0xF0/0xF7 framing bytes
    SysEx { data: Vec<u8> },

    /// Single-byte realtime message (0xF8-0xFF)
    Realtime(u8),
}

impl MidiMessage {
    /// Parse a MIDI message from raw bytes
    pub fn parse(data: &[u8]) -> Option<Self> {
        let (&status, rest) = data.split_first()?;

        // Running status is never produced by the USB hosts we talk to
        if status < 0x80 {
            return None;
        }

        if status >= REALTIME_MIN {
            return Some(MidiMessage::Realtime(status));
        }

        let channel = status & 0x0F;
        match status & 0xF0 {
            0x80 if rest.len() >= 2 => Some(MidiMessage::NoteOff {
                channel,
                note: rest[0] & 0x7F,
                velocity: rest[1] & 0x7F,
            }),
            0x90 if rest.len() >= 2 => Some(MidiMessage::NoteOn {
                channel,
                note: rest[0] & 0x7F,
                velocity: rest[1] & 0x7F,
            }),
            0xB0 if rest.len() >= 2 => Some(MidiMessage::ControlChange {
                channel,
                cc: rest[0] & 0x7F,
                value: rest[1] & 0x7F,
            }),
            0xF0 if status == 0xF0 => {
                let end = rest.iter().position(|&b| b == 0xF7)?;
                Some(MidiMessage::SysEx {
                    data: rest[..end].to_vec(),
                })
            }
            _ => None,
        }
    }

    /// Encode the message to MIDI bytes
    pub fn encode(&self) -> Vec<u8> {
        match *self {
            MidiMessage::NoteOff { channel, note, velocity } => {
                vec![0x80 | (channel & 0x0F), note & 0x7F, velocity & 0x7F]
            }
            MidiMessage::NoteOn { channel, note, velocity } => {
                vec![0x90 | (channel & 0x0F), note & 0x7F, velocity & 0x7F]
            }
            MidiMessage::ControlChange { channel, cc, value } => {
                vec![0xB0 | (channel & 0x0F), cc & 0x7F, value & 0x7F]
            }
            MidiMessage::SysEx { ref data } => {
                let mut result = Vec::with_capacity(data.len() + 2);
                result.push(0xF0);
                result.extend_from_slice(data);
                result.push(0xF7);
                result
            }
            MidiMessage::Realtime(status) => vec![status],
        }
    }

    /// Get the channel for channel messages (0-15), None for system messages
    pub fn channel(&self) -> Option<u8> {
        match *self {
            MidiMessage::NoteOff { channel, .. }
            | MidiMessage::NoteOn { channel, .. }
            | MidiMessage::ControlChange { channel, .. } => Some(channel),
            _ => None,
        }
    }
}

impl fmt::Display for MidiMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            MidiMessage::NoteOff { channel, note, velocity } => {
                write!(f, "NoteOff ch:{} n:{} v:{}", channel + 1, note, velocity)
            }
            MidiMessage::NoteOn { channel, note, velocity } => {
                write!(f, "NoteOn ch:{} n:{} v:{}", channel + 1, note, velocity)
            }
            MidiMessage::ControlChange { channel, cc, value } => {
                write!(f, "CC ch:{} cc:{} v:{}", channel + 1, cc, value)
            }
            MidiMessage::SysEx { ref data } => write!(f, "SysEx {} bytes", data.len()),
            MidiMessage::Realtime(status) => write!(f, "Realtime {:02X}", status),
        }
    }
}

/// Logical MIDI endpoints of the surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Port {
    /// Host DAW remote-control port
    Daw,
    /// Monitor plugin port (metering SysEx, plugin parameters)
    Plugin,
    /// Serial link to the motor fader board
    Fader,
    /// Port used to calibrate/update the motor fader board
    Calibration,
}

impl Port {
    pub const ALL: [Port; 4] = [Port::Daw, Port::Plugin, Port::Fader, Port::Calibration];

    /// Host-side destinations, in the order messages are fanned out to them
    pub const HOSTS: [Port; 2] = [Port::Daw, Port::Plugin];

    /// Bit of this port in a `PortMask` (zero for hardware-side ports)
    const fn bit(self) -> u8 {
        match self {
            Port::Daw => 0b01,
            Port::Plugin => 0b10,
            Port::Fader | Port::Calibration => 0,
        }
    }

    pub fn is_host(self) -> bool {
        self.bit() != 0
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Port::Daw => "daw",
            Port::Plugin => "plugin",
            Port::Fader => "fader",
            Port::Calibration => "calibration",
        };
        f.write_str(name)
    }
}

/// Set of host-side destinations a button talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PortMask(u8);

impl PortMask {
    pub const NONE: PortMask = PortMask(0);
    pub const DAW: PortMask = PortMask(Port::Daw.bit());
    pub const PLUGIN: PortMask = PortMask(Port::Plugin.bit());
    pub const BOTH: PortMask = PortMask(Port::Daw.bit() | Port::Plugin.bit());

    pub fn contains(self, port: Port) -> bool {
        let bit = port.bit();
        bit != 0 && self.0 & bit == bit
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Ports in this mask, DAW first
    pub fn ports(self) -> impl Iterator<Item = Port> {
        Port::HOSTS.into_iter().filter(move |port| self.contains(*port))
    }
}

/// A MIDI message addressed to one logical port
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outbound {
    pub port: Port,
    pub message: MidiMessage,
}

impl Outbound {
    pub fn new(port: Port, message: MidiMessage) -> Self {
        Self { port, message }
    }

    pub fn note_on(port: Port, channel: u8, note: u8, velocity: u8) -> Self {
        Self::new(port, MidiMessage::NoteOn { channel, note, velocity })
    }

    pub fn cc(port: Port, channel: u8, cc: u8, value: u8) -> Self {
        Self::new(port, MidiMessage::ControlChange { channel, cc, value })
    }
}

impl fmt::Display for Outbound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.message, self.port)
    }
}

/// Format MIDI bytes as hex string for debugging
pub fn format_hex(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_note_on_velocity_zero_stays_note_on() {
        let msg = MidiMessage::parse(&[0x90, 12, 0]).unwrap();
        assert_eq!(
            msg,
            MidiMessage::NoteOn {
                channel: 0,
                note: 12,
                velocity: 0,
            }
        );
    }

    #[test]
    fn test_control_change() {
        let msg = MidiMessage::parse(&[0xB0, 32, 45]).unwrap();
        assert_eq!(
            msg,
            MidiMessage::ControlChange {
                channel: 0,
                cc: 32,
                value: 45,
            }
        );
    }

    #[test]
    fn test_sysex_body_excludes_framing() {
        let msg = MidiMessage::parse(&[0xF0, 0x00, 0x21, 0x69, 0x02, 0xF7]).unwrap();
        assert_eq!(
            msg,
            MidiMessage::SysEx {
                data: vec![0x00, 0x21, 0x69, 0x02],
            }
        );
        assert_eq!(msg.encode(), vec![0xF0, 0x00, 0x21, 0x69, 0x02, 0xF7]);
    }

    #[test]
    fn test_truncated_and_running_status_rejected() {
        assert_eq!(MidiMessage::parse(&[]), None);
        assert_eq!(MidiMessage::parse(&[0x90, 60]), None);
        assert_eq!(MidiMessage::parse(&[60, 100]), None);
        assert_eq!(MidiMessage::parse(&[0xF0, 0x00, 0x21]), None);
    }

    #[test]
    fn test_realtime() {
        assert_eq!(MidiMessage::parse(&[0xF8]), Some(MidiMessage::Realtime(0xF8)));
        assert_eq!(MidiMessage::Realtime(0xFE).channel(), None);
    }

    #[test]
    fn test_encode_note_on() {
        let msg = MidiMessage::NoteOn {
            channel: 0,
            note: 60,
            velocity: 127,
        };
        assert_eq!(msg.encode(), vec![0x90, 60, 127]);
    }

    #[test]
    fn test_port_mask_membership() {
        assert!(PortMask::DAW.contains(Port::Daw));
        assert!(!PortMask::DAW.contains(Port::Plugin));
        assert!(PortMask::BOTH.contains(Port::Plugin));
        assert!(!PortMask::BOTH.contains(Port::Fader));
        assert!(!PortMask::NONE.contains(Port::Daw));
        assert!(PortMask::NONE.is_empty());
        assert_eq!(PortMask::BOTH.ports().collect::<Vec<_>>(), vec![Port::Daw, Port::Plugin]);
    }

    #[test]
    fn test_format_hex() {
        assert_eq!(format_hex(&[0xF0, 0x00, 0x21, 0x69]), "F0 00 21 69");
    }
}
