//! Motor fader position translator
//!
//! The fader board speaks a 7-bit CC pair (MSB then LSB), the host side speaks
//! NRPN. Position bytes are ferried through unchanged apart from the
//! orientation flip `127 - v`, which is its own inverse.
//!
//! ## Hardware -> host
//! `Idle -> HaveMsb -> Idle`: the LSB completes the pair and the NRPN triplet
//! (parameter select, data MSB, data LSB) goes to the DAW and then the plugin.
//!
//! ## Host -> hardware
//! `Idle -> SelectSeen -> HaveData -> Idle`: parameter select, then both data
//! entry bytes in either order, then the CC pair goes to the fader board. Any
//! NRPN controller arriving out of turn drops the partial sequence.

use tracing::{debug, trace};

use crate::config::FaderConfig;
use crate::midi::{Outbound, Port};
use crate::session::Effect;

pub const NRPN_SELECT_MSB: u8 = 99;
pub const NRPN_SELECT_LSB: u8 = 98;
pub const DATA_ENTRY_MSB: u8 = 6;
pub const DATA_ENTRY_LSB: u8 = 38;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum HostState {
    #[default]
    Idle,
    SelectSeen,
    HaveLsb(u8),
    HaveMsb(u8),
}

/// Two independent assembly state machines for the fader position
#[derive(Debug, Clone)]
pub struct FaderTranslator {
    config: FaderConfig,
    channel: u8,
    pending_msb: Option<u8>,
    host: HostState,
}

impl FaderTranslator {
    pub fn new(config: FaderConfig, channel: u8) -> Self {
        Self {
            config,
            channel,
            pending_msb: None,
            host: HostState::Idle,
        }
    }

    /// True while either direction holds a partial value
    pub fn is_assembling(&self) -> bool {
        self.pending_msb.is_some() || self.host != HostState::Idle
    }

    fn orient(&self, value: u8) -> u8 {
        let value = value & 0x7F;
        if self.config.invert {
            127 - value
        } else {
            value
        }
    }

    /// CC from the fader board
    pub fn from_hardware(&mut self, cc: u8, value: u8, effects: &mut Vec<Effect>) {
        if cc == self.config.touch_cc {
            for port in Port::HOSTS {
                effects.push(Effect::Midi(Outbound::cc(port, self.channel, cc, value)));
            }
            return;
        }

        if cc == self.config.msb_cc {
            self.pending_msb = Some(value);
        } else if cc == self.config.lsb_cc {
            let Some(msb) = self.pending_msb.take() else {
                trace!(value, "fader LSB without MSB, discarded");
                return;
            };
            let (msb, lsb) = (self.orient(msb), self.orient(value));
            debug!(msb, lsb, "fader position -> host");
            for port in Port::HOSTS {
                self.push_nrpn(port, msb, lsb, effects);
            }
        }
    }

    fn push_nrpn(&self, port: Port, msb: u8, lsb: u8, effects: &mut Vec<Effect>) {
        let channel = self.channel;
        if self.config.nrpn_select_msb {
            effects.push(Effect::Midi(Outbound::cc(port, channel, NRPN_SELECT_MSB, 0)));
        }
        effects.push(Effect::Midi(Outbound::cc(
            port,
            channel,
            NRPN_SELECT_LSB,
            self.config.nrpn_parameter,
        )));
        effects.push(Effect::Midi(Outbound::cc(port, channel, DATA_ENTRY_MSB, msb)));
        effects.push(Effect::Midi(Outbound::cc(port, channel, DATA_ENTRY_LSB, lsb)));
    }

    /// CC from the DAW or plugin
    pub fn from_host(&mut self, cc: u8, value: u8, effects: &mut Vec<Effect>) {
        let next = match (cc, self.host) {
            (NRPN_SELECT_MSB, state) => state,
            (NRPN_SELECT_LSB, _) if value == self.config.nrpn_parameter => HostState::SelectSeen,
            (DATA_ENTRY_LSB, HostState::SelectSeen) => HostState::HaveLsb(value),
            (DATA_ENTRY_MSB, HostState::SelectSeen) => HostState::HaveMsb(value),
            (DATA_ENTRY_MSB, HostState::HaveLsb(lsb)) => {
                self.push_position(value, lsb, effects);
                HostState::Idle
            }
            (DATA_ENTRY_LSB, HostState::HaveMsb(msb)) => {
                self.push_position(msb, value, effects);
                HostState::Idle
            }
            (NRPN_SELECT_LSB | DATA_ENTRY_MSB | DATA_ENTRY_LSB, state) => {
                if state != HostState::Idle {
                    trace!(cc, "NRPN sequence out of order, resynchronising");
                }
                HostState::Idle
            }
            // Unrelated controllers are not part of the sequence
            (_, state) => state,
        };
        self.host = next;
    }

    fn push_position(&self, msb: u8, lsb: u8, effects: &mut Vec<Effect>) {
        let (msb, lsb) = (self.orient(msb), self.orient(lsb));
        debug!(msb, lsb, "host position -> fader");
        effects.push(Effect::Midi(Outbound::cc(
            Port::Fader,
            self.channel,
            self.config.msb_cc,
            msb,
        )));
        effects.push(Effect::Midi(Outbound::cc(
            Port::Fader,
            self.channel,
            self.config.lsb_cc,
            lsb,
        )));
    }
}
