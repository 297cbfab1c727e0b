//! Virtual knobs on the rotary encoder
//!
//! One physical encoder drives several virtual knobs, each mapped to a DAW CC.
//! Positions are kept locally and followed from the DAW's echoes.

use tracing::debug;

use crate::midi::{Outbound, Port};
use crate::session::Effect;

/// LEDs around the encoder
pub const RING_SIZE: u8 = 16;

/// Hue at the bottom of the ring spectrum (blue)
const SPECTRUM_TOP_HUE: f32 = 240.0;

/// A CC the encoder can drive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VirtualKnob {
    pub cc: u8,
    /// Number of encoder positions; the CC value space is the top `range` values
    pub range: u8,
}

impl VirtualKnob {
    /// Monitor level in half-dB steps
    pub const VOLUME: VirtualKnob = VirtualKnob { cc: 7, range: 96 };
    pub const MODULATION: VirtualKnob = VirtualKnob { cc: 1, range: 128 };

    fn offset(self) -> u8 {
        (128 - self.range as u16) as u8
    }

    fn clamp(self, value: i32) -> u8 {
        value.clamp(0, self.range as i32 - 1) as u8
    }

    /// CC value sent for a position. Position 0 always sends 0.
    pub fn cc_value(self, position: u8) -> u8 {
        if position == 0 {
            0
        } else {
            position.saturating_add(self.offset()).min(127)
        }
    }

    /// Position for a CC value received from the DAW
    pub fn position_for(self, value: u8) -> u8 {
        self.clamp(value as i32 - self.offset() as i32)
    }
}

pub const KNOBS: [VirtualKnob; 2] = [VirtualKnob::VOLUME, VirtualKnob::MODULATION];

/// Snapshot of the encoder ring for the display
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RingState {
    /// Hue of each LED, in degrees
    pub hue: [u16; RING_SIZE as usize],
    /// Brightness of each LED, 0.0-1.0
    pub level: [f32; RING_SIZE as usize],
    /// The volume knob is shown saturated, other knobs white
    pub saturated: bool,
}

/// Positions of every virtual knob and which one the encoder drives
#[derive(Debug, Clone)]
pub struct KnobState {
    positions: [u8; KNOBS.len()],
    current: usize,
    hue_override: Option<u16>,
    channel: u8,
}

impl KnobState {
    pub fn new(channel: u8) -> Self {
        Self {
            positions: [0; KNOBS.len()],
            current: 0,
            hue_override: None,
            channel,
        }
    }

    pub fn current(&self) -> usize {
        self.current
    }

    pub fn position(&self, knob: usize) -> Option<u8> {
        self.positions.get(knob).copied()
    }

    /// Select the knob the encoder drives; out-of-range indices are ignored
    pub fn select(&mut self, knob: usize) {
        if knob < KNOBS.len() {
            self.current = knob;
        }
    }

    pub fn set_hue_override(&mut self, hue: Option<u16>) {
        self.hue_override = hue;
    }

    pub fn hue_override(&self) -> Option<u16> {
        self.hue_override
    }

    /// Encoder movement. Emits a CC to the DAW when the position changes.
    pub fn on_encoder(&mut self, increment: i32, effects: &mut Vec<Effect>) {
        let knob = KNOBS[self.current];
        let old = self.positions[self.current];
        let new = knob.clamp(old as i32 + increment);
        if new == old {
            return;
        }
        self.positions[self.current] = new;
        debug!(cc = knob.cc, position = new, "encoder moved");
        effects.push(Effect::Midi(Outbound::cc(
            Port::Daw,
            self.channel,
            knob.cc,
            knob.cc_value(new),
        )));
    }

    /// CC from the DAW. Returns true when it addressed one of the knobs.
    pub fn on_host_cc(&mut self, cc: u8, value: u8) -> bool {
        let mut matched = false;
        for (index, knob) in KNOBS.iter().enumerate() {
            if knob.cc == cc {
                self.positions[index] = knob.position_for(value);
                matched = true;
            }
        }
        matched
    }

    /// Monitor level in dB, rounded towards zero like the LCD shows it
    pub fn level_db(&self) -> i32 {
        let knob = VirtualKnob::VOLUME;
        let position = self.positions[0] as i32;
        (position - knob.range as i32) / 2
    }

    pub fn ring(&self) -> RingState {
        let knob = KNOBS[self.current];
        let position = self.positions[self.current] as f32;
        let per_led = knob.range as f32 / RING_SIZE as f32;

        let mut hue = [0u16; RING_SIZE as usize];
        let mut level = [0f32; RING_SIZE as usize];
        for led in 0..RING_SIZE as usize {
            hue[led] = self.hue_override.unwrap_or_else(|| {
                let fraction = (led as f32 + 1.0) / RING_SIZE as f32;
                (SPECTRUM_TOP_HUE - (fraction * SPECTRUM_TOP_HUE).round()) as u16
            });

            let floor = led as f32 * per_led;
            level[led] = if position >= floor + per_led {
                1.0
            } else if position > floor {
                (position - floor) / per_led
            } else if led == 0 && position == 0.0 {
                0.01
            } else {
                0.0
            };
            if self.hue_override.is_some() && level[led] > 0.01 {
                level[led] /= 2.0;
            }
        }

        RingState {
            hue,
            level,
            saturated: self.current == 0,
        }
    }
}
