//! Controller session
//!
//! Owns every piece of protocol state (edge tracker, LED mirror, fader
//! assembly, SysEx framer) and processes one input at a time. Each entry point
//! returns the effects it produced, in order; the caller applies them to the
//! LED lines and MIDI ports.

use std::fmt;

use tracing::{debug, trace};

use crate::buttons::{ButtonRouter, CommandHandler, LedBank};
use crate::config::{AppConfig, StartupConfig};
use crate::fader::FaderTranslator;
use crate::input::{ButtonEdge, EdgeTracker};
use crate::meters::{MeterFrame, MeterSink};
use crate::midi::{format_hex, MidiMessage, Outbound, Port, REALTIME_MIN};
use crate::routing::{Led, RoutingTable, LED_COUNT};
use crate::surface::Surface;
use crate::sysex::{self, Command, SysExFrame, SysExFramer};

/// Something the session wants done to the outside world
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Send a message on a logical port
    Midi(Outbound),
    /// Forward bytes verbatim (calibration passthrough)
    Raw { port: Port, bytes: Vec<u8> },
    /// Drive an LED output line
    Led { led: Led, on: bool },
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Effect::Midi(outbound) => write!(f, "{}", outbound),
            Effect::Raw { port, bytes } => write!(f, "raw [{}] -> {}", format_hex(bytes), port),
            Effect::Led { led, on } => write!(f, "{} {}", led, if *on { "on" } else { "off" }),
        }
    }
}

/// Everything the session hands off to the rest of the controller
pub trait SurfaceHandler: CommandHandler + MeterSink {
    /// Rotary encoder movement
    fn encoder_moved(&mut self, _increment: i32, _effects: &mut Vec<Effect>) {}

    /// CC from the DAW
    fn host_control(&mut self, _cc: u8, _value: u8) {}
}

/// Single-owner protocol state of one control surface
pub struct ControllerSession<H: SurfaceHandler = Surface> {
    tracker: EdgeTracker,
    router: ButtonRouter,
    leds: LedBank,
    fader: FaderTranslator,
    daw_framer: SysExFramer,
    plugin_framer: SysExFramer,
    handler: H,
    channel: u8,
    startup: StartupConfig,
    calibration: bool,
}

impl ControllerSession<Surface> {
    /// Session driving the standard surface
    pub fn with_surface(config: &AppConfig) -> Self {
        Self::new(config, Surface::new(config.midi.wire_channel()))
    }
}

impl<H: SurfaceHandler> ControllerSession<H> {
    pub fn new(config: &AppConfig, handler: H) -> Self {
        let channel = config.midi.wire_channel();
        Self {
            tracker: EdgeTracker::new(config.buttons.debounce_ms),
            router: ButtonRouter::new(RoutingTable::standard(), channel, config.buttons.led_policy),
            leds: LedBank::default(),
            fader: FaderTranslator::new(config.fader.clone(), channel),
            daw_framer: SysExFramer::new(),
            plugin_framer: SysExFramer::new(),
            handler,
            channel,
            startup: config.startup.clone(),
            calibration: config.midi.calibration_port.is_some(),
        }
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }

    pub fn leds(&self) -> &LedBank {
        &self.leds
    }

    pub fn router(&self) -> &ButtonRouter {
        &self.router
    }

    pub fn shift_active(&self) -> bool {
        self.tracker.shift_active()
    }

    /// Power-on sequence: all LEDs off (or on in test mode), then ask the
    /// plugin to resend its button states.
    pub fn startup(&mut self) -> Vec<Effect> {
        let mut effects = Vec::new();
        let on = self.startup.test_mode;
        for line in 0..LED_COUNT {
            let led = Led(line);
            self.leds.set(led, on);
            effects.push(Effect::Led { led, on });
        }
        if self.startup.sync_buttons {
            effects.push(Effect::Midi(Outbound::new(
                Port::Plugin,
                sysex::message(Command::SyncButtons, &[]),
            )));
        }
        effects
    }

    /// Periodic tick: sample the polled bank and flush debounced edges
    pub fn tick(&mut self, polled_levels: u16, now_ms: u64) -> Vec<Effect> {
        let mut edges = self.tracker.sample_polled(polled_levels, now_ms);
        edges.extend(self.tracker.settle(now_ms));
        let mut effects = Vec::new();
        for edge in edges {
            self.route_edge(edge, &mut effects);
        }
        effects
    }

    /// Pin-change notification from the event-driven bank
    pub fn pin_changed(&mut self, line: u8, level: bool, now_ms: u64) -> Vec<Effect> {
        let mut effects = Vec::new();
        if let Some(edge) = self.tracker.on_pin_change(line, level, now_ms) {
            self.route_edge(edge, &mut effects);
        }
        effects
    }

    fn route_edge(&mut self, edge: ButtonEdge, effects: &mut Vec<Effect>) {
        let shifted = self.tracker.shift_active();
        self.router
            .on_button_edge(edge, shifted, &mut self.leds, effects);
    }

    /// Rotary encoder movement
    pub fn encoder_moved(&mut self, increment: i32) -> Vec<Effect> {
        let mut effects = Vec::new();
        self.handler.encoder_moved(increment, &mut effects);
        effects
    }

    /// Raw bytes received on a port
    pub fn midi_received(&mut self, port: Port, bytes: &[u8]) -> Vec<Effect> {
        let mut effects = Vec::new();
        if bytes.is_empty() {
            return effects;
        }

        match port {
            Port::Calibration => {
                effects.push(Effect::Raw {
                    port: Port::Fader,
                    bytes: bytes.to_vec(),
                });
                return effects;
            }
            Port::Fader if self.calibration => effects.push(Effect::Raw {
                port: Port::Calibration,
                bytes: bytes.to_vec(),
            }),
            _ => {}
        }

        // Realtime bytes may be interleaved anywhere, including ahead of a
        // continuation chunk
        let Some(start) = bytes.iter().position(|&byte| byte < REALTIME_MIN) else {
            return effects;
        };
        let status = bytes[start];

        let framing = self
            .framer_mut(port)
            .map(|framer| framer.is_active() || framer.is_matching_header());
        match framing {
            Some(open) if status == sysex::START || (status < 0x80 && open) => {
                for byte in bytes {
                    self.sysex_byte(port, *byte, &mut effects);
                }
                return effects;
            }
            None if status == sysex::START => {
                trace!(%port, "SysEx ignored on this port");
                return effects;
            }
            _ => {}
        }

        let message: Vec<u8> = bytes[start..]
            .iter()
            .copied()
            .filter(|&byte| byte < REALTIME_MIN)
            .collect();
        match MidiMessage::parse(&message) {
            Some(message) => self.dispatch(port, message, &mut effects),
            None => trace!(%port, "unparsed MIDI [{}]", format_hex(bytes)),
        }
        effects
    }

    /// A parsed message received on a port
    pub fn message_received(&mut self, port: Port, message: MidiMessage) -> Vec<Effect> {
        let mut effects = Vec::new();
        match message {
            MidiMessage::SysEx { .. } => {
                let bytes = message.encode();
                effects = self.midi_received(port, &bytes);
            }
            message => self.dispatch(port, message, &mut effects),
        }
        effects
    }

    /// Feed one byte to the SysEx framer of a host port
    pub fn sysex_byte(&mut self, port: Port, byte: u8, effects: &mut Vec<Effect>) {
        let Some(framer) = self.framer_mut(port) else {
            return;
        };
        if let Some(frame) = framer.push(byte) {
            self.dispatch_frame(frame, effects);
        }
    }

    /// Each host streams its own frames
    fn framer_mut(&mut self, port: Port) -> Option<&mut SysExFramer> {
        match port {
            Port::Daw => Some(&mut self.daw_framer),
            Port::Plugin => Some(&mut self.plugin_framer),
            Port::Fader | Port::Calibration => None,
        }
    }

    fn dispatch_frame(&mut self, frame: SysExFrame, effects: &mut Vec<Effect>) {
        match frame.command {
            Command::MeterData => {
                self.handler.meter_update(&MeterFrame::decode(&frame.payload));
            }
            Command::SyncButtons => {
                debug!("replaying button states");
                self.router.replay_leds(&self.leds, effects);
            }
            Command::Unknown(_) => {}
        }
    }

    fn dispatch(&mut self, port: Port, message: MidiMessage, effects: &mut Vec<Effect>) {
        if let Some(channel) = message.channel() {
            if channel != self.channel {
                trace!(%port, channel, "message on another channel ignored");
                return;
            }
        }

        match (port, message) {
            (Port::Fader, MidiMessage::ControlChange { cc, value, .. }) => {
                self.fader.from_hardware(cc, value, effects);
            }
            (Port::Daw | Port::Plugin, MidiMessage::NoteOn { note, velocity, .. }) => {
                self.router.on_note_on(
                    port,
                    note,
                    velocity,
                    &mut self.leds,
                    &mut self.handler,
                    effects,
                );
            }
            (Port::Daw | Port::Plugin, MidiMessage::NoteOff { note, .. }) => {
                self.router
                    .on_note_on(port, note, 0, &mut self.leds, &mut self.handler, effects);
            }
            (Port::Daw | Port::Plugin, MidiMessage::ControlChange { cc, value, .. }) => {
                self.fader.from_host(cc, value, effects);
                if port == Port::Daw {
                    self.handler.host_control(cc, value);
                }
            }
            (port, message) => trace!(%port, "{} not handled", message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::{button, led, LogicalButton};

    #[derive(Default)]
    struct Recorder {
        commands: Vec<(LogicalButton, bool)>,
        frames: Vec<MeterFrame>,
        controls: Vec<(u8, u8)>,
    }

    impl CommandHandler for Recorder {
        fn handle(&mut self, button: LogicalButton, state: bool) {
            self.commands.push((button, state));
        }
    }

    impl MeterSink for Recorder {
        fn meter_update(&mut self, frame: &MeterFrame) {
            self.frames.push(frame.clone());
        }
    }

    impl SurfaceHandler for Recorder {
        fn host_control(&mut self, cc: u8, value: u8) {
            self.controls.push((cc, value));
        }
    }

    fn session() -> ControllerSession<Recorder> {
        ControllerSession::new(&AppConfig::default(), Recorder::default())
    }

    #[test]
    fn test_startup_clears_leds_and_requests_sync() {
        let mut session = session();
        let effects = session.startup();
        assert_eq!(effects.len(), LED_COUNT as usize + 1);
        assert!(effects[..LED_COUNT as usize]
            .iter()
            .all(|e| matches!(e, Effect::Led { on: false, .. })));
        assert_eq!(
            effects.last(),
            Some(&Effect::Midi(Outbound::new(
                Port::Plugin,
                MidiMessage::SysEx {
                    data: vec![0x00, 0x21, 0x69, 0x02]
                }
            )))
        );
    }

    #[test]
    fn test_startup_test_mode() {
        let mut config = AppConfig::default();
        config.startup.test_mode = true;
        config.startup.sync_buttons = false;
        let mut session = ControllerSession::new(&config, Recorder::default());
        let effects = session.startup();
        assert_eq!(effects.len(), LED_COUNT as usize);
        assert_eq!(session.leds().lit().count(), LED_COUNT as usize);
    }

    #[test]
    fn test_note_off_treated_as_release() {
        let mut session = session();
        session.midi_received(Port::Plugin, &[0x90, 19, 127]);
        let effects = session.midi_received(Port::Plugin, &[0x80, 19, 64]);
        assert_eq!(effects, vec![Effect::Led { led: led::DIM, on: false }]);
        assert_eq!(
            session.handler().commands,
            vec![(button::DIM, true), (button::DIM, false)]
        );
    }

    #[test]
    fn test_other_channel_ignored() {
        let mut session = session();
        let effects = session.midi_received(Port::Plugin, &[0x91, 19, 127]);
        assert!(effects.is_empty());
        assert!(session.handler().commands.is_empty());
    }

    #[test]
    fn test_calibration_passthrough() {
        let mut config = AppConfig::default();
        config.midi.calibration_port = Some("USB3".to_string());
        let mut session = ControllerSession::new(&config, Recorder::default());

        let effects = session.midi_received(Port::Calibration, &[0xB0, 0, 80]);
        assert_eq!(
            effects,
            vec![Effect::Raw {
                port: Port::Fader,
                bytes: vec![0xB0, 0, 80]
            }]
        );

        // fader traffic is mirrored and still translated
        let effects = session.midi_received(Port::Fader, &[0xB0, 47, 127]);
        assert_eq!(effects.len(), 3);
        assert_eq!(
            effects[0],
            Effect::Raw {
                port: Port::Calibration,
                bytes: vec![0xB0, 47, 127]
            }
        );
    }

    #[test]
    fn test_no_passthrough_without_calibration_port() {
        let mut session = session();
        let effects = session.midi_received(Port::Fader, &[0xB0, 47, 0]);
        assert!(effects.iter().all(|e| matches!(e, Effect::Midi(_))));
    }

    #[test]
    fn test_meter_sysex_reaches_sink() {
        let mut session = session();
        session.midi_received(Port::Plugin, &sysex::build_frame(Command::MeterData, &[12, 50]));
        assert_eq!(session.handler().frames.len(), 1);
    }

    #[test]
    fn test_sysex_split_across_packets() {
        let mut session = session();
        let frame = sysex::build_frame(Command::MeterData, &[1, 2, 3, 4]);
        let (head, tail) = frame.split_at(6);
        session.midi_received(Port::Plugin, head);
        assert!(session.handler().frames.is_empty());
        session.midi_received(Port::Plugin, tail);
        assert_eq!(session.handler().frames.len(), 1);
    }

    #[test]
    fn test_continuation_starting_with_realtime() {
        let mut session = session();
        let frame = sysex::build_frame(Command::MeterData, &[1, 2, 3, 4]);
        let (head, tail) = frame.split_at(7);
        session.midi_received(Port::Plugin, head);

        let mut tail = tail.to_vec();
        tail.insert(0, 0xF8);
        session.midi_received(Port::Plugin, &tail);
        assert_eq!(session.handler().frames, vec![MeterFrame::decode(&[1, 2, 3, 4])]);

        // the framer is back in sync for the next frame
        session.midi_received(Port::Plugin, &sysex::build_frame(Command::MeterData, &[9]));
        assert_eq!(session.handler().frames[1], MeterFrame::decode(&[9]));
    }

    #[test]
    fn test_realtime_before_channel_message() {
        let mut session = session();
        session.midi_received(Port::Daw, &[0xF8, 0xB0, 7, 100]);
        assert_eq!(session.handler().controls, vec![(7, 100)]);
    }

    #[test]
    fn test_split_frames_on_both_hosts_stay_apart() {
        let mut session = session();
        let meter = sysex::build_frame(Command::MeterData, &[5, 6, 7, 8]);
        let sync = sysex::build_frame(Command::SyncButtons, &[]);
        let (meter_head, meter_tail) = meter.split_at(7);
        let (sync_head, sync_tail) = sync.split_at(3);

        session.midi_received(Port::Plugin, meter_head);
        session.midi_received(Port::Daw, sync_head);
        session.midi_received(Port::Plugin, meter_tail);
        assert_eq!(session.handler().frames, vec![MeterFrame::decode(&[5, 6, 7, 8])]);

        let effects = session.midi_received(Port::Daw, sync_tail);
        assert!(!effects.is_empty());
        assert!(effects.iter().all(|e| matches!(e, Effect::Midi(_))));
    }

    #[test]
    fn test_daw_cc_goes_to_handler() {
        let mut session = session();
        session.midi_received(Port::Daw, &[0xB0, 7, 100]);
        session.midi_received(Port::Plugin, &[0xB0, 7, 90]);
        assert_eq!(session.handler().controls, vec![(7, 100)]);
    }

    #[test]
    fn test_realtime_ignored() {
        let mut session = session();
        assert!(session.midi_received(Port::Daw, &[0xF8]).is_empty());
        assert!(session.midi_received(Port::Daw, &[]).is_empty());
    }

    #[test]
    fn test_sysex_from_fader_port_ignored() {
        let mut session = session();
        session.midi_received(Port::Fader, &sysex::build_frame(Command::MeterData, &[1]));
        assert!(session.handler().frames.is_empty());
    }
}
