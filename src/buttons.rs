//! Button action router
//!
//! Applies the routing table in both directions:
//! - physical edges become Note-On messages to the entry's destinations
//! - accepted inbound Note-On messages drive the entry's LED and command

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::input::ButtonEdge;
use crate::midi::{Outbound, Port};
use crate::routing::{Led, LogicalButton, RoutingTable, LED_COUNT};
use crate::session::Effect;

/// Receives every accepted button command. Must return promptly.
pub trait CommandHandler {
    fn handle(&mut self, button: LogicalButton, state: bool);
}

/// Who writes a button's LED after a local press
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedPolicy {
    /// LEDs follow only the Note-On echoed back by the host
    #[default]
    HostEcho,
    /// A press toggles its LED immediately; host Note-On still overrides
    LocalToggle,
}

/// Mirror of the LED output lines
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LedBank {
    bits: u32,
}

impl LedBank {
    pub fn is_on(&self, led: Led) -> bool {
        led.0 < LED_COUNT && self.bits & (1 << led.0) != 0
    }

    /// Set a line, returning true when its state changed
    pub fn set(&mut self, led: Led, on: bool) -> bool {
        if led.0 >= LED_COUNT || self.is_on(led) == on {
            return false;
        }
        self.bits ^= 1 << led.0;
        true
    }

    pub fn lit(&self) -> impl Iterator<Item = Led> + '_ {
        (0..LED_COUNT).map(Led).filter(|led| self.is_on(*led))
    }
}

/// Translates between button/LED state and Note-On traffic
#[derive(Debug, Clone)]
pub struct ButtonRouter {
    table: RoutingTable,
    channel: u8,
    policy: LedPolicy,
}

impl ButtonRouter {
    pub fn new(table: RoutingTable, channel: u8, policy: LedPolicy) -> Self {
        Self {
            table,
            channel,
            policy,
        }
    }

    pub fn table(&self) -> &RoutingTable {
        &self.table
    }

    pub fn channel(&self) -> u8 {
        self.channel
    }

    /// Physical edge -> Note-On to each destination of the matching entry
    pub fn on_button_edge(
        &self,
        edge: ButtonEdge,
        shifted: bool,
        leds: &mut LedBank,
        effects: &mut Vec<Effect>,
    ) {
        let button = LogicalButton::for_line(edge.line, shifted);
        let Some((note, entry)) = self.table.find(button) else {
            trace!("{} has no routing entry", button);
            return;
        };

        let velocity = if edge.pressed { 127 } else { 0 };
        for port in entry.ports.ports() {
            debug!("{} -> note {} v:{} on {}", button, note, velocity, port);
            effects.push(Effect::Midi(Outbound::note_on(
                port,
                self.channel,
                note,
                velocity,
            )));
        }

        if self.policy == LedPolicy::LocalToggle && edge.pressed {
            if let Some(led) = entry.led {
                let on = !leds.is_on(led);
                leds.set(led, on);
                effects.push(Effect::Led { led, on });
            }
        }
    }

    /// Inbound Note-On -> LED state and command dispatch
    pub fn on_note_on(
        &self,
        source: Port,
        note: u8,
        velocity: u8,
        leds: &mut LedBank,
        handler: &mut dyn CommandHandler,
        effects: &mut Vec<Effect>,
    ) {
        let Some(entry) = self.table.by_note(note) else {
            trace!(note, "note outside routing table");
            return;
        };
        if !entry.ports.contains(source) {
            trace!(note, %source, "note not accepted from this port");
            return;
        }

        let state = velocity > 0;
        if let Some(led) = entry.led {
            if leds.set(led, state) {
                effects.push(Effect::Led { led, on: state });
            }
        }

        debug!("{} = {} (from {})", entry.button, state, source);
        handler.handle(entry.button, state);
    }

    /// Replay the current state of every LED-carrying entry to its destinations
    pub fn replay_leds(&self, leds: &LedBank, effects: &mut Vec<Effect>) {
        for (note, entry) in self.table.iter() {
            let Some(led) = entry.led else { continue };
            let velocity = if leds.is_on(led) { 127 } else { 0 };
            for port in entry.ports.ports() {
                effects.push(Effect::Midi(Outbound::note_on(
                    port,
                    self.channel,
                    note,
                    velocity,
                )));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::midi::MidiMessage;
    use crate::routing::{button, led};

    #[derive(Default)]
    struct Recorder {
        calls: Vec<(LogicalButton, bool)>,
    }

    impl CommandHandler for Recorder {
        fn handle(&mut self, button: LogicalButton, state: bool) {
            self.calls.push((button, state));
        }
    }

    fn router(policy: LedPolicy) -> ButtonRouter {
        ButtonRouter::new(RoutingTable::standard(), 0, policy)
    }

    fn notes(effects: &[Effect]) -> Vec<(Port, u8, u8)> {
        effects
            .iter()
            .filter_map(|effect| match effect {
                Effect::Midi(Outbound {
                    port,
                    message: MidiMessage::NoteOn { note, velocity, .. },
                }) => Some((*port, *note, *velocity)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_press_and_release_line_zero() {
        let router = router(LedPolicy::HostEcho);
        let mut leds = LedBank::default();
        let mut effects = Vec::new();

        router.on_button_edge(ButtonEdge { line: 0, pressed: true }, false, &mut leds, &mut effects);
        router.on_button_edge(ButtonEdge { line: 0, pressed: false }, false, &mut leds, &mut effects);

        assert_eq!(notes(&effects), vec![(Port::Plugin, 0, 127), (Port::Plugin, 0, 0)]);
        // host echo policy: no local LED write
        assert!(effects.iter().all(|e| matches!(e, Effect::Midi(_))));
    }

    #[test]
    fn test_shift_doubling() {
        let router = router(LedPolicy::HostEcho);
        let table = RoutingTable::standard();
        let mut leds = LedBank::default();

        for line in 0..crate::routing::LINE_COUNT {
            let mut effects = Vec::new();
            router.on_button_edge(ButtonEdge { line, pressed: true }, true, &mut leds, &mut effects);
            let shifted = LogicalButton::for_line(line, true);
            match table.find(shifted) {
                Some((note, entry)) => {
                    let expected: Vec<_> = entry.ports.ports().map(|p| (p, note, 127)).collect();
                    assert_eq!(notes(&effects), expected, "line {}", line);
                }
                None => assert!(effects.is_empty(), "line {}", line),
            }
        }
    }

    #[test]
    fn test_shifted_press_routes_to_shifted_function() {
        let router = router(LedPolicy::HostEcho);
        let mut leds = LedBank::default();
        let mut effects = Vec::new();
        // line 1 shifted -> PEAK_LUFS at note 36
        router.on_button_edge(ButtonEdge { line: 1, pressed: true }, true, &mut leds, &mut effects);
        assert_eq!(notes(&effects), vec![(Port::Plugin, 36, 127)]);
    }

    #[test]
    fn test_unrouted_line_is_silent() {
        let router = router(LedPolicy::HostEcho);
        let mut leds = LedBank::default();
        let mut effects = Vec::new();
        router.on_button_edge(ButtonEdge { line: 7, pressed: true }, false, &mut leds, &mut effects);
        assert!(effects.is_empty());
    }

    #[test]
    fn test_local_toggle_policy() {
        let router = router(LedPolicy::LocalToggle);
        let mut leds = LedBank::default();
        let mut effects = Vec::new();

        router.on_button_edge(ButtonEdge { line: 8, pressed: true }, false, &mut leds, &mut effects);
        assert!(leds.is_on(led::MIX));
        router.on_button_edge(ButtonEdge { line: 8, pressed: false }, false, &mut leds, &mut effects);
        assert!(leds.is_on(led::MIX));
        router.on_button_edge(ButtonEdge { line: 8, pressed: true }, false, &mut leds, &mut effects);
        assert!(!leds.is_on(led::MIX));
    }

    #[test]
    fn test_inbound_note_sets_led_and_dispatches() {
        let router = router(LedPolicy::HostEcho);
        let mut leds = LedBank::default();
        let mut handler = Recorder::default();
        let mut effects = Vec::new();

        router.on_note_on(Port::Plugin, 19, 127, &mut leds, &mut handler, &mut effects);
        assert!(leds.is_on(led::DIM));
        assert_eq!(handler.calls, vec![(button::DIM, true)]);
        assert_eq!(effects, vec![Effect::Led { led: led::DIM, on: true }]);
    }

    #[test]
    fn test_inbound_from_wrong_port_rejected() {
        let router = router(LedPolicy::HostEcho);
        let mut leds = LedBank::default();
        let mut handler = Recorder::default();
        let mut effects = Vec::new();

        // note 19 (DIM) belongs to the plugin
        router.on_note_on(Port::Daw, 19, 127, &mut leds, &mut handler, &mut effects);
        // note 29 (shift placeholder) accepts no source
        router.on_note_on(Port::Daw, 29, 127, &mut leds, &mut handler, &mut effects);
        // past the end of the table
        router.on_note_on(Port::Daw, 120, 127, &mut leds, &mut handler, &mut effects);

        assert!(handler.calls.is_empty());
        assert!(effects.is_empty());
        assert_eq!(leds, LedBank::default());
    }

    #[test]
    fn test_repeated_note_on_is_idempotent_for_leds() {
        let router = router(LedPolicy::HostEcho);
        let mut leds = LedBank::default();
        let mut handler = Recorder::default();
        let mut effects = Vec::new();

        router.on_note_on(Port::Daw, 25, 100, &mut leds, &mut handler, &mut effects);
        router.on_note_on(Port::Daw, 25, 100, &mut leds, &mut handler, &mut effects);

        assert_eq!(handler.calls.len(), 2);
        assert_eq!(effects, vec![Effect::Led { led: led::PLAY, on: true }]);
        assert!(leds.is_on(led::PLAY));
    }

    #[test]
    fn test_replay_leds_covers_every_led_entry() {
        let router = router(LedPolicy::HostEcho);
        let mut leds = LedBank::default();
        leds.set(led::LOUD, true);
        let mut effects = Vec::new();

        router.replay_leds(&leds, &mut effects);
        let sent = notes(&effects);
        let led_rows = RoutingTable::standard()
            .iter()
            .filter(|(_, entry)| entry.led.is_some())
            .count();
        assert_eq!(sent.len(), led_rows);
        assert!(sent.contains(&(Port::Plugin, 0, 127)));
        assert!(sent.contains(&(Port::Plugin, 1, 0)));
    }

    #[test]
    fn test_led_bank() {
        let mut leds = LedBank::default();
        assert!(leds.set(Led(31), true));
        assert!(!leds.set(Led(31), true));
        assert!(!leds.set(Led(40), true));
        assert_eq!(leds.lit().collect::<Vec<_>>(), vec![Led(31)]);
    }
}
