//! End-to-end tests driving the controller session with the standard surface

use dreamcontrol_surface::buttons::LedPolicy;
use dreamcontrol_surface::midi::{MidiMessage, Outbound, Port};
use dreamcontrol_surface::routing::{led, RoutingTable};
use dreamcontrol_surface::sysex::{build_frame, Command};
use dreamcontrol_surface::{AppConfig, ControllerSession, Effect};

fn session() -> ControllerSession {
    ControllerSession::with_surface(&AppConfig::default())
}

fn midi(effects: &[Effect]) -> Vec<(Port, MidiMessage)> {
    effects
        .iter()
        .filter_map(|effect| match effect {
            Effect::Midi(Outbound { port, message }) => Some((*port, message.clone())),
            _ => None,
        })
        .collect()
}

fn note(note: u8, velocity: u8) -> MidiMessage {
    MidiMessage::NoteOn {
        channel: 0,
        note,
        velocity,
    }
}

fn cc(cc: u8, value: u8) -> MidiMessage {
    MidiMessage::ControlChange {
        channel: 0,
        cc,
        value,
    }
}

#[test]
fn line_zero_press_and_release() {
    let mut session = session();
    let table = RoutingTable::standard();
    let (_, entry) = table.iter().next().unwrap();
    let ports: Vec<Port> = entry.ports.ports().collect();

    let pressed = session.pin_changed(0, false, 0);
    let released = session.pin_changed(0, true, 10);

    let expected_press: Vec<_> = ports.iter().map(|p| (*p, note(0, 127))).collect();
    let expected_release: Vec<_> = ports.iter().map(|p| (*p, note(0, 0))).collect();
    assert_eq!(midi(&pressed), expected_press);
    assert_eq!(midi(&released), expected_release);
}

#[test]
fn fader_move_reaches_both_hosts_as_nrpn() {
    let mut session = session();
    assert!(session.midi_received(Port::Fader, &[0xB0, 0, 80]).is_empty());
    let effects = session.midi_received(Port::Fader, &[0xB0, 32, 45]);

    assert_eq!(
        midi(&effects),
        vec![
            (Port::Daw, cc(98, 1)),
            (Port::Daw, cc(6, 47)),
            (Port::Daw, cc(38, 82)),
            (Port::Plugin, cc(98, 1)),
            (Port::Plugin, cc(6, 47)),
            (Port::Plugin, cc(38, 82)),
        ]
    );
}

#[test]
fn host_automation_moves_the_fader() {
    let mut session = session();
    session.midi_received(Port::Daw, &[0xB0, 98, 1]);
    session.midi_received(Port::Daw, &[0xB0, 38, 82]);
    let effects = session.midi_received(Port::Daw, &[0xB0, 6, 47]);
    assert_eq!(
        midi(&effects),
        vec![(Port::Fader, cc(0, 80)), (Port::Fader, cc(32, 45))]
    );
}

#[test]
fn shifted_press_routes_to_shifted_function() {
    let mut session = session();
    // polled bank: shift (line 32) held down
    assert!(session.tick(0b11_1110, 0).is_empty());
    assert!(session.shift_active());

    // line 1 shifted is PEAK/LUFS at note 36
    let effects = session.pin_changed(1, false, 1);
    assert_eq!(midi(&effects), vec![(Port::Plugin, note(36, 127))]);

    // shift released: line 1 is MONO again
    session.tick(0b11_1111, 2);
    session.pin_changed(1, true, 3);
    let effects = session.pin_changed(1, false, 4);
    assert_eq!(midi(&effects), vec![(Port::Plugin, note(1, 127))]);
}

#[test]
fn shifted_line_without_function_is_silent() {
    let mut session = session();
    session.tick(0b11_1110, 0);
    // line 7 has neither a base nor a shifted entry
    assert!(session.pin_changed(7, false, 1).is_empty());
}

#[test]
fn plugin_echo_lights_led_and_switches_meter_mode() {
    let mut session = session();
    let effects = session.midi_received(Port::Plugin, &[0x90, 36, 127]);
    // no LED on shifted functions
    assert!(effects.is_empty());
    assert!(session.handler().settings().lufs);

    let effects = session.midi_received(Port::Plugin, &[0x90, 18, 127]);
    assert_eq!(effects, vec![Effect::Led { led: led::MONMUTE, on: true }]);
    assert_eq!(session.handler().knobs().hue_override(), Some(0));
}

#[test]
fn repeated_note_on_changes_led_once() {
    let mut session = session();
    let first = session.midi_received(Port::Daw, &[0x90, 25, 127]);
    let second = session.midi_received(Port::Daw, &[0x90, 25, 127]);
    assert_eq!(first, vec![Effect::Led { led: led::PLAY, on: true }]);
    assert!(second.is_empty());
    assert!(session.leds().is_on(led::PLAY));
}

#[test]
fn sync_request_replays_led_state() {
    let mut session = session();
    session.midi_received(Port::Daw, &[0x90, 25, 127]);

    let effects = session.midi_received(Port::Plugin, &build_frame(Command::SyncButtons, &[]));
    let sent = midi(&effects);
    assert!(sent.contains(&(Port::Daw, note(25, 127))));
    assert!(sent.contains(&(Port::Daw, note(26, 0))));
    assert!(sent.contains(&(Port::Plugin, note(0, 0))));
}

#[test]
fn meter_frame_after_noise_and_realtime() {
    let mut session = session();
    assert!(session
        .midi_received(Port::Plugin, &[0xFF, 0x00, 0x21, 0x69, 0x69])
        .is_empty());

    let mut frame = build_frame(Command::MeterData, &[0; 28]);
    // integrated loudness -14.30 with a clock byte in the middle
    frame[5 + 4] = 14;
    frame[5 + 5] = 30;
    frame.insert(7, 0xF8);

    // delivered in small packets
    for chunk in frame.chunks(3) {
        session.midi_received(Port::Plugin, chunk);
    }
    let lines = session.handler().lcd_lines().unwrap();
    assert_eq!(lines[1], "-14.3");
}

#[test]
fn continuation_chunk_led_by_clock_byte() {
    let mut session = session();
    let mut frame = build_frame(Command::MeterData, &[0; 28]);
    frame[5 + 4] = 14;
    frame[5 + 5] = 30;

    let (head, tail) = frame.split_at(7);
    session.midi_received(Port::Plugin, head);
    let mut tail = tail.to_vec();
    tail.insert(0, 0xF8);
    session.midi_received(Port::Plugin, &tail);
    assert_eq!(session.handler().lcd_lines().unwrap()[1], "-14.3");

    // a following frame is decoded on its own
    frame[5 + 4] = 9;
    frame[5 + 5] = 0;
    session.midi_received(Port::Plugin, &frame);
    assert_eq!(session.handler().lcd_lines().unwrap()[1], " -9.0");
}

#[test]
fn encoder_sends_volume_and_follows_daw() {
    let mut session = session();
    let effects = session.encoder_moved(4);
    assert_eq!(midi(&effects), vec![(Port::Daw, cc(7, 36))]);

    session.midi_received(Port::Daw, &[0xB0, 7, 127]);
    assert_eq!(session.handler().knobs().level_db(), 0);
}

#[test]
fn local_toggle_policy_lights_led_on_press() {
    let mut config = AppConfig::default();
    config.buttons.led_policy = LedPolicy::LocalToggle;
    let mut session = ControllerSession::with_surface(&config);

    let effects = session.pin_changed(28, false, 0);
    assert!(effects.contains(&Effect::Led { led: led::PLAY, on: true }));

    // host echo with the opposite state wins
    session.pin_changed(28, true, 1);
    let effects = session.midi_received(Port::Daw, &[0x90, 25, 0]);
    assert_eq!(effects, vec![Effect::Led { led: led::PLAY, on: false }]);
}

#[test]
fn debounce_filters_contact_bounce() {
    let mut config = AppConfig::default();
    config.buttons.debounce_ms = 5;
    let mut session = ControllerSession::with_surface(&config);

    assert_eq!(midi(&session.pin_changed(0, false, 0)).len(), 1);
    assert!(session.pin_changed(0, true, 1).is_empty());
    assert!(session.pin_changed(0, false, 2).is_empty());
    assert!(session.tick(0b11_1111, 10).is_empty());

    // a real release after the window still goes through
    assert_eq!(
        midi(&session.pin_changed(0, true, 20)),
        vec![(Port::Plugin, note(0, 0))]
    );
}

#[test]
fn startup_sequence() {
    let mut session = session();
    let effects = session.startup();
    assert_eq!(
        midi(&effects),
        vec![(
            Port::Plugin,
            MidiMessage::SysEx {
                data: vec![0x00, 0x21, 0x69, 0x02]
            }
        )]
    );
}
