//! Button/LED routing table
//!
//! The table is the single source of truth for both directions of button
//! translation. A row's position is its MIDI note number, so inbound Note-On
//! lookup is an index and outbound lookup by logical button is a linear scan.
//!
//! * DO NOT CHANGE ROW ORDER * - the host DAW mapping and the monitor plugin
//! both address buttons by note number.

use std::fmt;

use crate::midi::PortMask;

/// Number of physical input lines (event-driven bank 0-31, polled bank 32-37)
pub const LINE_COUNT: u8 = 38;

/// Number of LED output lines
pub const LED_COUNT: u8 = 32;

/// Logical identity of a button function
///
/// Base buttons share the number of their physical line, shifted functions
/// add 1000, and functions with no physical control start at 10000.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LogicalButton(pub u16);

/// Range a `LogicalButton` belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonKind {
    Base,
    Shifted,
    Unassigned,
}

impl LogicalButton {
    pub const SHIFT_OFFSET: u16 = 1000;
    pub const UNASSIGNED_BASE: u16 = 10000;

    /// Button targeted by an edge on `line` given the current shift flag
    pub fn for_line(line: u8, shifted: bool) -> Self {
        let offset = if shifted { Self::SHIFT_OFFSET } else { 0 };
        LogicalButton(line as u16 + offset)
    }

    pub fn kind(self) -> Option<ButtonKind> {
        let base = LINE_COUNT as u16;
        match self.0 {
            n if n < base => Some(ButtonKind::Base),
            n if (Self::SHIFT_OFFSET..Self::SHIFT_OFFSET + base).contains(&n) => {
                Some(ButtonKind::Shifted)
            }
            n if n >= Self::UNASSIGNED_BASE => Some(ButtonKind::Unassigned),
            _ => None,
        }
    }
}

impl fmt::Display for LogicalButton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "button {}", self.0)
    }
}

/// Identity of an LED output line (0-31)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Led(pub u8);

impl fmt::Display for Led {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "led {}", self.0)
    }
}

/// Button functions, numbered by physical line
pub mod button {
    use super::LogicalButton;

    // Event-driven bank, lines 0-31
    pub const LOUD: LogicalButton = LogicalButton(0);
    pub const MONO: LogicalButton = LogicalButton(1);
    pub const SIDE: LogicalButton = LogicalButton(2);
    pub const LOW: LogicalButton = LogicalButton(3);
    pub const LOMID: LogicalButton = LogicalButton(4);
    pub const HIMID: LogicalButton = LogicalButton(5);
    pub const HIGH: LogicalButton = LogicalButton(6);

    pub const MIX: LogicalButton = LogicalButton(8);
    pub const CUE1: LogicalButton = LogicalButton(9);
    pub const CUE2: LogicalButton = LogicalButton(10);
    pub const CUE3: LogicalButton = LogicalButton(11);
    pub const CUE4: LogicalButton = LogicalButton(12);
    pub const EXT1: LogicalButton = LogicalButton(13);
    pub const EXT2: LogicalButton = LogicalButton(14);

    pub const MAIN: LogicalButton = LogicalButton(16);
    pub const ALT1: LogicalButton = LogicalButton(17);
    pub const ALT2: LogicalButton = LogicalButton(18);
    pub const ALT3: LogicalButton = LogicalButton(19);
    pub const MONMUTE: LogicalButton = LogicalButton(20);
    pub const DIM: LogicalButton = LogicalButton(21);
    pub const REF: LogicalButton = LogicalButton(22);

    pub const RETURN: LogicalButton = LogicalButton(24);
    pub const LOOP: LogicalButton = LogicalButton(25);
    pub const BACK: LogicalButton = LogicalButton(26);
    pub const FORWARD: LogicalButton = LogicalButton(27);
    pub const PLAY: LogicalButton = LogicalButton(28);
    pub const STOP: LogicalButton = LogicalButton(29);
    pub const CLICK: LogicalButton = LogicalButton(30);
    pub const RECORD: LogicalButton = LogicalButton(31);

    // Polled bank, lines 32-37
    pub const SHIFT: LogicalButton = LogicalButton(32);
    pub const MUTE: LogicalButton = LogicalButton(33);
    pub const SOLO: LogicalButton = LogicalButton(34);
    pub const READ: LogicalButton = LogicalButton(35);
    pub const WRITE: LogicalButton = LogicalButton(36);
    pub const TALK: LogicalButton = LogicalButton(37);

    // Shifted functions
    pub const RESET_METER: LogicalButton = LogicalButton(1000);
    pub const PEAK_LUFS: LogicalButton = LogicalButton(1001);
    pub const ABS_REL: LogicalButton = LogicalButton(1002);
    pub const ONE_DB_PEAK_SCALE: LogicalButton = LogicalButton(1003);
    pub const THIRD_METER_MOMENTARY: LogicalButton = LogicalButton(1004);
    pub const SAVE: LogicalButton = LogicalButton(1008);
    pub const LOOP1: LogicalButton = LogicalButton(1024);
    pub const LOOP2: LogicalButton = LogicalButton(1025);
    pub const LOOP8: LogicalButton = LogicalButton(1026);
    pub const LOOP16: LogicalButton = LogicalButton(1027);
    pub const MUTE_CLEAR: LogicalButton = LogicalButton(1033);
    pub const SOLO_CLEAR: LogicalButton = LogicalButton(1034);
    pub const READ_ALL: LogicalButton = LogicalButton(1035);
    pub const WRITE_ALL: LogicalButton = LogicalButton(1036);
    pub const VOL_MOD: LogicalButton = LogicalButton(1037);
}

/// LED output lines. The LED board is wired in reverse within each group of 8.
pub mod led {
    use super::Led;

    pub const MIX: Led = Led(0);
    pub const HIGH: Led = Led(1);
    pub const HIMID: Led = Led(2);
    pub const LOMID: Led = Led(3);
    pub const LOW: Led = Led(4);
    pub const SIDE: Led = Led(5);
    pub const MONO: Led = Led(6);
    pub const LOUD: Led = Led(7);

    pub const ALT1: Led = Led(8);
    pub const MAIN: Led = Led(9);
    pub const EXT2: Led = Led(10);
    pub const EXT1: Led = Led(11);
    pub const CUE4: Led = Led(12);
    pub const CUE3: Led = Led(13);
    pub const CUE2: Led = Led(14);
    pub const CUE1: Led = Led(15);

    pub const PLAY: Led = Led(16);
    pub const LOOP: Led = Led(17);
    pub const RETURN: Led = Led(18);
    pub const REF: Led = Led(19);
    pub const DIM: Led = Led(20);
    pub const MONMUTE: Led = Led(21);
    pub const ALT3: Led = Led(22);
    pub const ALT2: Led = Led(23);

    pub const TALK: Led = Led(24);
    pub const WRITE: Led = Led(25);
    pub const READ: Led = Led(26);
    pub const SOLO: Led = Led(27);
    pub const MUTE: Led = Led(28);
    pub const RECORD: Led = Led(29);
    pub const CLICK: Led = Led(30);
    pub const STOP: Led = Led(31);
}

/// One row of the routing table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoutingEntry {
    /// Destinations that receive this button's Note-On, and the only sources
    /// allowed to drive its LED/command
    pub ports: PortMask,
    pub button: LogicalButton,
    pub led: Option<Led>,
}

const fn row(ports: PortMask, button: LogicalButton, led: Option<Led>) -> RoutingEntry {
    RoutingEntry { ports, button, led }
}

const DAW: PortMask = PortMask::DAW;
const PLUGIN: PortMask = PortMask::PLUGIN;

/// The surface's routing table. Row index == MIDI note number.
pub static STANDARD_TABLE: [RoutingEntry; 50] = [
    row(PLUGIN, button::LOUD, Some(led::LOUD)),               // 0
    row(PLUGIN, button::MONO, Some(led::MONO)),               // 1
    row(PLUGIN, button::SIDE, Some(led::SIDE)),               // 2
    row(PLUGIN, button::LOW, Some(led::LOW)),                 // 3
    row(PLUGIN, button::LOMID, Some(led::LOMID)),             // 4
    row(PLUGIN, button::HIMID, Some(led::HIMID)),             // 5
    row(PLUGIN, button::HIGH, Some(led::HIGH)),               // 6
    row(DAW, button::MIX, Some(led::MIX)),                    // 7
    row(DAW, button::CUE1, Some(led::CUE1)),                  // 8
    row(DAW, button::CUE2, Some(led::CUE2)),                  // 9
    row(DAW, button::CUE3, Some(led::CUE3)),                  // 10
    row(DAW, button::CUE4, Some(led::CUE4)),                  // 11
    row(DAW, button::EXT1, Some(led::EXT1)),                  // 12
    row(DAW, button::EXT2, Some(led::EXT2)),                  // 13
    row(DAW, button::MAIN, Some(led::MAIN)),                  // 14
    row(DAW, button::ALT1, Some(led::ALT1)),                  // 15
    row(DAW, button::ALT2, Some(led::ALT2)),                  // 16
    row(DAW, button::ALT3, Some(led::ALT3)),                  // 17
    row(PLUGIN, button::MONMUTE, Some(led::MONMUTE)),         // 18
    row(PLUGIN, button::DIM, Some(led::DIM)),                 // 19
    row(PLUGIN, button::REF, Some(led::REF)),                 // 20
    row(DAW, button::RETURN, Some(led::RETURN)),              // 21
    row(DAW, button::LOOP, Some(led::LOOP)),                  // 22
    row(DAW, button::BACK, None),                             // 23
    row(DAW, button::FORWARD, None),                          // 24
    row(DAW, button::PLAY, Some(led::PLAY)),                  // 25
    row(DAW, button::STOP, Some(led::STOP)),                  // 26
    row(DAW, button::CLICK, Some(led::CLICK)),                // 27
    row(DAW, button::RECORD, Some(led::RECORD)),              // 28
    row(PortMask::NONE, button::SHIFT, None),                 // 29 keeps numbering aligned
    row(DAW, button::MUTE, Some(led::MUTE)),                  // 30
    row(DAW, button::SOLO, Some(led::SOLO)),                  // 31
    row(DAW, button::READ, Some(led::READ)),                  // 32
    row(DAW, button::WRITE, Some(led::WRITE)),                // 33
    row(DAW, button::TALK, Some(led::TALK)),                  // 34
    row(PLUGIN, button::RESET_METER, None),                   // 35 shifted
    row(PLUGIN, button::PEAK_LUFS, None),                     // 36
    row(PLUGIN, button::ABS_REL, None),                       // 37
    row(DAW, button::SAVE, None),                             // 38
    row(DAW, button::LOOP1, None),                            // 39
    row(DAW, button::LOOP2, None),                            // 40
    row(DAW, button::LOOP8, None),                            // 41
    row(DAW, button::LOOP16, None),                           // 42
    row(DAW, button::MUTE_CLEAR, None),                       // 43
    row(DAW, button::SOLO_CLEAR, None),                       // 44
    row(PLUGIN, button::VOL_MOD, None),                       // 45
    row(PLUGIN, button::READ_ALL, None),                      // 46
    row(PLUGIN, button::WRITE_ALL, None),                     // 47
    row(PLUGIN, button::THIRD_METER_MOMENTARY, None),         // 48
    row(PLUGIN, button::ONE_DB_PEAK_SCALE, None),             // 49
];

/// Read-only view over a routing table
#[derive(Debug, Clone, Copy)]
pub struct RoutingTable {
    entries: &'static [RoutingEntry],
}

impl RoutingTable {
    /// Wrap a table. Rows past note 127 are unreachable and are not allowed.
    pub fn new(entries: &'static [RoutingEntry]) -> Self {
        debug_assert!(entries.len() <= 128, "routing table exceeds the MIDI note range");
        Self { entries }
    }

    pub fn standard() -> Self {
        Self::new(&STANDARD_TABLE)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry addressed by an inbound note number
    pub fn by_note(&self, note: u8) -> Option<&'static RoutingEntry> {
        self.entries.get(note as usize)
    }

    /// Note number and entry for a logical button (linear scan)
    pub fn find(&self, button: LogicalButton) -> Option<(u8, &'static RoutingEntry)> {
        self.iter().find(|(_, entry)| entry.button == button)
    }

    /// All rows with their note numbers
    pub fn iter(&self) -> impl Iterator<Item = (u8, &'static RoutingEntry)> {
        self.entries
            .iter()
            .enumerate()
            .map(|(index, entry)| (index as u8, entry))
    }
}

impl Default for RoutingTable {
    fn default() -> Self {
        Self::standard()
    }
}
