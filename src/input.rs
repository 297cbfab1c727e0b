//! Edge and shift tracking for the physical button lines
//!
//! Two banks feed the tracker: lines 0-31 arrive as discrete pin-change
//! notifications, lines 32-37 are sampled every tick. Both go through the same
//! per-line state so the two paths only differ in latency. All lines are
//! active-low with pull-ups: a low level means pressed.

use tracing::trace;

use crate::routing::LINE_COUNT;

/// Lines reported by pin-change notifications
pub const INTERRUPT_LINES: u8 = 32;

/// First line of the polled bank; bit 0 of a polled sample maps to this line
pub const POLLED_FIRST_LINE: u8 = 32;

/// Number of lines in the polled bank
pub const POLLED_LINES: u8 = 6;

/// Momentary shift modifier line (first line of the polled bank)
pub const SHIFT_LINE: u8 = 32;

/// A forwarded press or release on a physical line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonEdge {
    pub line: u8,
    pub pressed: bool,
}

#[derive(Debug, Clone, Copy, Default)]
struct LineState {
    /// Latest sampled state
    raw_pressed: bool,
    /// State last forwarded as an edge
    reported_pressed: bool,
    /// Time of the last forwarded edge
    last_edge_ms: Option<u64>,
}

/// Converts pin samples into button edges and owns the shift flag
#[derive(Debug)]
pub struct EdgeTracker {
    lines: [LineState; LINE_COUNT as usize],
    shift: bool,
    debounce_ms: u64,
}

impl EdgeTracker {
    /// Create a tracker. `debounce_ms` is the minimum time between two edges on
    /// the same line; 0 forwards every transition.
    pub fn new(debounce_ms: u64) -> Self {
        Self {
            lines: [LineState::default(); LINE_COUNT as usize],
            shift: false,
            debounce_ms,
        }
    }

    pub fn shift_active(&self) -> bool {
        self.shift
    }

    /// Sample the polled bank. Bit n holds the level of line 32 + n (1 = high).
    pub fn sample_polled(&mut self, levels: u16, now_ms: u64) -> Vec<ButtonEdge> {
        let mut edges = Vec::new();
        for bit in 0..POLLED_LINES {
            let line = POLLED_FIRST_LINE + bit;
            let pressed = levels & (1 << bit) == 0;
            if let Some(edge) = self.update(line, pressed, now_ms) {
                edges.push(edge);
            }
        }
        edges
    }

    /// Pin-change notification from the event-driven bank (`level` true = high)
    pub fn on_pin_change(&mut self, line: u8, level: bool, now_ms: u64) -> Option<ButtonEdge> {
        if line >= INTERRUPT_LINES {
            trace!(line, "ignoring pin change outside the event-driven bank");
            return None;
        }
        self.update(line, !level, now_ms)
    }

    /// Forward event-driven lines whose last transition was held back by the
    /// debounce window. Polled lines catch up on their own at the next sample.
    pub fn settle(&mut self, now_ms: u64) -> Vec<ButtonEdge> {
        if self.debounce_ms == 0 {
            return Vec::new();
        }
        (0..INTERRUPT_LINES)
            .filter_map(|line| self.try_report(line, now_ms))
            .collect()
    }

    fn update(&mut self, line: u8, pressed: bool, now_ms: u64) -> Option<ButtonEdge> {
        self.lines[line as usize].raw_pressed = pressed;
        self.try_report(line, now_ms)
    }

    fn try_report(&mut self, line: u8, now_ms: u64) -> Option<ButtonEdge> {
        let debounce_ms = self.debounce_ms;
        let state = &mut self.lines[line as usize];
        if state.raw_pressed == state.reported_pressed {
            return None;
        }

        if let Some(last) = state.last_edge_ms {
            if now_ms.saturating_sub(last) < debounce_ms {
                trace!(line, "edge held back by debounce window");
                return None;
            }
        }

        state.reported_pressed = state.raw_pressed;
        state.last_edge_ms = Some(now_ms);
        let pressed = state.raw_pressed;

        if line == SHIFT_LINE {
            self.shift = pressed;
            trace!(shift = pressed, "shift changed");
            return None;
        }

        Some(ButtonEdge { line, pressed })
    }
}

impl Default for EdgeTracker {
    fn default() -> Self {
        Self::new(0)
    }
}
