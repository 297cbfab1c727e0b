//! Surface-side reaction to accepted button commands and meter data
//!
//! Owns the display state the buttons control: meter modes, the encoder's
//! virtual knobs and the ring colour override.

use tracing::{debug, info, trace};

use crate::buttons::CommandHandler;
use crate::knob::{KnobState, RingState};
use crate::meters::{MeterBar, MeterField, MeterFrame, MeterSettings, MeterSink};
use crate::routing::{button, LogicalButton};
use crate::session::{Effect, SurfaceHandler};

/// Ring hue while monitor mute is engaged
pub const MUTE_HUE: u16 = 0;
/// Ring hue while dim is engaged
pub const DIM_HUE: u16 = 60;
/// Ring hue while the reference level is engaged
pub const REF_HUE: u16 = 299;

/// Display state of the controller
#[derive(Debug, Clone)]
pub struct Surface {
    settings: MeterSettings,
    knobs: KnobState,
    last_frame: Option<MeterFrame>,
}

impl Surface {
    pub fn new(channel: u8) -> Self {
        Self {
            settings: MeterSettings::default(),
            knobs: KnobState::new(channel),
            last_frame: None,
        }
    }

    pub fn settings(&self) -> MeterSettings {
        self.settings
    }

    pub fn knobs(&self) -> &KnobState {
        &self.knobs
    }

    pub fn ring(&self) -> RingState {
        self.knobs.ring()
    }

    pub fn last_frame(&self) -> Option<&MeterFrame> {
        self.last_frame.as_ref()
    }

    /// LCD lines for the latest meter frame
    ///
    /// Top: max peak left/right and the monitor level (or CLIP).
    /// Middle: integrated loudness. Bottom: range, target, short-term loudness.
    pub fn lcd_lines(&self) -> Option<[String; 3]> {
        let frame = self.last_frame.as_ref()?;
        let level = if frame.clipped() {
            " CLIP".to_string()
        } else {
            format!("{:>5}", self.knobs.level_db())
        };
        Some([
            format!(
                "{} {} {}",
                frame.level_text(MeterField::MaxLeft),
                frame.level_text(MeterField::MaxRight),
                level
            ),
            frame.level_text(MeterField::LufsIntegrated),
            format!(
                "{} {} {}",
                frame.level_text(MeterField::LufsRange),
                frame.level_text(MeterField::LufsTarget),
                frame.level_text(MeterField::LufsShort)
            ),
        ])
    }

    /// LED meter values (hundredths of a dB) for the three bar meters
    pub fn led_meters(&self) -> Option<[i32; 3]> {
        let frame = self.last_frame.as_ref()?;
        Some(
            self.settings
                .led_meter_fields()
                .map(|field| self.settings.meter_value(frame, field)),
        )
    }

    /// Colours and brightness of the three bar meters
    pub fn led_bars(&self) -> Option<[MeterBar; 3]> {
        let frame = self.last_frame.as_ref()?;
        Some(
            self.settings
                .led_meter_fields()
                .map(|field| self.settings.meter_bar(frame, field)),
        )
    }

    fn set_hue(&mut self, hue: u16, state: bool) {
        self.knobs.set_hue_override(state.then_some(hue));
    }
}

impl CommandHandler for Surface {
    fn handle(&mut self, command: LogicalButton, state: bool) {
        match command {
            button::PEAK_LUFS => self.settings.lufs = state,
            button::ABS_REL => self.settings.relative = state,
            button::THIRD_METER_MOMENTARY => self.settings.third_momentary = state,
            button::ONE_DB_PEAK_SCALE => self.settings.one_db_scale = state,
            button::VOL_MOD => self.knobs.select(usize::from(state)),
            button::MONMUTE => self.set_hue(MUTE_HUE, state),
            button::DIM => self.set_hue(DIM_HUE, state),
            button::REF => self.set_hue(REF_HUE, state),
            _ => return,
        }
        debug!("{} -> {} ({})", command, state, self.settings);
    }
}

impl MeterSink for Surface {
    fn meter_update(&mut self, frame: &MeterFrame) {
        if self.last_frame.is_none() {
            info!("Receiving meter data");
        }
        self.last_frame = Some(frame.clone());
    }
}

impl SurfaceHandler for Surface {
    fn encoder_moved(&mut self, increment: i32, effects: &mut Vec<Effect>) {
        self.knobs.on_encoder(increment, effects);
    }

    fn host_control(&mut self, cc: u8, value: u8) {
        if !self.knobs.on_host_cc(cc, value) {
            trace!(cc, value, "no knob on this controller");
        }
    }
}
