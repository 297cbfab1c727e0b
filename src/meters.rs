//! Meter data decoding
//!
//! The plugin sends loudness and true-peak readings as pairs of
//! (integral, hundredths) bytes, both positive, meaning `-(integral.hundredths)`
//! dB. True-peak readings are shifted down by 3 dB so they fit the same range.

use std::fmt;

/// Offset added back to true-peak readings
pub const PEAK_OFFSET_HUNDREDTHS: i32 = 300;

/// Size of a full meter payload
pub const METER_PAYLOAD_LEN: usize = 28;

/// Reading slot within the meter payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MeterField {
    LufsShort,
    LufsMomentary,
    LufsIntegrated,
    LufsMin,
    LufsMax,
    LufsRange,
    LufsTarget,
    PeakLeft,
    PeakRight,
    MaxLeft,
    MaxRight,
    MaxTotal,
    ClipLeft,
    ClipRight,
}

impl MeterField {
    pub const ALL: [MeterField; 14] = [
        MeterField::LufsShort,
        MeterField::LufsMomentary,
        MeterField::LufsIntegrated,
        MeterField::LufsMin,
        MeterField::LufsMax,
        MeterField::LufsRange,
        MeterField::LufsTarget,
        MeterField::PeakLeft,
        MeterField::PeakRight,
        MeterField::MaxLeft,
        MeterField::MaxRight,
        MeterField::MaxTotal,
        MeterField::ClipLeft,
        MeterField::ClipRight,
    ];

    /// Byte offset of the integral part
    pub fn offset(self) -> usize {
        self as usize * 2
    }

    /// True-peak fields carry the 3 dB offset
    pub fn is_true_peak(self) -> bool {
        matches!(
            self,
            MeterField::PeakLeft
                | MeterField::PeakRight
                | MeterField::MaxLeft
                | MeterField::MaxRight
                | MeterField::MaxTotal
        )
    }
}

/// One decoded meter update
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeterFrame {
    raw: [u8; METER_PAYLOAD_LEN],
}

impl MeterFrame {
    /// Decode a meter payload. Missing trailing bytes read as zero.
    pub fn decode(payload: &[u8]) -> Self {
        let mut raw = [0u8; METER_PAYLOAD_LEN];
        let len = payload.len().min(METER_PAYLOAD_LEN);
        raw[..len].copy_from_slice(&payload[..len]);
        Self { raw }
    }

    fn pair(&self, field: MeterField) -> (u8, u8) {
        let offset = field.offset();
        (self.raw[offset], self.raw[offset + 1])
    }

    /// Reading in hundredths of a dB, true-peak offset applied
    pub fn hundredths(&self, field: MeterField) -> i32 {
        let (integral, fractional) = self.pair(field);
        let value = -(integral as i32 * 100 + fractional as i32);
        if field.is_true_peak() {
            value + PEAK_OFFSET_HUNDREDTHS
        } else {
            value
        }
    }

    /// Reading in dB
    pub fn db(&self, field: MeterField) -> f32 {
        self.hundredths(field) as f32 / 100.0
    }

    /// The "no reading" marker (-99.00 before any offset)
    pub fn is_blank(&self, field: MeterField) -> bool {
        self.pair(field) == (99, 0)
    }

    pub fn clipped(&self) -> bool {
        self.raw[MeterField::ClipLeft.offset()] != 0 || self.raw[MeterField::ClipRight.offset()] != 0
    }

    /// Five-character LCD readout, e.g. `-12.5`, ` -5.2`, ` +0.7`
    pub fn level_text(&self, field: MeterField) -> String {
        if self.is_blank(field) {
            return " ".repeat(5);
        }
        format_level(self.hundredths(field))
    }
}

/// Format hundredths of a dB as a five-character readout with one decimal
pub fn format_level(hundredths: i32) -> String {
    let tenths = hundredths / 10;
    let whole = (tenths / 10).abs();
    let decimal = (tenths % 10).abs();
    let text = if hundredths >= 0 {
        format!(" +{}.{}", whole, decimal)
    } else if hundredths <= -1000 {
        format!("-{}.{}", whole, decimal)
    } else {
        format!(" -{}.{}", whole, decimal)
    };
    text.chars().take(5).collect()
}

/// LEDs in each bar meter
pub const BAR_LEDS: usize = 15;

/// LEDs at the bottom of the relative loudness bar drawn dimmer
const RELATIVE_DIM_LEDS: usize = 8;
const RELATIVE_DIM_FACTOR: f32 = 2.75;

/// Colours and dB thresholds of a bar meter, bottom LED first.
/// LED `n` fills between `thresholds[n]` and `thresholds[n + 1]`.
#[derive(Debug, PartialEq, Eq)]
pub struct MeterScale {
    pub hues: [u16; BAR_LEDS],
    pub thresholds: [i32; BAR_LEDS + 1],
}

pub static PEAK_3DB_SCALE: MeterScale = MeterScale {
    hues: [248, 247, 246, 245, 244, 243, 242, 229, 228, 227, 226, 47, 46, 34, 0],
    thresholds: [-60, -48, -42, -36, -30, -27, -24, -21, -18, -15, -12, -9, -6, -3, 0, 3],
};

pub static PEAK_1DB_SCALE: MeterScale = MeterScale {
    hues: [198, 197, 196, 195, 194, 193, 192, 47, 46, 45, 44, 34, 33, 32, 0],
    thresholds: [-60, -48, -36, -24, -20, -16, -12, -10, -8, -6, -4, -3, -2, -1, 0, 1],
};

pub static LUFS_ABSOLUTE_SCALE: MeterScale = MeterScale {
    hues: [112, 111, 110, 109, 108, 89, 88, 87, 86, 67, 65, 64, 63, 42, 41],
    thresholds: [-35, -31, -27, -25, -23, -21, -19, -17, -15, -13, -11, -9, -7, -5, -3, -1],
};

pub static LUFS_RELATIVE_SCALE: MeterScale = MeterScale {
    hues: [130, 130, 130, 130, 130, 130, 130, 130, 130, 114, 30, 0, 0, 0, 0],
    thresholds: [-18, -16, -14, -12, -10, -8, -6, -4, -2, 0, 2, 4, 6, 8, 10, 12],
};

impl MeterScale {
    /// Brightness of each LED (0.0 to 1.0) for a reading in hundredths of a dB
    pub fn levels(&self, hundredths: i32) -> [f32; BAR_LEDS] {
        let value = hundredths as f32 / 100.0;
        std::array::from_fn(|led| {
            let low = self.thresholds[led] as f32;
            let high = self.thresholds[led + 1] as f32;
            if value >= high {
                1.0
            } else if value > low {
                1.0 - (high - value) / (high - low)
            } else {
                0.0
            }
        })
    }
}

/// What one bar meter shows, bottom LED first
#[derive(Debug, Clone, PartialEq)]
pub struct MeterBar {
    pub hues: [u16; BAR_LEDS],
    pub levels: [f32; BAR_LEDS],
}

impl MeterBar {
    /// LEDs at full brightness
    pub fn full(&self) -> usize {
        self.levels.iter().filter(|&&level| level >= 1.0).count()
    }
}

/// Display modes driven by the shifted surface buttons
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MeterSettings {
    /// LUFS meters instead of true peak
    pub lufs: bool,
    /// Third meter shows momentary instead of integrated loudness in peak mode
    pub third_momentary: bool,
    /// LUFS meters relative to the target
    pub relative: bool,
    /// Peak meters use the 1 dB scale instead of 3 dB
    pub one_db_scale: bool,
}

impl MeterSettings {
    /// Fields feeding the three LED meters, left to right
    pub fn led_meter_fields(&self) -> [MeterField; 3] {
        if self.lufs {
            [
                MeterField::LufsMomentary,
                MeterField::LufsShort,
                MeterField::LufsIntegrated,
            ]
        } else {
            let third = if self.third_momentary {
                MeterField::LufsMomentary
            } else {
                MeterField::LufsIntegrated
            };
            [MeterField::PeakLeft, MeterField::PeakRight, third]
        }
    }

    /// Value a LED meter shows for `field`, in hundredths of a dB
    pub fn meter_value(&self, frame: &MeterFrame, field: MeterField) -> i32 {
        let value = frame.hundredths(field);
        if self.relative && !field.is_true_peak() {
            value - frame.hundredths(MeterField::LufsTarget)
        } else {
            value
        }
    }
}

impl MeterSettings {
    /// Scale a bar meter uses for `field`
    pub fn scale_for(&self, field: MeterField) -> &'static MeterScale {
        match (field.is_true_peak(), self.one_db_scale, self.relative) {
            (true, true, _) => &PEAK_1DB_SCALE,
            (true, false, _) => &PEAK_3DB_SCALE,
            (false, _, true) => &LUFS_RELATIVE_SCALE,
            (false, _, false) => &LUFS_ABSOLUTE_SCALE,
        }
    }

    /// Bar meter rendering of `field` under the current modes
    pub fn meter_bar(&self, frame: &MeterFrame, field: MeterField) -> MeterBar {
        let scale = self.scale_for(field);
        let mut levels = scale.levels(self.meter_value(frame, field));
        if self.relative && !field.is_true_peak() {
            for level in &mut levels[..RELATIVE_DIM_LEDS] {
                *level /= RELATIVE_DIM_FACTOR;
            }
        }
        MeterBar {
            hues: scale.hues,
            levels,
        }
    }
}

impl fmt::Display for MeterSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {}",
            if self.lufs { "lufs" } else { "peak" },
            if self.relative { "rel" } else { "abs" },
            if self.third_momentary { "mom" } else { "int" },
            if self.one_db_scale { "1dB" } else { "3dB" },
        )
    }
}

/// Consumer of decoded meter frames
pub trait MeterSink {
    fn meter_update(&mut self, frame: &MeterFrame);
}
