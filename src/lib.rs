//! DreamControl surface controller
//!
//! Protocol core of a studio monitor controller: button and LED routing,
//! motor fader CC/NRPN translation, SysEx framing for the monitor plugin, and
//! the ambient layers (configuration, MIDI transport, control panel) needed to
//! run it against real MIDI ports.

pub mod buttons;
pub mod cli;
pub mod config;
pub mod fader;
pub mod input;
pub mod knob;
pub mod meters;
pub mod midi;
pub mod routing;
pub mod session;
pub mod surface;
pub mod sysex;
pub mod transport;

pub use config::AppConfig;
pub use session::{ControllerSession, Effect, SurfaceHandler};
pub use surface::Surface;
