//! MIDI Pipes - automatic MIDI and USB audio routing
//!
//! Scans the ALSA sequencer and the sound server on a small embedded host,
//! connects every MIDI device to every other one, and loops every USB audio
//! input to a single preferred output.

pub mod config;
pub mod error;
pub mod patchbay;
pub mod system;

pub use config::Settings;
pub use error::{Error, Result};
pub use patchbay::{Host, VolumeTarget};
