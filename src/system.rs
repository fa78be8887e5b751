mod executor;
mod scanner;
mod types;
mod volume;

// Re-export public types
pub use executor::{
    CommandExecutor, DryRunExecutor, Invocation, RecordingExecutor, SubprocessExecutor,
};
pub use scanner::{
    LineEvent, classify_audio_line, is_usb_input_name, list_midi_clients, parse_client_line,
    scan_audio_report, scan_midi_clients,
};
pub use types::*;
pub use volume::{VolumeController, clamp_percent, parse_volume_percent};
