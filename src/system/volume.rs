//! Volume control for a single source or sink.

use super::executor::CommandExecutor;
use super::types::DeviceKind;
use crate::error::Result;

pub const MAX_PERCENT: u8 = 100;

/// Clamp a requested level into `0..=100`.
pub fn clamp_percent(percent: i64) -> u8 {
    percent.clamp(0, MAX_PERCENT as i64) as u8
}

/// First integer written directly in front of a `%` sign, or 0.
///
/// `pactl get-sink-volume` prints e.g.
/// `Volume: front-left: 42597 /  65% / -11.23 dB, front-right: ...`.
/// Fractions such as `12.5%` are not integers and are skipped.
/// Levels above 100 (over-amplification) are reported as 100.
pub fn parse_volume_percent(report: &str) -> u8 {
    let bytes = report.as_bytes();
    for (pos, _) in report.match_indices('%') {
        let start = bytes[..pos]
            .iter()
            .rposition(|b| !b.is_ascii_digit())
            .map_or(0, |i| i + 1);
        if start == pos || (start > 0 && bytes[start - 1] == b'.') {
            continue;
        }
        // Only digits remain, so the parse can only fail on overflow
        return report[start..pos]
            .parse::<u64>()
            .map_or(MAX_PERCENT, |value| value.min(MAX_PERCENT as u64) as u8);
    }
    0
}

/// Reads and writes volume levels through the sound server.
pub struct VolumeController<E> {
    executor: E,
}

impl<E: CommandExecutor> VolumeController<E> {
    pub fn new(executor: E) -> Self {
        Self { executor }
    }

    /// Current level of a device; 0 when the output carries no percentage.
    pub fn get_volume(&self, id: &str, kind: DeviceKind) -> Result<u8> {
        let report = self.executor.query_volume(id, kind)?;
        Ok(parse_volume_percent(&report))
    }

    /// Set a device's level and return the level that was requested of the
    /// sound server (after clamping).  The server is not queried again.
    pub fn set_volume(&self, percent: i64, id: &str, kind: DeviceKind) -> Result<u8> {
        let percent = clamp_percent(percent);
        self.executor.set_volume(id, kind, percent)?;
        Ok(percent)
    }
}
