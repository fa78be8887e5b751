//! Command execution boundary.
//!
//! Everything the scanner and routing engine know about the host arrives
//! through [`CommandExecutor`]: report text comes in, routing and volume
//! operations go out.  The real implementation shells out to `aconnect`
//! and `pactl`; the recording implementation replays fixtures so the rest
//! of the crate can run without any sound hardware.

use std::cell::RefCell;
use std::collections::HashSet;
use std::process::Command;

use super::types::{DeviceKind, RouteCommand};
use crate::config::ToolPaths;
use crate::error::{Error, Result};

/// Operations the ALSA sequencer and the sound server must provide.
pub trait CommandExecutor {
    fn disconnect_all_midi_ports(&self) -> Result<()>;
    fn connect_midi_ports(&self, from: &str, to: &str) -> Result<()>;
    fn fetch_midi_client_report(&self) -> Result<String>;
    fn fetch_audio_report(&self) -> Result<String>;
    fn create_audio_loopback(&self, source_id: &str, sink_id: &str) -> Result<()>;
    fn query_volume(&self, id: &str, kind: DeviceKind) -> Result<String>;
    fn set_volume(&self, id: &str, kind: DeviceKind, percent: u8) -> Result<()>;

    /// Issue a routing command through the matching operation.
    fn execute(&self, command: &RouteCommand) -> Result<()> {
        match command {
            RouteCommand::DisconnectAllMidi => self.disconnect_all_midi_ports(),
            RouteCommand::ConnectMidi { from, to } => self.connect_midi_ports(from, to),
            RouteCommand::CreateLoopback { source_id, sink_id } => {
                self.create_audio_loopback(source_id, sink_id)
            }
        }
    }
}

impl<E: CommandExecutor + ?Sized> CommandExecutor for &E {
    fn disconnect_all_midi_ports(&self) -> Result<()> {
        (**self).disconnect_all_midi_ports()
    }
    fn connect_midi_ports(&self, from: &str, to: &str) -> Result<()> {
        (**self).connect_midi_ports(from, to)
    }
    fn fetch_midi_client_report(&self) -> Result<String> {
        (**self).fetch_midi_client_report()
    }
    fn fetch_audio_report(&self) -> Result<String> {
        (**self).fetch_audio_report()
    }
    fn create_audio_loopback(&self, source_id: &str, sink_id: &str) -> Result<()> {
        (**self).create_audio_loopback(source_id, sink_id)
    }
    fn query_volume(&self, id: &str, kind: DeviceKind) -> Result<String> {
        (**self).query_volume(id, kind)
    }
    fn set_volume(&self, id: &str, kind: DeviceKind, percent: u8) -> Result<()> {
        (**self).set_volume(id, kind, percent)
    }
}

impl<E: CommandExecutor + ?Sized> CommandExecutor for Box<E> {
    fn disconnect_all_midi_ports(&self) -> Result<()> {
        (**self).disconnect_all_midi_ports()
    }
    fn connect_midi_ports(&self, from: &str, to: &str) -> Result<()> {
        (**self).connect_midi_ports(from, to)
    }
    fn fetch_midi_client_report(&self) -> Result<String> {
        (**self).fetch_midi_client_report()
    }
    fn fetch_audio_report(&self) -> Result<String> {
        (**self).fetch_audio_report()
    }
    fn create_audio_loopback(&self, source_id: &str, sink_id: &str) -> Result<()> {
        (**self).create_audio_loopback(source_id, sink_id)
    }
    fn query_volume(&self, id: &str, kind: DeviceKind) -> Result<String> {
        (**self).query_volume(id, kind)
    }
    fn set_volume(&self, id: &str, kind: DeviceKind, percent: u8) -> Result<()> {
        (**self).set_volume(id, kind, percent)
    }
}

// ── Subprocess ────────────────────────────────────────────────────────────

/// Runs `aconnect` and `pactl` on the local host.
///
/// `pactl` is wrapped in `sudo -u <run_as>` when a run-as user is configured,
/// since the system-wide sound server belongs to that user.
pub struct SubprocessExecutor {
    tools: ToolPaths,
}

impl SubprocessExecutor {
    pub fn new(tools: ToolPaths) -> Self {
        Self { tools }
    }

    fn aconnect(&self, args: &[&str]) -> Result<String> {
        run(&self.tools.aconnect, args.iter().map(|a| a.to_string()).collect())
    }

    fn pactl(&self, args: &[&str]) -> Result<String> {
        let mut argv: Vec<String> = Vec::new();
        let program = match &self.tools.run_as {
            Some(user) => {
                argv.extend(["-u".to_string(), user.clone(), self.tools.pactl.clone()]);
                &self.tools.sudo
            }
            None => &self.tools.pactl,
        };
        argv.extend(args.iter().map(|a| a.to_string()));
        run(program, argv)
    }
}

fn run(program: &str, args: Vec<String>) -> Result<String> {
    log::debug!("exec: {} {}", program, args.join(" "));

    let output = Command::new(program)
        .args(&args)
        .output()
        .map_err(|source| Error::Spawn {
            program: program.to_string(),
            source,
        })?;

    if !output.status.success() {
        return Err(Error::CommandFailed {
            program: program.to_string(),
            args,
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    String::from_utf8(output.stdout).map_err(|_| Error::InvalidOutput {
        program: program.to_string(),
    })
}

impl CommandExecutor for SubprocessExecutor {
    fn disconnect_all_midi_ports(&self) -> Result<()> {
        self.aconnect(&["-x"]).map(drop)
    }

    fn connect_midi_ports(&self, from: &str, to: &str) -> Result<()> {
        let from = format!("{}:0", from);
        let to = format!("{}:0", to);
        self.aconnect(&[&from, &to]).map(drop)
    }

    fn fetch_midi_client_report(&self) -> Result<String> {
        self.aconnect(&["-i", "-l"])
    }

    fn fetch_audio_report(&self) -> Result<String> {
        self.pactl(&["list"])
    }

    fn create_audio_loopback(&self, source_id: &str, sink_id: &str) -> Result<()> {
        let source = format!("source={}", source_id);
        let sink = format!("sink={}", sink_id);
        self.pactl(&["load-module", "module-loopback", &source, &sink])
            .map(drop)
    }

    fn query_volume(&self, id: &str, kind: DeviceKind) -> Result<String> {
        let verb = format!("get-{}-volume", kind);
        self.pactl(&[&verb, id])
    }

    fn set_volume(&self, id: &str, kind: DeviceKind, percent: u8) -> Result<()> {
        let verb = format!("set-{}-volume", kind);
        let level = format!("{}%", percent);
        self.pactl(&[&verb, id, &level]).map(drop)
    }
}

// ── Dry run ───────────────────────────────────────────────────────────────

/// Reads reports through an inner executor but only logs mutating operations.
pub struct DryRunExecutor<E> {
    inner: E,
}

impl<E: CommandExecutor> DryRunExecutor<E> {
    pub fn new(inner: E) -> Self {
        Self { inner }
    }
}

impl<E: CommandExecutor> CommandExecutor for DryRunExecutor<E> {
    fn disconnect_all_midi_ports(&self) -> Result<()> {
        log::info!("dry-run: disconnect all MIDI ports");
        Ok(())
    }

    fn connect_midi_ports(&self, from: &str, to: &str) -> Result<()> {
        log::info!("dry-run: connect MIDI {}:0 -> {}:0", from, to);
        Ok(())
    }

    fn fetch_midi_client_report(&self) -> Result<String> {
        self.inner.fetch_midi_client_report()
    }

    fn fetch_audio_report(&self) -> Result<String> {
        self.inner.fetch_audio_report()
    }

    fn create_audio_loopback(&self, source_id: &str, sink_id: &str) -> Result<()> {
        log::info!("dry-run: loopback source={} sink={}", source_id, sink_id);
        Ok(())
    }

    fn query_volume(&self, id: &str, kind: DeviceKind) -> Result<String> {
        self.inner.query_volume(id, kind)
    }

    fn set_volume(&self, id: &str, kind: DeviceKind, percent: u8) -> Result<()> {
        log::info!("dry-run: set {} {} volume to {}%", kind, id, percent);
        Ok(())
    }
}

// ── Recording ─────────────────────────────────────────────────────────────

/// One call made against a [`RecordingExecutor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    DisconnectAllMidi,
    ConnectMidi { from: String, to: String },
    FetchMidiReport,
    FetchAudioReport,
    CreateLoopback { source_id: String, sink_id: String },
    QueryVolume { id: String, kind: DeviceKind },
    SetVolume { id: String, kind: DeviceKind, percent: u8 },
}

/// Replays canned report text and records every call in order.
#[derive(Debug, Default)]
pub struct RecordingExecutor {
    midi_report: String,
    audio_report: String,
    volume_report: String,
    failing_connections: HashSet<(String, String)>,
    failing_loopbacks: HashSet<(String, String)>,
    fail_disconnect: bool,
    fail_volume_query: bool,
    invocations: RefCell<Vec<Invocation>>,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_midi_report(mut self, report: impl Into<String>) -> Self {
        self.midi_report = report.into();
        self
    }

    pub fn with_audio_report(mut self, report: impl Into<String>) -> Self {
        self.audio_report = report.into();
        self
    }

    /// Text returned for every volume query.
    pub fn with_volume_report(mut self, report: impl Into<String>) -> Self {
        self.volume_report = report.into();
        self
    }

    /// Make `connect_midi_ports(from, to)` fail.
    pub fn fail_connection(mut self, from: &str, to: &str) -> Self {
        self.failing_connections
            .insert((from.to_string(), to.to_string()));
        self
    }

    /// Make `disconnect_all_midi_ports()` fail.
    pub fn fail_disconnect(mut self) -> Self {
        self.fail_disconnect = true;
        self
    }

    /// Make `create_audio_loopback(source_id, sink_id)` fail.
    pub fn fail_loopback(mut self, source_id: &str, sink_id: &str) -> Self {
        self.failing_loopbacks
            .insert((source_id.to_string(), sink_id.to_string()));
        self
    }

    /// Make every volume query fail.
    pub fn fail_volume_query(mut self) -> Self {
        self.fail_volume_query = true;
        self
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        self.invocations.borrow().clone()
    }

    /// Only the routing operations, in issue order.
    pub fn route_commands(&self) -> Vec<RouteCommand> {
        self.invocations
            .borrow()
            .iter()
            .filter_map(|inv| match inv {
                Invocation::DisconnectAllMidi => Some(RouteCommand::DisconnectAllMidi),
                Invocation::ConnectMidi { from, to } => Some(RouteCommand::ConnectMidi {
                    from: from.clone(),
                    to: to.clone(),
                }),
                Invocation::CreateLoopback { source_id, sink_id } => {
                    Some(RouteCommand::CreateLoopback {
                        source_id: source_id.clone(),
                        sink_id: sink_id.clone(),
                    })
                }
                _ => None,
            })
            .collect()
    }

    fn record(&self, invocation: Invocation) {
        self.invocations.borrow_mut().push(invocation);
    }
}

fn command_failed(program: &str, args: Vec<String>, stderr: &str) -> Error {
    Error::CommandFailed {
        program: program.to_string(),
        args,
        status: failed_status(),
        stderr: stderr.to_string(),
    }
}

impl CommandExecutor for RecordingExecutor {
    fn disconnect_all_midi_ports(&self) -> Result<()> {
        self.record(Invocation::DisconnectAllMidi);
        if self.fail_disconnect {
            return Err(command_failed(
                "aconnect",
                vec!["-x".to_string()],
                "can't open sequencer",
            ));
        }
        Ok(())
    }

    fn connect_midi_ports(&self, from: &str, to: &str) -> Result<()> {
        self.record(Invocation::ConnectMidi {
            from: from.to_string(),
            to: to.to_string(),
        });
        if self
            .failing_connections
            .contains(&(from.to_string(), to.to_string()))
        {
            return Err(command_failed(
                "aconnect",
                vec![format!("{}:0", from), format!("{}:0", to)],
                "Connection failed (No such file or directory)",
            ));
        }
        Ok(())
    }

    fn fetch_midi_client_report(&self) -> Result<String> {
        self.record(Invocation::FetchMidiReport);
        Ok(self.midi_report.clone())
    }

    fn fetch_audio_report(&self) -> Result<String> {
        self.record(Invocation::FetchAudioReport);
        Ok(self.audio_report.clone())
    }

    fn create_audio_loopback(&self, source_id: &str, sink_id: &str) -> Result<()> {
        self.record(Invocation::CreateLoopback {
            source_id: source_id.to_string(),
            sink_id: sink_id.to_string(),
        });
        if self
            .failing_loopbacks
            .contains(&(source_id.to_string(), sink_id.to_string()))
        {
            return Err(command_failed(
                "pactl",
                vec![
                    "load-module".to_string(),
                    "module-loopback".to_string(),
                    format!("source={}", source_id),
                    format!("sink={}", sink_id),
                ],
                "Failure: Module initialization failed",
            ));
        }
        Ok(())
    }

    fn query_volume(&self, id: &str, kind: DeviceKind) -> Result<String> {
        self.record(Invocation::QueryVolume {
            id: id.to_string(),
            kind,
        });
        if self.fail_volume_query {
            return Err(command_failed(
                "pactl",
                vec![format!("get-{}-volume", kind), id.to_string()],
                "Failure: No such entity",
            ));
        }
        Ok(self.volume_report.clone())
    }

    fn set_volume(&self, id: &str, kind: DeviceKind, percent: u8) -> Result<()> {
        self.record(Invocation::SetVolume {
            id: id.to_string(),
            kind,
            percent,
        });
        Ok(())
    }
}

#[cfg(unix)]
fn failed_status() -> std::process::ExitStatus {
    use std::os::unix::process::ExitStatusExt;
    std::process::ExitStatus::from_raw(1 << 8)
}

#[cfg(not(unix))]
fn failed_status() -> std::process::ExitStatus {
    use std::os::windows::process::ExitStatusExt;
    std::process::ExitStatus::from_raw(1)
}
