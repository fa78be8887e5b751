//! Patchbay manager
//!
//! Converges the host's routing onto a fixed policy:
//! every USB input is looped to the preferred sink, and every MIDI client
//! is connected to every other one.
//!
//! ## Audio
//! Delta-patch.  Only the missing loopbacks are created; existing ones are
//! never removed, even if they point at a sink that is no longer preferred.
//!
//! ## MIDI
//! Reset-and-rebuild.  All subscriptions are dropped, then the full directed
//! mesh is connected again.  A connection that fails (the port vanished
//! between listing and connecting) is logged and skipped.

use crate::error::Result;
use crate::system::{CommandExecutor, ObjectId, RouteCommand, Topology};

/// Loopbacks still missing between each source and the preferred sink,
/// in source order.  Empty when no sink is preferred.
pub fn plan_audio(topology: &Topology) -> Vec<RouteCommand> {
    let sink_id = &topology.preferred_sink_id;
    if sink_id.is_empty() {
        return Vec::new();
    }

    let mut commands: Vec<RouteCommand> = Vec::new();
    for source in &topology.sources {
        if topology.has_pipe(&source.id, sink_id) {
            continue;
        }
        let command = RouteCommand::CreateLoopback {
            source_id: source.id.clone(),
            sink_id: sink_id.clone(),
        };
        if !commands.contains(&command) {
            commands.push(command);
        }
    }
    commands
}

/// A disconnect followed by one connection per ordered pair of distinct
/// clients: `n * (n - 1)` connections for `n` clients.
pub fn plan_midi(client_ids: &[ObjectId]) -> Vec<RouteCommand> {
    let mut ids: Vec<&ObjectId> = Vec::with_capacity(client_ids.len());
    for id in client_ids {
        if !ids.contains(&id) {
            ids.push(id);
        }
    }

    let mut commands = vec![RouteCommand::DisconnectAllMidi];
    for from in &ids {
        for to in &ids {
            if from != to {
                commands.push(RouteCommand::ConnectMidi {
                    from: (*from).clone(),
                    to: (*to).clone(),
                });
            }
        }
    }
    commands
}

/// Issues planned routing through a [`CommandExecutor`].
pub struct PatchbayManager<E> {
    executor: E,
}

impl<E: CommandExecutor> PatchbayManager<E> {
    pub fn new(executor: E) -> Self {
        Self { executor }
    }

    /// Create the missing loopbacks.  Returns the commands issued.
    ///
    /// Stops at the first failure; loopbacks created before it stay in place.
    pub fn reconcile_audio(&self, topology: &Topology) -> Result<Vec<RouteCommand>> {
        if topology.preferred_sink_id.is_empty() {
            log::warn!("No preferred sink present, audio routing left unchanged");
            return Ok(Vec::new());
        }

        let commands = plan_audio(topology);
        for command in &commands {
            log::debug!("Issuing {:?}", command);
            self.executor.execute(command)?;
        }

        if !commands.is_empty() {
            log::info!(
                "Created {} loopback(s) to sink {}",
                commands.len(),
                topology.preferred_sink_id
            );
        }
        Ok(commands)
    }

    /// Drop all MIDI subscriptions and rebuild the full mesh.  Returns every
    /// command attempted, including connections that failed.
    ///
    /// Only a failed disconnect is fatal; it runs first and means the
    /// sequencer tool is unusable.
    pub fn reconcile_midi(&self, client_ids: &[ObjectId]) -> Result<Vec<RouteCommand>> {
        let commands = plan_midi(client_ids);
        let mut failed = 0usize;

        for command in &commands {
            log::debug!("Issuing {:?}", command);
            match (command, self.executor.execute(command)) {
                (_, Ok(())) => {}
                (RouteCommand::ConnectMidi { from, to }, Err(e)) => {
                    log::warn!("Could not connect MIDI {} -> {}: {}", from, to, e);
                    failed += 1;
                }
                (_, Err(e)) => return Err(e),
            }
        }

        if failed > 0 {
            log::warn!(
                "{} of {} MIDI connections failed",
                failed,
                commands.len() - 1
            );
        }
        Ok(commands)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::{
        AudioRecord, Device, DeviceKind, Invocation, Pipe, RecordingExecutor,
    };

    fn device(id: &str, kind: DeviceKind, name: &str) -> Device {
        Device {
            id: id.into(),
            kind,
            technical_name: name.into(),
            display_name: name.into(),
            volume_percent: 0,
            is_usb_input: kind == DeviceKind::Source,
        }
    }

    fn topology(pipes: &[(&str, &str)]) -> Topology {
        let mut records = vec![
            AudioRecord::Device(device("s1", DeviceKind::Source, "alsa_input.usb-a")),
            AudioRecord::Device(device("p", DeviceKind::Sink, "jack")),
            AudioRecord::Device(device("s2", DeviceKind::Source, "alsa_input.usb-b")),
        ];
        records.extend(pipes.iter().map(|(source, sink)| {
            AudioRecord::Pipe(Pipe {
                source_id: source.to_string(),
                sink_id: sink.to_string(),
            })
        }));
        Topology::from_records(records, Some("jack"))
    }

    fn loopback(source: &str, sink: &str) -> RouteCommand {
        RouteCommand::CreateLoopback {
            source_id: source.into(),
            sink_id: sink.into(),
        }
    }

    fn ids(ids: &[&str]) -> Vec<ObjectId> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_audio_creates_missing_loopbacks_in_source_order() {
        let exec = RecordingExecutor::new();
        let manager = PatchbayManager::new(&exec);

        let issued = manager.reconcile_audio(&topology(&[])).unwrap();
        assert_eq!(issued, vec![loopback("s1", "p"), loopback("s2", "p")]);
        assert_eq!(exec.route_commands(), issued);
    }

    #[test]
    fn test_audio_skips_existing_pipe() {
        let exec = RecordingExecutor::new();
        let manager = PatchbayManager::new(&exec);

        let issued = manager.reconcile_audio(&topology(&[("s1", "p")])).unwrap();
        assert_eq!(issued, vec![loopback("s2", "p")]);
    }

    #[test]
    fn test_audio_keeps_pipes_to_other_sinks() {
        // A loopback to some other sink neither counts nor gets removed
        let commands = plan_audio(&topology(&[("s1", "old"), ("s2", "p")]));
        assert_eq!(commands, vec![loopback("s1", "p")]);
    }

    #[test]
    fn test_audio_converged_is_noop() {
        let exec = RecordingExecutor::new();
        let manager = PatchbayManager::new(&exec);

        let issued = manager
            .reconcile_audio(&topology(&[("s1", "p"), ("s2", "p")]))
            .unwrap();
        assert!(issued.is_empty());
        assert!(exec.invocations().is_empty());
    }

    #[test]
    fn test_audio_without_preferred_sink_is_noop() {
        let exec = RecordingExecutor::new();
        let manager = PatchbayManager::new(&exec);

        let mut stale = topology(&[]);
        stale.preferred_sink_id.clear();
        assert!(manager.reconcile_audio(&stale).unwrap().is_empty());
        assert!(exec.invocations().is_empty());
    }

    #[test]
    fn test_midi_full_mesh() {
        let exec = RecordingExecutor::new();
        let manager = PatchbayManager::new(&exec);

        let issued = manager.reconcile_midi(&ids(&["a", "b", "c"])).unwrap();
        assert_eq!(issued.len(), 7);
        assert_eq!(issued[0], RouteCommand::DisconnectAllMidi);

        let mut pairs: Vec<(String, String)> = exec
            .invocations()
            .into_iter()
            .filter_map(|inv| match inv {
                Invocation::ConnectMidi { from, to } => Some((from, to)),
                _ => None,
            })
            .collect();
        assert_eq!(pairs.len(), 6);
        assert!(pairs.iter().all(|(from, to)| from != to));
        pairs.sort();
        pairs.dedup();
        assert_eq!(pairs.len(), 6);
    }

    #[test]
    fn test_midi_single_or_no_client_only_disconnects() {
        assert_eq!(plan_midi(&ids(&["a"])), vec![RouteCommand::DisconnectAllMidi]);
        assert_eq!(plan_midi(&[]), vec![RouteCommand::DisconnectAllMidi]);
    }

    #[test]
    fn test_midi_duplicate_ids_do_not_duplicate_connections() {
        assert_eq!(plan_midi(&ids(&["a", "b", "a"])).len(), 3);
    }

    #[test]
    fn test_audio_stops_at_first_failed_loopback() {
        let exec = RecordingExecutor::new().fail_loopback("s1", "p");
        let manager = PatchbayManager::new(&exec);

        assert!(manager.reconcile_audio(&topology(&[])).is_err());
        // s2 is never attempted
        assert_eq!(exec.route_commands(), vec![loopback("s1", "p")]);
    }

    #[test]
    fn test_audio_failure_keeps_earlier_loopbacks() {
        let exec = RecordingExecutor::new().fail_loopback("s2", "p");
        let manager = PatchbayManager::new(&exec);

        assert!(manager.reconcile_audio(&topology(&[])).is_err());
        assert_eq!(
            exec.route_commands(),
            vec![loopback("s1", "p"), loopback("s2", "p")]
        );
        // Nothing tries to undo the loopback that succeeded
        assert!(
            exec.invocations()
                .iter()
                .all(|i| matches!(i, Invocation::CreateLoopback { .. }))
        );
    }

    #[test]
    fn test_midi_disconnect_failure_is_fatal() {
        let exec = RecordingExecutor::new().fail_disconnect();
        let manager = PatchbayManager::new(&exec);

        assert!(manager.reconcile_midi(&ids(&["a", "b", "c"])).is_err());
        assert_eq!(exec.invocations(), vec![Invocation::DisconnectAllMidi]);
    }

    #[test]
    fn test_midi_connect_failure_is_not_fatal() {
        let exec = RecordingExecutor::new().fail_connection("a", "b");
        let manager = PatchbayManager::new(&exec);

        let issued = manager.reconcile_midi(&ids(&["a", "b", "c"])).unwrap();
        assert_eq!(issued.len(), 7);
        // Every pair was still attempted
        assert_eq!(exec.route_commands().len(), 7);
    }
}
