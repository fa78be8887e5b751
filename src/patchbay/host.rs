//! Host orchestration
//!
//! One entry point per operator action.  Every call fetches fresh reports,
//! so nothing here outlives a single invocation.  Calls are not serialised
//! against each other; an embedding that can trigger them concurrently has
//! to do that itself.

use super::manager::PatchbayManager;
use crate::config::Settings;
use crate::error::{Error, Result};
use crate::system::{
    Client, CommandExecutor, DeviceKind, ObjectId, RouteCommand, Topology, VolumeController,
    list_midi_clients, scan_audio_report, scan_midi_clients,
};

/// Which device a volume request applies to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VolumeTarget {
    /// Whatever sink is currently preferred
    PreferredSink,
    Device { id: ObjectId, kind: DeviceKind },
}

impl VolumeTarget {
    /// A device id without a kind is taken to be a source.
    pub fn from_parts(id: Option<String>, kind: Option<DeviceKind>) -> Self {
        match id {
            None => Self::PreferredSink,
            Some(id) => Self::Device {
                id,
                kind: kind.unwrap_or(DeviceKind::Source),
            },
        }
    }
}

pub struct Host<E> {
    executor: E,
    settings: Settings,
}

impl<E: CommandExecutor> Host<E> {
    pub fn new(executor: E, settings: Settings) -> Self {
        Self { executor, settings }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    // ── MIDI ───────────────────────────────────────────────────────────────

    /// Addressable MIDI clients, one per name, sorted by name.
    pub fn midi_clients(&self) -> Result<Vec<Client>> {
        let report = self.executor.fetch_midi_client_report()?;
        Ok(scan_midi_clients(&report))
    }

    /// Connect every MIDI client to every other one.
    pub fn update_midi(&self) -> Result<Vec<RouteCommand>> {
        let report = self.executor.fetch_midi_client_report()?;
        let clients = list_midi_clients(&report);

        if clients.is_empty() {
            log::info!("Devices: None found");
        } else {
            let names: Vec<&str> = clients.iter().map(|c| c.name.as_str()).collect();
            log::info!("Devices: {}", names.join(", "));
        }

        let ids: Vec<ObjectId> = clients.into_iter().map(|c| c.id).collect();
        PatchbayManager::new(&self.executor).reconcile_midi(&ids)
    }

    // ── Audio ──────────────────────────────────────────────────────────────

    /// Scan the sound server and attach the current volume to every device.
    pub fn topology(&self) -> Result<Topology> {
        let report = self.executor.fetch_audio_report()?;
        let records = scan_audio_report(&report);
        let mut topology =
            Topology::from_records(records, self.settings.sink_preference.as_deref());

        if topology.preferred_sink_id.is_empty()
            && let Some(preference) = &self.settings.sink_preference
        {
            log::warn!("Preferred sink '{}' is not present", preference);
        }

        let volume = VolumeController::new(&self.executor);
        let devices: Vec<(DeviceKind, ObjectId)> = topology
            .detail
            .iter()
            .map(|d| (d.kind, d.id.clone()))
            .collect();
        for (kind, id) in devices {
            let percent = volume.get_volume(&id, kind)?;
            topology.update_device(kind, &id, |d| d.volume_percent = percent);
        }

        Ok(topology)
    }

    /// Loop every USB input to the preferred sink.
    pub fn update_audio(&self) -> Result<Vec<RouteCommand>> {
        let topology = self.topology()?;
        PatchbayManager::new(&self.executor).reconcile_audio(&topology)
    }

    /// Read (`percent == None`) or set a volume.  Returns the level.
    pub fn volume(&self, target: VolumeTarget, percent: Option<i64>) -> Result<u8> {
        let (id, kind) = match target {
            VolumeTarget::Device { id, kind } => (id, kind),
            VolumeTarget::PreferredSink => {
                let report = self.executor.fetch_audio_report()?;
                let topology = Topology::from_records(
                    scan_audio_report(&report),
                    self.settings.sink_preference.as_deref(),
                );
                let sink = topology.preferred_sink().ok_or(Error::NoPreferredSink)?;
                (sink.id.clone(), DeviceKind::Sink)
            }
        };

        let volume = VolumeController::new(&self.executor);
        match percent {
            Some(percent) => volume.set_volume(percent, &id, kind),
            None => volume.get_volume(&id, kind),
        }
    }

    /// Prefer the sink with technical name `name` from now on.
    ///
    /// The name must belong to a sink that is present right now.  Returns
    /// the topology as seen with the new preference; the caller persists
    /// [`settings`](Self::settings).
    pub fn select_output(&mut self, name: &str) -> Result<Topology> {
        let report = self.executor.fetch_audio_report()?;
        let topology = Topology::from_records(scan_audio_report(&report), None);
        if topology.find_sink_by_name(name).is_none() {
            return Err(Error::UnknownSink(name.to_string()));
        }

        log::info!("Preferred sink set to {}", name);
        self.settings.sink_preference = Some(name.to_string());
        self.topology()
    }
}
