use serde::{Deserialize, Serialize};

/// Identifier assigned by the audio server or the ALSA sequencer.
///
/// Kept as text: it is only ever compared and handed back to the tools.
pub type ObjectId = String;

/// Direction of an audio device as seen by the sound server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    /// Capture device (USB interface input, microphone)
    Source,
    /// Playback device (headphone jack, USB interface output)
    Sink,
}

impl DeviceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Source => "source",
            Self::Sink => "sink",
        }
    }
}

impl std::fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DeviceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "source" => Ok(Self::Source),
            "sink" => Ok(Self::Sink),
            other => Err(format!("unknown device kind '{}'", other)),
        }
    }
}

/// An audio source or sink
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub id: ObjectId,
    pub kind: DeviceKind,
    /// Sound server name, e.g. `alsa_input.usb-Focusrite_Scarlett-00.analog-stereo`
    pub technical_name: String,
    /// Human readable description
    pub display_name: String,
    /// Filled in after scanning; 0 until then
    pub volume_percent: u8,
    /// True when the technical name marks a physical USB capture interface
    pub is_usb_input: bool,
}

/// An existing loopback: audio captured from `source_id` playing on `sink_id`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pipe {
    pub source_id: ObjectId,
    pub sink_id: ObjectId,
}

/// An addressable ALSA sequencer client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Client {
    pub id: ObjectId,
    pub name: String,
}

/// A complete record emitted by the audio report scanner
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioRecord {
    Device(Device),
    Pipe(Pipe),
}

/// Snapshot of the audio side of the host, rebuilt on every scan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topology {
    /// USB input sources, in report order
    pub sources: Vec<Device>,
    /// All sinks, in report order
    pub sinks: Vec<Device>,
    pub pipes: Vec<Pipe>,
    /// Id of the sink matching the configured preference; empty when none does
    pub preferred_sink_id: ObjectId,
    /// Every device, in insertion order
    pub detail: Vec<Device>,
}

impl Topology {
    /// Build a snapshot from scanned records.
    ///
    /// The first sink whose technical name equals `sink_preference` becomes
    /// the preferred sink.
    pub fn from_records(records: Vec<AudioRecord>, sink_preference: Option<&str>) -> Self {
        let mut topology = Self::default();

        for record in records {
            match record {
                AudioRecord::Pipe(pipe) => topology.pipes.push(pipe),
                AudioRecord::Device(device) => {
                    match device.kind {
                        DeviceKind::Sink => {
                            if topology.preferred_sink_id.is_empty()
                                && sink_preference == Some(device.technical_name.as_str())
                            {
                                topology.preferred_sink_id = device.id.clone();
                            }
                            topology.sinks.push(device.clone());
                        }
                        DeviceKind::Source => topology.sources.push(device.clone()),
                    }
                    topology.detail.push(device);
                }
            }
        }

        topology
    }

    pub fn preferred_sink(&self) -> Option<&Device> {
        if self.preferred_sink_id.is_empty() {
            return None;
        }
        self.sinks.iter().find(|s| s.id == self.preferred_sink_id)
    }

    pub fn find_sink_by_name(&self, technical_name: &str) -> Option<&Device> {
        self.sinks.iter().find(|s| s.technical_name == technical_name)
    }

    pub fn has_pipe(&self, source_id: &str, sink_id: &str) -> bool {
        self.pipes
            .iter()
            .any(|p| p.source_id == source_id && p.sink_id == sink_id)
    }

    /// Apply `f` to a device in every list it appears in.
    pub(crate) fn update_device(&mut self, kind: DeviceKind, id: &str, f: impl Fn(&mut Device)) {
        let list = match kind {
            DeviceKind::Source => &mut self.sources,
            DeviceKind::Sink => &mut self.sinks,
        };
        list.iter_mut()
            .chain(self.detail.iter_mut())
            .filter(|d| d.kind == kind && d.id == id)
            .for_each(&f);
    }
}

/// Routing operation issued against the sound server or the sequencer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteCommand {
    /// Drop every sequencer subscription
    DisconnectAllMidi,
    /// Subscribe port 0 of `to` to port 0 of `from`
    ConnectMidi { from: ObjectId, to: ObjectId },
    /// Load a loopback module playing `source_id` on `sink_id`
    CreateLoopback { source_id: ObjectId, sink_id: ObjectId },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(id: &str, kind: DeviceKind, name: &str) -> Device {
        Device {
            id: id.into(),
            kind,
            technical_name: name.into(),
            display_name: name.into(),
            volume_percent: 0,
            is_usb_input: false,
        }
    }

    #[test]
    fn test_first_matching_sink_is_preferred() {
        let records = vec![
            AudioRecord::Device(device("1", DeviceKind::Sink, "jack")),
            AudioRecord::Device(device("2", DeviceKind::Sink, "jack")),
        ];
        let topology = Topology::from_records(records, Some("jack"));
        assert_eq!(topology.preferred_sink_id, "1");
        assert_eq!(topology.preferred_sink().map(|d| d.id.as_str()), Some("1"));
    }

    #[test]
    fn test_stale_preference_leaves_id_empty() {
        let records = vec![AudioRecord::Device(device("1", DeviceKind::Sink, "hdmi"))];
        let topology = Topology::from_records(records, Some("jack"));
        assert!(topology.preferred_sink_id.is_empty());
        assert!(topology.preferred_sink().is_none());

        let topology = Topology::from_records(Vec::new(), None);
        assert!(topology.preferred_sink_id.is_empty());
    }

    #[test]
    fn test_detail_keeps_insertion_order() {
        let records = vec![
            AudioRecord::Device(device("5", DeviceKind::Sink, "b")),
            AudioRecord::Pipe(Pipe {
                source_id: "3".into(),
                sink_id: "5".into(),
            }),
            AudioRecord::Device(device("3", DeviceKind::Source, "a")),
        ];
        let topology = Topology::from_records(records, None);
        let ids: Vec<_> = topology.detail.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, ["5", "3"]);
        assert_eq!(topology.sources.len(), 1);
        assert_eq!(topology.sinks.len(), 1);
        assert!(topology.has_pipe("3", "5"));
        assert!(!topology.has_pipe("5", "3"));
    }

    #[test]
    fn test_update_device_touches_all_views() {
        let records = vec![AudioRecord::Device(device("7", DeviceKind::Sink, "jack"))];
        let mut topology = Topology::from_records(records, None);
        topology.update_device(DeviceKind::Sink, "7", |d| d.volume_percent = 42);
        assert_eq!(topology.sinks[0].volume_percent, 42);
        assert_eq!(topology.detail[0].volume_percent, 42);
    }

    #[test]
    fn test_device_kind_parse() {
        assert_eq!("Sink".parse::<DeviceKind>(), Ok(DeviceKind::Sink));
        assert_eq!("source".parse::<DeviceKind>(), Ok(DeviceKind::Source));
        assert!("card".parse::<DeviceKind>().is_err());
    }
}
