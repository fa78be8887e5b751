//! Report scanners
//!
//! Turn the text printed by `aconnect -i -l` and `pactl list` into typed
//! records.  Both scanners are pure functions of their input.
//!
//! ## Audio reports
//! Each line is first classified into a [`LineEvent`] by a small ordered set
//! of classifiers.  The events then drive a single accumulator:
//! a header starts a fresh record (whatever was half-built is dropped),
//! field lines fill it in, and the record is emitted the moment it is
//! complete.  Records that never complete are silently discarded.

use std::collections::BTreeMap;

use super::types::{AudioRecord, Client, Device, DeviceKind, ObjectId, Pipe};

/// Sequencer client that represents the kernel's system ports.
const SYSTEM_CLIENT_ID: &str = "0";
/// Name fragment of the kernel's loopback client.
const THROUGH_MARKER: &str = "Through";
/// Technical name prefix of a USB capture interface.
const USB_INPUT_PREFIX: &str = "alsa_input.usb-";

// ── MIDI ──────────────────────────────────────────────────────────────────

/// Parse a `client <id>: '<name>'` line.
pub fn parse_client_line(line: &str) -> Option<Client> {
    let rest = line.trim_start().strip_prefix("client ")?;
    let (id, rest) = rest.split_once(": '")?;
    if id.is_empty() || !id.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let end = rest.rfind('\'')?;
    Some(Client {
        id: id.to_string(),
        name: rest[..end].to_string(),
    })
}

fn is_addressable(client: &Client) -> bool {
    client.id != SYSTEM_CLIENT_ID && !client.name.contains(THROUGH_MARKER)
}

/// Every addressable client in the report, in discovery order.
pub fn list_midi_clients(report: &str) -> Vec<Client> {
    report
        .lines()
        .filter_map(parse_client_line)
        .filter(is_addressable)
        .collect()
}

/// Addressable clients, one per name, sorted by name.
///
/// When several clients share a name the first one reported wins.
pub fn scan_midi_clients(report: &str) -> Vec<Client> {
    let mut by_name: BTreeMap<String, Client> = BTreeMap::new();
    for client in list_midi_clients(report) {
        by_name.entry(client.name.clone()).or_insert(client);
    }
    by_name.into_values().collect()
}

// ── Audio: line classification ────────────────────────────────────────────

/// What a single line of a `pactl list` report means to the scanner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineEvent<'a> {
    ModuleHeader(&'a str),
    DeviceHeader { kind: DeviceKind, id: &'a str },
    Name(&'a str),
    Description(&'a str),
    Argument { source_id: &'a str, sink_id: &'a str },
}

type Classifier = for<'a> fn(&'a str) -> Option<LineEvent<'a>>;

/// Tried in order; the first match wins.
const CLASSIFIERS: &[Classifier] = &[
    classify_module_header,
    classify_device_header,
    classify_argument,
    classify_name,
    classify_description,
];

/// Classify one report line.  Unknown lines yield `None`.
pub fn classify_audio_line(line: &str) -> Option<LineEvent<'_>> {
    let line = line.trim();
    CLASSIFIERS.iter().find_map(|classify| classify(line))
}

/// Leading run of ASCII digits, if non-empty.
fn leading_digits(s: &str) -> Option<&str> {
    let end = s.bytes().take_while(u8::is_ascii_digit).count();
    (end > 0).then(|| &s[..end])
}

fn non_empty(s: &str) -> Option<&str> {
    let s = s.trim();
    (!s.is_empty()).then_some(s)
}

fn classify_module_header(line: &str) -> Option<LineEvent<'_>> {
    leading_digits(line.strip_prefix("Module #")?).map(LineEvent::ModuleHeader)
}

fn classify_device_header(line: &str) -> Option<LineEvent<'_>> {
    let (kind, rest) = if let Some(rest) = line.strip_prefix("Source #") {
        (DeviceKind::Source, rest)
    } else {
        (DeviceKind::Sink, line.strip_prefix("Sink #")?)
    };
    leading_digits(rest).map(|id| LineEvent::DeviceHeader { kind, id })
}

fn classify_argument(line: &str) -> Option<LineEvent<'_>> {
    let rest = line.strip_prefix("Argument: source=")?;
    let source_id = leading_digits(rest)?;
    let rest = rest[source_id.len()..].strip_prefix(" sink=")?;
    let sink_id = leading_digits(rest)?;
    Some(LineEvent::Argument { source_id, sink_id })
}

fn classify_name(line: &str) -> Option<LineEvent<'_>> {
    non_empty(line.strip_prefix("Name:")?).map(LineEvent::Name)
}

fn classify_description(line: &str) -> Option<LineEvent<'_>> {
    non_empty(line.strip_prefix("Description:")?).map(LineEvent::Description)
}

/// True when a technical name marks a USB capture interface.
pub fn is_usb_input_name(name: &str) -> bool {
    name.strip_prefix(USB_INPUT_PREFIX)
        .is_some_and(|rest| !rest.is_empty())
}

// ── Audio: accumulator ────────────────────────────────────────────────────

/// The record currently being assembled
#[derive(Debug, Default)]
enum Partial {
    /// Nothing started, or the last record was just emitted
    #[default]
    Unset,
    /// Inside a module block, waiting for its `Argument:` line
    Module,
    Device {
        kind: DeviceKind,
        id: ObjectId,
        name: Option<String>,
        description: Option<String>,
        usb_input: bool,
    },
}

impl Partial {
    /// Consume the record once both name and description are known.
    ///
    /// The record resets on completion even when nothing is emitted:
    /// sources that are not USB inputs (monitors, built-in mics) are dropped.
    fn take_complete(&mut self) -> Option<Device> {
        match std::mem::take(self) {
            Partial::Device {
                kind,
                id,
                name: Some(name),
                description: Some(description),
                usb_input,
            } => {
                if kind == DeviceKind::Source && !usb_input {
                    return None;
                }
                Some(Device {
                    id,
                    kind,
                    technical_name: name,
                    display_name: description,
                    volume_percent: 0,
                    is_usb_input: usb_input,
                })
            }
            incomplete => {
                *self = incomplete;
                None
            }
        }
    }
}

#[derive(Debug, Default)]
struct AudioScanner {
    current: Partial,
    records: Vec<AudioRecord>,
}

impl AudioScanner {
    fn feed(&mut self, event: LineEvent<'_>) {
        match event {
            LineEvent::ModuleHeader(_) => self.current = Partial::Module,
            LineEvent::DeviceHeader { kind, id } => {
                self.current = Partial::Device {
                    kind,
                    id: id.to_string(),
                    name: None,
                    description: None,
                    usb_input: false,
                };
            }
            LineEvent::Argument { source_id, sink_id } => {
                self.records.push(AudioRecord::Pipe(Pipe {
                    source_id: source_id.to_string(),
                    sink_id: sink_id.to_string(),
                }));
                self.current = Partial::Unset;
            }
            LineEvent::Name(value) => {
                if let Partial::Device {
                    name, usb_input, ..
                } = &mut self.current
                {
                    *name = Some(value.to_string());
                    *usb_input |= is_usb_input_name(value);
                }
            }
            LineEvent::Description(value) => {
                if let Partial::Device { description, .. } = &mut self.current {
                    *description = Some(value.to_string());
                }
            }
        }

        if let Some(device) = self.current.take_complete() {
            self.records.push(AudioRecord::Device(device));
        }
    }
}

/// Scan a `pactl list` report into devices and pipes, in the order their
/// completing line appears.
pub fn scan_audio_report(report: &str) -> Vec<AudioRecord> {
    let mut scanner = AudioScanner::default();
    for event in report.lines().filter_map(classify_audio_line) {
        scanner.feed(event);
    }
    scanner.records
}
