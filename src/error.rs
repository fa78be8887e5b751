//! Error types for midipipes.
//!
//! Only failures talking to the outside world are errors. Partial report
//! text, unparsable volume output and a preference naming a missing sink
//! are normal conditions and never surface here.

use std::path::PathBuf;
use std::process::ExitStatus;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The tool could not be started (missing binary, permissions).
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The tool ran but exited unsuccessfully.
    #[error("{program} {args:?} failed ({status}): {stderr}")]
    CommandFailed {
        program: String,
        args: Vec<String>,
        status: ExitStatus,
        stderr: String,
    },

    /// The tool printed something that is not UTF-8.
    #[error("{program} produced non UTF-8 output")]
    InvalidOutput { program: String },

    /// A volume was requested for the preferred sink but none is present.
    #[error("no preferred sink is available")]
    NoPreferredSink,

    /// The operator selected an output that is not among the current sinks.
    #[error("no sink named '{0}'")]
    UnknownSink(String),

    #[error("invalid settings file {path}: {source}")]
    Settings {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("cannot access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
