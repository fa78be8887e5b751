//! Patchbay module
//!
//! Decides which connections should exist and issues the commands that
//! create them.  Works purely with the types from [`crate::system`].

pub mod host;
pub mod manager;

pub use host::{Host, VolumeTarget};
pub use manager::{PatchbayManager, plan_audio, plan_midi};
