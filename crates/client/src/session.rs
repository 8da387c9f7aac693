use buildwatch_protocol::Capability;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

/// Immutable record of a fully-established watch session.
///
/// Only constructed after every requested root registered successfully, so
/// its contents always reflect one completed negotiation. Roots whose clock
/// query returned no token are simply absent from `clocks`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionDescriptor {
    /// Socket endpoint the session was established over.
    pub sockname: PathBuf,
    /// Daemon version string from the negotiation reply.
    pub version: String,
    /// Capabilities the daemon reported as supported.
    pub capabilities: BTreeSet<Capability>,
    /// Initial change-tracking token per registered root.
    pub clocks: BTreeMap<PathBuf, String>,
}

impl SessionDescriptor {
    pub fn supports(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    pub fn clock_for(&self, root: &Path) -> Option<&str> {
        self.clocks.get(root).map(String::as_str)
    }
}

/// Outcome of one establishment attempt.
///
/// `Unavailable` means the build runs without file-watch acceleration. It is
/// a distinct variant, not an empty descriptor: an established session with
/// no capabilities or clocks still compares unequal to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WatchSession {
    Established(SessionDescriptor),
    Unavailable,
}

impl WatchSession {
    pub fn is_available(&self) -> bool {
        matches!(self, WatchSession::Established(_))
    }

    pub fn descriptor(&self) -> Option<&SessionDescriptor> {
        match self {
            WatchSession::Established(descriptor) => Some(descriptor),
            WatchSession::Unavailable => None,
        }
    }
}
