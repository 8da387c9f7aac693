//! # Buildwatch Protocol
//!
//! Wire-level protocol for talking to a watchman-compatible file-watching
//! daemon: the capability name table, the query shapes the client sends
//! during session establishment, the typed replies it expects back, and the
//! newline-delimited JSON framing used on the daemon socket.
//!
//! The daemon side of the protocol is not modelled here; this crate only
//! describes what the client says and how it reads what comes back.

mod capability;
mod query;
pub mod wire;

pub use capability::{resolve_capabilities, Capability, CAPABILITY_TABLE, REQUIRED_CAPABILITIES};
pub use query::{
    clock_query, sockname_args, version_query, watch_project_query, ClockReply, SocknameReply,
    VersionReply, WatchProjectReply, GET_SOCKNAME_SUBCOMMAND, OUTPUT_ENCODING_FLAG,
};
