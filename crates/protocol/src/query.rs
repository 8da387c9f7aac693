use crate::capability::{CAPABILITY_TABLE, REQUIRED_CAPABILITIES};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Flag selecting the JSON output encoding for daemon subcommands.
pub const OUTPUT_ENCODING_FLAG: &str = "--output-encoding=json";

/// Subcommand that prints the daemon's socket endpoint on stdout.
pub const GET_SOCKNAME_SUBCOMMAND: &str = "get-sockname";

/// Command-line arguments for the endpoint-discovery subprocess.
pub fn sockname_args() -> Vec<String> {
    vec![
        OUTPUT_ENCODING_FLAG.to_string(),
        GET_SOCKNAME_SUBCOMMAND.to_string(),
    ]
}

/// The version/capability negotiation query.
///
/// Declares which capabilities the client requires and which it merely wants
/// to know about. Daemons that understand the extended form answer with a
/// `capabilities` map; daemons that predate it answer with a bare version.
pub fn version_query() -> Value {
    let required: Vec<&str> = REQUIRED_CAPABILITIES
        .iter()
        .map(|capability| capability.wire_name())
        .collect();
    let optional: Vec<&str> = CAPABILITY_TABLE.iter().map(|(name, _)| *name).collect();
    json!(["version", {"required": required, "optional": optional}])
}

/// Registration query asking the daemon to watch one project root.
pub fn watch_project_query(root: &Path) -> Value {
    json!(["watch-project", root.to_string_lossy()])
}

/// Clock query for one registered root.
///
/// `sync_timeout` is only meaningful on daemons that advertise
/// [`Capability::ClockSyncTimeout`](crate::Capability::ClockSyncTimeout);
/// without it the query carries an empty parameter map.
pub fn clock_query(root: &Path, sync_timeout: Option<u64>) -> Value {
    match sync_timeout {
        Some(ms) => json!(["clock", root.to_string_lossy(), {"sync_timeout": ms}]),
        None => json!(["clock", root.to_string_lossy(), {}]),
    }
}

/// Decoded stdout of the `get-sockname` subcommand.
#[derive(Debug, Clone, Deserialize)]
pub struct SocknameReply {
    pub version: Option<String>,
    pub sockname: Option<PathBuf>,
}

/// Reply to [`version_query`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VersionReply {
    pub version: Option<String>,
    pub capabilities: Option<BTreeMap<String, bool>>,
    pub error: Option<String>,
}

/// Reply to [`watch_project_query`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WatchProjectReply {
    /// The watched root the daemon actually registered.
    pub watch: Option<String>,
    /// Which watcher backend the daemon chose, when it says.
    pub watcher: Option<String>,
    pub error: Option<String>,
}

/// Reply to [`clock_query`]. A missing `clock` field is a valid reply.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClockReply {
    pub clock: Option<String>,
    pub error: Option<String>,
}
