use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// An optional daemon feature negotiated at session establishment.
///
/// Daemons advertise these by stable wire name; anything the daemon does not
/// report (or reports as `false`) is treated as unsupported. Queries built
/// elsewhere in this crate consult the resolved set before using a feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Capability {
    /// The `dirname` expression term is available in queries.
    #[serde(rename = "term-dirname")]
    Dirname,
    /// The `watch-project` command is available (required for any session).
    #[serde(rename = "cmd-watch-project")]
    WatchProject,
    /// Glob patterns use wildmatch semantics.
    #[serde(rename = "wildmatch")]
    Wildmatch,
    /// `**` in a glob may match across multiple path components.
    #[serde(rename = "wildmatch_multislash")]
    WildmatchMultislash,
    /// The glob generator can be named explicitly in queries.
    #[serde(rename = "glob_generator")]
    GlobGenerator,
    /// `clock` queries accept a `sync_timeout` parameter.
    #[serde(rename = "clock-sync-timeout")]
    ClockSyncTimeout,
}

/// Wire-name table for every capability the client knows about.
///
/// Append-only: adding an entry here is the only change needed for the
/// negotiation stage to start requesting a new optional feature.
pub const CAPABILITY_TABLE: &[(&str, Capability)] = &[
    ("term-dirname", Capability::Dirname),
    ("cmd-watch-project", Capability::WatchProject),
    ("wildmatch", Capability::Wildmatch),
    ("wildmatch_multislash", Capability::WildmatchMultislash),
    ("glob_generator", Capability::GlobGenerator),
    ("clock-sync-timeout", Capability::ClockSyncTimeout),
];

/// Capabilities the daemon must support for a session to be usable at all.
pub const REQUIRED_CAPABILITIES: &[Capability] = &[Capability::WatchProject];

impl Capability {
    /// The stable name this capability goes by on the wire.
    pub const fn wire_name(self) -> &'static str {
        match self {
            Capability::Dirname => "term-dirname",
            Capability::WatchProject => "cmd-watch-project",
            Capability::Wildmatch => "wildmatch",
            Capability::WildmatchMultislash => "wildmatch_multislash",
            Capability::GlobGenerator => "glob_generator",
            Capability::ClockSyncTimeout => "clock-sync-timeout",
        }
    }

    /// Look up a capability by its wire name.
    pub fn from_wire_name(name: &str) -> Option<Capability> {
        CAPABILITY_TABLE
            .iter()
            .find(|(wire_name, _)| *wire_name == name)
            .map(|(_, capability)| *capability)
    }
}

/// Resolve a daemon-reported name->bool map into the internal capability set.
///
/// Names the client does not know are ignored; names reported `false` are
/// excluded. The result only ever contains entries from [`CAPABILITY_TABLE`].
pub fn resolve_capabilities(reported: &BTreeMap<String, bool>) -> BTreeSet<Capability> {
    reported
        .iter()
        .filter(|(_, supported)| **supported)
        .filter_map(|(name, _)| Capability::from_wire_name(name))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn reported(entries: &[(&str, bool)]) -> BTreeMap<String, bool> {
        entries
            .iter()
            .map(|(name, supported)| (name.to_string(), *supported))
            .collect()
    }

    #[test]
    fn wire_names_round_trip() {
        for (name, capability) in CAPABILITY_TABLE {
            assert_eq!(capability.wire_name(), *name);
            assert_eq!(Capability::from_wire_name(name), Some(*capability));
        }
    }

    #[test]
    fn unknown_names_resolve_to_nothing() {
        let set = resolve_capabilities(&reported(&[("scm-hg", true), ("cmd-watch-del-all", true)]));
        assert!(set.is_empty());
    }

    #[test]
    fn false_values_are_excluded() {
        let set = resolve_capabilities(&reported(&[
            ("term-dirname", true),
            ("cmd-watch-project", true),
            ("wildmatch", false),
            ("glob_generator", false),
        ]));
        let expected: BTreeSet<Capability> = [Capability::Dirname, Capability::WatchProject]
            .into_iter()
            .collect();
        assert_eq!(set, expected);
    }

    #[test]
    fn every_capability_resolves_when_reported_true() {
        let all = reported(&CAPABILITY_TABLE.iter().map(|(n, _)| (*n, true)).collect::<Vec<_>>());
        let set = resolve_capabilities(&all);
        assert_eq!(set.len(), CAPABILITY_TABLE.len());
    }
}
