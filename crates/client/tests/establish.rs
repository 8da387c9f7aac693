use buildwatch_client::testing::{
    sockname_stdout, FakeClock, FakeProcessRunner, NullConnector, ScriptedClient,
    ScriptedConnector,
};
use buildwatch_client::{
    establish, Capability, SessionDescriptor, SessionOptions, WatchSession,
};
use buildwatch_protocol::{clock_query, version_query, watch_project_query};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

const EXE: &str = "/opt/bin/watchman";
const SOCK: &str = "/path/to/sock";
const ROOT: &str = "/some/root";

fn options() -> SessionOptions {
    SessionOptions::new(EXE).watch_root(ROOT)
}

fn sock_path() -> &'static Path {
    Path::new(SOCK)
}

fn capabilities(entries: &[(&str, bool)]) -> serde_json::Value {
    let map: BTreeMap<&str, bool> = entries.iter().copied().collect();
    json!(map)
}

fn all_capabilities_true() -> serde_json::Value {
    capabilities(&[
        ("term-dirname", true),
        ("cmd-watch-project", true),
        ("wildmatch", true),
        ("wildmatch_multislash", true),
        ("glob_generator", true),
        ("clock-sync-timeout", true),
    ])
}

#[tokio::test]
async fn failing_get_sockname_yields_unavailable() {
    let clock = FakeClock::new();
    let runner = FakeProcessRunner::exits(clock.clone(), 1);

    let session = establish(&options(), &runner, &NullConnector, clock.clone()).await;

    assert_eq!(session, WatchSession::Unavailable);
}

#[tokio::test]
async fn unreachable_endpoint_yields_unavailable() {
    let clock = FakeClock::new();
    let runner = FakeProcessRunner::prints(clock.clone(), sockname_stdout("4.7.0", sock_path()));

    let session = establish(&options(), &runner, &NullConnector, clock.clone()).await;

    assert_eq!(session, WatchSession::Unavailable);
}

#[tokio::test]
async fn legacy_daemon_without_capabilities_yields_unavailable() {
    let clock = FakeClock::new();
    let runner = FakeProcessRunner::prints(clock.clone(), sockname_stdout("3.7.9", sock_path()));
    let client = ScriptedClient::new(clock.clone())
        .replies(version_query(), json!({"version": "3.7.9"}));
    let connector = ScriptedConnector::new(SOCK, client);

    let session = establish(&options(), &runner, &connector, clock.clone()).await;

    assert_eq!(session, WatchSession::Unavailable);
}

#[tokio::test]
async fn rejected_required_capability_yields_unavailable() {
    let clock = FakeClock::new();
    let runner = FakeProcessRunner::prints(clock.clone(), sockname_stdout("3.8.0", sock_path()));
    let client = ScriptedClient::new(clock.clone()).replies(
        version_query(),
        json!({
            "version": "3.8.0",
            "capabilities": capabilities(&[
                ("term-dirname", true),
                ("cmd-watch-project", false),
                ("wildmatch", false),
                ("wildmatch_multislash", false),
                ("glob_generator", false),
            ]),
            "error": "client required capability `cmd-watch-project` is not supported by this server",
        }),
    );
    let connector = ScriptedConnector::new(SOCK, client);

    let session = establish(&options(), &runner, &connector, clock.clone()).await;

    assert_eq!(session, WatchSession::Unavailable);
}

#[tokio::test]
async fn discovery_overshooting_the_budget_yields_unavailable() {
    let clock = FakeClock::new();
    let runner = FakeProcessRunner::prints(clock.clone(), sockname_stdout("3.8.0", sock_path()))
        .with_wait(Duration::from_secs(30));
    let client = ScriptedClient::new(clock.clone()).replies(
        version_query(),
        json!({"version": "3.8.0", "capabilities": all_capabilities_true()}),
    );
    let connector = ScriptedConnector::new(SOCK, client);

    let session = establish(
        &options().budget(Duration::from_millis(5000)),
        &runner,
        &connector,
        clock.clone(),
    )
    .await;

    assert_eq!(session, WatchSession::Unavailable);
}

#[tokio::test]
async fn registration_overshooting_the_budget_yields_unavailable() {
    let clock = FakeClock::new();
    let runner = FakeProcessRunner::prints(clock.clone(), sockname_stdout("3.8.0", sock_path()));
    let client = ScriptedClient::new(clock.clone())
        .replies(
            version_query(),
            json!({
                "version": "3.8.0",
                "capabilities": capabilities(&[
                    ("term-dirname", true),
                    ("cmd-watch-project", true),
                    ("wildmatch", false),
                    ("wildmatch_multislash", false),
                    ("glob_generator", false),
                    ("clock-sync-timeout", false),
                ]),
            }),
        )
        .replies_after(
            watch_project_query(Path::new(ROOT)),
            json!({"version": "3.8.0", "watch": ROOT}),
            Duration::from_secs(30),
        );
    let connector = ScriptedConnector::new(SOCK, client);

    let session = establish(
        &options().budget(Duration::from_millis(5000)),
        &runner,
        &connector,
        clock.clone(),
    )
    .await;

    assert_eq!(session, WatchSession::Unavailable);
}

#[tokio::test]
async fn capabilities_resolved_for_a_3_8_daemon() {
    let clock = FakeClock::new();
    let runner = FakeProcessRunner::prints(clock.clone(), sockname_stdout("3.8.0", sock_path()));
    let client = ScriptedClient::new(clock.clone())
        .replies(
            version_query(),
            json!({
                "version": "3.8.0",
                "capabilities": capabilities(&[
                    ("term-dirname", true),
                    ("cmd-watch-project", true),
                    ("wildmatch", true),
                    ("wildmatch_multislash", true),
                    ("glob_generator", false),
                    ("clock-sync-timeout", false),
                ]),
            }),
        )
        .replies(
            watch_project_query(Path::new(ROOT)),
            json!({"version": "3.8.0", "watch": ROOT}),
        )
        .replies(
            clock_query(Path::new(ROOT), None),
            json!({"version": "3.8.0", "clock": "c:0:0:1"}),
        );
    let connector = ScriptedConnector::new(SOCK, client);

    let session = establish(&options(), &runner, &connector, clock.clone()).await;

    let expected_capabilities: BTreeSet<Capability> = [
        Capability::Dirname,
        Capability::WatchProject,
        Capability::Wildmatch,
        Capability::WildmatchMultislash,
    ]
    .into_iter()
    .collect();
    let expected_clocks: BTreeMap<PathBuf, String> =
        [(PathBuf::from(ROOT), "c:0:0:1".to_string())]
            .into_iter()
            .collect();
    assert_eq!(
        session,
        WatchSession::Established(SessionDescriptor {
            sockname: PathBuf::from(SOCK),
            version: "3.8.0".to_string(),
            capabilities: expected_capabilities,
            clocks: expected_clocks,
        })
    );
}

#[tokio::test]
async fn capabilities_resolved_for_a_4_7_daemon_with_sync_timeout() {
    let clock = FakeClock::new();
    let runner = FakeProcessRunner::prints(clock.clone(), sockname_stdout("4.7.0", sock_path()));
    // No fake time passes, so the remaining budget at the clock query is the
    // full 5000 ms and becomes its sync_timeout.
    let client = ScriptedClient::new(clock.clone())
        .replies(
            version_query(),
            json!({"version": "4.7.0", "capabilities": all_capabilities_true()}),
        )
        .replies(
            watch_project_query(Path::new(ROOT)),
            json!({"version": "4.7.0", "watch": ROOT}),
        )
        .replies(
            clock_query(Path::new(ROOT), Some(5000)),
            json!({"version": "4.7.0", "clock": "c:0:0:1"}),
        );
    let connector = ScriptedConnector::new(SOCK, client);

    let session = establish(
        &options().budget(Duration::from_millis(5000)),
        &runner,
        &connector,
        clock.clone(),
    )
    .await;

    let descriptor = session.descriptor().expect("session should establish");
    assert_eq!(descriptor.capabilities.len(), 6);
    assert!(descriptor.supports(Capability::GlobGenerator));
    assert!(descriptor.supports(Capability::ClockSyncTimeout));
    assert_eq!(descriptor.clock_for(Path::new(ROOT)), Some("c:0:0:1"));
}

#[tokio::test]
async fn empty_clock_reply_omits_the_root_without_failing() {
    let clock = FakeClock::new();
    let runner = FakeProcessRunner::prints(clock.clone(), sockname_stdout("4.7.0", sock_path()));
    let client = ScriptedClient::new(clock.clone())
        .replies(
            version_query(),
            json!({"version": "4.7.0", "capabilities": all_capabilities_true()}),
        )
        .replies(
            watch_project_query(Path::new(ROOT)),
            json!({"version": "4.7.0", "watch": ROOT}),
        )
        .replies(clock_query(Path::new(ROOT), Some(5000)), json!({}));
    let connector = ScriptedConnector::new(SOCK, client);

    let session = establish(
        &options().budget(Duration::from_millis(5000)),
        &runner,
        &connector,
        clock.clone(),
    )
    .await;

    let descriptor = session.descriptor().expect("session should establish");
    assert!(descriptor.clocks.is_empty());
}

#[tokio::test]
async fn one_failing_root_voids_the_whole_session() {
    let second_root = "/some/other";
    let clock = FakeClock::new();
    let runner = FakeProcessRunner::prints(clock.clone(), sockname_stdout("4.7.0", sock_path()));
    let client = ScriptedClient::new(clock.clone())
        .replies(
            version_query(),
            json!({"version": "4.7.0", "capabilities": all_capabilities_true()}),
        )
        .replies(
            watch_project_query(Path::new(ROOT)),
            json!({"version": "4.7.0", "watch": ROOT}),
        )
        .replies(
            watch_project_query(Path::new(second_root)),
            json!({"version": "4.7.0", "error": "unable to resolve root"}),
        );
    let connector = ScriptedConnector::new(SOCK, client);

    let session = establish(
        &options().watch_root(second_root),
        &runner,
        &connector,
        clock.clone(),
    )
    .await;

    assert_eq!(session, WatchSession::Unavailable);
}

#[tokio::test]
async fn every_registered_root_gets_its_own_clock() {
    let second_root = "/some/other";
    let clock = FakeClock::new();
    let runner = FakeProcessRunner::prints(clock.clone(), sockname_stdout("4.7.0", sock_path()));
    let client = ScriptedClient::new(clock.clone())
        .replies(
            version_query(),
            json!({"version": "4.7.0", "capabilities": all_capabilities_true()}),
        )
        .replies(
            watch_project_query(Path::new(ROOT)),
            json!({"version": "4.7.0", "watch": ROOT}),
        )
        .replies(
            watch_project_query(Path::new(second_root)),
            json!({"version": "4.7.0", "watch": second_root}),
        )
        .replies(
            clock_query(Path::new(ROOT), None),
            json!({"version": "4.7.0", "clock": "c:0:0:1"}),
        )
        .replies(
            clock_query(Path::new(second_root), None),
            json!({"version": "4.7.0", "clock": "c:0:0:2"}),
        );
    let connector = ScriptedConnector::new(SOCK, client);

    let session = establish(
        &options().watch_root(second_root),
        &runner,
        &connector,
        clock.clone(),
    )
    .await;

    let descriptor = session.descriptor().expect("session should establish");
    let expected: BTreeMap<PathBuf, String> = [
        (PathBuf::from(ROOT), "c:0:0:1".to_string()),
        (PathBuf::from(second_root), "c:0:0:2".to_string()),
    ]
    .into_iter()
    .collect();
    assert_eq!(descriptor.clocks, expected);
}
