//! Scripted test doubles for the establishment pipeline.
//!
//! These let the negotiation, registration, and clock stages run against a
//! fully deterministic daemon: a settable clock instead of real time, a
//! process runner that replays canned stdout, and a connector that hands
//! out a client answering from a fixed query/reply script.

use crate::clock::Clock;
use crate::connect::{Connector, DaemonClient};
use crate::process::{ProcessOutput, ProcessRunner};
use async_trait::async_trait;
use buildwatch_protocol::{sockname_args, wire};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Settable [`Clock`]. Time only moves when a test (or another fake
/// collaborator) calls [`advance`](FakeClock::advance).
pub struct FakeClock {
    base: Instant,
    offset: Mutex<Duration>,
}

impl FakeClock {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            base: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        })
    }

    pub fn advance(&self, delta: Duration) {
        *self.offset.lock().expect("fake clock poisoned") += delta;
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Instant {
        self.base + *self.offset.lock().expect("fake clock poisoned")
    }
}

/// [`ProcessRunner`] that replays one canned `get-sockname` run, advancing
/// the fake clock by a configurable wait before returning. The wait is
/// simulated after the fact, so a run that overshoots the budget still
/// returns its output and relies on the pipeline's deadline check.
pub struct FakeProcessRunner {
    clock: Arc<FakeClock>,
    wait: Duration,
    stdout: Vec<u8>,
    exit_code: i32,
}

impl FakeProcessRunner {
    /// A run that prints `stdout` and exits 0.
    pub fn prints(clock: Arc<FakeClock>, stdout: impl Into<Vec<u8>>) -> Self {
        Self {
            clock,
            wait: Duration::ZERO,
            stdout: stdout.into(),
            exit_code: 0,
        }
    }

    /// A run that prints nothing and exits with `exit_code`.
    pub fn exits(clock: Arc<FakeClock>, exit_code: i32) -> Self {
        Self {
            clock,
            wait: Duration::ZERO,
            stdout: Vec::new(),
            exit_code,
        }
    }

    pub fn with_wait(mut self, wait: Duration) -> Self {
        self.wait = wait;
        self
    }
}

#[async_trait]
impl ProcessRunner for FakeProcessRunner {
    async fn run(
        &self,
        _exe: &Path,
        args: &[String],
        _env: &BTreeMap<String, String>,
        _wait: Option<Duration>,
    ) -> io::Result<ProcessOutput> {
        assert_eq!(args, sockname_args(), "unexpected subprocess arguments");
        self.clock.advance(self.wait);
        Ok(ProcessOutput {
            stdout: self.stdout.clone(),
            exit_code: self.exit_code,
        })
    }
}

/// Canned `get-sockname` stdout.
pub fn sockname_stdout(version: &str, sockname: &Path) -> Vec<u8> {
    serde_json::to_vec(&json!({"version": version, "sockname": sockname}))
        .expect("sockname stdout encodes")
}

struct ScriptedExchange {
    query: Value,
    reply: Value,
    elapsed: Duration,
}

/// [`DaemonClient`] answering from a fixed query/reply script.
///
/// Lookup is by exact query value, so a test fails loudly (panics) when the
/// pipeline sends anything it did not script. Each exchange advances the
/// fake clock by its configured elapsed time.
pub struct ScriptedClient {
    clock: Arc<FakeClock>,
    exchanges: Vec<ScriptedExchange>,
}

impl ScriptedClient {
    pub fn new(clock: Arc<FakeClock>) -> Self {
        Self {
            clock,
            exchanges: Vec::new(),
        }
    }

    /// Script an instantaneous reply to `query`.
    pub fn replies(self, query: Value, reply: Value) -> Self {
        self.replies_after(query, reply, Duration::ZERO)
    }

    /// Script a reply to `query` whose round trip takes `elapsed`.
    pub fn replies_after(mut self, query: Value, reply: Value, elapsed: Duration) -> Self {
        self.exchanges.push(ScriptedExchange {
            query,
            reply,
            elapsed,
        });
        self
    }
}

#[async_trait]
impl DaemonClient for ScriptedClient {
    async fn query(&mut self, query: &Value) -> wire::Result<Value> {
        let exchange = self
            .exchanges
            .iter()
            .find(|exchange| &exchange.query == query)
            .unwrap_or_else(|| panic!("unscripted query: {query}"));
        self.clock.advance(exchange.elapsed);
        Ok(exchange.reply.clone())
    }
}

/// [`Connector`] that hands out one [`ScriptedClient`] when asked for the
/// expected endpoint path, and refuses any other path.
pub struct ScriptedConnector {
    sockname: PathBuf,
    client: Mutex<Option<ScriptedClient>>,
}

impl ScriptedConnector {
    pub fn new(sockname: impl Into<PathBuf>, client: ScriptedClient) -> Self {
        Self {
            sockname: sockname.into(),
            client: Mutex::new(Some(client)),
        }
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn connect(&self, sockname: &Path) -> Option<Box<dyn DaemonClient>> {
        if sockname != self.sockname {
            eprintln!(
                "scripted connector: unexpected endpoint {} (want {})",
                sockname.display(),
                self.sockname.display(),
            );
            return None;
        }
        self.client
            .lock()
            .expect("scripted connector poisoned")
            .take()
            .map(|client| Box::new(client) as Box<dyn DaemonClient>)
    }
}

/// [`Connector`] that never yields a connection.
pub struct NullConnector;

#[async_trait]
impl Connector for NullConnector {
    async fn connect(&self, _sockname: &Path) -> Option<Box<dyn DaemonClient>> {
        None
    }
}
