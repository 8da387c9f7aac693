use crate::clock::{Clock, SystemClock, TimeBudget};
use crate::connect::{Connector, DaemonClient, UnixConnector};
use crate::error::{EstablishError, Result};
use crate::process::{ProcessRunner, SystemProcessRunner};
use crate::session::{SessionDescriptor, WatchSession};
use buildwatch_protocol::{
    clock_query, resolve_capabilities, sockname_args, version_query, watch_project_query,
    Capability, ClockReply, SocknameReply, VersionReply, WatchProjectReply,
};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

const STAGE_DISCOVERY: &str = "endpoint discovery";
const STAGE_NEGOTIATION: &str = "capability negotiation";
const STAGE_REGISTRATION: &str = "watch registration";
const STAGE_CLOCK: &str = "clock fetch";

/// Everything the caller supplies for one establishment attempt.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Daemon executable invoked for endpoint discovery.
    pub daemon_exe: PathBuf,
    /// Environment handed to the discovery subprocess.
    pub env: BTreeMap<String, String>,
    /// Project roots to watch, registered in this order.
    pub roots: Vec<PathBuf>,
    /// Overall time budget shared by every stage; `None` disables
    /// time-based aborts.
    pub budget: Option<Duration>,
}

impl SessionOptions {
    pub fn new(daemon_exe: impl Into<PathBuf>) -> Self {
        Self {
            daemon_exe: daemon_exe.into(),
            env: BTreeMap::new(),
            roots: Vec::new(),
            budget: None,
        }
    }

    pub fn watch_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.roots.push(root.into());
        self
    }

    pub fn env_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn budget(mut self, budget: Duration) -> Self {
        self.budget = Some(budget);
        self
    }
}

/// Endpoint discovered from the daemon's `get-sockname` subcommand.
#[derive(Debug, Clone)]
pub struct DaemonEndpoint {
    pub sockname: PathBuf,
    /// Version printed by the subcommand. Informational only; the session
    /// records the version from the negotiation reply instead.
    pub version: Option<String>,
}

/// Establish a watch session with the production collaborators.
pub async fn establish_default(options: &SessionOptions) -> WatchSession {
    establish(
        options,
        &SystemProcessRunner,
        &UnixConnector,
        Arc::new(SystemClock),
    )
    .await
}

/// Establish a watch session: discover the endpoint, connect, negotiate
/// capabilities, register every root, and fetch initial clocks.
///
/// Never fails: every error is logged through the `log` facade and
/// collapsed into [`WatchSession::Unavailable`]. Callers must treat that as
/// "run without file-watch acceleration", not as a reason to abort or
/// retry.
pub async fn establish(
    options: &SessionOptions,
    runner: &dyn ProcessRunner,
    connector: &dyn Connector,
    clock: Arc<dyn Clock>,
) -> WatchSession {
    let budget = TimeBudget::start(clock, options.budget);
    match try_establish(options, runner, connector, &budget).await {
        Ok(descriptor) => {
            log::debug!(
                "established watch session over {} (version {}, {} capabilities, {} clocks)",
                descriptor.sockname.display(),
                descriptor.version,
                descriptor.capabilities.len(),
                descriptor.clocks.len(),
            );
            WatchSession::Established(descriptor)
        }
        Err(err) => {
            log::warn!("file watching unavailable: {err}");
            WatchSession::Unavailable
        }
    }
}

async fn try_establish(
    options: &SessionOptions,
    runner: &dyn ProcessRunner,
    connector: &dyn Connector,
    budget: &TimeBudget,
) -> Result<SessionDescriptor> {
    let endpoint = discover_endpoint(options, runner, budget).await?;

    let mut client = connector
        .connect(&endpoint.sockname)
        .await
        .ok_or_else(|| EstablishError::Connect(endpoint.sockname.clone()))?;

    let (version, capabilities) = negotiate(client.as_mut(), budget).await?;
    register_roots(client.as_mut(), &options.roots, budget).await?;
    let clocks = fetch_clocks(client.as_mut(), &options.roots, &capabilities, budget).await?;

    Ok(SessionDescriptor {
        sockname: endpoint.sockname,
        version,
        capabilities,
        clocks,
    })
}

/// Run `get-sockname` and decode the daemon's endpoint from its stdout.
///
/// The subprocess wait is bounded in-flight by the remaining budget, and the
/// cumulative budget is re-checked once the subprocess returns.
pub async fn discover_endpoint(
    options: &SessionOptions,
    runner: &dyn ProcessRunner,
    budget: &TimeBudget,
) -> Result<DaemonEndpoint> {
    log::debug!(
        "discovering daemon endpoint via {} for {} root(s)",
        options.daemon_exe.display(),
        options.roots.len(),
    );

    let output = runner
        .run(
            &options.daemon_exe,
            &sockname_args(),
            &options.env,
            budget.remaining(),
        )
        .await
        .map_err(|err| match err.kind() {
            std::io::ErrorKind::TimedOut => EstablishError::DeadlineExceeded(STAGE_DISCOVERY),
            _ => EstablishError::Launch(format!(
                "{} get-sockname: {err}",
                options.daemon_exe.display()
            )),
        })?;
    budget.check(STAGE_DISCOVERY)?;

    if !output.success() {
        return Err(EstablishError::Launch(format!(
            "{} get-sockname exited with code {}",
            options.daemon_exe.display(),
            output.exit_code,
        )));
    }

    let reply: SocknameReply = serde_json::from_slice(&output.stdout)
        .map_err(|err| EstablishError::decode(STAGE_DISCOVERY, err))?;
    let sockname = reply.sockname.ok_or_else(|| {
        EstablishError::decode(STAGE_DISCOVERY, "reply carries no sockname field")
    })?;

    if let Some(version) = &reply.version {
        log::debug!("daemon at {} reports version {version}", sockname.display());
    }

    Ok(DaemonEndpoint {
        sockname,
        version: reply.version,
    })
}

async fn negotiate(
    client: &mut dyn DaemonClient,
    budget: &TimeBudget,
) -> Result<(String, BTreeSet<Capability>)> {
    let reply = run_query(client, &version_query(), budget, STAGE_NEGOTIATION).await?;
    let reply: VersionReply = serde_json::from_value(reply)
        .map_err(|err| EstablishError::decode(STAGE_NEGOTIATION, err))?;

    if let Some(error) = reply.error {
        return Err(EstablishError::CapabilityUnsupported(error));
    }

    let version = reply
        .version
        .ok_or_else(|| EstablishError::decode(STAGE_NEGOTIATION, "reply carries no version field"))?;

    let Some(reported) = reply.capabilities else {
        return Err(EstablishError::LegacyDaemon { version });
    };

    let capabilities = resolve_capabilities(&reported);
    log::debug!("daemon version {version} supports {capabilities:?}");
    Ok((version, capabilities))
}

/// Register every root, in caller order, stopping at the first failure.
///
/// Fail-closed: one root failing voids the whole session. The build must
/// never assume a subset of roots is watched while believing the whole set
/// is.
async fn register_roots(
    client: &mut dyn DaemonClient,
    roots: &[PathBuf],
    budget: &TimeBudget,
) -> Result<()> {
    for root in roots {
        let reply = run_query(client, &watch_project_query(root), budget, STAGE_REGISTRATION).await?;
        let reply: WatchProjectReply = serde_json::from_value(reply)
            .map_err(|err| EstablishError::decode(STAGE_REGISTRATION, err))?;

        if let Some(error) = reply.error {
            return Err(EstablishError::Registration {
                root: root.clone(),
                detail: error,
            });
        }
        let Some(watch) = reply.watch else {
            return Err(EstablishError::Registration {
                root: root.clone(),
                detail: "reply carries no watch field".to_string(),
            });
        };

        match reply.watcher {
            Some(watcher) => log::debug!("{watch} registered via {watcher}"),
            None => log::debug!("{watch} registered"),
        }
    }
    Ok(())
}

/// Fetch the initial clock token per registered root.
///
/// A reply without a `clock` field leaves the root out of the map; that is
/// recoverable later by the caller and not a failure. Budget exhaustion
/// here still aborts the whole attempt.
async fn fetch_clocks(
    client: &mut dyn DaemonClient,
    roots: &[PathBuf],
    capabilities: &BTreeSet<Capability>,
    budget: &TimeBudget,
) -> Result<BTreeMap<PathBuf, String>> {
    let mut clocks = BTreeMap::new();
    for root in roots {
        let sync_timeout = if capabilities.contains(&Capability::ClockSyncTimeout) {
            budget.remaining().map(|remaining| remaining.as_millis() as u64)
        } else {
            None
        };

        let reply = run_query(client, &clock_query(root, sync_timeout), budget, STAGE_CLOCK).await?;
        let reply: ClockReply =
            serde_json::from_value(reply).map_err(|err| EstablishError::decode(STAGE_CLOCK, err))?;

        match reply.clock {
            Some(token) => {
                clocks.insert(root.clone(), token);
            }
            None => log::debug!("no initial clock for {}", root.display()),
        }
    }
    Ok(clocks)
}

async fn run_query(
    client: &mut dyn DaemonClient,
    query: &Value,
    budget: &TimeBudget,
    stage: &'static str,
) -> Result<Value> {
    let reply = client
        .query(query)
        .await
        .map_err(|err| EstablishError::decode(stage, err))?;
    budget.check(stage)?;
    Ok(reply)
}
