use async_trait::async_trait;
use std::collections::BTreeMap;
use std::io;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

/// Outcome of one subprocess run: captured stdout plus the exit code.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub stdout: Vec<u8>,
    pub exit_code: i32,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Runs a command line with no stdin and yields its stdout.
///
/// `wait` bounds the whole run; exceeding it surfaces as
/// [`io::ErrorKind::TimedOut`]. Injected so establishment can be tested
/// without spawning anything; see
/// [`testing::FakeProcessRunner`](crate::testing::FakeProcessRunner).
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn run(
        &self,
        exe: &Path,
        args: &[String],
        env: &BTreeMap<String, String>,
        wait: Option<Duration>,
    ) -> io::Result<ProcessOutput>;
}

/// Production [`ProcessRunner`] backed by [`tokio::process`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemProcessRunner;

#[async_trait]
impl ProcessRunner for SystemProcessRunner {
    async fn run(
        &self,
        exe: &Path,
        args: &[String],
        env: &BTreeMap<String, String>,
        wait: Option<Duration>,
    ) -> io::Result<ProcessOutput> {
        let mut command = tokio::process::Command::new(exe);
        command
            .args(args)
            .envs(env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        let output = match wait {
            Some(limit) => tokio::time::timeout(limit, command.output())
                .await
                .map_err(|_| {
                    io::Error::new(
                        io::ErrorKind::TimedOut,
                        format!("{} did not finish within {limit:?}", exe.display()),
                    )
                })??,
            None => command.output().await?,
        };

        Ok(ProcessOutput {
            stdout: output.stdout,
            exit_code: output.status.code().unwrap_or(-1),
        })
    }
}
