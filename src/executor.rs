//! Executor - run one black-box executable against one instance
//!
//! stdout and stderr share a single OS pipe, so the capture interleaves both
//! streams in the order the child wrote them. A blocking pump thread moves
//! pipe bytes into a channel; the async side owns the deadline.
//!
//! On unix each child leads its own process group. A timeout or a dropped
//! round kills the whole group, so helpers the executable forked (which
//! inherit the output pipe) die with it.

use std::io::{ErrorKind, Read};
use std::process::Stdio;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::process::{ChildStdin, Command};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::core_types::Role;
use crate::error::HarnessError;

/// How long to keep collecting in-flight output after a timed-out child was killed
const KILL_GRACE: Duration = Duration::from_millis(200);
const PUMP_CHUNK: usize = 8192;

/// Program to run. Executables normally take no arguments; `args` exists for
/// wrappers such as `sh -c`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutableSpec {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl ExecutableSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitState {
    /// Exit code; `None` when terminated by a signal
    Exited(Option<i32>),
    /// Killed after the round deadline
    TimedOut,
}

/// Captured output of one run. Lives for one comparison.
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub role: Role,
    pub program: String,
    /// Merged stdout + stderr, raw bytes
    pub output: Vec<u8>,
    pub exit: ExitState,
    pub elapsed: Duration,
}

impl ExecutionResult {
    pub fn timed_out(&self) -> bool {
        self.exit == ExitState::TimedOut
    }
}

/// Spawn `spec`, feed it `input`, close stdin, and drain the merged output
/// until the child exits or `timeout` elapses.
///
/// Only a failure to start the process is an error.
pub async fn run_executable(
    role: Role,
    spec: &ExecutableSpec,
    input: &[u8],
    timeout: Duration,
) -> Result<ExecutionResult, HarnessError> {
    let started = Instant::now();
    let (reader, writer) = std::io::pipe()?;

    // The command holds our copies of the write end; it must be dropped right
    // after spawn or the reader never sees EOF.
    let mut child = {
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .stdin(Stdio::piped())
            .stdout(writer.try_clone()?)
            .stderr(writer)
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);
        cmd.spawn().map_err(|source| HarnessError::Launch {
            role,
            program: spec.program.clone(),
            source,
        })?
    };
    debug!(%role, program = %spec.program, pid = ?child.id(), "spawned");
    let mut group = GroupKill::new(child.id());

    let (tx, mut rx) = mpsc::unbounded_channel::<Vec<u8>>();
    std::thread::Builder::new()
        .name(format!("{role}-pump"))
        .spawn(move || pump(reader, tx))?;

    let stdin = child.stdin.take();
    let mut output = Vec::new();

    let drained = tokio::time::timeout(timeout, async {
        tokio::join!(feed(role, stdin, input), collect(&mut rx, &mut output));
        child.wait().await
    })
    .await;

    let exit = match drained {
        Ok(status) => {
            // leader reaped, so its pgid may be reused: leave the group alone
            group.disarm();
            ExitState::Exited(status?.code())
        }
        Err(_) => {
            warn!(%role, program = %spec.program, ?timeout, "executable timed out, killing");
            group.kill_now();
            if let Err(e) = child.kill().await {
                warn!(%role, "kill failed: {}", e);
            }
            let _ = tokio::time::timeout(KILL_GRACE, collect(&mut rx, &mut output)).await;
            ExitState::TimedOut
        }
    };

    let elapsed = started.elapsed();
    debug!(%role, bytes = output.len(), ?exit, ?elapsed, "drained");

    Ok(ExecutionResult {
        role,
        program: spec.program.clone(),
        output,
        exit,
        elapsed,
    })
}

/// Kills the child's process group when dropped, unless disarmed first.
///
/// `kill_on_drop` only reaches the direct child; grandchildren keep the
/// output pipe open and outlive the round without this.
struct GroupKill {
    pgid: Option<u32>,
}

impl GroupKill {
    fn new(pid: Option<u32>) -> Self {
        Self { pgid: pid }
    }

    fn kill_now(&mut self) {
        if let Some(pgid) = self.pgid.take() {
            kill_group(pgid);
        }
    }

    fn disarm(&mut self) {
        self.pgid = None;
    }
}

impl Drop for GroupKill {
    fn drop(&mut self) {
        self.kill_now();
    }
}

#[cfg(unix)]
fn kill_group(pgid: u32) {
    let Ok(pgid) = libc::pid_t::try_from(pgid) else {
        return;
    };
    // SAFETY: kill(2) takes no pointers; a negative pid addresses the group
    let rc = unsafe { libc::kill(-pgid, libc::SIGKILL) };
    if rc != 0 {
        debug!(pgid, "process group kill: {}", std::io::Error::last_os_error());
    }
}

#[cfg(not(unix))]
fn kill_group(_pgid: u32) {}

/// Write the whole instance, then close stdin to signal end of input.
async fn feed(role: Role, stdin: Option<ChildStdin>, input: &[u8]) {
    let Some(mut stdin) = stdin else {
        return;
    };
    match stdin.write_all(input).await {
        Ok(()) => {}
        // the child exited or closed stdin without reading everything
        Err(e) if e.kind() == ErrorKind::BrokenPipe => {
            debug!(%role, "stdin closed early by child");
        }
        Err(e) => warn!(%role, "failed writing stdin: {}", e),
    }
    drop(stdin);
}

async fn collect(rx: &mut mpsc::UnboundedReceiver<Vec<u8>>, output: &mut Vec<u8>) {
    while let Some(chunk) = rx.recv().await {
        output.extend_from_slice(&chunk);
    }
}

fn pump(mut reader: std::io::PipeReader, tx: mpsc::UnboundedSender<Vec<u8>>) {
    let mut buf = [0u8; PUMP_CHUNK];
    loop {
        match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                if tx.send(buf[..n].to_vec()).is_err() {
                    break;
                }
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                warn!("output pipe read failed: {}", e);
                break;
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> ExecutableSpec {
        ExecutableSpec::with_args("sh", ["-c", script])
    }

    #[tokio::test]
    async fn test_echoes_stdin() {
        let res = run_executable(Role::Reference, &sh("cat"), b"1\n3\n", Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(res.output, b"1\n3\n");
        assert_eq!(res.exit, ExitState::Exited(Some(0)));
        assert!(!res.timed_out());
    }

    #[tokio::test]
    async fn test_merges_stderr_in_order() {
        let spec = sh("echo out1; echo err1 1>&2; echo out2");
        let res = run_executable(Role::Candidate, &spec, b"", Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(res.output, b"out1\nerr1\nout2\n");
    }

    #[tokio::test]
    async fn test_records_exit_code() {
        let res = run_executable(Role::Candidate, &sh("exit 3"), b"", Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(res.exit, ExitState::Exited(Some(3)));
    }

    #[tokio::test]
    async fn test_ignores_unread_stdin() {
        let big = vec![b'7'; 1 << 20];
        let res = run_executable(Role::Reference, &sh("echo done"), &big, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(res.output, b"done\n");
    }

    #[tokio::test]
    async fn test_timeout_keeps_partial_output() {
        let spec = sh("echo partial; exec sleep 30");
        let res = run_executable(Role::Candidate, &spec, b"", Duration::from_millis(300))
            .await
            .unwrap();
        assert!(res.timed_out());
        assert_eq!(res.output, b"partial\n");
        assert!(res.elapsed < Duration::from_secs(10));
    }

    /// True once `pid` is gone or a zombie.
    #[cfg(target_os = "linux")]
    fn is_dead(pid: u32) -> bool {
        match std::fs::read_to_string(format!("/proc/{pid}/stat")) {
            // state is the first field after the parenthesised command name
            Ok(stat) => stat
                .rsplit_once(')')
                .is_some_and(|(_, rest)| rest.trim_start().starts_with(|c: char| c == 'Z' || c == 'X')),
            Err(_) => true,
        }
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_timeout_kills_forked_helpers() {
        // the background sleep inherits the output pipe and outlives `sh`
        let spec = sh("sleep 30 & echo $!; wait");
        let res = run_executable(Role::Candidate, &spec, b"", Duration::from_millis(300))
            .await
            .unwrap();
        assert!(res.timed_out());
        assert!(res.elapsed < Duration::from_secs(5));

        let helper: u32 = String::from_utf8(res.output).unwrap().trim().parse().unwrap();
        let deadline = Instant::now() + Duration::from_secs(5);
        while !is_dead(helper) && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(is_dead(helper), "forked helper {helper} survived the timeout");
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_dropped_round_kills_forked_helpers() {
        let dir = tempfile::tempdir().unwrap();
        let pid_file = dir.path().join("helper.pid");
        let spec = sh(&format!(
            "sleep 30 & echo $! > {0}.tmp && mv {0}.tmp {0}; wait",
            pid_file.display()
        ));

        let run = run_executable(Role::Reference, &spec, b"", Duration::from_secs(60));
        tokio::select! {
            _ = run => panic!("round finished before it was dropped"),
            _ = async {
                while !pid_file.exists() {
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
            } => {}
        }

        let helper: u32 = std::fs::read_to_string(&pid_file).unwrap().trim().parse().unwrap();
        let deadline = Instant::now() + Duration::from_secs(5);
        while !is_dead(helper) && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(is_dead(helper), "forked helper {helper} survived the dropped round");
    }

    #[tokio::test]
    async fn test_missing_program_is_launch_failure() {
        let spec = ExecutableSpec::new("/nonexistent/matrix_driver");
        let err = run_executable(Role::Reference, &spec, b"", Duration::from_secs(1))
            .await
            .unwrap_err();
        match err {
            HarnessError::Launch { role, program, .. } => {
                assert_eq!(role, Role::Reference);
                assert_eq!(program, "/nonexistent/matrix_driver");
            }
            other => panic!("expected launch failure, got {other:?}"),
        }
    }
}
