use std::io::Read;
use std::process::{Command, ExitStatus, Stdio};
use std::sync::mpsc;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::types::QueryOptions;
use crate::{ClaudeAgentError, Result};

// ─── Captured ─────────────────────────────────────────────────────────────

/// Output of a subprocess that exited on its own.
#[derive(Debug)]
pub struct Captured {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

/// Spawn `cmd` with piped stdout/stderr and wait for it.
///
/// Both streams are drained on their own threads and a waiter thread reports
/// exit through a channel, so the timeout needs no polling. On unix the child
/// leads its own process group; on timeout the whole group is killed and
/// `Ok(None)` returned.
pub fn run_captured(
    cmd: &mut Command,
    timeout: Option<Duration>,
) -> std::io::Result<Option<Captured>> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    #[cfg(unix)]
    std::os::unix::process::CommandExt::process_group(cmd, 0);

    let mut child = cmd.spawn()?;
    let pid = child.id();
    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let status = match timeout {
        None => child.wait()?,
        Some(limit) => {
            let (tx, rx) = mpsc::channel();
            std::thread::spawn(move || {
                let _ = tx.send(child.wait());
            });
            match rx.recv_timeout(limit) {
                Ok(result) => result?,
                Err(_) => {
                    kill(pid);
                    return Ok(None);
                }
            }
        }
    };

    Ok(Some(Captured {
        status,
        stdout: stdout.join().unwrap_or_default(),
        stderr: stderr.join().unwrap_or_default(),
    }))
}

// ─── claude ───────────────────────────────────────────────────────────────

/// Run the configured claude command to completion.
///
/// `CLAUDECODE` is removed from the environment so this works both from a
/// terminal and from inside a running Claude session.
pub(crate) fn run(prompt: &str, opts: &QueryOptions) -> Result<Captured> {
    let program = opts
        .command
        .first()
        .ok_or_else(|| ClaudeAgentError::NotFound(String::new()))?;
    let resolved =
        which::which(program).map_err(|_| ClaudeAgentError::NotFound(program.clone()))?;

    let mut cmd = Command::new(resolved);
    cmd.args(opts.args(prompt)).env_remove("CLAUDECODE");
    for (k, v) in &opts.env {
        cmd.env(k, v);
    }
    if let Some(cwd) = &opts.cwd {
        cmd.current_dir(cwd);
    }

    match run_captured(&mut cmd, opts.timeout)? {
        Some(captured) => Ok(captured),
        None => {
            let limit = opts.timeout.unwrap_or_default();
            tracing::warn!(secs = limit.as_secs(), "claude timed out; killed");
            Err(ClaudeAgentError::Timeout(limit))
        }
    }
}

fn drain<R: Read + Send + 'static>(handle: Option<R>) -> JoinHandle<String> {
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut r) = handle {
            let _ = r.read_to_end(&mut buf);
        }
        String::from_utf8_lossy(&buf).into_owned()
    })
}

/// SIGKILL the child's process group. Best-effort.
#[cfg(unix)]
fn kill(pid: u32) {
    let _ = Command::new("kill")
        .args(["-s", "KILL", "--", &format!("-{pid}")])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();
}

/// SIGKILL by pid. Best-effort.
#[cfg(not(unix))]
fn kill(pid: u32) {
    let _ = Command::new("kill")
        .arg("-9")
        .arg(pid.to_string())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();
}
