//! Subprocess execution with an optional wall-clock timeout.

use claude_agent::process::run_captured;
use std::path::Path;
use std::process::Command;
use std::time::Duration;

/// Cap on captured output; the tail is kept.
const MAX_OUTPUT: usize = 10 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellOutcome {
    pub success: bool,
    pub timed_out: bool,
    pub output: String,
}

/// Execute `command` through `sh -c` with an optional timeout.
///
/// `None` waits indefinitely. On timeout the shell and everything it
/// started are killed.
pub fn run_shell(command: &str, cwd: &Path, timeout: Option<Duration>) -> ShellOutcome {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command).current_dir(cwd);
    match run_captured(&mut cmd, timeout) {
        Ok(Some(captured)) => ShellOutcome {
            success: captured.status.success(),
            timed_out: false,
            output: combine_output(&captured.stdout, &captured.stderr),
        },
        Ok(None) => ShellOutcome {
            success: false,
            timed_out: true,
            output: format!(
                "timed out after {}ms",
                timeout.unwrap_or_default().as_millis()
            ),
        },
        Err(e) => ShellOutcome {
            success: false,
            timed_out: false,
            output: format!("failed to run: {e}"),
        },
    }
}

/// Combine stdout/stderr and keep at most the last `MAX_OUTPUT` bytes.
fn combine_output(stdout: &str, stderr: &str) -> String {
    let output = if stderr.is_empty() {
        stdout.to_string()
    } else if stdout.is_empty() {
        stderr.to_string()
    } else {
        format!("{stdout}\n{stderr}")
    };
    tail(output.trim(), MAX_OUTPUT).to_string()
}

/// Last `max` bytes of `s`, moved forward to a char boundary.
pub fn tail(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut start = s.len() - max;
    while !s.is_char_boundary(start) {
        start += 1;
    }
    &s[start..]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn true_succeeds() {
        let out = run_shell("true", Path::new("/tmp"), None);
        assert!(out.success);
        assert!(!out.timed_out);
    }

    #[test]
    fn false_fails() {
        let out = run_shell("false", Path::new("/tmp"), Some(Duration::from_secs(10)));
        assert!(!out.success);
    }

    #[test]
    fn captures_stdout_and_stderr() {
        let out = run_shell("echo hello", Path::new("/tmp"), None);
        assert_eq!(out.output, "hello");
        let out = run_shell("echo oops >&2 && false", Path::new("/tmp"), None);
        assert!(!out.success);
        assert_eq!(out.output, "oops");
    }

    #[test]
    fn timeout_kills() {
        let out = run_shell("sleep 60", Path::new("/tmp"), Some(Duration::from_millis(150)));
        assert!(!out.success);
        assert!(out.timed_out);
        assert!(out.output.contains("timed out"));
    }

    #[test]
    fn timeout_also_stops_background_jobs() {
        let dir = tempfile::TempDir::new().unwrap();
        let out = run_shell(
            "(sleep 1; touch late) & sleep 60",
            dir.path(),
            Some(Duration::from_millis(150)),
        );
        assert!(out.timed_out);
        std::thread::sleep(Duration::from_millis(1500));
        assert!(!dir.path().join("late").exists());
    }

    #[test]
    fn tail_respects_char_boundaries() {
        let s = "ééé";
        assert_eq!(tail(s, 3), "é");
        assert_eq!(tail("abc", 10), "abc");
    }
}
