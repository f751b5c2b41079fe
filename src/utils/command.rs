//! Child process execution primitives with output capture and timeouts.

use std::io::Read;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use serde::Serialize;

/// Captured output from command execution.
/// Reusable primitive for any command that executes external processes.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CapturedOutput {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub stdout: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub stderr: String,
}

impl CapturedOutput {
    pub fn new(stdout: String, stderr: String) -> Self {
        Self { stdout, stderr }
    }

    pub fn is_empty(&self) -> bool {
        self.stdout.is_empty() && self.stderr.is_empty()
    }

    /// Useful output for error messages: stderr, or stdout when stderr is empty.
    pub fn error_text(&self) -> &str {
        if self.stderr.trim().is_empty() {
            self.stdout.trim()
        } else {
            self.stderr.trim()
        }
    }
}

/// Result of running a child process under a wall-clock deadline.
#[derive(Debug)]
pub struct TimedOutput {
    pub output: CapturedOutput,
    pub exit_code: i32,
    pub success: bool,
    pub timed_out: bool,
}

/// Kills the child's process group when dropped unless the run completed.
/// Covers cancellation paths (panic/early return) so no toolchain process
/// outlives the pipeline.
struct ChildGuard {
    child: Child,
    done: bool,
}

impl ChildGuard {
    fn kill_group(&mut self) {
        #[cfg(unix)]
        unsafe {
            // The child was spawned as its own process group leader, so the
            // group id equals its pid and the kill takes the whole tree down.
            libc::killpg(self.child.id() as libc::pid_t, libc::SIGKILL);
        }
        #[cfg(not(unix))]
        {
            let _ = self.child.kill();
        }
        let _ = self.child.wait();
    }
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        if !self.done {
            self.kill_group();
        }
    }
}

fn drain<R: Read + Send + 'static>(reader: Option<R>) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut reader) = reader {
            let _ = reader.read_to_end(&mut buf);
        }
        String::from_utf8_lossy(&buf).to_string()
    })
}

/// Run a prepared command with a wall-clock timeout.
///
/// The child is placed in its own process group so that a timeout kill
/// terminates the whole toolchain tree, not just the immediate child.
/// stdout/stderr are drained on separate threads while polling, so a
/// chatty child cannot deadlock on a full pipe.
///
/// Returns `Err` only when spawning fails (e.g. the program does not
/// exist); a timeout or non-zero exit is reported in the `TimedOutput`.
pub fn run_with_timeout(mut cmd: Command, timeout: Duration) -> std::io::Result<TimedOutput> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }

    let mut child = cmd.spawn()?;
    let stdout_handle = drain(child.stdout.take());
    let stderr_handle = drain(child.stderr.take());

    let mut guard = ChildGuard { child, done: false };
    let deadline = Instant::now() + timeout;

    let status = loop {
        match guard.child.try_wait()? {
            Some(status) => break Some(status),
            None if Instant::now() >= deadline => {
                guard.kill_group();
                break None;
            }
            None => thread::sleep(Duration::from_millis(50)),
        }
    };
    guard.done = true;

    let stdout = stdout_handle.join().unwrap_or_default();
    let stderr = stderr_handle.join().unwrap_or_default();
    let output = CapturedOutput::new(stdout, stderr);

    Ok(match status {
        Some(status) => TimedOutput {
            output,
            exit_code: status.code().unwrap_or(-1),
            success: status.success(),
            timed_out: false,
        },
        None => TimedOutput {
            output,
            exit_code: -1,
            success: false,
            timed_out: true,
        },
    })
}

/// Build a `Command` that runs `command` through the platform shell.
///
/// Build commands are shell strings (npm scripts, cargo invocations with
/// flags, chained steps), so they go through `sh -c` rather than direct
/// argv execution.
pub fn shell_command(command: &str, current_dir: Option<&std::path::Path>) -> Command {
    #[cfg(windows)]
    let mut cmd = {
        let mut cmd = Command::new("cmd");
        cmd.args(["/C", command]);
        cmd
    };

    #[cfg(not(windows))]
    let mut cmd = {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", command]);
        cmd
    };

    if let Some(dir) = current_dir {
        cmd.current_dir(dir);
    }

    cmd
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_with_timeout_captures_stdout() {
        let cmd = shell_command("echo hello", None);
        let result = run_with_timeout(cmd, Duration::from_secs(5)).unwrap();
        assert!(result.success);
        assert!(!result.timed_out);
        assert_eq!(result.output.stdout.trim(), "hello");
    }

    #[test]
    fn run_with_timeout_reports_exit_code() {
        let cmd = shell_command("exit 3", None);
        let result = run_with_timeout(cmd, Duration::from_secs(5)).unwrap();
        assert!(!result.success);
        assert!(!result.timed_out);
        assert_eq!(result.exit_code, 3);
    }

    #[test]
    fn run_with_timeout_kills_slow_process() {
        let start = Instant::now();
        let cmd = shell_command("sleep 30", None);
        let result = run_with_timeout(cmd, Duration::from_millis(300)).unwrap();
        assert!(result.timed_out);
        assert!(!result.success);
        assert!(start.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn run_with_timeout_spawn_failure_is_err() {
        let cmd = Command::new("roadie-test-no-such-program-xyz");
        assert!(run_with_timeout(cmd, Duration::from_secs(1)).is_err());
    }

    #[test]
    fn error_text_prefers_stderr() {
        let captured = CapturedOutput::new("out".to_string(), "err".to_string());
        assert_eq!(captured.error_text(), "err");
    }

    #[test]
    fn error_text_falls_back_to_stdout() {
        let captured = CapturedOutput::new("out".to_string(), String::new());
        assert_eq!(captured.error_text(), "out");
    }
}
