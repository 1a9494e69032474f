use super::{RunError, Runner, ToolCommand, ToolOutput};
use crate::cancel::CancelToken;
use std::io::Read;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Runs tools as real child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl Runner for SystemRunner {
    fn run(&self, cmd: &ToolCommand, cancel: &CancelToken) -> Result<ToolOutput, RunError> {
        debug!("running cmd: {}", cmd.display());
        if cancel.is_cancelled() {
            return Err(RunError::Cancelled {
                program: cmd.program.clone(),
            });
        }

        let mut command = Command::new(&cmd.program);
        command
            .args(&cmd.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        // Keep the terminal's SIGINT away from tool processes; the
        // coordinator kills them itself through the cancel token.
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }

        let mut child = command.spawn().map_err(|source| RunError::Spawn {
            program: cmd.program.clone(),
            source,
        })?;

        wait_cancellable(&mut child, cmd, cancel)
    }
}

fn wait_cancellable(
    child: &mut Child,
    cmd: &ToolCommand,
    cancel: &CancelToken,
) -> Result<ToolOutput, RunError> {
    // Drain pipes while waiting so a chatty tool can't block on a full buffer.
    let stdout_thread = spawn_reader(child.stdout.take());
    let stderr_thread = spawn_reader(child.stderr.take());

    let io_err = |source| RunError::Io {
        program: cmd.program.clone(),
        source,
    };

    let start = Instant::now();
    loop {
        if let Some(status) = child.try_wait().map_err(io_err)? {
            return collect(status, stdout_thread, stderr_thread).map_err(io_err);
        }

        if cancel.is_cancelled() {
            debug!("killing {} (pid {}) after cancellation", cmd.program, child.id());
            kill_and_reap(child).map_err(io_err)?;
            let _ = collect_streams(stdout_thread, stderr_thread);
            return Err(RunError::Cancelled {
                program: cmd.program.clone(),
            });
        }

        if let Some(timeout) = cmd.timeout {
            if start.elapsed() > timeout {
                warn!("{} timed out after {:?}", cmd.program, timeout);
                kill_and_reap(child).map_err(io_err)?;
                let _ = collect_streams(stdout_thread, stderr_thread);
                return Err(RunError::TimedOut {
                    program: cmd.program.clone(),
                    timeout,
                });
            }
        }

        std::thread::sleep(POLL_INTERVAL);
    }
}

fn spawn_reader<R: Read + Send + 'static>(src: Option<R>) -> JoinHandle<std::io::Result<Vec<u8>>> {
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut r) = src {
            r.read_to_end(&mut buf)?;
        }
        Ok(buf)
    })
}

fn kill_and_reap(child: &mut Child) -> std::io::Result<()> {
    // The child may have exited between try_wait and kill.
    let _ = child.kill();
    child.wait().map(|_| ())
}

fn collect_streams(
    stdout_thread: JoinHandle<std::io::Result<Vec<u8>>>,
    stderr_thread: JoinHandle<std::io::Result<Vec<u8>>>,
) -> std::io::Result<(Vec<u8>, Vec<u8>)> {
    let stdout = stdout_thread
        .join()
        .map_err(|_| std::io::Error::other("stdout reader thread panicked"))??;
    let stderr = stderr_thread
        .join()
        .map_err(|_| std::io::Error::other("stderr reader thread panicked"))??;
    Ok((stdout, stderr))
}

fn collect(
    status: ExitStatus,
    stdout_thread: JoinHandle<std::io::Result<Vec<u8>>>,
    stderr_thread: JoinHandle<std::io::Result<Vec<u8>>>,
) -> std::io::Result<ToolOutput> {
    let (stdout, stderr) = collect_streams(stdout_thread, stderr_thread)?;
    Ok(ToolOutput {
        success: status.success(),
        code: status.code(),
        stdout,
        stderr,
    })
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn captures_exit_status_and_output() {
        let cmd = ToolCommand::new("sh").args(["-c", "echo out; echo err >&2; exit 3"]);
        let out = SystemRunner.run(&cmd, &CancelToken::new()).unwrap();
        assert!(!out.success);
        assert_eq!(out.code, Some(3));
        assert_eq!(out.stdout, b"out\n");
        assert_eq!(out.stderr, b"err\n");
    }

    #[test]
    fn missing_binary_is_spawn_error() {
        let cmd = ToolCommand::new("/nonexistent/ocr-prep-tool");
        let err = SystemRunner.run(&cmd, &CancelToken::new()).unwrap_err();
        assert!(matches!(err, RunError::Spawn { .. }));
    }

    #[test]
    fn timeout_kills_child() {
        let cmd = ToolCommand::new("sleep")
            .arg("5")
            .timeout(Some(Duration::from_millis(100)));
        let started = Instant::now();
        let err = SystemRunner.run(&cmd, &CancelToken::new()).unwrap_err();
        assert!(matches!(err, RunError::TimedOut { .. }));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn cancellation_kills_child() {
        let cancel = CancelToken::new();
        let trip = cancel.clone();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(100));
            trip.cancel();
        });
        let started = Instant::now();
        let err = SystemRunner
            .run(&ToolCommand::new("sleep").arg("5"), &cancel)
            .unwrap_err();
        assert!(matches!(err, RunError::Cancelled { .. }));
        assert!(started.elapsed() < Duration::from_secs(4));
    }
}
