use std::ffi::OsString;
use std::path::Path;
use std::process::{Child, Command, ExitStatus};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use tracing::debug;

static INTERRUPTED: AtomicBool = AtomicBool::new(false);

const POLL_INTERVAL: Duration = Duration::from_millis(50);
const INTERRUPT_GRACE: Duration = Duration::from_secs(2);

/// Runs `binary` with inherited stdio and returns the exit code the wrapper should use.
///
/// Ctrl-C ends the wrapper with status 0. The child sees the same interrupt through the
/// shared process group and gets a short grace period before it is killed and reaped.
pub fn run(binary: &Path, args: &[OsString]) -> i32 {
    if let Err(err) = ctrlc::set_handler(|| INTERRUPTED.store(true, Ordering::SeqCst)) {
        debug!(error = %err, "interrupt handler not installed");
    }

    debug!(binary = %binary.display(), args = args.len(), "launching");
    match Command::new(binary).args(args).spawn() {
        Ok(child) => supervise(child, &INTERRUPTED, INTERRUPT_GRACE),
        Err(err) => {
            eprintln!("error running {}: {err}", binary.display());
            1
        }
    }
}

/// Waits for `child`, killing it once `interrupted` has been set for longer than `grace`.
pub(crate) fn supervise(mut child: Child, interrupted: &AtomicBool, grace: Duration) -> i32 {
    let mut interrupted_at: Option<Instant> = None;
    loop {
        if interrupted_at.is_none() && interrupted.load(Ordering::SeqCst) {
            interrupted_at = Some(Instant::now());
        }
        match child.try_wait() {
            Ok(Some(status)) if interrupted_at.is_some() => {
                debug!(?status, "child exited after interrupt");
                return 0;
            }
            Ok(Some(status)) => return exit_code(status),
            Ok(None) => {}
            Err(err) => {
                eprintln!("error waiting for child process: {err}");
                return 1;
            }
        }

        if let Some(since) = interrupted_at {
            if since.elapsed() >= grace {
                debug!(pid = child.id(), "killing child after interrupt");
                if let Err(err) = child.kill() {
                    debug!(error = %err, "failed to kill child");
                }
                if let Err(err) = child.wait() {
                    debug!(error = %err, "failed to reap child");
                }
                return 0;
            }
        }
        thread::sleep(POLL_INTERVAL);
    }
}

pub fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;

        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    1
}
