use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::warn;

/// Timer that kills a CGI process group if it is still running when the
/// deadline passes.
///
/// The child must have been spawned as the leader of its own process group
/// so the whole tree goes down with it. Firing alone does not mean the
/// script timed out; the executor checks how the leader actually died.
#[derive(Debug)]
pub struct Watchdog {
    cancel: mpsc::Sender<()>,
    handle: JoinHandle<bool>,
}

impl Watchdog {
    pub fn arm(pid: u32, timeout: Duration) -> Self {
        let (cancel, cancelled) = mpsc::channel::<()>();

        let handle = thread::spawn(move || match cancelled.recv_timeout(timeout) {
            Err(RecvTimeoutError::Timeout) => {
                warn!(pid, timeout_ms = timeout.as_millis() as u64, "CGI script timed out, killing process group");
                kill_process_group(pid);
                true
            }
            // Cancelled, or the owner went away
            Ok(()) | Err(RecvTimeoutError::Disconnected) => false,
        });

        Watchdog { cancel, handle }
    }

    /// Stop the timer. Returns `true` if it had already fired.
    pub fn disarm(self) -> bool {
        let _ = self.cancel.send(());
        self.handle.join().unwrap_or(false)
    }
}

pub(crate) fn kill_process_group(pid: u32) {
    let Ok(pgid) = libc::pid_t::try_from(pid) else {
        return;
    };
    // SAFETY: killpg only sends a signal; an already-empty group yields ESRCH.
    let rc = unsafe { libc::killpg(pgid, libc::SIGKILL) };
    if rc != 0 {
        let err = std::io::Error::last_os_error();
        if err.raw_os_error() != Some(libc::ESRCH) {
            warn!(pid, error = %err, "failed to kill CGI process group");
        }
    }
}
