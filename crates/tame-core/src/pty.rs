//! PTY-backed child process lifecycle (spec §4.C).
//!
//! Owns the PTY pair and the spawned child's process group. All signaling
//! (pause/resume/terminate/resize) targets the process group, not the lone
//! child pid, so shells that fork their own children still get suspended or
//! killed together.

use std::io::{Read, Write};
use std::time::{Duration, Instant};

use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use portable_pty::{native_pty_system, CommandBuilder, PtySize};

use crate::error::PtyError;

/// Configuration for spawning a PTY-backed child.
#[derive(Clone, Debug)]
pub struct PtySpawnConfig {
    /// Command to execute.
    pub command: String,
    /// Command arguments.
    pub args: Vec<String>,
    /// Working directory, if not the current one.
    pub cwd: Option<String>,
    /// Extra environment variables to set on the child.
    pub env: Vec<(String, String)>,
    /// Initial terminal size.
    pub rows: u16,
    /// Initial terminal size.
    pub cols: u16,
}

/// A spawned child process driven through a PTY.
pub struct PtyChild {
    master: Box<dyn portable_pty::MasterPty + Send>,
    writer: Box<dyn Write + Send>,
    reader: Box<dyn Read + Send>,
    child: Box<dyn portable_pty::Child + Send + Sync>,
    pgid: Option<Pid>,
    spawned_at: Instant,
}

impl PtyChild {
    /// Open a PTY pair and spawn `config.command` attached to the slave end.
    ///
    /// # Errors
    /// Returns [`PtyError`] if the PTY cannot be opened or the command fails
    /// to spawn.
    pub fn spawn(config: &PtySpawnConfig) -> Result<Self, PtyError> {
        let system = native_pty_system();
        let pair = system
            .openpty(PtySize {
                rows: config.rows,
                cols: config.cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|err| PtyError::OpenFailed(std::io::Error::other(err)))?;

        let mut cmd = CommandBuilder::new(&config.command);
        cmd.args(&config.args);
        if let Some(cwd) = &config.cwd {
            cmd.cwd(cwd);
        }
        for (key, value) in &config.env {
            cmd.env(key, value);
        }

        let child = pair
            .slave
            .spawn_command(cmd)
            .map_err(|err| PtyError::SpawnFailed(std::io::Error::other(err)))?;

        let reader = pair
            .master
            .try_clone_reader()
            .map_err(|err| PtyError::OpenFailed(std::io::Error::other(err)))?;
        let writer = pair
            .master
            .take_writer()
            .map_err(|err| PtyError::OpenFailed(std::io::Error::other(err)))?;

        // Process IDs are always positive and fit in i32.
        #[allow(clippy::cast_possible_wrap)]
        let pgid = child.process_id().map(|pid| Pid::from_raw(pid as i32));

        drop(pair.slave);

        Ok(Self {
            master: pair.master,
            writer,
            reader,
            child,
            pgid,
            spawned_at: Instant::now(),
        })
    }

    /// Write raw bytes to the PTY master (keystrokes or pasted text).
    ///
    /// # Errors
    /// Returns [`PtyError::WriteFailed`] if the write or flush fails.
    pub fn write(&mut self, bytes: &[u8]) -> Result<(), PtyError> {
        self.writer.write_all(bytes).map_err(PtyError::WriteFailed)?;
        self.writer.flush().map_err(PtyError::WriteFailed)
    }

    /// Resize the PTY (`TIOCSWINSZ`), which the kernel turns into `SIGWINCH`
    /// for the foreground process group automatically.
    ///
    /// # Errors
    /// Returns [`PtyError::ResizeFailed`] if the ioctl fails.
    pub fn resize(&mut self, rows: u16, cols: u16) -> Result<(), PtyError> {
        self.master
            .resize(PtySize {
                rows,
                cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|err| PtyError::ResizeFailed(std::io::Error::other(err)))
    }

    /// Non-blocking read of whatever output is currently available. Returns
    /// an empty vector (not an error) when nothing is ready.
    ///
    /// # Errors
    /// Returns [`PtyError::WriteFailed`] is never returned here; I/O errors
    /// other than would-block surface through the underlying `io::Error`
    /// wrapped the same way write errors are, since both are PTY master I/O.
    pub fn try_read(&mut self) -> Result<Vec<u8>, PtyError> {
        let mut buffer = vec![0u8; 8192];
        match self.reader.read(&mut buffer) {
            Ok(0) => Ok(Vec::new()),
            Ok(n) => {
                buffer.truncate(n);
                Ok(buffer)
            }
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => Ok(Vec::new()),
            Err(err) => Err(PtyError::WriteFailed(err)),
        }
    }

    /// Suspend the child's process group with `SIGSTOP`.
    ///
    /// # Errors
    /// Returns [`PtyError::SignalFailed`] if the kernel rejects the signal.
    pub fn pause(&self) -> Result<(), PtyError> {
        self.signal_group(Signal::SIGSTOP)
    }

    /// Resume a paused process group with `SIGCONT`.
    ///
    /// # Errors
    /// Returns [`PtyError::SignalFailed`] if the kernel rejects the signal.
    pub fn resume(&self) -> Result<(), PtyError> {
        self.signal_group(Signal::SIGCONT)
    }

    /// Send `SIGTERM`, then escalate to `SIGKILL` if the process is still
    /// alive after `grace`.
    ///
    /// # Errors
    /// Returns [`PtyError::SignalFailed`] if either signal send fails for a
    /// reason other than the process already being gone.
    pub fn terminate(&mut self, grace: Duration) -> Result<(), PtyError> {
        self.signal_group(Signal::SIGTERM)?;
        if self.wait_for_exit(grace).is_some() {
            return Ok(());
        }
        self.signal_group(Signal::SIGKILL)
    }

    /// Poll (non-blocking) whether the child has exited, up to `timeout`.
    #[must_use]
    pub fn wait_for_exit(&mut self, timeout: Duration) -> Option<portable_pty::ExitStatus> {
        let deadline = Instant::now() + timeout;
        loop {
            match self.child.try_wait() {
                Ok(Some(status)) => return Some(status),
                Ok(None) => {
                    if Instant::now() >= deadline {
                        return None;
                    }
                    std::thread::sleep(Duration::from_millis(10));
                }
                Err(err) => {
                    tracing::warn!(%err, "failed polling child exit status");
                    return None;
                }
            }
        }
    }

    /// Time elapsed since the process was spawned.
    #[must_use]
    pub fn uptime(&self) -> Duration {
        self.spawned_at.elapsed()
    }

    /// The child's process id, if the platform exposes one.
    #[must_use]
    pub fn pid(&self) -> Option<u32> {
        self.child.process_id()
    }

    fn signal_group(&self, signal: Signal) -> Result<(), PtyError> {
        let Some(pgid) = self.pgid else {
            return Ok(());
        };
        match killpg(pgid, signal) {
            Ok(()) | Err(nix::errno::Errno::ESRCH) => Ok(()),
            Err(err) => Err(PtyError::SignalFailed(err)),
        }
    }
}

impl Drop for PtyChild {
    fn drop(&mut self) {
        let _ = self.writer.flush();
        if let Some(pgid) = self.pgid {
            let _ = killpg(pgid, Signal::SIGTERM);
            let deadline = Instant::now() + Duration::from_millis(100);
            while Instant::now() < deadline {
                if self.child.try_wait().ok().flatten().is_some() {
                    return;
                }
                std::thread::sleep(Duration::from_millis(5));
            }
            let _ = killpg(pgid, Signal::SIGKILL);
        }
    }
}
