/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::{
    io::{self, Read, Write},
    mem,
    path::{Path, PathBuf},
    process::{Child, ChildStdin, ChildStdout, Command as Process, Stdio},
    sync::mpsc::{channel, Receiver, RecvError, Sender, TryRecvError},
    thread::{self, JoinHandle},
};

use log::{debug, info, warn};
use thiserror::Error;

use crate::{Command, Readiness};

/// Capacity of the buffer used for a single reply, matching the engine's own line buffer.
pub const DEFAULT_REPLY_CAPACITY: usize = 256;

/// Argument that switches the engine into its line-protocol mode.
pub const DEFAULT_PROTOCOL_FLAG: &str = "-d%";

/// Size of each chunk the reader thread pulls off the engine's stdout.
const READ_CHUNK: usize = 4096;

/// Errors raised while talking to the engine process.
///
/// Every variant is fatal to a session; none of them leave a recoverable channel behind.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Failed to spawn engine {path:?}: {source}")]
    Spawn {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Engine {path:?} was spawned without a piped {stream}")]
    MissingPipe { path: PathBuf, stream: &'static str },

    #[error("Failed to write to engine {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to read from engine {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to poll engine {path:?}: {source}")]
    Poll {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Engine {0:?} closed its output")]
    Closed(PathBuf),

    #[error("Failed to terminate engine {path:?}: {source}")]
    Kill {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Commands must be a single line. Got {0:?}")]
    InvalidCommand(String),

    #[error("Reply capacity must leave room for at least one byte. Got {0}")]
    InvalidCapacity(usize),
}

/// The request/response transport to an engine.
///
/// [`EngineProcess`] implements this over a child process's pipes; anything else
/// that speaks the same line protocol can stand in for it.
pub trait EngineChannel {
    /// Identity of the engine, used only in diagnostics.
    fn name(&self) -> &Path;

    /// Writes `line` followed by a newline to the engine. Does not read a reply.
    fn send_line(&mut self, line: &str) -> Result<(), EngineError>;

    /// Performs exactly one blocking read of at most `capacity - 1` bytes of the engine's output.
    fn read_available(&mut self, capacity: usize) -> Result<String, EngineError>;

    /// Checks, without blocking, whether the engine has output waiting to be read.
    fn poll_ready(&mut self) -> Result<Readiness, EngineError>;

    /// Sends a single protocol [`Command`].
    fn send(&mut self, command: &Command) -> Result<(), EngineError> {
        self.send_line(&command.to_string())
    }

    /// Sends `command` and performs one read for its reply.
    fn ask(&mut self, capacity: usize, command: &Command) -> Result<String, EngineError> {
        self.send(command)?;
        self.read_available(capacity)
    }
}

/// How to launch the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Path (or name on `PATH`) of the engine executable.
    pub executable: PathBuf,

    /// Arguments passed to the engine, by default [`DEFAULT_PROTOCOL_FLAG`].
    pub args: Vec<String>,
}

impl EngineConfig {
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            args: vec![DEFAULT_PROTOCOL_FLAG.to_string()],
        }
    }

    /// Replaces the arguments passed to the engine.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }
}

/// A running engine subprocess with its stdin and stdout pipes.
///
/// Stdout is drained by a dedicated reader thread into a channel, which is what
/// makes [`EngineChannel::poll_ready`] non-blocking.
#[derive(Debug)]
pub struct EngineProcess {
    /// Path of the engine executable.
    executable: PathBuf,

    /// The child process. `None` once it has been killed.
    child: Option<Child>,

    /// Write end of the engine's stdin.
    stdin: Option<ChildStdin>,

    /// Chunks of stdout forwarded by the reader thread.
    responses: Receiver<io::Result<Vec<u8>>>,

    /// Output that has been received from the reader thread but not yet read by the caller.
    pending: Vec<u8>,

    /// Handle to the thread reading from the engine's stdout.
    reader: Option<JoinHandle<()>>,
}

impl EngineProcess {
    /// Launches the engine described by `config` with both standard streams piped.
    ///
    /// On failure nothing is left running.
    pub fn spawn(config: &EngineConfig) -> Result<Self, EngineError> {
        let path = config.executable.clone();

        let mut child = Process::new(&config.executable)
            .args(&config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|source| EngineError::Spawn {
                path: path.clone(),
                source,
            })?;

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            // Don't leave a half-connected engine running
            let _ = child.kill();
            let _ = child.wait();
            return Err(EngineError::MissingPipe {
                path,
                stream: "stdin/stdout",
            });
        };

        let (sender, responses) = channel();
        let reader = thread::Builder::new()
            .name(String::from("engine-stdout"))
            .spawn(move || output_handler(stdout, sender))
            .map_err(|source| {
                let _ = child.kill();
                let _ = child.wait();
                EngineError::Spawn {
                    path: path.clone(),
                    source,
                }
            })?;

        info!(
            "Spawned engine {path:?} (pid {}) with args {:?}",
            child.id(),
            config.args
        );

        Ok(Self {
            executable: path,
            child: Some(child),
            stdin: Some(stdin),
            responses,
            pending: Vec::with_capacity(DEFAULT_REPLY_CAPACITY),
            reader: Some(reader),
        })
    }

    /// Terminates the engine and releases both pipes.
    ///
    /// Consumes the process, so it can only happen once.
    pub fn kill(mut self) -> Result<(), EngineError> {
        self.terminate()
    }

    fn terminate(&mut self) -> Result<(), EngineError> {
        // Closing stdin first lets a well-behaved engine exit on its own
        drop(self.stdin.take());

        let Some(mut child) = self.child.take() else {
            return Ok(());
        };

        let path = self.executable.clone();
        match child.kill() {
            Ok(()) => {}
            // Already exited
            Err(e) if e.kind() == io::ErrorKind::InvalidInput => {}
            Err(source) => return Err(EngineError::Kill { path, source }),
        }
        let status = child
            .wait()
            .map_err(|source| EngineError::Kill { path, source })?;

        // The reader thread stops on its own once the child's stdout is closed
        drop(self.reader.take());

        info!("Engine {:?} terminated ({status})", self.executable);
        Ok(())
    }

    fn take_pending(&mut self, max: usize) -> Vec<u8> {
        let n = max.min(self.pending.len());
        let rest = self.pending.split_off(n);
        mem::replace(&mut self.pending, rest)
    }
}

impl EngineChannel for EngineProcess {
    fn name(&self) -> &Path {
        &self.executable
    }

    fn send_line(&mut self, line: &str) -> Result<(), EngineError> {
        if line.contains(['\n', '\r']) {
            return Err(EngineError::InvalidCommand(line.to_string()));
        }

        let path = &self.executable;
        let Some(stdin) = self.stdin.as_mut() else {
            return Err(EngineError::Closed(path.clone()));
        };

        debug!("> {line}");

        // A single write, so the engine never sees half a command
        let mut buffer = String::with_capacity(line.len() + 1);
        buffer.push_str(line);
        buffer.push('\n');

        stdin
            .write_all(buffer.as_bytes())
            .and_then(|_| stdin.flush())
            .map_err(|source| EngineError::Write {
                path: path.clone(),
                source,
            })
    }

    fn read_available(&mut self, capacity: usize) -> Result<String, EngineError> {
        // One byte is reserved, as if for a terminator
        if capacity < 2 {
            return Err(EngineError::InvalidCapacity(capacity));
        }

        if self.pending.is_empty() {
            match self.responses.recv() {
                Ok(Ok(chunk)) => self.pending = chunk,
                Ok(Err(source)) => {
                    return Err(EngineError::Read {
                        path: self.executable.clone(),
                        source,
                    })
                }
                Err(RecvError) => return Err(EngineError::Closed(self.executable.clone())),
            }
        }

        let bytes = self.take_pending(capacity - 1);
        let reply = String::from_utf8_lossy(&bytes).into_owned();
        debug!("< {}", reply.trim_end());

        Ok(reply)
    }

    fn poll_ready(&mut self) -> Result<Readiness, EngineError> {
        if !self.pending.is_empty() {
            return Ok(Readiness::Ready);
        }

        match self.responses.try_recv() {
            Ok(Ok(chunk)) => {
                self.pending = chunk;
                Ok(Readiness::Ready)
            }
            Ok(Err(source)) => Err(EngineError::Poll {
                path: self.executable.clone(),
                source,
            }),
            Err(TryRecvError::Empty) => Ok(Readiness::NotReady),
            Err(TryRecvError::Disconnected) => Err(EngineError::Closed(self.executable.clone())),
        }
    }
}

impl Drop for EngineProcess {
    fn drop(&mut self) {
        if self.child.is_some() {
            warn!("Engine {:?} dropped without being killed", self.executable);
            if let Err(err) = self.terminate() {
                warn!("{err}");
            }
        }
    }
}

/// Loops on the engine's stdout, forwarding everything it reads through `sender`.
///
/// Stops at end-of-file, on a read error (which is forwarded), or once the receiving end is gone.
fn output_handler(mut stdout: ChildStdout, sender: Sender<io::Result<Vec<u8>>>) {
    let mut buffer = [0u8; READ_CHUNK];

    loop {
        match stdout.read(&mut buffer) {
            // EOF: dropping the sender tells the other side the engine is gone
            Ok(0) => break,

            Ok(n) => {
                if sender.send(Ok(buffer[..n].to_vec())).is_err() {
                    break;
                }
            }

            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,

            Err(e) => {
                let _ = sender.send(Err(e));
                break;
            }
        }
    }
}
