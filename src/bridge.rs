//! Bridges a bot subprocess to the judge over the wire protocol.
//!
//! Three cooperative tasks run for the lifetime of a session: one frames
//! every line of bot stdout into a `data` message for the judge, one
//! drains bot stderr into the session log, and one writes judge messages
//! into bot stdin. They share only the session log, whose writes are
//! serialised through a mutex. The tasks end at EOF on their stream or
//! when the judge closes the connection; ctrl-c terminates the bot and
//! exits cleanly.

use crate::wire::{self, WireError};
use std::fmt;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tracing::{info, warn};

/// Errors raised while starting or running the bridge.
#[derive(Debug)]
pub enum BridgeError {
    /// The bot file type is not recognised.
    UnknownFileType(PathBuf),
    /// Connecting to the judge failed.
    Connect(std::io::Error),
    /// Spawning the bot subprocess failed.
    Spawn(std::io::Error),
    /// The session log could not be created.
    Log(std::io::Error),
}

impl fmt::Display for BridgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BridgeError::UnknownFileType(path) => {
                write!(f, "unknown bot file type: {}", path.display())
            }
            BridgeError::Connect(e) => write!(f, "failed to connect to the judge: {e}"),
            BridgeError::Spawn(e) => write!(f, "failed to start the bot: {e}"),
            BridgeError::Log(e) => write!(f, "failed to create the session log: {e}"),
        }
    }
}

impl std::error::Error for BridgeError {}

/// Command line used to execute a bot program.
///
/// Python sources run unbuffered under `python -u`, `.mjs` under `node`,
/// and extensionless files directly. Returns `None` for anything else.
#[must_use]
pub fn execute_command(path: &Path) -> Option<Vec<String>> {
    let as_str = path.to_string_lossy().into_owned();
    match path.extension().and_then(|e| e.to_str()) {
        Some("py") => Some(vec!["python".to_string(), "-u".to_string(), as_str]),
        Some("mjs") => Some(vec!["node".to_string(), as_str]),
        None => Some(vec![as_str]),
        Some(_) => None,
    }
}

/// Timestamped log of everything crossing the bridge.
///
/// The three bridge tasks share one instance; a mutex serialises writes.
#[derive(Debug)]
pub struct SessionLog {
    file: Mutex<std::fs::File>,
}

impl SessionLog {
    /// Create the log at an explicit path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created.
    pub fn open(path: &Path) -> std::io::Result<Self> {
        let file = std::fs::File::create(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }

    /// Create `communication.<timestamp>.log` in the working directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created.
    pub fn create() -> std::io::Result<Self> {
        let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S%.3f");
        Self::open(Path::new(&format!("communication.{stamp}.log")))
    }

    fn write(&self, stream: &str, msg: &str) {
        if let Ok(mut file) = self.file.lock() {
            let now = chrono::Local::now().format("%H:%M:%S%.6f");
            let _ = writeln!(file, "{now} - {stream:<6} :: {msg}");
            let _ = file.flush();
        }
    }

    /// Record a line the bot wrote on stdout.
    pub fn stdout(&self, msg: &str) {
        self.write("stdout", msg);
    }

    /// Record a line the bot wrote on stderr.
    pub fn stderr(&self, msg: &str) {
        self.write("stderr", msg);
    }

    /// Record a line forwarded into the bot's stdin.
    pub fn stdin(&self, msg: &str) {
        self.write("stdin", msg);
    }
}

/// Proxies a bot's stdio to the judge socket.
#[derive(Debug)]
pub struct ClientBridge {
    socket: TcpStream,
    child: Child,
    stdout: ChildStdout,
    stderr: ChildStderr,
    stdin: ChildStdin,
    log: Arc<SessionLog>,
}

impl ClientBridge {
    /// Connect to the judge and spawn the bot subprocess.
    ///
    /// # Errors
    ///
    /// Returns a [`BridgeError`] if the bot type is unknown, the judge is
    /// unreachable, or the subprocess or log cannot be created.
    pub async fn start(judge_address: &str, bot: &Path) -> Result<Self, BridgeError> {
        let command =
            execute_command(bot).ok_or_else(|| BridgeError::UnknownFileType(bot.to_path_buf()))?;
        let socket = TcpStream::connect((judge_address, wire::JUDGE_PORT))
            .await
            .map_err(BridgeError::Connect)?;
        let mut child = Command::new(&command[0])
            .args(&command[1..])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(BridgeError::Spawn)?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| BridgeError::Spawn(std::io::Error::other("bot stdout unavailable")))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| BridgeError::Spawn(std::io::Error::other("bot stderr unavailable")))?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| BridgeError::Spawn(std::io::Error::other("bot stdin unavailable")))?;
        let log = Arc::new(SessionLog::create().map_err(BridgeError::Log)?);
        Ok(Self {
            socket,
            child,
            stdout,
            stderr,
            stdin,
            log,
        })
    }

    /// Run the proxy tasks until the session ends, then reap the bot.
    pub async fn run(self) {
        let Self {
            socket,
            mut child,
            stdout,
            stderr,
            stdin,
            log,
        } = self;
        let (sock_rx, sock_tx) = socket.into_split();

        let pumps = async {
            tokio::join!(
                pump_stdout(stdout, sock_tx, Arc::clone(&log)),
                pump_stderr(stderr, Arc::clone(&log)),
                pump_judge(sock_rx, stdin, Arc::clone(&log)),
            );
        };
        tokio::select! {
            () = pumps => {}
            _ = tokio::signal::ctrl_c() => {
                info!("Received keyboard interrupt. Bye.");
            }
        }
        let _ = child.kill().await;
    }
}

/// Frame each bot stdout line into a `data` message for the judge.
async fn pump_stdout(stdout: ChildStdout, mut sock: OwnedWriteHalf, log: Arc<SessionLog>) {
    let mut lines = BufReader::new(stdout).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        log.stdout(&line);
        if wire::send_data(&mut sock, &line).await.is_err() {
            break;
        }
    }
}

/// Bot stderr goes only to the session log.
async fn pump_stderr(stderr: ChildStderr, log: Arc<SessionLog>) {
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        log.stderr(&line);
    }
}

/// Forward judge messages into the bot's stdin.
async fn pump_judge(mut sock: OwnedReadHalf, mut stdin: ChildStdin, log: Arc<SessionLog>) {
    loop {
        match wire::recv_data(&mut sock).await {
            Ok(data) => {
                log.stdin(data.strip_suffix('\n').unwrap_or(&data));
                if stdin.write_all(data.as_bytes()).await.is_err() {
                    warn!("Can't write to the bot. Maybe it terminated?");
                    break;
                }
                let _ = stdin.flush().await;
            }
            // The judge closed the connection. Farewell.
            Err(WireError::ConnectionClosed) => break,
            Err(e) => {
                warn!("Judge connection failed: {e}");
                break;
            }
        }
    }
}
