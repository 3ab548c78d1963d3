//! Accepts clients and drives an environment's turn loop.
//!
//! One runner hosts one match. The accept phase admits up to N clients
//! under a connection deadline; the match loop then serialises all I/O
//! through a single task, one player at a time. Nothing inside the match
//! loop is fatal: every per-player failure degrades to a recorded skip, so
//! one misbehaving bot cannot spoil the match.

use crate::env::{Environment, LineReader};
use crate::wire::{self, WireError};
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::time::{Duration, Instant};
use tokio::net::{TcpListener, TcpStream};
use tracing::{info, warn};

/// Observation line that tells clients the match is over.
///
/// Reserved: environments must not produce it in any observation.
pub const END_SENTINEL: &str = "~~~END~~~";

/// Runner timing and admission settings.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Port to listen on.
    pub port: u16,
    /// Per-step reply deadline.
    pub step_timeout: Duration,
    /// Deadline for each client connection during the accept phase.
    pub connection_timeout: Duration,
    /// Expected client IP addresses, in slot order. When set, peers must
    /// come from this list and each address may connect at most once.
    pub client_addresses: Option<Vec<IpAddr>>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            port: wire::JUDGE_PORT,
            step_timeout: Duration::from_secs(1),
            connection_timeout: Duration::from_secs(10),
            client_addresses: None,
        }
    }
}

/// Fatal errors from the accept phase.
///
/// These are the only errors that stop a match; see the module docs.
#[derive(Debug)]
pub enum StartupError {
    /// The listening socket could not be created.
    Bind(std::io::Error),
    /// The address list length does not match the player count.
    AddressCount {
        /// Number of players the environment expects.
        expected: usize,
        /// Number of addresses configured.
        got: usize,
    },
    /// Two connections arrived from the same expected address.
    DuplicateAddress(IpAddr),
    /// A connection arrived from an address not in the expected list.
    UnexpectedAddress(IpAddr),
}

impl fmt::Display for StartupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StartupError::Bind(e) => write!(f, "failed to open the judge port: {e}"),
            StartupError::AddressCount { expected, got } => write!(
                f,
                "number of client addresses ({got}) must equal the number of players ({expected})"
            ),
            StartupError::DuplicateAddress(addr) => {
                write!(f, "multiple connections from the same address: {addr}")
            }
            StartupError::UnexpectedAddress(addr) => {
                write!(f, "got invalid connection from {addr}")
            }
        }
    }
}

impl std::error::Error for StartupError {}

/// One connected client.
#[derive(Debug)]
struct ClientSlot {
    stream: TcpStream,
    dead: bool,
}

/// Drives one match between an [`Environment`] and its clients.
#[derive(Debug)]
pub struct EnvironmentRunner<E> {
    env: E,
    config: RunnerConfig,
    listener: Option<TcpListener>,
    slots: Vec<Option<ClientSlot>>,
}

impl<E: Environment> EnvironmentRunner<E> {
    /// Open the listening socket for a new match.
    ///
    /// # Errors
    ///
    /// Returns a [`StartupError`] when the socket cannot be bound or the
    /// configured address list does not match the player count.
    pub async fn bind(env: E, config: RunnerConfig) -> Result<Self, StartupError> {
        if let Some(addresses) = &config.client_addresses {
            if addresses.len() != env.num_players() {
                return Err(StartupError::AddressCount {
                    expected: env.num_players(),
                    got: addresses.len(),
                });
            }
        }
        let listener = TcpListener::bind(("0.0.0.0", config.port))
            .await
            .map_err(StartupError::Bind)?;
        Ok(Self {
            env,
            config,
            listener: Some(listener),
            slots: Vec::new(),
        })
    }

    /// Local address of the listening socket.
    ///
    /// Present until the accept phase finishes; useful when binding port 0.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.as_ref().and_then(|l| l.local_addr().ok())
    }

    /// Reclaim the environment, typically to extract its replay.
    #[must_use]
    pub fn into_env(self) -> E {
        self.env
    }

    /// Run the match to completion and return the final scores.
    ///
    /// # Errors
    ///
    /// Returns a [`StartupError`] from the accept phase; once the match
    /// loop starts, nothing is fatal.
    pub async fn run(&mut self) -> Result<Vec<u32>, StartupError> {
        self.accept_players().await?;
        info!("Started the run.");
        self.send_initial_observations().await;

        let mut current: Option<usize> = None;
        loop {
            let Some(player) = self.env.next_player(current) else {
                break;
            };
            debug_assert!(player < self.env.num_players());
            let observation = with_newline(self.env.observation(player));
            send_to_slot(&mut self.slots[player], player, &observation).await;

            let started = Instant::now();
            let mut reader = SlotReader {
                slot: &mut self.slots[player],
                deadline: self.config.step_timeout,
            };
            let mut input = self.env.read_player_input(&mut reader).await;
            // The deadline covers the whole read, not just the socket wait.
            if started.elapsed() > self.config.step_timeout {
                input = None;
            }
            match input {
                Some(input) => self.env.step(player, input),
                None => self.env.invalid_player_input(player),
            }
            current = Some(player);
        }

        self.signal_the_end().await;
        Ok(self.env.get_scores())
    }

    /// Accept up to N clients and lay them out in slot order.
    async fn accept_players(&mut self) -> Result<(), StartupError> {
        let num_players = self.env.num_players();
        let Some(listener) = self.listener.take() else {
            return Ok(());
        };
        info!("Waiting for players to connect...");
        let mut accepted: Vec<(Option<TcpStream>, IpAddr)> = Vec::new();
        for _ in 0..num_players {
            match tokio::time::timeout(self.config.connection_timeout, listener.accept()).await {
                Err(_) => {
                    warn!("Connection timed out. May not have enough players.");
                    break;
                }
                Ok(Err(e)) => {
                    warn!("Accept failed: {e}.");
                    break;
                }
                Ok(Ok((stream, peer))) => {
                    let ip = peer.ip();
                    if self.config.client_addresses.is_some()
                        && accepted.iter().any(|(_, seen)| *seen == ip)
                    {
                        return Err(StartupError::DuplicateAddress(ip));
                    }
                    info!("Player connected from {ip}");
                    accepted.push((Some(stream), ip));
                }
            }
        }
        // The listener drops here: no connections outlive the accept phase.

        self.slots = if let Some(expected) = self.config.client_addresses.clone() {
            for (_, ip) in &accepted {
                if !expected.contains(ip) {
                    return Err(StartupError::UnexpectedAddress(*ip));
                }
            }
            expected
                .iter()
                .map(|want| {
                    let stream = accepted
                        .iter_mut()
                        .find(|(stream, ip)| stream.is_some() && ip == want)
                        .and_then(|(stream, _)| stream.take());
                    if stream.is_none() {
                        info!("No connections from {want}.");
                    }
                    stream.map(|stream| ClientSlot {
                        stream,
                        dead: false,
                    })
                })
                .collect()
        } else {
            let mut slots: Vec<Option<ClientSlot>> = accepted
                .into_iter()
                .filter_map(|(stream, _)| stream)
                .map(|stream| {
                    Some(ClientSlot {
                        stream,
                        dead: false,
                    })
                })
                .collect();
            slots.resize_with(num_players, || None);
            slots
        };
        Ok(())
    }

    async fn send_initial_observations(&mut self) {
        let initial = with_newline(self.env.reset());
        info!("Sending initial observation to all players.");
        for (player, slot) in self.slots.iter_mut().enumerate() {
            send_to_slot(slot, player, &initial).await;
        }
    }

    async fn signal_the_end(&mut self) {
        info!("Run ends, sending the end signal to everyone...");
        let sentinel = format!("{END_SENTINEL}\n");
        for (player, slot) in self.slots.iter_mut().enumerate() {
            send_to_slot(slot, player, &sentinel).await;
        }
    }
}

/// Line reader over one client slot with a per-recv deadline.
#[derive(Debug)]
struct SlotReader<'a> {
    slot: &'a mut Option<ClientSlot>,
    deadline: Duration,
}

impl LineReader for SlotReader<'_> {
    async fn read_line(&mut self) -> Result<String, WireError> {
        let Some(slot) = self.slot.as_mut() else {
            return Err(WireError::NotConnected);
        };
        if slot.dead {
            return Err(WireError::NotConnected);
        }
        match tokio::time::timeout(self.deadline, wire::recv_msg(&mut slot.stream)).await {
            Err(_) => Err(WireError::Timeout),
            Ok(Ok(msg)) => match msg.into_data() {
                Ok(data) => Ok(data),
                Err(e) => {
                    // Protocol violation: the slot is dead for the match.
                    slot.dead = true;
                    Err(e)
                }
            },
            Ok(Err(e)) => {
                slot.dead = true;
                Err(e)
            }
        }
    }
}

/// Send an observation, silently skipping missing or dead slots.
async fn send_to_slot(slot: &mut Option<ClientSlot>, player: usize, text: &str) {
    let Some(client) = slot.as_mut() else {
        return;
    };
    if client.dead {
        return;
    }
    if let Err(e) = wire::send_data(&mut client.stream, text).await {
        warn!("Failed to send to player {player}: {e}");
        client.dead = true;
    }
}

fn with_newline(mut text: String) -> String {
    if !text.ends_with('\n') {
        text.push('\n');
    }
    text
}
