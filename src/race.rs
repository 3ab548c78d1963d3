//! The grid-race environment.
//!
//! Implements [`Environment`] on top of [`Circuit`]: a round-robin
//! scheduler with a phantom turn-marker slot, penalty backoff for invalid
//! moves, turn-indexed scoring, and replay recording.

mod observer;

use crate::circuit::{Circuit, CircuitFull};
use crate::env::{Environment, LineReader};
use crate::replay::{EnvInfo, PlayerState, PlayerStep, Replay, State};
use crate::track::{Pos, Track};
use serde::Deserialize;
use std::path::PathBuf;
use tracing::{info, warn};

/// Scheduled turns a player sits out after an invalid move.
pub const INVALID_ACTION_PENALTY: u32 = 5;

/// Default turn budget for a match.
pub const DEFAULT_MAX_TURNS: u32 = 500;

/// Options carried by the judge configuration file.
#[derive(Debug, Clone, Deserialize)]
pub struct RaceOptions {
    /// Path to the track grid file.
    pub track_file: PathBuf,
    /// Visibility radius in cells.
    pub visibility_radius: u32,
    /// Turn budget for the match.
    #[serde(default = "default_max_turns")]
    pub max_turns: u32,
    /// Player count; a command-line value overrides this when present.
    #[serde(default)]
    pub num_players: Option<usize>,
}

const fn default_max_turns() -> u32 {
    DEFAULT_MAX_TURNS
}

/// The racing environment driven by the judge runtime.
///
/// The scheduler cycles over `num_players + 1` slots; the extra phantom
/// slot marks the end of a round and increments the global turn counter,
/// which doubles as the time limit and the score of a winning step.
#[derive(Debug)]
pub struct GridRaceEnv {
    circuit: Circuit,
    num_players: usize,
    max_turns: u32,
    visibility_radius: u32,
    scores: Vec<u32>,
    turns: u32,
    penalties: Vec<Option<u32>>,
    cycle: usize,
    replay: Replay,
}

impl GridRaceEnv {
    /// Create a racing environment and register its players.
    ///
    /// # Errors
    ///
    /// Returns [`CircuitFull`] when the track has fewer start cells than
    /// `num_players`.
    pub fn new(
        track: Track,
        num_players: usize,
        visibility_radius: u32,
        max_turns: u32,
    ) -> Result<Self, CircuitFull> {
        debug_assert!(num_players > 0, "a race needs at least one player");
        let env_info = EnvInfo {
            track: track.raw_rows(),
            num_players,
        };
        let mut circuit = Circuit::new(track);
        for _ in 0..num_players {
            circuit.add_player()?;
        }
        Ok(Self {
            circuit,
            num_players,
            max_turns,
            visibility_radius,
            scores: vec![max_turns + 1; num_players],
            turns: 0,
            penalties: vec![None; num_players],
            cycle: 0,
            replay: Replay::new(env_info),
        })
    }

    /// The match recording accumulated so far.
    #[must_use]
    pub const fn replay(&self) -> &Replay {
        &self.replay
    }

    /// Value of the global turn counter.
    #[must_use]
    pub const fn turns(&self) -> u32 {
        self.turns
    }

    /// The circuit being raced on.
    #[must_use]
    pub const fn circuit(&self) -> &Circuit {
        &self.circuit
    }

    fn advance_cycle(&mut self) -> usize {
        let ind = self.cycle;
        self.cycle = (self.cycle + 1) % (self.num_players + 1);
        ind
    }

    fn all_players_won(&self) -> bool {
        (0..self.num_players).all(|i| self.circuit.player_won(i))
    }

    fn snapshot(&self) -> State {
        State {
            turn: self.turns,
            players: self
                .circuit
                .players()
                .iter()
                .map(|p| PlayerState {
                    x: p.pos.row,
                    y: p.pos.col,
                    vel_x: p.vel.row,
                    vel_y: p.vel.col,
                })
                .collect(),
        }
    }

    /// Append a step and the snapshot it produced.
    fn record_step(&mut self, step: PlayerStep) {
        let state = self.snapshot();
        self.replay.record_step(step, state);
    }
}

impl Environment for GridRaceEnv {
    type Input = (i32, i32);

    fn reset(&mut self) -> String {
        self.circuit.reset_players();
        self.scores = vec![self.max_turns + 1; self.num_players];
        self.turns = 0;
        self.penalties = vec![None; self.num_players];
        self.cycle = 0;
        self.replay = Replay::new(EnvInfo {
            track: self.circuit.track().raw_rows(),
            num_players: self.num_players,
        });
        let state = self.snapshot();
        self.replay.record_initial_state(state);
        let (height, width) = self.circuit.track().shape();
        format!(
            "{height} {width} {} {}",
            self.num_players, self.visibility_radius
        )
    }

    fn next_player(&mut self, current: Option<usize>) -> Option<usize> {
        if current.is_none() {
            let first = self.advance_cycle();
            debug_assert_eq!(first, 0, "schedule must start with player 0");
            return Some(first);
        }
        loop {
            if self.all_players_won() {
                return None;
            }
            let ind = self.advance_cycle();
            if ind == self.num_players {
                // Phantom slot: a full round has passed.
                self.turns += 1;
                if self.turns >= self.max_turns {
                    info!("Reached max turn limit ({}).", self.turns);
                    return None;
                }
                continue;
            }
            if self.circuit.player_won(ind) {
                continue;
            }
            match self.penalties[ind] {
                Some(0) => {
                    self.penalties[ind] = None;
                    return Some(ind);
                }
                Some(left) => {
                    self.penalties[ind] = Some(left - 1);
                    self.record_step(PlayerStep::failure(
                        ind,
                        "Player is in penalty, skipping their turn.",
                    ));
                }
                None => return Some(ind),
            }
        }
    }

    fn observation(&self, player: usize) -> String {
        let me = self.circuit.players()[player];
        let mut out = format!("{} {} {} {}", me.pos.row, me.pos.col, me.vel.row, me.vel.col);
        for p in self.circuit.players() {
            out.push('\n');
            out.push_str(&format!("{} {}", p.pos.row, p.pos.col));
        }
        out.push('\n');
        out.push_str(&observer::local_view(
            self.circuit.track(),
            me.pos,
            self.visibility_radius,
        ));
        out
    }

    async fn read_player_input(&mut self, reader: &mut impl LineReader) -> Option<(i32, i32)> {
        let line = reader.read_line().await.ok()?;
        let mut tokens = line.split_whitespace();
        let dx = tokens.next()?.parse().ok()?;
        let dy = tokens.next()?.parse().ok()?;
        if tokens.next().is_some() {
            return None;
        }
        Some((dx, dy))
    }

    fn invalid_player_input(&mut self, player: usize) {
        warn!("Player {player} sent invalid input (or timed out); skipping their move.");
        self.record_step(PlayerStep::failure(player, "Invalid input or timeout."));
    }

    fn step(&mut self, player: usize, input: (i32, i32)) {
        let (dx, dy) = input;
        debug_assert!(!self.circuit.player_won(player));
        let step = match self.circuit.move_player(player, Pos::new(dx, dy)) {
            Ok(()) => PlayerStep::success(player, dx, dy),
            Err(err) => {
                info!("Player {player}: invalid move ({dx}, {dy}): {err}");
                self.penalties[player] = Some(INVALID_ACTION_PENALTY);
                self.circuit.stop_player(player);
                PlayerStep::failure(player, format!("Invalid move: ({dx}, {dy}): {err}"))
            }
        };
        if self.circuit.player_won(player) {
            self.scores[player] = self.turns;
        }
        self.record_step(step);
    }

    fn get_scores(&self) -> Vec<u32> {
        self.scores.clone()
    }

    fn num_players(&self) -> usize {
        self.num_players
    }
}
