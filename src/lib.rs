// Allow unwrap and scripted literals in tests (test code is not production)
#![cfg_attr(test, allow(clippy::unwrap_used))]
//! Gridrace: a networked judge for turn-based grid-race contests.
//!
//! Bot programs connect to the judge over TCP, receive fog-of-war
//! observations of a racetrack, and reply with acceleration commands until
//! they reach the goal or exhaust the turn budget. The judge records every
//! turn attempt into a byte-reproducible replay artifact and scores each
//! player by the turn on which they finished.
//!
//! # Architecture
//!
//! The match orchestration is environment-agnostic. The turn runner talks
//! to any [`Environment`]; grid racing is the implementation shipped here.
//!
//! ```text
//! ┌──────────────────────────────────────┐
//! │   Turn Runner (accept, deadlines)    │
//! ├──────────────────────────────────────┤
//! │  Environment trait  │  Wire Codec    │
//! ├─────────────────────┴────────────────┤
//! │  GridRaceEnv → Circuit → Track       │
//! └──────────────────────────────────────┘
//! ```
//!
//! Each match is cooperatively single-threaded: one loop processes one
//! player at a time, so the circuit and replay never see concurrent
//! access. The client-side [`bridge`] is the concurrent piece, pumping a
//! bot's stdio to the judge socket.

pub mod bridge;
pub mod circuit;
pub mod env;
pub mod race;
pub mod replay;
pub mod runner;
pub mod track;
pub mod wire;

pub use circuit::{Circuit, CircuitFull, InvalidMove, Player};
pub use env::{Environment, LineReader};
pub use race::{GridRaceEnv, RaceOptions};
pub use replay::{PlayerStep, Replay, StepOutcome};
pub use runner::{EnvironmentRunner, RunnerConfig, StartupError};
pub use track::{Cell, Pos, Track, TrackError};
pub use wire::{JUDGE_PORT, Message, WireError};
