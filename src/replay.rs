//! Match replay artifacts.
//!
//! A replay is append-only during a match: the initial snapshot is recorded
//! at reset, then every turn attempt appends exactly one step followed by
//! the resulting snapshot. `states` therefore holds one more entry than
//! `steps` at every observable boundary.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;
use std::path::Path;

/// Current replay format version.
pub const REPLAY_VERSION: u32 = 1;

/// Static match information recorded once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvInfo {
    /// Raw cell values of the full track, row-major.
    pub track: Vec<Vec<i64>>,
    /// Number of registered players.
    pub num_players: usize,
}

/// One player's kinematics inside a snapshot.
///
/// `x` is the row coordinate and `y` the column, matching the order
/// positions travel on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerState {
    /// Row coordinate.
    pub x: i32,
    /// Column coordinate.
    pub y: i32,
    /// Row velocity.
    pub vel_x: i32,
    /// Column velocity.
    pub vel_y: i32,
}

/// Snapshot of all players at a turn boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct State {
    /// Value of the global turn counter.
    pub turn: u32,
    /// Per-player kinematics in index order.
    pub players: Vec<PlayerState>,
}

/// What happened on one scheduled turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// The move was applied.
    Success {
        /// Row acceleration.
        dx: i32,
        /// Column acceleration.
        dy: i32,
    },
    /// The turn failed or was skipped.
    Failure {
        /// Human-readable reason.
        status: String,
    },
}

/// One recorded turn attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "RawStep", try_from = "RawStep")]
pub struct PlayerStep {
    /// Index of the scheduled player.
    pub player_ind: usize,
    /// Outcome of the attempt.
    pub outcome: StepOutcome,
}

impl PlayerStep {
    /// A step whose move was applied.
    #[must_use]
    pub const fn success(player_ind: usize, dx: i32, dy: i32) -> Self {
        Self {
            player_ind,
            outcome: StepOutcome::Success { dx, dy },
        }
    }

    /// A failed or skipped step with a non-empty reason.
    #[must_use]
    pub fn failure(player_ind: usize, status: impl Into<String>) -> Self {
        Self {
            player_ind,
            outcome: StepOutcome::Failure {
                status: status.into(),
            },
        }
    }

    /// Whether the move was applied.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.outcome, StepOutcome::Success { .. })
    }
}

/// Flat on-disk shape of a step, as required by the replay file format.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawStep {
    player_ind: usize,
    success: bool,
    #[serde(default)]
    status: String,
    #[serde(default)]
    dx: Option<i32>,
    #[serde(default)]
    dy: Option<i32>,
}

impl From<PlayerStep> for RawStep {
    fn from(step: PlayerStep) -> Self {
        match step.outcome {
            StepOutcome::Success { dx, dy } => Self {
                player_ind: step.player_ind,
                success: true,
                status: String::new(),
                dx: Some(dx),
                dy: Some(dy),
            },
            StepOutcome::Failure { status } => Self {
                player_ind: step.player_ind,
                success: false,
                status,
                dx: None,
                dy: None,
            },
        }
    }
}

impl TryFrom<RawStep> for PlayerStep {
    type Error = String;

    fn try_from(raw: RawStep) -> Result<Self, String> {
        if raw.success {
            let (Some(dx), Some(dy)) = (raw.dx, raw.dy) else {
                return Err("successful step without dx/dy".to_string());
            };
            Ok(PlayerStep::success(raw.player_ind, dx, dy))
        } else if raw.status.is_empty() {
            Err("failed step without a status".to_string())
        } else {
            Ok(PlayerStep::failure(raw.player_ind, raw.status))
        }
    }
}

/// Errors raised while reading or writing replay files.
#[derive(Debug)]
pub enum ReplayError {
    /// The file could not be read or written.
    Io(std::io::Error),
    /// The JSON did not match the replay schema.
    Format(serde_json::Error),
}

impl fmt::Display for ReplayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplayError::Io(e) => write!(f, "replay file error: {e}"),
            ReplayError::Format(e) => write!(f, "replay format error: {e}"),
        }
    }
}

impl std::error::Error for ReplayError {}

impl From<std::io::Error> for ReplayError {
    fn from(e: std::io::Error) -> Self {
        ReplayError::Io(e)
    }
}

impl From<serde_json::Error> for ReplayError {
    fn from(e: serde_json::Error) -> Self {
        ReplayError::Format(e)
    }
}

/// A complete match recording.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Replay {
    /// Static environment information.
    pub env_info: EnvInfo,
    /// Snapshots before the first step and after every step.
    pub states: Vec<State>,
    /// Turn outcomes in schedule order.
    pub steps: Vec<PlayerStep>,
    /// Format version.
    pub version: u32,
}

impl Replay {
    /// An empty recording for a fresh match.
    #[must_use]
    pub const fn new(env_info: EnvInfo) -> Self {
        Self {
            env_info,
            states: Vec::new(),
            steps: Vec::new(),
            version: REPLAY_VERSION,
        }
    }

    /// Record the snapshot taken before the first step.
    pub fn record_initial_state(&mut self, state: State) {
        debug_assert!(self.states.is_empty());
        self.states.push(state);
    }

    /// Record one turn attempt and the snapshot that resulted from it.
    ///
    /// Appending both together is what keeps
    /// `states.len() == steps.len() + 1`.
    pub fn record_step(&mut self, step: PlayerStep, state: State) {
        self.steps.push(step);
        self.states.push(state);
    }

    /// Serialise to a writer as JSON.
    ///
    /// # Errors
    ///
    /// Returns a [`ReplayError`] if encoding or writing fails.
    pub fn save<W: Write>(&self, writer: W) -> Result<(), ReplayError> {
        serde_json::to_writer(writer, self)?;
        Ok(())
    }

    /// Serialise to a file as JSON.
    ///
    /// # Errors
    ///
    /// Returns a [`ReplayError`] if the file cannot be created or written.
    pub fn save_to_file(&self, path: &Path) -> Result<(), ReplayError> {
        let file = std::fs::File::create(path)?;
        self.save(std::io::BufWriter::new(file))
    }

    /// Load a replay back from a file.
    ///
    /// # Errors
    ///
    /// Returns a [`ReplayError`] if the file cannot be read or does not
    /// match the schema.
    pub fn load(path: &Path) -> Result<Self, ReplayError> {
        let file = std::fs::File::open(path)?;
        let replay = serde_json::from_reader(std::io::BufReader::new(file))?;
        Ok(replay)
    }
}
