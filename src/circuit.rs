//! The racing circuit: an immutable track plus the racers on it.
//!
//! Motion is continuous along straight segments over a discrete grid, so a
//! move is legal only if the whole segment stays on traversable cells. The
//! wall test runs the segment in both its row-parameterised and
//! column-parameterised forms; at each integer step along the dominant axis
//! the two cells at the floor and ceil of the exact off-axis coordinate are
//! inspected, and the segment is blocked iff both are walls. Without the
//! pair rule, diagonal moves could cut through wall corners.

use crate::track::{Cell, Pos, Track};
use std::fmt;

/// A racer: stable index, current position and velocity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Player {
    /// Stable 0-based index, assigned at registration.
    pub ind: usize,
    /// Current position.
    pub pos: Pos,
    /// Current velocity in cells per turn.
    pub vel: Pos,
}

/// A rejected move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidMove {
    /// A delta component was outside `{-1, 0, 1}`.
    InvalidDelta {
        /// The offending delta.
        delta: Pos,
    },
    /// The motion segment left the track or crossed a wall.
    LeftTrack {
        /// Index of the moving player.
        player: usize,
    },
    /// Another player already occupies the target cell.
    Collision {
        /// Index of the moving player.
        player: usize,
        /// Index of the occupant.
        other: usize,
    },
}

impl fmt::Display for InvalidMove {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvalidMove::InvalidDelta { delta } => {
                write!(f, "invalid direction value {delta}")
            }
            InvalidMove::LeftTrack { player } => {
                write!(f, "player {player} left the track")
            }
            InvalidMove::Collision { player, other } => {
                write!(f, "player {player} collided with player {other}")
            }
        }
    }
}

impl std::error::Error for InvalidMove {}

/// Error returned when registering more players than the track has starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitFull {
    /// Number of start cells on the track.
    pub capacity: usize,
}

impl fmt::Display for CircuitFull {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "track supports at most {} players", self.capacity)
    }
}

impl std::error::Error for CircuitFull {}

/// Owns the track and the ordered list of registered players.
///
/// External code mutates players only through [`Circuit::move_player`] and
/// [`Circuit::stop_player`], which keep the occupancy invariants: every
/// player sits on a traversable cell, and no two players share a cell.
#[derive(Debug, Clone)]
pub struct Circuit {
    track: Track,
    players: Vec<Player>,
}

impl Circuit {
    /// Create a circuit with no players registered yet.
    #[must_use]
    pub const fn new(track: Track) -> Self {
        Self {
            track,
            players: Vec::new(),
        }
    }

    /// Register one more player, returning its stable index.
    ///
    /// The player is parked off-track until [`Circuit::reset_players`].
    ///
    /// # Errors
    ///
    /// Returns [`CircuitFull`] when every start cell already has a player.
    pub fn add_player(&mut self) -> Result<usize, CircuitFull> {
        let capacity = self.track.starts().len();
        if self.players.len() >= capacity {
            return Err(CircuitFull { capacity });
        }
        let ind = self.players.len();
        self.players.push(Player {
            ind,
            pos: Pos::new(-1, -1),
            vel: Pos::new(0, 0),
        });
        Ok(ind)
    }

    /// Place every player on its start cell with zero velocity.
    pub fn reset_players(&mut self) {
        let starts = self.track.starts();
        for (player, &start) in self.players.iter_mut().zip(starts) {
            player.pos = start;
            player.vel = Pos::new(0, 0);
        }
    }

    /// Whether the segment from `a` to `b` stays on traversable cells.
    ///
    /// Both endpoints must be in bounds. A zero-length segment is valid iff
    /// its cell is traversable.
    #[must_use]
    pub fn valid_line(&self, a: Pos, b: Pos) -> bool {
        if !self.track.contains(a) || !self.track.contains(b) {
            return false;
        }
        if a == b {
            return self.track.cell_at(a).is_some_and(Cell::traversable);
        }
        !self.sweep_blocked(a, b, Axis::Rows) && !self.sweep_blocked(a, b, Axis::Cols)
    }

    /// One parameterisation of the wall test: walk the dominant axis in
    /// integer steps and check the floor/ceil cell pair at the exact
    /// off-axis coordinate. The off-axis value after `i` steps is
    /// `off0 + i*d_off/|d_dom|`, kept exact with euclidean division.
    fn sweep_blocked(&self, a: Pos, b: Pos, axis: Axis) -> bool {
        let (dom0, off0, d_dom, d_off) = match axis {
            Axis::Rows => (a.row, a.col, b.row - a.row, b.col - a.col),
            Axis::Cols => (a.col, a.row, b.col - a.col, b.row - a.row),
        };
        if d_dom == 0 {
            return false;
        }
        let den = i64::from(d_dom).abs();
        let dir = i64::from(d_dom).signum();
        for i in 0..=den {
            let dom = i64::from(dom0) + i * dir;
            let num = i * i64::from(d_off);
            let lo = i64::from(off0) + num.div_euclid(den);
            let hi = i64::from(off0) + (num + den - 1).div_euclid(den);
            let (lo_cell, hi_cell) = match axis {
                Axis::Rows => (self.track.get(dom, lo), self.track.get(dom, hi)),
                Axis::Cols => (self.track.get(lo, dom), self.track.get(hi, dom)),
            };
            let lo_open = lo_cell.is_some_and(Cell::traversable);
            let hi_open = hi_cell.is_some_and(Cell::traversable);
            if !lo_open && !hi_open {
                return true;
            }
        }
        false
    }

    /// Apply an acceleration to a player.
    ///
    /// The new velocity is `vel + delta` and the new position
    /// `pos + vel + delta`; both are committed only if the whole move is
    /// legal.
    ///
    /// # Errors
    ///
    /// Returns an [`InvalidMove`] when the delta is out of range, the
    /// segment leaves the track, or the target cell is occupied.
    ///
    /// # Panics
    ///
    /// Panics if `ind` is not a registered player index.
    pub fn move_player(&mut self, ind: usize, delta: Pos) -> Result<(), InvalidMove> {
        if !(-1..=1).contains(&delta.row) || !(-1..=1).contains(&delta.col) {
            return Err(InvalidMove::InvalidDelta { delta });
        }
        let player = self.players[ind];
        let new_vel = player.vel + delta;
        let new_pos = player.pos + new_vel;
        if !self.valid_line(player.pos, new_pos) {
            return Err(InvalidMove::LeftTrack { player: ind });
        }
        if let Some(other) = self.player_at(new_pos) {
            if other.ind != ind {
                return Err(InvalidMove::Collision {
                    player: ind,
                    other: other.ind,
                });
            }
        }
        let player = &mut self.players[ind];
        player.pos = new_pos;
        player.vel = new_vel;
        Ok(())
    }

    /// Zero a player's velocity, leaving its position unchanged.
    ///
    /// # Panics
    ///
    /// Panics if `ind` is not a registered player index.
    pub fn stop_player(&mut self, ind: usize) {
        self.players[ind].vel = Pos::new(0, 0);
    }

    /// Whether a player stands on a goal cell.
    ///
    /// # Panics
    ///
    /// Panics if `ind` is not a registered player index.
    #[must_use]
    pub fn player_won(&self, ind: usize) -> bool {
        self.track.cell_at(self.players[ind].pos) == Some(Cell::Goal)
    }

    /// The player occupying `pos`, if any.
    #[must_use]
    pub fn player_at(&self, pos: Pos) -> Option<&Player> {
        self.players.iter().find(|p| p.pos == pos)
    }

    /// Round-robin cursor over players that have not yet won.
    ///
    /// The cursor cycles indefinitely, skipping winners, and terminates
    /// once every player has won.
    #[must_use]
    pub fn iter_players(&self) -> PlayerCycle<'_> {
        PlayerCycle {
            circuit: self,
            next: 0,
            countdown: self.players.len(),
        }
    }

    /// Registered players in index order.
    #[must_use]
    pub fn players(&self) -> &[Player] {
        &self.players
    }

    /// Number of registered players.
    #[must_use]
    pub fn num_players(&self) -> usize {
        self.players.len()
    }

    /// The track this circuit races on.
    #[must_use]
    pub const fn track(&self) -> &Track {
        &self.track
    }
}

/// Dominant axis of a [`Circuit::sweep_blocked`] pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    Rows,
    Cols,
}

/// See [`Circuit::iter_players`].
#[derive(Debug, Clone, Copy)]
pub struct PlayerCycle<'a> {
    circuit: &'a Circuit,
    next: usize,
    countdown: usize,
}

impl Iterator for PlayerCycle<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        let n = self.circuit.num_players();
        if n == 0 {
            return None;
        }
        loop {
            let ind = self.next;
            self.next = (self.next + 1) % n;
            if self.circuit.player_won(ind) {
                self.countdown -= 1;
                if self.countdown == 0 {
                    return None;
                }
            } else {
                self.countdown = n;
                return Some(ind);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::track::Track;

    fn minimal_circuit(players: usize) -> Circuit {
        let mut circuit = Circuit::new(Track::minimal());
        for _ in 0..players {
            circuit.add_player().expect("track has room");
        }
        circuit.reset_players();
        circuit
    }

    #[test]
    fn test_add_player_respects_capacity() {
        let mut circuit = Circuit::new(Track::minimal());
        for expected in 0..3 {
            assert_eq!(circuit.add_player().expect("room"), expected);
        }
        assert_eq!(circuit.add_player(), Err(CircuitFull { capacity: 3 }));
    }

    #[test]
    fn test_reset_places_players_on_starts() {
        let circuit = minimal_circuit(3);
        let positions: Vec<Pos> = circuit.players().iter().map(|p| p.pos).collect();
        assert_eq!(
            positions,
            vec![Pos::new(1, 1), Pos::new(2, 1), Pos::new(3, 1)]
        );
        assert!(circuit.players().iter().all(|p| p.vel == Pos::new(0, 0)));
    }

    #[test]
    fn test_valid_line_straight_corridor() {
        let circuit = minimal_circuit(1);
        assert!(circuit.valid_line(Pos::new(1, 1), Pos::new(1, 4)));
        assert!(circuit.valid_line(Pos::new(1, 4), Pos::new(3, 4)));
    }

    #[test]
    fn test_valid_line_rejects_wall_crossing() {
        let circuit = minimal_circuit(1);
        // (2, 2) is a wall; the straight horizontal segment crosses it.
        assert!(!circuit.valid_line(Pos::new(2, 1), Pos::new(2, 3)));
        // Ends outside the grid.
        assert!(!circuit.valid_line(Pos::new(1, 1), Pos::new(1, 9)));
        assert!(!circuit.valid_line(Pos::new(-1, 0), Pos::new(1, 1)));
    }

    #[test]
    fn test_valid_line_zero_length() {
        let circuit = minimal_circuit(1);
        assert!(circuit.valid_line(Pos::new(1, 1), Pos::new(1, 1)));
        assert!(!circuit.valid_line(Pos::new(0, 0), Pos::new(0, 0)));
    }

    #[test]
    fn test_diagonal_between_wall_pair_is_blocked() {
        // The segment (0,0)->(2,1) crosses row 1 at column 0.5; both cells
        // flanking that crossing are walls, so the line is blocked.
        let track = Track::parse("1 0\n-1 -1\n0 100").expect("track");
        let circuit = Circuit::new(track);
        assert!(!circuit.valid_line(Pos::new(0, 0), Pos::new(2, 1)));
    }

    #[test]
    fn test_diagonal_past_single_wall_is_open() {
        // Same crossing, but only one of the flanking cells is a wall.
        let track = Track::parse("1 0\n-1 0\n0 100").expect("track");
        let circuit = Circuit::new(track);
        assert!(circuit.valid_line(Pos::new(0, 0), Pos::new(2, 1)));
    }

    #[test]
    fn test_unit_diagonal_touches_only_its_endpoints() {
        // A one-cell diagonal has integral crossings only, so the wall
        // pair beside it does not block the move.
        let track = Track::parse("1 -1\n-1 100").expect("track");
        let circuit = Circuit::new(track);
        assert!(circuit.valid_line(Pos::new(0, 0), Pos::new(1, 1)));
    }

    #[test]
    fn test_valid_line_symmetry_exhaustive() {
        let circuit = minimal_circuit(1);
        let (h, w) = circuit.track().shape();
        for r1 in 0..h {
            for c1 in 0..w {
                for r2 in 0..h {
                    for c2 in 0..w {
                        let a = Pos::new(r1, c1);
                        let b = Pos::new(r2, c2);
                        assert_eq!(
                            circuit.valid_line(a, b),
                            circuit.valid_line(b, a),
                            "asymmetry between {a} and {b}"
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn test_move_player_integrates_velocity() {
        let mut circuit = minimal_circuit(1);
        circuit.move_player(0, Pos::new(0, 1)).expect("legal move");
        assert_eq!(circuit.players()[0].pos, Pos::new(1, 2));
        assert_eq!(circuit.players()[0].vel, Pos::new(0, 1));
        // Same delta again: velocity grows to (0, 2).
        circuit.move_player(0, Pos::new(0, 1)).expect("legal move");
        assert_eq!(circuit.players()[0].pos, Pos::new(1, 4));
        assert_eq!(circuit.players()[0].vel, Pos::new(0, 2));
    }

    #[test]
    fn test_move_player_rejects_out_of_range_delta() {
        let mut circuit = minimal_circuit(1);
        let err = circuit.move_player(0, Pos::new(2, 0)).expect_err("bad delta");
        assert!(matches!(err, InvalidMove::InvalidDelta { .. }));
        // State untouched.
        assert_eq!(circuit.players()[0].pos, Pos::new(1, 1));
    }

    #[test]
    fn test_move_player_rejects_leaving_track() {
        let mut circuit = minimal_circuit(1);
        let err = circuit.move_player(0, Pos::new(-1, 0)).expect_err("wall");
        assert_eq!(err, InvalidMove::LeftTrack { player: 0 });
        assert_eq!(circuit.players()[0].vel, Pos::new(0, 0));
    }

    #[test]
    fn test_move_player_rejects_collision() {
        let mut circuit = minimal_circuit(2);
        // Player 1 at (2,1) accelerates up into player 0 at (1,1).
        let err = circuit.move_player(1, Pos::new(-1, 0)).expect_err("occupied");
        assert_eq!(err, InvalidMove::Collision { player: 1, other: 0 });
        assert_eq!(circuit.players()[1].pos, Pos::new(2, 1));
    }

    #[test]
    fn test_stop_player_zeroes_velocity() {
        let mut circuit = minimal_circuit(1);
        circuit.move_player(0, Pos::new(0, 1)).expect("legal move");
        circuit.stop_player(0);
        assert_eq!(circuit.players()[0].vel, Pos::new(0, 0));
        assert_eq!(circuit.players()[0].pos, Pos::new(1, 2));
    }

    #[test]
    fn test_player_won_on_goal() {
        let track = Track::parse("1 100").expect("track");
        let mut circuit = Circuit::new(track);
        circuit.add_player().expect("room");
        circuit.reset_players();
        assert!(!circuit.player_won(0));
        circuit.move_player(0, Pos::new(0, 1)).expect("legal move");
        assert!(circuit.player_won(0));
    }

    #[test]
    fn test_iter_players_skips_winners_and_terminates() {
        let track = Track::parse("1 100 1 0").expect("track");
        let mut circuit = Circuit::new(track);
        circuit.add_player().expect("room");
        circuit.add_player().expect("room");
        circuit.reset_players();
        let mut cycle = circuit.iter_players();
        assert_eq!(cycle.next(), Some(0));
        assert_eq!(cycle.next(), Some(1));
        assert_eq!(cycle.next(), Some(0));

        // Park player 0 on the goal; only player 1 remains.
        circuit.move_player(0, Pos::new(0, 1)).expect("move");
        assert!(circuit.player_won(0));
        let mut cycle = circuit.iter_players();
        assert_eq!(cycle.next(), Some(1));
        assert_eq!(cycle.next(), Some(1));
    }
}
