//! The plug-point between the turn runner and a concrete game.
//!
//! The runner is game-agnostic: it drives anything implementing
//! [`Environment`]. Grid racing is the implementation shipped in
//! [`crate::race`].

use crate::wire::WireError;

/// Reads one line of client input.
///
/// The runner hands an implementation to
/// [`Environment::read_player_input`]; the environment decides how many
/// logical reads one turn needs (racing reads a single line). The reply
/// deadline is charged against the whole `read_player_input` call, so
/// implementations must not block beyond their reads.
pub trait LineReader {
    /// Read the next line of client input, without its trailing newline.
    ///
    /// # Errors
    ///
    /// Returns a [`WireError`] when the client is disconnected, times out,
    /// or violates the protocol.
    fn read_line(&mut self) -> impl Future<Output = Result<String, WireError>>;
}

/// A turn-based game the runner can drive.
///
/// One observation string that never appears in normal play is reserved:
/// the runner broadcasts `~~~END~~~` on its own line to mark match
/// termination, so environments must never produce it.
pub trait Environment {
    /// Parsed per-turn input.
    type Input;

    /// Prepare for a new match and return the initial broadcast string.
    fn reset(&mut self) -> String;

    /// Advance the scheduler past `current`.
    ///
    /// `None` input means "before the first turn". Returns `None` once the
    /// match is over.
    fn next_player(&mut self, current: Option<usize>) -> Option<usize>;

    /// Render the observation for one player.
    ///
    /// May be multi-line; the runner appends the final newline if absent.
    fn observation(&self, player: usize) -> String;

    /// Read and parse exactly one client reply.
    ///
    /// Returns `None` on unparseable input; read failures surface as
    /// `None` too.
    fn read_player_input(
        &mut self,
        reader: &mut impl LineReader,
    ) -> impl Future<Output = Option<Self::Input>>;

    /// Note an invalid reply or timeout for `player`.
    fn invalid_player_input(&mut self, player: usize);

    /// Apply a validated input. Rule violations are handled internally and
    /// never abort the match.
    fn step(&mut self, player: usize, input: Self::Input);

    /// Final scores, one per player. Called after the match ends.
    fn get_scores(&self) -> Vec<u32>;

    /// Number of registered players.
    fn num_players(&self) -> usize;
}
