//! Match state.
//!
//! A match is one best-of-three contest between two players inside a round.
//! Both contestants lock a move; once the pair is complete it is resolved,
//! scored, and cleared so the next exchange starts fresh.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use super::player::ChannelId;

/// Exchanges a contestant must win to take the match.
pub const WIN_TARGET: u8 = 2;

/// A hand move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Move {
    Rock,
    Paper,
    Scissors,
}

impl Move {
    pub const ALL: [Move; 3] = [Move::Rock, Move::Paper, Move::Scissors];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rock => "rock",
            Self::Paper => "paper",
            Self::Scissors => "scissors",
        }
    }

    /// The one move this move defeats.
    pub fn beats(&self) -> Move {
        match self {
            Self::Rock => Self::Scissors,
            Self::Paper => Self::Rock,
            Self::Scissors => Self::Paper,
        }
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unrecognised move text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown move: {0}")]
pub struct ParseMoveError(pub String);

impl FromStr for Move {
    type Err = ParseMoveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "rock" => Ok(Self::Rock),
            "paper" => Ok(Self::Paper),
            "scissors" => Ok(Self::Scissors),
            other => Err(ParseMoveError(other.to_string())),
        }
    }
}

/// Result of one exchange, from the first move's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    FirstWins,
    SecondWins,
    Tie,
}

/// Resolve one exchange.
pub fn resolve(first: Move, second: Move) -> Outcome {
    if first == second {
        Outcome::Tie
    } else if first.beats() == second {
        Outcome::FirstWins
    } else {
        Outcome::SecondWins
    }
}

/// Which side of a match a contestant sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    P1,
    P2,
}

impl Side {
    pub fn other(&self) -> Side {
        match self {
            Self::P1 => Self::P2,
            Self::P2 => Self::P1,
        }
    }

    fn index(&self) -> usize {
        match self {
            Self::P1 => 0,
            Self::P2 => 1,
        }
    }
}

/// Match score.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Score {
    pub p1: u8,
    pub p2: u8,
}

impl Score {
    pub fn get(&self, side: Side) -> u8 {
        match side {
            Side::P1 => self.p1,
            Side::P2 => self.p2,
        }
    }

    fn get_mut(&mut self, side: Side) -> &mut u8 {
        match side {
            Side::P1 => &mut self.p1,
            Side::P2 => &mut self.p2,
        }
    }
}

/// A resolved exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exchange {
    pub p1_move: Move,
    pub p2_move: Move,
    pub outcome: Outcome,
    /// Score after this exchange was applied
    pub score: Score,
    /// Set when this exchange decided the match
    pub winner: Option<ChannelId>,
}

impl Exchange {
    /// The move played by `side`.
    pub fn move_of(&self, side: Side) -> Move {
        match side {
            Side::P1 => self.p1_move,
            Side::P2 => self.p2_move,
        }
    }
}

/// What happened when a move was submitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    /// Move locked, waiting on the opponent
    Locked,
    /// Both moves were in and the exchange resolved
    Resolved(Exchange),
}

/// Match errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MatchError {
    #[error("Move already locked.")]
    AlreadyLocked,
    #[error("Not a contestant in this match.")]
    NotContestant,
    #[error("Match is already decided.")]
    Completed,
}

/// One pairwise contest within a round.
#[derive(Debug, Clone)]
pub struct Match {
    /// `<round>-<index>`, unique within the lobby
    pub id: String,

    /// Round this match belongs to
    pub round: u32,

    /// First contestant; score ties are framed from this side
    pub p1: ChannelId,

    /// Second contestant
    pub p2: ChannelId,

    pub score: Score,

    /// Pending moves, one slot per side
    moves: [Option<Move>; 2],

    pub completed: bool,

    pub winner: Option<ChannelId>,
}

impl Match {
    pub fn new(round: u32, index: usize, p1: ChannelId, p2: ChannelId) -> Self {
        debug_assert_ne!(p1, p2, "a player cannot face themselves");
        Self {
            id: format!("{}-{}", round, index),
            round,
            p1,
            p2,
            score: Score::default(),
            moves: [None, None],
            completed: false,
            winner: None,
        }
    }

    /// Side of `player`, if they are a contestant.
    pub fn side_of(&self, player: ChannelId) -> Option<Side> {
        if player == self.p1 {
            Some(Side::P1)
        } else if player == self.p2 {
            Some(Side::P2)
        } else {
            None
        }
    }

    pub fn has_player(&self, player: ChannelId) -> bool {
        self.side_of(player).is_some()
    }

    /// Check if `player` is in this match and it is still being played.
    pub fn is_active_for(&self, player: ChannelId) -> bool {
        !self.completed && self.has_player(player)
    }

    pub fn contestant(&self, side: Side) -> ChannelId {
        match side {
            Side::P1 => self.p1,
            Side::P2 => self.p2,
        }
    }

    pub fn opponent_of(&self, player: ChannelId) -> Option<ChannelId> {
        self.side_of(player).map(|side| self.contestant(side.other()))
    }

    /// The contestant who did not win, once decided.
    pub fn loser(&self) -> Option<ChannelId> {
        self.winner.and_then(|winner| self.opponent_of(winner))
    }

    /// Check if `player` has a pending move.
    pub fn is_locked(&self, player: ChannelId) -> bool {
        self.side_of(player)
            .map(|side| self.moves[side.index()].is_some())
            .unwrap_or(false)
    }

    /// Lock a move for `player`, resolving the exchange once both are in.
    pub fn submit(&mut self, player: ChannelId, choice: Move) -> Result<Submission, MatchError> {
        let side = self.side_of(player).ok_or(MatchError::NotContestant)?;
        if self.completed {
            return Err(MatchError::Completed);
        }
        if self.moves[side.index()].is_some() {
            return Err(MatchError::AlreadyLocked);
        }

        self.moves[side.index()] = Some(choice);

        let (Some(p1_move), Some(p2_move)) = (self.moves[0], self.moves[1]) else {
            return Ok(Submission::Locked);
        };

        let outcome = resolve(p1_move, p2_move);
        match outcome {
            Outcome::FirstWins => *self.score.get_mut(Side::P1) += 1,
            Outcome::SecondWins => *self.score.get_mut(Side::P2) += 1,
            Outcome::Tie => {}
        }
        self.moves = [None, None];

        if self.score.p1 >= WIN_TARGET || self.score.p2 >= WIN_TARGET {
            let winner = if self.score.p1 > self.score.p2 {
                self.p1
            } else {
                self.p2
            };
            self.completed = true;
            self.winner = Some(winner);
        }

        Ok(Submission::Resolved(Exchange {
            p1_move,
            p2_move,
            outcome,
            score: self.score,
            winner: self.winner,
        }))
    }

    /// Award the match to the opponent of `loser`.
    ///
    /// The winner's score is forced to [`WIN_TARGET`]. Returns the winner, or
    /// `None` if the match was already decided or `loser` is not in it.
    pub fn forfeit(&mut self, loser: ChannelId) -> Option<ChannelId> {
        if self.completed {
            return None;
        }
        let winning_side = self.side_of(loser)?.other();
        let winner = self.contestant(winning_side);

        self.completed = true;
        self.winner = Some(winner);
        self.moves = [None, None];
        *self.score.get_mut(winning_side) = WIN_TARGET;

        Some(winner)
    }
}
