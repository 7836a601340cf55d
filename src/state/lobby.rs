//! Lobby state management.
//!
//! A lobby owns one tournament: its roster, the current round's matches and
//! the phase machine that moves it from `waiting` to `finished`. Every
//! operation mutates the lobby synchronously and queues its notifications in
//! an [`Outbox`]; validation failures are returned as [`LobbyError`] and leave
//! the lobby untouched.

use std::collections::HashMap;
use std::fmt;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::bracket;
use super::game::{Match, MatchError, Move, ParseMoveError, Side, Submission};
use super::notify::{
    HostView, MatchSummary, MatchView, Notification, Outbox, PlayerSummary, PlayerView,
    RoundResult, YouView,
};
use super::player::{normalize_name, ChannelId, Player};

/// Length of a lobby code.
pub const CODE_LENGTH: usize = 5;

/// Characters a lobby code is drawn from (no 0/O or 1/I).
pub const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Players needed to start.
pub const MIN_PLAYERS: usize = 2;

/// Lobby lifecycle. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Accepting joins
    #[default]
    Waiting,
    /// Rounds being played
    InProgress,
    /// Champion decided (or nobody left)
    Finished,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Waiting => "waiting",
            Self::InProgress => "in_progress",
            Self::Finished => "finished",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lobby errors.
///
/// The display text is what the offending channel is told.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LobbyError {
    #[error("Lobby not found.")]
    LobbyNotFound,
    #[error("Only the host can do that.")]
    NotAuthorized,
    #[error("Not allowed while the lobby is {0}.")]
    WrongPhase(Phase),
    #[error("Need at least {MIN_PLAYERS} players.")]
    TooFewPlayers,
    #[error("Name already taken in this lobby.")]
    DuplicateName,
    #[error("Enter a nickname.")]
    EmptyName,
    #[error("Invalid move.")]
    InvalidMove,
    #[error("You are not active in this game.")]
    NotActive,
    #[error("You are not in an active match.")]
    NoActiveMatch,
    #[error("Move already locked.")]
    AlreadyLocked,
    #[error("Already in a lobby.")]
    AlreadyInLobby,
}

impl From<MatchError> for LobbyError {
    fn from(err: MatchError) -> Self {
        match err {
            MatchError::AlreadyLocked => Self::AlreadyLocked,
            MatchError::NotContestant | MatchError::Completed => Self::NoActiveMatch,
        }
    }
}

impl From<ParseMoveError> for LobbyError {
    fn from(_: ParseMoveError) -> Self {
        Self::InvalidMove
    }
}

/// An inbound action addressed to an existing lobby.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Start,
    Join { name: String },
    SubmitMove { choice: String },
    Disconnect,
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Join { .. } => "join",
            Self::SubmitMove { .. } => "submit_move",
            Self::Disconnect => "disconnect",
        }
    }
}

/// One tournament.
#[derive(Debug, Clone)]
pub struct Lobby {
    /// Upper-case lobby code
    pub code: String,

    /// Channel that created the lobby
    pub host: ChannelId,

    phase: Phase,

    /// Current round, 0 before the start
    round: u32,

    /// Players indexed by channel
    players: HashMap<ChannelId, Player>,

    /// Channels in join order
    join_order: Vec<ChannelId>,

    /// Matches of the current round only
    matches: Vec<Match>,

    champion: Option<ChannelId>,

    /// Source for bracket shuffles
    rng: StdRng,

    /// When lobby was created
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl Lobby {
    /// Create a lobby whose brackets are drawn from `rng`.
    pub fn with_rng(code: String, host: ChannelId, rng: StdRng) -> Self {
        Self {
            code,
            host,
            phase: Phase::Waiting,
            round: 0,
            players: HashMap::new(),
            join_order: Vec::new(),
            matches: Vec::new(),
            champion: None,
            rng,
            created_at: chrono::Utc::now(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn champion(&self) -> Option<&Player> {
        self.champion.and_then(|id| self.players.get(&id))
    }

    pub fn is_host(&self, channel: ChannelId) -> bool {
        self.host == channel
    }

    pub fn get_player(&self, id: ChannelId) -> Option<&Player> {
        self.players.get(&id)
    }

    pub fn has_player(&self, id: ChannelId) -> bool {
        self.players.contains_key(&id)
    }

    /// Players in join order.
    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.join_order.iter().filter_map(|id| self.players.get(id))
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// Non-eliminated players in join order.
    pub fn survivors(&self) -> Vec<ChannelId> {
        self.players()
            .filter(|p| p.is_active())
            .map(|p| p.id)
            .collect()
    }

    /// Current round's matches.
    pub fn matches(&self) -> &[Match] {
        &self.matches
    }

    /// The unfinished match `player` is in.
    pub fn active_match(&self, player: ChannelId) -> Option<&Match> {
        self.matches.iter().find(|m| m.is_active_for(player))
    }

    fn active_match_index(&self, player: ChannelId) -> Option<usize> {
        self.matches.iter().position(|m| m.is_active_for(player))
    }

    fn set_phase(&mut self, phase: Phase) {
        debug_assert!(phase >= self.phase, "phase went backwards");
        self.phase = phase;
    }

    fn name_of(&self, id: ChannelId) -> String {
        match self.players.get(&id) {
            Some(player) => player.name.clone(),
            None => {
                warn!(code = %self.code, player = id, "match references unknown player");
                debug_assert!(false, "match references unknown player {id}");
                "Unknown".to_string()
            }
        }
    }

    /// Apply an inbound action from `channel`.
    pub fn apply(
        &mut self,
        channel: ChannelId,
        action: Action,
        out: &mut Outbox,
    ) -> Result<(), LobbyError> {
        match action {
            Action::Start => self.start(channel, out),
            Action::Join { name } => self.join(channel, &name, out),
            Action::SubmitMove { choice } => self.submit_move(channel, &choice, out),
            Action::Disconnect => {
                self.disconnect(channel, out);
                Ok(())
            }
        }
    }

    /// Add a player while the lobby is waiting.
    pub fn join(
        &mut self,
        channel: ChannelId,
        raw_name: &str,
        out: &mut Outbox,
    ) -> Result<(), LobbyError> {
        if self.phase != Phase::Waiting {
            return Err(LobbyError::WrongPhase(self.phase));
        }
        let name = normalize_name(raw_name).ok_or(LobbyError::EmptyName)?;
        if self.is_host(channel) || self.has_player(channel) {
            return Err(LobbyError::AlreadyInLobby);
        }
        if self.players.values().any(|p| p.has_name(&name)) {
            return Err(LobbyError::DuplicateName);
        }

        info!(code = %self.code, player = channel, %name, "player joined");
        self.players.insert(channel, Player::new(channel, name.clone()));
        self.join_order.push(channel);

        out.send(
            channel,
            Notification::Joined {
                code: self.code.clone(),
                name,
            },
        );
        self.broadcast(out);
        Ok(())
    }

    /// Start the tournament. Host only.
    pub fn start(&mut self, channel: ChannelId, out: &mut Outbox) -> Result<(), LobbyError> {
        if !self.is_host(channel) {
            return Err(LobbyError::NotAuthorized);
        }
        if self.phase != Phase::Waiting {
            return Err(LobbyError::WrongPhase(self.phase));
        }
        if self.players.len() < MIN_PLAYERS {
            return Err(LobbyError::TooFewPlayers);
        }

        info!(code = %self.code, players = self.players.len(), "tournament started");
        self.set_phase(Phase::InProgress);
        self.start_next_round(out);
        Ok(())
    }

    /// Lock a move for `channel` in their current match.
    pub fn submit_move(
        &mut self,
        channel: ChannelId,
        raw_move: &str,
        out: &mut Outbox,
    ) -> Result<(), LobbyError> {
        if self.phase != Phase::InProgress {
            return Err(LobbyError::WrongPhase(self.phase));
        }
        let choice = raw_move.parse::<Move>()?;
        match self.players.get(&channel) {
            Some(player) if player.is_active() => {}
            _ => return Err(LobbyError::NotActive),
        }
        let index = self
            .active_match_index(channel)
            .ok_or(LobbyError::NoActiveMatch)?;

        let submission = self.matches[index].submit(channel, choice)?;
        let exchange = match submission {
            Submission::Locked => {
                debug!(code = %self.code, player = channel, "move locked");
                self.broadcast_statuses(out);
                return Ok(());
            }
            Submission::Resolved(exchange) => exchange,
        };

        let m = &self.matches[index];
        let (p1, p2, match_id) = (m.p1, m.p2, m.id.clone());
        debug!(
            code = %self.code,
            match_id = %match_id,
            p1_move = %exchange.p1_move,
            p2_move = %exchange.p2_move,
            score = ?exchange.score,
            "exchange resolved"
        );

        for side in [Side::P1, Side::P2] {
            let to = if side == Side::P1 { p1 } else { p2 };
            out.send(
                to,
                Notification::RoundResult(RoundResult {
                    your_move: exchange.move_of(side),
                    opponent_move: exchange.move_of(side.other()),
                    your_score: exchange.score.get(side),
                    opponent_score: exchange.score.get(side.other()),
                }),
            );
        }

        if let (Some(winner), Some(loser)) = (exchange.winner, self.matches[index].loser()) {
            if let Some(player) = self.players.get_mut(&loser) {
                player.eliminate();
            }
            info!(code = %self.code, match_id = %match_id, winner, loser, "match decided");

            out.message(winner, "You won this match.");
            out.message(loser, "You were eliminated.");
            self.broadcast(out);
            out.schedule_advance(self.round);
            return Ok(());
        }

        self.broadcast(out);
        Ok(())
    }

    /// Handle a player's channel going away.
    ///
    /// Before the start the player simply leaves. Afterwards they stay on the
    /// roster as disconnected and forfeit any match in progress. The host's
    /// own disconnect closes the lobby and is handled by its owner.
    pub fn disconnect(&mut self, channel: ChannelId, out: &mut Outbox) {
        if self.phase == Phase::Waiting {
            if self.players.remove(&channel).is_some() {
                info!(code = %self.code, player = channel, "player left before start");
                self.join_order.retain(|id| *id != channel);
                self.broadcast(out);
            }
            return;
        }

        let Some(player) = self.players.get_mut(&channel) else {
            return;
        };
        player.mark_disconnected();
        info!(code = %self.code, player = channel, "player disconnected");
        if !self.forfeit(channel, "Opponent disconnected. You advance.", out) {
            self.broadcast_host(out);
        }
    }

    /// Award `loser`'s active match to their opponent.
    ///
    /// Returns `false` when the player had no match in progress.
    fn forfeit(&mut self, loser: ChannelId, reason: &str, out: &mut Outbox) -> bool {
        if !self.award_forfeit(loser, reason, out) {
            return false;
        }
        self.broadcast(out);
        self.maybe_advance(out);
        true
    }

    fn award_forfeit(&mut self, loser: ChannelId, reason: &str, out: &mut Outbox) -> bool {
        let Some(index) = self.active_match_index(loser) else {
            return false;
        };
        let Some(winner) = self.matches[index].forfeit(loser) else {
            return false;
        };
        if let Some(player) = self.players.get_mut(&loser) {
            player.eliminate();
        }
        info!(
            code = %self.code,
            match_id = %self.matches[index].id,
            winner,
            loser,
            "match forfeited"
        );
        out.message(winner, reason);
        true
    }

    /// Start the next round once every match of the current one is decided.
    pub fn maybe_advance(&mut self, out: &mut Outbox) {
        if self.phase != Phase::InProgress {
            return;
        }
        if self.matches.iter().any(|m| !m.completed) {
            return;
        }
        if self.survivors().len() <= 1 {
            self.finish(out);
        } else {
            self.start_next_round(out);
        }
    }

    /// Deferred advancement check for `round`.
    ///
    /// Ignored when the lobby has already moved past that round.
    pub fn advance_check(&mut self, round: u32, out: &mut Outbox) {
        if round != self.round {
            debug!(code = %self.code, round, current = self.round, "stale advancement check");
            return;
        }
        self.maybe_advance(out);
    }

    fn start_next_round(&mut self, out: &mut Outbox) {
        self.round += 1;
        self.matches.clear();

        let survivors = self.survivors();
        if survivors.len() <= 1 {
            self.finish(out);
            return;
        }

        let bracket = bracket::pair(survivors, self.round, &mut self.rng);
        info!(
            code = %self.code,
            round = self.round,
            matches = bracket.matches.len(),
            bye = ?bracket.bye,
            "round started"
        );

        if let Some(bye) = bracket.bye {
            out.message(bye, "You got a bye this round.");
        }
        for m in &bracket.matches {
            out.message(m.p1, format!("Match start vs {}", self.name_of(m.p2)));
            out.message(m.p2, format!("Match start vs {}", self.name_of(m.p1)));
        }
        self.matches = bracket.matches;

        // A contestant who already left can never move.
        let absent: Vec<ChannelId> = self
            .matches
            .iter()
            .flat_map(|m| [m.p2, m.p1])
            .filter(|id| self.players.get(id).map_or(false, |p| !p.connected))
            .collect();
        for id in absent {
            self.award_forfeit(id, "Opponent disconnected. You advance.", out);
        }

        self.broadcast(out);
        self.maybe_advance(out);
    }

    fn finish(&mut self, out: &mut Outbox) {
        self.champion = self.survivors().first().copied();
        self.set_phase(Phase::Finished);
        info!(
            code = %self.code,
            round = self.round,
            champion = ?self.champion().map(|p| p.name.as_str()),
            "tournament finished"
        );
        self.broadcast(out);
    }

    /// Tell every player the lobby is gone.
    pub fn close(&self, reason: &str, out: &mut Outbox) {
        info!(code = %self.code, players = self.players.len(), "lobby closed");
        for id in &self.join_order {
            out.send(*id, Notification::Closed(reason.to_string()));
        }
    }

    /// Snapshot for the host.
    pub fn host_view(&self) -> HostView {
        let players = self
            .players()
            .map(|p| PlayerSummary {
                name: p.name.clone(),
                eliminated: p.eliminated,
                connected: p.connected,
            })
            .collect();

        let matches = self
            .matches
            .iter()
            .map(|m| MatchSummary {
                id: m.id.clone(),
                round: m.round,
                p1: self.name_of(m.p1),
                p2: self.name_of(m.p2),
                score: m.score,
                completed: m.completed,
                winner: m.winner.map(|id| self.name_of(id)),
            })
            .collect();

        HostView {
            code: self.code.clone(),
            phase: self.phase,
            round: self.round,
            champion: self.champion().map(|p| p.name.clone()),
            players,
            matches,
            created_at: self.created_at,
        }
    }

    /// Snapshot for one player.
    pub fn player_view(&self, id: ChannelId) -> Option<PlayerView> {
        let player = self.players.get(&id)?;

        let current_match = self.active_match(id).and_then(|m| {
            let side = m.side_of(id)?;
            let opponent = m.contestant(side.other());
            Some(MatchView {
                id: m.id.clone(),
                opponent: self.name_of(opponent),
                your_score: m.score.get(side),
                opponent_score: m.score.get(side.other()),
                you_locked: m.is_locked(id),
                opponent_locked: m.is_locked(opponent),
            })
        });

        Some(PlayerView {
            code: self.code.clone(),
            phase: self.phase,
            round: self.round,
            you: YouView {
                name: player.name.clone(),
                eliminated: player.eliminated,
            },
            champion: self.champion().map(|p| p.name.clone()),
            current_match,
        })
    }

    fn broadcast_host(&self, out: &mut Outbox) {
        out.send(self.host, Notification::LobbyState(self.host_view()));
    }

    fn broadcast_statuses(&self, out: &mut Outbox) {
        for id in &self.join_order {
            if let Some(view) = self.player_view(*id) {
                out.send(*id, Notification::Status(view));
            }
        }
    }

    /// Queue the host snapshot and every player's status.
    pub fn broadcast(&self, out: &mut Outbox) {
        self.broadcast_host(out);
        self.broadcast_statuses(out);
    }
}

/// Canonical form of a user-supplied lobby code.
pub fn canonical_code(raw: &str) -> String {
    raw.trim().to_uppercase()
}

/// Draw a random lobby code.
pub fn generate_code<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..CODE_LENGTH)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

/// Lobby registry - code to lobby.
///
/// Generic over the entry so the same table can hold lobbies directly or
/// handles to lobbies owned elsewhere.
#[derive(Debug)]
pub struct LobbyRegistry<T = Lobby> {
    /// Entries by upper-case code
    lobbies: HashMap<String, T>,

    /// Code source
    rng: StdRng,
}

impl<T> Default for LobbyRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> LobbyRegistry<T> {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    pub fn with_rng(rng: StdRng) -> Self {
        Self {
            lobbies: HashMap::new(),
            rng,
        }
    }

    /// Pick an unused code and insert the entry built for it.
    pub fn create_with(&mut self, make: impl FnOnce(&str) -> T) -> String {
        let code = loop {
            let code = generate_code(&mut self.rng);
            if !self.lobbies.contains_key(&code) {
                break code;
            }
        };
        let entry = make(&code);
        self.lobbies.insert(code.clone(), entry);
        code
    }

    /// Derive a fresh RNG for a new lobby's brackets.
    pub fn fork_rng(&mut self) -> StdRng {
        StdRng::seed_from_u64(self.rng.gen())
    }

    /// Look up by code (case-insensitive).
    pub fn get(&self, code: &str) -> Option<&T> {
        self.lobbies.get(&canonical_code(code))
    }

    pub fn get_mut(&mut self, code: &str) -> Option<&mut T> {
        self.lobbies.get_mut(&canonical_code(code))
    }

    pub fn contains(&self, code: &str) -> bool {
        self.lobbies.contains_key(&canonical_code(code))
    }

    /// Remove an entry. Idempotent.
    pub fn remove(&mut self, code: &str) -> Option<T> {
        self.lobbies.remove(&canonical_code(code))
    }

    pub fn len(&self) -> usize {
        self.lobbies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lobbies.is_empty()
    }

    pub fn codes(&self) -> impl Iterator<Item = &String> {
        self.lobbies.keys()
    }
}

impl LobbyRegistry<Lobby> {
    /// Create a waiting lobby hosted by `host`. Returns its code.
    pub fn create(&mut self, host: ChannelId, out: &mut Outbox) -> String {
        let rng = self.fork_rng();
        let code = self.create_with(|code| Lobby::with_rng(code.to_string(), host, rng));
        info!(%code, host, "lobby created");
        if let Some(lobby) = self.lobbies.get(&code) {
            lobby.broadcast(out);
        }
        code
    }

    /// Remove a lobby and tell its players. Returns `false` if it was
    /// already gone.
    pub fn close(&mut self, code: &str, reason: &str, out: &mut Outbox) -> bool {
        match self.remove(code) {
            Some(lobby) => {
                lobby.close(reason, out);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::game::WIN_TARGET;
    use pretty_assertions::assert_eq;

    const HOST: ChannelId = 100;

    fn make_lobby(seed: u64) -> Lobby {
        Lobby::with_rng("ABCDE".to_string(), HOST, StdRng::seed_from_u64(seed))
    }

    fn lobby_with(players: &[(ChannelId, &str)], seed: u64) -> Lobby {
        let mut lobby = make_lobby(seed);
        let mut out = Outbox::new();
        for (id, name) in players {
            lobby.join(*id, name, &mut out).unwrap();
        }
        lobby
    }

    /// Play paper against rock until `winner` takes their match.
    fn win_match(lobby: &mut Lobby, winner: ChannelId, out: &mut Outbox) {
        let loser = lobby
            .active_match(winner)
            .and_then(|m| m.opponent_of(winner))
            .expect("winner has an active match");
        for _ in 0..WIN_TARGET {
            lobby.submit_move(winner, "paper", out).unwrap();
            lobby.submit_move(loser, "rock", out).unwrap();
        }
    }

    fn round_results(out: &Outbox, channel: ChannelId) -> Vec<RoundResult> {
        out.for_channel(channel)
            .filter_map(|n| match n {
                Notification::RoundResult(r) => Some(*r),
                _ => None,
            })
            .collect()
    }

    fn messages(out: &Outbox, channel: ChannelId) -> Vec<String> {
        out.for_channel(channel)
            .filter_map(|n| match n {
                Notification::Message(text) => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_lobby_new() {
        let lobby = make_lobby(0);
        assert_eq!(lobby.phase(), Phase::Waiting);
        assert_eq!(lobby.round(), 0);
        assert_eq!(lobby.player_count(), 0);
        assert!(lobby.champion().is_none());
    }

    #[test]
    fn test_join() {
        let mut lobby = make_lobby(0);
        let mut out = Outbox::new();

        lobby.join(1, "  Ann ", &mut out).unwrap();

        assert_eq!(lobby.get_player(1).unwrap().name, "Ann");
        assert_eq!(
            out.for_channel(1).next(),
            Some(&Notification::Joined {
                code: "ABCDE".to_string(),
                name: "Ann".to_string()
            })
        );
        assert!(out
            .for_channel(HOST)
            .any(|n| matches!(n, Notification::LobbyState(v) if v.players.len() == 1)));
    }

    #[test]
    fn test_join_duplicate_name() {
        let mut lobby = make_lobby(0);
        let mut out = Outbox::new();

        lobby.join(1, "ann", &mut out).unwrap();
        assert_eq!(lobby.join(2, "Ann", &mut out), Err(LobbyError::DuplicateName));
        assert_eq!(lobby.player_count(), 1);
    }

    #[test]
    fn test_join_validation() {
        let mut lobby = make_lobby(0);
        let mut out = Outbox::new();

        assert_eq!(lobby.join(1, "   ", &mut out), Err(LobbyError::EmptyName));
        assert_eq!(lobby.join(HOST, "Host", &mut out), Err(LobbyError::AlreadyInLobby));

        lobby.join(1, "Ann", &mut out).unwrap();
        assert_eq!(lobby.join(1, "Again", &mut out), Err(LobbyError::AlreadyInLobby));
    }

    #[test]
    fn test_join_after_start() {
        let mut lobby = lobby_with(&[(1, "Ann"), (2, "Bob")], 0);
        let mut out = Outbox::new();
        lobby.start(HOST, &mut out).unwrap();

        assert_eq!(
            lobby.join(3, "Cid", &mut out),
            Err(LobbyError::WrongPhase(Phase::InProgress))
        );
    }

    #[test]
    fn test_start_errors() {
        let mut lobby = lobby_with(&[(1, "Ann")], 0);
        let mut out = Outbox::new();

        assert_eq!(lobby.start(1, &mut out), Err(LobbyError::NotAuthorized));
        assert_eq!(lobby.start(HOST, &mut out), Err(LobbyError::TooFewPlayers));
        assert!(out.is_empty());

        lobby.join(2, "Bob", &mut out).unwrap();
        lobby.start(HOST, &mut out).unwrap();
        assert_eq!(
            lobby.start(HOST, &mut out),
            Err(LobbyError::WrongPhase(Phase::InProgress))
        );
    }

    #[test]
    fn test_two_player_tournament() {
        let mut lobby = lobby_with(&[(1, "Ann"), (2, "Bob")], 5);
        let mut out = Outbox::new();

        lobby.start(HOST, &mut out).unwrap();
        assert_eq!(lobby.phase(), Phase::InProgress);
        assert_eq!(lobby.round(), 1);
        assert_eq!(lobby.matches().len(), 1);

        let mut out = Outbox::new();
        lobby.submit_move(1, "rock", &mut out).unwrap();
        lobby.submit_move(2, "scissors", &mut out).unwrap();

        assert_eq!(
            round_results(&out, 1),
            vec![RoundResult {
                your_move: Move::Rock,
                opponent_move: Move::Scissors,
                your_score: 1,
                opponent_score: 0,
            }]
        );
        assert_eq!(
            round_results(&out, 2),
            vec![RoundResult {
                your_move: Move::Scissors,
                opponent_move: Move::Rock,
                your_score: 0,
                opponent_score: 1,
            }]
        );
        assert_eq!(out.take_scheduled_advance(), None);

        let mut out = Outbox::new();
        lobby.submit_move(1, "paper", &mut out).unwrap();
        lobby.submit_move(2, "rock", &mut out).unwrap();

        let m = &lobby.matches()[0];
        assert!(m.completed);
        assert_eq!(m.winner, Some(1));
        assert!(lobby.get_player(2).unwrap().eliminated);
        assert_eq!(messages(&out, 1), vec!["You won this match."]);
        assert_eq!(messages(&out, 2), vec!["You were eliminated."]);

        // Advancement waits for the presentation delay.
        assert_eq!(lobby.phase(), Phase::InProgress);
        let round = out.take_scheduled_advance().unwrap();

        let mut out = Outbox::new();
        lobby.advance_check(round, &mut out);

        assert_eq!(lobby.phase(), Phase::Finished);
        assert_eq!(lobby.champion().unwrap().name, "Ann");
        assert!(lobby.matches().iter().all(|m| m.completed));
        let view = lobby.player_view(2).unwrap();
        assert_eq!(view.champion.as_deref(), Some("Ann"));
        assert!(view.you.eliminated);
    }

    #[test]
    fn test_move_validation() {
        let mut lobby = lobby_with(&[(1, "Ann"), (2, "Bob"), (3, "Cid")], 11);
        let mut out = Outbox::new();

        assert_eq!(
            lobby.submit_move(1, "rock", &mut out),
            Err(LobbyError::WrongPhase(Phase::Waiting))
        );

        lobby.start(HOST, &mut out).unwrap();
        let bye = (1..=3).find(|id| lobby.active_match(*id).is_none()).unwrap();
        let playing = (1..=3).find(|id| *id != bye).unwrap();

        assert_eq!(lobby.submit_move(playing, "lizard", &mut out), Err(LobbyError::InvalidMove));
        assert_eq!(lobby.submit_move(HOST, "rock", &mut out), Err(LobbyError::NotActive));
        assert_eq!(lobby.submit_move(bye, "rock", &mut out), Err(LobbyError::NoActiveMatch));

        lobby.submit_move(playing, "rock", &mut out).unwrap();
        assert_eq!(
            lobby.submit_move(playing, "paper", &mut out),
            Err(LobbyError::AlreadyLocked)
        );
    }

    #[test]
    fn test_status_shows_locks() {
        let mut lobby = lobby_with(&[(1, "Ann"), (2, "Bob")], 2);
        let mut out = Outbox::new();
        lobby.start(HOST, &mut out).unwrap();

        lobby.submit_move(1, "rock", &mut out).unwrap();

        let mine = lobby.player_view(1).unwrap().current_match.unwrap();
        let theirs = lobby.player_view(2).unwrap().current_match.unwrap();
        assert!(mine.you_locked && !mine.opponent_locked);
        assert!(!theirs.you_locked && theirs.opponent_locked);
        assert_eq!(theirs.opponent, "Ann");
    }

    #[test]
    fn test_bye_with_odd_count() {
        let mut lobby = lobby_with(&[(1, "Ann"), (2, "Bob"), (3, "Cid")], 9);
        let mut out = Outbox::new();
        lobby.start(HOST, &mut out).unwrap();

        assert_eq!(lobby.matches().len(), 1);
        let bye = (1..=3).find(|id| lobby.active_match(*id).is_none()).unwrap();
        assert_eq!(messages(&out, bye), vec!["You got a bye this round."]);
        assert!(!lobby.get_player(bye).unwrap().eliminated);
    }

    #[test]
    fn test_advance_only_after_last_match() {
        let mut lobby = lobby_with(&[(1, "Ann"), (2, "Bob"), (3, "Cid"), (4, "Dee")], 21);
        let mut out = Outbox::new();
        lobby.start(HOST, &mut out).unwrap();
        assert_eq!(lobby.matches().len(), 2);

        let first = lobby.matches()[0].p1;
        let second = lobby.matches()[1].p2;

        let mut out = Outbox::new();
        win_match(&mut lobby, first, &mut out);
        let round = out.take_scheduled_advance().unwrap();
        lobby.advance_check(round, &mut out);
        assert_eq!(lobby.round(), 1, "one match still running");

        let mut out = Outbox::new();
        win_match(&mut lobby, second, &mut out);
        lobby.advance_check(out.take_scheduled_advance().unwrap(), &mut out);
        assert_eq!(lobby.round(), 2);
        assert_eq!(lobby.matches().len(), 1);
        let final_match = &lobby.matches()[0];
        assert!(final_match.has_player(first) && final_match.has_player(second));

        // A second check for round 1 is stale.
        lobby.advance_check(round, &mut out);
        assert_eq!(lobby.round(), 2);
    }

    #[test]
    fn test_forfeit_on_disconnect() {
        let mut lobby = lobby_with(&[(1, "Ann"), (2, "Bob")], 4);
        let mut out = Outbox::new();
        lobby.start(HOST, &mut out).unwrap();
        lobby.submit_move(2, "rock", &mut out).unwrap();

        let mut out = Outbox::new();
        lobby.disconnect(2, &mut out);

        let bob = lobby.get_player(2).unwrap();
        assert!(bob.eliminated);
        assert!(!bob.connected);
        assert_eq!(messages(&out, 1), vec!["Opponent disconnected. You advance."]);

        // Forfeit advances immediately.
        assert_eq!(lobby.phase(), Phase::Finished);
        assert_eq!(lobby.champion().unwrap().name, "Ann");
        let host = lobby.host_view();
        assert!(!host.players[1].connected);
    }

    #[test]
    fn test_forfeit_forces_winner_score() {
        let mut lobby = lobby_with(&[(1, "Ann"), (2, "Bob"), (3, "Cid"), (4, "Dee")], 8);
        let mut out = Outbox::new();
        lobby.start(HOST, &mut out).unwrap();

        let leaver = lobby.matches()[0].p1;
        let winner = lobby.matches()[0].p2;
        lobby.disconnect(leaver, &mut out);

        let m = &lobby.matches()[0];
        assert!(m.completed);
        assert_eq!(m.winner, Some(winner));
        assert_eq!(m.score.p2, WIN_TARGET);
        assert_eq!(lobby.round(), 1);
    }

    #[test]
    fn test_disconnect_while_waiting_removes_player() {
        let mut lobby = lobby_with(&[(1, "Ann"), (2, "Bob")], 0);
        let mut out = Outbox::new();

        lobby.disconnect(1, &mut out);

        assert!(!lobby.has_player(1));
        assert_eq!(lobby.players().map(|p| p.id).collect::<Vec<_>>(), vec![2]);
        // The name is free again.
        lobby.join(3, "Ann", &mut out).unwrap();
    }

    #[test]
    fn test_disconnect_without_match_keeps_standing() {
        let mut lobby = lobby_with(&[(1, "Ann"), (2, "Bob"), (3, "Cid")], 9);
        let mut out = Outbox::new();
        lobby.start(HOST, &mut out).unwrap();
        let bye = (1..=3).find(|id| lobby.active_match(*id).is_none()).unwrap();

        lobby.disconnect(bye, &mut out);

        let player = lobby.get_player(bye).unwrap();
        assert!(!player.connected);
        assert!(!player.eliminated);
    }

    #[test]
    fn test_absent_player_forfeits_next_round() {
        let mut lobby = lobby_with(&[(1, "Ann"), (2, "Bob"), (3, "Cid")], 9);
        let mut out = Outbox::new();
        lobby.start(HOST, &mut out).unwrap();
        let bye = (1..=3).find(|id| lobby.active_match(*id).is_none()).unwrap();
        let winner = lobby.matches()[0].p1;

        lobby.disconnect(bye, &mut out);

        let mut out = Outbox::new();
        win_match(&mut lobby, winner, &mut out);
        lobby.advance_check(out.take_scheduled_advance().unwrap(), &mut out);

        // Round 2 pairs the absent player, who forfeits on the spot.
        assert_eq!(lobby.phase(), Phase::Finished);
        assert_eq!(lobby.round(), 2);
        assert_eq!(lobby.champion().unwrap().id, winner);
        assert!(lobby.get_player(bye).unwrap().eliminated);
    }

    #[test]
    fn test_apply_dispatch() {
        let mut lobby = make_lobby(3);
        let mut out = Outbox::new();

        lobby
            .apply(1, Action::Join { name: "Ann".into() }, &mut out)
            .unwrap();
        lobby
            .apply(2, Action::Join { name: "Bob".into() }, &mut out)
            .unwrap();
        assert_eq!(lobby.apply(1, Action::Start, &mut out), Err(LobbyError::NotAuthorized));
        lobby.apply(HOST, Action::Start, &mut out).unwrap();
        lobby
            .apply(1, Action::SubmitMove { choice: "ROCK".into() }, &mut out)
            .unwrap();
        lobby.apply(2, Action::Disconnect, &mut out).unwrap();

        assert_eq!(lobby.phase(), Phase::Finished);
        assert_eq!(Action::Disconnect.name(), "disconnect");
    }

    #[test]
    fn test_host_view() {
        let mut lobby = lobby_with(&[(1, "Ann"), (2, "Bob")], 6);
        let mut out = Outbox::new();
        lobby.start(HOST, &mut out).unwrap();

        let view = lobby.host_view();
        assert_eq!(view.code, "ABCDE");
        assert_eq!(view.phase, Phase::InProgress);
        assert_eq!(view.round, 1);
        assert_eq!(view.matches.len(), 1);
        assert_eq!(view.matches[0].id, "1-1");
        assert!(view.champion.is_none());

        let names: Vec<&str> = view.players.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Ann", "Bob"]);
    }

    #[test]
    fn test_close_notifies_players() {
        let lobby = lobby_with(&[(1, "Ann"), (2, "Bob")], 0);
        let mut out = Outbox::new();

        lobby.close("Host disconnected. Lobby closed.", &mut out);

        assert_eq!(out.len(), 2);
        assert!(out.for_channel(HOST).next().is_none());
        assert!(matches!(
            out.for_channel(1).next(),
            Some(Notification::Closed(reason)) if reason.starts_with("Host disconnected")
        ));
    }

    #[test]
    fn test_generate_code() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..100 {
            let code = generate_code(&mut rng);
            assert_eq!(code.len(), CODE_LENGTH);
            assert!(code.bytes().all(|b| CODE_ALPHABET.contains(&b)));
            assert!(!code.contains('O') && !code.contains('0') && !code.contains('I'));
        }
    }

    #[test]
    fn test_registry_create_lookup() {
        let mut registry: LobbyRegistry = LobbyRegistry::with_rng(StdRng::seed_from_u64(1));
        let mut out = Outbox::new();

        let code = registry.create(HOST, &mut out);

        assert_eq!(registry.len(), 1);
        assert!(registry.get(&code).is_some());
        assert!(registry.get(&code.to_lowercase()).is_some()); // Case insensitive
        assert!(registry.get(&format!("  {} ", code)).is_some());

        let lobby = registry.get(&code).unwrap();
        assert_eq!(lobby.phase(), Phase::Waiting);
        assert_eq!(lobby.host, HOST);
        assert!(matches!(out.for_channel(HOST).next(), Some(Notification::LobbyState(_))));
    }

    #[test]
    fn test_registry_codes_unique() {
        let mut registry: LobbyRegistry<()> = LobbyRegistry::with_rng(StdRng::seed_from_u64(2));
        for _ in 0..500 {
            registry.create_with(|_| ());
        }
        assert_eq!(registry.len(), 500);
        assert!(registry
            .codes()
            .all(|code| code.len() == CODE_LENGTH && *code == canonical_code(code)));
    }

    #[test]
    fn test_registry_close_idempotent() {
        let mut registry: LobbyRegistry = LobbyRegistry::with_rng(StdRng::seed_from_u64(3));
        let mut out = Outbox::new();
        let code = registry.create(HOST, &mut out);
        registry
            .get_mut(&code)
            .unwrap()
            .join(1, "Ann", &mut out)
            .unwrap();

        let mut out = Outbox::new();
        assert!(registry.close(&code, "Lobby closed.", &mut out));
        assert_eq!(
            out.for_channel(1).collect::<Vec<_>>(),
            vec![&Notification::Closed("Lobby closed.".to_string())]
        );
        assert!(registry.get(&code).is_none());

        assert!(!registry.close(&code, "Lobby closed.", &mut out));
        assert!(registry.is_empty());
    }
}
