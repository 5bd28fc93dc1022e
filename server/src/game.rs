//! Authoritative session state machine.
//!
//! A session is either waiting for players to ready up (`game_ended == true`)
//! or running a round. All mutations happen on the server's single state
//! owner, so guards like the ready quorum and the stale-winner check are
//! evaluated under the same serialization as the mutations they protect.

use log::info;
use rand::Rng;
use shared::protocol::{PathEvent, Request};
use shared::{Player, PlayerId};
use std::collections::HashMap;

/// Placeholder pool the round word is drawn from. Real word selection lives
/// outside the session core.
pub const WORDS: &[&str] = &[
    "lighthouse",
    "submarine",
    "cactus",
    "windmill",
    "accordion",
    "telescope",
    "snail",
    "volcano",
];

#[derive(Debug, Clone, PartialEq)]
pub enum SessionError {
    /// Join attempted at a full roster; no state change.
    CapacityExceeded,
    /// A request named a player id that is not registered.
    UnknownPlayer(PlayerId),
    /// Winner report for a round that already ended; silently ignored.
    StaleWinner(PlayerId),
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionError::CapacityExceeded => write!(f, "session is full"),
            SessionError::UnknownPlayer(id) => write!(f, "unknown player id '{}'", id),
            SessionError::StaleWinner(id) => {
                write!(f, "winner report for '{}' arrived after round end", id)
            }
        }
    }
}

impl std::error::Error for SessionError {}

/// Session mutations queued by control handlers for the single state owner.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    Join {
        id: PlayerId,
        ip: String,
        name: String,
    },
    Ready {
        id: PlayerId,
        ready: bool,
    },
    Point {
        event: PathEvent,
    },
    Winner {
        id: PlayerId,
    },
    Leave {
        id: PlayerId,
    },
}

impl From<Request> for SessionCommand {
    fn from(request: Request) -> Self {
        match request {
            Request::Join { id, ip, name } => SessionCommand::Join { id, ip, name },
            Request::Ready { id, ready } => SessionCommand::Ready { id, ready },
            Request::Point(event) => SessionCommand::Point { event },
            Request::Winner { id } => SessionCommand::Winner { id },
            Request::Leave { id } => SessionCommand::Leave { id },
        }
    }
}

/// What a ready-flag change led to.
#[derive(Debug, Clone, PartialEq)]
pub enum ReadyOutcome {
    Marked,
    /// This change completed the quorum and started the round.
    RoundStarted { drawer: PlayerId, word: String },
}

/// What removing a player led to.
#[derive(Debug, Clone, PartialEq)]
pub struct LeaveOutcome {
    pub player: Player,
    /// The departing player was the drawer; the round was reset.
    pub round_abandoned: bool,
    /// The departure completed the ready quorum among the remaining players.
    pub round_started: Option<(PlayerId, String)>,
}

#[derive(Debug)]
pub struct GameSession {
    players: HashMap<PlayerId, Player>,
    drawer_id: Option<PlayerId>,
    word: Option<String>,
    winner_id: Option<PlayerId>,
    game_ended: bool,
    max_players: usize,
}

impl GameSession {
    pub fn new(max_players: usize) -> Self {
        Self {
            players: HashMap::new(),
            drawer_id: None,
            word: None,
            winner_id: None,
            game_ended: true,
            max_players,
        }
    }

    /// Registers a player. Re-joining with the same identity is an idempotent
    /// no-op returning the existing entry.
    pub fn join(&mut self, ip: &str, name: &str) -> Result<Player, SessionError> {
        let id = PlayerId::new(ip, name);
        if let Some(existing) = self.players.get(&id) {
            info!("player {} already registered", id);
            return Ok(existing.clone());
        }
        if self.players.len() >= self.max_players {
            return Err(SessionError::CapacityExceeded);
        }

        let player = Player::new(ip, name, self.players.len());
        info!("player {} joined at position {}", player.id, player.position);
        self.players.insert(id, player.clone());
        Ok(player)
    }

    /// Mutates a player's ready flag. The all-ready quorum is checked in the
    /// same step, so two racing ready requests cannot both start a round.
    pub fn set_ready(&mut self, id: &PlayerId, ready: bool) -> Result<ReadyOutcome, SessionError> {
        let player = self
            .players
            .get_mut(id)
            .ok_or_else(|| SessionError::UnknownPlayer(id.clone()))?;
        player.ready = ready;

        if ready && self.game_ended && self.all_ready() {
            let (drawer, word) = self.start_round();
            return Ok(ReadyOutcome::RoundStarted { drawer, word });
        }
        Ok(ReadyOutcome::Marked)
    }

    /// Ends the round. Reports arriving after the round already ended are
    /// stale and leave the state untouched.
    pub fn report_winner(&mut self, id: &PlayerId) -> Result<(), SessionError> {
        if self.game_ended {
            return Err(SessionError::StaleWinner(id.clone()));
        }
        if !self.players.contains_key(id) {
            return Err(SessionError::UnknownPlayer(id.clone()));
        }

        self.winner_id = Some(id.clone());
        self.game_ended = true;
        self.drawer_id = None;
        self.word = None;
        self.clear_ready();
        info!("player {} won the round", id);
        Ok(())
    }

    /// Removes a player, compacting the remaining join-order positions. A
    /// drawer walking out mid-round abandons the round; the departure of the
    /// last not-ready player can complete the quorum.
    pub fn leave(&mut self, id: &PlayerId) -> Result<LeaveOutcome, SessionError> {
        let player = self
            .players
            .remove(id)
            .ok_or_else(|| SessionError::UnknownPlayer(id.clone()))?;
        for other in self.players.values_mut() {
            if other.position > player.position {
                other.position -= 1;
            }
        }
        info!("player {} left", player.id);

        if self.drawer_id.as_ref() == Some(id) {
            self.game_ended = true;
            self.drawer_id = None;
            self.word = None;
            self.winner_id = None;
            self.clear_ready();
            info!("drawer left, round abandoned");
            return Ok(LeaveOutcome {
                player,
                round_abandoned: true,
                round_started: None,
            });
        }

        let round_started = if self.game_ended && self.all_ready() {
            Some(self.start_round())
        } else {
            None
        };
        Ok(LeaveOutcome {
            player,
            round_abandoned: false,
            round_started,
        })
    }

    fn all_ready(&self) -> bool {
        !self.players.is_empty() && self.players.values().all(|p| p.ready)
    }

    fn start_round(&mut self) -> (PlayerId, String) {
        let mut rng = rand::thread_rng();
        let roster = self.players_by_position();
        let drawer = roster[rng.gen_range(0..roster.len())].id.clone();
        let word = WORDS[rng.gen_range(0..WORDS.len())].to_string();

        self.drawer_id = Some(drawer.clone());
        self.word = Some(word.clone());
        self.winner_id = None;
        self.game_ended = false;
        info!("round started, drawer {}", drawer);
        (drawer, word)
    }

    fn clear_ready(&mut self) {
        for player in self.players.values_mut() {
            player.ready = false;
        }
    }

    pub fn player(&self, id: &PlayerId) -> Option<&Player> {
        self.players.get(id)
    }

    /// Roster in join order.
    pub fn players_by_position(&self) -> Vec<&Player> {
        let mut roster: Vec<&Player> = self.players.values().collect();
        roster.sort_by_key(|p| p.position);
        roster
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn game_ended(&self) -> bool {
        self.game_ended
    }

    pub fn drawer_id(&self) -> Option<&PlayerId> {
        self.drawer_id.as_ref()
    }

    pub fn word(&self) -> Option<&str> {
        self.word.as_deref()
    }

    pub fn winner_id(&self) -> Option<&PlayerId> {
        self.winner_id.as_ref()
    }

    pub fn max_players(&self) -> usize {
        self.max_players
    }
}
