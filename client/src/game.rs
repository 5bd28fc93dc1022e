//! Client-side replica of the session state.
//!
//! The mirror is updated only by broadcast-channel handlers (plus the one
//! local self-insert at startup), never by local speculation; a control reply
//! and the broadcast confirming the same change may arrive in either order,
//! and both paths converge here.

use log::{info, warn};
use shared::protocol::PathEvent;
use shared::{Player, PlayerId};
use std::collections::HashMap;

#[derive(Debug)]
pub struct ClientGameState {
    players: HashMap<PlayerId, Player>,
    local_id: Option<PlayerId>,
    drawer_id: Option<PlayerId>,
    word: Option<String>,
    winner_id: Option<PlayerId>,
    game_ended: bool,
    /// Replayable history of everything drawn this round, built from
    /// broadcast points.
    canvas: Vec<PathEvent>,
}

impl ClientGameState {
    pub fn new() -> Self {
        Self {
            players: HashMap::new(),
            local_id: None,
            drawer_id: None,
            word: None,
            winner_id: None,
            game_ended: true,
            canvas: Vec::new(),
        }
    }

    /// Inserts the local player before any broadcast can mention them. The
    /// join broadcast echo later hits [`add_player`] and is absorbed.
    ///
    /// [`add_player`]: Self::add_player
    pub fn register_local_player(&mut self, ip: &str, name: &str) -> Player {
        let player = Player::new(ip, name, self.players.len());
        self.local_id = Some(player.id.clone());
        self.players.insert(player.id.clone(), player.clone());
        player
    }

    /// Adds a remote player. Returns the new entry, or `None` if the id was
    /// already known (own join echo, duplicate broadcast).
    pub fn add_player(&mut self, id: PlayerId, ip: String, name: String) -> Option<Player> {
        if self.players.contains_key(&id) {
            return None;
        }
        let player = Player {
            id: id.clone(),
            ip,
            name,
            ready: false,
            position: self.players.len(),
            points: 0,
        };
        info!("player {} joined the session", player.id);
        self.players.insert(id, player.clone());
        Some(player)
    }

    pub fn set_ready(&mut self, id: &PlayerId) {
        match self.players.get_mut(id) {
            Some(player) => player.ready = true,
            None => warn!("ready broadcast for unknown player {}", id),
        }
    }

    /// Begins a round: new drawer and word, fresh canvas.
    pub fn start_round(&mut self, drawer: PlayerId, word: String) {
        info!("round started, drawer {}", drawer);
        self.drawer_id = Some(drawer);
        self.word = Some(word);
        self.winner_id = None;
        self.game_ended = false;
        self.canvas.clear();
    }

    /// Ends the round. Returns false for a stale winner broadcast arriving
    /// after the round already ended.
    pub fn set_winner(&mut self, id: PlayerId) -> bool {
        if self.game_ended {
            warn!("winner broadcast for {} after round end, ignored", id);
            return false;
        }
        info!("player {} won the round", id);
        self.winner_id = Some(id);
        self.game_ended = true;
        self.drawer_id = None;
        self.word = None;
        for player in self.players.values_mut() {
            player.ready = false;
        }
        true
    }

    /// Removes a departed player. Returns whether they were the drawer, in
    /// which case the round is reset like the server's.
    pub fn remove_player(&mut self, id: &PlayerId) -> bool {
        let Some(player) = self.players.remove(id) else {
            warn!("leave broadcast for unknown player {}", id);
            return false;
        };
        for other in self.players.values_mut() {
            if other.position > player.position {
                other.position -= 1;
            }
        }
        info!("player {} left the session", player.id);

        if self.drawer_id.as_ref() == Some(id) {
            self.game_ended = true;
            self.drawer_id = None;
            self.word = None;
            self.winner_id = None;
            for other in self.players.values_mut() {
                other.ready = false;
            }
            return true;
        }
        false
    }

    pub fn append_point(&mut self, event: PathEvent) {
        self.canvas.push(event);
    }

    pub fn is_drawer(&self) -> bool {
        self.local_id.is_some() && self.local_id == self.drawer_id
    }

    pub fn local_id(&self) -> Option<&PlayerId> {
        self.local_id.as_ref()
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

    pub fn game_ended(&self) -> bool {
        self.game_ended
    }

    pub fn player(&self, id: &PlayerId) -> Option<&Player> {
        self.players.get(id)
    }

    pub fn players_by_position(&self) -> Vec<&Player> {
        let mut roster: Vec<&Player> = self.players.values().collect();
        roster.sort_by_key(|p| p.position);
        roster
    }

    pub fn canvas(&self) -> &[PathEvent] {
        &self.canvas
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}

impl Default for ClientGameState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mirror_with_two_players() -> (ClientGameState, PlayerId, PlayerId) {
        let mut mirror = ClientGameState::new();
        let me = mirror.register_local_player("10.0.0.1", "me").id;
        let other = PlayerId::new("10.0.0.2", "other");
        mirror.add_player(other.clone(), "10.0.0.2".to_string(), "other".to_string());
        (mirror, me, other)
    }

    #[test]
    fn test_local_player_registration() {
        let mut mirror = ClientGameState::new();
        let player = mirror.register_local_player("10.0.0.1", "me");
        assert_eq!(mirror.local_id(), Some(&player.id));
        assert_eq!(mirror.len(), 1);
        assert!(mirror.game_ended());
    }

    #[test]
    fn test_own_join_echo_is_absorbed() {
        let (mut mirror, me, _) = mirror_with_two_players();
        let echo = mirror.add_player(me.clone(), "10.0.0.1".to_string(), "me".to_string());
        assert!(echo.is_none());
        assert_eq!(mirror.len(), 2);
    }

    #[test]
    fn test_ready_marks_player() {
        let (mut mirror, _, other) = mirror_with_two_players();
        mirror.set_ready(&other);
        assert!(mirror.player(&other).unwrap().ready);
    }

    #[test]
    fn test_round_start_sets_drawer_and_clears_canvas() {
        let (mut mirror, me, _) = mirror_with_two_players();
        mirror.append_point(PathEvent::Point { x: 1.0, y: 1.0 });

        mirror.start_round(me.clone(), "cactus".to_string());
        assert!(!mirror.game_ended());
        assert!(mirror.is_drawer());
        assert_eq!(mirror.word(), Some("cactus"));
        assert!(mirror.canvas().is_empty());
    }

    #[test]
    fn test_winner_resets_round_state() {
        let (mut mirror, me, other) = mirror_with_two_players();
        mirror.set_ready(&me);
        mirror.set_ready(&other);
        mirror.start_round(other.clone(), "snail".to_string());

        assert!(mirror.set_winner(me.clone()));
        assert!(mirror.game_ended());
        assert_eq!(mirror.winner_id(), Some(&me));
        assert_eq!(mirror.drawer_id(), None);
        assert_eq!(mirror.word(), None);
        assert!(!mirror.is_drawer());
        for player in mirror.players_by_position() {
            assert!(!player.ready);
        }
    }

    #[test]
    fn test_stale_winner_broadcast_ignored() {
        let (mut mirror, me, other) = mirror_with_two_players();
        mirror.start_round(me.clone(), "snail".to_string());
        assert!(mirror.set_winner(me.clone()));
        assert!(!mirror.set_winner(other));
        assert_eq!(mirror.winner_id(), Some(&me));
    }

    #[test]
    fn test_remote_points_accumulate_on_canvas() {
        let (mut mirror, _, _) = mirror_with_two_players();
        mirror.append_point(PathEvent::Point { x: 1.0, y: 2.0 });
        mirror.append_point(PathEvent::SegmentBreak);
        mirror.append_point(PathEvent::Point { x: 3.0, y: 4.0 });
        assert_eq!(mirror.canvas().len(), 3);
        assert_eq!(mirror.canvas()[1], PathEvent::SegmentBreak);
    }

    #[test]
    fn test_drawer_leaving_resets_round() {
        let (mut mirror, _, other) = mirror_with_two_players();
        mirror.start_round(other.clone(), "volcano".to_string());

        assert!(mirror.remove_player(&other));
        assert!(mirror.game_ended());
        assert_eq!(mirror.drawer_id(), None);
        assert_eq!(mirror.len(), 1);
    }

    #[test]
    fn test_guesser_leaving_keeps_round_running() {
        let mut mirror = ClientGameState::new();
        let me = mirror.register_local_player("10.0.0.1", "me").id;
        let b = PlayerId::new("10.0.0.2", "b");
        let c = PlayerId::new("10.0.0.3", "c");
        mirror.add_player(b.clone(), "10.0.0.2".to_string(), "b".to_string());
        mirror.add_player(c.clone(), "10.0.0.3".to_string(), "c".to_string());
        mirror.start_round(me, "windmill".to_string());

        assert!(!mirror.remove_player(&b));
        assert!(!mirror.game_ended());
        // Positions compact behind the departed player.
        assert_eq!(mirror.player(&c).unwrap().position, 1);
    }
}
