//! Boundary to the presentation surface.
//!
//! The session core calls these hooks when the mirror changes and is driven
//! back through pointer and intent calls; no pixel, window or font logic
//! crosses this boundary.

use log::{debug, info};
use shared::protocol::PathEvent;
use shared::{Player, PlayerId};

pub trait PresentationSurface: Send + Sync {
    /// A point (or segment break) arrived on the broadcast channel.
    fn on_remote_point(&self, event: &PathEvent);
    fn on_player_joined(&self, player: &Player);
    fn on_player_ready(&self, id: &PlayerId);
    fn on_player_left(&self, id: &PlayerId);
    fn on_player_won(&self, id: &PlayerId);
    fn on_round_started(&self, drawer: &PlayerId, word: &str);
}

/// Terminal stand-in used by the headless client binary: session events go
/// to the log, points are only counted at debug level.
pub struct LogSurface;

impl PresentationSurface for LogSurface {
    fn on_remote_point(&self, event: &PathEvent) {
        match event {
            PathEvent::Point { x, y } => debug!("remote point ({}, {})", x, y),
            PathEvent::SegmentBreak => debug!("remote stroke ended"),
        }
    }

    fn on_player_joined(&self, player: &Player) {
        info!("» {} joined", player.name);
    }

    fn on_player_ready(&self, id: &PlayerId) {
        info!("» {} is ready", id);
    }

    fn on_player_left(&self, id: &PlayerId) {
        info!("» {} left", id);
    }

    fn on_player_won(&self, id: &PlayerId) {
        info!("» {} guessed the word and won the round", id);
    }

    fn on_round_started(&self, drawer: &PlayerId, word: &str) {
        info!("» new round: {} draws '{}'", drawer, word);
    }
}
