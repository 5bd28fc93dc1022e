//! Types and infrastructure shared by the draw-and-guess server and client:
//! the player model, the wire protocol codec, the dispatch router and the
//! worker pool backing both channel receive loops.

pub mod dispatch;
pub mod pool;
pub mod protocol;

use std::fmt;
use std::time::Duration;

pub const DEFAULT_CONTROL_PORT: u16 = 5555;
pub const DEFAULT_BROADCAST_PORT: u16 = 5556;
pub const DEFAULT_MAX_PLAYERS: usize = 5;

/// Maximum spacing between consecutive points of a stroke segment. Gaps wider
/// than this are filled by interpolation before transmission.
pub const SMOOTH_THRESHOLD: f32 = 1.0;

/// Bound on the wait for a control-channel reply.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(2);

/// Combined player identity, `ip:name`. Opaque once constructed; travels as a
/// single wire field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlayerId(String);

impl PlayerId {
    pub fn new(ip: &str, name: &str) -> Self {
        PlayerId(format!("{}:{}", ip, name))
    }

    /// Wraps an identity received off the wire without re-deriving it.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        PlayerId(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Player {
    pub id: PlayerId,
    pub ip: String,
    pub name: String,
    pub ready: bool,
    /// Ordinal assigned at join time; compacted when an earlier player leaves.
    pub position: usize,
    /// Score accumulator, reserved for future round scoring.
    pub points: u32,
}

impl Player {
    pub fn new(ip: &str, name: &str, position: usize) -> Self {
        Self {
            id: PlayerId::new(ip, name),
            ip: ip.to_string(),
            name: name.to_string(),
            ready: false,
            position,
            points: 0,
        }
    }
}
