//! # Draw-and-Guess Session Server
//!
//! Authoritative server for the draw-and-guess session. It owns the only
//! writable copy of the shared game state (players, readiness, the current
//! drawer, word and winner) and keeps every connected client converged on it
//! through two UDP channels:
//!
//! - a **control channel** (request/reply): clients send state-changing
//!   requests (`new-player`, `player-ready`, `new-point`, `new-winner`,
//!   `player-left`) and receive exactly one `accepted`/`rejected` reply each;
//! - a **broadcast channel** (publish/subscribe): every authoritative state
//!   change fans out to all subscribed clients, best-effort.
//!
//! ## Architecture
//!
//! Receive loops only decode and hand off. Decoded requests are routed onto
//! a bounded worker pool whose handlers forward typed commands to the single
//! session loop; that loop is the only code mutating [`game::GameSession`],
//! so the ready quorum and the stale-winner guard are always evaluated under
//! the same serialization as the mutations they protect. Broadcasts are
//! composed in the same loop and drained by a dedicated sender task.
//!
//! ## Module Organization
//!
//! - [`game`]: the session state machine, its transitions and guards.
//! - [`network`]: sockets, the control responder, subscription tracking,
//!   the broadcaster and the session loop.

pub mod game;
pub mod network;
