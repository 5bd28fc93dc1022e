//! # Draw-and-Guess Session Client
//!
//! Client side of the draw-and-guess session. It keeps a read-only mirror of
//! the authoritative server state, streams locally captured strokes to the
//! server, and replays everything arriving on the broadcast channel toward
//! the presentation surface.
//!
//! ## Data flow
//!
//! Pointer input → [`canvas::StrokeCapture`] (smoothing, segmentation) →
//! control requester (`new-point` requests) → server → broadcast channel →
//! update router → [`game::ClientGameState`] mirror →
//! [`presentation::PresentationSurface`].
//!
//! The mirror is mutated only by broadcast handlers, so the client never
//! speculates about state it does not own; a control reply and the broadcast
//! confirming the same change may be observed in either order.
//!
//! ## Module Organization
//!
//! - [`game`]: the state mirror and the replayable canvas.
//! - [`canvas`]: stroke capture, pointer events in, smoothed segmented
//!   point stream out.
//! - [`network`]: control requester, broadcast subscription and update
//!   handlers.
//! - [`presentation`]: the trait boundary toward the window/renderer stack.

pub mod canvas;
pub mod game;
pub mod network;
pub mod presentation;
