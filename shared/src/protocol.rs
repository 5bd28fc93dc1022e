//! Wire protocol for both session channels.
//!
//! Every message is a single text datagram of the form `tag@payload`, with
//! multi-field payloads joined by `%`. Messages are decoded exactly once at
//! the channel boundary into a closed enum ([`Request`] on the control
//! channel, [`Update`] on the broadcast channel), so malformed or unknown
//! input is handled in one place and can never reach a handler. Control
//! replies use the fixed two-token vocabulary `accepted` / `rejected`.

use crate::dispatch::Tagged;
use crate::PlayerId;
use std::fmt;

/// Separates the tag from the payload.
const CHANNEL_DELIM: char = '@';
/// Separates payload fields.
const FIELD_DELIM: char = '%';
/// Reserved point-stream payload marking the end of a stroke segment.
const SEGMENT_BREAK: &str = "break";

/// Command tags shared by both channels.
pub mod tags {
    pub const NEW_PLAYER: &str = "new-player";
    pub const PLAYER_READY: &str = "player-ready";
    pub const NEW_POINT: &str = "new-point";
    pub const NEW_WINNER: &str = "new-winner";
    pub const NEW_GAME: &str = "new-game";
    pub const PLAYER_LEFT: &str = "player-left";

    /// Sent to the broadcast socket to manage fan-out membership; these never
    /// carry a payload and never appear on the control channel.
    pub const SUBSCRIBE: &str = "subscribe";
    pub const UNSUBSCRIBE: &str = "unsubscribe";
}

/// One element of the replayable point stream.
///
/// A `SegmentBreak` ends the current pen-down gesture; it is an explicit
/// variant rather than a reserved coordinate value, so a legitimate point can
/// never be mistaken for a separator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PathEvent {
    Point { x: f32, y: f32 },
    SegmentBreak,
}

impl PathEvent {
    fn encode_payload(&self) -> String {
        match self {
            PathEvent::Point { x, y } => format!("{}{}{}", x, FIELD_DELIM, y),
            PathEvent::SegmentBreak => SEGMENT_BREAK.to_string(),
        }
    }

    fn decode_payload(tag: &'static str, payload: &str) -> Result<Self, CodecError> {
        if payload == SEGMENT_BREAK {
            return Ok(PathEvent::SegmentBreak);
        }
        let fields = split_fields(tag, payload, 2)?;
        let x = parse_coordinate(&fields[0])?;
        let y = parse_coordinate(&fields[1])?;
        Ok(PathEvent::Point { x, y })
    }
}

/// Decode failure. Callers log and drop; decoding never panics past this
/// boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum CodecError {
    /// The tag/payload delimiter is missing entirely.
    MissingTag,
    UnknownTag(String),
    FieldCount {
        tag: &'static str,
        expected: usize,
        got: usize,
    },
    InvalidCoordinate(String),
    InvalidReadyFlag(String),
    UnknownReply(String),
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecError::MissingTag => write!(f, "message has no tag delimiter"),
            CodecError::UnknownTag(tag) => write!(f, "unknown command tag '{}'", tag),
            CodecError::FieldCount {
                tag,
                expected,
                got,
            } => write!(f, "'{}' expects {} payload fields, got {}", tag, expected, got),
            CodecError::InvalidCoordinate(field) => {
                write!(f, "'{}' is not a valid coordinate", field)
            }
            CodecError::InvalidReadyFlag(field) => {
                write!(f, "'{}' is not a valid ready flag (expected 0 or 1)", field)
            }
            CodecError::UnknownReply(text) => write!(f, "unknown control reply '{}'", text),
        }
    }
}

impl std::error::Error for CodecError {}

/// A state-changing request on the control channel.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Join {
        id: PlayerId,
        ip: String,
        name: String,
    },
    Ready {
        id: PlayerId,
        ready: bool,
    },
    Point(PathEvent),
    Winner {
        id: PlayerId,
    },
    Leave {
        id: PlayerId,
    },
}

impl Request {
    pub fn encode(&self) -> String {
        match self {
            Request::Join { id, ip, name } => join_message(
                tags::NEW_PLAYER,
                &[id.as_str(), ip.as_str(), name.as_str()],
            ),
            Request::Ready { id, ready } => join_message(
                tags::PLAYER_READY,
                &[id.as_str(), if *ready { "1" } else { "0" }],
            ),
            Request::Point(event) => {
                format!("{}{}{}", tags::NEW_POINT, CHANNEL_DELIM, event.encode_payload())
            }
            Request::Winner { id } => join_message(tags::NEW_WINNER, &[id.as_str()]),
            Request::Leave { id } => join_message(tags::PLAYER_LEFT, &[id.as_str()]),
        }
    }

    pub fn decode(wire: &str) -> Result<Self, CodecError> {
        let (tag, payload) = split_message(wire)?;
        match tag {
            tags::NEW_PLAYER => {
                let fields = split_fields(tags::NEW_PLAYER, payload, 3)?;
                Ok(Request::Join {
                    id: PlayerId::from_raw(fields[0]),
                    ip: fields[1].to_string(),
                    name: fields[2].to_string(),
                })
            }
            tags::PLAYER_READY => {
                let fields = split_fields(tags::PLAYER_READY, payload, 2)?;
                Ok(Request::Ready {
                    id: PlayerId::from_raw(fields[0]),
                    ready: parse_ready_flag(fields[1])?,
                })
            }
            tags::NEW_POINT => {
                PathEvent::decode_payload(tags::NEW_POINT, payload).map(Request::Point)
            }
            tags::NEW_WINNER => {
                let fields = split_fields(tags::NEW_WINNER, payload, 1)?;
                Ok(Request::Winner {
                    id: PlayerId::from_raw(fields[0]),
                })
            }
            tags::PLAYER_LEFT => {
                let fields = split_fields(tags::PLAYER_LEFT, payload, 1)?;
                Ok(Request::Leave {
                    id: PlayerId::from_raw(fields[0]),
                })
            }
            other => Err(CodecError::UnknownTag(other.to_string())),
        }
    }
}

impl Tagged for Request {
    fn tag(&self) -> &'static str {
        match self {
            Request::Join { .. } => tags::NEW_PLAYER,
            Request::Ready { .. } => tags::PLAYER_READY,
            Request::Point(_) => tags::NEW_POINT,
            Request::Winner { .. } => tags::NEW_WINNER,
            Request::Leave { .. } => tags::PLAYER_LEFT,
        }
    }
}

/// An authoritative state change published on the broadcast channel.
#[derive(Debug, Clone, PartialEq)]
pub enum Update {
    PlayerJoined {
        id: PlayerId,
        ip: String,
        name: String,
    },
    PlayerReady {
        id: PlayerId,
    },
    Point(PathEvent),
    Winner {
        id: PlayerId,
    },
    RoundStarted {
        drawer: PlayerId,
        word: String,
    },
    PlayerLeft {
        id: PlayerId,
    },
}

impl Update {
    pub fn encode(&self) -> String {
        match self {
            Update::PlayerJoined { id, ip, name } => join_message(
                tags::NEW_PLAYER,
                &[id.as_str(), ip.as_str(), name.as_str()],
            ),
            Update::PlayerReady { id } => join_message(tags::PLAYER_READY, &[id.as_str()]),
            Update::Point(event) => {
                format!("{}{}{}", tags::NEW_POINT, CHANNEL_DELIM, event.encode_payload())
            }
            Update::Winner { id } => join_message(tags::NEW_WINNER, &[id.as_str()]),
            Update::RoundStarted { drawer, word } => {
                join_message(tags::NEW_GAME, &[drawer.as_str(), word.as_str()])
            }
            Update::PlayerLeft { id } => join_message(tags::PLAYER_LEFT, &[id.as_str()]),
        }
    }

    pub fn decode(wire: &str) -> Result<Self, CodecError> {
        let (tag, payload) = split_message(wire)?;
        match tag {
            tags::NEW_PLAYER => {
                let fields = split_fields(tags::NEW_PLAYER, payload, 3)?;
                Ok(Update::PlayerJoined {
                    id: PlayerId::from_raw(fields[0]),
                    ip: fields[1].to_string(),
                    name: fields[2].to_string(),
                })
            }
            tags::PLAYER_READY => {
                let fields = split_fields(tags::PLAYER_READY, payload, 1)?;
                Ok(Update::PlayerReady {
                    id: PlayerId::from_raw(fields[0]),
                })
            }
            tags::NEW_POINT => {
                PathEvent::decode_payload(tags::NEW_POINT, payload).map(Update::Point)
            }
            tags::NEW_WINNER => {
                let fields = split_fields(tags::NEW_WINNER, payload, 1)?;
                Ok(Update::Winner {
                    id: PlayerId::from_raw(fields[0]),
                })
            }
            tags::NEW_GAME => {
                let fields = split_fields(tags::NEW_GAME, payload, 2)?;
                Ok(Update::RoundStarted {
                    drawer: PlayerId::from_raw(fields[0]),
                    word: fields[1].to_string(),
                })
            }
            tags::PLAYER_LEFT => {
                let fields = split_fields(tags::PLAYER_LEFT, payload, 1)?;
                Ok(Update::PlayerLeft {
                    id: PlayerId::from_raw(fields[0]),
                })
            }
            other => Err(CodecError::UnknownTag(other.to_string())),
        }
    }
}

impl Tagged for Update {
    fn tag(&self) -> &'static str {
        match self {
            Update::PlayerJoined { .. } => tags::NEW_PLAYER,
            Update::PlayerReady { .. } => tags::PLAYER_READY,
            Update::Point(_) => tags::NEW_POINT,
            Update::Winner { .. } => tags::NEW_WINNER,
            Update::RoundStarted { .. } => tags::NEW_GAME,
            Update::PlayerLeft { .. } => tags::PLAYER_LEFT,
        }
    }
}

/// Control-channel acknowledgment, one per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    Accepted,
    Rejected,
}

impl Reply {
    pub fn encode(&self) -> &'static str {
        match self {
            Reply::Accepted => "accepted",
            Reply::Rejected => "rejected",
        }
    }

    pub fn decode(wire: &str) -> Result<Self, CodecError> {
        match wire {
            "accepted" => Ok(Reply::Accepted),
            "rejected" => Ok(Reply::Rejected),
            other => Err(CodecError::UnknownReply(other.to_string())),
        }
    }
}

fn join_message(tag: &str, fields: &[&str]) -> String {
    let payload = fields.join(&FIELD_DELIM.to_string());
    format!("{}{}{}", tag, CHANNEL_DELIM, payload)
}

fn split_message(wire: &str) -> Result<(&str, &str), CodecError> {
    wire.split_once(CHANNEL_DELIM).ok_or(CodecError::MissingTag)
}

fn split_fields<'a>(
    tag: &'static str,
    payload: &'a str,
    expected: usize,
) -> Result<Vec<&'a str>, CodecError> {
    let fields: Vec<&str> = payload.split(FIELD_DELIM).collect();
    if fields.len() != expected {
        return Err(CodecError::FieldCount {
            tag,
            expected,
            got: fields.len(),
        });
    }
    Ok(fields)
}

fn parse_coordinate(field: &str) -> Result<f32, CodecError> {
    field
        .parse::<f32>()
        .map_err(|_| CodecError::InvalidCoordinate(field.to_string()))
}

fn parse_ready_flag(field: &str) -> Result<bool, CodecError> {
    match field {
        "0" => Ok(false),
        "1" => Ok(true),
        other => Err(CodecError::InvalidReadyFlag(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: &str) -> PlayerId {
        PlayerId::from_raw(raw)
    }

    #[test]
    fn test_request_roundtrip_all_tags() {
        let requests = vec![
            Request::Join {
                id: id("10.0.0.1:ann"),
                ip: "10.0.0.1".to_string(),
                name: "ann".to_string(),
            },
            Request::Ready {
                id: id("10.0.0.1:ann"),
                ready: true,
            },
            Request::Ready {
                id: id("10.0.0.1:ann"),
                ready: false,
            },
            Request::Point(PathEvent::Point { x: 12.5, y: 430.0 }),
            Request::Point(PathEvent::SegmentBreak),
            Request::Winner { id: id("10.0.0.1:ann") },
            Request::Leave { id: id("10.0.0.1:ann") },
        ];

        for request in requests {
            let decoded = Request::decode(&request.encode()).unwrap();
            assert_eq!(decoded, request);
        }
    }

    #[test]
    fn test_update_roundtrip_all_tags() {
        let updates = vec![
            Update::PlayerJoined {
                id: id("10.0.0.2:bo"),
                ip: "10.0.0.2".to_string(),
                name: "bo".to_string(),
            },
            Update::PlayerReady { id: id("10.0.0.2:bo") },
            Update::Point(PathEvent::Point { x: 0.25, y: 99.75 }),
            Update::Point(PathEvent::SegmentBreak),
            Update::Winner { id: id("10.0.0.2:bo") },
            Update::RoundStarted {
                drawer: id("10.0.0.2:bo"),
                word: "lighthouse".to_string(),
            },
            Update::PlayerLeft { id: id("10.0.0.2:bo") },
        ];

        for update in updates {
            let decoded = Update::decode(&update.encode()).unwrap();
            assert_eq!(decoded, update);
        }
    }

    #[test]
    fn test_point_wire_shape() {
        let wire = Request::Point(PathEvent::Point { x: 3.0, y: 4.5 }).encode();
        assert_eq!(wire, "new-point@3%4.5");

        let wire = Request::Point(PathEvent::SegmentBreak).encode();
        assert_eq!(wire, "new-point@break");
    }

    #[test]
    fn test_decode_missing_delimiter() {
        assert_eq!(Request::decode("new-player"), Err(CodecError::MissingTag));
        assert_eq!(Update::decode(""), Err(CodecError::MissingTag));
    }

    #[test]
    fn test_decode_unknown_tag() {
        assert_eq!(
            Request::decode("teleport@1%2"),
            Err(CodecError::UnknownTag("teleport".to_string()))
        );
        // A broadcast-only tag is unknown on the control channel.
        assert!(matches!(
            Request::decode("new-game@a%b"),
            Err(CodecError::UnknownTag(_))
        ));
    }

    #[test]
    fn test_decode_wrong_field_count() {
        assert_eq!(
            Request::decode("new-player@id%ip"),
            Err(CodecError::FieldCount {
                tag: tags::NEW_PLAYER,
                expected: 3,
                got: 2,
            })
        );
        assert_eq!(
            Update::decode("new-game@onlydrawer"),
            Err(CodecError::FieldCount {
                tag: tags::NEW_GAME,
                expected: 2,
                got: 1,
            })
        );
    }

    #[test]
    fn test_decode_bad_point_payload() {
        assert!(matches!(
            Request::decode("new-point@12.5"),
            Err(CodecError::FieldCount { .. })
        ));
        assert_eq!(
            Request::decode("new-point@east%west"),
            Err(CodecError::InvalidCoordinate("east".to_string()))
        );
    }

    #[test]
    fn test_decode_bad_ready_flag() {
        assert_eq!(
            Request::decode("player-ready@10.0.0.1:ann%2"),
            Err(CodecError::InvalidReadyFlag("2".to_string()))
        );
    }

    #[test]
    fn test_reply_vocabulary() {
        assert_eq!(Reply::decode("accepted"), Ok(Reply::Accepted));
        assert_eq!(Reply::decode("rejected"), Ok(Reply::Rejected));
        assert_eq!(Reply::Accepted.encode(), "accepted");
        assert!(matches!(Reply::decode("maybe"), Err(CodecError::UnknownReply(_))));
    }

    #[test]
    fn test_coordinate_text_is_decimal() {
        // Coordinates travel as decimal text and survive the trip exactly.
        let event = PathEvent::Point { x: 791.03125, y: 0.5 };
        let wire = Update::Point(event).encode();
        assert_eq!(Update::decode(&wire).unwrap(), Update::Point(event));
    }
}
