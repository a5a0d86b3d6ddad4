use std::time::{SystemTime, UNIX_EPOCH};

use sketchroom_shared::{ClientMessage, Point, ServerMessage, Stroke, Tool};

use crate::error::ProtocolError;
use crate::room::{AppendOutcome, EndOutcome, Room};
use crate::state::{RoomSlot, Session};

pub const MAX_STROKE_ID_LEN: usize = 64;
const MAX_COLOR_LEN: usize = 32;
const DEFAULT_COLOR: &str = "#000000";
const DEFAULT_WIDTH: f64 = 4.0;
const MIN_WIDTH: f64 = 0.5;
const MAX_WIDTH: f64 = 200.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Audience {
    /// Every member except the connection that sent the message.
    Others,
    /// Every member, the sender included.
    Everyone,
    /// Only the sender.
    Requester,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Outgoing {
    pub audience: Audience,
    pub message: ServerMessage,
}

impl Outgoing {
    fn new(audience: Audience, message: ServerMessage) -> Self {
        Self { audience, message }
    }
}

/// Applies one room-scoped client message to `room`.
///
/// `join_room` is not room-scoped and is handled by the connection loop; here
/// it is a no-op.
pub fn apply_client_message(
    room: &mut Room,
    session: &Session,
    message: ClientMessage,
) -> Result<Option<Outgoing>, ProtocolError> {
    if let Some(claimed) = message.claimed_room() {
        if claimed != room.id() {
            return Err(ProtocolError::RoomMismatch {
                claimed: claimed.to_string(),
                current: room.id().to_string(),
            });
        }
    }

    match message {
        ClientMessage::JoinRoom { .. } => Ok(None),
        ClientMessage::StrokeStart {
            id,
            user_id,
            user_color,
            points,
            color,
            width,
            tool,
            room_id: _,
        } => {
            if id.is_empty() || id.len() > MAX_STROKE_ID_LEN {
                return Err(ProtocolError::InvalidStrokeId(id));
            }
            if room.knows_stroke(&id) {
                return Err(ProtocolError::DuplicateStroke(id));
            }
            if user_id.as_deref().is_some_and(|claimed| claimed != session.user.id)
                || user_color
                    .as_deref()
                    .is_some_and(|claimed| claimed != session.user.color)
            {
                tracing::debug!(
                    stroke = %id,
                    claimed_user = ?user_id,
                    claimed_color = ?user_color,
                    user = %session.user.id,
                    "overriding client-claimed stroke author"
                );
            }
            let stroke = build_stroke(session, id, points, color, width, tool);
            if stroke.points.is_empty() {
                tracing::warn!(error = %ProtocolError::EmptyStroke(stroke.id.clone()), "stroke started without points");
            }
            room.add_stroke(stroke.clone());
            Ok(Some(Outgoing::new(
                Audience::Others,
                ServerMessage::StrokeStart(stroke),
            )))
        }
        ClientMessage::StrokePoint {
            stroke_id, point, ..
        } => {
            if !point.is_finite() {
                return Err(ProtocolError::NonFinitePoint(stroke_id));
            }
            match room.append_point(&stroke_id, point) {
                AppendOutcome::Appended => {}
                AppendOutcome::UnknownStroke => {
                    tracing::warn!(
                        room = %room.id(),
                        error = %ProtocolError::UnknownStroke(stroke_id.clone()),
                        "relaying point for unknown stroke"
                    );
                }
                AppendOutcome::Finished => return Err(ProtocolError::StrokeFinished(stroke_id)),
                AppendOutcome::Full => return Err(ProtocolError::StrokeFull(stroke_id)),
            }
            Ok(Some(Outgoing::new(
                Audience::Others,
                ServerMessage::StrokePoint { stroke_id, point },
            )))
        }
        ClientMessage::StrokeEnd { stroke_id, .. } => {
            match room.end_stroke(&stroke_id) {
                EndOutcome::Ended { points } => {
                    tracing::debug!(room = %room.id(), stroke = %stroke_id, points, "stroke ended");
                }
                EndOutcome::EmptyStroke => {
                    tracing::warn!(room = %room.id(), error = %ProtocolError::EmptyStroke(stroke_id.clone()), "stroke ended");
                }
                EndOutcome::UnknownStroke => {
                    tracing::warn!(room = %room.id(), error = %ProtocolError::UnknownStroke(stroke_id.clone()), "stroke ended");
                }
            }
            Ok(Some(Outgoing::new(
                Audience::Others,
                ServerMessage::StrokeEnd { stroke_id },
            )))
        }
        ClientMessage::Undo { .. } => Ok(room.undo().map(|operation| {
            Outgoing::new(
                Audience::Everyone,
                ServerMessage::Undo {
                    kind: operation.kind(),
                    strokes: operation.into_strokes(),
                },
            )
        })),
        ClientMessage::Redo { .. } => Ok(room.redo().map(|operation| {
            Outgoing::new(
                Audience::Everyone,
                ServerMessage::Redo {
                    kind: operation.kind(),
                    strokes: operation.into_strokes(),
                },
            )
        })),
        ClientMessage::ClearCanvas { .. } => Ok(room.clear().map(|_| {
            Outgoing::new(
                Audience::Everyone,
                ServerMessage::CanvasCleared {
                    cleared_by: session.user.id.clone(),
                },
            )
        })),
        ClientMessage::RequestState { .. } => Ok(Some(Outgoing::new(
            Audience::Requester,
            room.snapshot().into_message(),
        ))),
    }
}

/// Sends `outgoing` to its audience within `slot`.
pub fn dispatch(slot: &mut RoomSlot, session: &Session, outgoing: Outgoing) {
    match outgoing.audience {
        Audience::Others => slot.broadcast_except(session.connection_id, outgoing.message),
        Audience::Everyone => slot.broadcast_all(outgoing.message),
        Audience::Requester => slot.send_to(session.connection_id, outgoing.message),
    }
}

fn build_stroke(
    session: &Session,
    id: String,
    points: Vec<Point>,
    color: String,
    width: f64,
    tool: Tool,
) -> Stroke {
    Stroke {
        id,
        author_id: session.user.id.clone(),
        author_color: session.user.color.clone(),
        tool,
        color: sanitize_color(color),
        width: sanitize_width(width),
        points: points.into_iter().filter(Point::is_finite).collect(),
        created_at: now_millis(),
    }
}

fn sanitize_color(mut color: String) -> String {
    if color.is_empty() {
        return DEFAULT_COLOR.to_string();
    }
    if color.len() > MAX_COLOR_LEN {
        let mut end = MAX_COLOR_LEN;
        while !color.is_char_boundary(end) {
            end -= 1;
        }
        color.truncate(end);
    }
    color
}

fn sanitize_width(width: f64) -> f64 {
    let width = if width.is_finite() && width > 0.0 {
        width
    } else {
        DEFAULT_WIDTH
    };
    width.clamp(MIN_WIDTH, MAX_WIDTH)
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::room::MAX_POINTS_PER_STROKE;
    use sketchroom_shared::User;
    use uuid::Uuid;

    fn session() -> Session {
        Session::new(Uuid::new_v4(), User::new("alice", "#FF6B6B"), "room")
    }

    fn start(id: &str) -> ClientMessage {
        ClientMessage::StrokeStart {
            id: id.to_string(),
            user_id: Some("mallory".into()),
            user_color: None,
            points: vec![Point::new(0.0, 0.0), Point::new(f64::NAN, 1.0)],
            color: String::new(),
            width: -3.0,
            tool: Tool::Brush,
            room_id: None,
        }
    }

    #[test]
    fn sanitizers_fall_back_to_defaults() {
        assert_eq!(sanitize_color(String::new()), DEFAULT_COLOR);
        assert_eq!(sanitize_color("x".repeat(40)).len(), MAX_COLOR_LEN);
        assert_eq!(sanitize_width(f64::INFINITY), DEFAULT_WIDTH);
        assert_eq!(sanitize_width(0.0), DEFAULT_WIDTH);
        assert_eq!(sanitize_width(0.1), MIN_WIDTH);
        assert_eq!(sanitize_width(1000.0), MAX_WIDTH);
    }

    #[test]
    fn stroke_start_is_enriched_with_session_identity() {
        let session = session();
        let mut room = Room::new("room");
        let outgoing = apply_client_message(&mut room, &session, start("s1"))
            .unwrap()
            .unwrap();
        assert_eq!(outgoing.audience, Audience::Others);
        let ServerMessage::StrokeStart(stroke) = outgoing.message else {
            panic!("expected stroke_start relay");
        };
        assert_eq!(stroke.author_id, "alice");
        assert_eq!(stroke.author_color, "#FF6B6B");
        assert_eq!(stroke.color, DEFAULT_COLOR);
        assert_eq!(stroke.width, DEFAULT_WIDTH);
        assert_eq!(stroke.points, vec![Point::new(0.0, 0.0)]);
        assert_eq!(room.strokes().len(), 1);
    }

    #[test]
    fn duplicate_and_oversized_ids_are_rejected() {
        let session = session();
        let mut room = Room::new("room");
        apply_client_message(&mut room, &session, start("s1")).unwrap();
        assert!(matches!(
            apply_client_message(&mut room, &session, start("s1")),
            Err(ProtocolError::DuplicateStroke(_))
        ));
        assert!(matches!(
            apply_client_message(&mut room, &session, start(&"x".repeat(65))),
            Err(ProtocolError::InvalidStrokeId(_))
        ));
        assert_eq!(room.strokes().len(), 1);
    }

    #[test]
    fn mismatched_room_is_rejected() {
        let session = session();
        let mut room = Room::new("room");
        let result = apply_client_message(
            &mut room,
            &session,
            ClientMessage::ClearCanvas {
                room_id: Some("elsewhere".into()),
            },
        );
        assert!(matches!(result, Err(ProtocolError::RoomMismatch { .. })));
    }

    #[test]
    fn points_for_unknown_strokes_are_still_relayed() {
        let session = session();
        let mut room = Room::new("room");
        let outgoing = apply_client_message(
            &mut room,
            &session,
            ClientMessage::StrokePoint {
                stroke_id: "ghost".into(),
                point: Point::new(1.0, 1.0),
                room_id: None,
            },
        )
        .unwrap();
        assert!(matches!(
            outgoing,
            Some(Outgoing {
                audience: Audience::Others,
                message: ServerMessage::StrokePoint { .. }
            })
        ));
    }

    #[test]
    fn points_after_end_are_dropped() {
        let session = session();
        let mut room = Room::new("room");
        apply_client_message(&mut room, &session, start("s1")).unwrap();
        apply_client_message(
            &mut room,
            &session,
            ClientMessage::StrokeEnd {
                stroke_id: "s1".into(),
                room_id: None,
            },
        )
        .unwrap();
        let result = apply_client_message(
            &mut room,
            &session,
            ClientMessage::StrokePoint {
                stroke_id: "s1".into(),
                point: Point::new(5.0, 5.0),
                room_id: Some("room".into()),
            },
        );
        assert!(matches!(result, Err(ProtocolError::StrokeFinished(_))));
        assert_eq!(room.strokes()[0].points.len(), 1);
    }

    #[test]
    fn points_past_the_cap_are_rejected() {
        let session = session();
        let mut room = Room::new("room");
        apply_client_message(&mut room, &session, start("s1")).unwrap();
        for index in 1..MAX_POINTS_PER_STROKE {
            room.append_point("s1", Point::new(index as f64, 0.0));
        }

        let result = apply_client_message(
            &mut room,
            &session,
            ClientMessage::StrokePoint {
                stroke_id: "s1".into(),
                point: Point::new(-1.0, -1.0),
                room_id: None,
            },
        );
        assert!(matches!(result, Err(ProtocolError::StrokeFull(_))));
        assert_eq!(room.strokes()[0].points.len(), MAX_POINTS_PER_STROKE);
    }

    #[test]
    fn non_finite_points_are_rejected() {
        let session = session();
        let mut room = Room::new("room");
        apply_client_message(&mut room, &session, start("s1")).unwrap();
        let result = apply_client_message(
            &mut room,
            &session,
            ClientMessage::StrokePoint {
                stroke_id: "s1".into(),
                point: Point::new(f64::INFINITY, 2.0),
                room_id: None,
            },
        );
        assert!(matches!(result, Err(ProtocolError::NonFinitePoint(id)) if id == "s1"));
        assert_eq!(room.strokes()[0].points.len(), 1);
    }

    #[test]
    fn empty_history_produces_no_broadcast() {
        let session = session();
        let mut room = Room::new("room");
        for message in [
            ClientMessage::Undo { room_id: None },
            ClientMessage::Redo { room_id: None },
            ClientMessage::ClearCanvas { room_id: None },
        ] {
            assert_eq!(apply_client_message(&mut room, &session, message).unwrap(), None);
        }
    }
}
