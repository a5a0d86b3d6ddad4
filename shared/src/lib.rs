use serde::{Deserialize, Serialize};

pub mod replica;

pub use replica::CanvasReplica;

pub const DEFAULT_ROOM_ID: &str = "default";

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Tool {
    #[default]
    Brush,
    Eraser,
}

/// One continuous drawing gesture as stored by a room.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Stroke {
    pub id: String,
    pub author_id: String,
    pub author_color: String,
    pub tool: Tool,
    pub color: String,
    pub width: f64,
    pub points: Vec<Point>,
    /// Milliseconds since the Unix epoch, assigned by the server.
    #[serde(default)]
    pub created_at: u64,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct User {
    pub id: String,
    pub name: String,
    pub color: String,
}

impl User {
    pub fn new(id: impl Into<String>, color: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: display_name(&id),
            id,
            color: color.into(),
        }
    }
}

/// `User` followed by the last four characters of the id.
pub fn display_name(user_id: &str) -> String {
    let tail_start = user_id
        .char_indices()
        .rev()
        .nth(3)
        .map(|(index, _)| index)
        .unwrap_or(0);
    format!("User{}", &user_id[tail_start..])
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    StrokeAdd,
    CanvasClear,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    JoinRoom {
        room_id: String,
    },
    StrokeStart {
        id: String,
        #[serde(default)]
        user_id: Option<String>,
        #[serde(default)]
        user_color: Option<String>,
        #[serde(default)]
        points: Vec<Point>,
        #[serde(default)]
        color: String,
        #[serde(default)]
        width: f64,
        #[serde(default)]
        tool: Tool,
        #[serde(default)]
        room_id: Option<String>,
    },
    StrokePoint {
        stroke_id: String,
        point: Point,
        #[serde(default)]
        room_id: Option<String>,
    },
    StrokeEnd {
        stroke_id: String,
        #[serde(default)]
        room_id: Option<String>,
    },
    Undo {
        #[serde(default)]
        room_id: Option<String>,
    },
    Redo {
        #[serde(default)]
        room_id: Option<String>,
    },
    ClearCanvas {
        #[serde(default)]
        room_id: Option<String>,
    },
    RequestState {
        #[serde(default)]
        room_id: Option<String>,
    },
}

impl ClientMessage {
    /// The room a room-scoped message claims to address, if it names one.
    pub fn claimed_room(&self) -> Option<&str> {
        match self {
            ClientMessage::JoinRoom { .. } => None,
            ClientMessage::StrokeStart { room_id, .. }
            | ClientMessage::StrokePoint { room_id, .. }
            | ClientMessage::StrokeEnd { room_id, .. }
            | ClientMessage::Undo { room_id }
            | ClientMessage::Redo { room_id }
            | ClientMessage::ClearCanvas { room_id }
            | ClientMessage::RequestState { room_id } => room_id.as_deref(),
        }
    }

    pub fn event_name(&self) -> &'static str {
        match self {
            ClientMessage::JoinRoom { .. } => "join_room",
            ClientMessage::StrokeStart { .. } => "stroke_start",
            ClientMessage::StrokePoint { .. } => "stroke_point",
            ClientMessage::StrokeEnd { .. } => "stroke_end",
            ClientMessage::Undo { .. } => "undo",
            ClientMessage::Redo { .. } => "redo",
            ClientMessage::ClearCanvas { .. } => "clear_canvas",
            ClientMessage::RequestState { .. } => "request_state",
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    RoomState {
        room_id: String,
        users: Vec<User>,
        strokes: Vec<Stroke>,
    },
    UserJoined(User),
    UserLeft {
        user_id: String,
    },
    StrokeStart(Stroke),
    StrokePoint {
        stroke_id: String,
        point: Point,
    },
    StrokeEnd {
        stroke_id: String,
    },
    Undo {
        kind: OperationKind,
        strokes: Vec<Stroke>,
    },
    Redo {
        kind: OperationKind,
        strokes: Vec<Stroke>,
    },
    CanvasCleared {
        cleared_by: String,
    },
}
