//! Authoritative state of one shared canvas.
//!
//! `Room` is the only place that mutates the stroke list and the undo/redo
//! stacks. It never talks to the network: every mutation hands back an effect
//! value and the caller decides who hears about it.

use std::collections::HashMap;

use sketchroom_shared::{OperationKind, Point, ServerMessage, Stroke, User};
use uuid::Uuid;

pub type ConnectionId = Uuid;

pub const MAX_POINTS_PER_STROKE: usize = 10_000;

/// An undoable unit of history.
#[derive(Clone, Debug, PartialEq)]
pub enum Operation {
    StrokeAdd(Stroke),
    /// Every stroke that was on the canvas when it was cleared, in order.
    CanvasClear(Vec<Stroke>),
}

impl Operation {
    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::StrokeAdd(_) => OperationKind::StrokeAdd,
            Operation::CanvasClear(_) => OperationKind::CanvasClear,
        }
    }

    pub fn strokes(&self) -> &[Stroke] {
        match self {
            Operation::StrokeAdd(stroke) => std::slice::from_ref(stroke),
            Operation::CanvasClear(strokes) => strokes,
        }
    }

    pub fn into_strokes(self) -> Vec<Stroke> {
        match self {
            Operation::StrokeAdd(stroke) => vec![stroke],
            Operation::CanvasClear(strokes) => strokes,
        }
    }

    fn references(&self, stroke_id: &str) -> bool {
        self.strokes().iter().any(|stroke| stroke.id == stroke_id)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AppendOutcome {
    Appended,
    /// No live stroke has this id. The point is not stored.
    UnknownStroke,
    /// The stroke already received its end marker.
    Finished,
    /// The stroke reached `MAX_POINTS_PER_STROKE`.
    Full,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EndOutcome {
    Ended { points: usize },
    EmptyStroke,
    UnknownStroke,
}

#[derive(Clone, Debug)]
pub struct Member {
    pub connection_id: ConnectionId,
    pub user: User,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RoomSnapshot {
    pub room_id: String,
    pub users: Vec<User>,
    pub strokes: Vec<Stroke>,
}

impl RoomSnapshot {
    pub fn into_message(self) -> ServerMessage {
        ServerMessage::RoomState {
            room_id: self.room_id,
            users: self.users,
            strokes: self.strokes,
        }
    }
}

#[derive(Debug)]
pub struct Room {
    id: String,
    members: Vec<Member>,
    strokes: Vec<Stroke>,
    /// Stroke id -> author id, for strokes that have not ended yet.
    open: HashMap<String, String>,
    undo_stack: Vec<Operation>,
    redo_stack: Vec<Operation>,
}

impl Room {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            members: Vec::new(),
            strokes: Vec::new(),
            open: HashMap::new(),
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Adds a member. A user that is already present keeps its slot in the
    /// member order but is rebound to the new connection.
    pub fn join(&mut self, connection_id: ConnectionId, user: User) {
        if let Some(member) = self
            .members
            .iter_mut()
            .find(|member| member.user.id == user.id)
        {
            member.connection_id = connection_id;
            member.user = user;
            return;
        }
        self.members.push(Member {
            connection_id,
            user,
        });
    }

    /// Removes the member bound to `connection_id`. Returns `None` when that
    /// connection no longer represents anyone, e.g. after the same user
    /// rejoined from another connection.
    pub fn leave(&mut self, connection_id: ConnectionId) -> Option<User> {
        let index = self
            .members
            .iter()
            .position(|member| member.connection_id == connection_id)?;
        let member = self.members.remove(index);
        self.open.retain(|_, author| *author != member.user.id);
        Some(member.user)
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn members(&self) -> &[Member] {
        &self.members
    }

    pub fn users(&self) -> Vec<User> {
        self.members.iter().map(|member| member.user.clone()).collect()
    }

    pub fn strokes(&self) -> &[Stroke] {
        &self.strokes
    }

    pub fn stroke(&self, id: &str) -> Option<&Stroke> {
        self.strokes.iter().find(|stroke| stroke.id == id)
    }

    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_depth(&self) -> usize {
        self.redo_stack.len()
    }

    pub fn is_open(&self, stroke_id: &str) -> bool {
        self.open.contains_key(stroke_id)
    }

    /// Whether `stroke_id` is live or still reachable through history.
    pub fn knows_stroke(&self, stroke_id: &str) -> bool {
        self.stroke(stroke_id).is_some()
            || self.undo_stack.iter().any(|op| op.references(stroke_id))
            || self.redo_stack.iter().any(|op| op.references(stroke_id))
    }

    /// Appends a freshly started stroke and records it as one undo step.
    /// Id uniqueness is the caller's responsibility.
    pub fn add_stroke(&mut self, stroke: Stroke) {
        self.open.insert(stroke.id.clone(), stroke.author_id.clone());
        self.undo_stack.push(Operation::StrokeAdd(stroke.clone()));
        self.redo_stack.clear();
        self.strokes.push(stroke);
    }

    pub fn append_point(&mut self, stroke_id: &str, point: Point) -> AppendOutcome {
        let open = self.open.contains_key(stroke_id);
        let Some(stroke) = self.strokes.iter_mut().find(|stroke| stroke.id == stroke_id) else {
            return AppendOutcome::UnknownStroke;
        };
        if !open {
            return AppendOutcome::Finished;
        }
        if stroke.points.len() >= MAX_POINTS_PER_STROKE {
            return AppendOutcome::Full;
        }
        stroke.points.push(point);
        AppendOutcome::Appended
    }

    pub fn end_stroke(&mut self, stroke_id: &str) -> EndOutcome {
        self.open.remove(stroke_id);
        match self.stroke(stroke_id) {
            None => EndOutcome::UnknownStroke,
            Some(stroke) if stroke.points.is_empty() => EndOutcome::EmptyStroke,
            Some(stroke) => EndOutcome::Ended {
                points: stroke.points.len(),
            },
        }
    }

    pub fn undo(&mut self) -> Option<Operation> {
        let operation = self.undo_stack.pop()?;
        let operation = match operation {
            Operation::StrokeAdd(stroke) => {
                // The history entry was captured at stroke start; keep the
                // live version so redo brings back every point.
                let live = self.take_stroke(&stroke.id).unwrap_or(stroke);
                Operation::StrokeAdd(live)
            }
            Operation::CanvasClear(strokes) => {
                self.restore(&strokes);
                Operation::CanvasClear(strokes)
            }
        };
        self.redo_stack.push(operation.clone());
        Some(operation)
    }

    pub fn redo(&mut self) -> Option<Operation> {
        let operation = self.redo_stack.pop()?;
        for stroke in operation.strokes().iter().filter(|s| s.points.is_empty()) {
            tracing::warn!(room = %self.id, stroke = %stroke.id, "redoing stroke without points");
        }
        let operation = match operation {
            Operation::StrokeAdd(stroke) => {
                self.restore(std::slice::from_ref(&stroke));
                Operation::StrokeAdd(stroke)
            }
            Operation::CanvasClear(strokes) => {
                let cleared = strokes
                    .into_iter()
                    .map(|stroke| self.take_stroke(&stroke.id).unwrap_or(stroke))
                    .collect::<Vec<_>>();
                Operation::CanvasClear(cleared)
            }
        };
        self.undo_stack.push(operation.clone());
        Some(operation)
    }

    pub fn clear(&mut self) -> Option<Operation> {
        if self.strokes.is_empty() {
            return None;
        }
        let cleared = std::mem::take(&mut self.strokes);
        let operation = Operation::CanvasClear(cleared);
        self.undo_stack.push(operation.clone());
        self.redo_stack.clear();
        Some(operation)
    }

    pub fn snapshot(&self) -> RoomSnapshot {
        RoomSnapshot {
            room_id: self.id.clone(),
            users: self.users(),
            strokes: self.strokes.clone(),
        }
    }

    fn take_stroke(&mut self, stroke_id: &str) -> Option<Stroke> {
        let index = self.strokes.iter().position(|stroke| stroke.id == stroke_id)?;
        Some(self.strokes.remove(index))
    }

    fn restore(&mut self, strokes: &[Stroke]) {
        for stroke in strokes {
            if self.stroke(&stroke.id).is_none() {
                self.strokes.push(stroke.clone());
            }
        }
    }
}
