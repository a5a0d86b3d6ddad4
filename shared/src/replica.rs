//! Client-side mirror of a room's canvas.
//!
//! A replica only ever changes in response to server messages plus the
//! strokes its own user draws locally, which the server does not echo back.

use std::collections::HashSet;

use crate::{OperationKind, Point, ServerMessage, Stroke, User};

#[derive(Clone, Debug, Default)]
pub struct CanvasReplica {
    room_id: Option<String>,
    users: Vec<User>,
    strokes: Vec<Stroke>,
    finished: HashSet<String>,
}

impl CanvasReplica {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn room_id(&self) -> Option<&str> {
        self.room_id.as_deref()
    }

    pub fn users(&self) -> &[User] {
        &self.users
    }

    pub fn strokes(&self) -> &[Stroke] {
        &self.strokes
    }

    pub fn stroke(&self, id: &str) -> Option<&Stroke> {
        self.strokes.iter().find(|stroke| stroke.id == id)
    }

    pub fn is_finished(&self, id: &str) -> bool {
        self.finished.contains(id)
    }

    pub fn begin_local_stroke(&mut self, stroke: Stroke) {
        self.insert(stroke);
    }

    pub fn push_local_point(&mut self, id: &str, point: Point) {
        if let Some(stroke) = self.strokes.iter_mut().find(|stroke| stroke.id == id) {
            stroke.points.push(point);
        }
    }

    pub fn finish_local_stroke(&mut self, id: &str) {
        self.finished.insert(id.to_string());
    }

    pub fn apply(&mut self, message: &ServerMessage) {
        match message {
            ServerMessage::RoomState {
                room_id,
                users,
                strokes,
            } => {
                self.room_id = Some(room_id.clone());
                self.users = users.clone();
                self.strokes = strokes.clone();
                self.finished = strokes.iter().map(|stroke| stroke.id.clone()).collect();
            }
            ServerMessage::UserJoined(user) => {
                self.users.retain(|existing| existing.id != user.id);
                self.users.push(user.clone());
            }
            ServerMessage::UserLeft { user_id } => {
                self.users.retain(|existing| &existing.id != user_id);
            }
            ServerMessage::StrokeStart(stroke) => self.insert(stroke.clone()),
            ServerMessage::StrokePoint { stroke_id, point } => {
                if self.finished.contains(stroke_id) {
                    return;
                }
                self.push_local_point(stroke_id, *point);
            }
            ServerMessage::StrokeEnd { stroke_id } => {
                self.finished.insert(stroke_id.clone());
            }
            ServerMessage::Undo { kind, strokes } => match kind {
                OperationKind::StrokeAdd => self.remove_all(strokes),
                OperationKind::CanvasClear => self.restore_all(strokes),
            },
            ServerMessage::Redo { kind, strokes } => match kind {
                OperationKind::StrokeAdd => self.restore_all(strokes),
                OperationKind::CanvasClear => self.remove_all(strokes),
            },
            ServerMessage::CanvasCleared { .. } => {
                self.strokes.clear();
            }
        }
    }

    fn insert(&mut self, stroke: Stroke) {
        if self.stroke(&stroke.id).is_some() {
            return;
        }
        self.strokes.push(stroke);
    }

    fn remove_all(&mut self, strokes: &[Stroke]) {
        self.strokes
            .retain(|existing| !strokes.iter().any(|stroke| stroke.id == existing.id));
    }

    fn restore_all(&mut self, strokes: &[Stroke]) {
        for stroke in strokes {
            self.finished.insert(stroke.id.clone());
            self.insert(stroke.clone());
        }
    }
}
