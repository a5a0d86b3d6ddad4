use std::collections::HashMap;
use std::sync::Arc;

use sketchroom_shared::{ServerMessage, User};
use tokio::sync::mpsc;

use crate::colors::ColorAllocator;
use crate::registry::RoomRegistry;
use crate::room::{ConnectionId, Room};

pub type Outbox = mpsc::UnboundedSender<ServerMessage>;

#[derive(Clone, Default)]
pub struct AppState {
    pub rooms: Arc<RoomRegistry>,
    pub colors: Arc<ColorAllocator>,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Everything one connection knows about itself.
#[derive(Clone, Debug)]
pub struct Session {
    pub connection_id: ConnectionId,
    pub user: User,
    pub room_id: String,
}

impl Session {
    pub fn new(connection_id: ConnectionId, user: User, room_id: impl Into<String>) -> Self {
        Self {
            connection_id,
            user,
            room_id: room_id.into(),
        }
    }
}

/// A room together with the outboxes of the connections currently in it.
pub struct RoomSlot {
    pub room: Room,
    peers: HashMap<ConnectionId, Outbox>,
}

impl RoomSlot {
    pub fn new(room_id: impl Into<String>) -> Self {
        Self {
            room: Room::new(room_id),
            peers: HashMap::new(),
        }
    }

    pub fn add_peer(&mut self, connection_id: ConnectionId, outbox: Outbox) {
        self.peers.insert(connection_id, outbox);
    }

    pub fn remove_peer(&mut self, connection_id: ConnectionId) {
        self.peers.remove(&connection_id);
    }

    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.room.is_empty() && self.peers.is_empty()
    }

    pub fn send_to(&mut self, connection_id: ConnectionId, message: ServerMessage) {
        let delivered = self
            .peers
            .get(&connection_id)
            .map(|outbox| outbox.send(message).is_ok());
        if delivered == Some(false) {
            self.peers.remove(&connection_id);
        }
    }

    pub fn broadcast_except(&mut self, sender: ConnectionId, message: ServerMessage) {
        self.fan_out(Some(sender), message);
    }

    pub fn broadcast_all(&mut self, message: ServerMessage) {
        self.fan_out(None, message);
    }

    fn fan_out(&mut self, skip: Option<ConnectionId>, message: ServerMessage) {
        let mut stale = Vec::new();
        for (id, outbox) in self.peers.iter() {
            if Some(*id) == skip {
                continue;
            }
            if outbox.send(message.clone()).is_err() {
                stale.push(*id);
            }
        }
        for id in stale {
            tracing::debug!(room = %self.room.id(), conn = %id, "dropping stale peer");
            self.peers.remove(&id);
        }
    }
}
