//! Room id -> room mapping with lazy creation and eager destruction.
//!
//! Lock order is always registry map first, then room. `enter` hands back the
//! room already write-locked, so a room cannot be dropped from the map between
//! being looked up and being joined.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{OwnedRwLockWriteGuard, RwLock};

use crate::state::RoomSlot;

pub type SharedRoom = Arc<RwLock<RoomSlot>>;

#[derive(Default)]
pub struct RoomRegistry {
    rooms: RwLock<HashMap<String, SharedRoom>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, room_id: &str) -> Option<SharedRoom> {
        self.rooms.read().await.get(room_id).cloned()
    }

    pub async fn get_or_create(&self, room_id: &str) -> SharedRoom {
        if let Some(room) = self.get(room_id).await {
            return room;
        }
        let mut rooms = self.rooms.write().await;
        Self::slot_entry(&mut rooms, room_id)
    }

    /// Looks up or creates `room_id` and write-locks it before the registry
    /// lock is released.
    pub async fn enter(&self, room_id: &str) -> (SharedRoom, OwnedRwLockWriteGuard<RoomSlot>) {
        let mut rooms = self.rooms.write().await;
        let room = Self::slot_entry(&mut rooms, room_id);
        let guard = room.clone().write_owned().await;
        (room, guard)
    }

    /// Drops the room iff nobody is in it. Returns whether it was dropped.
    pub async fn remove_if_empty(&self, room_id: &str) -> bool {
        let mut rooms = self.rooms.write().await;
        let Some(room) = rooms.get(room_id) else {
            return false;
        };
        if !room.read().await.is_empty() {
            return false;
        }
        rooms.remove(room_id);
        tracing::info!(room = %room_id, rooms = rooms.len(), "destroyed empty room");
        true
    }

    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }

    fn slot_entry(rooms: &mut HashMap<String, SharedRoom>, room_id: &str) -> SharedRoom {
        if let Some(room) = rooms.get(room_id) {
            return room.clone();
        }
        let room = Arc::new(RwLock::new(RoomSlot::new(room_id)));
        rooms.insert(room_id.to_string(), room.clone());
        tracing::info!(room = %room_id, rooms = rooms.len(), "created room");
        room
    }
}
