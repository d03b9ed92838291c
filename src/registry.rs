//! Room → hub lookup
//!
//! Built once at startup and passed to the connection handler, so tests can
//! construct their own registry with whatever hubs they need.

use std::collections::HashMap;

use crate::hub::{Hub, HubHandle};
use crate::types::RoomId;

#[derive(Debug, Clone, Default)]
pub struct HubRegistry {
    hubs: HashMap<RoomId, HubHandle>,
}

impl HubRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn one hub per room
    pub fn spawn(rooms: impl IntoIterator<Item = RoomId>) -> Self {
        let mut registry = Self::new();
        for room in rooms {
            registry.insert(Hub::spawn(room));
        }
        registry
    }

    /// Add an existing hub, replacing any hub for the same room
    pub fn insert(&mut self, hub: HubHandle) {
        self.hubs.insert(hub.room(), hub);
    }

    pub fn get(&self, room: RoomId) -> Option<&HubHandle> {
        self.hubs.get(&room)
    }

    pub fn len(&self) -> usize {
        self.hubs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hubs.is_empty()
    }
}
