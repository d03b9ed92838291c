//! Room roster
//!
//! Plain bookkeeping owned by a single hub task: who is connected, who is
//! muted, who is banned. No I/O happens here.

use std::collections::{HashMap, HashSet};

use crate::client::Client;
use crate::types::{RoomId, SessionId};

/// Roster of one chat room
#[derive(Debug)]
pub struct Room {
    /// Room identifier
    pub id: RoomId,
    /// Connected sessions: SessionId -> Client
    members: HashMap<SessionId, Client>,
    /// Names whose chat messages are dropped
    muted: HashSet<String>,
    /// Names refused on registration
    banned: HashSet<String>,
}

impl Room {
    pub fn new(id: RoomId) -> Self {
        Self {
            id,
            members: HashMap::new(),
            muted: HashSet::new(),
            banned: HashSet::new(),
        }
    }

    /// Add a session to the roster
    ///
    /// Returns false, leaving the roster untouched, if the user is banned.
    pub fn add(&mut self, client: Client) -> bool {
        if self.is_banned(client.name()) {
            return false;
        }
        self.members.insert(client.id, client);
        true
    }

    /// Remove a session; absent sessions are ignored
    pub fn remove(&mut self, id: SessionId) -> Option<Client> {
        self.members.remove(&id)
    }

    pub fn contains(&self, id: SessionId) -> bool {
        self.members.contains_key(&id)
    }

    /// Remove and return every session of a user
    pub fn take_sessions_of(&mut self, name: &str) -> Vec<Client> {
        let ids: Vec<SessionId> = self
            .members
            .values()
            .filter(|c| c.name() == name)
            .map(|c| c.id)
            .collect();
        ids.into_iter().filter_map(|id| self.members.remove(&id)).collect()
    }

    /// Check if any session of the user is connected
    pub fn has_user(&self, name: &str) -> bool {
        self.members.values().any(|c| c.name() == name)
    }

    pub fn is_muted(&self, name: &str) -> bool {
        self.muted.contains(name)
    }

    /// Flip the muted flag of a user
    ///
    /// Returns the new state (true = muted).
    pub fn toggle_mute(&mut self, name: &str) -> bool {
        if self.muted.remove(name) {
            false
        } else {
            self.muted.insert(name.to_string());
            true
        }
    }

    pub fn ban(&mut self, name: &str) {
        self.banned.insert(name.to_string());
    }

    pub fn is_banned(&self, name: &str) -> bool {
        self.banned.contains(name)
    }

    pub fn members(&self) -> impl Iterator<Item = &Client> {
        self.members.values()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}
