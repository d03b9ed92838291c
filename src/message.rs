//! Message protocol definitions
//!
//! One JSON object shape travels in both directions:
//! `{ action, sender?, recipient?, room?, text? }`.
//! The action tag is an open set so that newer clients can send actions
//! this server does not know yet.

use serde::{Deserialize, Serialize};

use crate::types::RoomId;

/// Action tag of a message
///
/// Unknown tags are kept verbatim in `Other` and ignored by the reader.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Action {
    /// Regular chat message
    Message,
    /// Silence a user in the room
    Mute,
    /// Remove a user from the room
    Kick,
    /// Remove a user and refuse future joins
    Ban,
    /// Terminal notice sent before the server closes a connection
    Bye,
    /// Anything else
    Other(String),
}

impl Action {
    pub fn as_str(&self) -> &str {
        match self {
            Action::Message => "message",
            Action::Mute => "mute",
            Action::Kick => "kick",
            Action::Ban => "ban",
            Action::Bye => "bye",
            Action::Other(tag) => tag,
        }
    }

    /// Mute, kick and ban
    pub fn is_moderation(&self) -> bool {
        matches!(self, Action::Mute | Action::Kick | Action::Ban)
    }
}

impl From<String> for Action {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "message" => Action::Message,
            "mute" => Action::Mute,
            "kick" => Action::Kick,
            "ban" => Action::Ban,
            "bye" => Action::Bye,
            _ => Action::Other(tag),
        }
    }
}

impl From<Action> for String {
    fn from(action: Action) -> Self {
        match action {
            Action::Other(tag) => tag,
            known => known.as_str().to_string(),
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reference to a user inside a message
///
/// Peers may name a user with a bare string; the server always emits the
/// object form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "UserRefRepr")]
pub struct UserRef {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room: Option<RoomId>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum UserRefRepr {
    Name(String),
    Full {
        name: String,
        #[serde(default)]
        room: Option<RoomId>,
    },
}

impl From<UserRefRepr> for UserRef {
    fn from(repr: UserRefRepr) -> Self {
        match repr {
            UserRefRepr::Name(name) => UserRef { name, room: None },
            UserRefRepr::Full { name, room } => UserRef { name, room },
        }
    }
}

impl UserRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            room: None,
        }
    }

    /// Attach room context
    pub fn add_room_info(&mut self, room: RoomId) {
        self.room = Some(room);
    }
}

/// A unit of wire traffic
///
/// `sender` and `room` are stamped by the server on ingress; values supplied
/// by the peer are never trusted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub action: Action,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<UserRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient: Option<UserRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room: Option<RoomId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl Message {
    /// Chat message with the given text
    pub fn chat(text: impl Into<String>) -> Self {
        Self {
            action: Action::Message,
            sender: None,
            recipient: None,
            room: None,
            text: Some(text.into()),
        }
    }

    /// Terminal notice written right before a forced close
    pub fn bye(room: RoomId, text: impl Into<String>) -> Self {
        Self {
            action: Action::Bye,
            sender: None,
            recipient: None,
            room: Some(room),
            text: Some(text.into()),
        }
    }

    /// Server-authored notice broadcast to a room (joins and departures)
    pub fn notice(room: RoomId, text: impl Into<String>) -> Self {
        Self {
            action: Action::Message,
            sender: None,
            recipient: None,
            room: Some(room),
            text: Some(text.into()),
        }
    }
}
