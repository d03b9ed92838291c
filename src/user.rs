//! User identity and authorization
//!
//! The session only needs a name and a privilege check, so both live behind
//! the `User` trait. `Member` is the in-process implementation and
//! `UserDirectory` resolves members from the upgrade request.

use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

use tokio_tungstenite::tungstenite::handshake::server::Request;

use crate::error::AuthError;
use crate::message::Action;

/// Authenticated identity served by a session
pub trait User: Debug + Send + Sync {
    /// Display and lookup name
    fn name(&self) -> &str;

    /// Whether this user may perform the given moderation action
    fn has_privilege(&self, action: &Action) -> bool;
}

/// Resolves the user behind an upgrade request
pub trait Authenticator: Send + Sync {
    fn resolve(&self, request: &Request) -> Result<Arc<dyn User>, AuthError>;
}

/// Role of a member inside the service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Role {
    #[default]
    Member,
    /// May mute and kick
    Moderator,
    /// May mute, kick and ban
    Admin,
}

/// In-process user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub name: String,
    pub role: Role,
}

impl Member {
    pub fn new(name: impl Into<String>, role: Role) -> Self {
        Self {
            name: name.into(),
            role,
        }
    }
}

impl User for Member {
    fn name(&self) -> &str {
        &self.name
    }

    fn has_privilege(&self, action: &Action) -> bool {
        match (self.role, action) {
            (Role::Admin, a) => a.is_moderation(),
            (Role::Moderator, Action::Mute | Action::Kick) => true,
            _ => false,
        }
    }
}

/// Maximum accepted user name length
const MAX_NAME_LEN: usize = 32;

/// Name → role table
///
/// Unknown names resolve to plain members. The name is read from the `user`
/// query parameter of the upgrade request; the HTTP authentication that would
/// normally sit in front of this is an external concern.
#[derive(Debug, Clone, Default)]
pub struct UserDirectory {
    roles: HashMap<String, Role>,
}

impl UserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Grant a role to a name
    pub fn with_role(mut self, name: impl Into<String>, role: Role) -> Self {
        self.roles.insert(name.into(), role);
        self
    }

    /// Look up a member by name
    pub fn member(&self, name: &str) -> Member {
        let role = self.roles.get(name).copied().unwrap_or_default();
        Member::new(name, role)
    }
}

impl Authenticator for UserDirectory {
    fn resolve(&self, request: &Request) -> Result<Arc<dyn User>, AuthError> {
        let name = request
            .uri()
            .query()
            .and_then(|q| {
                q.split('&')
                    .filter_map(|pair| pair.split_once('='))
                    .find(|(key, _)| *key == "user")
                    .map(|(_, value)| value)
            })
            .ok_or(AuthError::MissingUser)?;

        let valid = !name.is_empty()
            && name.len() <= MAX_NAME_LEN
            && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(AuthError::InvalidUser(name.to_string()));
        }

        Ok(Arc::new(self.member(name)))
    }
}
