//! Runtime configuration
//!
//! Everything is read from the environment with a default for each value.
//! `SessionConfig` carries the per-connection knobs into every session.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::codec::MAX_FRAME_SIZE;
use crate::error::ConfigError;
use crate::types::RoomId;
use crate::user::{Role, UserDirectory};

/// Default server address
pub const DEFAULT_ADDR: &str = "127.0.0.1:8080";

/// Time allowed between two inbound frames
pub const PONG_WAIT: Duration = Duration::from_secs(3);

/// Heartbeat period; must be shorter than `PONG_WAIT`
pub const PING_PERIOD: Duration = Duration::from_secs(2);

/// Slots in each session's outbound mailbox
pub const MAILBOX_CAPACITY: usize = 32;

/// Per-connection settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Read deadline, refreshed by every inbound frame
    pub pong_wait: Duration,
    /// Interval between outbound pings
    pub ping_period: Duration,
    /// Largest inbound frame accepted by the transport
    pub max_message_size: usize,
    /// Bound of the outbound mailbox
    pub mailbox_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            pong_wait: PONG_WAIT,
            ping_period: PING_PERIOD,
            max_message_size: MAX_FRAME_SIZE,
            mailbox_capacity: MAILBOX_CAPACITY,
        }
    }
}

impl SessionConfig {
    /// Check that at least one ping fits inside every wait window
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ping_period >= self.pong_wait {
            return Err(ConfigError::PingNotBeforeDeadline {
                ping_ms: self.ping_period.as_millis(),
                pong_ms: self.pong_wait.as_millis(),
            });
        }
        if self.mailbox_capacity == 0 {
            return Err(ConfigError::ZeroMailbox);
        }
        Ok(())
    }
}

/// Process configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Listen address
    pub addr: String,
    /// Rooms hosted by this process
    pub rooms: Vec<RoomId>,
    /// Per-connection settings
    pub session: SessionConfig,
    /// Known users and their roles
    pub users: UserDirectory,
}

impl Config {
    /// Load from `CHAT_*` variables; the first CLI argument overrides the address
    pub fn from_env() -> Result<Self, ConfigError> {
        let addr = env::args()
            .nth(1)
            .or_else(|| env::var("CHAT_ADDR").ok())
            .unwrap_or_else(|| DEFAULT_ADDR.to_string());

        let rooms = match env::var("CHAT_ROOMS") {
            Ok(raw) => parse_list("CHAT_ROOMS", &raw)?,
            Err(_) => (1..=5).map(RoomId).collect(),
        };

        let session = SessionConfig {
            pong_wait: Duration::from_millis(parse_var("CHAT_PONG_WAIT_MS", PONG_WAIT.as_millis() as u64)?),
            ping_period: Duration::from_millis(parse_var("CHAT_PING_PERIOD_MS", PING_PERIOD.as_millis() as u64)?),
            max_message_size: MAX_FRAME_SIZE,
            mailbox_capacity: parse_var("CHAT_MAILBOX_CAPACITY", MAILBOX_CAPACITY)?,
        };
        session.validate()?;

        let mut users = UserDirectory::new();
        for name in names("CHAT_MODERATORS") {
            users = users.with_role(name, Role::Moderator);
        }
        for name in names("CHAT_ADMINS") {
            users = users.with_role(name, Role::Admin);
        }

        Ok(Self {
            addr,
            rooms,
            session,
            users,
        })
    }
}

fn parse_var<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidValue { name, value: raw }),
        Err(_) => Ok(default),
    }
}

fn parse_list<T: FromStr>(name: &'static str, raw: &str) -> Result<Vec<T>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| {
            item.parse().map_err(|_| ConfigError::InvalidValue {
                name,
                value: item.to_string(),
            })
        })
        .collect()
}

fn names(var: &str) -> Vec<String> {
    env::var(var)
        .map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}
