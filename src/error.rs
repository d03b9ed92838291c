//! Error types for the session layer
//!
//! Every `AppError` ends the task that produced it. The other enums describe
//! the failures of a single collaborator (codec, hub, authentication, config).
//! Uses thiserror for ergonomic error definitions.

use thiserror::Error;

use crate::message::Action;

/// Session-fatal errors
///
/// Returned by the reader and writer loops. The lifecycle controller logs
/// them and tears the session down; none is retried.
#[derive(Debug, Error)]
pub enum AppError {
    /// WebSocket protocol or transport error
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Upgrade finished without a resolved room and user
    #[error("Handshake rejected")]
    HandshakeRejected,

    /// Inbound frame could not be decoded
    #[error("Decode error: {0}")]
    Codec(#[from] CodecError),

    /// Peer sent a binary frame
    #[error("Binary frames are not supported")]
    UnsupportedFrame,

    /// No frame arrived before the read deadline
    #[error("Read deadline elapsed")]
    ReadTimeout,

    /// Hub command channel closed
    #[error("Channel send error")]
    ChannelSend,

    /// User lacks the privilege for a moderation action
    #[error("Not enough rights for action: {0}")]
    Unauthorized(Action),

    /// Moderation action without a recipient
    #[error("Missing recipient for action: {0}")]
    MissingRecipient(Action),

    /// Hub refused or failed a moderation action
    #[error("User management error: {0}")]
    Manage(#[from] ManageError),
}

/// Wire codec errors
#[derive(Debug, Error)]
pub enum CodecError {
    /// Frame carried no bytes
    #[error("empty frame")]
    Empty,

    /// Frame exceeds the per-frame ceiling
    #[error("frame of {size} bytes exceeds the {max} byte limit")]
    TooLarge { size: usize, max: usize },

    /// `action` missing or empty
    #[error("message has no action")]
    MissingAction,

    /// Invalid JSON or schema mismatch
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Errors reported by a hub for `manage` calls
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ManageError {
    /// Recipient is not in the room
    #[error("user '{0}' is not in this room")]
    TargetNotFound(String),

    /// Action is not a moderation action
    #[error("'{0}' is not a moderation action")]
    UnsupportedAction(Action),

    /// Requesting session is no longer on the roster
    #[error("requester is not in this room")]
    RequesterAbsent,

    /// Hub task is gone
    #[error("room coordinator is unavailable")]
    HubClosed,
}

/// Identity resolution errors
#[derive(Debug, Error)]
pub enum AuthError {
    /// Request carried no identity
    #[error("no user in request")]
    MissingUser,

    /// Identity present but not acceptable
    #[error("invalid user name: {0}")]
    InvalidUser(String),
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable could not be parsed
    #[error("invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },

    /// Heartbeat period must leave room for a round trip inside the wait window
    #[error("ping period {ping_ms}ms must be shorter than pong wait {pong_ms}ms")]
    PingNotBeforeDeadline { ping_ms: u128, pong_ms: u128 },

    /// Mailboxes need at least one slot
    #[error("mailbox capacity must be at least 1")]
    ZeroMailbox,
}

/// Mailbox send errors
///
/// Occurs when the hub delivers to a session that is gone or backed up.
#[derive(Debug, Error)]
pub enum SendError {
    /// The receiving end of the channel has been closed
    #[error("Channel closed")]
    ChannelClosed,

    /// The mailbox has no free slot
    #[error("Mailbox full")]
    MailboxFull,
}
