//! Session reader
//!
//! Pulls frames off the connection under the read deadline, decodes them and
//! routes them to the hub. Returns `Ok(())` on a clean close and an error for
//! every condition that should end the session.

use std::sync::Arc;

use futures_util::Stream;
use tokio_tungstenite::tungstenite::{Error as WsError, Message as WsMessage};
use tracing::{debug, trace};

use crate::codec;
use crate::config::SessionConfig;
use crate::error::{AppError, CodecError};
use crate::hub::HubHandle;
use crate::message::{Action, Message, UserRef};
use crate::session::liveness::ReadDeadline;
use crate::types::{RoomId, SessionId};
use crate::user::User;

pub struct Reader<S> {
    stream: S,
    hub: HubHandle,
    user: Arc<dyn User>,
    room: RoomId,
    session_id: SessionId,
    deadline: ReadDeadline,
    max_message_size: usize,
}

impl<S> Reader<S>
where
    S: Stream<Item = Result<WsMessage, WsError>> + Unpin,
{
    pub fn new(
        stream: S,
        hub: HubHandle,
        user: Arc<dyn User>,
        session_id: SessionId,
        config: &SessionConfig,
    ) -> Self {
        let room = hub.room();
        Self {
            stream,
            hub,
            user,
            room,
            session_id,
            deadline: ReadDeadline::new(config.pong_wait),
            max_message_size: config.max_message_size,
        }
    }

    pub async fn run(mut self) -> Result<(), AppError> {
        loop {
            let frame = match self.deadline.read(&mut self.stream).await? {
                Some(Ok(frame)) => frame,
                Some(Err(WsError::ConnectionClosed | WsError::AlreadyClosed)) | None => {
                    debug!(session_id = %self.session_id, "Connection closed");
                    return Ok(());
                }
                Some(Err(e)) => return Err(e.into()),
            };

            match frame {
                WsMessage::Text(text) => {
                    if text.len() > self.max_message_size {
                        return Err(CodecError::TooLarge {
                            size: text.len(),
                            max: self.max_message_size,
                        }
                        .into());
                    }
                    let msg = codec::decode(&text)?;
                    self.dispatch(msg).await?;
                }
                WsMessage::Binary(_) => return Err(AppError::UnsupportedFrame),
                WsMessage::Ping(_) => {
                    // Pong is handled automatically by tungstenite
                    trace!(session_id = %self.session_id, "Ping received");
                }
                WsMessage::Pong(_) => {
                    trace!(session_id = %self.session_id, "Pong received");
                }
                WsMessage::Close(_) => {
                    debug!(session_id = %self.session_id, "Peer sent close frame");
                    return Ok(());
                }
                WsMessage::Frame(_) => {}
            }
        }
    }

    /// Stamp server-side fields and route by action
    async fn dispatch(&self, mut msg: Message) -> Result<(), AppError> {
        msg.room = Some(self.room);
        if let Some(recipient) = msg.recipient.as_mut() {
            recipient.add_room_info(self.room);
        }

        let action = msg.action.clone();
        match action {
            Action::Message => {
                msg.sender = Some(UserRef::new(self.user.name()));
                self.hub.broadcast(self.session_id, msg).await
            }
            Action::Mute | Action::Kick | Action::Ban => {
                if !self.user.has_privilege(&action) {
                    return Err(AppError::Unauthorized(action));
                }
                let target = msg
                    .recipient
                    .take()
                    .ok_or_else(|| AppError::MissingRecipient(action.clone()))?;
                debug!(
                    session_id = %self.session_id,
                    actor = %self.user.name(),
                    target = %target.name,
                    "Requesting {}", action
                );
                self.hub
                    .manage(self.session_id, self.user.name(), target, action)
                    .await?;
                Ok(())
            }
            other => {
                trace!(session_id = %self.session_id, action = %other, "Ignoring action");
                Ok(())
            }
        }
    }
}
