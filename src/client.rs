//! Hub-facing handle of a session
//!
//! A `Client` is what the hub keeps in its roster: the session's identity
//! plus the sending half of its outbound mailbox. Every write to the
//! connection, including a forced kill, goes through that mailbox so the
//! session writer stays the only task touching the socket.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::error::SendError;
use crate::message::Message;
use crate::types::SessionId;
use crate::user::User;

/// Item in a session's outbound mailbox
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    /// Write the message and keep going
    Deliver(Message),
    /// Write the bye notice, close the connection and stop
    Kill(Message),
}

/// Connected session as seen by the hub
#[derive(Debug, Clone)]
pub struct Client {
    /// Unique identifier for this session
    pub id: SessionId,
    /// Authenticated user
    pub user: Arc<dyn User>,
    /// Hub → session mailbox
    pub mailbox: mpsc::Sender<Outbound>,
}

impl Client {
    pub fn new(id: SessionId, user: Arc<dyn User>, mailbox: mpsc::Sender<Outbound>) -> Self {
        Self { id, user, mailbox }
    }

    pub fn name(&self) -> &str {
        self.user.name()
    }

    /// Queue a message without waiting
    ///
    /// Fails if the mailbox is full or the session has gone away.
    pub fn deliver(&self, msg: Message) -> Result<(), SendError> {
        self.mailbox.try_send(Outbound::Deliver(msg)).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SendError::MailboxFull,
            mpsc::error::TrySendError::Closed(_) => SendError::ChannelClosed,
        })
    }

    /// End the session with a bye notice
    ///
    /// Waits for mailbox space so the notice is not lost behind a burst of
    /// regular traffic.
    pub async fn kill(&self, bye: Message) -> Result<(), SendError> {
        self.mailbox
            .send(Outbound::Kill(bye))
            .await
            .map_err(|_| SendError::ChannelClosed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RoomId;
    use crate::user::{Member, Role};

    fn client(capacity: usize) -> (Client, mpsc::Receiver<Outbound>) {
        let (tx, rx) = mpsc::channel(capacity);
        let user = Arc::new(Member::new("alice", Role::Member));
        (Client::new(SessionId::new(), user, tx), rx)
    }

    #[tokio::test]
    async fn test_deliver_and_kill_share_the_mailbox() {
        let (client, mut rx) = client(4);
        assert_eq!(client.name(), "alice");

        client.deliver(Message::chat("hi")).unwrap();
        client.kill(Message::bye(RoomId(1), "bye")).await.unwrap();

        assert_eq!(rx.recv().await, Some(Outbound::Deliver(Message::chat("hi"))));
        assert!(matches!(rx.recv().await, Some(Outbound::Kill(_))));
    }

    #[tokio::test]
    async fn test_deliver_full_mailbox() {
        let (client, _rx) = client(1);
        client.deliver(Message::chat("1")).unwrap();
        assert!(matches!(
            client.deliver(Message::chat("2")),
            Err(SendError::MailboxFull)
        ));
    }

    #[tokio::test]
    async fn test_deliver_closed_mailbox() {
        let (client, rx) = client(1);
        drop(rx);
        assert!(matches!(
            client.deliver(Message::chat("1")),
            Err(SendError::ChannelClosed)
        ));
        assert!(client.kill(Message::bye(RoomId(1), "bye")).await.is_err());
    }
}
