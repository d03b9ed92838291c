//! Hub actor implementation
//!
//! One hub per room owns that room's roster and serializes registration,
//! unregistration, broadcast and moderation by processing its command queue
//! one command at a time. Sessions talk to it only through a `HubHandle`.

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::client::Client;
use crate::error::{AppError, ManageError, SendError};
use crate::message::{Action, Message, UserRef};
use crate::room::Room;
use crate::types::{RoomId, SessionId};

/// Channel buffer size for hub commands
pub const HUB_CHANNEL_SIZE: usize = 256;

/// Commands sent from sessions to a hub
#[derive(Debug)]
pub enum HubCommand {
    /// New session joined the room
    Register { client: Client },
    /// Session ended; `notice` is broadcast to the remaining members
    Unregister {
        session_id: SessionId,
        notice: String,
    },
    /// Chat message for every member, sent by `session_id`
    Broadcast {
        session_id: SessionId,
        message: Message,
    },
    /// Moderation request; the outcome is sent back on `reply`
    Manage {
        session_id: SessionId,
        actor: String,
        target: UserRef,
        action: Action,
        reply: oneshot::Sender<Result<(), ManageError>>,
    },
}

/// Sending side of a hub
#[derive(Debug, Clone)]
pub struct HubHandle {
    room: RoomId,
    sender: mpsc::Sender<HubCommand>,
}

impl HubHandle {
    pub fn new(room: RoomId, sender: mpsc::Sender<HubCommand>) -> Self {
        Self { room, sender }
    }

    /// Room served by this hub
    pub fn room(&self) -> RoomId {
        self.room
    }

    pub async fn register(&self, client: Client) -> Result<(), AppError> {
        self.submit(HubCommand::Register { client }).await
    }

    pub async fn unregister(&self, session_id: SessionId, notice: String) -> Result<(), AppError> {
        self.submit(HubCommand::Unregister { session_id, notice }).await
    }

    /// Hand a chat message to the hub without waiting for delivery
    pub async fn broadcast(&self, session_id: SessionId, message: Message) -> Result<(), AppError> {
        self.submit(HubCommand::Broadcast { session_id, message }).await
    }

    /// Apply a moderation action and wait for the outcome
    pub async fn manage(
        &self,
        session_id: SessionId,
        actor: &str,
        target: UserRef,
        action: Action,
    ) -> Result<(), ManageError> {
        let (reply, outcome) = oneshot::channel();
        let cmd = HubCommand::Manage {
            session_id,
            actor: actor.to_string(),
            target,
            action,
            reply,
        };
        self.sender.send(cmd).await.map_err(|_| ManageError::HubClosed)?;
        outcome.await.map_err(|_| ManageError::HubClosed)?
    }

    async fn submit(&self, cmd: HubCommand) -> Result<(), AppError> {
        self.sender.send(cmd).await.map_err(|_| AppError::ChannelSend)
    }
}

/// The per-room hub actor
pub struct Hub {
    /// Roster of this room
    room: Room,
    /// Command receiver channel
    receiver: mpsc::Receiver<HubCommand>,
}

impl Hub {
    pub fn new(room: RoomId, receiver: mpsc::Receiver<HubCommand>) -> Self {
        Self {
            room: Room::new(room),
            receiver,
        }
    }

    /// Start a hub task for a room and return its handle
    pub fn spawn(room: RoomId) -> HubHandle {
        let (tx, rx) = mpsc::channel(HUB_CHANNEL_SIZE);
        tokio::spawn(Hub::new(room, rx).run());
        HubHandle::new(room, tx)
    }

    /// Run the hub event loop until every handle is dropped
    pub async fn run(mut self) {
        info!(room = %self.room.id, "Hub started");

        while let Some(cmd) = self.receiver.recv().await {
            self.handle_command(cmd).await;
        }

        info!(room = %self.room.id, "Hub shutting down");
    }

    async fn handle_command(&mut self, cmd: HubCommand) {
        match cmd {
            HubCommand::Register { client } => {
                self.handle_register(client).await;
            }
            HubCommand::Unregister { session_id, notice } => {
                self.handle_unregister(session_id, notice);
            }
            HubCommand::Broadcast { session_id, message } => {
                self.handle_broadcast(session_id, message);
            }
            HubCommand::Manage {
                session_id,
                actor,
                target,
                action,
                reply,
            } => {
                let outcome = if self.room.contains(session_id) {
                    self.handle_manage(&actor, &target, &action)
                } else {
                    debug!(session_id = %session_id, "Manage from absent session refused");
                    Err(ManageError::RequesterAbsent)
                };
                if reply.send(outcome).is_err() {
                    debug!(room = %self.room.id, "Manage requester went away");
                }
            }
        }
    }

    async fn handle_register(&mut self, client: Client) {
        let name = client.name().to_string();

        if !self.room.add(client.clone()) {
            info!(room = %self.room.id, user = %name, "Refusing banned user");
            let bye = Message::bye(self.room.id, format!("{} is banned from this room", name));
            if client.kill(bye).await.is_err() {
                debug!(session_id = %client.id, "Banned session already gone");
            }
            return;
        }

        info!(room = %self.room.id, user = %name, session_id = %client.id, "Session registered");
        self.deliver_all(Message::notice(self.room.id, format!("{} has joined", name)));
        debug!(room = %self.room.id, "Members: {}", self.room.len());
    }

    fn handle_unregister(&mut self, session_id: SessionId, notice: String) {
        let Some(client) = self.room.remove(session_id) else {
            debug!(session_id = %session_id, "Unregister for absent session ignored");
            return;
        };

        info!(room = %self.room.id, user = %client.name(), session_id = %session_id, "Session unregistered");
        self.deliver_all(Message::notice(self.room.id, notice));
        debug!(room = %self.room.id, "Members: {}", self.room.len());
    }

    fn handle_broadcast(&mut self, session_id: SessionId, message: Message) {
        // Kicked or banned sessions may still have frames in flight.
        if !self.room.contains(session_id) {
            debug!(session_id = %session_id, "Dropping message from absent session");
            return;
        }
        if let Some(sender) = &message.sender {
            if self.room.is_muted(&sender.name) {
                debug!(room = %self.room.id, user = %sender.name, "Dropping message from muted user");
                return;
            }
        }
        self.deliver_all(message);
    }

    fn handle_manage(&mut self, actor: &str, target: &UserRef, action: &Action) -> Result<(), ManageError> {
        let name = target.name.as_str();

        match action {
            Action::Mute => {
                if !self.room.has_user(name) {
                    return Err(ManageError::TargetNotFound(name.to_string()));
                }
                let muted = self.room.toggle_mute(name);
                let verb = if muted { "muted" } else { "unmuted" };
                info!(room = %self.room.id, actor = %actor, target = %name, "User {}", verb);
                self.deliver_all(Message::notice(
                    self.room.id,
                    format!("{} was {} by {}", name, verb, actor),
                ));
                Ok(())
            }
            Action::Kick | Action::Ban => {
                let sessions = self.room.take_sessions_of(name);
                if sessions.is_empty() {
                    return Err(ManageError::TargetNotFound(name.to_string()));
                }

                let verb = if *action == Action::Ban {
                    self.room.ban(name);
                    "banned"
                } else {
                    "kicked"
                };
                info!(room = %self.room.id, actor = %actor, target = %name, "User {}", verb);

                for client in sessions {
                    let bye = Message::bye(self.room.id, format!("You were {} by {}", verb, actor));
                    // The target's mailbox may be full; the hub must not wait on it.
                    tokio::spawn(async move {
                        if client.kill(bye).await.is_err() {
                            debug!(session_id = %client.id, "Session gone before kill");
                        }
                    });
                }

                self.deliver_all(Message::notice(
                    self.room.id,
                    format!("{} was {} by {}", name, verb, actor),
                ));
                Ok(())
            }
            other => Err(ManageError::UnsupportedAction(other.clone())),
        }
    }

    /// Queue a message in every member's mailbox
    ///
    /// Full mailboxes drop the message for that member only.
    fn deliver_all(&self, message: Message) {
        for client in self.room.members() {
            match client.deliver(message.clone()) {
                Ok(()) => {}
                Err(SendError::MailboxFull) => {
                    warn!(session_id = %client.id, user = %client.name(), "Mailbox full, message dropped");
                }
                Err(SendError::ChannelClosed) => {
                    debug!(session_id = %client.id, "Mailbox closed");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::client::Outbound;
    use crate::user::{Member, Role};

    fn client(name: &str) -> (Client, mpsc::Receiver<Outbound>) {
        let (tx, rx) = mpsc::channel(8);
        let user = Arc::new(Member::new(name, Role::Member));
        (Client::new(SessionId::new(), user, tx), rx)
    }

    async fn next(rx: &mut mpsc::Receiver<Outbound>) -> Outbound {
        tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("timed out")
            .expect("mailbox closed")
    }

    fn text_of(out: &Outbound) -> &str {
        match out {
            Outbound::Deliver(m) | Outbound::Kill(m) => m.text.as_deref().unwrap_or_default(),
        }
    }

    fn chat_from(name: &str, text: &str) -> Message {
        let mut msg = Message::chat(text);
        msg.sender = Some(UserRef::new(name));
        msg
    }

    #[tokio::test]
    async fn test_register_broadcast_unregister() {
        let hub = Hub::spawn(RoomId(5));
        let (alice, mut alice_rx) = client("alice");
        let (bob, mut bob_rx) = client("bob");
        let (alice_id, bob_id) = (alice.id, bob.id);

        hub.register(alice).await.unwrap();
        assert_eq!(text_of(&next(&mut alice_rx).await), "alice has joined");

        hub.register(bob).await.unwrap();
        assert_eq!(text_of(&next(&mut alice_rx).await), "bob has joined");
        assert_eq!(text_of(&next(&mut bob_rx).await), "bob has joined");

        let msg = chat_from("alice", "hi");
        hub.broadcast(alice_id, msg.clone()).await.unwrap();
        assert_eq!(next(&mut alice_rx).await, Outbound::Deliver(msg.clone()));
        assert_eq!(next(&mut bob_rx).await, Outbound::Deliver(msg));

        hub.unregister(bob_id, "bob has gone".to_string()).await.unwrap();
        assert_eq!(text_of(&next(&mut alice_rx).await), "bob has gone");

        // Second unregistration of the same session is ignored
        hub.unregister(bob_id, "bob has gone".to_string()).await.unwrap();
        hub.broadcast(alice_id, chat_from("alice", "ping")).await.unwrap();
        assert_eq!(text_of(&next(&mut alice_rx).await), "ping");
    }

    #[tokio::test]
    async fn test_broadcast_from_absent_session_is_dropped() {
        let hub = Hub::spawn(RoomId(5));
        let (alice, mut alice_rx) = client("alice");
        let alice_id = alice.id;
        hub.register(alice).await.unwrap();
        next(&mut alice_rx).await;

        hub.broadcast(SessionId::new(), chat_from("bob", "sneaky")).await.unwrap();
        hub.broadcast(alice_id, chat_from("alice", "hello")).await.unwrap();
        assert_eq!(text_of(&next(&mut alice_rx).await), "hello");
    }

    #[tokio::test]
    async fn test_manage_unknown_target() {
        let hub = Hub::spawn(RoomId(1));
        let (root, _root_rx) = client("root");
        let root_id = root.id;
        hub.register(root).await.unwrap();

        let result = hub.manage(root_id, "root", UserRef::new("ghost"), Action::Kick).await;
        assert_eq!(result, Err(ManageError::TargetNotFound("ghost".to_string())));
    }

    #[tokio::test]
    async fn test_manage_from_absent_session_is_refused() {
        let hub = Hub::spawn(RoomId(1));
        let (bob, mut bob_rx) = client("bob");
        hub.register(bob).await.unwrap();
        next(&mut bob_rx).await;

        let result = hub.manage(SessionId::new(), "root", UserRef::new("bob"), Action::Kick).await;
        assert_eq!(result, Err(ManageError::RequesterAbsent));
        assert!(bob_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_manage_rejects_non_moderation_action() {
        let hub = Hub::spawn(RoomId(1));
        let (root, _root_rx) = client("root");
        let root_id = root.id;
        hub.register(root).await.unwrap();

        let result = hub.manage(root_id, "root", UserRef::new("bob"), Action::Message).await;
        assert_eq!(result, Err(ManageError::UnsupportedAction(Action::Message)));
    }

    #[tokio::test]
    async fn test_mute_drops_broadcasts() {
        let hub = Hub::spawn(RoomId(1));
        let (alice, mut alice_rx) = client("alice");
        let (bob, _bob_rx) = client("bob");
        let (alice_id, bob_id) = (alice.id, bob.id);
        hub.register(alice).await.unwrap();
        hub.register(bob).await.unwrap();
        next(&mut alice_rx).await;
        next(&mut alice_rx).await;

        hub.manage(alice_id, "alice", UserRef::new("bob"), Action::Mute).await.unwrap();
        assert_eq!(text_of(&next(&mut alice_rx).await), "bob was muted by alice");

        hub.broadcast(bob_id, chat_from("bob", "spam")).await.unwrap();
        hub.broadcast(alice_id, chat_from("alice", "hello")).await.unwrap();
        assert_eq!(text_of(&next(&mut alice_rx).await), "hello");
    }

    #[tokio::test]
    async fn test_kick_removes_sender_from_roster() {
        let hub = Hub::spawn(RoomId(1));
        let (root, mut root_rx) = client("root");
        let (bob, mut bob_rx) = client("bob");
        let (root_id, bob_id) = (root.id, bob.id);
        hub.register(root).await.unwrap();
        hub.register(bob).await.unwrap();
        next(&mut root_rx).await;
        next(&mut root_rx).await;
        next(&mut bob_rx).await;

        hub.manage(root_id, "root", UserRef::new("bob"), Action::Kick).await.unwrap();
        assert_eq!(text_of(&next(&mut root_rx).await), "bob was kicked by root");
        assert!(matches!(next(&mut bob_rx).await, Outbound::Kill(_)));

        hub.broadcast(bob_id, chat_from("bob", "still here")).await.unwrap();
        let result = hub.manage(bob_id, "bob", UserRef::new("root"), Action::Kick).await;
        assert_eq!(result, Err(ManageError::RequesterAbsent));

        hub.broadcast(root_id, chat_from("root", "quiet now")).await.unwrap();
        assert_eq!(text_of(&next(&mut root_rx).await), "quiet now");
    }

    #[tokio::test]
    async fn test_ban_kills_and_refuses_rejoin() {
        let hub = Hub::spawn(RoomId(1));
        let (root, _root_rx) = client("root");
        let (bob, mut bob_rx) = client("bob");
        let root_id = root.id;
        hub.register(root).await.unwrap();
        hub.register(bob).await.unwrap();
        next(&mut bob_rx).await;

        hub.manage(root_id, "root", UserRef::new("bob"), Action::Ban).await.unwrap();
        let out = next(&mut bob_rx).await;
        assert!(matches!(out, Outbound::Kill(_)));
        assert_eq!(text_of(&out), "You were banned by root");

        let (again, mut again_rx) = client("bob");
        hub.register(again).await.unwrap();
        let out = next(&mut again_rx).await;
        assert!(matches!(out, Outbound::Kill(_)));
        assert_eq!(text_of(&out), "bob is banned from this room");
    }

    #[tokio::test]
    async fn test_manage_on_closed_hub() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let hub = HubHandle::new(RoomId(1), tx);
        let result = hub.manage(SessionId::new(), "root", UserRef::new("bob"), Action::Kick).await;
        assert_eq!(result, Err(ManageError::HubClosed));
        assert!(matches!(
            hub.broadcast(SessionId::new(), Message::chat("x")).await,
            Err(AppError::ChannelSend)
        ));
    }
}
