//! Session writer
//!
//! The only task that writes to the connection. Waits on the outbound
//! mailbox and the heartbeat ticker at the same time, so pings and delivered
//! messages leave in one total order.

use futures_util::{Sink, SinkExt};
use tokio::sync::mpsc;
use tokio::time::Interval;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{Error as WsError, Message as WsMessage};
use tracing::{debug, trace, warn};

use crate::client::Outbound;
use crate::codec;
use crate::error::AppError;
use crate::message::Message;
use crate::types::SessionId;

pub struct Writer<K> {
    sink: K,
    mailbox: mpsc::Receiver<Outbound>,
    ticker: Interval,
    session_id: SessionId,
}

impl<K> Writer<K>
where
    K: Sink<WsMessage, Error = WsError> + Unpin,
{
    pub fn new(sink: K, mailbox: mpsc::Receiver<Outbound>, ticker: Interval, session_id: SessionId) -> Self {
        Self {
            sink,
            mailbox,
            ticker,
            session_id,
        }
    }

    /// Run until a write fails, a kill arrives, or the mailbox closes
    ///
    /// The ticker is dropped with `self` when this returns.
    pub async fn run(mut self) -> Result<(), AppError> {
        loop {
            tokio::select! {
                item = self.mailbox.recv() => match item {
                    Some(Outbound::Deliver(msg)) => self.deliver(&msg).await?,
                    Some(Outbound::Kill(bye)) => {
                        debug!(session_id = %self.session_id, "Killing session");
                        return self.kill(&bye).await;
                    }
                    None => {
                        debug!(session_id = %self.session_id, "Mailbox closed");
                        if let Err(e) = self.sink.close().await {
                            trace!(session_id = %self.session_id, error = %e, "Close after mailbox end failed");
                        }
                        return Ok(());
                    }
                },
                _ = self.ticker.tick() => {
                    trace!(session_id = %self.session_id, "Sending ping");
                    self.sink.send(WsMessage::Ping(Vec::<u8>::new().into())).await?;
                }
            }
        }
    }

    /// Encode and write one message
    ///
    /// A message that cannot be encoded is dropped; the session continues.
    async fn deliver(&mut self, msg: &Message) -> Result<(), AppError> {
        let text = match codec::encode(msg) {
            Ok(text) => text,
            Err(e) => {
                warn!(session_id = %self.session_id, error = %e, "Dropping unencodable message");
                return Ok(());
            }
        };
        self.sink.send(WsMessage::Text(text.into())).await?;
        Ok(())
    }

    /// Write the bye notice, then a close frame
    async fn kill(&mut self, bye: &Message) -> Result<(), AppError> {
        let text = codec::encode(bye)?;
        self.sink.send(WsMessage::Text(text.into())).await?;

        let frame = CloseFrame {
            code: CloseCode::Normal,
            reason: "bye".into(),
        };
        self.sink.send(WsMessage::Close(Some(frame))).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use futures_util::sink;

    use super::*;
    use crate::message::Action;
    use crate::session::liveness::heartbeat;
    use crate::types::RoomId;

    fn recording_sink() -> (
        impl Sink<WsMessage, Error = WsError> + Unpin,
        mpsc::UnboundedReceiver<WsMessage>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        let sink = Box::pin(sink::unfold(tx, |tx, frame: WsMessage| async move {
            tx.send(frame).map_err(|_| WsError::ConnectionClosed)?;
            Ok::<_, WsError>(tx)
        }));
        (sink, rx)
    }

    fn writer<K>(sink: K) -> (Writer<K>, mpsc::Sender<Outbound>)
    where
        K: Sink<WsMessage, Error = WsError> + Unpin,
    {
        let (tx, rx) = mpsc::channel(8);
        let writer = Writer::new(sink, rx, heartbeat(Duration::from_secs(2)), SessionId::new());
        (writer, tx)
    }

    fn as_text(frame: WsMessage) -> String {
        match frame {
            WsMessage::Text(text) => text.to_string(),
            other => panic!("expected text frame, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_delivers_text_frames_and_stops_on_mailbox_close() {
        let (sink, mut frames) = recording_sink();
        let (writer, mailbox) = writer(sink);

        mailbox.send(Outbound::Deliver(Message::chat("one"))).await.unwrap();
        mailbox.send(Outbound::Deliver(Message::chat("two"))).await.unwrap();
        drop(mailbox);
        writer.run().await.unwrap();

        assert_eq!(as_text(frames.recv().await.unwrap()), r#"{"action":"message","text":"one"}"#);
        assert_eq!(as_text(frames.recv().await.unwrap()), r#"{"action":"message","text":"two"}"#);
    }

    #[tokio::test]
    async fn test_unencodable_message_is_dropped() {
        let (sink, mut frames) = recording_sink();
        let (writer, mailbox) = writer(sink);

        let mut bad = Message::chat("bad");
        bad.action = Action::Other(String::new());
        mailbox.send(Outbound::Deliver(bad)).await.unwrap();
        mailbox.send(Outbound::Deliver(Message::chat("good"))).await.unwrap();
        drop(mailbox);
        writer.run().await.unwrap();

        assert!(as_text(frames.recv().await.unwrap()).contains("good"));
    }

    #[tokio::test]
    async fn test_kill_writes_bye_then_close() {
        let (sink, mut frames) = recording_sink();
        let (writer, mailbox) = writer(sink);

        mailbox
            .send(Outbound::Kill(Message::bye(RoomId(1), "You were kicked by root")))
            .await
            .unwrap();
        mailbox.send(Outbound::Deliver(Message::chat("never"))).await.unwrap();
        writer.run().await.unwrap();

        let bye = as_text(frames.recv().await.unwrap());
        assert!(bye.contains("\"action\":\"bye\""));
        assert!(matches!(frames.recv().await, Some(WsMessage::Close(Some(_)))));
        assert!(frames.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_pings_on_every_tick() {
        let (sink, mut frames) = recording_sink();
        let (writer, mailbox) = writer(sink);
        let task = tokio::spawn(writer.run());

        assert!(matches!(frames.recv().await, Some(WsMessage::Ping(_))));
        assert!(matches!(frames.recv().await, Some(WsMessage::Ping(_))));

        drop(mailbox);
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_write_failure_is_fatal() {
        let failing = Box::pin(sink::unfold((), |(), _frame: WsMessage| async {
            Err::<(), _>(WsError::ConnectionClosed)
        }));
        let (writer, mailbox) = writer(failing);

        mailbox.send(Outbound::Deliver(Message::chat("x"))).await.unwrap();
        assert!(matches!(writer.run().await, Err(AppError::WebSocket(_))));
    }
}
