//! Session lifecycle
//!
//! Runs one connection from registration to teardown:
//!
//! ```text
//! Connecting -> Active -> Terminating -> Closed
//! ```
//!
//! The reader and writer run as separate tasks. Whichever of them ends first
//! fires the shared `Teardown`, which enqueues the only unregistration this
//! session will ever produce. A writer that stops (killed, mailbox closed or
//! write failure) takes the reader down with it.

pub mod liveness;
pub mod reader;
pub mod writer;

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures_util::{Sink, Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::{Error as WsError, Message as WsMessage};
use tracing::{debug, info, warn};

pub use reader::Reader;
pub use writer::Writer;

use crate::client::Client;
use crate::config::SessionConfig;
use crate::error::AppError;
use crate::hub::HubHandle;
use crate::types::SessionId;
use crate::user::User;

/// Lifecycle state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Transport upgraded, not yet registered
    Connecting,
    /// Registered; reader and writer running
    Active,
    /// One side has ended and unregistration was enqueued
    Terminating,
    /// Both sides have ended
    Closed,
}

/// Fire-once unregistration shared by the reader and writer
#[derive(Debug)]
pub struct Teardown {
    fired: AtomicBool,
    hub: HubHandle,
    session_id: SessionId,
    notice: String,
}

impl Teardown {
    pub fn new(hub: HubHandle, session_id: SessionId, notice: String) -> Self {
        Self {
            fired: AtomicBool::new(false),
            hub,
            session_id,
            notice,
        }
    }

    /// Enqueue the unregistration unless it was already enqueued
    ///
    /// Returns true for the call that actually enqueued it.
    pub async fn fire(&self, side: &'static str) -> bool {
        if self.fired.swap(true, Ordering::AcqRel) {
            debug!(session_id = %self.session_id, side, "Teardown already fired");
            return false;
        }

        debug!(session_id = %self.session_id, side, "Unregistering session");
        if let Err(e) = self.hub.unregister(self.session_id, self.notice.clone()).await {
            warn!(session_id = %self.session_id, error = %e, "Hub gone before unregistration");
        }
        true
    }
}

/// Run one session over an upgraded connection
///
/// Returns once both sides have stopped. The only error returned is a failed
/// registration; errors inside the reader or writer end the session and are
/// logged.
pub async fn run<S>(
    ws: S,
    hub: HubHandle,
    user: Arc<dyn User>,
    config: &SessionConfig,
) -> Result<(), AppError>
where
    S: Stream<Item = Result<WsMessage, WsError>> + Sink<WsMessage, Error = WsError> + Send + 'static,
{
    let session_id = SessionId::new();
    let mut state = SessionState::Connecting;
    debug!(session_id = %session_id, user = %user.name(), room = %hub.room(), ?state, "Session starting");

    let (mailbox_tx, mailbox_rx) = mpsc::channel(config.mailbox_capacity);
    hub.register(Client::new(session_id, user.clone(), mailbox_tx)).await?;

    state = SessionState::Active;
    info!(session_id = %session_id, user = %user.name(), room = %hub.room(), ?state, "Session active");

    let (sink, stream) = ws.split();
    let teardown = Arc::new(Teardown::new(
        hub.clone(),
        session_id,
        format!("{} has gone", user.name()),
    ));

    let writer = Writer::new(sink, mailbox_rx, liveness::heartbeat(config.ping_period), session_id);
    let reader = Reader::new(stream, hub, user, session_id, config);

    let mut writer_task = tokio::spawn(run_side("writer", session_id, writer.run(), teardown.clone()));
    let mut reader_task = tokio::spawn(run_side("reader", session_id, reader.run(), teardown.clone()));

    let reader_first = tokio::select! {
        _ = &mut reader_task => true,
        _ = &mut writer_task => false,
    };
    let (first, mut remaining) = if reader_first {
        ("reader", writer_task)
    } else {
        ("writer", reader_task)
    };

    // Covers a side that panicked before reaching its own teardown.
    teardown.fire("lifecycle").await;
    state = SessionState::Terminating;
    debug!(session_id = %session_id, first, ?state, "First side ended");

    if reader_first {
        // The writer stops once the hub drops its mailbox handle.
        if tokio::time::timeout(config.pong_wait, &mut remaining).await.is_err() {
            debug!(session_id = %session_id, "Writer still running, aborting");
            remaining.abort();
        }
    } else {
        // No frame is written after the writer stops. Dropping the read half
        // closes the connection so a killed peer cannot keep talking.
        remaining.abort();
        let _ = remaining.await;
    }

    state = SessionState::Closed;
    info!(session_id = %session_id, ?state, "Session closed");
    Ok(())
}

/// Run one side of the session, then fire the teardown
async fn run_side<F>(side: &'static str, session_id: SessionId, task: F, teardown: Arc<Teardown>)
where
    F: Future<Output = Result<(), AppError>>,
{
    match task.await {
        Ok(()) => debug!(session_id = %session_id, side, "Loop ended"),
        Err(e) => log_failure(side, session_id, &e),
    }
    teardown.fire(side).await;
}

fn log_failure(side: &'static str, session_id: SessionId, err: &AppError) {
    match err {
        AppError::ReadTimeout => {
            info!(session_id = %session_id, side, "Peer stopped responding");
        }
        AppError::Unauthorized(_) | AppError::MissingRecipient(_) => {
            warn!(session_id = %session_id, side, error = %err, "Moderation refused");
        }
        AppError::Codec(_) | AppError::UnsupportedFrame => {
            warn!(session_id = %session_id, side, error = %err, "Protocol error");
        }
        _ => {
            warn!(session_id = %session_id, side, error = %err, "Session task failed");
        }
    }
}
