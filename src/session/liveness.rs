//! Heartbeat and read deadline
//!
//! Two halves of one failure detector. The writer pings every
//! `ping_period`; the reader gives up if nothing (a pong or any other frame)
//! arrives within `pong_wait` of the previous frame.

use std::time::Duration;

use futures_util::{Stream, StreamExt};
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

use crate::error::AppError;

/// Sliding read deadline
#[derive(Debug)]
pub struct ReadDeadline {
    pong_wait: Duration,
    deadline: Instant,
}

impl ReadDeadline {
    /// Start a deadline `pong_wait` from now
    pub fn new(pong_wait: Duration) -> Self {
        Self {
            pong_wait,
            deadline: Instant::now() + pong_wait,
        }
    }

    /// Push the deadline to `now + pong_wait`
    pub fn refresh(&mut self) {
        self.deadline = Instant::now() + self.pong_wait;
    }

    /// Read the next item, failing with `ReadTimeout` once the deadline passes
    ///
    /// Every item that arrives in time refreshes the deadline.
    pub async fn read<S>(&mut self, stream: &mut S) -> Result<Option<S::Item>, AppError>
    where
        S: Stream + Unpin,
    {
        match tokio::time::timeout_at(self.deadline, stream.next()).await {
            Ok(item) => {
                self.refresh();
                Ok(item)
            }
            Err(_) => Err(AppError::ReadTimeout),
        }
    }
}

/// Ticker for outbound pings
///
/// The first tick fires one full period after creation. Ticks missed while a
/// write was blocked are not replayed in a burst.
pub fn heartbeat(ping_period: Duration) -> Interval {
    let mut ticker = interval_at(Instant::now() + ping_period, ping_period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}
