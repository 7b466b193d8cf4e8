//! Network quiescence detection.
//!
//! A wait owns the page's request-lifecycle event stream for its whole
//! duration. The stream is dropped on every exit path, which detaches the
//! underlying listeners, so nothing leaks into the next scroll round.

pub use crate::{log_trace, log_warn};
use futures::stream::BoxStream;
use futures::StreamExt;
use std::pin::Pin;
use std::time::Duration;
use tokio::time::{sleep, Instant, Sleep};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkEvent {
    RequestStarted,
    RequestFinished,
    RequestFailed,
}

pub type NetworkEvents = BoxStream<'static, NetworkEvent>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quiescence {
    /// No event for a full idle window. Requests may still be pending.
    Idle { in_flight: usize, events: usize },
    /// The hard timeout fired first; the caller proceeds as if idle.
    TimedOut { in_flight: usize, events: usize },
}

impl Quiescence {
    pub fn timed_out(&self) -> bool {
        matches!(self, Quiescence::TimedOut { .. })
    }
}

pub struct NetworkActivityState {
    events: NetworkEvents,
    closed: bool,
    in_flight: usize,
    seen: usize,
    idle_window: Duration,
    idle_timer: Pin<Box<Sleep>>,
}

impl NetworkActivityState {
    fn new(events: NetworkEvents, idle_window: Duration) -> Self {
        Self {
            events,
            closed: false,
            in_flight: 0,
            seen: 0,
            idle_window,
            idle_timer: Box::pin(sleep(idle_window)),
        }
    }

    // Counter update and timer reset happen together, one event at a time.
    fn record(&mut self, event: NetworkEvent) {
        match event {
            NetworkEvent::RequestStarted => self.in_flight += 1,
            NetworkEvent::RequestFinished | NetworkEvent::RequestFailed => {
                self.in_flight = self.in_flight.saturating_sub(1)
            }
        }
        self.seen += 1;
        self.idle_timer
            .as_mut()
            .reset(Instant::now() + self.idle_window);
    }
}

impl Drop for NetworkActivityState {
    fn drop(&mut self) {
        log_trace!(
            "[network] Detached listeners after {} event(s), {} in flight",
            self.seen,
            self.in_flight
        );
    }
}

/// Resolves once the page has gone `idle_window` without any request
/// starting, finishing or failing, or once `hard_timeout` has elapsed.
pub async fn await_quiescence(
    events: NetworkEvents,
    idle_window: Duration,
    hard_timeout: Duration,
) -> Quiescence {
    let mut state = NetworkActivityState::new(events, idle_window);
    let deadline = sleep(hard_timeout);
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            biased;

            _ = &mut deadline => {
                log_warn!(
                    "[network] Still busy after {:?} ({} in flight), proceeding anyway",
                    hard_timeout,
                    state.in_flight
                );
                return Quiescence::TimedOut {
                    in_flight: state.in_flight,
                    events: state.seen,
                };
            }
            _ = &mut state.idle_timer => {
                return Quiescence::Idle {
                    in_flight: state.in_flight,
                    events: state.seen,
                };
            }
            event = state.events.next(), if !state.closed => match event {
                Some(event) => state.record(event),
                None => state.closed = true,
            },
        }
    }
}
