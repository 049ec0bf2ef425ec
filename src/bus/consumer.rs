//! Per-event-type consumer loops.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::oneshot;
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tracing::Instrument;

use super::dispatcher::{DispatchOutcome, Dispatcher};
use crate::transport::{Channel, QueueOptions, Transport, TransportError};

/// Counters from a consumer loop.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConsumerStats {
    /// Messages taken off the queue.
    pub received: usize,
    /// Messages every bound handler processed.
    pub handled: usize,
    /// Messages that arrived with no handler bound.
    pub ignored: usize,
    /// Messages whose dispatch failed.
    pub failed: usize,
}

#[derive(Default)]
struct Counters {
    received: AtomicUsize,
    handled: AtomicUsize,
    ignored: AtomicUsize,
    failed: AtomicUsize,
}

impl Counters {
    /// Account for a dispatch task that ended without counting itself.
    fn reap(&self, joined: Result<(), JoinError>) {
        if let Err(e) = joined {
            self.failed.fetch_add(1, Ordering::SeqCst);
            tracing::warn!(error = %e, "dispatch task aborted");
        }
    }

    fn snapshot(&self) -> ConsumerStats {
        ConsumerStats {
            received: self.received.load(Ordering::SeqCst),
            handled: self.handled.load(Ordering::SeqCst),
            ignored: self.ignored.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
        }
    }
}

/// Handle to a running consumer loop. Drop or call `stop()` to shut down.
///
/// The loop owns a dedicated channel, consumes the queue named after its
/// event type with automatic acknowledgement, and spawns one dispatch per
/// message without waiting for it, so dispatches for the same event type
/// may overlap and complete in any order.
pub struct ConsumerHandle {
    event_type: String,
    stop_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
    counters: Arc<Counters>,
}

impl ConsumerHandle {
    /// Open a channel, declare the queue, and start consuming it.
    pub(crate) async fn start<T: Transport>(
        transport: &T,
        event_type: &str,
        options: QueueOptions,
        dispatcher: Arc<Dispatcher>,
        drain_on_stop: bool,
    ) -> Result<Self, TransportError> {
        let mut channel = transport.open_channel().await?;
        channel.declare_queue(event_type, options).await?;
        let mut deliveries = channel.consume(event_type).await?;

        let counters = Arc::new(Counters::default());
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        let loop_counters = Arc::clone(&counters);
        let span = tracing::info_span!("consumer", queue = %event_type);

        let task = tokio::spawn(
            async move {
                let mut in_flight = JoinSet::new();
                tracing::debug!("consumer started");

                loop {
                    tokio::select! {
                        _ = &mut stop_rx => break,
                        Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                            loop_counters.reap(joined);
                        }
                        delivery = deliveries.next() => match delivery {
                            Some(message) => {
                                loop_counters.received.fetch_add(1, Ordering::SeqCst);
                                let dispatcher = Arc::clone(&dispatcher);
                                let counters = Arc::clone(&loop_counters);
                                in_flight.spawn(
                                    async move {
                                        let counter = match dispatcher.dispatch(message).await {
                                            Ok(DispatchOutcome::Handled { .. }) => &counters.handled,
                                            Ok(DispatchOutcome::NoSubscribers) => &counters.ignored,
                                            Err(_) => &counters.failed,
                                        };
                                        counter.fetch_add(1, Ordering::SeqCst);
                                    }
                                    .in_current_span(),
                                );
                            }
                            None => {
                                tracing::warn!("broker closed the delivery stream");
                                break;
                            }
                        },
                    }
                }

                if drain_on_stop {
                    while let Some(joined) = in_flight.join_next().await {
                        loop_counters.reap(joined);
                    }
                } else {
                    in_flight.detach_all();
                }
                if let Err(e) = channel.close().await {
                    tracing::debug!(error = %e, "closing consumer channel failed");
                }
                tracing::debug!("consumer stopped");
            }
            .instrument(span),
        );

        Ok(Self {
            event_type: event_type.to_string(),
            stop_tx: Some(stop_tx),
            task: Some(task),
            counters,
        })
    }

    /// Event type (and queue name) this loop consumes.
    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    /// Current counters.
    pub fn stats(&self) -> ConsumerStats {
        self.counters.snapshot()
    }

    /// Whether the loop is still taking deliveries.
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Signal stop without waiting.
    pub fn signal_stop(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
    }

    /// Stop the loop and wait for it to finish. Returns stats.
    pub async fn stop(mut self) -> ConsumerStats {
        self.signal_stop();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!(queue = %self.event_type, error = %e, "consumer task ended abnormally");
            }
        }
        self.counters.snapshot()
    }
}

impl Drop for ConsumerHandle {
    fn drop(&mut self) {
        self.signal_stop();
    }
}
