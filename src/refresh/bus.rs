//! Asynchronous delivery of refresh events.

use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};

use crate::refresh::listener::{RefreshError, RefreshOutcome, TopologyListener};
use crate::refresh::RefreshRoutesEvent;

/// Publishing side. Cheap to clone.
#[derive(Debug, Clone)]
pub struct RefreshBus {
    tx: mpsc::UnboundedSender<RefreshRoutesEvent>,
}

/// Receiving side. Delivers each event to every listener, in order.
pub struct RefreshDispatcher {
    rx: mpsc::UnboundedReceiver<RefreshRoutesEvent>,
    listeners: Vec<Arc<dyn TopologyListener>>,
}

impl RefreshBus {
    pub fn new() -> (Self, RefreshDispatcher) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self { tx },
            RefreshDispatcher {
                rx,
                listeners: Vec::new(),
            },
        )
    }

    /// Queue an event for the dispatcher task.
    pub fn publish(&self, event: RefreshRoutesEvent) -> Result<(), RefreshError> {
        self.tx.send(event).map_err(|_| RefreshError::BusClosed)
    }
}

impl RefreshDispatcher {
    pub fn add_listener(&mut self, listener: Arc<dyn TopologyListener>) {
        self.listeners.push(listener);
    }

    /// Deliver one event synchronously to every listener.
    pub fn deliver(&self, event: &RefreshRoutesEvent) -> Vec<Result<RefreshOutcome, RefreshError>> {
        self.listeners
            .iter()
            .map(|listener| {
                let result = listener.on_topology_refreshed(event);
                match &result {
                    Ok(RefreshOutcome::Rebuilt { generation, routes }) => {
                        tracing::debug!(generation, routes, "Topology refresh applied");
                    }
                    Ok(RefreshOutcome::Skipped) => {}
                    Err(e) => tracing::error!(error = %e, "Topology listener failed"),
                }
                result
            })
            .collect()
    }

    /// Process the next queued event, if any, without waiting.
    pub fn try_deliver_next(&mut self) -> Option<Vec<Result<RefreshOutcome, RefreshError>>> {
        self.rx.try_recv().ok().map(|event| self.deliver(&event))
    }

    /// Deliver events until every publisher is gone or shutdown fires.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(listeners = self.listeners.len(), "Refresh dispatcher started");
        loop {
            tokio::select! {
                event = self.rx.recv() => match event {
                    Some(event) => {
                        self.deliver(&event);
                    }
                    None => break,
                },
                _ = shutdown.recv() => {
                    tracing::info!("Refresh dispatcher received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}
