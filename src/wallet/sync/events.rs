//! Event system for wallet state synchronization.
//!
//! This module defines the event types, handler trait, and dispatcher that
//! decouple the reconciliation engine from its consumers. The dispatcher is
//! the notification bridge: UI layers, push-notification plumbing, and
//! logging all register handlers and receive every published snapshot,
//! including passes that found no change (so staleness indicators can
//! reset).

use crate::wallet::types::{TransactionRecord, WalletSnapshot, WalletSyncError};

use std::sync::Arc;

/// Events emitted by the reconciliation engine
pub enum SyncEvent {
    /// A reconciliation pass completed and published a snapshot.
    SnapshotPublished {
        snapshot: Arc<WalletSnapshot>,
        /// Canonical records not present in the previous snapshot.
        new_transactions: Vec<TransactionRecord>,
        /// False when the pass found nothing new.
        changed: bool,
    },
    /// A pass failed; the last-good snapshot remains published.
    PassFailed { error: String, recoverable: bool },
    /// A wallet-originated broadcast was never sighted and timed out.
    PendingExpired { txid: String },
}

/// Trait for handling sync events.
///
/// Implementors receive all sync events and can perform side effects or state updates.
#[async_trait::async_trait]
pub trait SyncEventHandler: Send + Sync {
    /// Handle a sync event.
    ///
    /// This method is called for every event dispatched by the orchestrator.
    async fn handle(&mut self, event: &SyncEvent) -> Result<(), WalletSyncError>;

    /// Get the name of this handler for logging and diagnostics.
    fn name(&self) -> &'static str;
}

/// Event dispatcher that manages multiple event handlers.
///
/// The dispatcher allows multiple handlers to be registered and ensures all are called for each
/// event. This enables UI updates, notification delivery, and logging to be handled independently.
pub struct EventDispatcher {
    handlers: Vec<Box<dyn SyncEventHandler>>,
}

impl EventDispatcher {
    /// Create a new, empty event dispatcher.
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    /// Register a new event handler.
    ///
    /// Handlers are called in the order they are registered.
    pub fn register_handler(&mut self, handler: Box<dyn SyncEventHandler>) {
        self.handlers.push(handler);
    }

    /// Dispatch an event to all registered handlers.
    ///
    /// Errors from handlers are logged, but do not stop other handlers from running.
    pub async fn dispatch(&mut self, event: &SyncEvent) {
        for handler in &mut self.handlers {
            if let Err(e) = handler.handle(event).await {
                tracing::error!("Handler {} failed to process event: {}", handler.name(), e);
                // Continue processing with other handlers
            }
        }
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct CountingHandler {
        seen: Arc<Mutex<usize>>,
        fail: bool,
    }

    #[async_trait::async_trait]
    impl SyncEventHandler for CountingHandler {
        async fn handle(&mut self, _event: &SyncEvent) -> Result<(), WalletSyncError> {
            *self.seen.lock().unwrap() += 1;
            if self.fail {
                return Err(WalletSyncError::Fatal("handler failure".to_string()));
            }
            Ok(())
        }

        fn name(&self) -> &'static str {
            "CountingHandler"
        }
    }

    #[tokio::test]
    async fn test_failing_handler_does_not_stop_others() {
        let seen = Arc::new(Mutex::new(0));
        let mut dispatcher = EventDispatcher::new();
        dispatcher.register_handler(Box::new(CountingHandler {
            seen: seen.clone(),
            fail: true,
        }));
        dispatcher.register_handler(Box::new(CountingHandler {
            seen: seen.clone(),
            fail: false,
        }));

        dispatcher
            .dispatch(&SyncEvent::PendingExpired {
                txid: "aa11".to_string(),
            })
            .await;

        assert_eq!(*seen.lock().unwrap(), 2);
    }
}
