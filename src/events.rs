use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

/// Wrapper around the event channel sender shared by all services.
#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously.
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends an event, logging instead of failing the caller when the channel
    /// is gone. Events are notifications; the database commit that preceded
    /// them is the source of truth.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!("Dropping event: {}", e);
        }
    }
}

// The events that can occur in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    // Catalog events
    ProductCreated(Uuid),
    ProductUpdated(Uuid),
    ProductDeleted(Uuid),

    // Stock events
    StockAdjusted {
        product_id: Uuid,
        branch_id: Uuid,
        previous_stock: i32,
        new_stock: i32,
        reason: String,
    },

    // Transfer events
    TransferCreated(Uuid),
    TransferApproved(Uuid),
    TransferShipped(Uuid),
    TransferReceived(Uuid),
    TransferCancelled(Uuid),

    // Generic event for custom messages
    Generic {
        message: String,
        timestamp: DateTime<Utc>,
        metadata: serde_json::Value,
    },
}

/// Consumes events from the channel and dispatches them. Downstream
/// integrations (reorder notifications, dashboards) hang off this loop.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match event {
            Event::StockAdjusted {
                product_id,
                branch_id,
                previous_stock,
                new_stock,
                ref reason,
            } => {
                info!(
                    product_id = %product_id,
                    branch_id = %branch_id,
                    previous_stock,
                    new_stock,
                    reason = %reason,
                    "Stock adjusted"
                );
            }
            Event::TransferShipped(transfer_id) => {
                info!(transfer_id = %transfer_id, "Transfer shipped; source stock decremented");
            }
            Event::TransferReceived(transfer_id) => {
                info!(transfer_id = %transfer_id, "Transfer received; destination stock incremented");
            }
            _ => {
                info!("Event: {:?}", event);
            }
        }
    }

    warn!("Event processing loop has ended");
}
