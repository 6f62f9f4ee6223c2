use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Events emitted by the pricing/fulfillment core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    PaymentSucceeded {
        payment_intent_id: String,
    },
    PaymentFailed {
        payment_intent_id: String,
        reason: Option<String>,
    },
    OrderPlaced {
        merchant_reference: String,
        provider_order_id: String,
        variant_id: Uuid,
    },
    /// A provider order was placed but the local record could not be
    /// written. The reconciliation data exists only upstream until an
    /// operator replays it; this event is the observable trace.
    OrderRecordPending {
        merchant_reference: String,
        payment_intent_id: Option<String>,
        occurred_at: DateTime<Utc>,
    },
}

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

    /// Fire-and-forget send for paths that must not fail on a full channel.
    pub fn send_detached(&self, event: Event) {
        let sender = self.sender.clone();
        tokio::spawn(async move {
            if let Err(e) = sender.send(event).await {
                warn!("Failed to send event: {}", e);
            }
        });
    }
}

/// Background processor draining the event channel.
pub async fn process_events(mut receiver: mpsc::Receiver<Event>) {
    while let Some(event) = receiver.recv().await {
        match &event {
            Event::PaymentSucceeded { payment_intent_id } => {
                info!(payment_intent_id = %payment_intent_id, "payment succeeded");
            }
            Event::PaymentFailed {
                payment_intent_id,
                reason,
            } => {
                warn!(
                    payment_intent_id = %payment_intent_id,
                    reason = reason.as_deref().unwrap_or("unknown"),
                    "payment failed"
                );
            }
            Event::OrderPlaced {
                merchant_reference,
                provider_order_id,
                variant_id,
            } => {
                info!(
                    merchant_reference = %merchant_reference,
                    provider_order_id = %provider_order_id,
                    variant_id = %variant_id,
                    "provider order placed"
                );
            }
            Event::OrderRecordPending {
                merchant_reference,
                payment_intent_id,
                ..
            } => {
                error!(
                    merchant_reference = %merchant_reference,
                    payment_intent_id = payment_intent_id.as_deref().unwrap_or("none"),
                    "provider order placed but local record missing; manual reconciliation required"
                );
            }
        }
    }
    info!("event channel closed; processor exiting");
}
