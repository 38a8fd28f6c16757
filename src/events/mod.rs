use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    errors::ServiceError,
    tracing::current_request_id,
    workflow::{Action, Stage},
};

/// Domain events published after a state change has been stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    PurchaseOrderCreated {
        purchase_order_id: Uuid,
        po_number: String,
    },
    PurchaseOrderUpdated {
        purchase_order_id: Uuid,
    },
    PurchaseOrderDeleted {
        purchase_order_id: Uuid,
    },
    PurchaseOrderStageChanged {
        purchase_order_id: Uuid,
        from: Stage,
        to: Stage,
        action: Action,
    },
    GoodsReceived {
        purchase_order_id: Uuid,
        quantity: i64,
        fully_received: bool,
    },
    QualityControlCreated {
        quality_control_id: Uuid,
        purchase_order_id: Uuid,
    },
    QualityControlAssigned {
        quality_control_id: Uuid,
        assigned_to: String,
    },
    QualityControlSubmitted {
        quality_control_id: Uuid,
    },
    QualityControlApproved {
        quality_control_id: Uuid,
        purchase_order_id: Uuid,
        passed: bool,
    },
    QualityControlRejected {
        quality_control_id: Uuid,
    },
    WarehouseApprovalCreated {
        warehouse_approval_id: Uuid,
        quality_control_id: Uuid,
    },
    WarehouseApprovalSubmitted {
        warehouse_approval_id: Uuid,
    },
    WarehouseApprovalApproved {
        warehouse_approval_id: Uuid,
        inventory_ids: Vec<Uuid>,
    },
    WarehouseApprovalRejected {
        warehouse_approval_id: Uuid,
    },
    InventoryReserved {
        inventory_id: Uuid,
        quantity: i64,
    },
    InventoryReleased {
        inventory_id: Uuid,
        quantity: i64,
    },
    MasterDataChanged {
        entity: String,
        id: Uuid,
        operation: String,
    },
}

/// An event with who caused it and when.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub event: Event,
    pub actor: String,
    pub at: DateTime<Utc>,
    pub request_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<EventEnvelope>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<EventEnvelope>) -> Self {
        Self { sender }
    }

    /// A sender and the receiver to hand to [`process_events`].
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<EventEnvelope>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(tx), rx)
    }

    fn envelope(event: Event, actor: &str) -> EventEnvelope {
        EventEnvelope {
            event,
            actor: actor.to_string(),
            at: Utc::now(),
            request_id: current_request_id().map(|id| id.as_str().to_string()),
        }
    }

    /// Sends an event, waiting for channel capacity
    pub async fn send(&self, event: Event, actor: &str) -> Result<(), ServiceError> {
        self.sender
            .send(Self::envelope(event, actor))
            .await
            .map_err(|e| ServiceError::EventError(format!("Failed to send event: {}", e)))
    }

    /// Queues an event after the change it describes is already stored.
    /// Never waits: a full or closed channel drops the event with a warning.
    pub fn publish(&self, event: Event, actor: &str) {
        match self.sender.try_send(Self::envelope(event, actor)) {
            Ok(()) => {}
            Err(TrySendError::Full(envelope)) => {
                warn!(event = ?envelope.event, "event channel full; event dropped");
            }
            Err(TrySendError::Closed(envelope)) => {
                warn!(event = ?envelope.event, "event channel closed; event dropped");
            }
        }
    }
}

/// Drains the channel, logging each event, until every sender is dropped.
pub async fn process_events(mut rx: mpsc::Receiver<EventEnvelope>) {
    info!("Starting event processing loop");

    while let Some(envelope) = rx.recv().await {
        let kind = match serde_json::to_value(&envelope.event) {
            Ok(value) => value
                .get("type")
                .and_then(|t| t.as_str())
                .unwrap_or("unknown")
                .to_string(),
            Err(_) => "unknown".to_string(),
        };

        match &envelope.event {
            Event::QualityControlApproved { passed: false, .. }
            | Event::QualityControlRejected { .. }
            | Event::WarehouseApprovalRejected { .. } => warn!(
                event = %kind,
                actor = %envelope.actor,
                at = %envelope.at,
                request_id = envelope.request_id.as_deref().unwrap_or("-"),
                payload = ?envelope.event,
                "workflow event"
            ),
            _ => info!(
                event = %kind,
                actor = %envelope.actor,
                at = %envelope.at,
                request_id = envelope.request_id.as_deref().unwrap_or("-"),
                payload = ?envelope.event,
                "workflow event"
            ),
        }
    }

    warn!("Event processing loop has ended");
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[tokio::test]
    async fn envelope_carries_actor_and_time() {
        let (sender, mut rx) = EventSender::channel(4);
        let id = Uuid::new_v4();
        sender
            .send(Event::PurchaseOrderUpdated { purchase_order_id: id }, "u-9")
            .await
            .unwrap();

        let envelope = rx.recv().await.unwrap();
        assert_eq!(envelope.actor, "u-9");
        assert_eq!(envelope.event, Event::PurchaseOrderUpdated { purchase_order_id: id });
        assert!(envelope.at <= Utc::now());
    }

    #[tokio::test]
    async fn closed_channel_is_an_event_error() {
        let (sender, rx) = EventSender::channel(1);
        drop(rx);
        assert_matches!(
            sender
                .send(Event::QualityControlSubmitted { quality_control_id: Uuid::nil() }, "u")
                .await,
            Err(ServiceError::EventError(_))
        );
        // publish swallows the failure
        sender.publish(Event::QualityControlSubmitted { quality_control_id: Uuid::nil() }, "u");
    }

    #[tokio::test]
    async fn publish_does_not_wait_on_a_full_channel() {
        let (sender, mut rx) = EventSender::channel(1);
        let first = Uuid::new_v4();
        sender.publish(Event::PurchaseOrderUpdated { purchase_order_id: first }, "u");
        sender.publish(Event::PurchaseOrderUpdated { purchase_order_id: Uuid::new_v4() }, "u");

        let envelope = rx.recv().await.unwrap();
        assert_eq!(envelope.event, Event::PurchaseOrderUpdated { purchase_order_id: first });
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let json = serde_json::to_value(Event::InventoryReserved {
            inventory_id: Uuid::nil(),
            quantity: 3,
        })
        .unwrap();
        assert_eq!(json["type"], "inventory_reserved");
        assert_eq!(json["quantity"], 3);
    }
}
