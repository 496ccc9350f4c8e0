use crate::domain::payment::PaymentStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who caused a status transition, stored as JSON on the history row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    pub name: String,
    pub role: String,
    pub platform: String,
}

impl Actor {
    pub fn midtrans_callback() -> Self {
        Self {
            id: "Midtrans Callback".to_string(),
            name: "Callback Notification".to_string(),
            role: "platform".to_string(),
            platform: "Midtrans".to_string(),
        }
    }

    /// System actor for an inbound aggregator callback, e.g. `espay`.
    pub fn callback(aggregator: &str) -> Self {
        Self {
            id: "system".to_string(),
            name: format!("callback notification {aggregator}"),
            role: "system".to_string(),
            platform: format!("callback_{aggregator}"),
        }
    }

    pub fn reconciler() -> Self {
        Self {
            id: "system".to_string(),
            name: "status reconciliation".to_string(),
            role: "system".to_string(),
            platform: "reconciler".to_string(),
        }
    }

    pub fn orchestrator() -> Self {
        Self {
            id: "system".to_string(),
            name: "payment orchestrator".to_string(),
            role: "system".to_string(),
            platform: "orchestrator".to_string(),
        }
    }
}

/// One status transition plus its audit rows, applied as a single unit.
#[derive(Debug, Clone)]
pub struct StatusChange {
    pub payment_id: i64,
    pub status: PaymentStatus,
    pub paid_at: Option<DateTime<Utc>>,
    pub reference_id: Option<String>,
    /// Where the raw payload came from, e.g. `check_status` or `webhook_midtrans`.
    pub source: String,
    pub payload: serde_json::Value,
    pub actor: Actor,
    pub note: String,
}

impl StatusChange {
    pub fn new(payment_id: i64, status: PaymentStatus, source: &str, payload: serde_json::Value, actor: Actor) -> Self {
        Self {
            payment_id,
            status,
            paid_at: (status == PaymentStatus::Success).then(Utc::now),
            reference_id: None,
            source: source.to_string(),
            payload,
            actor,
            note: String::new(),
        }
    }

    pub fn with_reference(mut self, reference_id: Option<String>) -> Self {
        self.reference_id = reference_id;
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = note.into();
        self
    }
}
