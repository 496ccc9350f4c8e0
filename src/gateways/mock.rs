use crate::domain::canonical::{base_response, CanonicalResponse, PaymentDetail};
use crate::domain::channel::Channel;
use crate::domain::configuration::GatewayCredentials;
use crate::domain::payment::{Payment, PaymentStatus, PaymentType};
use crate::error::GatewayError;
use crate::gateways::{parse_stored, GatewayAdapter, GatewayReply, GatewayRequest, RawStatus, StatusQuery};
use serde::Deserialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub enum MockBehavior {
    NetworkError,
    Timeout,
    Reject { code: String },
    /// Returns this body as the aggregator reply.
    Succeed(serde_json::Value),
}

/// Body shape the mock reads back; anything that is not an object is
/// unreadable.
#[derive(Deserialize)]
struct MockReply {
    #[serde(rename = "vaNumber", default)]
    va_number: String,
}

/// Scripted adapter used to drive the orchestrator without a network.
#[derive(Clone)]
pub struct MockAdapter {
    pub behavior: MockBehavior,
    /// Raw status answered by `check_status`.
    pub status: String,
    pub pay_calls: Arc<AtomicUsize>,
    pub status_calls: Arc<AtomicUsize>,
}

impl MockAdapter {
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            status: "pending".to_string(),
            pay_calls: Arc::new(AtomicUsize::new(0)),
            status_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_status(mut self, status: &str) -> Self {
        self.status = status.to_string();
        self
    }

    pub fn pay_count(&self) -> usize {
        self.pay_calls.load(Ordering::SeqCst)
    }

    pub fn status_count(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl GatewayAdapter for MockAdapter {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn pay(
        &self,
        _creds: &GatewayCredentials,
        request: &GatewayRequest,
    ) -> Result<GatewayReply, GatewayError> {
        self.pay_calls.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            MockBehavior::NetworkError => Err(GatewayError::Transport("mock connection refused".to_string())),
            MockBehavior::Timeout => Err(GatewayError::Timeout),
            MockBehavior::Reject { code } => Err(GatewayError::Rejected {
                code: code.clone(),
                message: format!("mock decline for {}", request.order_id),
            }),
            MockBehavior::Succeed(body) => Ok(GatewayReply { raw: body.clone() }),
        }
    }

    async fn check_status(
        &self,
        _creds: &GatewayCredentials,
        query: &StatusQuery,
    ) -> Result<RawStatus, GatewayError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        Ok(RawStatus {
            status: self.status.clone(),
            reference_id: Some(format!("mock_{}", query.transaction_id)),
            raw: serde_json::json!({ "status": self.status }),
        })
    }

    fn map_to_canonical(
        &self,
        channel: &Channel,
        payment: &Payment,
    ) -> Result<CanonicalResponse, GatewayError> {
        let reply: MockReply = parse_stored(payment)?;
        Ok(base_response(
            payment,
            channel,
            PaymentType::Va,
            PaymentDetail {
                va_number: reply.va_number,
                ..Default::default()
            },
        ))
    }

    fn map_status(&self, _payment: &Payment, raw: &RawStatus) -> Result<PaymentStatus, GatewayError> {
        PaymentStatus::parse(&raw.status).ok_or_else(|| GatewayError::UnsupportedStatus(raw.status.clone()))
    }
}
