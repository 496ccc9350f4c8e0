mod support;

use chrono::{Duration, Utc};
use kpay_orchestrator::domain::channel::FeePolicy;
use kpay_orchestrator::domain::payment::{
    BankChannel, ChannelAllocation, CreatePaymentRequest, PaymentIntent, PaymentMethod, PaymentStatus,
};
use kpay_orchestrator::error::PaymentError;
use kpay_orchestrator::gateways::mock::{MockAdapter, MockBehavior};
use kpay_orchestrator::gateways::registry::{AdapterRegistry, AdapterRoute, AggregatorFamily};
use kpay_orchestrator::service::memory_store::MemoryStore;
use kpay_orchestrator::service::payment_service::PaymentService;
use kpay_orchestrator::service::reconciliation::Reconciler;
use serde_json::json;
use std::sync::Arc;
use support::*;

fn request(order_id: &str) -> CreatePaymentRequest {
    CreatePaymentRequest {
        payments: vec![PaymentIntent {
            order_id: order_id.to_string(),
            amount: 75_000,
            channel: vec![ChannelAllocation {
                id: 10,
                amount: 75_000,
                no_rekening: None,
            }],
        }],
        customer_id: "M-9".to_string(),
        customer_name: "Sari".to_string(),
        customer_email: "sari@example.com".to_string(),
        customer_phone: "0813".to_string(),
        reference_id: Some("INV-9".to_string()),
        reference_type: Some("invoice".to_string()),
        return_url: None,
    }
}

async fn setup(adapter: MockAdapter) -> (Arc<MemoryStore>, PaymentService, Reconciler, String) {
    let store = Arc::new(MemoryStore::new());
    store.add_platform(platform()).await;
    store
        .add_channel(
            PLATFORM_ID,
            channel(10, PaymentMethod::VirtualAccount, Some(BankChannel::Bni), FeePolicy::none()),
        )
        .await;
    store.add_configuration(configuration(1, 300, "midtrans")).await;
    let mut registry = AdapterRegistry::new();
    registry.register(AggregatorFamily::Midtrans, AdapterRoute::Any, Arc::new(adapter));
    let (service, reconciler) = services(store.clone(), registry);
    let created = service.create(&platform(), request("ORD-R1")).await.unwrap();
    (store, service, reconciler, created[0].transaction_id.clone())
}

fn succeeding() -> MockAdapter {
    MockAdapter::new(MockBehavior::Succeed(json!({ "vaNumber": "9888123" })))
}

#[tokio::test]
async fn check_status_applies_new_status_with_audit_rows() {
    let adapter = succeeding().with_status("success");
    let (store, service, _, transaction_id) = setup(adapter.clone()).await;

    let response = service.check_status(&platform(), &transaction_id).await.unwrap();

    assert_eq!(response.status, PaymentStatus::Success);
    assert_eq!(adapter.status_count(), 1);
    let payment = store.payments().await.remove(0);
    assert_eq!(payment.status, PaymentStatus::Success);
    assert!(payment.paid_at.is_some());
    assert_eq!(payment.gateway_reference, Some(format!("mock_{transaction_id}")));
    assert_eq!(store.callbacks(payment.id).await.len(), 1);
    assert_eq!(store.history(payment.id).await.len(), 1);
}

#[tokio::test]
async fn terminal_payment_is_answered_without_calling_the_aggregator() {
    let adapter = succeeding().with_status("failed");
    let (store, service, _, transaction_id) = setup(adapter.clone()).await;

    let first = service.check_status(&platform(), &transaction_id).await.unwrap();
    assert_eq!(first.status, PaymentStatus::Failed);
    assert_eq!(adapter.status_count(), 1);

    let second = service.check_status(&platform(), &transaction_id).await.unwrap();
    let third = service.check_status(&platform(), &transaction_id).await.unwrap();
    assert_eq!(adapter.status_count(), 1);
    assert_eq!(second, third);
    assert_eq!(store.history(second.id).await.len(), 1);
}

#[tokio::test]
async fn unchanged_status_writes_nothing() {
    let adapter = succeeding();
    let (store, service, _, transaction_id) = setup(adapter.clone()).await;

    let response = service.check_status(&platform(), &transaction_id).await.unwrap();
    assert_eq!(response.status, PaymentStatus::Pending);
    assert!(store.callbacks(response.id).await.is_empty());
}

#[tokio::test]
async fn payment_of_another_platform_is_hidden() {
    let (_, service, _, transaction_id) = setup(succeeding()).await;
    let mut other = platform();
    other.id = 2;

    let err = service.check_status(&other, &transaction_id).await.unwrap_err();
    assert!(matches!(err, PaymentError::NotFound(_)));
    let err = service.detail(&other, &transaction_id).await.unwrap_err();
    assert!(matches!(err, PaymentError::NotFound(_)));
}

#[tokio::test]
async fn sweep_refreshes_stale_payments_only() {
    let adapter = succeeding().with_status("success");
    let (store, _, reconciler, _) = setup(adapter.clone()).await;

    let fresh = reconciler.run_once(Duration::seconds(60), 100).await.unwrap();
    assert_eq!(fresh.checked, 0);

    let id = store.payments().await[0].id;
    store.age_payment(id, Duration::minutes(5)).await;
    let summary = reconciler.run_once(Duration::seconds(60), 100).await.unwrap();
    assert_eq!(summary.checked, 1);
    assert_eq!(summary.changed, 1);
    assert_eq!(store.payments().await[0].status, PaymentStatus::Success);
}

#[tokio::test]
async fn overdue_pending_payment_expires_with_history() {
    let (store, _, reconciler, _) = setup(succeeding()).await;
    let id = store.payments().await[0].id;
    store.set_expiry(id, Utc::now() - Duration::minutes(1)).await;

    let expired = reconciler.expire_overdue(Utc::now(), 10).await.unwrap();
    assert_eq!(expired, 1);
    assert_eq!(store.payments().await[0].status, PaymentStatus::Expired);
    let history = store.history(id).await;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].actor.platform, "reconciler");

    assert_eq!(reconciler.expire_overdue(Utc::now(), 10).await.unwrap(), 0);
}

#[tokio::test]
async fn listing_filters_by_status() {
    let (_, service, _, _) = setup(succeeding()).await;

    let query = kpay_orchestrator::repo::query_builder::ListPaymentsQuery {
        status: Some("pending".to_string()),
        ..Default::default()
    };
    let page = service.list(&platform(), &query).await.unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.payments[0].order_id, "ORD-R1");

    let query = kpay_orchestrator::repo::query_builder::ListPaymentsQuery {
        status: Some("success".to_string()),
        ..Default::default()
    };
    assert_eq!(service.list(&platform(), &query).await.unwrap().total, 0);
}
