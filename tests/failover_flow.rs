mod support;

use kpay_orchestrator::domain::channel::FeePolicy;
use kpay_orchestrator::domain::payment::{
    BankChannel, ChannelAllocation, CreatePaymentRequest, PaymentIntent, PaymentMethod, PaymentStatus,
};
use kpay_orchestrator::error::PaymentError;
use kpay_orchestrator::gateways::mock::{MockAdapter, MockBehavior};
use kpay_orchestrator::gateways::registry::{AdapterRegistry, AdapterRoute, AggregatorFamily};
use kpay_orchestrator::service::memory_store::MemoryStore;
use serde_json::json;
use std::sync::Arc;
use support::*;

fn request(order_id: &str, amount: i64, channel_id: i64) -> CreatePaymentRequest {
    CreatePaymentRequest {
        payments: vec![PaymentIntent {
            order_id: order_id.to_string(),
            amount,
            channel: vec![ChannelAllocation {
                id: channel_id,
                amount: 0,
                no_rekening: None,
            }],
        }],
        customer_id: "M-1".to_string(),
        customer_name: "Budi Santoso".to_string(),
        customer_email: "budi@example.com".to_string(),
        customer_phone: "081200000000".to_string(),
        reference_id: None,
        reference_type: None,
        return_url: None,
    }
}

async fn seeded(first: MockAdapter, second: MockAdapter) -> (Arc<MemoryStore>, AdapterRegistry) {
    let store = Arc::new(MemoryStore::new());
    store.add_platform(platform()).await;
    store
        .add_channel(
            PLATFORM_ID,
            channel(10, PaymentMethod::VirtualAccount, Some(BankChannel::Bca), fixed_fee(4_000)),
        )
        .await;
    store.add_configuration(configuration(1, 100, "espay")).await;
    store.add_configuration(configuration(2, 200, "midtrans")).await;

    let mut registry = AdapterRegistry::new();
    registry.register(AggregatorFamily::Espay, AdapterRoute::Any, Arc::new(first));
    registry.register(AggregatorFamily::Midtrans, AdapterRoute::Any, Arc::new(second));
    (store, registry)
}

#[tokio::test]
async fn second_configuration_takes_over_after_network_error() {
    let failing = MockAdapter::new(MockBehavior::NetworkError);
    let body = json!({ "responseCode": "2005400", "vaNumber": "8808123456" });
    let succeeding = MockAdapter::new(MockBehavior::Succeed(body.clone()));
    let (store, registry) = seeded(failing.clone(), succeeding.clone()).await;
    let (service, _) = services(store.clone(), registry);

    let responses = service.create(&platform(), request("ORD-1", 100_000, 10)).await.unwrap();

    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0].status, PaymentStatus::Pending);
    assert_eq!(responses[0].payment_detail.va_number, "8808123456");
    assert_eq!(responses[0].fee_admin, 4_000);
    assert_eq!(responses[0].total_amount, 104_000);
    assert_eq!(failing.pay_count(), 1);
    assert_eq!(succeeding.pay_count(), 1);

    let payments = store.payments().await;
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0].aggregator_id, Some(200));
    assert_eq!(payments[0].gateway_response, Some(body));
    assert!(payments[0].expired_at.is_some());
    assert_eq!(payments[0].transaction_id, responses[0].transaction_id);
}

#[tokio::test]
async fn exhausting_every_configuration_fails_payment_and_disables_channel() {
    let (store, registry) = seeded(
        MockAdapter::new(MockBehavior::Timeout),
        MockAdapter::new(MockBehavior::Reject { code: "4005400".to_string() }),
    )
    .await;
    let (service, _) = services(store.clone(), registry);

    let err = service.create(&platform(), request("ORD-2", 50_000, 10)).await.unwrap_err();
    assert!(matches!(err, PaymentError::Exhausted));

    let payments = store.payments().await;
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0].status, PaymentStatus::Failed);
    assert!(!store.channel(10).await.unwrap().is_active);
    let history = store.history(payments[0].id).await;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, PaymentStatus::Failed);

    let again = service.create(&platform(), request("ORD-3", 50_000, 10)).await.unwrap_err();
    assert!(matches!(again, PaymentError::Validation(_)));
}

#[tokio::test]
async fn unknown_slug_is_skipped_like_a_failed_attempt() {
    let store = Arc::new(MemoryStore::new());
    store.add_platform(platform()).await;
    store
        .add_channel(PLATFORM_ID, channel(10, PaymentMethod::Qris, None, FeePolicy::none()))
        .await;
    store.add_configuration(configuration(1, 100, "paypal")).await;
    store.add_configuration(configuration(2, 200, "espay")).await;
    let ok = MockAdapter::new(MockBehavior::Succeed(json!({ "vaNumber": "QR-1" })));
    let mut registry = AdapterRegistry::new();
    registry.register(AggregatorFamily::Espay, AdapterRoute::Method(PaymentMethod::Qris), Arc::new(ok));
    let (service, _) = services(store.clone(), registry);

    let responses = service.create(&platform(), request("ORD-4", 25_000, 10)).await.unwrap();
    assert_eq!(responses[0].total_amount, 25_000);
    assert_eq!(store.payments().await[0].aggregator_id, Some(200));
}

#[tokio::test]
async fn platform_without_configuration_is_not_found() {
    let store = Arc::new(MemoryStore::new());
    store.add_platform(platform()).await;
    store
        .add_channel(PLATFORM_ID, channel(10, PaymentMethod::Qris, None, FeePolicy::none()))
        .await;
    let (service, _) = services(store.clone(), AdapterRegistry::new());

    let err = service.create(&platform(), request("ORD-5", 10_000, 10)).await.unwrap_err();
    assert!(matches!(err, PaymentError::NotFound(_)));
    assert!(store.payments().await.is_empty());
}

#[tokio::test]
async fn channel_of_another_platform_is_not_found() {
    let store = Arc::new(MemoryStore::new());
    store.add_platform(platform()).await;
    store
        .add_channel(99, channel(10, PaymentMethod::Qris, None, FeePolicy::none()))
        .await;
    let (service, _) = services(store, AdapterRegistry::new());

    let err = service.create(&platform(), request("ORD-6", 10_000, 10)).await.unwrap_err();
    assert!(matches!(err, PaymentError::NotFound(_)));
}

#[tokio::test]
async fn unreadable_success_reply_fails_payment_with_audit_rows() {
    let garbled = MockAdapter::new(MockBehavior::Succeed(json!("garbage")));
    let unused = MockAdapter::new(MockBehavior::NetworkError);
    let (store, registry) = seeded(garbled.clone(), unused.clone()).await;
    let (service, _) = services(store.clone(), registry);

    let err = service.create(&platform(), request("ORD-G1", 75_000, 10)).await.unwrap_err();
    assert!(matches!(err, PaymentError::Internal(_)));
    assert_eq!(garbled.pay_count(), 1);
    assert_eq!(unused.pay_count(), 0);

    let payments = store.payments().await;
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0].status, PaymentStatus::Failed);

    let history = store.history(payments[0].id).await;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, PaymentStatus::Failed);
    let callbacks = store.callbacks(payments[0].id).await;
    assert_eq!(callbacks.len(), 1);
    assert_eq!(callbacks[0].source, "orchestrator");
    assert_eq!(callbacks[0].payload, json!("garbage"));

    assert!(store.channel(10).await.unwrap().is_active);
}
