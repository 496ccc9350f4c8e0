mod support;

use kpay_orchestrator::domain::channel::FeePolicy;
use kpay_orchestrator::domain::payment::{
    BankChannel, ChannelAllocation, CreatePaymentRequest, Currency, PaymentIntent, PaymentMethod, PaymentStatus,
};
use kpay_orchestrator::domain::wallet::{Direction, TopupCommand};
use kpay_orchestrator::error::PaymentError;
use kpay_orchestrator::gateways::mock::{MockAdapter, MockBehavior};
use kpay_orchestrator::gateways::registry::{AdapterRegistry, AdapterRoute, AggregatorFamily};
use kpay_orchestrator::service::memory_store::MemoryStore;
use kpay_orchestrator::service::store::PaymentStore;
use rand::Rng;
use rust_decimal::Decimal;
use serde_json::json;
use std::sync::Arc;
use support::*;

const WALLET_CHANNEL: i64 = 5;
const VA_CHANNEL: i64 = 10;
const NO_REKENING: &str = "171000000000000001";

fn wallet_request(order_id: &str, amount: i64, allocations: Vec<ChannelAllocation>) -> CreatePaymentRequest {
    CreatePaymentRequest {
        payments: vec![PaymentIntent {
            order_id: order_id.to_string(),
            amount,
            channel: allocations,
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

fn from_wallet(amount: i64) -> ChannelAllocation {
    ChannelAllocation {
        id: WALLET_CHANNEL,
        amount,
        no_rekening: Some(NO_REKENING.to_string()),
    }
}

async fn seeded(balance: i64) -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    store.add_platform(platform()).await;
    store
        .add_channel(
            PLATFORM_ID,
            channel(WALLET_CHANNEL, PaymentMethod::KWallet, Some(BankChannel::KWallet), FeePolicy::none()),
        )
        .await;
    store
        .add_channel(
            PLATFORM_ID,
            channel(VA_CHANNEL, PaymentMethod::VirtualAccount, Some(BankChannel::Bca), fixed_fee(2_500)),
        )
        .await;
    store.add_wallet(wallet("M-1", NO_REKENING, balance)).await;
    store
}

#[tokio::test]
async fn wallet_payment_debits_balance_and_records_one_out_entry() {
    let store = seeded(50_000).await;
    let (service, _) = services(store.clone(), AdapterRegistry::new());

    let responses = service
        .create(&platform(), wallet_request("ORD-W1", 30_000, vec![from_wallet(0)]))
        .await
        .unwrap();

    assert_eq!(responses[0].status, PaymentStatus::Success);
    assert_eq!(responses[0].payment_detail.va_number, NO_REKENING);

    let wallet = store.wallet(NO_REKENING).await.unwrap();
    assert_eq!(wallet.balance, Decimal::from(20_000));
    assert_eq!(wallet.version, 1);

    let entries = store.entries(wallet.id).await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].direction, Direction::Out);
    assert_eq!(entries[0].debit, Decimal::from(30_000));
    assert_eq!(entries[0].balance, Decimal::from(20_000));

    let payments = store.payments().await;
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0].status, PaymentStatus::Success);
    assert!(payments[0].paid_at.is_some());
    assert_eq!(payments[0].aggregator_id, None);
    assert_eq!(entries[0].payment_id, Some(payments[0].id));
}

#[tokio::test]
async fn insufficient_balance_without_second_channel_is_rejected() {
    let store = seeded(10_000).await;
    let (service, _) = services(store.clone(), AdapterRegistry::new());

    let err = service
        .create(&platform(), wallet_request("ORD-W2", 30_000, vec![from_wallet(0)]))
        .await
        .unwrap_err();

    assert!(matches!(err, PaymentError::Ledger(_)));
    assert_eq!(store.wallet(NO_REKENING).await.unwrap().balance, Decimal::from(10_000));
    assert!(store.payments().await.is_empty());
}

#[tokio::test]
async fn split_is_refused_when_wallet_alone_covers_the_total() {
    let store = seeded(100_000).await;
    let (service, _) = services(store.clone(), AdapterRegistry::new());
    let allocations = vec![
        from_wallet(20_000),
        ChannelAllocation {
            id: VA_CHANNEL,
            amount: 10_000,
            no_rekening: None,
        },
    ];

    let err = service
        .create(&platform(), wallet_request("ORD-W3", 30_000, allocations))
        .await
        .unwrap_err();

    assert!(matches!(err, PaymentError::InvalidSplit(_)));
    assert_eq!(store.wallet(NO_REKENING).await.unwrap().balance, Decimal::from(100_000));
}

#[tokio::test]
async fn split_uses_wallet_then_gateway() {
    let store = seeded(20_000).await;
    store.add_configuration(configuration(1, 100, "espay")).await;
    let mut registry = AdapterRegistry::new();
    registry.register(
        AggregatorFamily::Espay,
        AdapterRoute::Any,
        Arc::new(MockAdapter::new(MockBehavior::Succeed(json!({ "vaNumber": "8808000001" })))),
    );
    let (service, _) = services(store.clone(), registry);
    let allocations = vec![
        from_wallet(20_000),
        ChannelAllocation {
            id: VA_CHANNEL,
            amount: 10_000,
            no_rekening: None,
        },
    ];

    let responses = service
        .create(&platform(), wallet_request("ORD-W4", 30_000, allocations))
        .await
        .unwrap();

    assert_eq!(responses.len(), 2);
    assert_eq!(responses[0].status, PaymentStatus::Success);
    assert_eq!(responses[1].status, PaymentStatus::Pending);
    assert_eq!(responses[1].total_amount, 12_500);
    assert_eq!(store.wallet(NO_REKENING).await.unwrap().balance, Decimal::ZERO);
}

#[tokio::test]
async fn wallet_of_another_member_is_not_usable() {
    let store = seeded(50_000).await;
    let (service, _) = services(store.clone(), AdapterRegistry::new());
    let mut req = wallet_request("ORD-W5", 10_000, vec![from_wallet(0)]);
    req.customer_id = "M-2".to_string();

    let err = service.create(&platform(), req).await.unwrap_err();
    assert!(matches!(err, PaymentError::Ledger(_)));
}

#[tokio::test]
async fn wallet_channel_without_account_number_fails_intake() {
    let store = seeded(50_000).await;
    let (service, _) = services(store.clone(), AdapterRegistry::new());
    let allocation = ChannelAllocation {
        id: WALLET_CHANNEL,
        amount: 0,
        no_rekening: None,
    };

    let err = service
        .create(&platform(), wallet_request("ORD-W6", 10_000, vec![allocation]))
        .await
        .unwrap_err();
    assert!(matches!(err, PaymentError::Validation(_)));
}

#[tokio::test]
async fn failed_ledger_write_keeps_nothing() {
    let store = seeded(50_000).await;
    let (service, _) = services(store.clone(), AdapterRegistry::new());
    store.fail_ledger_writes(true);

    let err = service
        .create(&platform(), wallet_request("ORD-W7", 30_000, vec![from_wallet(0)]))
        .await
        .unwrap_err();

    assert!(matches!(err, PaymentError::Internal(_)));
    let wallet = store.wallet(NO_REKENING).await.unwrap();
    assert_eq!(wallet.balance, Decimal::from(50_000));
    assert_eq!(wallet.version, 0);
    assert!(store.entries(wallet.id).await.is_empty());
    assert!(store.payments().await.is_empty());

    let err = store.topup(&topup("TRX-R", 12_500)).await.unwrap_err();
    assert!(matches!(err, PaymentError::Internal(_)));
    assert!(store.topups().await.is_empty());
    assert_eq!(store.wallet(NO_REKENING).await.unwrap().balance, Decimal::from(50_000));

    store.fail_ledger_writes(false);
    service
        .create(&platform(), wallet_request("ORD-W7", 30_000, vec![from_wallet(0)]))
        .await
        .unwrap();
    let wallet = store.wallet(NO_REKENING).await.unwrap();
    assert_eq!(wallet.balance, Decimal::from(20_000));
    assert_eq!(store.entries(wallet.id).await.len(), 1);
    let payments = store.payments().await;
    assert_eq!(payments.len(), 1);
    assert_eq!(store.history(payments[0].id).await.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_debits_never_overdraw() {
    let store = seeded(50_000).await;
    let (service, _) = services(store.clone(), AdapterRegistry::new());

    let tasks: Vec<_> = (0..8)
        .map(|i| {
            let service = service.clone();
            tokio::spawn(async move {
                service
                    .create(&platform(), wallet_request(&format!("ORD-C{i}"), 10_000, vec![from_wallet(0)]))
                    .await
            })
        })
        .collect();

    let mut paid = 0;
    let mut refused = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => paid += 1,
            Err(PaymentError::Ledger(_)) => refused += 1,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    assert_eq!((paid, refused), (5, 3));

    let wallet = store.wallet(NO_REKENING).await.unwrap();
    assert_eq!(wallet.balance, Decimal::ZERO);
    let entries = store.entries(wallet.id).await;
    assert_eq!(entries.len(), 5);
    let debits: Decimal = entries.iter().map(|e| e.debit).sum();
    let credits: Decimal = entries.iter().map(|e| e.credit).sum();
    assert_eq!(Decimal::from(50_000) + credits - debits, wallet.balance);
    assert!(entries.iter().all(|e| e.balance >= Decimal::ZERO));
    assert_eq!(store.payments().await.len(), 5);
}

fn topup(reference: &str, amount: i64) -> TopupCommand {
    TopupCommand {
        gen_va: NO_REKENING[NO_REKENING.len() - 8..].to_string(),
        channel_id: VA_CHANNEL,
        aggregator: "espay".to_string(),
        merchant: "SGWKLIK".to_string(),
        amount: Decimal::from(amount),
        fee: Decimal::from(2_500),
        currency: Currency::Idr,
        reference_id: reference.to_string(),
        transaction_code: format!("TC-{reference}"),
    }
}

#[tokio::test]
async fn duplicate_topup_reference_is_accepted_once() {
    let store = seeded(0).await;

    let (wallet, entry) = store.topup(&topup("TRX-1", 52_500)).await.unwrap();
    assert_eq!(wallet.balance, Decimal::from(50_000));
    assert_eq!(entry.direction, Direction::In);
    assert_eq!(entry.credit, Decimal::from(50_000));

    let err = store.topup(&topup("TRX-1", 52_500)).await.unwrap_err();
    assert!(matches!(err, PaymentError::Accepted(_)));
    assert_eq!(store.wallet(NO_REKENING).await.unwrap().balance, Decimal::from(50_000));
    assert_eq!(store.topups().await.len(), 1);
}

#[tokio::test]
async fn balance_always_equals_credits_minus_debits() {
    let store = seeded(0).await;
    let (service, _) = services(store.clone(), AdapterRegistry::new());
    let mut rng = rand::thread_rng();

    for i in 0..60 {
        if rng.gen_bool(0.5) {
            let amount = rng.gen_range(3_000..80_000);
            store.topup(&topup(&format!("TRX-{i}"), amount)).await.unwrap();
        } else {
            let amount = rng.gen_range(1_000..60_000);
            let req = wallet_request(&format!("ORD-{i}"), amount, vec![from_wallet(0)]);
            match service.create(&platform(), req).await {
                Ok(_) | Err(PaymentError::Ledger(_)) => {}
                Err(e) => panic!("unexpected error: {e}"),
            }
        }

        let wallet = store.wallet(NO_REKENING).await.unwrap();
        let entries = store.entries(wallet.id).await;
        let credits: Decimal = entries.iter().map(|e| e.credit).sum();
        let debits: Decimal = entries.iter().map(|e| e.debit).sum();
        assert_eq!(wallet.balance, credits - debits);
        assert!(wallet.balance >= Decimal::ZERO);
        assert!(entries.iter().all(|e| e.debit.is_zero() || e.credit.is_zero()));
    }
}

#[tokio::test]
async fn ringgit_wallet_is_created_once_per_member() {
    let store = Arc::new(MemoryStore::new());
    let (service, _) = services(store.clone(), AdapterRegistry::new());
    let req = kpay_orchestrator::service::k_wallet_service::CreateWalletRequest {
        member_id: "M-7".to_string(),
        full_name: "Aminah".to_string(),
        currency: "MYR".to_string(),
        email: String::new(),
        phone: String::new(),
    };

    let wallet = service.wallet.create_wallet(req.clone()).await.unwrap();
    assert_eq!(wallet.balance, Decimal::ZERO);
    assert!(wallet.virtual_accounts.is_empty());
    assert!(wallet.no_rekening.ends_with(&wallet.gen_va));
    assert_eq!(wallet.gen_va.len(), 8);

    let err = service.wallet.create_wallet(req).await.unwrap_err();
    assert!(matches!(err, PaymentError::Validation(_)));

    let summary = service.wallet.lookup(&wallet.no_rekening).await.unwrap();
    assert_eq!(summary.symbol, "RM");
    assert!(summary.transactions.is_empty());
}
