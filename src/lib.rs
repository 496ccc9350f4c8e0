pub mod config;
pub mod domain {
    pub mod audit;
    pub mod canonical;
    pub mod channel;
    pub mod configuration;
    pub mod context;
    pub mod payment;
    pub mod platform;
    pub mod wallet;
}
pub mod error;
pub mod fee;
pub mod gateways;
pub mod http {
    pub mod handlers {
        pub mod k_wallets;
        pub mod ops;
        pub mod payments;
        pub mod webhooks;
    }
    pub mod middleware {
        pub mod platform_auth;
        pub mod rate_limit;
    }
}
pub mod repo {
    pub mod audit_repo;
    pub mod channels_repo;
    pub mod configurations_repo;
    pub mod k_wallet_repo;
    pub mod payments_repo;
    pub mod platforms_repo;
    pub mod query_builder;
    pub mod topup_repo;
}
pub mod service {
    pub mod callbacks;
    pub mod failover;
    pub mod k_wallet_service;
    pub mod memory_store;
    pub mod payment_service;
    pub mod platform_cache;
    pub mod reconciliation;
    pub mod store;
    pub mod webhook_dispatcher;
}
pub mod signature;

#[derive(Clone)]
pub struct AppState {
    pub payment_service: service::payment_service::PaymentService,
    pub wallet_service: service::k_wallet_service::KWalletService,
    pub callbacks: service::callbacks::CallbackService,
    pub pool: sqlx::PgPool,
    pub redis_client: redis::Client,
}
