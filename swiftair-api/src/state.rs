use std::sync::Arc;

use swiftair_core::BookingStore;
use swiftair_ledger::BookingLedger;
use swiftair_store::app_config::FareRules;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
    pub expiration: u64,
}

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn BookingStore>,
    pub ledger: Arc<BookingLedger>,
    pub auth: AuthConfig,
    pub rules: FareRules,
}
