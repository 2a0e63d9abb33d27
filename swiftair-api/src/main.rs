use std::net::SocketAddr;
use std::sync::Arc;

use swiftair_api::{
    app,
    state::{AppState, AuthConfig},
};
use swiftair_core::BookingStore;
use swiftair_fare::{FareConfig, FareEngine};
use swiftair_ledger::BookingLedger;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "swiftair_api=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = swiftair_store::app_config::Config::load().expect("Failed to load config");
    tracing::info!("Starting Swiftair API on port {}", config.server.port);

    let db = swiftair_store::DbClient::new(&config.database.url)
        .await
        .expect("Failed to connect to database");
    db.migrate().await.expect("Failed to run migrations");

    let store: Arc<dyn BookingStore> = Arc::new(swiftair_store::PgStore::new(db.pool.clone()));

    if config.seed.enabled {
        swiftair_store::seed::seed_database(store.as_ref(), &config.seed)
            .await
            .expect("Failed to seed database");
    }

    let fares = FareEngine::new(FareConfig {
        meal_rate: config.fares.meal_rate,
        baggage_rate: config.fares.baggage_rate,
    });
    let ledger = Arc::new(BookingLedger::new(store.clone(), fares));

    let app_state = AppState {
        store,
        ledger,
        auth: AuthConfig {
            secret: config.auth.jwt_secret.clone(),
            expiration: config.auth.jwt_expiration_seconds,
        },
        rules: config.fares.clone(),
    };

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
