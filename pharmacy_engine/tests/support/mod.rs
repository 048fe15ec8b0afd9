#![allow(dead_code)]
use pharmacy_engine::{
    events::EventProducers,
    test_utils::{
        fakes::{FakeNotifier, FakePaymentProcessor},
        prepare_env::{prepare_test_env, random_db_path, tear_down},
        seed::{seed_catalog, Fixtures},
    },
    OrderFlowApi,
    OrdersApi,
    SqliteDatabase,
};

pub type FlowApi = OrderFlowApi<SqliteDatabase, FakePaymentProcessor, FakeNotifier>;

pub struct TestSystem {
    pub db: SqliteDatabase,
    pub flow: FlowApi,
    pub orders: OrdersApi<SqliteDatabase>,
    pub processor: FakePaymentProcessor,
    pub notifier: FakeNotifier,
    pub fx: Fixtures,
}

impl TestSystem {
    pub async fn new() -> Self {
        Self::with_producers(EventProducers::default()).await
    }

    pub async fn with_producers(producers: EventProducers) -> Self {
        let url = random_db_path();
        prepare_test_env(&url).await;
        let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database");
        let fx = seed_catalog(&db).await;
        let processor = FakePaymentProcessor::new();
        let notifier = FakeNotifier::new();
        let flow = OrderFlowApi::new(db.clone(), processor.clone(), notifier.clone(), producers);
        let orders = OrdersApi::new(db.clone());
        Self { db, flow, orders, processor, notifier, fx }
    }

    pub async fn tear_down(self) {
        tear_down(self.db).await;
    }
}
