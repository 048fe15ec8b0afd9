use std::collections::HashMap;

use cucumber::World;
use log::*;
use pharmacy_engine::{
    db_types::{Actor, Product},
    events::EventProducers,
    order_objects::PlacedOrder,
    test_utils::{
        fakes::{FakeNotifier, FakePaymentProcessor},
        prepare_env::{prepare_test_env, random_db_path},
        seed::{seed_catalog, Fixtures},
    },
    OrderFlowApi,
    SqliteDatabase,
};

#[derive(Default, Debug, World)]
pub struct PharmacyWorld {
    pub system: Option<PharmacySystem>,
    /// Orders placed during the scenario, by the label the scenario gave them
    pub orders: HashMap<String, PlacedOrder>,
    pub last_error: Option<String>,
}

#[derive(Debug)]
pub struct PharmacySystem {
    pub db_path: String,
    pub db: SqliteDatabase,
    pub api: OrderFlowApi<SqliteDatabase, FakePaymentProcessor, FakeNotifier>,
    pub processor: FakePaymentProcessor,
    pub fixtures: Fixtures,
}

impl PharmacyWorld {
    pub fn system(&self) -> &PharmacySystem {
        self.system.as_ref().expect("System not initialised. Did you forget 'Given a fresh install'?")
    }

    pub fn order(&self, label: &str) -> &PlacedOrder {
        self.orders.get(label).unwrap_or_else(|| panic!("No order labelled {label}"))
    }

    pub fn actor(&self, name: &str) -> Actor {
        let fx = &self.system().fixtures;
        match name {
            "alice" => fx.customer_actor(),
            "drbob" => fx.doctor_actor(),
            "carol" => fx.staff_actor(),
            _ => panic!("Unknown person {name}"),
        }
    }

    pub fn product(&self, name: &str) -> &Product {
        let fx = &self.system().fixtures;
        match name {
            "paracetamol" => &fx.paracetamol,
            "amoxicillin" => &fx.amoxicillin,
            "formula" => &fx.formula,
            _ => panic!("Unknown product {name}"),
        }
    }

    /// The delivery address a person uses for their own orders
    pub fn address_of(&self, name: &str) -> i64 {
        let fx = &self.system().fixtures;
        match name {
            "alice" => fx.customer_address.id,
            "drbob" => fx.doctor_address.id,
            _ => panic!("{name} has no delivery address"),
        }
    }
}

impl PharmacySystem {
    pub async fn new() -> Self {
        let db_path = random_db_path();
        prepare_test_env(&db_path).await;
        let db = SqliteDatabase::new_with_url(&db_path, 5).await.expect("Error creating connection to database");
        debug!("Created database: {db_path}");
        let fixtures = seed_catalog(&db).await;
        let processor = FakePaymentProcessor::new();
        let api = OrderFlowApi::new(db.clone(), processor.clone(), FakeNotifier::new(), EventProducers::default());
        Self { db_path, db, api, processor, fixtures }
    }
}
