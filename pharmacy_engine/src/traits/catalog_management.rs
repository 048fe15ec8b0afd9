use crate::{
    db_types::{
        DeliveryAddress,
        Money,
        NewDeliveryAddress,
        NewPatient,
        NewProduct,
        NewUser,
        Patient,
        Product,
        User,
    },
    traits::PharmacyDbError,
};

/// Lookups of the catalog, people and addresses that orders refer to.
///
/// The storefront manages these records; the insert methods exist so that fixtures and tests can seed a store.
#[allow(async_fn_in_trait)]
pub trait CatalogManagement {
    /// Fetches the products with the given ids. Unknown ids are silently absent from the result.
    async fn fetch_products(&self, ids: &[i64]) -> Result<Vec<Product>, PharmacyDbError>;

    async fn fetch_delivery_address(&self, id: i64) -> Result<Option<DeliveryAddress>, PharmacyDbError>;

    async fn fetch_user(&self, user_id: &str) -> Result<Option<User>, PharmacyDbError>;

    async fn fetch_patient(&self, patient_id: &str) -> Result<Option<Patient>, PharmacyDbError>;

    async fn insert_user(&self, user: NewUser) -> Result<User, PharmacyDbError>;

    async fn insert_patient(&self, patient: NewPatient) -> Result<Patient, PharmacyDbError>;

    async fn insert_product(&self, product: NewProduct) -> Result<Product, PharmacyDbError>;

    async fn update_product_price(&self, id: i64, price: Money) -> Result<Product, PharmacyDbError>;

    async fn insert_delivery_address(&self, address: NewDeliveryAddress) -> Result<DeliveryAddress, PharmacyDbError>;
}
