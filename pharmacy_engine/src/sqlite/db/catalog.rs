use sqlx::{QueryBuilder, SqliteConnection};

use crate::{
    db_types::{
        AddressOwner,
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

pub async fn insert_user(user: NewUser, conn: &mut SqliteConnection) -> Result<User, PharmacyDbError> {
    let user = sqlx::query_as("INSERT INTO users (id, name, email, phone, role) VALUES ($1, $2, $3, $4, $5) RETURNING *")
        .bind(user.id)
        .bind(user.name)
        .bind(user.email)
        .bind(user.phone)
        .bind(user.role)
        .fetch_one(conn)
        .await?;
    Ok(user)
}

pub async fn fetch_user(user_id: &str, conn: &mut SqliteConnection) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM users WHERE id = $1").bind(user_id).fetch_optional(conn).await
}

pub async fn insert_patient(patient: NewPatient, conn: &mut SqliteConnection) -> Result<Patient, PharmacyDbError> {
    let patient = sqlx::query_as(
        "INSERT INTO patients (id, doctor_id, name, email, phone) VALUES ($1, $2, $3, $4, $5) RETURNING *",
    )
    .bind(patient.id)
    .bind(patient.doctor_id)
    .bind(patient.name)
    .bind(patient.email)
    .bind(patient.phone)
    .fetch_one(conn)
    .await?;
    Ok(patient)
}

pub async fn fetch_patient(patient_id: &str, conn: &mut SqliteConnection) -> Result<Option<Patient>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM patients WHERE id = $1").bind(patient_id).fetch_optional(conn).await
}

pub async fn insert_delivery_address(
    address: NewDeliveryAddress,
    conn: &mut SqliteConnection,
) -> Result<DeliveryAddress, PharmacyDbError> {
    let (user_id, patient_id) = match address.owner {
        AddressOwner::User(id) => (Some(id), None),
        AddressOwner::Patient(id) => (None, Some(id)),
    };
    let address = sqlx::query_as(
        r#"
            INSERT INTO delivery_addresses (user_id, patient_id, street, city, province, phone)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *;
        "#,
    )
    .bind(user_id)
    .bind(patient_id)
    .bind(address.street)
    .bind(address.city)
    .bind(address.province)
    .bind(address.phone)
    .fetch_one(conn)
    .await?;
    Ok(address)
}

pub async fn fetch_delivery_address(id: i64, conn: &mut SqliteConnection) -> Result<Option<DeliveryAddress>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM delivery_addresses WHERE id = $1").bind(id).fetch_optional(conn).await
}

pub async fn insert_product(product: NewProduct, conn: &mut SqliteConnection) -> Result<Product, PharmacyDbError> {
    let product = sqlx::query_as(
        r#"
            INSERT INTO products (name, price, image, requires_prescription, weight)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *;
        "#,
    )
    .bind(product.name)
    .bind(product.price)
    .bind(product.image)
    .bind(product.requires_prescription)
    .bind(product.weight)
    .fetch_one(conn)
    .await?;
    Ok(product)
}

/// Changing a product's price has no effect on orders that already contain it.
pub async fn update_product_price(id: i64, price: Money, conn: &mut SqliteConnection) -> Result<Product, PharmacyDbError> {
    let product: Option<Product> = sqlx::query_as(
        "UPDATE products SET price = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2 RETURNING *",
    )
    .bind(price)
    .bind(id)
    .fetch_optional(conn)
    .await?;
    product.ok_or_else(|| PharmacyDbError::RecordNotFound(format!("product {id}")))
}

pub async fn fetch_products(ids: &[i64], conn: &mut SqliteConnection) -> Result<Vec<Product>, sqlx::Error> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let mut builder = QueryBuilder::new("SELECT * FROM products WHERE id IN (");
    let mut separated = builder.separated(", ");
    for id in ids {
        separated.push_bind(*id);
    }
    separated.push_unseparated(") ORDER BY id");
    builder.build_query_as::<Product>().fetch_all(conn).await
}
