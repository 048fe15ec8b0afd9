//! A small, known catalog: a customer, a doctor with one patient, a member of staff, their addresses and three
//! products.
use crate::{
    db_types::{
        Actor,
        AddressOwner,
        DeliveryAddress,
        Money,
        NewDeliveryAddress,
        NewPatient,
        NewProduct,
        NewUser,
        Patient,
        Product,
        Role,
        User,
    },
    traits::CatalogManagement,
};

#[derive(Debug, Clone)]
pub struct Fixtures {
    pub customer: User,
    pub doctor: User,
    pub staff: User,
    pub patient: Patient,
    /// The customer's address, in the low-cost province
    pub customer_address: DeliveryAddress,
    /// The doctor's own address, outside the low-cost province
    pub doctor_address: DeliveryAddress,
    /// The patient's address, outside the low-cost province
    pub patient_address: DeliveryAddress,
    /// $5.00, half a pound, no prescription needed
    pub paracetamol: Product,
    /// $12.00, a fifth of a pound, prescription only
    pub amoxicillin: Product,
    /// $20.00, three pounds, no prescription needed
    pub formula: Product,
}

impl Fixtures {
    pub fn customer_actor(&self) -> Actor {
        Actor::new(&self.customer.id, Role::User)
    }

    pub fn doctor_actor(&self) -> Actor {
        Actor::new(&self.doctor.id, Role::Doctor)
    }

    pub fn staff_actor(&self) -> Actor {
        Actor::new(&self.staff.id, Role::Staff)
    }
}

fn user(id: &str, name: &str, phone: &str, role: Role) -> NewUser {
    NewUser {
        id: id.to_string(),
        name: name.to_string(),
        email: format!("{id}@example.com"),
        phone: Some(phone.to_string()),
        role,
    }
}

fn address(owner: AddressOwner, city: &str, province: &str) -> NewDeliveryAddress {
    NewDeliveryAddress {
        owner,
        street: "Calle 23 #456".to_string(),
        city: city.to_string(),
        province: province.to_string(),
        phone: None,
    }
}

pub async fn seed_catalog<B: CatalogManagement>(db: &B) -> Fixtures {
    let customer = db.insert_user(user("alice", "Alice Pérez", "+5350000001", Role::User)).await.expect("insert user");
    let doctor = db.insert_user(user("drbob", "Dr. Bob Díaz", "+5350000002", Role::Doctor)).await.expect("insert user");
    let staff = db.insert_user(user("carol", "Carol Ruiz", "+5350000003", Role::Staff)).await.expect("insert user");
    let patient = db
        .insert_patient(NewPatient {
            id: "pat_dave".to_string(),
            doctor_id: doctor.id.clone(),
            name: "Dave Gómez".to_string(),
            email: Some("dave@example.com".to_string()),
            phone: Some("+5350000004".to_string()),
        })
        .await
        .expect("insert patient");
    let customer_address = db
        .insert_delivery_address(address(AddressOwner::User(customer.id.clone()), "Vedado", "La Habana"))
        .await
        .expect("insert address");
    let doctor_address = db
        .insert_delivery_address(address(AddressOwner::User(doctor.id.clone()), "Matanzas", "Matanzas"))
        .await
        .expect("insert address");
    let patient_address = db
        .insert_delivery_address(address(AddressOwner::Patient(patient.id.clone()), "Santiago", "Santiago de Cuba"))
        .await
        .expect("insert address");
    let paracetamol =
        db.insert_product(NewProduct::new("Paracetamol 500mg", Money::from_cents(500), 0.5)).await.expect("product");
    let amoxicillin = db
        .insert_product(NewProduct::new("Amoxicillin 250mg", Money::from_cents(1200), 0.2).with_prescription())
        .await
        .expect("product");
    let formula =
        db.insert_product(NewProduct::new("Infant formula", Money::from_cents(2000), 3.0)).await.expect("product");
    Fixtures {
        customer,
        doctor,
        staff,
        patient,
        customer_address,
        doctor_address,
        patient_address,
        paracetamol,
        amoxicillin,
        formula,
    }
}
