use rand::{distributions::Alphanumeric, Rng};

use crate::db_types::OrderId;

/// Characters used in order codes. Look-alikes (0/O, 1/I) are left out since codes get read out over the phone.
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
pub const ORDER_CODE_LENGTH: usize = 4;

/// A fresh opaque order id, e.g. `ord_k3j9x0q2m1c8v7b6z5n4`.
pub fn new_order_id() -> OrderId {
    let suffix = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(20)
        .map(|c| char::from(c).to_ascii_lowercase())
        .collect::<String>();
    OrderId(format!("ord_{suffix}"))
}

/// A random order code. Uniqueness is enforced by the store, which retries on collision.
pub fn random_order_code() -> String {
    let mut rng = rand::thread_rng();
    (0..ORDER_CODE_LENGTH).map(|_| char::from(CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())])).collect()
}
