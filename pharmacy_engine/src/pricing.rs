//! Delivery cost and order totals.
//!
//! Delivery is a flat fee that depends on the province, plus a per-pound surcharge for heavy orders. All amounts are
//! whole cents so that totals are exact.
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db_types::Money;

/// Deliveries to this province get the reduced base fee. Matching ignores case and surrounding whitespace.
pub const LOW_COST_PROVINCE: &str = "La Habana";
pub const LOW_COST_DELIVERY: Money = Money::from_cents(500);
pub const STANDARD_DELIVERY: Money = Money::from_cents(700);
/// Orders up to this weight (in pounds) pay no surcharge.
pub const FREE_WEIGHT_ALLOWANCE: f64 = 5.0;
/// Surcharge per pound above the allowance, in cents.
pub const SURCHARGE_PER_POUND: f64 = 200.0;

pub fn is_low_cost_province(province: &str) -> bool {
    province.trim().eq_ignore_ascii_case(LOW_COST_PROVINCE)
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PricingError {
    #[error("The order total is too large to be charged")]
    Overflow,
    #[error("The order weight {0} is not a valid weight")]
    InvalidWeight(String),
}

/// The delivery fee for an order of `total_weight` pounds going to `province`.
///
/// Weights too large to price give the largest representable fee. Use [`checked_delivery`] to detect them.
pub fn compute_delivery(province: &str, total_weight: f64) -> Money {
    checked_delivery(province, total_weight).unwrap_or(Money::from_cents(i64::MAX))
}

pub fn checked_delivery(province: &str, total_weight: f64) -> Result<Money, PricingError> {
    if !total_weight.is_finite() || total_weight < 0.0 {
        return Err(PricingError::InvalidWeight(total_weight.to_string()));
    }
    let base = if is_low_cost_province(province) { LOW_COST_DELIVERY } else { STANDARD_DELIVERY };
    if total_weight <= FREE_WEIGHT_ALLOWANCE {
        return Ok(base);
    }
    let surcharge = ((total_weight - FREE_WEIGHT_ALLOWANCE) * SURCHARGE_PER_POUND).round();
    // i64::MAX rounds up to 2^63 as a float, and nothing at or above that fits
    #[allow(clippy::cast_precision_loss)]
    let limit = i64::MAX as f64;
    if surcharge >= limit {
        return Err(PricingError::Overflow);
    }
    #[allow(clippy::cast_possible_truncation)]
    let surcharge = Money::from_cents(surcharge as i64);
    base.checked_add(surcharge).ok_or(PricingError::Overflow)
}

/// One line of a cart: unit price and weight, times a quantity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceLine {
    pub price: Money,
    pub weight: f64,
    pub quantity: i64,
}

impl PriceLine {
    pub fn new(price: Money, weight: f64, quantity: i64) -> Self {
        Self { price, weight, quantity }
    }

    pub fn subtotal(&self) -> Result<Money, PricingError> {
        self.price.checked_mul(self.quantity).ok_or(PricingError::Overflow)
    }

    #[allow(clippy::cast_precision_loss)]
    pub fn weight(&self) -> f64 {
        self.weight * self.quantity as f64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceBreakdown {
    pub subtotal: Money,
    pub delivery: Money,
    pub total: Money,
    pub total_weight: f64,
}

pub fn price_breakdown(province: &str, lines: &[PriceLine]) -> Result<PriceBreakdown, PricingError> {
    let subtotal = lines
        .iter()
        .try_fold(Money::default(), |acc, line| acc.checked_add(line.subtotal()?).ok_or(PricingError::Overflow))?;
    let total_weight = lines.iter().map(PriceLine::weight).sum::<f64>();
    let delivery = checked_delivery(province, total_weight)?;
    let total = subtotal.checked_add(delivery).ok_or(PricingError::Overflow)?;
    Ok(PriceBreakdown { subtotal, delivery, total, total_weight })
}

#[cfg(test)]
mod test {
    use super::*;

    fn cents(c: i64) -> Money {
        Money::from_cents(c)
    }

    #[test]
    fn delivery_fees() {
        assert_eq!(compute_delivery("La Habana", 3.0), cents(500));
        assert_eq!(compute_delivery("La Habana", 7.0), cents(900));
        assert_eq!(compute_delivery("Other", 3.0), cents(700));
        assert_eq!(compute_delivery("Other", 10.0), cents(1700));
    }

    #[test]
    fn province_matching_is_lenient() {
        assert_eq!(compute_delivery("la habana", 1.0), cents(500));
        assert_eq!(compute_delivery("  LA HABANA ", 1.0), cents(500));
        assert_eq!(compute_delivery("Habana", 1.0), cents(700));
        assert_eq!(compute_delivery("", 0.0), cents(700));
    }

    #[test]
    fn surcharge_boundaries() {
        // Exactly at the allowance there is no surcharge
        assert_eq!(compute_delivery("Matanzas", 5.0), cents(700));
        assert_eq!(compute_delivery("Matanzas", 5.5), cents(800));
        assert_eq!(compute_delivery("Matanzas", 5.001), cents(700));
        assert_eq!(compute_delivery("Matanzas", 6.25), cents(950));
    }

    #[test]
    fn breakdown() {
        let lines = [PriceLine::new(cents(1250), 0.5, 2), PriceLine::new(cents(399), 2.0, 3)];
        let b = price_breakdown("La Habana", &lines).unwrap();
        assert_eq!(b.subtotal, cents(2500 + 1197));
        assert!((b.total_weight - 7.0).abs() < f64::EPSILON);
        assert_eq!(b.delivery, cents(900));
        assert_eq!(b.total, cents(3697 + 900));
    }

    #[test]
    fn empty_cart() {
        let b = price_breakdown("Other", &[]).unwrap();
        assert_eq!(b.subtotal, cents(0));
        assert_eq!(b.total, cents(700));
    }

    #[test]
    fn totals_that_do_not_fit_are_refused() {
        let huge = PriceLine::new(cents(500), 0.5, i64::MAX / 500 + 10);
        assert_eq!(huge.subtotal(), Err(PricingError::Overflow));
        assert_eq!(price_breakdown("La Habana", &[huge]), Err(PricingError::Overflow));

        let two_big = [PriceLine::new(cents(i64::MAX / 2), 0.0, 1), PriceLine::new(cents(i64::MAX / 2 + 2), 0.0, 1)];
        assert_eq!(price_breakdown("Other", &two_big), Err(PricingError::Overflow));
        // The subtotal fits but the delivery fee pushes it over
        let at_limit = [PriceLine::new(cents(i64::MAX - 600), 0.0, 1)];
        assert_eq!(price_breakdown("Other", &at_limit), Err(PricingError::Overflow));
    }

    #[test]
    fn absurd_weights_are_refused() {
        assert_eq!(checked_delivery("Other", 1e30), Err(PricingError::Overflow));
        assert!(matches!(checked_delivery("Other", f64::INFINITY), Err(PricingError::InvalidWeight(_))));
        assert!(matches!(checked_delivery("Other", f64::NAN), Err(PricingError::InvalidWeight(_))));
        assert_eq!(compute_delivery("Other", 1e30), cents(i64::MAX));
        let heavy = PriceLine::new(cents(100), 1e20, 1000);
        assert_eq!(price_breakdown("Other", &[heavy]), Err(PricingError::Overflow));
    }
}
