use thiserror::Error;

use crate::{
    pricing::PricingError,
    traits::{PaymentProcessorError, PharmacyDbError},
};

/// Errors returned by the order lifecycle and order query APIs.
///
/// None of these leave partial writes behind: a failed operation has changed nothing.
#[derive(Debug, Clone, Error)]
pub enum OrderFlowError {
    #[error("Invalid request: {0}")]
    Validation(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid status: {0}")]
    IllegalState(String),
    #[error("Not allowed: {0}")]
    Forbidden(String),
    #[error("Payment processor error: {0}")]
    Gateway(String),
    #[error("Database error: {0}")]
    Database(String),
}

impl From<PharmacyDbError> for OrderFlowError {
    fn from(e: PharmacyDbError) -> Self {
        match e {
            PharmacyDbError::OrderNotFound(_) | PharmacyDbError::PaymentNotFound(_) | PharmacyDbError::RecordNotFound(_) => {
                OrderFlowError::NotFound(e.to_string())
            },
            PharmacyDbError::IllegalTransition { .. } |
            PharmacyDbError::UnsupportedTransition(_) |
            PharmacyDbError::PaymentAlreadyCaptured(_) => OrderFlowError::IllegalState(e.to_string()),
            PharmacyDbError::DatabaseError(_) | PharmacyDbError::CodeGenerationFailed(_) => {
                OrderFlowError::Database(e.to_string())
            },
        }
    }
}

impl From<PricingError> for OrderFlowError {
    fn from(e: PricingError) -> Self {
        OrderFlowError::Validation(e.to_string())
    }
}

impl From<PaymentProcessorError> for OrderFlowError {
    fn from(e: PaymentProcessorError) -> Self {
        OrderFlowError::Gateway(e.to_string())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::db_types::{OrderId, OrderStatusType};

    #[test]
    fn db_errors_map_onto_the_taxonomy() {
        let e = OrderFlowError::from(PharmacyDbError::OrderNotFound(OrderId::from("ord_1")));
        assert!(matches!(e, OrderFlowError::NotFound(_)));
        let e = OrderFlowError::from(PharmacyDbError::IllegalTransition {
            order_id: OrderId::from("ord_1"),
            from: OrderStatusType::Placed,
            to: OrderStatusType::Fulfilled,
        });
        assert_eq!(e.to_string(), "Invalid status: Order ord_1 cannot move from PLACED to FULFILLED");
        let e = OrderFlowError::from(PharmacyDbError::DatabaseError("disk I/O error".into()));
        assert!(matches!(e, OrderFlowError::Database(_)));
    }
}
