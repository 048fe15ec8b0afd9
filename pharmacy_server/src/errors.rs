use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use pharmacy_engine::OrderFlowError;
use stripe_tools::WebhookError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("Could not read request path: {0}")]
    InvalidRequestPath(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
    #[error("No user identity was provided with the request.")]
    Unauthenticated,
    #[error("Insufficient Permissions. {0}")]
    InsufficientPermissions(String),
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("{0}")]
    ValidationError(String),
    #[error("{0}")]
    InvalidState(String),
    #[error("The payment processor could not complete the request. {0}")]
    PaymentGatewayError(String),
    #[error("Invalid webhook delivery. {0}")]
    InvalidWebhook(#[from] WebhookError),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::InvalidRequestPath(_) => StatusCode::BAD_REQUEST,
            Self::ValidationError(_) => StatusCode::BAD_REQUEST,
            Self::InvalidWebhook(_) => StatusCode::BAD_REQUEST,
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::InsufficientPermissions(_) => StatusCode::FORBIDDEN,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::InvalidState(_) => StatusCode::CONFLICT,
            Self::PaymentGatewayError(_) => StatusCode::BAD_GATEWAY,
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": self.to_string() }).to_string())
    }
}

impl From<OrderFlowError> for ServerError {
    fn from(e: OrderFlowError) -> Self {
        match e {
            OrderFlowError::Validation(s) => Self::ValidationError(s),
            OrderFlowError::NotFound(s) => Self::NoRecordFound(s),
            OrderFlowError::IllegalState(s) => Self::InvalidState(s),
            OrderFlowError::Forbidden(s) => Self::InsufficientPermissions(s),
            OrderFlowError::Gateway(s) => Self::PaymentGatewayError(s),
            OrderFlowError::Database(s) => Self::BackendError(s),
        }
    }
}

#[cfg(test)]
mod test {
    use actix_web::body::MessageBody;

    use super::*;

    #[test]
    fn flow_errors_map_to_status_codes() {
        let cases = [
            (OrderFlowError::Validation("A reason is required".into()), StatusCode::BAD_REQUEST),
            (OrderFlowError::NotFound("Order ord_1".into()), StatusCode::NOT_FOUND),
            (OrderFlowError::IllegalState("cannot move from PLACED to FULFILLED".into()), StatusCode::CONFLICT),
            (OrderFlowError::Forbidden("staff only".into()), StatusCode::FORBIDDEN),
            (OrderFlowError::Gateway("timeout".into()), StatusCode::BAD_GATEWAY),
            (OrderFlowError::Database("locked".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ServerError::from(err).status_code(), status);
        }
    }

    #[test]
    fn errors_are_json() {
        let res = ServerError::InvalidState("Order ord_1 cannot move from PLACED to FULFILLED".into()).error_response();
        assert_eq!(res.status(), StatusCode::CONFLICT);
        let body = res.into_body().try_into_bytes().unwrap();
        assert_eq!(body, r#"{"error":"Order ord_1 cannot move from PLACED to FULFILLED"}"#);
    }
}
