use thiserror::Error;

#[derive(Debug, Error)]
pub enum StripeApiError {
    #[error("Could not initialize client: {0}")]
    Initialization(String),
    #[error("Invalid REST request: {0}")]
    RestRequestError(String),
    #[error("Invalid REST response: {0}")]
    RestResponseError(String),
    #[error("Could not deserialize JSON: {0}")]
    JsonError(String),
    #[error("Stripe request failed. Error {status}. {message}")]
    QueryError { status: u16, message: String },
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WebhookError {
    #[error("The signature header is missing or malformed: {0}")]
    MalformedHeader(String),
    #[error("No signature in the header matches the payload")]
    SignatureMismatch,
    #[error("The event timestamp is outside the tolerance window ({0}s)")]
    TimestampOutOfTolerance(i64),
    #[error("The webhook signing key is unusable: {0}")]
    InvalidKey(String),
    #[error("The event payload could not be parsed: {0}")]
    InvalidPayload(String),
}
