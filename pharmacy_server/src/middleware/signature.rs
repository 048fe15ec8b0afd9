//! Webhook signature middleware.
//!
//! The card processor signs every webhook delivery. The signature covers the raw request body, so this middleware
//! reads the body, checks it against the `Stripe-Signature` header and then puts the body back for the handler.
//! Deliveries with a missing, malformed, stale or wrong signature are refused with a 400 before any handler runs.
use std::{
    future::{ready, Ready},
    rc::Rc,
};

use actix_http::h1;
use actix_web::{
    dev::{forward_ready, Payload, Service, ServiceRequest, ServiceResponse, Transform},
    web,
    Error,
};
use futures::future::LocalBoxFuture;
use log::*;
use pharmacy_common::Secret;
use stripe_tools::{
    webhook::{verify_header, SIGNATURE_HEADER},
    WebhookError,
};

use crate::errors::ServerError;

pub struct SignatureMiddlewareFactory {
    secret: Secret<String>,
    tolerance_secs: i64,
}

impl SignatureMiddlewareFactory {
    pub fn new(secret: Secret<String>, tolerance_secs: i64) -> Self {
        SignatureMiddlewareFactory { secret, tolerance_secs }
    }
}

impl<S, B> Transform<S, ServiceRequest> for SignatureMiddlewareFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<B>;
    type Transform = SignatureMiddlewareService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(SignatureMiddlewareService {
            secret: self.secret.clone(),
            tolerance_secs: self.tolerance_secs,
            service: Rc::new(service),
        }))
    }
}

pub struct SignatureMiddlewareService<S> {
    secret: Secret<String>,
    tolerance_secs: i64,
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for SignatureMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;
    type Response = ServiceResponse<B>;

    forward_ready!(service);

    fn call(&self, mut req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let secret = self.secret.reveal().clone();
        let tolerance = self.tolerance_secs;
        Box::pin(async move {
            trace!("🔏️ Checking webhook signature");
            let data = req.extract::<web::Bytes>().await.map_err(|e| {
                warn!("🔏️ Failed to extract webhook body: {e:?}");
                ServerError::InvalidRequestBody("Failed to extract request data.".into())
            })?;
            let header = req
                .headers()
                .get(SIGNATURE_HEADER)
                .and_then(|v| v.to_str().ok())
                .ok_or_else(|| {
                    warn!("🔏️ No signature found on webhook delivery. Denying access.");
                    ServerError::InvalidWebhook(WebhookError::MalformedHeader("no signature header".into()))
                })?
                .to_string();
            match verify_header(data.as_ref(), &header, &secret, tolerance) {
                Ok(()) => {
                    trace!("🔏️ Webhook signature ✅️");
                    req.set_payload(bytes_to_payload(data));
                    service.call(req).await
                },
                Err(e) => {
                    warn!("🔏️ Invalid webhook signature. {e}");
                    Err(ServerError::InvalidWebhook(e).into())
                },
            }
        })
    }
}

fn bytes_to_payload(buf: web::Bytes) -> Payload {
    let (_, mut pl) = h1::Payload::create(true);
    pl.unread_data(buf);
    Payload::from(pl)
}
