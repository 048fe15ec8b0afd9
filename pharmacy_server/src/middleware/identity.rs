//! Identity middleware.
//!
//! Authentication happens in front of this server. The identity-aware proxy forwards who the caller is in two
//! headers, `X-Rx-User-Id` and `X-Rx-User-Role`, and this middleware turns them into an [`Actor`] in the request
//! extensions. Requests without a usable identity pass through untouched; routes that need one reject them, either in
//! the ACL middleware or when extracting a [`Caller`].
use std::{
    future::{ready, Ready},
    ops::Deref,
};

use actix_web::{
    dev::{forward_ready, Payload, Service, ServiceRequest, ServiceResponse, Transform},
    http::header::HeaderMap,
    Error,
    FromRequest,
    HttpMessage,
    HttpRequest,
};
use log::*;
use pharmacy_engine::db_types::{Actor, Role};

use crate::errors::ServerError;

pub const USER_ID_HEADER: &str = "X-Rx-User-Id";
pub const USER_ROLE_HEADER: &str = "X-Rx-User-Role";

pub struct IdentityMiddlewareFactory;

impl<S, B> Transform<S, ServiceRequest> for IdentityMiddlewareFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<B>;
    type Transform = IdentityMiddlewareService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(IdentityMiddlewareService { service }))
    }
}

pub struct IdentityMiddlewareService<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for IdentityMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = S::Future;
    type Response = ServiceResponse<B>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        match actor_from_headers(req.headers()) {
            Some(actor) => {
                trace!("🪪️ Request from {} ({})", actor.user_id, actor.role);
                req.extensions_mut().insert(actor);
            },
            None => trace!("🪪️ Anonymous request to {}", req.path()),
        }
        self.service.call(req)
    }
}

fn actor_from_headers(headers: &HeaderMap) -> Option<Actor> {
    let user_id = headers.get(USER_ID_HEADER)?.to_str().ok()?.trim();
    if user_id.is_empty() {
        return None;
    }
    let role = match headers.get(USER_ROLE_HEADER).and_then(|v| v.to_str().ok()) {
        Some(role) => role.parse::<Role>().map_err(|e| warn!("🪪️ Ignoring identity of {user_id}. {e}")).ok()?,
        None => Role::User,
    };
    Some(Actor::new(user_id, role))
}

/// The identified user making the request.
#[derive(Debug, Clone)]
pub struct Caller(pub Actor);

impl Deref for Caller {
    type Target = Actor;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl FromRequest for Caller {
    type Error = ServerError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(req.extensions().get::<Actor>().cloned().map(Caller).ok_or(ServerError::Unauthenticated))
    }
}
