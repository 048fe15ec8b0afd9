//! Access control list middleware.
//! This middleware can be placed on any route or service that sits behind the identity middleware.
//!
//! It reads the [`Actor`] that the identity middleware placed in the request extensions and lets the request through
//! if the actor holds any one of the roles the route allows. Anonymous requests get a 401, everyone else a 403.
use std::{future::Future, pin::Pin, rc::Rc};

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error,
    HttpMessage,
};
use futures::future::{ok, Ready};
use log::*;
use pharmacy_engine::db_types::{Actor, Role};

use crate::errors::ServerError;

pub struct AclMiddlewareFactory {
    allowed_roles: Vec<Role>,
}

impl AclMiddlewareFactory {
    pub fn new(allowed_roles: &[Role]) -> Self {
        AclMiddlewareFactory { allowed_roles: allowed_roles.to_vec() }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AclMiddlewareFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<B>;
    type Transform = AclMiddlewareService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(AclMiddlewareService { allowed_roles: self.allowed_roles.clone(), service: Rc::new(service) })
    }
}

pub struct AclMiddlewareService<S> {
    allowed_roles: Vec<Role>,
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for AclMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;
    type Response = ServiceResponse<B>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let allowed_roles = self.allowed_roles.clone();
        Box::pin(async move {
            let actor = req.extensions().get::<Actor>().cloned();
            let actor = actor.ok_or_else(|| {
                debug!("🔐️ No identity on request to {}. Denying access.", req.path());
                ServerError::Unauthenticated
            })?;
            if allowed_roles.contains(&actor.role) {
                service.call(req).await
            } else {
                info!("🔐️ {} ({}) may not access {}", actor.user_id, actor.role, req.path());
                Err(ServerError::InsufficientPermissions(format!("{} is not allowed here", actor.role)).into())
            }
        })
    }
}
