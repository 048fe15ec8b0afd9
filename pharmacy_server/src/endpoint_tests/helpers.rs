use actix_web::{body::MessageBody, http::StatusCode, test, test::TestRequest, web::ServiceConfig, App};
use log::debug;
use pharmacy_engine::db_types::Actor;
use serde_json::Value;

use crate::middleware::{IdentityMiddlewareFactory, USER_ID_HEADER, USER_ROLE_HEADER};

pub async fn get_request<F>(actor: Option<&Actor>, path: &str, configure: F) -> (StatusCode, String)
where F: FnOnce(&mut ServiceConfig) {
    send_request(TestRequest::get().uri(path), actor, configure).await
}

pub async fn post_request<F>(actor: Option<&Actor>, path: &str, body: Value, configure: F) -> (StatusCode, String)
where F: FnOnce(&mut ServiceConfig) {
    send_request(TestRequest::post().uri(path).set_json(body), actor, configure).await
}

/// Calls the configured routes behind the identity middleware, as the server does for `/api`. Errors raised by
/// middleware are turned into responses the same way the HTTP layer would.
pub async fn send_request<F>(mut req: TestRequest, actor: Option<&Actor>, configure: F) -> (StatusCode, String)
where F: FnOnce(&mut ServiceConfig) {
    if let Some(actor) = actor {
        req = req
            .insert_header((USER_ID_HEADER, actor.user_id.as_str()))
            .insert_header((USER_ROLE_HEADER, actor.role.to_string()));
    }
    let app = App::new().wrap(IdentityMiddlewareFactory).configure(configure);
    let service = test::init_service(app).await;
    debug!("Making request");
    match test::try_call_service(&service, req.to_request()).await {
        Ok(res) => {
            let status = res.status();
            let body = test::read_body(res).await;
            (status, String::from_utf8_lossy(&body).into_owned())
        },
        Err(e) => {
            let res = e.error_response();
            let status = res.status();
            let body = res.into_body().try_into_bytes().unwrap_or_default();
            (status, String::from_utf8_lossy(&body).into_owned())
        },
    }
}
