//! Catch-all proxy route wiring.
//!
//! A single `/{tail:.*}` resource backed by a payload size limit,
//! dispatching every method to one cloned handler.

use std::sync::Arc;

use actix_web::{web, HttpRequest};

use crate::proxy::ProxyHandler;

const MAX_PAYLOAD_BYTES: usize = 10 * 1024 * 1024;

pub fn configure_proxy(cfg: &mut web::ServiceConfig, handler: Arc<ProxyHandler>) {
    cfg.app_data(web::PayloadConfig::new(MAX_PAYLOAD_BYTES))
        .service(
            web::resource("/{tail:.*}").to(move |req: HttpRequest, body: web::Bytes| {
                let handler = handler.clone();
                async move { handler.handle(req, body).await }
            }),
        );
}
