//! Response Modifier (C7): turns transport's output into the response the
//! client actually receives.
//!
//! Decodes the verdict, resolves backend-page-before-listener-page
//! fallback, and substitutes a
//! maintenance or error page's body when the verdict or the upstream status
//! calls for it. For a genuine [`crate::transport::TransportOutcome::Upstream`]
//! response this also runs outbound ACLs before any page substitution check.

use actix_web::{HttpRequest, HttpResponse};
use reqwest::header::HeaderMap as ReqwestHeaderMap;

use crate::acl_engine;
use crate::models::topology::{Backend, Listener, Page};
use crate::resolver::{self, VariableContext};
use crate::transport::{render_status_page, SynthesizedKind};

fn effective_error_page<'a>(backend: Option<&'a Backend>, listener: &'a Listener) -> Option<&'a Page> {
    backend
        .and_then(|b| b.error_page.as_ref())
        .filter(|p| !p.is_empty())
        .or_else(|| listener.default_error_page.as_ref().filter(|p| !p.is_empty()))
}

fn effective_maintenance_page<'a>(backend: Option<&'a Backend>, listener: &'a Listener) -> Option<&'a Page> {
    backend
        .and_then(|b| b.maintenance_page.as_ref())
        .filter(|p| !p.is_empty())
        .or_else(|| listener.default_maintenance_page.as_ref().filter(|p| !p.is_empty()))
}

fn page_threshold_matches(page: &Page, status: u16) -> bool {
    page.status_threshold != 0 && status >= page.status_threshold
}

fn render_page(page: &Page, status: u16, message: &str, ctx: &VariableContext) -> HttpResponse {
    let status_code =
        actix_web::http::StatusCode::from_u16(status).unwrap_or(actix_web::http::StatusCode::BAD_GATEWAY);
    let body = resolver::expand(&page.content, ctx);
    HttpResponse::build(status_code)
        .insert_header(("x-statuscode", status.to_string()))
        .insert_header(("x-statusmessage", message.to_string()))
        .insert_header(("Cache-Control", "no-cache, no-store, must-revalidate"))
        .insert_header(("Pragma", "no-cache"))
        .insert_header(("Expires", "0"))
        .content_type("text/html; charset=utf-8")
        .body(body)
}

/// Finishes a [`crate::transport::TransportOutcome::Synthesized`] outcome:
/// §4.7 steps 1-4. A [`SynthesizedKind::Maintenance`] verdict prefers the
/// maintenance page, falling through to the error page when none is
/// configured; [`SynthesizedKind::Error`] and [`SynthesizedKind::Internal`]
/// only ever consult the error page, and only when its `threshold()`
/// predicate actually covers the synthesized status. Falls back to
/// `default_response` (the page [`crate::transport`] already rendered) when
/// nothing applies.
pub fn modify_synthesized(
    default_response: HttpResponse,
    backend: Option<&Backend>,
    listener: &Listener,
    kind: SynthesizedKind,
    status: u16,
    message: &str,
    req: &HttpRequest,
) -> HttpResponse {
    let ctx = VariableContext {
        listener,
        node: None,
        request: req,
    };

    match kind {
        SynthesizedKind::Maintenance => {
            if let Some(page) = effective_maintenance_page(backend, listener) {
                return render_page(page, status, message, &ctx);
            }
            if let Some(page) = effective_error_page(backend, listener) {
                return render_page(page, status, message, &ctx);
            }
        }
        SynthesizedKind::Error => {
            if let Some(page) = effective_error_page(backend, listener) {
                return render_page(page, status, message, &ctx);
            }
        }
        SynthesizedKind::Internal => {
            if let Some(page) = effective_error_page(backend, listener) {
                if page_threshold_matches(page, status) {
                    return render_page(page, status, message, &ctx);
                }
            }
        }
    }

    default_response
}

/// Finishes a [`crate::transport::TransportOutcome::Upstream`] outcome:
/// outbound ACL processing, then §4.7 step 4's threshold check before
/// passing the real upstream body through unmodified.
pub async fn modify(
    response: reqwest::Response,
    backend: &Backend,
    node_id: uuid::Uuid,
    listener: &Listener,
    req: &HttpRequest,
) -> HttpResponse {
    let node = backend.node_by_id(node_id);
    // The round trip already completed by the time a response reaches here;
    // release the in-flight slot director::direct reserved before forwarding.
    if let Some(node) = node {
        node.statistics.connected_add(-1);
    }

    let ctx = VariableContext {
        listener,
        node,
        request: req,
    };

    let status = response.status().as_u16();
    let mut headers: ReqwestHeaderMap = response.headers().clone();

    acl_engine::process(&backend.outbound_acls, &mut headers, &ctx);

    // Unlike a direct Error/Maintenance verdict (see `modify_synthesized`),
    // a real forward's status came from the upstream itself, so only the
    // error page's threshold() predicate -- never the maintenance page --
    // can trigger substitution here (§4.7 step 4(b)/step 5).
    if let Some(page) = effective_error_page(Some(backend), listener) {
        if page_threshold_matches(page, status) {
            return render_page(page, status, "Upstream error", &ctx);
        }
    }

    let mut builder = HttpResponse::build(
        actix_web::http::StatusCode::from_u16(status).unwrap_or(actix_web::http::StatusCode::BAD_GATEWAY),
    );
    for (name, value) in headers.iter() {
        if name.as_str().eq_ignore_ascii_case("connection") {
            continue;
        }
        if let Ok(v) = value.to_str() {
            builder.insert_header((name.as_str(), v));
        }
    }

    match response.bytes().await {
        Ok(bytes) => {
            if let Some(node) = node {
                node.statistics.tx_add(bytes.len() as u64);
            }
            builder.body(bytes)
        }
        Err(err) => {
            log::error!("response_modifier: failed reading upstream body: {err}");
            render_status_page(500, &format!("failed to read upstream response: {err}"))
        }
    }
}
