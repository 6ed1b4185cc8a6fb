//! Variable resolver (`###VAR###` substitution).
//!
//! Used by the ACL engine to expand match/action values before comparison,
//! and by the response modifier to expand page bodies before they're sent to
//! the client, including the deliberately-preserved `REQ_IP` alias.

use actix_web::{HttpMessage, HttpRequest};
use once_cell::sync::Lazy;
use regex::Regex;
use uuid::Uuid;

use crate::models::topology::{BackendNode, Listener};

static VARIABLE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"###([A-Za-z_]+)###").expect("static regex is valid"));

/// Everything a variable lookup might need. Borrowed for the lifetime of one
/// resolution pass; nothing here is cloned into the topology.
pub struct VariableContext<'a> {
    pub listener: &'a Listener,
    pub node: Option<&'a BackendNode>,
    pub request: &'a HttpRequest,
}

/// Looks up a single variable by name. Returns `None` for names the proxy
/// doesn't recognize (callers treat `None` as "leave the token unexpanded"
/// or log a warning, per call site).
pub fn resolve_variable(name: &str, ctx: &VariableContext) -> Option<String> {
    match name {
        "NODE_ID" => ctx.node.map(|n| n.id.to_string()),
        "NODE_IP" => ctx.node.map(|n| n.ip.to_string()),
        "LB_IP" => Some(ctx.listener.bind_ip.to_string()),
        "LB_PORT" => Some(ctx.listener.port.to_string()),
        "REQ_URL" => Some(ctx.request.uri().to_string()),
        "REQ_QUERY" => Some(ctx.request.uri().query().unwrap_or("").to_string()),
        "REQ_PATH" => Some(ctx.request.uri().path().to_string()),
        "REQ_HOST" => Some(request_host(ctx.request)),
        // Intentionally identical to REQ_HOST despite the name.
        "REQ_IP" => Some(request_host(ctx.request)),
        "REQ_PROTO" => Some(
            ctx.request
                .connection_info()
                .scheme()
                .to_string(),
        ),
        "CLIENT_IP" => Some(
            ctx.request
                .connection_info()
                .realip_remote_addr()
                .unwrap_or("")
                .to_string(),
        ),
        "CLIENT_CERT" => Some(client_cert_value(ctx.request)),
        "UUID" => Some(Uuid::new_v4().to_string()),
        _ => None,
    }
}

fn request_host(req: &HttpRequest) -> String {
    req.connection_info().host().to_string()
}

/// Strips PEM armor/newlines and joins chain entries with commas.
/// actix-web does not expose the peer certificate chain through
/// `HttpRequest` directly; this returns
/// an empty string unless a prior layer has stashed PEM blobs in the
/// request extensions under [`ClientCertChain`].
fn client_cert_value(req: &HttpRequest) -> String {
    req.extensions()
        .get::<ClientCertChain>()
        .map(|chain| {
            chain
                .0
                .iter()
                .map(|pem| strip_pem_armor(pem))
                .collect::<Vec<_>>()
                .join(",")
        })
        .unwrap_or_default()
}

fn strip_pem_armor(pem: &str) -> String {
    pem.lines()
        .filter(|l| !l.starts_with("-----"))
        .collect::<Vec<_>>()
        .join("")
}

/// Peer certificate chain (PEM-encoded), stashed in request extensions by a
/// TLS-terminating listener. Populating this is outside this crate's scope
/// (see Non-goals); the resolver only knows how to read it.
#[derive(Debug, Clone, Default)]
pub struct ClientCertChain(pub Vec<String>);

/// Expands every `###VAR###` token in `input`. An unknown variable name logs
/// a warning and is replaced by the bare name with its `###` delimiters
/// stripped -- not left as `###NAME###` -- so a typo'd ACL field can never be
/// mistaken for a still-unexpanded token by a downstream matcher.
pub fn expand(input: &str, ctx: &VariableContext) -> String {
    VARIABLE_PATTERN
        .replace_all(input, |caps: &regex::Captures| {
            let name = &caps[1];
            resolve_variable(name, ctx).unwrap_or_else(|| {
                log::warn!("resolver: unknown variable '{name}'");
                name.to_string()
            })
        })
        .into_owned()
}
