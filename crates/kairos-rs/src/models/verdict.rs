//! The decision the director hands to the transport.
//!
//! Historically this was smuggled through `req.URL.Scheme` as a
//! `//`-delimited pseudo-scheme string. The primary representation here is
//! the tagged [`Verdict`] enum, attached to the request via
//! [`actix_web::HttpMessage::extensions_mut`]; [`Verdict::encode_legacy`] and
//! [`Verdict::decode_legacy`] exist only to keep the historical wire grammar
//! round-trippable for interop and for the fixture tests that assert against
//! it.

use uuid::Uuid;

/// Outcome of running a request through [`crate::director`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// No backend could serve the request; synthesize an error page.
    Error {
        backend: String,
        code: u16,
        message: String,
    },
    /// The backend (or the only reachable node) is under maintenance.
    Maintenance { backend: String, message: String },
    /// Short-circuit: the listener itself should answer, no node involved.
    Internal { backend: String, host: String },
    /// Forward to a concrete node.
    Forward {
        backend: String,
        node_id: Uuid,
        scheme: String,
    },
}

impl Verdict {
    /// Encodes using the corrected delimiter grammar
    /// (`proto//backend//code//message` for errors and maintenance,
    /// `proto//backend//host-or-node` otherwise). A known legacy variant of
    /// this codec dropped the `//` before the status code on its deny-ACL
    /// branch; that bug is not reproduced here.
    pub fn encode_legacy(&self) -> String {
        match self {
            Verdict::Error {
                backend,
                code,
                message,
            } => format!("error//{backend}//{code}//{message}"),
            Verdict::Maintenance { backend, message } => {
                format!("maintenance//{backend}//503//{message}")
            }
            Verdict::Internal { backend, host } => format!("internal//{backend}//{host}"),
            Verdict::Forward {
                backend,
                node_id,
                scheme,
            } => format!("{scheme}//{backend}//{node_id}"),
        }
    }

    /// Parses the legacy grammar back into a [`Verdict`]. Returns `None` for
    /// malformed input (missing parts, or a forward node id that isn't a
    /// valid UUID).
    pub fn decode_legacy(raw: &str) -> Option<Verdict> {
        let parts: Vec<&str> = raw.split("//").collect();
        let proto = *parts.first()?;
        match proto {
            "error" => {
                let backend = (*parts.get(1)?).to_string();
                let code: u16 = parts.get(2)?.parse().ok()?;
                let message = parts.get(3..)?.join("//");
                Some(Verdict::Error {
                    backend,
                    code,
                    message,
                })
            }
            "maintenance" => {
                let backend = (*parts.get(1)?).to_string();
                let message = parts.get(3..)?.join("//");
                Some(Verdict::Maintenance { backend, message })
            }
            "internal" => {
                let backend = (*parts.get(1)?).to_string();
                let host = (*parts.get(2)?).to_string();
                Some(Verdict::Internal { backend, host })
            }
            "http" | "https" => {
                let backend = (*parts.get(1)?).to_string();
                let node_id = Uuid::parse_str(parts.get(2)?).ok()?;
                Some(Verdict::Forward {
                    backend,
                    node_id,
                    scheme: proto.to_string(),
                })
            }
            _ => None,
        }
    }
}
