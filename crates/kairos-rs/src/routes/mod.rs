//! HTTP route handlers and endpoint definitions for the kairos-rs gateway.
//!
//! # Module Organization
//!
//! - [`health`] - Liveness/readiness endpoints for monitoring and Kubernetes probes
//! - [`metrics`] - Prometheus-compatible metrics endpoint
//! - [`management`] - On-demand configuration reload and topology inspection
//! - [`proxy_route`] - The catch-all proxy resource that dispatches into [`crate::proxy`]

pub mod health;
pub mod management;
pub mod metrics;
pub mod proxy_route;
