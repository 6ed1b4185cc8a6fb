//! Core library for the Kairos layer-7 reverse proxy and load balancer.
//!
//! Requests flow through a fixed pipeline of named components, each living
//! in its own module:
//!
//! - [`resolver`] - `###VAR###` token expansion (C1)
//! - [`acl_engine`] - header/cookie allow and deny rules (C2)
//! - [`services::balancer`] - node-selection strategies (C3)
//! - [`models::verdict`] - the director's decision and its legacy wire form (C4)
//! - [`director`] - turns a request into a [`models::verdict::Verdict`] (C5)
//! - [`transport`] - executes a verdict against the upstream (C6)
//! - [`response_modifier`] - outbound ACLs and error/maintenance pages (C7)
//! - [`listener_factory`] - builds each listener's outbound HTTP client (C8)
//!
//! [`proxy`] wires C5-C7 into the single async call an actix-web handler
//! invokes per request. [`config`] loads, validates, and hot-reloads the
//! configuration document that compiles into a [`models::topology::Topology`].

pub mod acl_engine;
pub mod config;
pub mod director;
pub mod listener_factory;
pub mod logs;
pub mod models;
pub mod proxy;
pub mod resolver;
pub mod response_modifier;
pub mod routes;
pub mod services;
pub mod transport;
