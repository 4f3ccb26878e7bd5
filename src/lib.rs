//! Consent-gated encrypted storage on top of the Swift Protocol API.
//!
//! `routes` is the HTTP proxy that holds the API key and talks to the
//! service through `swift`. `session`, `viewer` and `shell` form the
//! interactive front end, which reaches the proxy through `proxy`.

pub mod config;
pub mod consent;
pub mod error;
pub mod model;
pub mod proxy;
pub mod routes;
pub mod session;
pub mod shell;
pub mod swift;
pub mod viewer;
