//! aiodns - domain-list driven upstream routing for a forwarding DNS proxy.
//!
//! This library fetches domain lists, normalizes them and compiles the
//! per-domain upstream directives handed to the resolution engine.

pub mod config;
pub mod dns;
pub mod error;
pub mod fetch;
pub mod list;
pub mod pipeline;
pub mod rules;
pub mod stats;
