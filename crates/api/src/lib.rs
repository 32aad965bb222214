//! HTTP surface of the login flow: step pages, JSON endpoints, error mapping.

pub mod app;
pub mod context;
pub mod middleware;
