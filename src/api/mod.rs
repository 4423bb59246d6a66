//! HTTP surface: gateway endpoints and the vendor reverse proxy

pub mod endpoints;
pub mod proxy;
