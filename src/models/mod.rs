//! API data models
//!
//! This module contains the provider-neutral chat shapes and the
//! vendor-specific request/response payloads.

pub mod chat;
pub mod soochowlife;
pub mod tencent;
