//! Conversion between the gateway's chat shapes and vendor wire formats

pub mod request_converter;
pub mod response_converter;
