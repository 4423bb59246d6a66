//! Vendor client implementations

pub mod soochowlife;
pub mod tencent;

pub use soochowlife::SoochowLifeProvider;
pub use tencent::TencentProvider;
