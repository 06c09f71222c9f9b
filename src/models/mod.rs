//! Wire models

pub mod prediction;
pub mod service;

pub use prediction::*;
pub use service::*;
