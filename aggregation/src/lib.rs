//! Gradient buffering, compression and Byzantine robust aggregation.

pub mod adversary;
pub mod clock;
pub mod compression;
mod error;
pub mod gar;
mod jacobian;

pub use error::{AggErr, Result};
pub use jacobian::JacobianBuffer;
