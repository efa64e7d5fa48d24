//! ReWear core logic.
//!
//! Pure functions with no storage or HTTP dependencies: eco-impact scoring,
//! great-circle distance and nearby ranking, and the messaging receiver rule.

pub mod eco;
pub mod error;
pub mod geo;
pub mod messaging;
pub mod nearby;

pub use error::CoreError;
