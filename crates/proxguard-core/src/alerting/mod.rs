//! Alerting context: proximity scanning and deduplicated alert
//! construction.

pub mod builder;
pub mod proximity;

pub use builder::AlertBuilder;
pub use proximity::{ProximityEvent, ProximityScanner};
