//! HTTP request handlers.

pub mod analytics;
pub mod events;
pub mod health;

pub use health::health_check;
