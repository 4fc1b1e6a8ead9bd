//! Unauthenticated document endpoints: health, template ids, generation and
//! downloads.

pub mod handlers;
pub mod models;

pub use handlers::config;
