//! Endpoints for signed-in users: forms, generation and personal history.

pub mod handlers;
pub mod models;

pub use handlers::config;
