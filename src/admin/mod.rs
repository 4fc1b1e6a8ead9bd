//! Superadmin endpoints: template management, accounts and history.

pub mod handlers;
pub mod models;
pub mod multipart_parser;

pub use handlers::config;
