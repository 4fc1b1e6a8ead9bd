pub mod accounts;
pub mod handlers;
pub mod jwt;
pub mod middleware;
pub mod model;


pub use jwt::{PasswordHasher, TokenError, TokenService};
pub use middleware::{authenticate, authorize, extract_token, require_role};
pub use model::*;
