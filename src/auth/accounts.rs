//! Account creation and credential checks shared by the handlers and startup.

use thiserror::Error;

use super::jwt::PasswordHasher;
use super::model::{NewUser, Role, User};
use crate::db::{StoreError, UserRepository};
use crate::error::ApiError;

pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("Invalid email")]
    InvalidEmail,
    #[error("Password must be at least 6 characters")]
    WeakPassword,
    #[error("Failed to hash password: {0}")]
    Hash(#[from] bcrypt::BcryptError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<AccountError> for ApiError {
    fn from(error: AccountError) -> Self {
        match error {
            AccountError::InvalidEmail | AccountError::WeakPassword => {
                ApiError::Validation(error.to_string())
            }
            AccountError::Hash(e) => ApiError::internal("Failed to create user", e),
            AccountError::Store(e) => e.into(),
        }
    }
}

/// Trimmed, lowercased email.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Validate and store a new account.
pub async fn create_account(
    users: &dyn UserRepository,
    hasher: &PasswordHasher,
    email: &str,
    password: &str,
    role: Role,
) -> Result<User, AccountError> {
    let email = normalize_email(email);
    if !email.contains('@') {
        return Err(AccountError::InvalidEmail);
    }
    let password = password.trim();
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AccountError::WeakPassword);
    }

    let password_hash = hasher.hash(password)?;
    let user = users
        .create(NewUser {
            email,
            password_hash,
            role,
        })
        .await?;
    Ok(user)
}

/// Check credentials. Unknown, inactive and wrong-password accounts are
/// indistinguishable to the caller: all return `Ok(None)`.
pub async fn verify_credentials(
    users: &dyn UserRepository,
    hasher: &PasswordHasher,
    email: &str,
    password: &str,
) -> Result<Option<User>, StoreError> {
    let email = normalize_email(email);
    let password = password.trim();

    let user = match users.find_by_email(&email).await? {
        Some(user) => user,
        None => {
            hasher.verify_dummy(password);
            return Ok(None);
        }
    };

    if !hasher.verify(password, &user.password_hash) || !user.active {
        return Ok(None);
    }
    Ok(Some(user))
}
