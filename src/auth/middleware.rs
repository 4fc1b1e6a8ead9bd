use actix_web::HttpRequest;
use uuid::Uuid;

use super::model::{Role, User};
use crate::error::ApiError;
use crate::AppState;

/// Extract token from Authorization header
pub fn extract_token(req: &HttpRequest) -> Option<String> {
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|auth| auth.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
}

/// Resolve the bearer token to an active account.
pub async fn authenticate(req: &HttpRequest, state: &AppState) -> Result<User, ApiError> {
    let token = extract_token(req)
        .ok_or_else(|| ApiError::Unauthorized("Missing authorization token".to_string()))?;

    let claims = state.tokens.validate(&token).map_err(|e| {
        log::warn!("Token validation failed: {:?}", e);
        ApiError::Unauthorized("Invalid or expired token".to_string())
    })?;

    let user_id = Uuid::parse_str(&claims.sub)
        .map_err(|_| ApiError::Unauthorized("Invalid or expired token".to_string()))?;

    match state.users.find_by_id(user_id).await? {
        Some(user) if user.active => Ok(user),
        _ => Err(ApiError::Unauthorized("Not authorized".to_string())),
    }
}

/// Reject users below `required`.
pub fn require_role(user: &User, required: Role) -> Result<(), ApiError> {
    if user.role.satisfies(required) {
        Ok(())
    } else {
        Err(ApiError::Forbidden(format!("Requires {} role", required)))
    }
}

/// Authenticate and check the role in one step.
pub async fn authorize(req: &HttpRequest, state: &AppState, required: Role) -> Result<User, ApiError> {
    let user = authenticate(req, state).await?;
    require_role(&user, required)?;
    Ok(user)
}
