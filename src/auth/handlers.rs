use actix_web::{web, HttpRequest, HttpResponse};

use super::accounts::verify_credentials;
use super::middleware::authenticate;
use super::model::{LoginRequest, LoginResponse, MeResponse};
use crate::error::ApiError;
use crate::AppState;

const INVALID_CREDENTIALS: &str = "Invalid email or password";

/// Login endpoint
#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "Authentication",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 401, description = "Invalid credentials", body = crate::ErrorResponse)
    )
)]
pub async fn login(
    state: web::Data<AppState>,
    body: web::Json<LoginRequest>,
) -> Result<HttpResponse, ApiError> {
    let email = body.identifier();
    if email.is_empty() || body.password.trim().is_empty() {
        return Err(ApiError::Unauthorized(INVALID_CREDENTIALS.to_string()));
    }

    let user = match verify_credentials(state.users.as_ref(), &state.passwords, &email, &body.password).await? {
        Some(user) => user,
        None => {
            log::info!("Rejected login for {}", email);
            return Err(ApiError::Unauthorized(INVALID_CREDENTIALS.to_string()));
        }
    };

    let token = state
        .tokens
        .issue(&user)
        .map_err(|e| ApiError::internal("Failed to generate token", e))?;

    log::info!("User {} logged in as {}", user.email, user.role);
    Ok(HttpResponse::Ok().json(LoginResponse {
        token,
        role: user.role,
        email: user.email,
    }))
}

/// Current account
#[utoipa::path(
    get,
    path = "/auth/me",
    tag = "Authentication",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Authenticated account", body = MeResponse),
        (status = 401, description = "Unauthorized", body = crate::ErrorResponse)
    )
)]
pub async fn me(req: HttpRequest, state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let user = authenticate(&req, &state).await?;
    Ok(HttpResponse::Ok().json(MeResponse {
        id: user.id,
        email: user.email,
        role: user.role,
    }))
}

/// Configure auth routes
pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/auth")
            .route("/login", web::post().to(login))
            .route("/me", web::get().to(me)),
    );
}
