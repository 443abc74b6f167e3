use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
    Json,
};
use std::sync::Arc;

use super::jwt::JwtManager;
use crate::errors::ApiError;

#[derive(Clone)]
pub struct AuthState {
    pub jwt: Arc<JwtManager>,
}

/// Auth middleware: validates the JWT from the Authorization header and puts
/// the claims into request extensions.
pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: Request,
    next: Next,
) -> Result<Response, (StatusCode, Json<ApiError>)> {
    let auth_header = req
        .headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let Some(token) = auth_header.strip_prefix("Bearer ") else {
        return Err(unauthorized("Missing authorization header"));
    };

    let claims = state
        .jwt
        .validate_token(token)
        .map_err(|_| unauthorized("Invalid or expired token"))?;

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

fn unauthorized(message: &str) -> (StatusCode, Json<ApiError>) {
    (
        StatusCode::UNAUTHORIZED,
        Json(ApiError {
            code: "UNAUTHORIZED".into(),
            message: message.into(),
        }),
    )
}
