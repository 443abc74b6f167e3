use axum::{extract::State, Extension, Json};

use crate::auth::Claims;
use crate::db::UserRepo;
use crate::errors::AppError;
use crate::handlers::AppState;
use crate::models::{LoginRequest, SignupRequest, TokenResponse, UserInfo};

pub async fn signup(
    State(state): State<AppState>,
    Json(req): Json<SignupRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    if req.email.trim().is_empty() || req.password.len() < 8 {
        return Err(AppError::bad_request(
            "Email is required and the password must be at least 8 characters",
        ));
    }

    let password_hash = bcrypt::hash(&req.password, bcrypt::DEFAULT_COST)
        .map_err(|_| AppError::internal("Password hashing failed"))?;

    let user = UserRepo::create(&state.pool, req.email.trim(), &password_hash)
        .await
        .map_err(|e| {
            tracing::error!("Failed to create user: {:?}", e);
            AppError::conflict("User with this email already exists")
        })?;

    let token = state
        .jwt
        .generate_token(user.id, &user.email)
        .map_err(|_| AppError::internal("Token generation failed"))?;

    Ok(Json(TokenResponse {
        token,
        user: UserInfo {
            id: user.id,
            email: user.email,
        },
    }))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    let user = UserRepo::get_by_email(&state.pool, req.email.trim())
        .await
        .map_err(|_| AppError::internal("Database error"))?
        .ok_or_else(|| AppError::unauthorized("Invalid email or password"))?;

    let valid = bcrypt::verify(&req.password, &user.password_hash)
        .map_err(|_| AppError::internal("Password verification failed"))?;
    if !valid {
        return Err(AppError::unauthorized("Invalid email or password"));
    }

    let token = state
        .jwt
        .generate_token(user.id, &user.email)
        .map_err(|_| AppError::internal("Token generation failed"))?;

    Ok(Json(TokenResponse {
        token,
        user: UserInfo {
            id: user.id,
            email: user.email,
        },
    }))
}

pub async fn me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<UserInfo>, AppError> {
    let user = UserRepo::get_by_id(&state.pool, claims.sub)
        .await
        .map_err(|_| AppError::not_found("User", &claims.sub.to_string()))?;

    Ok(Json(UserInfo {
        id: user.id,
        email: user.email,
    }))
}
