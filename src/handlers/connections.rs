use axum::{extract::State, Extension, Json};
use tracing::error;

use crate::auth::Claims;
use crate::crypto;
use crate::db::ConnectionRepo;
use crate::errors::AppError;
use crate::handlers::AppState;
use crate::jobs;
use crate::models::{ConnectionResponse, CreateConnectionRequest};

/// Register a service-principal connection and its subscriptions, then kick
/// off a backfill so the dashboard has data without waiting for the next
/// scheduled run.
pub async fn create(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateConnectionRequest>,
) -> Result<Json<ConnectionResponse>, AppError> {
    if req.tenant_id.trim().is_empty()
        || req.client_id.trim().is_empty()
        || req.client_secret.trim().is_empty()
    {
        return Err(AppError::bad_request(
            "tenant_id, client_id and client_secret are required",
        ));
    }
    if req.subscription_ids.is_empty() {
        return Err(AppError::bad_request("At least one subscription id is required"));
    }

    let encrypted_secret = crypto::encrypt_secret(&req.client_secret, &state.encryption_key)
        .map_err(|e| {
            error!("Secret encryption failed: {e}");
            AppError::internal("Failed to protect client secret")
        })?;

    let connection = ConnectionRepo::create_with_subscriptions(
        &state.pool,
        claims.sub,
        req.tenant_id.trim(),
        req.client_id.trim(),
        &encrypted_secret,
        &req.subscription_ids,
    )
    .await?;

    // Connect-triggered backfill; the scheduled run and this one are not
    // expected to race for the same user.
    let pool = state.pool.clone();
    let worker = state.worker.clone();
    let encryption_key = state.encryption_key.clone();
    let user_id = claims.sub;
    tokio::spawn(async move {
        if let Err(e) = jobs::run_backfill(&pool, user_id, &worker, &encryption_key).await {
            error!(user_id = %user_id, "Backfill after connect failed: {e:#}");
        }
    });

    Ok(Json(ConnectionResponse {
        id: connection.id,
        tenant_id: connection.tenant_id,
        client_id: connection.client_id,
        subscription_ids: req.subscription_ids,
        created_at_utc: connection.created_at_utc,
    }))
}

pub async fn list(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<ConnectionResponse>>, AppError> {
    let connections = ConnectionRepo::list_for_user(&state.pool, claims.sub).await?;

    let mut responses = Vec::with_capacity(connections.len());
    for connection in connections {
        let subscriptions =
            ConnectionRepo::subscriptions_for_connection(&state.pool, connection.id).await?;
        responses.push(ConnectionResponse {
            id: connection.id,
            tenant_id: connection.tenant_id,
            client_id: connection.client_id,
            subscription_ids: subscriptions
                .into_iter()
                .map(|s| s.azure_subscription_id)
                .collect(),
            created_at_utc: connection.created_at_utc,
        });
    }
    Ok(Json(responses))
}
