/// Azure management-plane adapters. Each function returns structured rows;
/// failures surface as `anyhow` errors the worker logs and skips per target.
pub mod costs;
pub mod inventory;

use anyhow::{bail, Context};
use serde::Deserialize;

const TOKEN_SCOPE: &str = "https://management.azure.com/.default";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Client-credentials token for the Azure management plane.
pub async fn acquire_access_token(
    http: &reqwest::Client,
    tenant_id: &str,
    client_id: &str,
    client_secret: &str,
) -> anyhow::Result<String> {
    let endpoint =
        format!("https://login.microsoftonline.com/{tenant_id}/oauth2/v2.0/token");
    let form = [
        ("grant_type", "client_credentials"),
        ("client_id", client_id),
        ("client_secret", client_secret),
        ("scope", TOKEN_SCOPE),
    ];

    let response = http
        .post(&endpoint)
        .form(&form)
        .send()
        .await
        .context("Azure token request failed to send")?;

    if !response.status().is_success() {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        bail!(
            "Azure token request failed ({status}) for tenant {tenant_id}. {}",
            truncate(&body, 240)
        );
    }

    let token: TokenResponse = response
        .json()
        .await
        .context("Azure token response was not valid JSON")?;
    if token.access_token.trim().is_empty() {
        bail!("Azure token request succeeded but returned no access token.");
    }
    Ok(token.access_token)
}

pub(crate) fn truncate(value: &str, max_length: usize) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return "No details returned.".to_string();
    }
    match trimmed.char_indices().nth(max_length) {
        Some((idx, _)) => format!("{}...", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}
