use serde::{Deserialize, Serialize};

use crate::{
    api::{ApiClient, Outcome},
    config,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasswordResetReq {
    pub email: String,
}

/// Ask the backend to email a reset link. Sent without the stored token.
pub fn request_reset(client: &ApiClient, req: &PasswordResetReq) -> Outcome {
    let outcome = client.post(config::FORGET_PASSWORD_URL, req);
    match outcome.data() {
        Some(data) if outcome.ok() => {
            tracing::info!("Password reset email requested: {data}");
        }
        Some(data) => tracing::warn!("Password reset was refused: {data}"),
        None => tracing::warn!(
            "Password reset request failed: {}",
            outcome.message().unwrap_or_default()
        ),
    }
    outcome
}
