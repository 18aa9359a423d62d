use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    api::{ApiClient, Outcome},
    config::{self, GuestLogin},
    session::{AuthToken, CredentialRecord, Session},
};

#[derive(Serialize, Deserialize)]
pub struct LoginReq {
    pub username: String,
    pub password: String,
}

impl From<GuestLogin> for LoginReq {
    fn from(guest: GuestLogin) -> Self {
        Self {
            username: guest.username.to_owned(),
            password: guest.password.to_owned(),
        }
    }
}

/// Body returned by both login and registration.
#[derive(Serialize, Deserialize)]
pub struct LoginRes {
    pub token: String,
    pub username: String,
    /// The backend sends a number; older deployments sent a string.
    pub user_id: Value,
}

impl LoginRes {
    fn into_record(self) -> Option<CredentialRecord> {
        let user_id = match self.user_id {
            Value::String(s) => s,
            Value::Number(n) => n.to_string(),
            _ => return None,
        };
        Some(CredentialRecord {
            token: AuthToken::new(self.token),
            username: self.username,
            user_id,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    Customer,
    Business,
}

impl AccountType {
    pub fn guest(self) -> GuestLogin {
        match self {
            Self::Customer => config::GUEST_CUSTOMER,
            Self::Business => config::GUEST_BUSINESS,
        }
    }
}

#[derive(Serialize, Deserialize)]
pub struct RegistrationReq {
    pub username: String,
    pub email: String,
    pub password: String,
    pub repeated_password: String,
    #[serde(rename = "type")]
    pub account_type: AccountType,
}

/// Log in and, on success, store the returned credentials in the session.
pub fn login(client: &mut ApiClient, req: &LoginReq) -> anyhow::Result<Outcome> {
    tracing::info!("Logging in as {}...", req.username);
    let outcome = client.post(config::LOGIN_URL, req);
    store_credentials(client.session_mut(), &outcome)?;
    Ok(outcome)
}

/// Log in with one of the shared demo accounts.
pub fn guest_login(client: &mut ApiClient, account_type: AccountType) -> anyhow::Result<Outcome> {
    login(client, &account_type.guest().into())
}

/// Register a new account; the backend logs it in straight away.
pub fn register(client: &mut ApiClient, req: &RegistrationReq) -> anyhow::Result<Outcome> {
    tracing::info!("Registering {}...", req.username);
    let outcome = client.post(config::REGISTER_URL, req);
    store_credentials(client.session_mut(), &outcome)?;
    Ok(outcome)
}

pub fn logout(session: &mut Session) -> anyhow::Result<()> {
    tracing::info!("Logging out");
    session.remove_credentials()
}

fn store_credentials(session: &mut Session, outcome: &Outcome) -> anyhow::Result<()> {
    if !outcome.ok() {
        tracing::warn!("Authentication was not accepted: {}", outcome.to_json());
        return Ok(());
    }
    let record = outcome
        .data()
        .cloned()
        .and_then(|data| serde_json::from_value::<LoginRes>(data).ok())
        .and_then(LoginRes::into_record);
    match record {
        Some(record) => {
            session.set_credentials(&record)?;
            tracing::debug!("Token acquired: {:?}", record.token);
        }
        None => tracing::warn!("Authentication response did not carry credentials"),
    }
    Ok(())
}
