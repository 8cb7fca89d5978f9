use anyhow::{Result, anyhow};
use keyring::{Entry, Error as KeyringError};

const SERVICE: &str = "mail_digest";

fn entry(account: &str) -> Result<Entry> {
    Entry::new(SERVICE, account).map_err(|e| anyhow!(e.to_string()))
}

fn load(account: &str) -> Result<Option<String>> {
    match entry(account)?.get_password() {
        Ok(v) => Ok(Some(v)),
        Err(KeyringError::NoEntry) => Ok(None),
        Err(e) => Err(anyhow!(e.to_string())),
    }
}

fn save(account: &str, secret: &str) -> Result<()> {
    entry(account)?
        .set_password(secret)
        .map_err(|e| anyhow!(e.to_string()))
}

/// Refresh token, keyed by the user's email address.
pub fn save_refresh_token(user_email: &str, refresh_token: &str) -> Result<()> {
    save(user_email, refresh_token)
}

pub fn load_refresh_token(user_email: &str) -> Result<Option<String>> {
    load(user_email)
}

/// OAuth client secret, keyed by client id.
pub fn save_client_secret(client_id: &str, client_secret: &str) -> Result<()> {
    save(client_id, client_secret)
}

pub fn load_client_secret(client_id: &str) -> Result<Option<String>> {
    load(client_id)
}
