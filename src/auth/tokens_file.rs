use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;

use crate::config::tokens_path;

/// Non-secret access-token cache stored next to the config file. The refresh
/// token lives in the keyring, never here.
#[derive(Debug, Serialize, Deserialize)]
pub struct CachedToken {
    pub access_token: String,
    /// Epoch seconds after which the access token is stale.
    pub expires_at_epoch: i64,
}

pub fn save_cached_token(token: &CachedToken) -> Result<()> {
    let p = tokens_path()?;
    fs::write(&p, serde_json::to_string_pretty(token)?)?;
    Ok(())
}

pub fn load_cached_token() -> Result<Option<CachedToken>> {
    let p = tokens_path()?;
    if !p.exists() {
        return Ok(None);
    }
    let s = fs::read_to_string(&p)?;
    let t: CachedToken = serde_json::from_str(&s)?;
    Ok(Some(t))
}
