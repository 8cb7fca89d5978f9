use anyhow::{Result, anyhow};
use log::{info, warn};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::auth::tokens_file::{CachedToken, load_cached_token, save_cached_token};
use crate::auth::{oauth, token_store};
use crate::config::Config;

#[derive(Clone)]
pub struct TokenManager {
    pub client_id: String,
    pub client_secret: Option<String>,
    pub redirect_uri: String,
    pub user_email: String,
}

impl TokenManager {
    pub fn from_config(cfg: &Config) -> Result<Self> {
        let client_id = cfg.client_id.clone();
        let user_email = cfg
            .user_email
            .clone()
            .ok_or_else(|| anyhow!("user_email not set in config"))?;
        let redirect_uri = cfg
            .redirect_uri
            .clone()
            .unwrap_or_else(|| "http://127.0.0.1:8080/callback".to_string());

        let client_secret = token_store::load_client_secret(&client_id)?
            .or_else(|| std::env::var("OAUTH_CLIENT_SECRET").ok());

        Ok(Self {
            client_id,
            client_secret,
            redirect_uri,
            user_email,
        })
    }

    /// Returns a valid access token: cached if fresh, refreshed if a refresh
    /// token exists, interactive PKCE otherwise.
    pub fn get_access_token(&self) -> Result<String> {
        let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs() as i64;

        if let Some(cached) = load_cached_token()?
            && now < cached.expires_at_epoch
        {
            return Ok(cached.access_token);
        }

        if let Some(rt) = token_store::load_refresh_token(&self.user_email)? {
            info!("access token stale, refreshing");
            let t = oauth::refresh_access_token(
                &self.client_id,
                self.client_secret.as_deref(),
                &rt,
            )?;
            return self.persist(now, t);
        }

        info!("no stored credentials, starting interactive auth");
        let t = oauth::perform_pkce_flow(
            &self.client_id,
            self.client_secret.as_deref(),
            &self.redirect_uri,
        )?;
        self.persist(now, t)
    }

    fn persist(&self, now: i64, t: oauth::TokenSet) -> Result<String> {
        if let Some(rt) = &t.refresh_token
            && let Err(e) = token_store::save_refresh_token(&self.user_email, rt)
        {
            warn!("could not store refresh token in keyring: {e}");
        }

        let expires_at = t.expires_in.map(|s| now + s as i64).unwrap_or(now + 3500);
        save_cached_token(&CachedToken {
            access_token: t.access_token.clone(),
            expires_at_epoch: expires_at,
        })?;
        Ok(t.access_token)
    }
}
