use anyhow::{Result, anyhow};
use oauth2::TokenResponse;
use oauth2::basic::BasicClient;
use oauth2::reqwest::http_client;
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, PkceCodeChallenge, RedirectUrl,
    RefreshToken, Scope, TokenUrl,
};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::{Duration, Instant};
use tiny_http::{Response, Server};
use url::Url;

/// Read-only is all the digest needs.
const GMAIL_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/gmail.readonly";

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Tokens returned by an oauth exchange (in-memory; persistence is the
/// token manager's job)
pub struct TokenSet {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: Option<u64>,
}

fn google_client(client_id: &str, client_secret: Option<&str>) -> Result<BasicClient> {
    Ok(BasicClient::new(
        ClientId::new(client_id.to_string()),
        client_secret.map(|s| ClientSecret::new(s.to_string())),
        AuthUrl::new(GOOGLE_AUTH_URL.to_string())?,
        Some(TokenUrl::new(GOOGLE_TOKEN_URL.to_string())?),
    ))
}

fn token_set(token: impl TokenResponse<oauth2::basic::BasicTokenType>) -> TokenSet {
    TokenSet {
        access_token: token.access_token().secret().to_string(),
        refresh_token: token.refresh_token().map(|r| r.secret().to_string()),
        expires_in: token.expires_in().map(|d| d.as_secs()),
    }
}

/// Exchange a refresh token for a new access token
pub fn refresh_access_token(
    client_id: &str,
    client_secret: Option<&str>,
    refresh_token: &str,
) -> Result<TokenSet> {
    let client = google_client(client_id, client_secret)?;
    let token = client
        .exchange_refresh_token(&RefreshToken::new(refresh_token.to_string()))
        .request(http_client)?;
    Ok(token_set(token))
}

/// Authorization Code + PKCE flow for the Gmail read-only scope. Opens the
/// system browser and captures the code on a loopback listener.
pub fn perform_pkce_flow(
    client_id: &str,
    client_secret: Option<&str>,
    redirect_uri: &str,
) -> Result<TokenSet> {
    let bind_addr = loopback_addr(redirect_uri)?;

    // listen before handing out the auth URL so the redirect can't race us
    let server = Server::http(bind_addr)
        .map_err(|e| anyhow!("Failed to bind OAuth callback server on {bind_addr}: {e:?}"))?;

    let client = google_client(client_id, client_secret)?
        .set_redirect_uri(RedirectUrl::new(redirect_uri.to_string())?);

    let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();

    let (auth_url, _csrf_token) = client
        .authorize_url(oauth2::CsrfToken::new_random)
        .add_scope(Scope::new(GMAIL_READONLY_SCOPE.to_string()))
        .set_pkce_challenge(pkce_challenge)
        .url();

    println!("Open this URL in your browser:\n{auth_url}");
    // best-effort: don't fail if browser can't be opened
    if let Err(e) = open::that(auth_url.as_str()) {
        eprintln!("Warning: could not open browser automatically: {e}");
    }

    let code = wait_for_code(&server, bind_addr)?;

    let token = match client
        .exchange_code(AuthorizationCode::new(code))
        .set_pkce_verifier(pkce_verifier)
        .request(http_client)
    {
        Ok(tok) => tok,
        Err(err) => {
            eprintln!("Token exchange failed: {err:#?}");
            return Err(anyhow!("Token exchange failed: see stderr for details"));
        }
    };

    Ok(token_set(token))
}

/// Resolve the redirect_uri to a loopback socket address we can bind.
fn loopback_addr(redirect_uri: &str) -> Result<SocketAddr> {
    let redirect = Url::parse(redirect_uri)
        .map_err(|e| anyhow!("Invalid redirect_uri '{redirect_uri}': {e}"))?;

    let host = redirect
        .host_str()
        .ok_or_else(|| anyhow!("redirect_uri missing host: {redirect_uri}"))?;

    let port = redirect
        .port_or_known_default()
        .ok_or_else(|| anyhow!("redirect_uri missing/unknown port: {redirect_uri}"))?;

    let ip: IpAddr = match host {
        "localhost" | "127.0.0.1" => IpAddr::V4(Ipv4Addr::LOCALHOST),
        other => other.parse::<IpAddr>().map_err(|_| {
            anyhow!("redirect_uri host must be localhost/127.0.0.1 or an IP: {other}")
        })?,
    };

    Ok(SocketAddr::new(ip, port))
}

/// Block until the browser redirect delivers a `code` query parameter, or
/// two minutes pass.
fn wait_for_code(server: &Server, bind_addr: SocketAddr) -> Result<String> {
    let wait_until = Instant::now() + Duration::from_secs(120);

    while Instant::now() < wait_until {
        let Ok(Some(request)) = server.recv_timeout(Duration::from_millis(500)) else {
            continue;
        };

        // request.url() is a path+query like "/callback?code=...&state=..."
        let full = format!("http://{bind_addr}{}", request.url());
        let Ok(parsed) = Url::parse(&full) else {
            let _ = request.respond(Response::from_string("Bad redirect"));
            continue;
        };

        let code = parsed
            .query_pairs()
            .find(|(k, _)| k == "code")
            .map(|(_, v)| v.into_owned());

        match code {
            Some(code) => {
                let _ = request.respond(Response::from_string(
                    "Authorization received. You can close this tab.",
                ));
                return Ok(code);
            }
            None => {
                let _ = request.respond(Response::from_string(
                    "No code found in redirect. You can close this tab.",
                ));
            }
        }
    }

    Err(anyhow!("No code received within timeout"))
}
