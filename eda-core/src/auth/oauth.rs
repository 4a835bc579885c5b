//! Google OAuth 2.0 for installed applications.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::{
    Credential, CredentialStore, FileCredentialStore, LoginChallenge, TokenProvider,
    SHEETS_READONLY_SCOPE,
};
use crate::prelude::*;

const DEFAULT_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const LOGIN_TIMEOUT: StdDuration = StdDuration::from_secs(300);

/// The OAuth client registered in the Google Cloud console, as found in
/// `client_secrets.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientSecrets {
    pub client_id: String,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_auth_uri() -> String {
    DEFAULT_AUTH_URI.to_string()
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

#[derive(Deserialize)]
struct SecretsFile {
    installed: Option<ClientSecrets>,
    web: Option<ClientSecrets>,
}

impl ClientSecrets {
    /// Parses the `installed` or `web` section of a client secrets document.
    pub fn from_json(content: &str) -> Result<Self> {
        let file: SecretsFile = serde_json::from_str(content)
            .map_err(|e| EdaError::Authentication(format!("invalid client secrets: {e}")))?;
        file.installed.or(file.web).ok_or_else(|| {
            EdaError::Authentication(
                "client secrets have neither an 'installed' nor a 'web' section".to_string(),
            )
        })
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            EdaError::Authentication(format!(
                "cannot read client secrets at {}: {e} (run `eda auth setup <file>`)",
                path.display()
            ))
        })?;
        Self::from_json(&content)
    }

    /// The consent page URL for the loopback redirect.
    pub fn authorization_url(&self, redirect_uri: &str, login: &LoginChallenge) -> Result<Url> {
        let challenge = login.challenge();
        Url::parse_with_params(
            &self.auth_uri,
            &[
                ("response_type", "code"),
                ("client_id", self.client_id.as_str()),
                ("redirect_uri", redirect_uri),
                ("scope", SHEETS_READONLY_SCOPE),
                ("access_type", "offline"),
                ("prompt", "consent"),
                ("state", login.state()),
                ("code_challenge", challenge.as_str()),
                ("code_challenge_method", login.method()),
            ],
        )
        .map_err(|e| EdaError::Configuration(format!("invalid auth_uri '{}': {e}", self.auth_uri)))
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    scope: Option<String>,
}

impl TokenResponse {
    fn into_credential(self, previous_refresh: Option<String>) -> Credential {
        Credential {
            access_token: self.access_token,
            refresh_token: self.refresh_token.or(previous_refresh),
            expires_at: self.expires_in.map(|secs| Utc::now() + Duration::seconds(secs)),
            scopes: self
                .scope
                .map(|s| s.split_whitespace().map(str::to_string).collect())
                .unwrap_or_else(|| vec![SHEETS_READONLY_SCOPE.to_string()]),
        }
    }
}

/// Returns a valid Google access token: the cached one, a refreshed one, or
/// one obtained through the browser consent flow.
#[derive(Debug, Clone)]
pub struct GoogleTokenProvider {
    store: Arc<dyn CredentialStore>,
    secrets_path: PathBuf,
    http: reqwest::Client,
    interactive: bool,
}

impl GoogleTokenProvider {
    /// A provider backed by `<config_dir>/token.json` and
    /// `<config_dir>/client_secrets.json`.
    pub fn new(config: &EdaConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| EdaError::Configuration(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            store: Arc::new(FileCredentialStore::new(config.token_path())),
            secrets_path: config.client_secrets_path(),
            http,
            interactive: true,
        })
    }

    /// Replaces the credential store.
    pub fn with_store(mut self, store: Arc<dyn CredentialStore>) -> Self {
        self.store = store;
        self
    }

    /// Sets the client secrets location.
    pub fn with_secrets_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.secrets_path = path.into();
        self
    }

    /// Allows or forbids the browser flow when no usable credential exists.
    pub fn interactive(mut self, enabled: bool) -> Self {
        self.interactive = enabled;
        self
    }

    /// The cached credential, if any.
    pub fn status(&self) -> Result<Option<Credential>> {
        self.store.load()
    }

    /// Runs the browser flow unconditionally and caches the result.
    pub async fn login(&self) -> Result<Credential> {
        let credential = self.authorize_interactively().await?;
        self.store.save(&credential)?;
        Ok(credential)
    }

    /// Exchanges the refresh token for a new access token and caches it.
    #[instrument(skip_all)]
    pub async fn refresh(&self, credential: &Credential) -> Result<Credential> {
        let refresh_token = credential
            .refresh_token
            .clone()
            .ok_or_else(|| EdaError::Authentication("credential has no refresh token".into()))?;
        let secrets = ClientSecrets::from_file(&self.secrets_path)?;

        let mut params = vec![
            ("grant_type", "refresh_token".to_string()),
            ("refresh_token", refresh_token.clone()),
            ("client_id", secrets.client_id.clone()),
        ];
        if let Some(secret) = &secrets.client_secret {
            params.push(("client_secret", secret.clone()));
        }

        let response = self.post_token(&secrets.token_uri, &params).await?;
        let refreshed = response.into_credential(Some(refresh_token));
        self.store.save(&refreshed)?;
        info!("Refreshed Google credential");
        Ok(refreshed)
    }

    async fn post_token(&self, token_uri: &str, params: &[(&str, String)]) -> Result<TokenResponse> {
        let response = self
            .http
            .post(token_uri)
            .form(params)
            .send()
            .await
            .map_err(|e| EdaError::Authentication(format!("token request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(EdaError::Authentication(format!(
                "token endpoint returned {status}: {}",
                crate::logging::truncate_field(&body, 200)
            )));
        }

        response
            .json()
            .await
            .map_err(|e| EdaError::Authentication(format!("invalid token response: {e}")))
    }

    async fn authorize_interactively(&self) -> Result<Credential> {
        let secrets = ClientSecrets::from_file(&self.secrets_path)?;

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let port = listener.local_addr()?.port();
        let redirect_uri = format!("http://127.0.0.1:{port}/");
        let login = LoginChallenge::new();
        let url = secrets.authorization_url(&redirect_uri, &login)?;

        eprintln!("Please visit this URL to authorize this application: {url}");
        if let Err(e) = crate::viz::launch(url.as_str()) {
            warn!(error = %e, "Could not open a browser");
        }

        let code = tokio::time::timeout(LOGIN_TIMEOUT, wait_for_code(&listener, login.state()))
            .await
            .map_err(|_| EdaError::Authentication("timed out waiting for authorization".into()))??;
        debug!("Received authorization code");

        let params = code_exchange_params(&secrets, code, redirect_uri, &login);
        let response = self.post_token(&secrets.token_uri, &params).await?;
        Ok(response.into_credential(None))
    }
}

/// Form fields for trading the authorization code, bound to this login by
/// its PKCE verifier.
fn code_exchange_params(
    secrets: &ClientSecrets,
    code: String,
    redirect_uri: String,
    login: &LoginChallenge,
) -> Vec<(&'static str, String)> {
    let mut params = vec![
        ("grant_type", "authorization_code".to_string()),
        ("code", code),
        ("code_verifier", login.verifier().to_string()),
        ("client_id", secrets.client_id.clone()),
        ("redirect_uri", redirect_uri),
    ];
    if let Some(secret) = &secrets.client_secret {
        params.push(("client_secret", secret.clone()));
    }
    params
}

#[async_trait]
impl TokenProvider for GoogleTokenProvider {
    async fn access_token(&self) -> Result<String> {
        let cached = self.store.load().unwrap_or_else(|e| {
            warn!(error = %e, "Ignoring unreadable cached credential");
            None
        });

        if let Some(credential) = cached {
            if credential.is_valid() {
                return Ok(credential.access_token);
            }
            if credential.can_refresh() {
                return self.refresh(&credential).await.map(|c| c.access_token);
            }
        }

        if !self.interactive {
            return Err(EdaError::Authentication(
                "no valid cached credential; run `eda auth login`".to_string(),
            ));
        }
        self.login().await.map(|c| c.access_token)
    }
}

/// Accepts the redirect on the loopback listener and pulls out the code.
async fn wait_for_code(listener: &TcpListener, state: &str) -> Result<String> {
    let (mut stream, _) = listener.accept().await?;

    let mut request = Vec::new();
    let mut buffer = [0u8; 1024];
    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
        let read = stream.read(&mut buffer).await?;
        if read == 0 {
            break;
        }
        request.extend_from_slice(&buffer[..read]);
    }

    let outcome = parse_redirect(&String::from_utf8_lossy(&request), state);
    let body = match &outcome {
        Ok(_) => "The authentication flow has completed. You may close this window.",
        Err(_) => "Authentication failed. You may close this window and try again.",
    };
    let response = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: text/plain; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    stream.write_all(response.as_bytes()).await?;
    stream.flush().await?;
    outcome
}

/// Extracts `code` from the request line `GET /?code=...&state=... HTTP/1.1`.
fn parse_redirect(request: &str, expected_state: &str) -> Result<String> {
    let target = request
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .ok_or_else(|| EdaError::Authentication("malformed redirect request".into()))?;
    let url = Url::parse(&format!("http://127.0.0.1{target}"))
        .map_err(|e| EdaError::Authentication(format!("malformed redirect: {e}")))?;

    let mut code = None;
    let mut state = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => {
                return Err(EdaError::Authentication(format!("authorization denied: {value}")))
            }
            _ => {}
        }
    }

    if state.as_deref() != Some(expected_state) {
        return Err(EdaError::Authentication("state mismatch in redirect".into()));
    }
    code.ok_or_else(|| EdaError::Authentication("redirect carried no code".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::MemoryCredentialStore;
    use tempfile::TempDir;

    const SECRETS: &str = r#"{"installed":{"client_id":"cid","client_secret":"csecret","redirect_uris":["http://localhost"]}}"#;

    #[test]
    fn test_client_secrets_shapes() {
        let installed = ClientSecrets::from_json(SECRETS).unwrap();
        assert_eq!(installed.client_id, "cid");
        assert_eq!(installed.token_uri, DEFAULT_TOKEN_URI);

        let web = ClientSecrets::from_json(r#"{"web":{"client_id":"w"}}"#).unwrap();
        assert_eq!(web.client_id, "w");
        assert!(web.client_secret.is_none());

        assert!(ClientSecrets::from_json(r#"{"other":{}}"#).is_err());
    }

    #[test]
    fn test_authorization_url() {
        let secrets = ClientSecrets::from_json(SECRETS).unwrap();
        let login = LoginChallenge::new();
        let url = secrets
            .authorization_url("http://127.0.0.1:5000/", &login)
            .unwrap();
        let query: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(query.contains(&("client_id".into(), "cid".into())));
        assert!(query.contains(&("state".into(), login.state().into())));
        assert!(query.contains(&("scope".into(), SHEETS_READONLY_SCOPE.into())));
        assert!(query.contains(&("code_challenge".into(), login.challenge())));
        assert!(query.contains(&("code_challenge_method".into(), "S256".into())));
        assert!(!query.iter().any(|(key, _)| key == "code_verifier"));
    }

    #[test]
    fn test_code_exchange_carries_the_verifier() {
        let secrets = ClientSecrets::from_json(SECRETS).unwrap();
        let login = LoginChallenge::new();
        let params = code_exchange_params(
            &secrets,
            "4/abc".into(),
            "http://127.0.0.1:5000/".into(),
            &login,
        );

        assert!(params.contains(&("code", "4/abc".to_string())));
        assert!(params.contains(&("code_verifier", login.verifier().to_string())));
        assert!(params.contains(&("client_secret", "csecret".to_string())));
    }

    #[test]
    fn test_parse_redirect() {
        let ok = parse_redirect("GET /?state=s1&code=4%2Fabc HTTP/1.1\r\nHost: x\r\n\r\n", "s1");
        assert_eq!(ok.unwrap(), "4/abc");

        let wrong_state = parse_redirect("GET /?state=other&code=c HTTP/1.1\r\n", "s1");
        assert!(matches!(wrong_state, Err(EdaError::Authentication(_))));

        let denied = parse_redirect("GET /?error=access_denied&state=s1 HTTP/1.1\r\n", "s1");
        assert!(denied.unwrap_err().to_string().contains("access_denied"));
    }

    fn provider(store: Arc<dyn CredentialStore>, secrets_path: PathBuf) -> GoogleTokenProvider {
        GoogleTokenProvider::new(&EdaConfig::default())
            .unwrap()
            .with_store(store)
            .with_secrets_path(secrets_path)
            .interactive(false)
    }

    #[tokio::test]
    async fn test_valid_cached_token_is_reused() {
        let store = Arc::new(MemoryCredentialStore::with_credential(Credential {
            access_token: "cached".into(),
            refresh_token: None,
            expires_at: Some(Utc::now() + Duration::hours(1)),
            scopes: vec![],
        }));
        let provider = provider(store, PathBuf::from("/nonexistent/client_secrets.json"));
        assert_eq!(provider.access_token().await.unwrap(), "cached");
    }

    #[tokio::test]
    async fn test_expired_token_is_refreshed() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/token")
            .match_body(mockito::Matcher::UrlEncoded(
                "grant_type".into(),
                "refresh_token".into(),
            ))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token":"fresh","expires_in":3600,"token_type":"Bearer"}"#)
            .create_async()
            .await;

        let dir = TempDir::new().unwrap();
        let secrets_path = dir.path().join("client_secrets.json");
        std::fs::write(
            &secrets_path,
            format!(
                r#"{{"installed":{{"client_id":"cid","client_secret":"s","token_uri":"{}/token"}}}}"#,
                server.url()
            ),
        )
        .unwrap();

        let store = Arc::new(MemoryCredentialStore::with_credential(Credential {
            access_token: "stale".into(),
            refresh_token: Some("rt".into()),
            expires_at: Some(Utc::now() - Duration::hours(1)),
            scopes: vec![],
        }));
        let provider = provider(store.clone(), secrets_path);

        assert_eq!(provider.access_token().await.unwrap(), "fresh");
        let saved = store.load().unwrap().unwrap();
        assert_eq!(saved.access_token, "fresh");
        assert_eq!(saved.refresh_token.as_deref(), Some("rt"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_failed_refresh_is_an_authentication_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/token")
            .with_status(400)
            .with_body(r#"{"error":"invalid_grant"}"#)
            .create_async()
            .await;

        let dir = TempDir::new().unwrap();
        let secrets_path = dir.path().join("client_secrets.json");
        std::fs::write(
            &secrets_path,
            format!(r#"{{"installed":{{"client_id":"cid","token_uri":"{}/token"}}}}"#, server.url()),
        )
        .unwrap();

        let store = Arc::new(MemoryCredentialStore::with_credential(Credential {
            access_token: "stale".into(),
            refresh_token: Some("rt".into()),
            expires_at: Some(Utc::now() - Duration::hours(1)),
            scopes: vec![],
        }));
        let err = provider(store, secrets_path).access_token().await.unwrap_err();
        assert!(matches!(err, EdaError::Authentication(_)));
    }

    #[tokio::test]
    async fn test_non_interactive_without_credential() {
        let store = Arc::new(MemoryCredentialStore::new());
        let err = provider(store, PathBuf::from("/nonexistent"))
            .access_token()
            .await
            .unwrap_err();
        assert!(err.to_string().contains("eda auth login"));
    }
}
