//! Credentials for the Google Sheets reader.
//!
//! The spreadsheet reader receives a [`TokenProvider`] in its constructor.
//! [`GoogleTokenProvider`] is the production implementation: it keeps the
//! credential in an injected [`CredentialStore`], refreshes it when it has
//! expired and falls back to the installed-app browser flow.

mod oauth;
mod pkce;
mod store;

use std::fmt::Debug;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::prelude::*;

pub use self::oauth::{ClientSecrets, GoogleTokenProvider};
pub use self::pkce::LoginChallenge;
pub use self::store::{CredentialStore, FileCredentialStore, MemoryCredentialStore};

/// Read-only access to spreadsheets.
pub const SHEETS_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets.readonly";

/// A cached OAuth credential.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub scopes: Vec<String>,
}

impl Credential {
    /// True once the access token is within a minute of expiry.
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expiry) => expiry - Duration::seconds(60) < Utc::now(),
            None => false,
        }
    }

    pub fn is_valid(&self) -> bool {
        !self.access_token.is_empty() && !self.is_expired()
    }

    pub fn can_refresh(&self) -> bool {
        self.refresh_token.as_deref().is_some_and(|t| !t.is_empty())
    }
}

/// Supplies a bearer token for API calls.
#[async_trait]
pub trait TokenProvider: Debug + Send + Sync {
    async fn access_token(&self) -> Result<String>;
}

/// A provider that always returns the same token.
#[derive(Debug, Clone)]
pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn access_token(&self) -> Result<String> {
        Ok(self.token.clone())
    }
}
