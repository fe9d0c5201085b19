//! mail.tm HTTP client
//!
//! Creates HTTP clients for the disposable mailbox API and wraps its
//! account, token and message endpoints.

use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{Account, Domain, HydraCollection, Identity, Mailbox, Message, MessageSummary, TokenResponse};

/// Mail API configuration
#[derive(Debug, Clone)]
pub struct MailConfig {
    /// API base URL (default: https://api.mail.tm)
    pub api_base: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Maximum retries per request on transient failures
    pub max_retries: u32,
    /// Delay before the first retry; later retries wait proportionally longer
    pub retry_backoff_ms: u64,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.mail.tm".to_string(),
            timeout_secs: 30,
            max_retries: 3,
            retry_backoff_ms: 500,
        }
    }
}

impl MailConfig {
    pub fn with_api_base(mut self, api_base: &str) -> Self {
        self.api_base = api_base.trim_end_matches('/').to_string();
        self
    }
}

/// Errors from the mail API
#[derive(Debug, Error)]
pub enum MailError {
    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(String),

    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("{url} returned status {status}")]
    Status { status: u16, url: String },

    #[error("No active mail domains available")]
    NoDomains,

    #[error("Failed to decode response: {0}")]
    Decode(String),
}

/// Length of generated local parts and passwords
const CREDENTIAL_LEN: usize = 10;

const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

fn random_base36(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect()
}

/// Random mailbox name, lowercase alphanumerics
pub fn random_local_part() -> String {
    random_base36(CREDENTIAL_LEN)
}

/// Random account password, lowercase alphanumerics
pub fn random_password() -> String {
    random_base36(CREDENTIAL_LEN)
}

/// Create an HTTP client for the mail API
pub fn create_http_client(config: &MailConfig) -> Result<Client, MailError> {
    Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .user_agent(concat!("verifyme/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| MailError::ClientBuild(e.to_string()))
}

fn is_transient_status(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}

/// Client for the mail.tm API
#[derive(Debug, Clone)]
pub struct MailTmClient {
    client: Client,
    config: MailConfig,
}

impl MailTmClient {
    pub fn new(config: MailConfig) -> Result<Self, MailError> {
        let client = create_http_client(&config)?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &MailConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_base, path)
    }

    /// Send a request, retrying timeouts, connect errors, 429 and 5xx
    async fn send_with_retry<F>(&self, build: F) -> Result<Response, MailError>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            let retry_allowed = attempt <= self.config.max_retries;

            match build().send().await {
                Ok(response) if response.status().is_success() => return Ok(response),
                Ok(response) if is_transient_status(response.status()) && retry_allowed => {
                    warn!(
                        "{} returned status {} (attempt {})",
                        response.url(),
                        response.status(),
                        attempt
                    );
                }
                Ok(response) => {
                    return Err(MailError::Status {
                        status: response.status().as_u16(),
                        url: response.url().to_string(),
                    });
                }
                Err(e) if (e.is_timeout() || e.is_connect()) && retry_allowed => {
                    warn!("Request failed (attempt {}): {}", attempt, e);
                }
                Err(e) => return Err(e.into()),
            }

            let backoff = self.config.retry_backoff_ms.saturating_mul(u64::from(attempt));
            tokio::time::sleep(Duration::from_millis(backoff)).await;
        }
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, MailError> {
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| MailError::Decode(e.to_string()))
    }

    /// Available domains
    pub async fn domains(&self) -> Result<Vec<Domain>, MailError> {
        let url = self.url("/domains");
        debug!("Fetching domains: {}", url);

        let response = self.send_with_retry(|| self.client.get(&url)).await?;
        let collection: HydraCollection<Domain> = Self::decode(response).await?;
        Ok(collection.members)
    }

    /// Register a new account
    pub async fn create_account(&self, address: &str, password: &str) -> Result<Account, MailError> {
        let url = self.url("/accounts");
        let body = json!({ "address": address, "password": password });

        let response = self
            .send_with_retry(|| self.client.post(&url).json(&body))
            .await?;
        Self::decode(response).await
    }

    /// Exchange credentials for a bearer token
    pub async fn token(&self, address: &str, password: &str) -> Result<TokenResponse, MailError> {
        let url = self.url("/token");
        let body = json!({ "address": address, "password": password });

        let response = self
            .send_with_retry(|| self.client.post(&url).json(&body))
            .await?;
        Self::decode(response).await
    }

    /// Create a fresh inbox on the first active domain
    pub async fn provision(&self) -> Result<Identity, MailError> {
        let domains = self.domains().await?;
        let domain = domains
            .iter()
            .find(|d| d.active())
            .ok_or(MailError::NoDomains)?;

        let address = format!("{}@{}", random_local_part(), domain.domain);
        let password = random_password();

        let account = self.create_account(&address, &password).await?;
        let token = self.token(&address, &password).await?;

        info!("Provisioned inbox {}", account.address);

        Ok(Identity {
            id: account.id,
            address: account.address,
            password,
            token: token.token,
            created_at: Utc::now(),
        })
    }

    /// Messages in an inbox, newest first
    pub async fn list_messages(&self, token: &str) -> Result<Vec<MessageSummary>, MailError> {
        let url = self.url("/messages");

        let response = self
            .send_with_retry(|| self.client.get(&url).bearer_auth(token))
            .await?;
        let collection: HydraCollection<MessageSummary> = Self::decode(response).await?;

        debug!("Inbox lists {} messages", collection.members.len());
        Ok(collection.members)
    }

    /// One message with its bodies
    pub async fn fetch_message(&self, token: &str, id: &str) -> Result<Message, MailError> {
        let url = self.url(&format!("/messages/{}", urlencoding::encode(id)));
        debug!("Fetching message {}", id);

        let response = self
            .send_with_retry(|| self.client.get(&url).bearer_auth(token))
            .await?;
        Self::decode(response).await
    }

    /// Check the API is reachable
    pub async fn check_connection(&self) -> Result<bool, MailError> {
        let result = self.client.get(self.url("/domains")).send().await;

        match result {
            Ok(resp) => Ok(resp.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    /// Bind this client to an identity's inbox
    pub fn inbox(self, identity: &Identity) -> MailTmInbox {
        MailTmInbox {
            client: self,
            address: identity.address.clone(),
            token: identity.token.clone(),
        }
    }
}

/// A mail.tm inbox reachable with a bearer token
#[derive(Debug, Clone)]
pub struct MailTmInbox {
    client: MailTmClient,
    address: String,
    token: String,
}

#[async_trait]
impl Mailbox for MailTmInbox {
    async fn list_messages(&self) -> Result<Vec<MessageSummary>, MailError> {
        self.client.list_messages(&self.token).await
    }

    async fn fetch_message(&self, id: &str) -> Result<Message, MailError> {
        self.client.fetch_message(&self.token, id).await
    }

    fn address(&self) -> &str {
        &self.address
    }
}
