use std::fmt;
use std::time::Duration;

use reqwest::header::{CONTENT_RANGE, CONTENT_TYPE};
use reqwest::{Client, Method, Response};

use crate::error::TransferError;
use crate::range::TransferRange;

/// Largest payload the management API accepts in one request.
pub const DEFAULT_CHUNK_SIZE: u64 = 512 * 1024;

/// Upper bound for a configured chunk size.
pub const MAX_CHUNK_SIZE: u64 = 64 * 1024 * 1024;

/// Per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Knobs that stay fixed for the lifetime of one transfer.
#[derive(Debug, Clone)]
pub struct TransferSettings {
    pub chunk_size: u64,
    pub timeout: Duration,
    /// Appliances usually ship a self-signed management certificate.
    pub accept_invalid_certs: bool,
    /// Abort an upload on the first chunk the appliance rejects instead of
    /// logging it and carrying on.
    pub strict_upload: bool,
}

impl Default for TransferSettings {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            timeout: DEFAULT_TIMEOUT,
            accept_invalid_certs: true,
            strict_upload: false,
        }
    }
}

/// Basic-auth credentials sent with every chunk request.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// HTTP side of a transfer: one request per chunk, no session state.
#[derive(Debug, Clone)]
pub struct ApplianceClient {
    http: Client,
    base_url: String,
    credentials: Credentials,
    settings: TransferSettings,
}

impl ApplianceClient {
    /// Client for the management interface at `https://{host}`.
    pub fn new(
        host: &str,
        credentials: Credentials,
        settings: TransferSettings,
    ) -> Result<Self, TransferError> {
        Self::with_base_url(format!("https://{}", host), credentials, settings)
    }

    /// Client for an explicit scheme and authority, e.g. `http://127.0.0.1:8080`.
    pub fn with_base_url(
        base_url: impl Into<String>,
        credentials: Credentials,
        settings: TransferSettings,
    ) -> Result<Self, TransferError> {
        let http = Client::builder()
            .user_agent(concat!("bigip-xfer/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(settings.timeout)
            .timeout(settings.timeout)
            .danger_accept_invalid_certs(settings.accept_invalid_certs)
            .build()?;

        let base_url = base_url.into().trim_end_matches('/').to_string();

        Ok(Self {
            http,
            base_url,
            credentials,
            settings,
        })
    }

    pub fn settings(&self) -> &TransferSettings {
        &self.settings
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Full URL for `file_name` under an endpoint path from [`crate::endpoint::resolve`].
    pub fn url(&self, endpoint_path: &str, file_name: &str) -> String {
        format!("{}{}{}", self.base_url, endpoint_path, file_name)
    }

    /// Sends one chunk request for `range`. Timeouts map to
    /// [`TransferError::ConnectTimeout`]; the status is left to the caller.
    pub(crate) async fn send(
        &self,
        method: Method,
        url: &str,
        range: TransferRange,
        body: Option<Vec<u8>>,
    ) -> Result<Response, TransferError> {
        let mut request = self
            .http
            .request(method, url)
            .header(CONTENT_TYPE, "application/octet-stream")
            .header(CONTENT_RANGE, range.header_value())
            .basic_auth(&self.credentials.username, Some(&self.credentials.password));

        if let Some(body) = body {
            request = request.body(body);
        }

        request
            .send()
            .await
            .map_err(|e| TransferError::from_request(e, range))
    }
}
