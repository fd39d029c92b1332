//! Paced HTTP transport shared by every marketplace fetch
//!
//! Only one request is in flight per transport. The lock is held while the
//! request is sent, the body is read and the pacing delay elapses, so two
//! callers can never interleave and the upstream site never sees bursts.
//! Identity (cookies and user agent) only changes through [`SessionTransport::rotate_identity`].

use async_trait::async_trait;
use reqwest::cookie::Jar;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, ClientBuilder, Proxy};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use url::Url;

use crate::infrastructure::config::AppConfig;
use crate::infrastructure::fetch_error::{FetchError, FetchResult};

/// Browser fingerprint sent with every request
const FINGERPRINT_HEADERS: &[(&str, &str)] = &[
    ("cache-control", "max-age=0"),
    ("rtt", "150"),
    ("downlink", "10"),
    ("ect", "4g"),
    ("sec-ch-ua", r#""Google Chrome";v="89", "Chromium";v="89", ";Not A Brand";v="99""#),
    ("sec-ch-ua-mobile", "?0"),
    ("upgrade-insecure-requests", "1"),
    (
        "accept",
        "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8",
    ),
    ("sec-fetch-site", "none"),
    ("sec-fetch-mode", "navigate"),
    ("sec-fetch-user", "?1"),
    ("sec-fetch-dest", "document"),
    ("accept-language", "es-ES,es;q=0.9,en-US;q=0.8,en;q=0.7,eu;q=0.6,fr;q=0.5"),
];

const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/89.0.4389.90 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/89.0.4389.82 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 11_2_3) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/89.0.4389.90 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/89.0.4389.90 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:87.0) Gecko/20100101 Firefox/87.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:87.0) Gecko/20100101 Firefox/87.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 11_2_3) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/14.0.3 Safari/605.1.15",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/89.0.4389.90 Safari/537.36 Edg/89.0.774.57",
];

fn random_user_agent() -> &'static str {
    USER_AGENTS[fastrand::usize(..USER_AGENTS.len())]
}

/// Check a proxy URL and build the reqwest proxy for it
pub fn validate_proxy_url(raw: &str) -> FetchResult<Proxy> {
    let invalid = |reason: &str| FetchError::InvalidProxy {
        url: raw.to_string(),
        reason: reason.to_string(),
    };
    let url = Url::parse(raw).map_err(|e| invalid(&e.to_string()))?;
    match url.scheme() {
        "http" | "https" | "socks5" | "socks5h" => {}
        other => return Err(invalid(&format!("unsupported scheme {other}"))),
    }
    if url.host_str().is_none() {
        return Err(invalid("missing host"));
    }
    Proxy::all(url.as_str()).map_err(|e| invalid(&e.to_string()))
}

/// Transport settings
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Pause after each request, while the lock is still held
    pub request_delay: Duration,
    pub timeout: Duration,
    pub proxy_url: Option<String>,
}

impl TransportConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            request_delay: config.tracker.request_delay(),
            timeout: config.tracker.request_timeout(),
            proxy_url: config.session.proxy_url.clone(),
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            request_delay: Duration::from_secs(5),
            timeout: Duration::from_secs(30),
            proxy_url: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestMethod {
    Get,
    /// `application/x-www-form-urlencoded` POST
    PostForm(Vec<(String, String)>),
}

/// One outbound request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportRequest {
    pub method: RequestMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
}

impl TransportRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: RequestMethod::Get,
            url: url.into(),
            headers: Vec::new(),
        }
    }

    pub fn post_form(url: impl Into<String>, fields: Vec<(String, String)>) -> Self {
        Self {
            method: RequestMethod::PostForm(fields),
            url: url.into(),
            headers: Vec::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

/// What the document fetcher needs from a transport
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &TransportRequest, cancel: &CancellationToken) -> FetchResult<TransportResponse>;

    /// Drop cookies and pick a new user agent
    async fn rotate_identity(&self) -> FetchResult<()>;
}

struct TransportState {
    client: Client,
    user_agent: &'static str,
}

/// Serialized, paced HTTP transport with a rotatable identity
pub struct SessionTransport {
    config: TransportConfig,
    proxy: Option<Proxy>,
    state: Mutex<TransportState>,
}

impl SessionTransport {
    /// Build the transport; a malformed proxy is fatal
    pub fn new(config: TransportConfig) -> FetchResult<Self> {
        let proxy = config.proxy_url.as_deref().map(validate_proxy_url).transpose()?;
        let user_agent = random_user_agent();
        let client = build_client(&config, proxy.as_ref())?;

        if let Some(proxy_url) = &config.proxy_url {
            info!("🌐 Session transport using proxy {}", proxy_url);
        }

        Ok(Self {
            config,
            proxy,
            state: Mutex::new(TransportState { client, user_agent }),
        })
    }

    /// Send one request. The pacing delay runs before the lock is released;
    /// cancellation only shortens that delay.
    pub async fn send(&self, request: &TransportRequest, cancel: &CancellationToken) -> FetchResult<TransportResponse> {
        let state = self.state.lock().await;
        let result = self.perform(&state, request).await;

        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("Pacing delay interrupted by cancellation");
            }
            _ = tokio::time::sleep(self.config.request_delay) => {}
        }
        drop(state);
        result
    }

    async fn perform(&self, state: &TransportState, request: &TransportRequest) -> FetchResult<TransportResponse> {
        let headers = request_headers(state.user_agent, &request.headers)?;
        let builder = match &request.method {
            RequestMethod::Get => state.client.get(&request.url),
            RequestMethod::PostForm(fields) => state.client.post(&request.url).form(fields),
        };

        debug!("➡️  {} {}", method_name(&request.method), request.url);
        let response = builder
            .headers(headers)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(&request.url, e))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| FetchError::from_reqwest(&request.url, e))?;
        debug!("⬅️  {} {} ({} bytes)", status, request.url, body.len());

        Ok(TransportResponse { status, body })
    }

    /// Fresh cookie store and a new user agent
    pub async fn rotate_identity(&self) -> FetchResult<()> {
        let mut state = self.state.lock().await;
        state.client = build_client(&self.config, self.proxy.as_ref())?;
        state.user_agent = random_user_agent();
        info!("🔄 Session identity rotated");
        Ok(())
    }

    pub async fn user_agent(&self) -> &'static str {
        self.state.lock().await.user_agent
    }
}

#[async_trait]
impl Transport for SessionTransport {
    async fn send(&self, request: &TransportRequest, cancel: &CancellationToken) -> FetchResult<TransportResponse> {
        SessionTransport::send(self, request, cancel).await
    }

    async fn rotate_identity(&self) -> FetchResult<()> {
        SessionTransport::rotate_identity(self).await
    }
}

fn build_client(config: &TransportConfig, proxy: Option<&Proxy>) -> FetchResult<Client> {
    let jar = Arc::new(Jar::default());
    let mut builder = ClientBuilder::new()
        .timeout(config.timeout)
        .cookie_provider(jar)
        .gzip(true)
        .brotli(true)
        .redirect(reqwest::redirect::Policy::limited(10));
    if let Some(proxy) = proxy {
        builder = builder.proxy(proxy.clone());
    }
    builder.build().map_err(|e| FetchError::ClientBuild(e.to_string()))
}

fn request_headers(user_agent: &str, extra: &[(String, String)]) -> FetchResult<HeaderMap> {
    let mut headers = HeaderMap::new();
    let pairs = FINGERPRINT_HEADERS
        .iter()
        .map(|(k, v)| (*k, *v))
        .chain(std::iter::once(("user-agent", user_agent)))
        .chain(extra.iter().map(|(k, v)| (k.as_str(), v.as_str())));
    for (name, value) in pairs {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| FetchError::ClientBuild(format!("header name {name}: {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| FetchError::ClientBuild(format!("header value for {name}: {e}")))?;
        headers.insert(name, value);
    }
    Ok(headers)
}

fn method_name(method: &RequestMethod) -> &'static str {
    match method {
        RequestMethod::Get => "GET",
        RequestMethod::PostForm(_) => "POST",
    }
}
