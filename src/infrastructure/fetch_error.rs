//! Errors raised while fetching and extracting marketplace documents
//!
//! The scheduler only cares about two questions: should the session be
//! reset and retried, and was this a plain network timeout. Everything else
//! is reported and the key is retried on the next cycle.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("network timeout fetching {url}")]
    NetworkTimeout { url: String },

    #[error("network error fetching {url}: {reason}")]
    Network { url: String, reason: String },

    /// Upstream refused the session (502/503); a fresh session may succeed
    #[error("retriable status {status} from {url}")]
    Retriable { status: u16, url: String },

    #[error("unexpected status {status} from {url}")]
    HttpStatus { status: u16, url: String },

    #[error("captcha form incomplete at {url}: missing {missing}")]
    CaptchaFormIncomplete { url: String, missing: String },

    #[error("captcha solver failed: {reason}")]
    CaptchaUnsolved { reason: String },

    #[error("captcha still present after {depth} attempts at {url}")]
    CaptchaRecursionLimit { url: String, depth: u32 },

    #[error("title not found for {product}")]
    TitleNotFound { product: String },

    #[error("canonical link not found for {product}")]
    LinkNotFound { product: String },

    #[error("location modal not found on amazon.{domain}")]
    LocationModalMissing { domain: String },

    #[error("csrf token not found on amazon.{domain}")]
    CsrfTokenMissing { domain: String },

    #[error("invalid proxy {url}: {reason}")]
    InvalidProxy { url: String, reason: String },

    #[error("unsupported marketplace amazon.{domain}")]
    UnsupportedMarketplace { domain: String },

    #[error("operation cancelled")]
    Cancelled,

    #[error("client setup failed: {0}")]
    ClientBuild(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl FetchError {
    pub fn network(url: impl Into<String>, reason: impl ToString) -> Self {
        Self::Network {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    pub fn captcha_unsolved(reason: impl ToString) -> Self {
        Self::CaptchaUnsolved {
            reason: reason.to_string(),
        }
    }

    /// Map a transport error, keeping timeouts distinguishable
    pub fn from_reqwest(url: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::NetworkTimeout { url: url.to_string() }
        } else {
            Self::network(url, err)
        }
    }

    /// A session reset might clear this error
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::Retriable { .. })
    }

    /// Plain timeout, retried with backoff
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::NetworkTimeout { .. })
    }
}

pub type FetchResult<T> = Result<T, FetchError>;
