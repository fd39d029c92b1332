//! Captcha-solving collaborator
//!
//! The service is a plain HTTP endpoint: `GET {base}/{image-url}` answers
//! 200 with the solved text as the body.

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{info, warn};

use crate::infrastructure::fetch_error::{FetchError, FetchResult};

/// Known challenge used to check the service on startup
pub const SELF_TEST_IMAGE: &str = "https://images-na.ssl-images-amazon.com/captcha/usvmgloq/Captcha_kwrrnqwkph.jpg";
pub const SELF_TEST_SOLUTION: &str = "AAFXMX";

const SOLVER_TIMEOUT: Duration = Duration::from_secs(10);

#[async_trait]
pub trait CaptchaSolver: Send + Sync {
    /// Solve the challenge at `image_url`; empty answers are errors
    async fn solve(&self, image_url: &str) -> FetchResult<String>;
}

/// Client for the external captcha-solving service
pub struct HttpCaptchaSolver {
    client: Client,
    base_url: Option<String>,
}

impl HttpCaptchaSolver {
    pub fn new(base_url: Option<String>) -> FetchResult<Self> {
        let client = Client::builder()
            .timeout(SOLVER_TIMEOUT)
            .build()
            .map_err(|e| FetchError::ClientBuild(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.map(|u| u.trim_end_matches('/').to_string()),
        })
    }

    /// Solve the well-known challenge and log the outcome
    pub async fn self_test(&self) -> bool {
        match self.solve(SELF_TEST_IMAGE).await {
            Ok(solution) if solution.trim() == SELF_TEST_SOLUTION => {
                info!("✅ Captcha service self-test passed");
                true
            }
            Ok(solution) => {
                warn!("⚠️  Captcha service self-test mismatch: got {:?}, expected {}", solution, SELF_TEST_SOLUTION);
                false
            }
            Err(e) => {
                warn!("⚠️  Captcha service self-test failed: {}", e);
                false
            }
        }
    }
}

#[async_trait]
impl CaptchaSolver for HttpCaptchaSolver {
    async fn solve(&self, image_url: &str) -> FetchResult<String> {
        let base = self
            .base_url
            .as_deref()
            .ok_or_else(|| FetchError::captcha_unsolved("no captcha service configured"))?;
        let url = format!("{}/{}", base, image_url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| FetchError::captcha_unsolved(format!("request failed: {e}")))?;
        let status = response.status();
        if status.as_u16() != 200 {
            return Err(FetchError::captcha_unsolved(format!("service answered {status}")));
        }
        let solution = response
            .text()
            .await
            .map_err(|e| FetchError::captcha_unsolved(format!("reading body: {e}")))?;
        if solution.is_empty() {
            return Err(FetchError::captcha_unsolved("empty solution"));
        }
        Ok(solution)
    }
}
