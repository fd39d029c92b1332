//! Document fetching with captcha resolution and session establishment
//!
//! A fetch walks a small state machine:
//! `Fetching → CaptchaChallenged → Resolving → Revalidating → …`
//! Each challenge increases the depth; past `max_captcha_depth` the fetch
//! fails instead of looping.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use crate::domain::marketplace::{LocationMethod, Marketplace};
use crate::infrastructure::captcha_solver::CaptchaSolver;
use crate::infrastructure::config::AppConfig;
use crate::infrastructure::fetch_error::{FetchError, FetchResult};
use crate::infrastructure::parsing::{CaptchaForm, CaptchaProbe, csrf_token, has_location, location_modal, probe_captcha};
use crate::infrastructure::session_transport::{Transport, TransportRequest};

const CSRF_HEADER: &str = "anti-csrftoken-a2z";

#[derive(Debug, Clone)]
pub struct FetcherConfig {
    pub max_captcha_depth: u32,
    /// Postal code used by domestic storefronts, also the "location set" marker
    pub postal_code: String,
    /// Country used by foreign storefronts
    pub country_code: String,
}

impl FetcherConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            max_captcha_depth: config.tracker.max_captcha_depth,
            postal_code: config.session.postal_code.clone(),
            country_code: config.session.country_code.clone(),
        }
    }
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            max_captcha_depth: 2,
            postal_code: "44001".to_string(),
            country_code: "ES".to_string(),
        }
    }
}

/// A successfully fetched, captcha-free document
#[derive(Debug, Clone)]
pub struct FetchedDocument {
    pub url: String,
    pub body: String,
}

/// Where the extraction engine gets its documents from
#[async_trait]
pub trait DocumentSource: Send + Sync {
    async fn get(&self, url: &str, hint: &str, cancel: &CancellationToken) -> FetchResult<FetchedDocument>;

    /// Whether the domain's session is established
    async fn is_started(&self, domain: &str) -> bool;

    async fn reset(&self, domain: &str, cancel: &CancellationToken) -> FetchResult<()>;

    /// Forget the domain's session so the next use resets it
    async fn invalidate(&self, domain: &str);
}

enum FetchState {
    Fetching(TransportRequest),
    CaptchaChallenged { origin: String, form: CaptchaForm },
    Resolving { origin: String, form: CaptchaForm },
    Revalidating(TransportRequest),
}

pub struct DocumentFetcher {
    transport: Arc<dyn Transport>,
    solver: Arc<dyn CaptchaSolver>,
    config: FetcherConfig,
    /// Domains whose session (cookies, location) is established
    started: Mutex<HashSet<String>>,
}

impl DocumentFetcher {
    pub fn new(transport: Arc<dyn Transport>, solver: Arc<dyn CaptchaSolver>, config: FetcherConfig) -> Self {
        Self {
            transport,
            solver,
            config,
            started: Mutex::new(HashSet::new()),
        }
    }

    pub async fn get(&self, url: &str, hint: &str, cancel: &CancellationToken) -> FetchResult<FetchedDocument> {
        self.fetch(TransportRequest::get(url), hint, cancel).await
    }

    /// Fetch `request`, answering captcha challenges along the way.
    /// `hint` names the item for log lines.
    pub async fn fetch(&self, request: TransportRequest, hint: &str, cancel: &CancellationToken) -> FetchResult<FetchedDocument> {
        let mut depth = 0u32;
        let mut state = FetchState::Fetching(request);

        loop {
            state = match state {
                FetchState::Fetching(request) | FetchState::Revalidating(request) => {
                    let body = self.send_checked(&request, cancel).await?;
                    match probe_captcha(&body) {
                        CaptchaProbe::Clear => {
                            return Ok(FetchedDocument { url: request.url, body });
                        }
                        CaptchaProbe::Incomplete(missing) => {
                            return Err(FetchError::CaptchaFormIncomplete {
                                url: request.url,
                                missing: missing.to_string(),
                            });
                        }
                        CaptchaProbe::Challenge(form) => FetchState::CaptchaChallenged {
                            origin: request.url,
                            form,
                        },
                    }
                }
                FetchState::CaptchaChallenged { origin, form } => {
                    depth += 1;
                    if depth > self.config.max_captcha_depth {
                        return Err(FetchError::CaptchaRecursionLimit {
                            url: origin,
                            depth: self.config.max_captcha_depth,
                        });
                    }
                    warn!("🧩 Captcha requested for {} (attempt {})", hint, depth);
                    FetchState::Resolving { origin, form }
                }
                FetchState::Resolving { origin, form } => {
                    let solution = self.solver.solve(&form.image_url).await?;
                    debug!("Captcha solved for {}", hint);
                    FetchState::Revalidating(TransportRequest::get(validation_url(&origin, &form, &solution)?))
                }
            };
        }
    }

    async fn send_checked(&self, request: &TransportRequest, cancel: &CancellationToken) -> FetchResult<String> {
        let response = self.transport.send(request, cancel).await?;
        match response.status {
            200 | 202 => Ok(response.body),
            status @ (502 | 503) => {
                if status == 503 {
                    if let Some(domain) = marketplace_domain(&request.url) {
                        warn!("⚠️  503 from amazon.{}, resetting session", domain);
                        self.started.lock().await.remove(&domain);
                    }
                    self.transport.rotate_identity().await?;
                }
                Err(FetchError::Retriable {
                    status,
                    url: request.url.clone(),
                })
            }
            status => Err(FetchError::HttpStatus {
                status,
                url: request.url.clone(),
            }),
        }
    }

    pub async fn is_started(&self, domain: &str) -> bool {
        self.started.lock().await.contains(domain)
    }

    pub async fn invalidate(&self, domain: &str) {
        self.started.lock().await.remove(domain);
    }

    /// Re-establish the session for `domain`: new cookies and identity,
    /// then make sure the delivery location is set.
    pub async fn reset(&self, domain: &str, cancel: &CancellationToken) -> FetchResult<()> {
        let marketplace = Marketplace::from_domain(domain).ok_or_else(|| FetchError::UnsupportedMarketplace {
            domain: domain.to_string(),
        })?;

        self.started.lock().await.remove(domain);
        self.transport.rotate_identity().await?;

        let home = self.get(&marketplace.base_url(), domain, cancel).await?;
        if has_location(&home.body, &self.config.postal_code) {
            debug!("Delivery location already set on amazon.{}", domain);
        } else {
            self.change_location(marketplace, &home.body, cancel).await?;
        }

        self.started.lock().await.insert(domain.to_string());
        info!("✅ Session established for amazon.{}", domain);
        Ok(())
    }

    async fn change_location(&self, marketplace: &Marketplace, home: &str, cancel: &CancellationToken) -> FetchResult<()> {
        let domain = marketplace.domain;
        let modal = location_modal(home).ok_or_else(|| FetchError::LocationModalMissing {
            domain: domain.to_string(),
        })?;

        let modal_url = format!("{}/{}", marketplace.base_url(), modal.url.trim_start_matches('/'));
        let request = TransportRequest::get(modal_url).with_header(CSRF_HEADER, modal.ajax_headers.csrf_token);
        let popover = self.fetch(request, domain, cancel).await?;

        let token = csrf_token(&popover.body).ok_or_else(|| FetchError::CsrfTokenMissing {
            domain: domain.to_string(),
        })?;

        let url = format!("{}/gp/delivery/ajax/address-change.html", marketplace.base_url());
        let form = self.location_form(marketplace.location_method);
        self.fetch(TransportRequest::post_form(url, form).with_header(CSRF_HEADER, token), domain, cancel)
            .await?;

        info!("📍 Delivery location changed on amazon.{}", domain);
        Ok(())
    }

    fn location_form(&self, method: LocationMethod) -> Vec<(String, String)> {
        let mut form: Vec<(String, String)> = match method {
            LocationMethod::PostalCode => vec![
                ("locationType".into(), "LOCATION_INPUT".into()),
                ("zipCode".into(), self.config.postal_code.clone()),
            ],
            LocationMethod::Country => vec![
                ("locationType".into(), "COUNTRY".into()),
                ("district".into(), self.config.country_code.clone()),
                ("countryCode".into(), self.config.country_code.clone()),
            ],
        };
        for (key, value) in [
            ("storeContext", "generic"),
            ("deviceType", "web"),
            ("pageType", "Gateway"),
            ("actionSource", "glow"),
            ("almBrandId", "undefined"),
        ] {
            form.push((key.to_string(), value.to_string()));
        }
        form
    }
}

#[async_trait]
impl DocumentSource for DocumentFetcher {
    async fn get(&self, url: &str, hint: &str, cancel: &CancellationToken) -> FetchResult<FetchedDocument> {
        DocumentFetcher::get(self, url, hint, cancel).await
    }

    async fn is_started(&self, domain: &str) -> bool {
        DocumentFetcher::is_started(self, domain).await
    }

    async fn reset(&self, domain: &str, cancel: &CancellationToken) -> FetchResult<()> {
        DocumentFetcher::reset(self, domain, cancel).await
    }

    async fn invalidate(&self, domain: &str) {
        DocumentFetcher::invalidate(self, domain).await
    }
}

/// `amazon.<domain>` suffix of a storefront URL
pub fn marketplace_domain(url: &str) -> Option<String> {
    let url = Url::parse(url).ok()?;
    let host = url.host_str()?;
    let idx = host.find("amazon.")?;
    Some(host[idx + "amazon.".len()..].to_string())
}

/// Captcha answer endpoint on the same storefront as the challenged request
fn validation_url(origin: &str, form: &CaptchaForm, solution: &str) -> FetchResult<String> {
    let origin_url = Url::parse(origin).map_err(|e| FetchError::network(origin, e))?;
    let mut url = origin_url
        .join("/errors/validateCaptcha")
        .map_err(|e| FetchError::network(origin, e))?;
    url.query_pairs_mut()
        .append_pair("amzn", &form.amzn)
        .append_pair("amzn-r", &form.amzn_r)
        .append_pair("field-keywords", solution.trim());
    Ok(url.into())
}
