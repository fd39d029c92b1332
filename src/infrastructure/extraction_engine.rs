//! Product extraction: title, canonical link and per-tier minimum prices
//!
//! Prices come from the paginated offers feed. Pagination stops when a page
//! repeats the previous one (same content hash) or at `max_offer_pages`.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::domain::item::{PriceVector, ProductSnapshot};
use crate::domain::marketplace::Marketplace;
use crate::domain::search_key::ProductRef;
use crate::infrastructure::config::AppConfig;
use crate::infrastructure::document_fetcher::DocumentSource;
use crate::infrastructure::fetch_error::{FetchError, FetchResult};
use crate::infrastructure::parsing::{parse_offer_page, parse_product_page};

/// Source of fresh product snapshots
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// `Ok(None)` when the product page was read but no tier had a price
    async fn lookup(&self, product: &ProductRef, cancel: &CancellationToken) -> FetchResult<Option<ProductSnapshot>>;
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub max_offer_pages: u32,
    pub max_session_resets: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub diagnostics_dir: PathBuf,
}

impl EngineConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            max_offer_pages: config.tracker.max_offer_pages,
            max_session_resets: config.tracker.max_session_resets,
            initial_backoff: Duration::from_secs(1),
            max_backoff: config.tracker.max_backoff(),
            diagnostics_dir: config.tracker.diagnostics_dir.clone(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_offer_pages: 11,
            max_session_resets: 1,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(60),
            diagnostics_dir: PathBuf::from("diagnostics"),
        }
    }
}

pub struct ExtractionEngine {
    source: Arc<dyn DocumentSource>,
    config: EngineConfig,
}

impl ExtractionEngine {
    pub fn new(source: Arc<dyn DocumentSource>, config: EngineConfig) -> Self {
        Self { source, config }
    }

    /// Extract one product. Timeouts are retried with backoff until
    /// cancelled; retriable rejections reset the session a bounded number
    /// of times.
    async fn extract_with_retry(&self, product: &ProductRef, marketplace: &Marketplace, cancel: &CancellationToken) -> FetchResult<Option<ProductSnapshot>> {
        let domain = marketplace.domain;
        let mut resets = 0;
        let mut backoff = self.config.initial_backoff;

        loop {
            if cancel.is_cancelled() {
                return Err(FetchError::Cancelled);
            }

            let attempt = async {
                if !self.source.is_started(domain).await {
                    self.source.reset(domain, cancel).await?;
                }
                self.extract(product, marketplace, cancel).await
            }
            .await;

            match attempt {
                Ok(snapshot) => return Ok(snapshot),
                Err(e) if e.is_timeout() => {
                    warn!("⏱️  {} for {}, retrying in {:?}", e, product, backoff);
                    tokio::select! {
                        _ = cancel.cancelled() => return Err(FetchError::Cancelled),
                        _ = tokio::time::sleep(backoff) => {}
                    }
                    backoff = (backoff * 2).min(self.config.max_backoff);
                }
                Err(e) if e.is_retriable() && resets < self.config.max_session_resets => {
                    resets += 1;
                    warn!("🔄 {} for {}, resetting session ({}/{})", e, product, resets, self.config.max_session_resets);
                    self.source.invalidate(domain).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn extract(&self, product: &ProductRef, marketplace: &Marketplace, cancel: &CancellationToken) -> FetchResult<Option<ProductSnapshot>> {
        let hint = product.to_string();
        let document = self.source.get(&product.product_url(), &hint, cancel).await?;
        let page = parse_product_page(&document.body);

        let Some(title) = page.title else {
            self.dump(&format!("{}_err.html", product.code), &document.body).await;
            return Err(FetchError::TitleNotFound { product: hint });
        };
        let Some(link) = page.link else {
            return Err(FetchError::LinkNotFound { product: hint });
        };

        let prices = self.collect_prices(product, marketplace, cancel).await?;
        if prices.is_empty() {
            warn!("💸 Prices not found for {}", hint);
            self.dump(&format!("err_{}.{}.html", product.code, product.domain), &document.body)
                .await;
            return Ok(None);
        }

        info!(product = %hint, prices = %prices, "Prices extracted");
        Ok(Some(ProductSnapshot { title, link, prices }))
    }

    async fn collect_prices(&self, product: &ProductRef, marketplace: &Marketplace, cancel: &CancellationToken) -> FetchResult<PriceVector> {
        let hint = product.to_string();
        let mut prices = PriceVector::default();
        let mut previous_hash = None;

        for page_no in 0..self.config.max_offer_pages {
            let url = offers_url(marketplace, &product.code, page_no);
            let document = self.source.get(&url, &hint, cancel).await?;
            let page = parse_offer_page(&document.body, marketplace);

            if previous_hash == Some(page.content_hash) {
                debug!("Offers page {} repeats the previous one for {}", page_no, hint);
                break;
            }
            previous_hash = Some(page.content_hash);

            for (tier, price) in page.prices.iter() {
                prices.offer(tier, price);
            }
            debug!("Offers page {} for {}: {} offers", page_no, hint, page.offers);
        }
        Ok(prices)
    }

    /// Best-effort page dump for later inspection
    async fn dump(&self, file_name: &str, body: &str) {
        let dir = &self.config.diagnostics_dir;
        let path = dir.join(file_name);
        let written = async {
            tokio::fs::create_dir_all(dir).await?;
            tokio::fs::write(&path, body).await
        }
        .await;
        match written {
            Ok(()) => info!("📝 Page dumped to {:?}", path),
            Err(e) => warn!("Failed to dump page to {:?}: {}", path, e),
        }
    }
}

#[async_trait]
impl PriceSource for ExtractionEngine {
    async fn lookup(&self, product: &ProductRef, cancel: &CancellationToken) -> FetchResult<Option<ProductSnapshot>> {
        let marketplace = product.marketplace().ok_or_else(|| FetchError::UnsupportedMarketplace {
            domain: product.domain.clone(),
        })?;
        self.extract_with_retry(product, marketplace, cancel).await
    }
}

/// Offers feed page `page_no` for `code`
pub fn offers_url(marketplace: &Marketplace, code: &str, page_no: u32) -> String {
    let mut url = format!(
        "{}/gp/aod/ajax/ref=aod_page_2?asin={}&pc=dp&pageno={}",
        marketplace.base_url(),
        code,
        page_no
    );
    if marketplace.force_english {
        url.push_str("&language=en_US");
    }
    url
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::item::ConditionTier;
    use crate::infrastructure::document_fetcher::FetchedDocument;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tempfile::tempdir;
    use tokio::sync::Mutex;

    const PRODUCT_PAGE: &str = r#"<html><head><link rel="canonical" href="https://www.amazon.es/dp/B07XJ8C8F5"></head>
        <body><span id="productTitle">Widget</span></body></html>"#;

    fn offers_page(heading: &str, price: &str, marker: u32) -> String {
        format!(
            r#"<html><body><p>page {marker}</p>
                 <div id="aod-offer"><div id="aod-offer-heading">{heading}</div>
                 <div id="aod-offer-price"><span class="a-offscreen">{price}</span></div></div>
               </body></html>"#
        )
    }

    /// Scripted storefront: answers product pages with `product`, offers
    /// pages by calling `offers`, and can inject errors up front.
    struct ScriptedSource {
        product: String,
        offers: Box<dyn Fn(u32) -> String + Send + Sync>,
        failures: Mutex<VecDeque<FetchError>>,
        started: Mutex<bool>,
        resets: AtomicU32,
        offer_fetches: AtomicU32,
    }

    impl ScriptedSource {
        fn new(offers: impl Fn(u32) -> String + Send + Sync + 'static) -> Self {
            Self {
                product: PRODUCT_PAGE.to_string(),
                offers: Box::new(offers),
                failures: Mutex::new(VecDeque::new()),
                started: Mutex::new(false),
                resets: AtomicU32::new(0),
                offer_fetches: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl DocumentSource for ScriptedSource {
        async fn get(&self, url: &str, _hint: &str, _cancel: &CancellationToken) -> FetchResult<FetchedDocument> {
            if let Some(err) = self.failures.lock().await.pop_front() {
                return Err(err);
            }
            let body = match url.split("pageno=").nth(1) {
                Some(page) => {
                    self.offer_fetches.fetch_add(1, Ordering::SeqCst);
                    (self.offers)(page.parse().unwrap())
                }
                None => self.product.clone(),
            };
            Ok(FetchedDocument { url: url.to_string(), body })
        }

        async fn is_started(&self, _domain: &str) -> bool {
            *self.started.lock().await
        }

        async fn reset(&self, _domain: &str, _cancel: &CancellationToken) -> FetchResult<()> {
            self.resets.fetch_add(1, Ordering::SeqCst);
            *self.started.lock().await = true;
            Ok(())
        }

        async fn invalidate(&self, _domain: &str) {
            *self.started.lock().await = false;
        }
    }

    fn product() -> ProductRef {
        "B07XJ8C8F5.es".parse().unwrap()
    }

    fn engine(source: Arc<ScriptedSource>, dir: &std::path::Path) -> ExtractionEngine {
        let config = EngineConfig {
            diagnostics_dir: dir.to_path_buf(),
            ..EngineConfig::default()
        };
        ExtractionEngine::new(source, config)
    }

    #[tokio::test]
    async fn pagination_stops_on_repeated_page() {
        let dir = tempdir().unwrap();
        let source = Arc::new(ScriptedSource::new(|page| match page {
            0 => offers_page("Nuevo", "50,00 €", 0),
            1 => offers_page("De 2ª mano - Como nuevo", "30,00 €", 1),
            _ => offers_page("Nuevo", "10,00 €", 99),
        }));
        let snapshot = engine(source.clone(), dir.path())
            .lookup(&product(), &CancellationToken::new())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(snapshot.title, "Widget");
        assert_eq!(snapshot.link, "https://www.amazon.es/dp/B07XJ8C8F5");
        // page 2 is new, page 3 repeats it
        assert_eq!(source.offer_fetches.load(Ordering::SeqCst), 4);
        assert_eq!(snapshot.prices[ConditionTier::New], 10.0);
        assert_eq!(snapshot.prices[ConditionTier::LikeNew], 30.0);
        assert_eq!(source.resets.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn pagination_is_bounded_when_pages_never_repeat() {
        let dir = tempdir().unwrap();
        let source = Arc::new(ScriptedSource::new(|page| offers_page("Nuevo", "20,00 €", page)));
        let snapshot = engine(source.clone(), dir.path())
            .lookup(&product(), &CancellationToken::new())
            .await
            .unwrap();

        assert!(snapshot.is_some());
        assert_eq!(source.offer_fetches.load(Ordering::SeqCst), 11);
    }

    #[tokio::test]
    async fn missing_prices_are_soft_and_dumped() {
        let dir = tempdir().unwrap();
        let source = Arc::new(ScriptedSource::new(|_| "<html><body>no offers</body></html>".to_string()));
        let result = engine(source, dir.path())
            .lookup(&product(), &CancellationToken::new())
            .await
            .unwrap();

        assert!(result.is_none());
        assert!(dir.path().join("err_B07XJ8C8F5.es.html").exists());
    }

    #[tokio::test]
    async fn missing_title_is_fatal_and_dumped() {
        let dir = tempdir().unwrap();
        let mut source = ScriptedSource::new(|_| String::new());
        source.product = r#"<html><head><link rel="canonical" href="x"></head></html>"#.to_string();
        let err = engine(Arc::new(source), dir.path())
            .lookup(&product(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::TitleNotFound { .. }));
        assert!(dir.path().join("B07XJ8C8F5_err.html").exists());
    }

    #[tokio::test]
    async fn retriable_rejection_resets_then_surfaces() {
        let dir = tempdir().unwrap();
        let source = Arc::new(ScriptedSource::new(|page| offers_page("Nuevo", "20,00 €", page)));
        {
            let mut failures = source.failures.lock().await;
            for _ in 0..2 {
                failures.push_back(FetchError::Retriable {
                    status: 503,
                    url: "u".into(),
                });
            }
        }
        let err = engine(source.clone(), dir.path())
            .lookup(&product(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(err.is_retriable());
        // initial session plus one reset after the first rejection
        assert_eq!(source.resets.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn timeouts_retry_with_backoff() {
        let dir = tempdir().unwrap();
        let source = Arc::new(ScriptedSource::new(|page| offers_page("Nuevo", "20,00 €", page)));
        {
            let mut failures = source.failures.lock().await;
            for _ in 0..3 {
                failures.push_back(FetchError::NetworkTimeout { url: "u".into() });
            }
        }
        let started = tokio::time::Instant::now();
        let snapshot = engine(source, dir.path())
            .lookup(&product(), &CancellationToken::new())
            .await
            .unwrap();

        assert!(snapshot.is_some());
        // 1s + 2s + 4s
        assert!(started.elapsed() >= Duration::from_secs(7));
    }

    #[tokio::test]
    async fn cancellation_stops_timeout_retries() {
        let dir = tempdir().unwrap();
        let source = Arc::new(ScriptedSource::new(|_| String::new()));
        source
            .failures
            .lock()
            .await
            .push_back(FetchError::NetworkTimeout { url: "u".into() });
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = engine(source, dir.path()).lookup(&product(), &cancel).await.unwrap_err();
        assert!(matches!(err, FetchError::Cancelled));
    }

    #[test]
    fn offers_url_forces_english_where_needed() {
        let es = Marketplace::from_domain("es").unwrap();
        assert_eq!(
            offers_url(es, "B07XJ8C8F5", 3),
            "https://www.amazon.es/gp/aod/ajax/ref=aod_page_2?asin=B07XJ8C8F5&pc=dp&pageno=3"
        );
        let com = Marketplace::from_domain("com").unwrap();
        assert!(offers_url(com, "B07XJ8C8F5", 0).ends_with("&pageno=0&language=en_US"));
    }
}
