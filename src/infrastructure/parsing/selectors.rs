//! Compiled CSS selectors for marketplace pages
//!
//! Every selector is a string literal compiled once on first use.

use once_cell::sync::Lazy;
use scraper::Selector;

fn compile(css: &str) -> Selector {
    Selector::parse(css).unwrap_or_else(|e| panic!("invalid built-in selector {css:?}: {e}"))
}

// Product page
pub static PRODUCT_TITLE: Lazy<Selector> = Lazy::new(|| compile("#productTitle"));
pub static CANONICAL_LINK: Lazy<Selector> = Lazy::new(|| compile(r#"link[rel="canonical"]"#));

// Captcha interstitial
pub static CAPTCHA_MARKER: Lazy<Selector> = Lazy::new(|| compile("#captchacharacters"));
pub static CAPTCHA_IMAGE: Lazy<Selector> = Lazy::new(|| compile("form img"));
pub static CAPTCHA_INPUT: Lazy<Selector> = Lazy::new(|| compile("form input"));

// Delivery location
pub static LOCATION_LINE: Lazy<Selector> = Lazy::new(|| compile("#glow-ingress-line2"));
pub static LOCATION_MODAL: Lazy<Selector> = Lazy::new(|| compile("#nav-global-location-data-modal-action"));
pub static SCRIPT: Lazy<Selector> = Lazy::new(|| compile("script"));

// Offers feed
pub static OFFER_HEADING: Lazy<Selector> = Lazy::new(|| compile("#aod-offer-heading"));

/// Offer block and the price container inside it
pub struct OfferBlockSelectors {
    pub name: &'static str,
    pub block: Selector,
    pub price: Selector,
    /// Delivery texts in precedence order; a later match overrides an earlier one
    pub delivery: Vec<Selector>,
}

impl OfferBlockSelectors {
    fn new(name: &'static str, block: &'static str, container: &'static str) -> Self {
        let delivery = ["#ddmDeliveryMessage", "span.a-color-secondary.a-size-base"]
            .into_iter()
            .map(|d| compile(&format!("{container} {d}")))
            .collect();
        Self {
            name,
            block: compile(block),
            price: compile(&format!("{container} .a-offscreen")),
            delivery,
        }
    }
}

/// Pinned (featured) offer first, then the repeating offers list
pub static OFFER_BLOCKS: Lazy<[OfferBlockSelectors; 2]> = Lazy::new(|| {
    [
        OfferBlockSelectors::new("pinned", "#pinned-de-id", "#pinned-offer-top-id"),
        OfferBlockSelectors::new("other", "#aod-offer", "#aod-offer-price"),
    ]
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_selectors_compile() {
        for selector in [
            &*PRODUCT_TITLE,
            &*CANONICAL_LINK,
            &*CAPTCHA_MARKER,
            &*CAPTCHA_IMAGE,
            &*CAPTCHA_INPUT,
            &*LOCATION_LINE,
            &*LOCATION_MODAL,
            &*SCRIPT,
            &*OFFER_HEADING,
        ] {
            let _ = selector;
        }
        assert_eq!(OFFER_BLOCKS.len(), 2);
        assert_eq!(OFFER_BLOCKS[1].delivery.len(), 2);
    }
}
