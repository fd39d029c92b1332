//! Offers-feed page parsing
//!
//! An offers page carries one pinned offer and a list of other offers.
//! Each offer contributes `listed price + delivery fee` to the tier named
//! by its heading; the minimum per tier wins.

use scraper::{ElementRef, Html};
use tracing::debug;

use crate::domain::item::{ConditionTier, PriceVector};
use crate::domain::marketplace::Marketplace;
use crate::infrastructure::parsing::price_parser::parse_price;
use crate::infrastructure::parsing::selectors::{OFFER_BLOCKS, OFFER_HEADING, OfferBlockSelectors};

/// Result of parsing one offers page
#[derive(Debug, Clone, PartialEq)]
pub struct OfferPage {
    /// Per-tier minima found on this page alone
    pub prices: PriceVector,
    /// Hash of the page's full text content, used to detect repeated pages
    pub content_hash: blake3::Hash,
    /// Offers whose tier and price were both recognized
    pub offers: usize,
}

/// Parse one offers page for `marketplace`
pub fn parse_offer_page(body: &str, marketplace: &Marketplace) -> OfferPage {
    let document = Html::parse_document(body);
    let text: String = document.root_element().text().collect();
    let content_hash = blake3::hash(text.as_bytes());

    let mut prices = PriceVector::default();
    let mut offers = 0;
    for selectors in OFFER_BLOCKS.iter() {
        for block in document.select(&selectors.block) {
            if let Some((tier, total)) = parse_offer(block, selectors, marketplace) {
                prices.offer(tier, total);
                offers += 1;
            }
        }
    }

    OfferPage {
        prices,
        content_hash,
        offers,
    }
}

fn parse_offer(block: ElementRef<'_>, selectors: &OfferBlockSelectors, marketplace: &Marketplace) -> Option<(ConditionTier, f64)> {
    let heading = block.select(&OFFER_HEADING).next()?;
    let heading: String = heading.text().collect();
    let Some(tier) = marketplace.tier_for_heading(&heading) else {
        debug!("Skipping {} offer with heading {:?}", selectors.name, heading.trim());
        return None;
    };

    let mut delivery = 0.0;
    for selector in &selectors.delivery {
        let parsed = block
            .select(selector)
            .find_map(|el| parse_price(marketplace, el.text().collect::<String>().trim()).ok());
        if let Some(fee) = parsed {
            delivery = fee;
        }
    }

    let mut price = None;
    for el in block.select(&selectors.price) {
        let text: String = el.text().collect();
        match parse_price(marketplace, &text) {
            Ok(p) => {
                price = Some(p);
                break;
            }
            Err(e) => debug!("Couldn't parse {} offer price: {}", selectors.name, e),
        }
    }
    price.map(|p| (tier, p + delivery))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn es() -> &'static Marketplace {
        Marketplace::from_domain("es").unwrap()
    }

    fn offer(heading: &str, price: &str, delivery: Option<&str>) -> String {
        let delivery = delivery
            .map(|d| format!(r#"<div id="ddmDeliveryMessage">Envío {d}</div>"#))
            .unwrap_or_default();
        format!(
            r#"<div id="aod-offer">
                 <div id="aod-offer-heading"><h5>{heading}</h5></div>
                 <div id="aod-offer-price"><span class="a-offscreen">{price}</span>{delivery}</div>
               </div>"#
        )
    }

    fn page(pinned: &str, others: &[String]) -> String {
        format!(
            r#"<html><body>
                 <div id="pinned-de-id">
                   <div id="aod-offer-heading">{pinned}</div>
                   <div id="pinned-offer-top-id"><span class="a-offscreen">50,00 €</span></div>
                 </div>
                 {}
               </body></html>"#,
            others.join("\n")
        )
    }

    #[test]
    fn pinned_and_listed_offers_fill_tiers() {
        let body = page(
            "Nuevo",
            &[
                offer("De 2ª mano - Como nuevo", "30,00 €", Some("2,99 €")),
                offer("De 2ª mano - Como nuevo", "35,00 €", None),
                offer("De 2ª mano - Aceptable", "1.020,00 €", None),
            ],
        );
        let parsed = parse_offer_page(&body, es());

        assert_eq!(parsed.offers, 4);
        assert_eq!(parsed.prices[ConditionTier::New], 50.0);
        assert!((parsed.prices[ConditionTier::LikeNew] - 32.99).abs() < 1e-9);
        assert_eq!(parsed.prices[ConditionTier::VeryGood], 0.0);
        assert_eq!(parsed.prices[ConditionTier::Acceptable], 1020.0);
    }

    #[test]
    fn unrecognized_heading_is_skipped() {
        let body = page("Reacondicionado", &[offer("Desconocido", "10,00 €", None)]);
        let parsed = parse_offer_page(&body, es());
        assert_eq!(parsed.offers, 0);
        assert!(parsed.prices.is_empty());
    }

    #[test]
    fn free_delivery_adds_nothing() {
        let body = page("Nuevo", &[offer("Nuevo", "40,00 €", Some("GRATIS"))]);
        let parsed = parse_offer_page(&body, es());
        assert_eq!(parsed.prices[ConditionTier::New], 40.0);
    }

    #[test]
    fn identical_pages_hash_identically() {
        let a = parse_offer_page(&page("Nuevo", &[]), es());
        let b = parse_offer_page(&page("Nuevo", &[]), es());
        let c = parse_offer_page(&page("Nuevo", &[offer("Nuevo", "1,00 €", None)]), es());
        assert_eq!(a.content_hash, b.content_hash);
        assert_ne!(a.content_hash, c.content_hash);
    }
}
