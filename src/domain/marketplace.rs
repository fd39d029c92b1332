//! Marketplace parameter table
//!
//! Every supported storefront is described by one static entry: localized
//! condition labels, currency symbol, the price pattern matching its
//! thousands/decimal conventions, and how the delivery location is set.
//! Domains outside this table are rejected when a search key is parsed.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use thiserror::Error;

use crate::domain::item::{ConditionTier, TIER_COUNT};

/// How a storefront accepts a delivery-location change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationMethod {
    /// Postal code lookup (domestic storefront)
    PostalCode,
    /// Country selector (foreign storefront shipping abroad)
    Country,
}

/// Static per-domain parameters
#[derive(Debug)]
pub struct Marketplace {
    pub domain: &'static str,
    /// Prefix the offer heading carries for used offers
    pub used_label: &'static str,
    /// Condition labels in tier order
    pub tier_labels: [&'static str; TIER_COUNT],
    pub currency: &'static str,
    /// Capture 1: integer part with separators, capture 2 (optional): decimals
    pub price_pattern: &'static str,
    /// Offers feed is requested with `language=en_US`
    pub force_english: bool,
    pub location_method: LocationMethod,
}

const ENGLISH_TIERS: [&str; TIER_COUNT] = ["New", "Like new", "Very good", "Good", "Acceptable"];

pub static MARKETPLACES: &[Marketplace] = &[
    Marketplace {
        domain: "es",
        used_label: "De 2ª mano",
        tier_labels: ["Nuevo", "Como nuevo", "Muy bueno", "Bueno", "Aceptable"],
        currency: "€",
        price_pattern: r"([.0-9]+),([0-9][0-9]) €",
        force_english: false,
        location_method: LocationMethod::PostalCode,
    },
    Marketplace {
        domain: "de",
        used_label: "Gebraucht",
        tier_labels: ["Neu", "Wie neu", "Sehr gut", "Gut", "Akzeptabel"],
        currency: "€",
        price_pattern: r"([.0-9]+),([0-9][0-9]) €",
        force_english: false,
        location_method: LocationMethod::Country,
    },
    Marketplace {
        domain: "fr",
        used_label: "D'occasion",
        tier_labels: ["Neuf", "Comme neuf", "Très bon", "Bon", "Acceptable"],
        currency: "€",
        price_pattern: r"([ 0-9]+),([0-9][0-9]) €",
        force_english: false,
        location_method: LocationMethod::Country,
    },
    Marketplace {
        domain: "it",
        used_label: "Usato",
        tier_labels: [
            "Nuovo",
            "Come nuovo",
            "Ottime condizioni",
            "Buone condizioni",
            "Condizioni accettabili",
        ],
        currency: "€",
        price_pattern: r"([.0-9]+),([0-9][0-9]) €",
        force_english: false,
        location_method: LocationMethod::Country,
    },
    Marketplace {
        domain: "co.uk",
        used_label: "Used",
        tier_labels: ENGLISH_TIERS,
        currency: "£",
        price_pattern: r"£([,0-9]+)\.([0-9][0-9])",
        force_english: false,
        location_method: LocationMethod::Country,
    },
    Marketplace {
        domain: "com",
        used_label: "Used",
        tier_labels: ENGLISH_TIERS,
        currency: "$",
        price_pattern: r"\$([,0-9]+)\.([0-9][0-9])",
        force_english: true,
        location_method: LocationMethod::Country,
    },
    Marketplace {
        domain: "ca",
        used_label: "Used",
        tier_labels: ENGLISH_TIERS,
        currency: "$",
        price_pattern: r"\$([,0-9]+)\.([0-9][0-9])",
        force_english: false,
        location_method: LocationMethod::Country,
    },
    Marketplace {
        domain: "com.au",
        used_label: "Used",
        tier_labels: ENGLISH_TIERS,
        currency: "$",
        price_pattern: r"\$([,0-9]+)\.([0-9][0-9])",
        force_english: false,
        location_method: LocationMethod::Country,
    },
    Marketplace {
        domain: "co.jp",
        used_label: "Used",
        tier_labels: ENGLISH_TIERS,
        currency: "¥",
        price_pattern: r"¥([,0-9]+)",
        force_english: true,
        location_method: LocationMethod::Country,
    },
    Marketplace {
        domain: "com.br",
        used_label: "Usado",
        tier_labels: ["Novo", "Como novo", "Muito bom", "Bom", "Aceitável"],
        currency: "R$",
        price_pattern: r"R\$([.0-9]+),([0-9][0-9])",
        force_english: false,
        location_method: LocationMethod::Country,
    },
];

static PRICE_REGEXES: Lazy<HashMap<&'static str, Regex>> = Lazy::new(|| {
    MARKETPLACES
        .iter()
        .filter_map(|m| Regex::new(m.price_pattern).ok().map(|re| (m.domain, re)))
        .collect()
});

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MarketplaceError {
    #[error("marketplace {domain}: {reason}")]
    Incomplete { domain: String, reason: String },
}

impl Marketplace {
    pub fn from_domain(domain: &str) -> Option<&'static Marketplace> {
        MARKETPLACES.iter().find(|m| m.domain == domain)
    }

    pub fn price_regex(&self) -> Option<&'static Regex> {
        PRICE_REGEXES.get(self.domain)
    }

    pub fn tier_label(&self, tier: ConditionTier) -> &'static str {
        self.tier_labels[tier.index()]
    }

    /// Map an offer heading such as `"De 2ª mano - Muy bueno"` to its tier.
    /// Unrecognized headings yield `None` and the offer is skipped.
    pub fn tier_for_heading(&self, heading: &str) -> Option<ConditionTier> {
        let text = heading.trim().replacen(self.used_label, "", 1);
        let text = text.replacen('-', "", 1);
        let text = text.trim();
        ConditionTier::ALL
            .into_iter()
            .find(|tier| self.tier_label(*tier) == text)
    }

    pub fn base_url(&self) -> String {
        format!("https://www.amazon.{}", self.domain)
    }
}

/// Check every table entry for completeness; run once at startup
pub fn validate_marketplaces() -> Result<(), MarketplaceError> {
    for m in MARKETPLACES {
        let incomplete = |reason: &str| MarketplaceError::Incomplete {
            domain: m.domain.to_string(),
            reason: reason.to_string(),
        };
        if m.used_label.is_empty() {
            return Err(incomplete("missing used label"));
        }
        if m.currency.is_empty() {
            return Err(incomplete("missing currency symbol"));
        }
        if m.tier_labels.iter().any(|l| l.trim().is_empty()) {
            return Err(incomplete("empty tier label"));
        }
        if let Err(e) = Regex::new(m.price_pattern) {
            return Err(incomplete(&format!("invalid price pattern: {e}")));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_is_complete() {
        assert!(validate_marketplaces().is_ok());
        for m in MARKETPLACES {
            assert!(m.price_regex().is_some(), "no regex for {}", m.domain);
        }
    }

    #[test]
    fn unknown_domain_is_rejected() {
        assert!(Marketplace::from_domain("nl").is_none());
        assert!(Marketplace::from_domain("es").is_some());
    }

    #[test]
    fn heading_maps_to_tier() {
        let es = Marketplace::from_domain("es").unwrap();
        assert_eq!(es.tier_for_heading("  Nuevo "), Some(ConditionTier::New));
        assert_eq!(
            es.tier_for_heading("De 2ª mano - Muy bueno"),
            Some(ConditionTier::VeryGood)
        );
        assert_eq!(es.tier_for_heading("Reacondicionado"), None);

        let uk = Marketplace::from_domain("co.uk").unwrap();
        assert_eq!(uk.tier_for_heading("Used - Like new"), Some(ConditionTier::LikeNew));
        assert_eq!(uk.tier_for_heading("Used - Acceptable"), Some(ConditionTier::Acceptable));
    }
}
