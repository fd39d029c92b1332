//! Localized price parsing
//!
//! Each marketplace has its own thousands and decimal conventions. The
//! domain pattern captures the integer part (separators included) and,
//! except for yen, two decimal digits.

use thiserror::Error;

use crate::domain::marketplace::Marketplace;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PriceParseError {
    #[error("no price pattern for amazon.{domain}")]
    UnknownDomain { domain: String },

    #[error("price not found in {text:?}")]
    NotFound { text: String },

    #[error("malformed amount {amount:?}")]
    Malformed { amount: String },
}

/// Parse the first price in `text` for the given marketplace
pub fn parse_price(marketplace: &Marketplace, text: &str) -> Result<f64, PriceParseError> {
    let regex = marketplace.price_regex().ok_or_else(|| PriceParseError::UnknownDomain {
        domain: marketplace.domain.to_string(),
    })?;

    // non-breaking and narrow no-break spaces show up between digits and the symbol
    let text = text.replace(['\u{00A0}', '\u{202F}'], " ");
    let captures = regex
        .captures(&text)
        .ok_or_else(|| PriceParseError::NotFound { text: text.trim().to_string() })?;

    let integer: String = captures
        .get(1)
        .map(|m| m.as_str())
        .unwrap_or_default()
        .chars()
        .filter(|c| !matches!(c, '.' | ',' | ' '))
        .collect();
    let decimals = captures.get(2).map(|m| m.as_str()).unwrap_or("00");

    let amount = format!("{integer}.{decimals}");
    amount
        .parse::<f64>()
        .map_err(|_| PriceParseError::Malformed { amount })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("es", "1.234,56 €", 1234.56)]
    #[case("es", "19,99\u{00A0}€", 19.99)]
    #[case("de", "Lieferung 3,99 € extra", 3.99)]
    #[case("fr", "1 299,00 €", 1299.0)]
    #[case("fr", "1\u{202F}299,00\u{00A0}€", 1299.0)]
    #[case("it", "45,00 €", 45.0)]
    #[case("co.uk", "£1,049.99", 1049.99)]
    #[case("com", "$12.50", 12.5)]
    #[case("ca", "$1,000.00", 1000.0)]
    #[case("com.au", "$89.95", 89.95)]
    #[case("co.jp", "¥12,800", 12800.0)]
    #[case("com.br", "R$1.999,90", 1999.9)]
    fn localized_prices(#[case] domain: &str, #[case] text: &str, #[case] expected: f64) {
        let marketplace = Marketplace::from_domain(domain).unwrap();
        let price = parse_price(marketplace, text).unwrap();
        assert!((price - expected).abs() < 1e-9, "{domain}: {text} -> {price}");
    }

    #[rstest]
    #[case("es", "GRATIS")]
    #[case("co.uk", "12,99 €")]
    #[case("com", "")]
    fn missing_prices_are_errors(#[case] domain: &str, #[case] text: &str) {
        let marketplace = Marketplace::from_domain(domain).unwrap();
        assert!(matches!(
            parse_price(marketplace, text),
            Err(PriceParseError::NotFound { .. })
        ));
    }
}
