//! Product detail page parsing

use scraper::Html;

use crate::infrastructure::parsing::selectors::{CANONICAL_LINK, PRODUCT_TITLE};

/// Facts read from a product page; either may be missing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductPage {
    pub title: Option<String>,
    pub link: Option<String>,
}

pub fn parse_product_page(body: &str) -> ProductPage {
    let document = Html::parse_document(body);

    let title = document
        .select(&PRODUCT_TITLE)
        .map(|el| el.text().collect::<String>().trim().to_string())
        .find(|t| !t.is_empty());

    let link = document
        .select(&CANONICAL_LINK)
        .filter_map(|el| el.value().attr("href"))
        .map(str::trim)
        .find(|href| !href.is_empty())
        .map(str::to_string);

    ProductPage { title, link }
}
