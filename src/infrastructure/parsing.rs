//! HTML parsing for marketplace pages
//!
//! `scraper::Html` is not `Send`, so every parser takes the raw body and
//! returns owned values. Documents never cross an `.await`.

pub mod offer_parser;
pub mod price_parser;
pub mod product_parser;
pub mod selectors;
pub mod session_parser;

pub use offer_parser::{OfferPage, parse_offer_page};
pub use price_parser::{PriceParseError, parse_price};
pub use product_parser::{ProductPage, parse_product_page};
pub use session_parser::{CaptchaForm, CaptchaProbe, LocationModal, csrf_token, has_location, location_modal, probe_captcha};
