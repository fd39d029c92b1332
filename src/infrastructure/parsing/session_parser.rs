//! Captcha interstitials and delivery-location pages

use scraper::Html;
use serde::Deserialize;
use tracing::debug;

use crate::infrastructure::parsing::selectors::{
    CAPTCHA_IMAGE, CAPTCHA_INPUT, CAPTCHA_MARKER, LOCATION_LINE, LOCATION_MODAL, SCRIPT,
};

/// Tokens needed to answer a captcha challenge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptchaForm {
    pub image_url: String,
    pub amzn: String,
    pub amzn_r: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptchaProbe {
    /// Regular document
    Clear,
    Challenge(CaptchaForm),
    /// Challenge marker present but a required field is not; names the field
    Incomplete(&'static str),
}

/// Detect a captcha interstitial and read its form
pub fn probe_captcha(body: &str) -> CaptchaProbe {
    let document = Html::parse_document(body);
    if document.select(&CAPTCHA_MARKER).next().is_none() {
        return CaptchaProbe::Clear;
    }

    let image_url = document
        .select(&CAPTCHA_IMAGE)
        .find_map(|el| el.value().attr("src"))
        .map(str::to_string);

    let mut amzn = None;
    let mut amzn_r = None;
    for input in document.select(&CAPTCHA_INPUT) {
        let (Some(name), Some(value)) = (input.value().attr("name"), input.value().attr("value")) else {
            continue;
        };
        match name {
            "amzn" => amzn = Some(value.to_string()),
            "amzn-r" => amzn_r = Some(value.to_string()),
            _ => {}
        }
    }

    let non_empty = |v: Option<String>| v.filter(|s| !s.is_empty());
    match (non_empty(image_url), non_empty(amzn), non_empty(amzn_r)) {
        (None, _, _) => CaptchaProbe::Incomplete("image"),
        (_, None, _) => CaptchaProbe::Incomplete("amzn"),
        (_, _, None) => CaptchaProbe::Incomplete("amzn-r"),
        (Some(image_url), Some(amzn), Some(amzn_r)) => CaptchaProbe::Challenge(CaptchaForm {
            image_url,
            amzn,
            amzn_r,
        }),
    }
}

/// True when the header location line already shows `marker`
pub fn has_location(body: &str, marker: &str) -> bool {
    let document = Html::parse_document(body);
    document
        .select(&LOCATION_LINE)
        .any(|el| el.text().collect::<String>().contains(marker))
}

/// Descriptor of the location-change popover embedded in the home page
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct LocationModal {
    #[serde(default)]
    pub url: String,
    #[serde(default, rename = "ajaxHeaders")]
    pub ajax_headers: AjaxHeaders,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AjaxHeaders {
    #[serde(default, rename = "anti-csrftoken-a2z")]
    pub csrf_token: String,
}

pub fn location_modal(body: &str) -> Option<LocationModal> {
    let document = Html::parse_document(body);
    document
        .select(&LOCATION_MODAL)
        .filter_map(|el| el.value().attr("data-a-modal"))
        .find_map(|data| match serde_json::from_str::<LocationModal>(data) {
            Ok(modal) if !modal.url.is_empty() => Some(modal),
            Ok(_) => None,
            Err(e) => {
                debug!("Couldn't decode location modal: {}", e);
                None
            }
        })
}

/// CSRF token assigned in an inline script (`CSRF_TOKEN : "..."`)
pub fn csrf_token(body: &str) -> Option<String> {
    let document = Html::parse_document(body);
    document.select(&SCRIPT).find_map(|script| {
        let text: String = script.text().collect();
        let idx = text.find("CSRF_TOKEN")?;
        text[idx..]
            .split('"')
            .nth(1)
            .filter(|token| !token.is_empty())
            .map(str::to_string)
    })
}
