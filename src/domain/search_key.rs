//! Search keys: the canonical identity of a tracked search
//!
//! Wire format: `<destination>/<code>.<domain>[?<max tier 0-4>]`.
//! The canonical string is both the registry key and the persistence key,
//! so rendering must be injective: the destination never contains `/`,
//! and the default tier cap (`4`) is omitted.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use url::Url;

use crate::domain::item::ConditionTier;
use crate::domain::marketplace::Marketplace;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SearchKeyError {
    #[error("search arguments not provided")]
    Empty,
    #[error("no destination for search {0}")]
    MissingDestination(String),
    #[error("invalid product code {0}, expected <code>.<domain>")]
    InvalidProductCode(String),
    #[error("unsupported marketplace domain: {0}")]
    UnsupportedDomain(String),
    #[error("couldn't parse max tier {0}, expected 0-4")]
    InvalidMaxTier(String),
}

/// Where notifications for a search are delivered
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Destination {
    /// Channel or group handle, e.g. `@deals`
    Channel(String),
    /// Numeric chat id
    DirectChat(i64),
}

impl Destination {
    /// Parse a trimmed, lower-cased destination token
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_lowercase();
        if normalized.is_empty() || normalized.contains('/') {
            return None;
        }
        Some(match normalized.parse::<i64>() {
            Ok(id) => Destination::DirectChat(id),
            Err(_) => Destination::Channel(normalized),
        })
    }

    pub fn is_channel(&self) -> bool {
        matches!(self, Destination::Channel(_))
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Destination::Channel(handle) => f.write_str(handle),
            Destination::DirectChat(id) => write!(f, "{id}"),
        }
    }
}

/// A product on one marketplace, `<code>.<domain>`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProductRef {
    pub code: String,
    pub domain: String,
}

impl ProductRef {
    pub fn marketplace(&self) -> Option<&'static Marketplace> {
        Marketplace::from_domain(&self.domain)
    }

    pub fn product_url(&self) -> String {
        format!("https://www.amazon.{}/dp/{}", self.domain, self.code)
    }

    /// Recognize a pasted product link (`amazon.<domain>/.../dp/<code>`)
    /// anywhere in a message.
    pub fn from_link(text: &str) -> Option<Self> {
        let start = text.find("http")?;
        let link = text[start..].split_whitespace().next()?;
        let url = Url::parse(link).ok()?;
        let host = url.host_str()?;
        let idx = host.find("amazon.")?;
        let domain = host[idx + "amazon.".len()..].to_lowercase();
        let mut segments = url.path_segments()?;
        let code = loop {
            match segments.next() {
                Some("dp") => break segments.next()?,
                Some(_) => continue,
                None => return None,
            }
        };
        if code.is_empty() || domain.is_empty() {
            return None;
        }
        Some(Self {
            code: code.to_string(),
            domain,
        })
    }
}

impl fmt::Display for ProductRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.code, self.domain)
    }
}

impl FromStr for ProductRef {
    type Err = SearchKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (code, domain) = s
            .split_once('.')
            .ok_or_else(|| SearchKeyError::InvalidProductCode(s.to_string()))?;
        let valid_code = !code.is_empty() && code.chars().all(|c| c.is_ascii_alphanumeric());
        if !valid_code {
            return Err(SearchKeyError::InvalidProductCode(s.to_string()));
        }
        let domain = domain.to_lowercase();
        if Marketplace::from_domain(&domain).is_none() {
            return Err(SearchKeyError::UnsupportedDomain(domain));
        }
        Ok(Self {
            code: code.to_string(),
            domain,
        })
    }
}

/// Identity of a tracked (destination, product, tier cap) combination
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SearchKey {
    pub destination: Destination,
    pub product: ProductRef,
    /// Worst condition tier worth notifying about
    pub max_tier: ConditionTier,
}

impl SearchKey {
    pub fn new(destination: Destination, product: ProductRef) -> Self {
        Self {
            destination,
            product,
            max_tier: ConditionTier::WORST,
        }
    }

    /// Parse user arguments. `args` is either `<destination>/<query>` or a
    /// bare `<query>`, in which case `default_destination` is used.
    pub fn parse_args(args: &str, default_destination: Option<&Destination>) -> Result<Self, SearchKeyError> {
        let args = args.trim();
        if args.is_empty() {
            return Err(SearchKeyError::Empty);
        }
        let (destination, query) = match args.split_once('/') {
            Some((dest, query)) => {
                let destination = Destination::parse(dest)
                    .ok_or_else(|| SearchKeyError::MissingDestination(args.to_string()))?;
                (destination, query)
            }
            None => {
                let destination = default_destination
                    .cloned()
                    .ok_or_else(|| SearchKeyError::MissingDestination(args.to_string()))?;
                (destination, args)
            }
        };
        let query = query.trim().replace(' ', "+");
        let (product, max_tier) = match query.split_once('?') {
            Some((product, tier)) => (product, parse_max_tier(tier)?),
            None => (query.as_str(), ConditionTier::WORST),
        };
        if product.contains('/') {
            return Err(SearchKeyError::InvalidProductCode(product.to_string()));
        }
        Ok(Self {
            destination,
            product: product.parse()?,
            max_tier,
        })
    }

    /// Canonical string form, the map and persistence key
    pub fn render(&self) -> String {
        let mut key = format!("{}/{}", self.destination, self.product);
        if self.max_tier != ConditionTier::WORST {
            key.push('?');
            key.push_str(&self.max_tier.index().to_string());
        }
        key
    }
}

fn parse_max_tier(raw: &str) -> Result<ConditionTier, SearchKeyError> {
    raw.trim()
        .parse::<usize>()
        .ok()
        .and_then(ConditionTier::from_index)
        .ok_or_else(|| SearchKeyError::InvalidMaxTier(raw.to_string()))
}

impl FromStr for SearchKey {
    type Err = SearchKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_args(s, None)
    }
}

impl fmt::Display for SearchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}
