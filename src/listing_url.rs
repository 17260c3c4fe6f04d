use regex::Regex;
use thiserror::Error;
use url::Url;

use crate::config::MarketplaceConfig;

/// Path shapes an advertisement URL can take across marketplace locales.
const AD_PATH_PATTERNS: &[&str] = &[
    r"^/d/(uk|ru|oferta|obyavlenie)/.+-ID[a-zA-Z0-9]+\.html$",
    r"^/oferta/.+-ID[a-zA-Z0-9]+\.html$",
    r"^/item/.+-ID[a-zA-Z0-9]+\.html$",
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ListingUrlError {
    #[error("not a valid http(s) URL")]
    Malformed,

    #[error("host is not a supported marketplace domain")]
    UnsupportedDomain,

    #[error("path does not point at an advertisement")]
    NotAnAdPath,
}

/// Checks that a URL points at an advertisement on one of the configured
/// marketplace domains. The check pipeline assumes its input already passed
/// this; it belongs to whoever registers listings.
pub fn validate_listing_url(
    raw: &str,
    config: &MarketplaceConfig,
) -> Result<Url, ListingUrlError> {
    let url = Url::parse(raw).map_err(|_| ListingUrlError::Malformed)?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ListingUrlError::Malformed);
    }

    let host = url.host_str().ok_or(ListingUrlError::Malformed)?;
    let supported = config
        .domains
        .iter()
        .any(|domain| host == domain || host == format!("www.{}", domain));
    if !supported {
        return Err(ListingUrlError::UnsupportedDomain);
    }

    let path = url.path().to_string();
    for pattern in AD_PATH_PATTERNS {
        let regex = Regex::new(pattern).expect("static regex");
        if regex.is_match(&path) {
            return Ok(url);
        }
    }

    Err(ListingUrlError::NotAnAdPath)
}
