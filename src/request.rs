//! A single API fetch descriptor: region, namespace, and path, with the
//! derived URL and identity string used as the storage cache key.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::errors::ScanError;
use crate::regionality::Region;

/// Resource class and cache volatility of a request, per Blizzard's API docs.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum Namespace {
    /// Rarely changing reference data, i.e. talent trees, item data.
    Static,
    /// Data that changes periodically, i.e. realm status, leaderboards.
    Dynamic,
    /// Player-specific profile data, requiring elevated scopes in some cases.
    Profile,
}

impl Namespace {
    fn as_str(&self) -> &'static str {
        match self {
            Namespace::Static => "static",
            Namespace::Dynamic => "dynamic",
            Namespace::Profile => "profile",
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An immutable descriptor of a single Blizzard API fetch.
///
/// Two requests are equal iff their [`Request::identity`] strings match,
/// which is also the cache key used by [`crate::storage::ResponseStorage`].
#[derive(Debug, Clone)]
pub struct Request {
    /// Region the request targets, determining hostname and default locale.
    pub region: Region,
    /// Namespace the request targets, determining resource class and volatility.
    pub namespace: Namespace,
    /// Absolute URL path of the resource, e.g. `/data/wow/realm/index`.
    pub path: String,
}

static STORED_LINK_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^https?://(us|eu)\.api\.blizzard\.com(/[^?]+)\?.*namespace=(static|dynamic|profile)-.+$")
        .expect("stored link pattern is a valid regex")
});

impl Request {
    /// Constructs a new request targeting the given region, namespace, and path.
    pub fn new(region: Region, namespace: Namespace, path: impl Into<String>) -> Self {
        Self {
            region,
            namespace,
            path: path.into(),
        }
    }

    /// Parses a request out of a full URL returned by the API itself, e.g. an
    /// embedded `_links.self.href`. Rejects URLs that don't match the
    /// `{region}.api.blizzard.com` host and `namespace=` query convention.
    pub fn from_url(url: &str) -> Result<Self, ScanError> {
        let captures = STORED_LINK_PATTERN
            .captures(url)
            .ok_or_else(|| ScanError::InvalidRequestUrl(url.to_string()))?;

        let region = match &captures[1] {
            "us" => Region::Us,
            "eu" => Region::Eu,
            other => return Err(ScanError::InvalidRequestUrl(other.to_string())),
        };

        let namespace = match &captures[3] {
            "static" => Namespace::Static,
            "dynamic" => Namespace::Dynamic,
            "profile" => Namespace::Profile,
            other => return Err(ScanError::InvalidRequestUrl(other.to_string())),
        };

        Ok(Self::new(region, namespace, captures[2].to_string()))
    }

    /// Returns the full HTTPS URL for this request, excluding the bearer token.
    pub fn url(&self) -> String {
        format!(
            "https://{}.api.blizzard.com{}?locale={}&namespace={}-{}",
            self.region.abbreviation(),
            self.path,
            self.region.default_locale(),
            self.namespace,
            self.region.abbreviation(),
        )
    }

    /// Returns the canonical identity string for this request, used as the
    /// cache key. Equivalent to [`Request::url`] since no authentication
    /// material is ever embedded in the URL itself.
    pub fn identity(&self) -> String {
        self.url()
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.identity())
    }
}

impl PartialEq for Request {
    fn eq(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }
}

impl Eq for Request {}
