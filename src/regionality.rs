//! Region-based metadata for targeting specific instances of the Blizzard APIs.

/// Global OAuth token endpoint used by every region this crate supports.
pub const GLOBAL_TOKEN_ENDPOINT: &str = "https://oauth.battle.net/token";

/// Regions associated to their corresponding API gateway and default locale.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum Region {
    /// Represents the United States region and Global API gateway.
    Us,
    /// Represents the European Union region and Global API gateway.
    Eu,
}

impl Region {
    /// Returns the hostname prefix used to build a request's URL, i.e. `us` or `eu`.
    pub fn abbreviation(&self) -> &'static str {
        match self {
            Region::Us => "us",
            Region::Eu => "eu",
        }
    }

    /// Returns the default locale for the region, per Blizzard's documented mapping.
    pub fn default_locale(&self) -> &'static str {
        match self {
            Region::Us => "en_US",
            Region::Eu => "en_GB",
        }
    }
}

impl std::fmt::Display for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.abbreviation())
    }
}
